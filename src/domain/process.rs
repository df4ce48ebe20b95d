// ==========================================
// 现场工单系统 - 流程状态
// ==========================================
// 职责: 当前步骤、步骤序列、各步骤完成标记
// 约束: 步骤数在工单上下文确定后不再变化
// ==========================================

use crate::domain::types::ProcessStep;
use serde::{Deserialize, Serialize};

/// 按是否需要认证生成步骤序列
pub fn steps_for(certification_required: bool) -> Vec<ProcessStep> {
    let mut steps = vec![
        ProcessStep::ContractReview,
        ProcessStep::ReceptionReview,
        ProcessStep::EquipmentAssignment,
    ];
    if certification_required {
        steps.push(ProcessStep::LineRegistration);
    }
    steps.push(ProcessStep::Completion);
    steps.push(ProcessStep::PostProcess);
    steps
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    steps: Vec<ProcessStep>,
    current: usize,
    completed: Vec<bool>,
    pub read_only: bool,
}

impl ProcessState {
    pub fn new(certification_required: bool) -> Self {
        let steps = steps_for(certification_required);
        let completed = vec![false; steps.len()];
        Self {
            steps,
            current: 0,
            completed,
            read_only: false,
        }
    }

    pub fn steps(&self) -> &[ProcessStep] {
        &self.steps
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// 当前索引与完成标记是否与步骤序列一致（反序列化后的状态需先检查）
    pub fn is_consistent(&self) -> bool {
        self.current < self.steps.len() && self.completed.len() == self.steps.len()
    }

    pub fn current_step(&self) -> ProcessStep {
        self.steps[self.current]
    }

    /// 1 起始的步骤序号
    pub fn step_number(&self) -> usize {
        self.current + 1
    }

    pub fn index_of(&self, step: ProcessStep) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    pub fn step_at(&self, index: usize) -> Option<ProcessStep> {
        self.steps.get(index).copied()
    }

    pub fn is_completed(&self, step: ProcessStep) -> bool {
        self.index_of(step)
            .and_then(|i| self.completed.get(i).copied())
            .unwrap_or(false)
    }

    pub(crate) fn move_to(&mut self, index: usize) {
        // 前进时离开的步骤视为已完成
        if index > self.current {
            for flag in &mut self.completed[self.current..index] {
                *flag = true;
            }
        }
        self.current = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_sequences() {
        assert_eq!(steps_for(false).len(), 5);
        let certified = steps_for(true);
        assert_eq!(certified.len(), 6);
        assert_eq!(certified[3], ProcessStep::LineRegistration);
        assert!(!steps_for(false).contains(&ProcessStep::LineRegistration));
    }

    #[test]
    fn test_move_to_marks_completed() {
        let mut state = ProcessState::new(false);
        assert_eq!(state.current_step(), ProcessStep::ContractReview);
        state.move_to(2);
        assert_eq!(state.step_number(), 3);
        assert!(state.is_completed(ProcessStep::ContractReview));
        assert!(state.is_completed(ProcessStep::ReceptionReview));
        assert!(!state.is_completed(ProcessStep::EquipmentAssignment));
        state.move_to(1);
        assert_eq!(state.current_step(), ProcessStep::ReceptionReview);
        assert!(state.is_completed(ProcessStep::ReceptionReview));
    }

    #[test]
    fn test_deserialized_state_consistency() {
        let state = ProcessState::new(true);
        assert!(state.is_consistent());

        let mut value = serde_json::to_value(&state).unwrap();
        value["current"] = serde_json::json!(42);
        let out_of_range: ProcessState = serde_json::from_value(value).unwrap();
        assert!(!out_of_range.is_consistent());

        let mut value = serde_json::to_value(&state).unwrap();
        value["completed"] = serde_json::json!([true]);
        let short_flags: ProcessState = serde_json::from_value(value).unwrap();
        assert!(!short_flags.is_consistent());
        assert!(!short_flags.is_completed(ProcessStep::Completion));
    }
}
