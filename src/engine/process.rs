// ==========================================
// 现场工单系统 - 流程状态机
// ==========================================
// 职责: 工单步骤导航、步骤守卫、工单状态流转
// 步骤: 合同确认 → 受理确认 → 设备分配 → [线路登记] → 作业完成 → 后处理
// 红线:
// - 守卫失败时停留在当前步骤
// - 跨越多个步骤时逐个检查守卫
// - 离开设备分配前必须先提交分配快照
// ==========================================

use crate::domain::certification::CertificationSession;
use crate::domain::draft::AllocationSnapshot;
use crate::domain::process::ProcessState;
use crate::domain::types::{ProcessStep, TransportMode, WorkStatus};
use crate::domain::work::WorkContext;
use crate::engine::allocation::AllocationStore;
use crate::i18n::{t, t_with_args};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 认证守卫生效的最小步骤序号（1 起始）
const GUARDED_STEP_NUMBER: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardViolation {
    #[error("存在未分配设备的合同槽位: {slots:?}")]
    UnallocatedSlots { slots: Vec<String> },

    #[error("目录关联未完成, 不能进入线路登记")]
    DirectoryNotLinked,

    #[error("线路信息缺失或已失效, 不能进入作业完成")]
    MissingLineDescriptor,

    #[error("工单只读, 不允许切换步骤")]
    ReadOnly,

    #[error("步骤超出范围: {0}")]
    OutOfRange(usize),

    #[error("工单状态不允许流转: {from} → {to}")]
    InvalidStatusTransition { from: WorkStatus, to: WorkStatus },
}

impl GuardViolation {
    /// 面向技师的本地化提示
    pub fn localized_message(&self) -> String {
        match self {
            GuardViolation::UnallocatedSlots { slots } => {
                t_with_args("guard.unallocated_slots", &[("count", &slots.len().to_string())])
            }
            GuardViolation::DirectoryNotLinked => t("guard.directory_not_linked"),
            GuardViolation::MissingLineDescriptor => t("guard.missing_line_descriptor"),
            GuardViolation::ReadOnly => t("guard.read_only"),
            GuardViolation::OutOfRange(step) => {
                t_with_args("guard.out_of_range", &[("step", &step.to_string())])
            }
            GuardViolation::InvalidStatusTransition { from, to } => t_with_args(
                "guard.invalid_status_transition",
                &[("from", from.as_code()), ("to", to.as_code())],
            ),
        }
    }
}

pub type GuardResult<T> = Result<T, GuardViolation>;

// ==========================================
// ProcessStateMachine
// ==========================================
// 持有会话内的工单上下文与已提交的分配快照，
// 其他组件按引用读取
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    ctx: WorkContext,
    state: ProcessState,
    committed: AllocationSnapshot,
}

impl ProcessStateMachine {
    pub fn new(ctx: WorkContext) -> Self {
        let mut state = ProcessState::new(ctx.certification_required);
        state.read_only = !ctx.work_status.is_editable();
        Self {
            ctx,
            state,
            committed: AllocationSnapshot::default(),
        }
    }

    pub fn context(&self) -> &WorkContext {
        &self.ctx
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn current_step(&self) -> ProcessStep {
        self.state.current_step()
    }

    pub fn is_read_only(&self) -> bool {
        self.state.read_only
    }

    /// 已提交的分配快照（离开设备分配时刷新）
    pub fn committed_allocation(&self) -> &AllocationSnapshot {
        &self.committed
    }

    /// 恢复草稿中记忆的步骤
    ///
    /// 步骤序列与当前工单不一致或索引越界时忽略，返回 false
    pub fn restore(&mut self, state: ProcessState) -> bool {
        if state.steps() != self.state.steps() {
            debug!(work_id = %self.ctx.work_id, "草稿步骤序列不一致, 忽略");
            return false;
        }
        if !state.is_consistent() {
            warn!(
                work_id = %self.ctx.work_id,
                current = state.current_index(),
                "草稿流程状态越界, 忽略"
            );
            return false;
        }
        let read_only = self.state.read_only;
        self.state = state;
        self.state.read_only = read_only || self.state.read_only;
        true
    }

    // ==========================================
    // 导航
    // ==========================================

    pub fn next(
        &mut self,
        store: &AllocationStore,
        certification: &CertificationSession,
    ) -> GuardResult<ProcessStep> {
        let target = self.state.current_index() + 1;
        self.jump_to(target, store, certification)
    }

    pub fn previous(
        &mut self,
        store: &AllocationStore,
        certification: &CertificationSession,
    ) -> GuardResult<ProcessStep> {
        let current = self.state.current_index();
        if current == 0 {
            return Err(GuardViolation::OutOfRange(0));
        }
        self.jump_to(current - 1, store, certification)
    }

    /// 跳转到指定步骤（0 起始索引）
    ///
    /// 前进时对每个跨越的步骤依次检查守卫，任一失败则停留原步骤
    pub fn jump_to(
        &mut self,
        target: usize,
        store: &AllocationStore,
        certification: &CertificationSession,
    ) -> GuardResult<ProcessStep> {
        if self.state.read_only {
            return Err(GuardViolation::ReadOnly);
        }
        let step = self
            .state
            .step_at(target)
            .ok_or(GuardViolation::OutOfRange(target + 1))?;
        let current = self.state.current_index();
        if target == current {
            return Ok(step);
        }

        if self.state.current_step() == ProcessStep::EquipmentAssignment {
            self.commit_allocation(store);
        }

        if target > current {
            for index in current + 1..=target {
                self.check_guards(index, store, certification)?;
            }
        }

        let from = self.state.current_step();
        self.state.move_to(target);
        info!(
            work_id = %self.ctx.work_id,
            from = %from,
            to = %step,
            step_number = self.state.step_number(),
            "步骤切换"
        );
        Ok(step)
    }

    /// 提交分配快照
    pub fn commit_allocation(&mut self, store: &AllocationStore) {
        self.committed = store.snapshot();
        debug!(
            work_id = %self.ctx.work_id,
            fingerprint = %self.committed.fingerprint,
            "分配快照已提交"
        );
    }

    fn check_guards(
        &self,
        index: usize,
        store: &AllocationStore,
        certification: &CertificationSession,
    ) -> GuardResult<()> {
        if !self.ctx.certification_required || index + 1 < GUARDED_STEP_NUMBER {
            return Ok(());
        }
        let step = self
            .state
            .step_at(index)
            .ok_or(GuardViolation::OutOfRange(index + 1))?;

        let unallocated: Vec<String> = store
            .unallocated_slots()
            .iter()
            .map(|s| s.slot_id.clone())
            .collect();
        if !unallocated.is_empty() {
            return Err(GuardViolation::UnallocatedSlots { slots: unallocated });
        }

        match step {
            ProcessStep::LineRegistration
                if self.ctx.transport_mode() == TransportMode::WideBand
                    && !certification.directory_link.is_attempted() =>
            {
                Err(GuardViolation::DirectoryNotLinked)
            }
            ProcessStep::Completion => {
                let ready = certification
                    .fresh_descriptor(&store.fingerprint())
                    .map(|d| d.has_port())
                    .unwrap_or(false);
                if ready {
                    Ok(())
                } else {
                    Err(GuardViolation::MissingLineDescriptor)
                }
            }
            _ => Ok(()),
        }
    }

    // ==========================================
    // 工单状态
    // ==========================================

    /// 应用后端返回的工单状态
    ///
    /// 完成后进入后处理并标记只读；取消/删除同样只读
    pub fn apply_backend_status(&mut self, status: WorkStatus) -> GuardResult<()> {
        let from = self.ctx.work_status;
        if from != status && !from.can_transition_to(status) {
            return Err(GuardViolation::InvalidStatusTransition { from, to: status });
        }
        self.ctx.work_status = status;

        match status {
            WorkStatus::Completed => {
                if let Some(index) = self.state.index_of(ProcessStep::PostProcess) {
                    self.state.move_to(index);
                }
                self.state.read_only = true;
            }
            WorkStatus::Cancelled | WorkStatus::Deleted => self.state.read_only = true,
            _ => {}
        }

        info!(
            work_id = %self.ctx.work_id,
            from = %from,
            to = %status,
            read_only = self.state.read_only,
            "工单状态更新"
        );
        Ok(())
    }
}
