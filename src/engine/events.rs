// ==========================================
// 现场工单系统 - 工单事件发布
// ==========================================
// 职责: 定义工单会话事件与发布 trait
// 说明: Engine 层只定义 trait，宿主可接入消息总线或刷新界面
// ==========================================

use crate::domain::types::{CertificationState, ProcessStep};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 工单事件类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkEventKind {
    /// 设备分配变更（携带新的分配指纹）
    AllocationChanged { fingerprint: String },
    /// 步骤切换
    StepChanged { from: ProcessStep, to: ProcessStep },
    /// 认证状态推进
    CertificationAdvanced {
        from: CertificationState,
        to: CertificationState,
    },
    /// 草稿因库存变化被丢弃
    DraftDiscarded { reason: String },
}

impl WorkEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            WorkEventKind::AllocationChanged { .. } => "AllocationChanged",
            WorkEventKind::StepChanged { .. } => "StepChanged",
            WorkEventKind::CertificationAdvanced { .. } => "CertificationAdvanced",
            WorkEventKind::DraftDiscarded { .. } => "DraftDiscarded",
        }
    }
}

/// 工单事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkEvent {
    pub work_id: String,
    pub kind: WorkEventKind,
    pub occurred_at: NaiveDateTime,
}

impl WorkEvent {
    pub fn new(work_id: &str, kind: WorkEventKind) -> Self {
        Self {
            work_id: work_id.to_string(),
            kind,
            occurred_at: Local::now().naive_local(),
        }
    }
}

// ==========================================
// 事件发布 trait
// ==========================================

/// 工单事件发布者
///
/// 发布失败只记录日志，不影响会话操作
pub trait WorkEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - Ok(event_id): 事件 ID（无需 ID 时为空串）
    /// - Err: 发布失败
    fn publish(&self, event: WorkEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空实现
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventPublisher;

impl WorkEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: WorkEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            work_id = %event.work_id,
            event_type = event.kind.as_str(),
            "NoOpEventPublisher: 跳过事件"
        );
        Ok(String::new())
    }
}

/// 可选发布者包装
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn WorkEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn WorkEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件；失败时记录 warn 并吞掉错误
    pub fn publish(&self, event: WorkEvent) {
        let Some(publisher) = &self.inner else {
            return;
        };
        let work_id = event.work_id.clone();
        let event_type = event.kind.as_str().to_string();
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(
                work_id = %work_id,
                event_type = %event_type,
                "工单事件发布失败: {}",
                e
            );
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<WorkEvent>>,
    }

    impl WorkEventPublisher for RecordingPublisher {
        fn publish(&self, event: WorkEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok("evt-1".to_string())
        }
    }

    struct FailingPublisher;

    impl WorkEventPublisher for FailingPublisher {
        fn publish(&self, _event: WorkEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("bus unavailable".into())
        }
    }

    #[test]
    fn test_noop_publisher() {
        let event = WorkEvent::new(
            "W1",
            WorkEventKind::DraftDiscarded {
                reason: "inventory changed".to_string(),
            },
        );
        let result = NoOpEventPublisher.publish(event);
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recorder = Arc::new(RecordingPublisher::default());
        let publisher = OptionalEventPublisher::with_publisher(recorder.clone());
        assert!(publisher.is_configured());

        publisher.publish(WorkEvent::new(
            "W1",
            WorkEventKind::StepChanged {
                from: ProcessStep::ContractReview,
                to: ProcessStep::ReceptionReview,
            },
        ));

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.as_str(), "StepChanged");
    }

    #[test]
    fn test_optional_publisher_swallows_failure() {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(FailingPublisher));
        publisher.publish(WorkEvent::new(
            "W1",
            WorkEventKind::AllocationChanged {
                fingerprint: "A,B".to_string(),
            },
        ));
        assert!(!OptionalEventPublisher::none().is_configured());
    }

    #[test]
    fn test_event_kind_serializes_with_tag() {
        let json = serde_json::to_value(WorkEventKind::CertificationAdvanced {
            from: CertificationState::Subscribed,
            to: CertificationState::DirectoryLinked,
        })
        .unwrap();
        assert_eq!(json["type"], "CERTIFICATION_ADVANCED");
    }
}
