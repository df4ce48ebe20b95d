// ==========================================
// 现场工单系统 - 草稿存储接口
// ==========================================
// 职责: 按工单 id 读写草稿快照
// 实现: SQLite（draft_repo）与内存（测试/离线）
// ==========================================

use crate::domain::draft::DraftSnapshot;
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// 草稿存储
pub trait DraftStore: Send + Sync {
    /// 读取草稿
    ///
    /// # 返回
    /// - Ok(None): 无草稿
    fn get(&self, work_id: &str) -> RepositoryResult<Option<DraftSnapshot>>;

    /// 写入草稿（覆盖同工单旧草稿）
    fn set(&self, work_id: &str, snapshot: &DraftSnapshot) -> RepositoryResult<()>;

    /// 删除草稿，不存在时不报错
    fn delete(&self, work_id: &str) -> RepositoryResult<()>;
}

// ==========================================
// InMemoryDraftStore
// ==========================================
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    drafts: Mutex<HashMap<String, DraftSnapshot>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.drafts.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, HashMap<String, DraftSnapshot>>> {
        self.drafts
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl DraftStore for InMemoryDraftStore {
    fn get(&self, work_id: &str) -> RepositoryResult<Option<DraftSnapshot>> {
        Ok(self.lock()?.get(work_id).cloned())
    }

    fn set(&self, work_id: &str, snapshot: &DraftSnapshot) -> RepositoryResult<()> {
        self.lock()?.insert(work_id.to_string(), snapshot.clone());
        Ok(())
    }

    fn delete(&self, work_id: &str) -> RepositoryResult<()> {
        self.lock()?.remove(work_id);
        Ok(())
    }
}
