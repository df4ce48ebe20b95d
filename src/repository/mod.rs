// ==========================================
// 现场工单系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

pub mod draft_repo;
pub mod draft_store;
pub mod error;

pub use draft_repo::{DraftRowMeta, WorkDraftRepository};
pub use draft_store::{DraftStore, InMemoryDraftStore};
pub use error::{RepositoryError, RepositoryResult};
