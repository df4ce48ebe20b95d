// ==========================================
// 现场工单系统 - 工单草稿仓储 (SQLite)
// ==========================================
// 表: work_draft（每个工单一条，快照以 JSON 存储）
// 红线: Repository 不含业务逻辑，指纹比对由会话层完成
// ==========================================

use crate::domain::draft::DraftSnapshot;
use crate::repository::draft_store::DraftStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 草稿行的元信息（不含快照正文）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRowMeta {
    pub draft_id: String,
    pub work_id: String,
    pub inventory_fingerprint: String,
    pub step: Option<String>,
    pub saved_at: NaiveDateTime,
}

pub struct WorkDraftRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkDraftRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let repo = Self { conn };
        if let Err(e) = repo.ensure_table() {
            tracing::warn!("work_draft ensure failed: {}", e);
        }
        repo
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS work_draft (
              work_id TEXT PRIMARY KEY,
              draft_id TEXT NOT NULL,
              inventory_fingerprint TEXT NOT NULL,
              step TEXT,
              snapshot_json TEXT NOT NULL,
              saved_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_work_draft_saved_at ON work_draft(saved_at DESC);
            "#,
        )?;
        Ok(())
    }

    /// 读取草稿元信息
    pub fn find_meta(&self, work_id: &str) -> RepositoryResult<Option<DraftRowMeta>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT draft_id, work_id, inventory_fingerprint, step, saved_at
            FROM work_draft
            WHERE work_id = ?1
            "#,
        )?;

        let row = stmt.query_row(params![work_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        });

        match row {
            Ok((draft_id, work_id, inventory_fingerprint, step, saved_at)) => Ok(Some(DraftRowMeta {
                draft_id,
                work_id,
                inventory_fingerprint,
                step,
                saved_at: parse_datetime(&saved_at)?,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 删除早于指定时间的草稿
    ///
    /// # 返回
    /// - 删除行数
    pub fn purge_older_than(&self, cutoff: NaiveDateTime) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM work_draft WHERE saved_at < ?1",
            params![cutoff.format(DATETIME_FORMAT).to_string()],
        )?;
        if deleted > 0 {
            tracing::info!(deleted = deleted, cutoff = %cutoff, "过期草稿已清理");
        }
        Ok(deleted)
    }
}

impl DraftStore for WorkDraftRepository {
    fn get(&self, work_id: &str) -> RepositoryResult<Option<DraftSnapshot>> {
        let conn = self.get_conn()?;
        let json = conn.query_row(
            "SELECT snapshot_json FROM work_draft WHERE work_id = ?1",
            params![work_id],
            |row| row.get::<_, String>(0),
        );

        match json {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, work_id: &str, snapshot: &DraftSnapshot) -> RepositoryResult<()> {
        let json = serde_json::to_string(snapshot)?;
        let step = snapshot
            .process
            .as_ref()
            .and_then(|p| p.step_at(p.current_index()))
            .map(|step| step.to_string());

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO work_draft (
              work_id, draft_id, inventory_fingerprint, step, snapshot_json, saved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(work_id) DO UPDATE SET
              draft_id = excluded.draft_id,
              inventory_fingerprint = excluded.inventory_fingerprint,
              step = excluded.step,
              snapshot_json = excluded.snapshot_json,
              saved_at = excluded.saved_at
            "#,
            params![
                work_id,
                Uuid::new_v4().to_string(),
                snapshot.inventory_fingerprint,
                step,
                json,
                snapshot.saved_at.format(DATETIME_FORMAT).to_string(),
            ],
        )?;

        tracing::debug!(work_id = %work_id, step = ?step, "草稿已保存");
        Ok(())
    }

    fn delete(&self, work_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM work_draft WHERE work_id = ?1", params![work_id])?;
        Ok(())
    }
}

fn parse_datetime(value: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|e| {
        RepositoryError::FieldValueError {
            field: "saved_at".to_string(),
            message: e.to_string(),
        }
    })
}
