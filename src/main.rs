// ==========================================
// 现场工单系统 - 离线检查工具
// ==========================================
// 用法:
//   field-work-certify check <fixture.json> [db_path]
//   field-work-certify purge-drafts <days> [db_path]
//
// check: 按夹具文件回放设备分配，输出保存校验与开通信号计划（JSON）
// purge-drafts: 清理超过指定天数的工单草稿
// ==========================================

use anyhow::{bail, Context};
use chrono::{Duration, Local};
use field_work_certify::config::{ConfigManager, WorkRules};
use field_work_certify::db::{default_db_path, open_sqlite_connection};
use field_work_certify::engine::{
    validate_contract_status, AllocationStore, SignalPlan, SignalPriorityResolver,
    ValidationEngine,
};
use field_work_certify::logging;
use field_work_certify::repository::WorkDraftRepository;
use field_work_certify::{InventorySnapshot, WorkContext};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
struct CheckFixture {
    context: WorkContext,
    inventory: InventorySnapshot,
    #[serde(default)]
    assignments: Vec<FixtureAssignment>,
    #[serde(default)]
    recoveries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FixtureAssignment {
    slot_id: String,
    unit_id: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    work_id: String,
    total_steps: usize,
    fingerprint: String,
    contract_status_error: Option<String>,
    validation_error: Option<String>,
    signal_plan: Option<SignalPlan>,
    signal_error: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    match command.as_str() {
        "check" => {
            let fixture_path = args.next().context("缺少夹具文件路径")?;
            let db_path = args.next();
            let report = run_check(&fixture_path, db_path.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "purge-drafts" => {
            let days: i64 = args
                .next()
                .context("缺少天数参数")?
                .parse()
                .context("天数必须为整数")?;
            let db_path = args.next().unwrap_or_else(default_db_path);
            let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path)?));
            let repo = WorkDraftRepository::new(conn);
            let cutoff = Local::now().naive_local() - Duration::days(days);
            let deleted = repo.purge_older_than(cutoff)?;
            println!("deleted={}", deleted);
        }
        other => bail!("未知命令: {:?}（可用: check, purge-drafts）", other),
    }
    Ok(())
}

async fn run_check(fixture_path: &str, db_path: Option<&str>) -> anyhow::Result<CheckReport> {
    let raw = std::fs::read_to_string(fixture_path)
        .with_context(|| format!("读取夹具失败: {}", fixture_path))?;
    let fixture: CheckFixture = serde_json::from_str(&raw).context("夹具格式错误")?;

    let rules = match db_path {
        Some(path) => {
            let manager = ConfigManager::new(path)?;
            WorkRules::load(&manager).await?
        }
        None => WorkRules::default(),
    };

    let ctx = fixture.context;
    let mut store = AllocationStore::new(&ctx.work_id);
    store.begin_load();
    store.load(fixture.inventory);
    for assignment in &fixture.assignments {
        store
            .assign(&assignment.slot_id, &assignment.unit_id)
            .with_context(|| format!("分配失败: {} -> {}", assignment.slot_id, assignment.unit_id))?;
    }
    for unit_id in &fixture.recoveries {
        store
            .recover(unit_id)
            .with_context(|| format!("回收失败: {}", unit_id))?;
    }

    let validation_error = ValidationEngine::new(rules)
        .validate_save(store.allocations(), &ctx)
        .err()
        .map(|e| e.localized_message());
    let contract_status_error = validate_contract_status(&ctx)
        .err()
        .map(|e| e.localized_message());

    let (signal_plan, signal_error) =
        match SignalPriorityResolver::new().resolve(store.allocations(), &ctx) {
            Ok(plan) => (Some(plan), None),
            Err(e) => (None, Some(e.to_string())),
        };

    Ok(CheckReport {
        work_id: ctx.work_id.clone(),
        total_steps: ctx.total_steps(),
        fingerprint: store.fingerprint(),
        contract_status_error,
        validation_error,
        signal_plan,
        signal_error,
    })
}
