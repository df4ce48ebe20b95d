// ==========================================
// 现场工单系统 - 工单会话 API
// ==========================================
// 职责: 每个步骤一个入口，串联分配存储、校验、开通信号、
//       终端认证、流程状态机与草稿持久化
// 红线:
// - 初始加载完成前不写草稿
// - 远端调用在认证会话副本上执行，完成后再写回
// - 工单只读后删除草稿
// ==========================================

use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::work_rules::WorkRules;
use crate::domain::certification::{CertificationSession, DirectoryLink, LineDescriptor};
use crate::domain::draft::DraftSnapshot;
use crate::domain::equipment::LossFlags;
use crate::domain::protocol::ActivationResponse;
use crate::domain::types::{CertifyType, ProcessStep, SignalStatus, WorkStatus};
use crate::domain::work::WorkContext;
use crate::engine::allocation::{AllocationStore, RecoverOutcome};
use crate::engine::certification::{
    CertificationOrchestrator, LineQuery, SubscribeOutcome, TerminationOutcome,
};
use crate::engine::events::{OptionalEventPublisher, WorkEvent, WorkEventKind};
use crate::engine::gateways::{CertifyGateway, InventoryService, SignalGateway};
use crate::engine::process::ProcessStateMachine;
use crate::engine::signal_priority::SignalPriorityResolver;
use crate::engine::validation::{validate_cancel, validate_contract_status, ValidationEngine};
use crate::repository::draft_store::DraftStore;
use crate::repository::error::RepositoryError;

// ==========================================
// 命令与结果
// ==========================================

/// 设备分配命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EquipmentCommand {
    Assign { slot_id: String, unit_id: String },
    Unassign { slot_id: String },
    Recover { unit_id: String },
    CancelRecovery { unit_id: String },
    Reuse { unit_id: String, slot_id: String },
    SetLossFlags { unit_id: String, flags: LossFlags },
    SetInstallLocation { slot_id: String, location: Option<String> },
    SetMacOverride { slot_id: String, mac: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentOutcome {
    /// 是否发生了变更（重复回收为 false）
    pub changed: bool,
    pub fingerprint: String,
}

/// 终端认证命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CertifyCommand {
    Subscribe { confirm_resubscribe: bool },
    LinkDirectory,
    QueryLineInfo { query: LineQuery },
    SelectPort { port_no: String },
    RegisterLine,
    DetermineCertifyType,
    Activate,
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertifyOutcome {
    Subscribe(SubscribeOutcome),
    DirectoryLinked(DirectoryLink),
    LineInfo(LineDescriptor),
    PortSelected { port_no: String },
    LineRegistered,
    CertifyType(Option<CertifyType>),
    Activated(ActivationResponse),
    Terminated(TerminationOutcome),
}

/// 步骤导航命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavCommand {
    Next,
    Previous,
    /// 0 起始的步骤索引
    JumpTo(usize),
}

/// 打开工单时的草稿处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftRestore {
    /// 无草稿
    Fresh,
    /// 已恢复
    Restored { step: Option<ProcessStep> },
    /// 库存已变化或快照无效，草稿已删除
    Discarded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub allocations: usize,
    pub removals: usize,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalOutcome {
    pub success: bool,
    pub msg_id: String,
    pub result: String,
}

// ==========================================
// WorkServices - 会话依赖
// ==========================================
#[derive(Clone)]
pub struct WorkServices {
    pub inventory: Arc<dyn InventoryService>,
    pub signal: Arc<dyn SignalGateway>,
    pub certify: Arc<dyn CertifyGateway>,
    pub drafts: Arc<dyn DraftStore>,
    pub events: OptionalEventPublisher,
    pub rules: WorkRules,
}

impl WorkServices {
    pub fn new(
        inventory: Arc<dyn InventoryService>,
        signal: Arc<dyn SignalGateway>,
        certify: Arc<dyn CertifyGateway>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            inventory,
            signal,
            certify,
            drafts,
            events: OptionalEventPublisher::none(),
            rules: WorkRules::default(),
        }
    }

    pub fn with_events(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    pub fn with_rules(mut self, rules: WorkRules) -> Self {
        self.rules = rules;
        self
    }
}

// ==========================================
// WorkSessionApi - 工单会话
// ==========================================
// &mut self 保证每个子系统同时至多一个进行中的调用
pub struct WorkSessionApi {
    operator_id: String,
    signal_gateway: Arc<dyn SignalGateway>,
    drafts: Arc<dyn DraftStore>,
    events: OptionalEventPublisher,
    signal_success_prefix: String,
    validation: ValidationEngine,
    resolver: SignalPriorityResolver,
    orchestrator: CertificationOrchestrator,
    store: AllocationStore,
    process: ProcessStateMachine,
    certification: CertificationSession,
    draft_restore: DraftRestore,
}

impl WorkSessionApi {
    /// 打开工单: 加载库存并恢复草稿
    ///
    /// # 参数
    /// - services: 远端协作方与草稿存储
    /// - ctx: 工单上下文
    /// - operator_id: 技师 id
    ///
    /// # 返回
    /// - Ok(WorkSessionApi): 已加载的会话，`draft_restore()` 说明草稿处理结果
    /// - Err(ApiError): 库存加载或草稿读取失败
    pub async fn open(services: WorkServices, ctx: WorkContext, operator_id: &str) -> ApiResult<Self> {
        let WorkServices {
            inventory,
            signal,
            certify,
            drafts,
            events,
            rules,
        } = services;

        let work_id = ctx.work_id.clone();
        let mut store = AllocationStore::new(&work_id);
        store.begin_load();
        let snapshot = inventory.load_inventory(&ctx, operator_id).await?;
        store.load(snapshot);

        let mut api = Self {
            operator_id: operator_id.to_string(),
            signal_gateway: signal,
            drafts,
            events,
            signal_success_prefix: rules.signal_success_prefix.clone(),
            validation: ValidationEngine::new(rules.clone()),
            resolver: SignalPriorityResolver::new(),
            orchestrator: CertificationOrchestrator::new(certify, rules),
            store,
            process: ProcessStateMachine::new(ctx),
            certification: CertificationSession::default(),
            draft_restore: DraftRestore::Fresh,
        };

        api.draft_restore = api.restore_draft()?;
        if api.process.is_read_only() {
            api.store.set_read_only(true);
            api.discard_draft();
        }
        api.process.commit_allocation(&api.store);

        info!(
            work_id = %work_id,
            operator_id = %operator_id,
            step = %api.process.current_step(),
            read_only = api.process.is_read_only(),
            draft = ?api.draft_restore,
            "工单已打开"
        );
        Ok(api)
    }

    fn restore_draft(&mut self) -> ApiResult<DraftRestore> {
        let work_id = self.store.work_id().to_string();
        let draft = match self.drafts.get(&work_id) {
            Ok(Some(draft)) => draft,
            Ok(None) => return Ok(DraftRestore::Fresh),
            Err(RepositoryError::SerializationError(e)) => {
                debug!(work_id = %work_id, error = %e, "草稿解析失败");
                return Ok(self.reject_draft("草稿无法解析"));
            }
            Err(e) => return Err(e.into()),
        };

        if !draft.matches_inventory(self.store.inventory_fingerprint()) {
            return Ok(self.reject_draft("库存已变化"));
        }
        if draft.process.as_ref().is_some_and(|p| !p.is_consistent()) {
            return Ok(self.reject_draft("流程状态无效"));
        }
        if let Err(e) = self.store.restore(draft.allocation) {
            return Ok(self.reject_draft(&e.to_string()));
        }

        let step = match draft.process {
            Some(state) => self
                .process
                .restore(state)
                .then(|| self.process.current_step()),
            None => None,
        };
        self.certification = draft.certification;
        self.certification
            .invalidate_stale_descriptor(&self.store.fingerprint());

        debug!(work_id = %work_id, step = ?step, "草稿已恢复");
        Ok(DraftRestore::Restored { step })
    }

    fn reject_draft(&mut self, reason: &str) -> DraftRestore {
        let work_id = self.store.work_id().to_string();
        warn!(work_id = %work_id, reason = %reason, "草稿作废");
        self.discard_draft();
        self.events.publish(WorkEvent::new(
            &work_id,
            WorkEventKind::DraftDiscarded {
                reason: reason.to_string(),
            },
        ));
        DraftRestore::Discarded {
            reason: reason.to_string(),
        }
    }

    // ==========================================
    // 只读访问
    // ==========================================

    pub fn context(&self) -> &WorkContext {
        self.process.context()
    }

    pub fn store(&self) -> &AllocationStore {
        &self.store
    }

    pub fn process(&self) -> &ProcessStateMachine {
        &self.process
    }

    pub fn certification(&self) -> &CertificationSession {
        &self.certification
    }

    pub fn draft_restore(&self) -> &DraftRestore {
        &self.draft_restore
    }

    // ==========================================
    // 设备分配
    // ==========================================

    pub fn handle_equipment(&mut self, command: EquipmentCommand) -> ApiResult<EquipmentOutcome> {
        let changed = match command {
            EquipmentCommand::Assign { slot_id, unit_id } => {
                self.store.assign(&slot_id, &unit_id)?;
                true
            }
            EquipmentCommand::Unassign { slot_id } => self.store.unassign(&slot_id)?.is_some(),
            EquipmentCommand::Recover { unit_id } => {
                self.store.recover(&unit_id)? == RecoverOutcome::Recovered
            }
            EquipmentCommand::CancelRecovery { unit_id } => {
                self.store.cancel_recovery(&unit_id)?;
                true
            }
            EquipmentCommand::Reuse { unit_id, slot_id } => {
                self.store.reuse(&unit_id, &slot_id)?;
                true
            }
            EquipmentCommand::SetLossFlags { unit_id, flags } => {
                self.store.set_loss_flags(&unit_id, flags)?;
                true
            }
            EquipmentCommand::SetInstallLocation { slot_id, location } => {
                self.store.set_install_location(&slot_id, location)?;
                true
            }
            EquipmentCommand::SetMacOverride { slot_id, mac } => {
                self.store.set_mac_override(&slot_id, mac)?;
                true
            }
        };

        let fingerprint = self.store.fingerprint();
        if changed {
            self.publish(WorkEventKind::AllocationChanged {
                fingerprint: fingerprint.clone(),
            });
            self.persist_draft();
        }
        Ok(EquipmentOutcome {
            changed,
            fingerprint,
        })
    }

    /// 保存设备分配: 顺序校验通过后提交快照
    pub fn save_equipment(&mut self) -> ApiResult<SaveReport> {
        self.ensure_writable()?;
        self.validation
            .validate_save(self.store.allocations(), self.process.context())?;

        self.process.commit_allocation(&self.store);
        self.persist_draft();

        let committed = self.process.committed_allocation();
        Ok(SaveReport {
            allocations: committed.allocations.len(),
            removals: committed.removals.len(),
            fingerprint: committed.fingerprint.clone(),
        })
    }

    /// 发送开通信号，结果缓存到分配存储（任何分配变更都会清空）
    pub async fn send_signal(&mut self) -> ApiResult<SignalOutcome> {
        self.ensure_writable()?;
        let ctx = self.process.context();
        let plan = self.resolver.resolve(self.store.allocations(), ctx)?;
        let request = self.resolver.build_request(&plan, ctx, &self.operator_id);

        let response = match self.signal_gateway.send_signal(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.store
                    .record_signal_result(SignalStatus::Failed, e.to_string());
                return Err(e.into());
            }
        };

        let success = response.is_success(&self.signal_success_prefix);
        let status = if success {
            SignalStatus::Succeeded
        } else {
            SignalStatus::Failed
        };
        self.store
            .record_signal_result(status, response.result.clone());

        info!(
            work_id = %self.store.work_id(),
            msg_id = %plan.msg_id,
            success = success,
            "开通信号已发送"
        );
        Ok(SignalOutcome {
            success,
            msg_id: plan.msg_id,
            result: if response.message.is_empty() {
                response.result
            } else {
                response.message
            },
        })
    }

    // ==========================================
    // 终端认证
    // ==========================================

    /// 执行认证子步骤
    ///
    /// 在会话副本上调用远端，调用结束后写回；future 被丢弃时副本随之丢弃
    pub async fn handle_certification(&mut self, command: CertifyCommand) -> ApiResult<CertifyOutcome> {
        self.ensure_writable()?;
        let mut working = self.certification.clone();
        let before = working.state;

        let result = self.run_certification(&mut working, command).await;

        self.certification = working;
        if self.certification.state != before {
            self.publish(WorkEventKind::CertificationAdvanced {
                from: before,
                to: self.certification.state,
            });
        }
        self.persist_draft();

        result
    }

    async fn run_certification(
        &self,
        working: &mut CertificationSession,
        command: CertifyCommand,
    ) -> ApiResult<CertifyOutcome> {
        let ctx = self.process.context();
        let operator = self.operator_id.as_str();
        let orchestrator = &self.orchestrator;

        let outcome = match command {
            CertifyCommand::Subscribe {
                confirm_resubscribe,
            } => CertifyOutcome::Subscribe(
                orchestrator
                    .subscribe(working, ctx, operator, confirm_resubscribe)
                    .await?,
            ),
            CertifyCommand::LinkDirectory => CertifyOutcome::DirectoryLinked(
                orchestrator
                    .link_directory(working, ctx, &self.store, operator)
                    .await?
                    .clone(),
            ),
            CertifyCommand::QueryLineInfo { query } => CertifyOutcome::LineInfo(
                orchestrator
                    .query_line_info(working, ctx, &self.store, query, operator)
                    .await?
                    .clone(),
            ),
            CertifyCommand::SelectPort { port_no } => {
                orchestrator.select_port(working, &self.store, &port_no)?;
                CertifyOutcome::PortSelected { port_no }
            }
            CertifyCommand::RegisterLine => {
                orchestrator
                    .register_line(working, ctx, &self.store, operator)
                    .await?;
                CertifyOutcome::LineRegistered
            }
            CertifyCommand::DetermineCertifyType => CertifyOutcome::CertifyType(
                orchestrator
                    .determine_certify_type(working, ctx, operator)
                    .await?,
            ),
            CertifyCommand::Activate => CertifyOutcome::Activated(
                orchestrator
                    .activate_service(working, ctx, &self.store, operator)
                    .await?,
            ),
            CertifyCommand::Terminate => CertifyOutcome::Terminated(
                orchestrator.terminate_service(working, ctx, operator).await?,
            ),
        };
        Ok(outcome)
    }

    // ==========================================
    // 流程导航 / 工单状态
    // ==========================================

    pub fn navigate(&mut self, command: NavCommand) -> ApiResult<ProcessStep> {
        let from = self.process.current_step();
        let to = match command {
            NavCommand::Next => self.process.next(&self.store, &self.certification)?,
            NavCommand::Previous => self.process.previous(&self.store, &self.certification)?,
            NavCommand::JumpTo(index) => {
                self.process
                    .jump_to(index, &self.store, &self.certification)?
            }
        };

        if from != to {
            self.publish(WorkEventKind::StepChanged { from, to });
            self.persist_draft();
        }
        Ok(to)
    }

    /// 合同确认步骤: 合同状态是否允许当前作业
    pub fn review_contract(&self) -> ApiResult<()> {
        validate_contract_status(self.process.context())?;
        Ok(())
    }

    pub fn validate_cancel(&self, reason_code: &str, detail: Option<&str>) -> ApiResult<()> {
        validate_cancel(self.process.context(), reason_code, detail)?;
        Ok(())
    }

    /// 应用后端工单状态；变为只读时删除草稿
    pub fn apply_backend_status(&mut self, status: WorkStatus) -> ApiResult<()> {
        let from = self.process.current_step();
        self.process.apply_backend_status(status)?;
        let to = self.process.current_step();
        if from != to {
            self.publish(WorkEventKind::StepChanged { from, to });
        }

        if self.process.is_read_only() {
            self.store.set_read_only(true);
            self.discard_draft();
        }
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn ensure_writable(&self) -> ApiResult<()> {
        if self.process.is_read_only() {
            return Err(ApiError::ReadOnly(self.store.work_id().to_string()));
        }
        Ok(())
    }

    fn publish(&self, kind: WorkEventKind) {
        self.events
            .publish(WorkEvent::new(self.store.work_id(), kind));
    }

    /// 写入草稿（尽力而为）
    fn persist_draft(&self) {
        if !self.store.is_loaded() || self.process.is_read_only() {
            return;
        }
        let work_id = self.store.work_id();
        let snapshot = DraftSnapshot {
            work_id: work_id.to_string(),
            inventory_fingerprint: self.store.inventory_fingerprint().to_string(),
            allocation: self.store.snapshot(),
            process: Some(self.process.state().clone()),
            certification: self.certification.clone(),
            saved_at: Local::now().naive_local(),
        };
        if let Err(e) = self.drafts.set(work_id, &snapshot) {
            warn!(work_id = %work_id, "草稿保存失败: {}", e);
        }
    }

    fn discard_draft(&self) {
        let work_id = self.store.work_id();
        if let Err(e) = self.drafts.delete(work_id) {
            warn!(work_id = %work_id, "草稿删除失败: {}", e);
        }
    }
}
