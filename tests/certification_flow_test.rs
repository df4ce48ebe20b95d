// ==========================================
// 终端认证流程测试（经由工单会话）
// ==========================================
// 目标:
// - 加入 → 目录关联 → 线路查询 → 端口 → 登记 → 开通 全流程
// - 设备变更后线路信息过期
// - 远端失败时会话状态保持
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod certification_flow_test {
    use field_work_certify::api::{
        ApiError, ApiErrorKind, CertifyCommand, CertifyOutcome, EquipmentCommand, NavCommand,
        WorkSessionApi,
    };
    use field_work_certify::domain::protocol::SubscriptionInfo;
    use field_work_certify::domain::types::{CertificationState, CertifyType, ProcessStep};
    use field_work_certify::engine::{LineQuery, SubscribeOutcome};
    use field_work_certify::repository::{DraftStore, InMemoryDraftStore};
    use std::sync::Arc;

    use crate::test_helpers::{create_test_context, TestHarness, OPERATOR};

    async fn open_assigned(harness: &TestHarness) -> WorkSessionApi {
        let mut api =
            WorkSessionApi::open(harness.services(), create_test_context("W1", "F"), OPERATOR)
                .await
                .unwrap();
        for (slot_id, unit_id) in [("S-ONT", "ONT1"), ("S-AP", "AP1")] {
            api.handle_equipment(EquipmentCommand::Assign {
                slot_id: slot_id.to_string(),
                unit_id: unit_id.to_string(),
            })
            .unwrap();
        }
        api
    }

    async fn run(api: &mut WorkSessionApi, command: CertifyCommand) -> CertifyOutcome {
        api.handle_certification(command).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_fiber_certification_flow() {
        let harness = TestHarness::new(Arc::new(InMemoryDraftStore::new()));
        let mut api = open_assigned(&harness).await;
        api.navigate(NavCommand::JumpTo(3)).unwrap();

        let outcome = run(
            &mut api,
            CertifyCommand::Subscribe {
                confirm_resubscribe: false,
            },
        )
        .await;
        assert_eq!(
            outcome,
            CertifyOutcome::Subscribe(SubscribeOutcome::Subscribed { resubscribed: false })
        );

        let outcome = run(&mut api, CertifyCommand::LinkDirectory).await;
        assert!(matches!(outcome, CertifyOutcome::DirectoryLinked(ref link) if link.is_linked()));

        let outcome = run(
            &mut api,
            CertifyCommand::QueryLineInfo {
                query: LineQuery::Fiber { node_id: None },
            },
        )
        .await;
        assert!(matches!(outcome, CertifyOutcome::LineInfo(ref d) if d.equipment_id == "RN-1"));

        // 未选端口不能进入作业完成
        let err = api.navigate(NavCommand::Next).unwrap_err();
        assert!(matches!(err, ApiError::GuardViolation(_)));

        run(
            &mut api,
            CertifyCommand::SelectPort {
                port_no: "1".to_string(),
            },
        )
        .await;
        assert_eq!(run(&mut api, CertifyCommand::RegisterLine).await, CertifyOutcome::LineRegistered);
        assert_eq!(
            run(&mut api, CertifyCommand::DetermineCertifyType).await,
            CertifyOutcome::CertifyType(Some(CertifyType::Create))
        );

        let outcome = run(&mut api, CertifyCommand::Activate).await;
        assert!(matches!(outcome, CertifyOutcome::Activated(ref r) if r.code == "SUCCESS"));
        assert_eq!(api.certification().state, CertificationState::Activated);

        assert_eq!(api.navigate(NavCommand::Next).unwrap(), ProcessStep::Completion);

        let advanced = harness
            .events
            .event_types()
            .iter()
            .filter(|t| t.as_str() == "CertificationAdvanced")
            .count();
        // 光纤: Subscribed → LineRegistered → Activated，不经过 DirectoryLinked
        assert_eq!(advanced, 3);
    }

    #[tokio::test]
    async fn test_reallocation_makes_line_info_stale() {
        let harness = TestHarness::new(Arc::new(InMemoryDraftStore::new()));
        let mut api = open_assigned(&harness).await;
        run(
            &mut api,
            CertifyCommand::Subscribe {
                confirm_resubscribe: false,
            },
        )
        .await;
        run(
            &mut api,
            CertifyCommand::QueryLineInfo {
                query: LineQuery::Fiber { node_id: None },
            },
        )
        .await;

        api.handle_equipment(EquipmentCommand::Assign {
            slot_id: "S-ONT".to_string(),
            unit_id: "ONT2".to_string(),
        })
        .unwrap();

        let err = api
            .handle_certification(CertifyCommand::SelectPort {
                port_no: "1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::StaleData);
        assert!(api.certification().line_descriptor.is_none());
    }

    #[tokio::test]
    async fn test_existing_subscription_needs_confirmation() {
        let harness = TestHarness::new(Arc::new(InMemoryDraftStore::new()));
        *harness.certify.existing_subscription.lock().unwrap() = Some(SubscriptionInfo {
            subscription_no: "SUB-OLD".to_string(),
            request_no: None,
        });
        let mut api = open_assigned(&harness).await;

        let outcome = run(
            &mut api,
            CertifyCommand::Subscribe {
                confirm_resubscribe: false,
            },
        )
        .await;
        assert!(matches!(
            outcome,
            CertifyOutcome::Subscribe(SubscribeOutcome::ConfirmationRequired { .. })
        ));
        assert_eq!(api.certification().state, CertificationState::Unsubscribed);

        run(
            &mut api,
            CertifyCommand::Subscribe {
                confirm_resubscribe: true,
            },
        )
        .await;
        assert_eq!(harness.certify.count("cancel_subscription"), 1);
        assert_eq!(api.certification().state, CertificationState::Subscribed);
    }

    #[tokio::test]
    async fn test_activation_failure_keeps_registered_state() {
        let harness = TestHarness::new(Arc::new(InMemoryDraftStore::new()));
        *harness.certify.fail_activation.lock().unwrap() = true;
        let mut api = open_assigned(&harness).await;
        run(
            &mut api,
            CertifyCommand::Subscribe {
                confirm_resubscribe: false,
            },
        )
        .await;
        run(
            &mut api,
            CertifyCommand::QueryLineInfo {
                query: LineQuery::Fiber { node_id: None },
            },
        )
        .await;
        run(
            &mut api,
            CertifyCommand::SelectPort {
                port_no: "1".to_string(),
            },
        )
        .await;
        run(&mut api, CertifyCommand::RegisterLine).await;

        let err = api
            .handle_certification(CertifyCommand::Activate)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::RemoteCall);
        assert_eq!(api.certification().state, CertificationState::LineRegistered);
    }

    #[tokio::test]
    async fn test_certification_progress_survives_reopen() {
        let drafts = Arc::new(InMemoryDraftStore::new());
        let harness = TestHarness::new(drafts.clone());
        {
            let mut api = open_assigned(&harness).await;
            run(
                &mut api,
                CertifyCommand::Subscribe {
                    confirm_resubscribe: false,
                },
            )
            .await;
        }
        let saved = drafts.get("W1").unwrap().unwrap();
        assert_eq!(saved.certification.state, CertificationState::Subscribed);

        let api = WorkSessionApi::open(harness.services(), create_test_context("W1", "F"), OPERATOR)
            .await
            .unwrap();
        assert_eq!(api.certification().subscription_no(), Some("SUB-1"));
    }

    #[tokio::test]
    async fn test_terminate_uncertified_contract() {
        let harness = TestHarness::new(Arc::new(InMemoryDraftStore::new()));
        let mut api = open_assigned(&harness).await;

        let outcome = run(&mut api, CertifyCommand::Terminate).await;

        assert!(matches!(
            outcome,
            CertifyOutcome::Terminated(ref t) if !t.certified && !t.terminated
        ));
        assert_eq!(harness.certify.count("terminate"), 0);
    }
}
