//! Integration tests for the refresh state machine and token budget
//!
//! These tests verify that:
//! - Concurrent nightly starts produce exactly one running refresh
//! - The effective status prefers a running track, then the newest one
//! - The watchdog fails stale nightly refreshes exactly once
//! - Token consumption and restoration move both counters together

use chrono::{DateTime, Duration, TimeZone, Utc};
use reportflow::adapters::database::{load_document, InMemoryStore, KeyValueStore, RecordKey};
use reportflow::adapters::workflow::{InMemoryWorkflowEngine, WorkflowEngine, WorkflowStatus};
use reportflow::config::RefreshConfig;
use reportflow::core::refresh::{
    BeginOutcome, InstallationClass, ReconcileOutcome, RefreshManager, RefreshModel,
    RefreshOutcome, RefreshStatus, RefreshTokenBudget, TenantContext, Track, TriggerOutcome,
};
use reportflow::domain::PlatformId;
use std::sync::Arc;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
}

fn acme() -> PlatformId {
    PlatformId::new("acme").unwrap()
}

fn manager(store: Arc<InMemoryStore>) -> RefreshManager {
    RefreshManager::new(store, None, RefreshConfig::default())
}

async fn budget(store: &InMemoryStore, platform: &PlatformId) -> RefreshTokenBudget {
    load_document(store, &RecordKey::token_budget(platform))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_concurrent_nightly_starts_are_exclusive() {
    let store = Arc::new(InMemoryStore::new());
    let manager = Arc::new(manager(store));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .begin_refresh(&acme(), Track::Scheduled, at(2, 0))
                .await
                .unwrap()
        }));
    }

    let mut started = 0;
    for handle in handles {
        if handle.await.unwrap() == BeginOutcome::Started {
            started += 1;
        }
    }
    assert_eq!(started, 1);

    let record = manager.load_record(&acme()).await.unwrap().unwrap();
    assert_eq!(record.scheduled.status, RefreshStatus::InProgress);
    assert_eq!(record.last_refresh_start, Some(at(2, 0)));
}

#[tokio::test]
async fn test_nightly_start_overrides_running_on_demand() {
    let manager = manager(Arc::new(InMemoryStore::new()));

    manager
        .begin_refresh(&acme(), Track::OnDemand, at(1, 0))
        .await
        .unwrap();
    manager
        .begin_refresh(&acme(), Track::Scheduled, at(2, 0))
        .await
        .unwrap();

    let record = manager.load_record(&acme()).await.unwrap().unwrap();
    assert_eq!(record.on_demand.status, RefreshStatus::Error);
    assert_eq!(record.scheduled.status, RefreshStatus::InProgress);
}

#[tokio::test]
async fn test_effective_status_precedence() {
    let manager = manager(Arc::new(InMemoryStore::new()));
    let ctx = TenantContext::new(
        acme(),
        RefreshModel::Managed {
            installation: InstallationClass::Production,
        },
    );

    // No record yet: a refresh is needed right away
    let view = manager.effective_refresh(&ctx, at(0, 0)).await.unwrap();
    assert_eq!(view.status, RefreshStatus::Unset);
    assert!(view.is_refresh_needed);

    manager
        .complete_refresh(&acme(), Track::Scheduled, RefreshOutcome::Succeeded, at(2, 0))
        .await
        .unwrap();
    manager
        .complete_refresh(&acme(), Track::OnDemand, RefreshOutcome::Error, at(3, 0))
        .await
        .unwrap();

    // The more recent on-demand failure wins
    let view = manager.effective_refresh(&ctx, at(4, 0)).await.unwrap();
    assert_eq!(view.status, RefreshStatus::Error);
    assert_eq!(view.date, Some(at(3, 0)));
    assert!(view.is_refresh_needed);
    assert_eq!(view.error_count, 1);

    // A running track wins over anything newer
    manager
        .begin_refresh(&acme(), Track::OnDemand, at(5, 0))
        .await
        .unwrap();
    let view = manager.effective_refresh(&ctx, at(6, 0)).await.unwrap();
    assert_eq!(view.status, RefreshStatus::InProgress);
    assert!(!view.is_refresh_needed);

    // Under the legacy model nothing ever asks for a refresh
    let legacy = TenantContext::new(acme(), RefreshModel::Legacy);
    let view = manager.effective_refresh(&legacy, at(6, 0)).await.unwrap();
    assert!(!view.is_refresh_needed);
}

#[tokio::test]
async fn test_watchdog_fails_stale_nightly_once() {
    let manager = manager(Arc::new(InMemoryStore::new()));
    manager
        .begin_refresh(&acme(), Track::Scheduled, at(1, 0))
        .await
        .unwrap();

    // Within the timeout nothing happens
    assert!(manager.sweep_nightly_timeouts(180, at(3, 0)).await.unwrap().is_empty());

    let expired = manager.sweep_nightly_timeouts(180, at(4, 30)).await.unwrap();
    assert_eq!(expired, vec![acme()]);
    assert!(manager.sweep_nightly_timeouts(180, at(5, 0)).await.unwrap().is_empty());

    let record = manager.load_record(&acme()).await.unwrap().unwrap();
    assert_eq!(record.scheduled.status, RefreshStatus::Error);
    assert_eq!(record.error_count, 1);

    // A fresh nightly may start again
    assert_eq!(
        manager
            .begin_refresh(&acme(), Track::Scheduled, at(5, 0))
            .await
            .unwrap(),
        BeginOutcome::Started
    );
}

#[tokio::test]
async fn test_token_restoration_adds_one_to_each_counter() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(store.clone());

    assert!(manager.consume_token(&acme(), at(9, 0)).await.unwrap());
    assert!(manager.consume_token(&acme(), at(9, 5)).await.unwrap());
    let before = budget(&store, &acme()).await;
    assert_eq!(before.daily_remaining, 1);
    assert_eq!(before.monthly_remaining, 28);

    manager
        .report_ingestion_failure(&acme(), at(9, 10))
        .await
        .unwrap();

    let after = budget(&store, &acme()).await;
    assert_eq!(after.daily_remaining, before.daily_remaining + 1);
    assert_eq!(after.monthly_remaining, before.monthly_remaining + 1);

    let record = manager.load_record(&acme()).await.unwrap().unwrap();
    assert_eq!(record.on_demand.status, RefreshStatus::Error);
}

#[tokio::test]
async fn test_daily_budget_refills_next_day() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(store.clone());

    for _ in 0..3 {
        assert!(manager.consume_token(&acme(), at(8, 0)).await.unwrap());
    }
    assert!(!manager.consume_token(&acme(), at(9, 0)).await.unwrap());

    let tomorrow = at(8, 0) + Duration::days(1);
    assert!(manager.consume_token(&acme(), tomorrow).await.unwrap());
    let budget = budget(&store, &acme()).await;
    assert_eq!(budget.daily_remaining, 2);
    assert_eq!(budget.monthly_remaining, 26);
}

#[tokio::test]
async fn test_trigger_and_reconcile_through_workflow_engine() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(InMemoryWorkflowEngine::new());
    let manager = RefreshManager::new(
        store.clone(),
        Some(engine.clone() as Arc<dyn WorkflowEngine>),
        RefreshConfig::default(),
    );

    let TriggerOutcome::Triggered { execution_id } = manager
        .trigger_on_demand_refresh(&acme(), at(10, 0))
        .await
        .unwrap()
    else {
        panic!("expected the refresh to start");
    };
    assert_eq!(engine.started().unwrap(), vec![acme()]);

    // The nightly takes over the record and inherits the execution id
    manager
        .begin_refresh(&acme(), Track::Scheduled, at(10, 5))
        .await
        .unwrap();
    assert_eq!(
        manager.reconcile_with_workflow(&acme(), at(10, 10)).await.unwrap(),
        ReconcileOutcome::StillRunning
    );

    engine
        .finish(&execution_id, WorkflowStatus::Succeeded)
        .unwrap();
    assert_eq!(
        manager.reconcile_with_workflow(&acme(), at(10, 20)).await.unwrap(),
        ReconcileOutcome::Succeeded
    );

    let record = manager.load_record(&acme()).await.unwrap().unwrap();
    assert_eq!(record.scheduled.status, RefreshStatus::Succeeded);
    assert_eq!(record.on_demand.status, RefreshStatus::Succeeded);
    assert_eq!(record.error_count, 0);

    // Already reconciled
    assert_eq!(
        manager.reconcile_with_workflow(&acme(), at(10, 30)).await.unwrap(),
        ReconcileOutcome::NotApplicable
    );
}

#[tokio::test]
async fn test_failed_start_hands_token_back() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(InMemoryWorkflowEngine::new());
    engine.fail_starts(true).unwrap();
    let manager = RefreshManager::new(
        store.clone(),
        Some(engine as Arc<dyn WorkflowEngine>),
        RefreshConfig::default(),
    );

    assert!(manager
        .trigger_on_demand_refresh(&acme(), at(11, 0))
        .await
        .is_err());

    let budget = budget(&store, &acme()).await;
    assert_eq!(budget.daily_remaining, 3);
    assert_eq!(budget.monthly_remaining, 30);
    assert!(store.get(&RecordKey::refresh(&acme())).await.unwrap().is_none());
}
