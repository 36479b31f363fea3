use linklock_economics::{LedgerStorage, MemoryLedger};
use linklock_gate::ClickOutcome;
use linklock_node::config::NodeConfig;
use linklock_node::geo::StaticGeoLocator;
use linklock_node::node::LockerNode;
use linklock_storage::{
    AnalyticsKind, AnalyticsStore, MemoryAnalytics, MemoryCatalog, MemoryLockerStore, TaskDraft,
};
use linklock_types::{AccountId, Device, LinklockError, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const WINDOWS_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

struct Harness {
    node: LockerNode,
    ledger: Arc<MemoryLedger>,
    analytics: Arc<MemoryAnalytics>,
}

/// Node over in-memory stores with a zero-second dwell so completions
/// fire as soon as the timer task runs.
fn harness(geo_country: Option<&str>, allow_empty_gate: bool) -> Harness {
    let mut config = NodeConfig::default();
    config.gate.dwell_secs = 0;
    config.gate.allow_empty_gate = allow_empty_gate;

    let ledger = Arc::new(MemoryLedger::new());
    let analytics = Arc::new(MemoryAnalytics::new());
    let node = LockerNode::with_stores(
        config,
        Arc::new(MemoryCatalog::new()),
        Arc::new(MemoryLockerStore::new()),
        ledger.clone(),
        analytics.clone(),
        Arc::new(StaticGeoLocator::new(geo_country)),
    );
    node.start_completion_worker();
    Harness {
        node,
        ledger,
        analytics,
    }
}

fn windows_task(title: &str, cpm1: &str, cpm2: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        description: format!("{} description", title),
        ad_url: Some(format!("https://ads.example.com/{}", title)),
        devices: vec![Device::Windows],
        cpm_tier1: cpm1.to_string(),
        cpm_tier2: cpm2.to_string(),
        cpm_tier3: "0".to_string(),
        status: TaskStatus::Active,
    }
}

/// Waits until `expected` attributions have been credited. Attribution is
/// the last step of the completion pipeline, so once it lands the gate
/// state and the ledger are both settled.
async fn wait_for_attributions(node: &LockerNode, expected: u64) {
    for _ in 0..200 {
        if node.metrics.attributions_total.get() >= expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "Timed out waiting for {} attributions (saw {})",
        expected,
        node.metrics.attributions_total.get()
    );
}

#[tokio::test]
async fn test_full_visit_unlocks_and_credits_owner() {
    let h = harness(Some("FR"), true);
    let owner = AccountId::new("creator-1");

    for i in 0..2 {
        h.node
            .insert_task(windows_task(&format!("sponsor-{}", i), "0", "2.80"))
            .await
            .unwrap();
    }

    let locker = h
        .node
        .create_locker(
            owner.clone(),
            "Premium download".to_string(),
            "https://example.com/file.zip".to_string(),
        )
        .await
        .unwrap();

    let visit = h
        .node
        .open_visit(&locker.id, WINDOWS_UA, Some("203.0.113.9"))
        .await
        .unwrap();
    assert_eq!(visit.tasks.len(), 2);

    // Redirect is gated until every task completes.
    let locked = h.node.unlock(&visit.visit_id).await.unwrap();
    assert!(!locked.unlocked);
    assert!(locked.destination_url.is_none());

    for task in &visit.tasks {
        let outcome = h
            .node
            .click_task(&visit.visit_id, &task.task_id)
            .await
            .unwrap();
        assert!(matches!(outcome, ClickOutcome::Started { .. }));
    }

    wait_for_attributions(&h.node, 2).await;

    let unlocked = h.node.unlock(&visit.visit_id).await.unwrap();
    assert!(unlocked.unlocked);
    assert_eq!(
        unlocked.destination_url.as_deref(),
        Some("https://example.com/file.zip")
    );

    // Tier-2 visitor: each completion credits 2.80 / 1000 = $0.0028.
    let balance = h.ledger.get_balance(&owner).await.unwrap();
    assert_eq!(balance.to_micros(), 2 * 2_800);
    assert_eq!(h.ledger.revenue_history(&owner).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_device_and_tier_filtering_shapes_the_gate() {
    let h = harness(Some("US"), true);

    // Android-only task is invisible to a Windows visitor; a task with no
    // Tier-1 CPM is invisible to a Tier-1 visitor.
    h.node
        .insert_task(TaskDraft {
            devices: vec![Device::Android],
            ..windows_task("android-only", "4.50", "0")
        })
        .await
        .unwrap();
    h.node
        .insert_task(windows_task("tier2-only", "0", "2.80"))
        .await
        .unwrap();
    h.node
        .insert_task(windows_task("visible", "4.50", "0"))
        .await
        .unwrap();

    let locker = h
        .node
        .create_locker(
            AccountId::new("creator-2"),
            "Filtered".to_string(),
            "https://example.com".to_string(),
        )
        .await
        .unwrap();

    let visit = h
        .node
        .open_visit(&locker.id, WINDOWS_UA, Some("203.0.113.9"))
        .await
        .unwrap();

    assert_eq!(visit.tasks.len(), 1);
    assert_eq!(visit.tasks[0].title, "visible");
}

#[tokio::test]
async fn test_geolocation_failure_falls_back_to_tier1() {
    // Locator always errors; the visit degrades to the US fallback and a
    // Tier-1-only task stays visible.
    let h = harness(None, true);

    h.node
        .insert_task(windows_task("tier1-only", "4.50", "0"))
        .await
        .unwrap();

    let locker = h
        .node
        .create_locker(
            AccountId::new("creator-3"),
            "Fallback".to_string(),
            "https://example.com".to_string(),
        )
        .await
        .unwrap();

    let visit = h
        .node
        .open_visit(&locker.id, WINDOWS_UA, Some("203.0.113.9"))
        .await
        .unwrap();
    assert_eq!(visit.tasks.len(), 1);
}

#[tokio::test]
async fn test_dropoff_records_completed_count_without_unlock() {
    let h = harness(Some("US"), true);
    let owner = AccountId::new("creator-4");

    for i in 0..3 {
        h.node
            .insert_task(windows_task(&format!("t{}", i), "1.00", "0"))
            .await
            .unwrap();
    }
    let locker = h
        .node
        .create_locker(
            owner,
            "Dropoff".to_string(),
            "https://example.com".to_string(),
        )
        .await
        .unwrap();

    let visit = h
        .node
        .open_visit(&locker.id, WINDOWS_UA, None)
        .await
        .unwrap();
    for task in &visit.tasks {
        h.node
            .click_task(&visit.visit_id, &task.task_id)
            .await
            .unwrap();
    }
    wait_for_attributions(&h.node, 3).await;

    // Tab closed before the unlock click.
    h.node.dropoff(&visit.visit_id).await.unwrap();

    let events = h.analytics.for_locker(&locker.id).await.unwrap();
    let dropoffs: Vec<_> = events
        .iter()
        .filter(|e| e.kind == AnalyticsKind::Dropoff)
        .collect();
    assert_eq!(dropoffs.len(), 1);
    assert_eq!(dropoffs[0].completed_tasks, Some(3));
    assert!(!events.iter().any(|e| e.kind == AnalyticsKind::Unlock));

    // The visit is gone; a later unlock attempt cannot resurrect it.
    assert!(matches!(
        h.node.unlock(&visit.visit_id).await,
        Err(LinklockError::VisitNotFound(_))
    ));
}

#[tokio::test]
async fn test_empty_gate_policy_both_ways() {
    // Default policy: zero eligible tasks is a valid free unlock.
    let open = harness(Some("US"), true);
    let locker = open
        .node
        .create_locker(
            AccountId::new("creator-5"),
            "Empty".to_string(),
            "https://example.com".to_string(),
        )
        .await
        .unwrap();
    let visit = open
        .node
        .open_visit(&locker.id, WINDOWS_UA, None)
        .await
        .unwrap();
    assert!(visit.tasks.is_empty());
    let unlocked = open.node.unlock(&visit.visit_id).await.unwrap();
    assert!(unlocked.unlocked);

    // Strict policy: the visit is rejected instead.
    let strict = harness(Some("US"), false);
    let locker = strict
        .node
        .create_locker(
            AccountId::new("creator-6"),
            "Strict".to_string(),
            "https://example.com".to_string(),
        )
        .await
        .unwrap();
    assert!(matches!(
        strict.node.open_visit(&locker.id, WINDOWS_UA, None).await,
        Err(LinklockError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_unknown_locker_is_terminal() {
    let h = harness(Some("US"), true);
    let missing = linklock_types::LockerId::new("nope1");
    assert!(matches!(
        h.node.open_visit(&missing, WINDOWS_UA, None).await,
        Err(LinklockError::LockerNotFound(_))
    ));
}
