use crate::config::NodeConfig;
use crate::events::{EventBus, LockerEvent};
use crate::geo::{GeoLocator, HttpGeoLocator};
use crate::metrics::Metrics;
use anyhow::Result as AnyResult;
use chrono::Utc;
use linklock_economics::{AttributionEngine, LedgerStorage, MemoryLedger};
use linklock_gate::{
    classify, eligible_tasks, ClickOutcome, DwellFired, DwellScheduler, GateManager, UnlockOutcome,
};
use linklock_storage::{
    AnalyticsEvent, AnalyticsStore, LockerStore, MemoryAnalytics, MemoryCatalog, MemoryLockerStore,
    TaskCatalog, TaskDraft,
};
use linklock_types::{
    AccountId, AdTask, Device, LinklockError, Locker, LockerId, Result, TaskId, TaskState, Tier,
    UsdMicros, VisitId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the gate UI needs to render a visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitOverview {
    pub visit_id: VisitId,
    pub locker_id: LockerId,
    pub locker_title: String,
    pub device: Device,
    pub tier: Tier,
    pub tasks: Vec<GateTaskView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateTaskView {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub state: TaskState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub unlocked: bool,
    pub destination_url: Option<String>,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStats {
    pub name: String,
    pub open_visits: usize,
    pub analytics_events: usize,
    pub dwell_secs: u64,
}

/// The assembled gating and attribution service.
#[derive(Clone)]
pub struct LockerNode {
    config: NodeConfig,
    catalog: Arc<dyn TaskCatalog>,
    lockers: Arc<dyn LockerStore>,
    attribution: Arc<AttributionEngine>,
    gate: Arc<GateManager>,
    scheduler: DwellScheduler,
    completions: Arc<Mutex<Option<mpsc::Receiver<DwellFired>>>>,
    analytics: Arc<dyn AnalyticsStore>,
    geo: Arc<dyn GeoLocator>,
    pub events: EventBus,
    pub metrics: Metrics,
}

impl LockerNode {
    /// Builds a node over in-memory stores and the HTTP geolocator.
    pub fn new(config: NodeConfig) -> AnyResult<Self> {
        let geo: Arc<dyn GeoLocator> = Arc::new(HttpGeoLocator::new(&config.geo)?);
        Ok(Self::with_stores(
            config,
            Arc::new(MemoryCatalog::new()),
            Arc::new(MemoryLockerStore::new()),
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryAnalytics::new()),
            geo,
        ))
    }

    /// Wires the node from caller-supplied collaborators. Tests inject
    /// static geolocation and pre-seeded stores through this path.
    pub fn with_stores(
        config: NodeConfig,
        catalog: Arc<dyn TaskCatalog>,
        lockers: Arc<dyn LockerStore>,
        ledger: Arc<dyn LedgerStorage>,
        analytics: Arc<dyn AnalyticsStore>,
        geo: Arc<dyn GeoLocator>,
    ) -> Self {
        let attribution = Arc::new(AttributionEngine::new(
            ledger,
            lockers.clone(),
            catalog.clone(),
        ));
        let (scheduler, completions) =
            DwellScheduler::new(Duration::from_secs(config.gate.dwell_secs));

        Self {
            config,
            catalog,
            lockers,
            attribution,
            gate: Arc::new(GateManager::new()),
            scheduler,
            completions: Arc::new(Mutex::new(Some(completions))),
            analytics,
            geo,
            events: EventBus::new(),
            metrics: Metrics::new(),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn catalog(&self) -> Arc<dyn TaskCatalog> {
        self.catalog.clone()
    }

    /// Drains dwell fires: idempotent completion, then attribution.
    /// Call once at startup.
    pub fn start_completion_worker(&self) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let mut rx = {
                let mut slot = node.completions.lock().await;
                match slot.take() {
                    Some(rx) => rx,
                    None => {
                        warn!("Completion worker already running");
                        return;
                    }
                }
            };

            info!("Completion worker started");
            while let Some(fired) = rx.recv().await {
                node.handle_dwell_fired(fired).await;
            }
            info!("Completion worker stopped");
        })
    }

    pub async fn create_locker(
        &self,
        owner: AccountId,
        title: String,
        destination_url: String,
    ) -> Result<Locker> {
        if destination_url.trim().is_empty() {
            return Err(LinklockError::InvalidParameter(
                "destination_url must not be empty".to_string(),
            ));
        }
        self.lockers.create(owner, title, destination_url).await
    }

    pub async fn get_locker(&self, id: &LockerId) -> Result<Locker> {
        self.lockers
            .get(id)
            .await?
            .ok_or_else(|| LinklockError::LockerNotFound(id.to_string()))
    }

    pub async fn lockers_for_owner(&self, owner: &AccountId) -> Result<Vec<Locker>> {
        self.lockers.list_for_owner(owner).await
    }

    pub async fn insert_task(&self, draft: TaskDraft) -> Result<AdTask> {
        self.catalog.insert(draft).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<AdTask>> {
        self.catalog.list().await
    }

    pub async fn balance(&self, account: &AccountId) -> Result<UsdMicros> {
        self.attribution.balances().get_balance(account).await
    }

    pub async fn revenue_history(
        &self,
        account: &AccountId,
    ) -> Result<Vec<linklock_economics::RevenueEvent>> {
        self.attribution.balances().revenue_history(account).await
    }

    /// Resolves the visitor's country, tolerating lookup failure.
    async fn resolve_country(&self, ip: Option<&str>) -> String {
        let fallback = &self.config.geo.fallback_country;
        let Some(ip) = ip.filter(|ip| !ip.trim().is_empty()) else {
            return fallback.clone();
        };
        match self.geo.lookup(ip).await {
            Ok(country) => country,
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = %fallback,
                    "🌍 Geolocation lookup failed; using fallback country"
                );
                fallback.clone()
            }
        }
    }

    /// Opens a visit against a locker: classify the visitor, filter the
    /// catalog, create the gate session, record the visit event.
    pub async fn open_visit(
        &self,
        locker_id: &LockerId,
        user_agent: &str,
        ip: Option<&str>,
    ) -> Result<VisitOverview> {
        // Locker-not-found is the one terminal, visitor-visible error.
        let locker = self.get_locker(locker_id).await?;

        let country = self.resolve_country(ip).await;
        let (device, tier) = classify(user_agent, &country);

        let catalog = self.catalog.list().await?;
        let gate_tasks = eligible_tasks(&catalog, device, tier);

        if gate_tasks.is_empty() && !self.config.gate.allow_empty_gate {
            return Err(LinklockError::Configuration(format!(
                "No eligible tasks for device {} in tier {}",
                device, tier
            )));
        }

        let session = self
            .gate
            .open_visit(locker.id.clone(), device, country.clone(), tier, &gate_tasks)
            .await;

        // Telemetry is best-effort; a failed append never fails the visit.
        if let Err(e) = self
            .analytics
            .append(AnalyticsEvent::visit(
                locker.id.clone(),
                session.visit_id.clone(),
                country,
                tier,
            ))
            .await
        {
            warn!(error = %e, "Failed to append visit event");
        }

        self.metrics.visits_opened.inc();
        self.metrics.open_visits.inc();
        self.events.emit(LockerEvent::VisitOpened {
            locker_id: locker.id.to_string(),
            visit_id: session.visit_id.to_string(),
            device: device.to_string(),
            tier: tier.to_string(),
            gate_size: session.total(),
            timestamp: Utc::now(),
        });

        Ok(VisitOverview {
            visit_id: session.visit_id,
            locker_id: locker.id,
            locker_title: locker.title,
            device,
            tier,
            tasks: session
                .gate
                .iter()
                .map(|e| GateTaskView {
                    task_id: e.task_id.clone(),
                    title: e.title.clone(),
                    description: e.description.clone(),
                    state: e.state,
                })
                .collect(),
        })
    }

    /// Visitor click on a gated task. On the first click the task enters
    /// InProgress and its dwell timer is scheduled; the returned ad URL is
    /// opened by the caller.
    pub async fn click_task(&self, visit_id: &VisitId, task_id: &TaskId) -> Result<ClickOutcome> {
        let session = self
            .gate
            .get(visit_id)
            .await
            .ok_or_else(|| LinklockError::VisitNotFound(visit_id.to_string()))?;

        let outcome = self.gate.click_task(visit_id, task_id).await?;

        if let ClickOutcome::Started { .. } = outcome {
            self.scheduler.schedule(DwellFired {
                visit_id: visit_id.clone(),
                locker_id: session.locker_id.clone(),
                task_id: task_id.clone(),
                country: session.country.clone(),
                tier: session.tier,
            });

            self.metrics.tasks_started.inc();
            self.events.emit(LockerEvent::TaskStarted {
                visit_id: visit_id.to_string(),
                task_id: task_id.to_string(),
                timestamp: Utc::now(),
            });
        }

        Ok(outcome)
    }

    async fn handle_dwell_fired(&self, fired: DwellFired) {
        match self.gate.complete_task(&fired.visit_id, &fired.task_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    visit_id = %fired.visit_id,
                    task_id = %fired.task_id,
                    "Dwell fire ignored; task already settled"
                );
                return;
            }
            Err(e) => {
                // The visit was abandoned before the dwell elapsed.
                debug!(
                    visit_id = %fired.visit_id,
                    task_id = %fired.task_id,
                    error = %e,
                    "Dwell fire for a closed visit"
                );
                return;
            }
        }

        self.metrics.tasks_completed.inc();
        self.events.emit(LockerEvent::TaskCompleted {
            visit_id: fired.visit_id.to_string(),
            task_id: fired.task_id.to_string(),
            timestamp: Utc::now(),
        });

        match self
            .attribution
            .attribute(
                &fired.visit_id,
                &fired.locker_id,
                &fired.task_id,
                &fired.country,
                fired.tier,
            )
            .await
        {
            Ok(Some(event)) => {
                self.metrics.attributions_total.inc();
                self.metrics
                    .revenue_micros_total
                    .inc_by(event.amount.to_micros());

                if let Err(e) = self
                    .analytics
                    .append(AnalyticsEvent::task_complete(
                        fired.locker_id.clone(),
                        fired.visit_id.clone(),
                        fired.task_id.clone(),
                        fired.country.clone(),
                        fired.tier,
                    ))
                    .await
                {
                    warn!(error = %e, "Failed to append task_complete event");
                }

                self.events.emit(LockerEvent::RevenueAttributed {
                    owner: event.owner.to_string(),
                    locker_id: event.locker_id.to_string(),
                    task_id: event.task_id.to_string(),
                    amount_usd: event.amount.to_usd(),
                    tier: event.tier.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Ok(None) => {
                debug!(
                    visit_id = %fired.visit_id,
                    task_id = %fired.task_id,
                    "Attribution already credited"
                );
            }
            Err(e) => {
                // Abort this single attribution; the visit itself and the
                // other tasks are unaffected.
                warn!(
                    visit_id = %fired.visit_id,
                    task_id = %fired.task_id,
                    error = %e,
                    "Attribution aborted"
                );
                self.metrics.attribution_failures.inc();
            }
        }
    }

    /// Visitor-triggered unlock. Returns the destination only when every
    /// gated task completed; otherwise reports progress and stays locked.
    pub async fn unlock(&self, visit_id: &VisitId) -> Result<UnlockResponse> {
        let session = self
            .gate
            .get(visit_id)
            .await
            .ok_or_else(|| LinklockError::VisitNotFound(visit_id.to_string()))?;

        match self.gate.try_unlock(visit_id).await? {
            UnlockOutcome::Unlocked { duration_ms } => {
                let locker = self.get_locker(&session.locker_id).await?;

                if let Err(e) = self
                    .analytics
                    .append(AnalyticsEvent::unlock(
                        locker.id.clone(),
                        visit_id.clone(),
                        duration_ms,
                    ))
                    .await
                {
                    warn!(error = %e, "Failed to append unlock event");
                }

                self.metrics.visits_unlocked.inc();
                self.events.emit(LockerEvent::VisitUnlocked {
                    locker_id: locker.id.to_string(),
                    visit_id: visit_id.to_string(),
                    duration_ms,
                    timestamp: Utc::now(),
                });

                Ok(UnlockResponse {
                    unlocked: true,
                    destination_url: Some(locker.destination_url),
                    completed: session.total(),
                    total: session.total(),
                })
            }
            UnlockOutcome::StillLocked { completed, total } => Ok(UnlockResponse {
                unlocked: false,
                destination_url: None,
                completed,
                total,
            }),
        }
    }

    /// Visit ended before unlock. Best-effort: unknown visits are ignored.
    pub async fn dropoff(&self, visit_id: &VisitId) -> Result<()> {
        let session = match self.gate.get(visit_id).await {
            Some(session) => session,
            None => return Ok(()),
        };

        let removed = self.gate.abandon(visit_id).await;
        self.metrics.open_visits.dec();
        let Some(drop) = removed else {
            // Already unlocked; the redirect was terminal, no dropoff.
            return Ok(());
        };
        self.metrics.visits_dropped.inc();

        if let Err(e) = self
            .analytics
            .append(AnalyticsEvent::dropoff(
                session.locker_id.clone(),
                visit_id.clone(),
                drop.completed_tasks,
            ))
            .await
        {
            warn!(error = %e, "Failed to append dropoff event");
        }

        self.events.emit(LockerEvent::VisitDropped {
            locker_id: session.locker_id.to_string(),
            visit_id: visit_id.to_string(),
            completed_tasks: drop.completed_tasks,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub async fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.config.node.name.clone(),
            open_visits: self.gate.open_count().await,
            analytics_events: self.analytics.count().await.unwrap_or(0),
            dwell_secs: self.config.gate.dwell_secs,
        }
    }
}
