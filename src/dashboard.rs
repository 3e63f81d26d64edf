// Dashboard service: fetch every collection, scan task reminders, compute
// analytics. Also the per-kind list views and the background refresh poller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::analytics::{compute_analytics, AnalyticsSnapshot};
use crate::api::{ApiError, CrmBackend};
use crate::notes::fetch_all_notes;
use crate::notification::NotificationDraft;
use crate::record::{Record, RecordKind};
use crate::reminders::ReminderSession;
use crate::state::AppState;

/// Every record list of one fetch cycle; the assistant view reads from here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardContext {
    pub leads: Vec<Record>,
    pub accounts: Vec<Record>,
    pub opportunities: Vec<Record>,
    pub tasks: Vec<Record>,
    pub notes: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub analytics: AnalyticsSnapshot,
    pub context: DashboardContext,
    /// Reminders raised by this cycle's task scan.
    pub reminders: Vec<NotificationDraft>,
    pub fetched_at: DateTime<Utc>,
}

/// Result type for dashboard data loading
#[derive(Debug, Serialize)]
#[allow(clippy::large_enum_variant)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DashboardResult {
    Success { data: DashboardData },
    Error { message: String },
}

/// Records of one list view plus any reminders its task scan raised.
#[derive(Debug, Clone, Serialize)]
pub struct ViewData {
    pub kind: RecordKind,
    pub records: Vec<Record>,
    pub reminders: Vec<NotificationDraft>,
}

/// Fetch all five collections concurrently.
///
/// A failing primary collection fails the whole fetch; notes are aggregated
/// separately and degrade to empty.
pub async fn fetch_dashboard(backend: &dyn CrmBackend) -> Result<DashboardContext, ApiError> {
    let (leads, accounts, opportunities, tasks, notes) = tokio::join!(
        backend.list(RecordKind::Lead),
        backend.list(RecordKind::Account),
        backend.list(RecordKind::Opportunity),
        backend.list(RecordKind::Task),
        fetch_all_notes(backend),
    );

    Ok(DashboardContext {
        leads: leads?,
        accounts: accounts?,
        opportunities: opportunities?,
        tasks: tasks?,
        notes,
    })
}

/// Scan reminders and compute analytics for a fetched context.
pub fn build_dashboard(
    context: DashboardContext,
    reminders: &mut ReminderSession,
    now: DateTime<Utc>,
) -> DashboardData {
    let raised = reminders.scan(&context.tasks, now);
    let analytics = compute_analytics(
        &context.leads,
        &context.accounts,
        &context.opportunities,
        &context.tasks,
        &context.notes,
    );
    DashboardData {
        analytics,
        context,
        reminders: raised,
        fetched_at: now,
    }
}

pub async fn load_dashboard(
    backend: &dyn CrmBackend,
    reminders: &mut ReminderSession,
) -> DashboardResult {
    match fetch_dashboard(backend).await {
        Ok(context) => DashboardResult::Success {
            data: build_dashboard(context, reminders, Utc::now()),
        },
        Err(e) => {
            log::warn!("Dashboard fetch failed: {}", e);
            DashboardResult::Error {
                message: e.to_string(),
            }
        }
    }
}

/// Load one list view. Notes come from the per-account aggregation; tasks
/// are also scanned for reminders.
pub async fn load_view(
    backend: &dyn CrmBackend,
    kind: RecordKind,
    reminders: &mut ReminderSession,
) -> Result<ViewData, ApiError> {
    let records = match kind {
        RecordKind::Note => fetch_all_notes(backend).await,
        _ => backend.list(kind).await?,
    };
    let raised = if kind == RecordKind::Task {
        reminders.scan(&records, Utc::now())
    } else {
        Vec::new()
    };
    Ok(ViewData {
        kind,
        records,
        reminders: raised,
    })
}

// ---------------------------------------------------------------------------
// Refresh cycles
// ---------------------------------------------------------------------------

/// Handle for one in-flight refresh.
#[derive(Debug, Clone)]
pub struct RefreshCycle {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Hands out refresh cycles. Starting a cycle cancels the previous one, and
/// only the latest cycle may apply its result.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    generation: AtomicU64,
    current: Mutex<CancellationToken>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RefreshCycle {
        let mut current = self.current.lock();
        current.cancel();
        let token = CancellationToken::new();
        *current = token.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RefreshCycle { generation, token }
    }

    /// Drop whatever is in flight, e.g. when the active view changes.
    pub fn cancel_all(&self) {
        let current = self.current.lock();
        current.cancel();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, cycle: &RefreshCycle) -> bool {
        !cycle.token.is_cancelled() && self.generation.load(Ordering::SeqCst) == cycle.generation
    }
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Applied,
    Superseded,
    Failed(ApiError),
}

/// Run one refresh cycle and apply it to `state` unless it was superseded.
pub async fn refresh_dashboard(state: &AppState, backend: &dyn CrmBackend) -> RefreshOutcome {
    let cycle = state.refresh.begin();

    let fetched = tokio::select! {
        _ = cycle.token.cancelled() => return RefreshOutcome::Superseded,
        fetched = fetch_dashboard(backend) => fetched,
    };

    if !state.refresh.is_current(&cycle) {
        log::debug!("Dashboard refresh {} superseded, dropping result", cycle.generation);
        return RefreshOutcome::Superseded;
    }

    match fetched {
        Ok(context) => {
            let data = build_dashboard(context, &mut state.reminders.lock(), Utc::now());
            if !data.reminders.is_empty() {
                if let Err(e) = state.notifications.lock().add_all(data.reminders.clone()) {
                    log::warn!("Failed to persist reminders: {}", e);
                }
            }
            *state.last_error.write() = None;
            *state.dashboard.write() = Some(data);
            RefreshOutcome::Applied
        }
        Err(e) => {
            log::warn!("Dashboard refresh failed: {}", e);
            *state.last_error.write() = Some(e.to_string());
            RefreshOutcome::Failed(e)
        }
    }
}

/// Background dashboard refresh (every `pollIntervalSecs`, default 10s).
///
/// Runs until `shutdown` fires. A manual wake through
/// `state.dashboard_wake` refreshes immediately.
pub async fn run_dashboard_poller(
    state: Arc<AppState>,
    backend: Arc<dyn CrmBackend>,
    shutdown: CancellationToken,
) {
    loop {
        match refresh_dashboard(&state, backend.as_ref()).await {
            RefreshOutcome::Applied => log::debug!("Dashboard poller: refreshed"),
            RefreshOutcome::Superseded => log::debug!("Dashboard poller: cycle superseded"),
            RefreshOutcome::Failed(e) => log::warn!("Dashboard poller: {}", e),
        }

        let interval = state.config.read().poll_interval();
        tokio::select! {
            _ = shutdown.cancelled() => {
                state.refresh.cancel_all();
                log::info!("Dashboard poller: stopped");
                break;
            }
            _ = tokio::time::sleep(interval) => {},
            _ = state.dashboard_wake.notified() => {
                log::info!("Dashboard poller: woken by manual refresh");
            },
        }
    }
}
