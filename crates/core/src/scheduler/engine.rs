use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use serde_json::Value;
use tokio::{
    runtime::Handle,
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};

use crate::{
    config::TelemetryConfig,
    delivery::{DeliveryExecutor, DeliveryOutcome},
    events::{EventKind, Metadata, TrackingEvent},
    identity::IdentityManager,
    queues::EventBuffer,
    scheduler::{LifecycleEvent, PageLifecycle, SchedulerBuilder},
};

/// What one flush cycle did with its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing buffered, or no tenant yet.
    Skipped,
    Delivered {
        events: usize,
        attempts: u32,
    },
    /// Delivery gave up for `events` of the snapshot; they went back to the
    /// front of the buffer.
    Requeued {
        events: usize,
        dropped: usize,
        reason: String,
    },
    /// Delivery gave up after the scheduler was dropped.
    Abandoned { events: usize },
}

/// Per-page telemetry engine. Cheap to clone; clones share one buffer, one
/// timer and one lifecycle subscription.
///
/// Outside a tokio runtime the scheduler is inert: `track` and `flush` do
/// nothing and `initialize` only records the tenant.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    config: TelemetryConfig,
    identity: IdentityManager,
    executor: Arc<DeliveryExecutor>,
    lifecycle: PageLifecycle,
    state: Mutex<SchedulerState>,
    in_flight: Mutex<Vec<JoinHandle<FlushOutcome>>>,
}

struct SchedulerState {
    buffer: EventBuffer<TrackingEvent>,
    tenant: Option<String>,
    timer: Option<JoinHandle<()>>,
    lifecycle_listener: Option<JoinHandle<()>>,
}

impl SchedulerInner {
    // A panic elsewhere must not disable telemetry, so poisoning is ignored.
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Vec<JoinHandle<FlushOutcome>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn requeue(&self, batch: Vec<TrackingEvent>) -> usize {
        let mut state = self.lock_state();
        let dropped = state.buffer.requeue_front(batch);
        if dropped > 0 {
            warn!(
                dropped,
                capacity = state.buffer.capacity(),
                "Buffer over capacity after requeue, dropped newest events"
            );
        }
        dropped
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if let Some(listener) = state.lifecycle_listener.take() {
            listener.abort();
        }
    }
}

impl Scheduler {
    pub fn builder(config: TelemetryConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(config)
    }

    /// Expects a validated config, which only the builder guarantees.
    pub(crate) fn new(
        config: TelemetryConfig,
        identity: IdentityManager,
        executor: DeliveryExecutor,
        lifecycle: PageLifecycle,
    ) -> Self {
        let buffer = EventBuffer::new(config.buffer_capacity);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                identity,
                executor: Arc::new(executor),
                lifecycle,
                state: Mutex::new(SchedulerState {
                    buffer,
                    tenant: None,
                    timer: None,
                    lifecycle_listener: None,
                }),
                in_flight: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Set the active tenant. The first call made inside a runtime also starts
    /// the flush timer and subscribes to lifecycle events; later calls only
    /// switch the tenant. Events already buffered keep the tenant they were
    /// tracked under.
    pub fn initialize(&self, tenant: &str) {
        let mut state = self.inner.lock_state();
        state.tenant = (!tenant.is_empty()).then(|| tenant.to_string());

        if state.timer.is_some() {
            debug!(tenant, "Telemetry already running, tenant updated");
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(
                tenant,
                "No async runtime, flush timer deferred until the first tracked event"
            );
            return;
        };

        self.start_background(&mut state, &runtime);
    }

    fn start_background(&self, state: &mut SchedulerState, runtime: &Handle) {
        let owner = Arc::downgrade(&self.inner);
        state.timer = Some(runtime.spawn(flush_timer(
            owner.clone(),
            self.inner.config.flush_interval(),
        )));
        state.lifecycle_listener = Some(
            runtime.spawn(lifecycle_listener(owner, self.inner.lifecycle.subscribe())),
        );

        info!(
            tenant = state.tenant.as_deref().unwrap_or_default(),
            interval_ms = self.inner.config.flush_interval_ms,
            batch_size = self.inner.config.batch_size,
            "Telemetry initialized"
        );
    }

    /// Record one event. Never fails; does nothing before `initialize` or
    /// outside a runtime. If `initialize` ran without a runtime, the first
    /// event tracked inside one starts the timer and lifecycle hooks.
    pub fn track(&self, kind: EventKind, metadata: Option<Metadata>) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let Some(tenant) = self.tenant() else {
            return;
        };

        let event = TrackingEvent::new(
            kind,
            self.inner.identity.session_id(),
            tenant,
            self.inner.identity.guest_id(),
            metadata,
        );

        let flush_due = {
            let mut state = self.inner.lock_state();
            if state.timer.is_none() {
                self.start_background(&mut state, &runtime);
            }
            if let Some(evicted) = state.buffer.push_overwrite(event) {
                debug!(event = %evicted.event, "Buffer full, dropped oldest event");
            }
            state.buffer.len() >= self.inner.config.batch_size
        };

        if flush_due {
            self.flush();
        }
    }

    /// Like [`Scheduler::track`] with caller-defined metadata. Metadata that
    /// fails to serialize, or is not a JSON object, drops this event only.
    pub fn track_with(&self, kind: EventKind, metadata: &dyn erased_serde::Serialize) {
        if !self.is_active() {
            return;
        }

        match serde_json::to_value(metadata) {
            Ok(Value::Object(map)) => self.track(kind, Some(map)),
            Ok(Value::Null) => self.track(kind, None),
            Ok(other) => debug!(event = %kind, "Discarding event, metadata is not an object: {other}"),
            Err(e) => debug!(event = %kind, "Discarding event, metadata failed to serialize: {e}"),
        }
    }

    /// Start delivering whatever is buffered. The live buffer is cleared
    /// before the request goes out, so events tracked meanwhile land in a
    /// fresh batch.
    pub fn flush(&self) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let Some(batch) = self.take_snapshot() else {
            return;
        };

        let task = runtime.spawn(run_flush(
            Arc::clone(&self.inner.executor),
            Arc::downgrade(&self.inner),
            batch,
        ));

        let mut in_flight = self.inner.lock_in_flight();
        in_flight.retain(|task| !task.is_finished());
        in_flight.push(task);
    }

    /// One full flush cycle, awaited inline.
    pub async fn flush_now(&self) -> FlushOutcome {
        let Some(batch) = self.take_snapshot() else {
            return FlushOutcome::Skipped;
        };
        run_flush(
            Arc::clone(&self.inner.executor),
            Arc::downgrade(&self.inner),
            batch,
        )
        .await
    }

    /// Wait for every background flush, including ones started while
    /// waiting, and return what they did.
    pub async fn drain(&self) -> Vec<FlushOutcome> {
        let mut outcomes = Vec::new();
        loop {
            // Let lifecycle and timer tasks that were just woken schedule their flush.
            tokio::task::yield_now().await;

            let pending = mem::take(&mut *self.inner.lock_in_flight());
            if pending.is_empty() {
                return outcomes;
            }

            for task in pending {
                match task.await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => debug!("Flush task did not complete: {e}"),
                }
            }
        }
    }

    fn take_snapshot(&self) -> Option<Vec<TrackingEvent>> {
        let mut state = self.inner.lock_state();
        if state.buffer.is_empty() || state.tenant.is_none() {
            return None;
        }
        Some(state.buffer.take_all())
    }

    fn is_active(&self) -> bool {
        Handle::try_current().is_ok() && self.inner.lock_state().tenant.is_some()
    }

    pub fn tenant(&self) -> Option<String> {
        self.inner.lock_state().tenant.clone()
    }

    /// Whether the flush timer has been started.
    pub fn is_running(&self) -> bool {
        self.inner.lock_state().timer.is_some()
    }

    pub fn buffered_len(&self) -> usize {
        self.inner.lock_state().buffer.len()
    }

    /// Copy of the buffered events in delivery order.
    pub fn pending_events(&self) -> Vec<TrackingEvent> {
        self.inner.lock_state().buffer.iter().cloned().collect()
    }

    pub fn identity(&self) -> &IdentityManager {
        &self.inner.identity
    }

    pub fn lifecycle(&self) -> &PageLifecycle {
        &self.inner.lifecycle
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }
}

/// Delivers a snapshot one tenant run at a time, so every event reaches the
/// collector of the tenant it was tracked under. Runs that exhaust their
/// retries are requeued together in their original order.
async fn run_flush(
    executor: Arc<DeliveryExecutor>,
    owner: Weak<SchedulerInner>,
    batch: Vec<TrackingEvent>,
) -> FlushOutcome {
    let total = batch.len();
    let mut attempts = 0;
    let mut unsent = Vec::new();
    let mut reason = None;

    for (tenant, run) in split_by_tenant(batch) {
        debug!(tenant, events = run.len(), "Flushing batch");
        match executor.deliver(&tenant, run).await {
            DeliveryOutcome::Delivered { attempts: used } => attempts = attempts.max(used),
            DeliveryOutcome::Failed {
                batch, last_error, ..
            } => {
                unsent.extend(batch);
                reason = Some(last_error.to_string());
            }
        }
    }

    let Some(reason) = reason else {
        return FlushOutcome::Delivered {
            events: total,
            attempts,
        };
    };

    let events = unsent.len();
    let Some(inner) = owner.upgrade() else {
        debug!(events, "Scheduler gone, unsent batch discarded");
        return FlushOutcome::Abandoned { events };
    };
    let dropped = inner.requeue(unsent);
    FlushOutcome::Requeued {
        events,
        dropped,
        reason,
    }
}

fn split_by_tenant(batch: Vec<TrackingEvent>) -> Vec<(String, Vec<TrackingEvent>)> {
    let mut runs: Vec<(String, Vec<TrackingEvent>)> = Vec::new();
    for event in batch {
        match runs.last_mut() {
            Some((tenant, run)) if *tenant == event.tenant_id => run.push(event),
            _ => runs.push((event.tenant_id.clone(), vec![event])),
        }
    }
    runs
}

async fn flush_timer(owner: Weak<SchedulerInner>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = owner.upgrade() else {
            return;
        };
        Scheduler { inner }.flush();
    }
}

async fn lifecycle_listener(
    owner: Weak<SchedulerInner>,
    mut events: broadcast::Receiver<LifecycleEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Lifecycle listener lagged, flushing");
                LifecycleEvent::Unload
            }
            Err(RecvError::Closed) => return,
        };

        if !event.triggers_flush() {
            continue;
        }

        let Some(inner) = owner.upgrade() else {
            return;
        };
        debug!(?event, "Lifecycle flush");
        Scheduler { inner }.flush();
    }
}
