//! Per-agent session — the context every engine component works against.
//!
//! One session wraps one agent: its mover, its world, its configuration and
//! the few pieces of mutable state that must stay singular per agent (the
//! in-flight activity and the open container). Several sessions can live in
//! the same process without sharing anything.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{MutexGuard, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wayfarer_config::{AppConfig, BusyPolicy};
use wayfarer_core::{
    ContainerHandle, DomainEvent, EventBus, IntentResult, Mover, TaskError, World,
};

/// Holder for the single open container of an agent.
#[derive(Debug, Clone, Default)]
pub struct ContainerSlot {
    inner: Arc<Mutex<Option<ContainerHandle>>>,
}

impl ContainerSlot {
    /// Store a freshly opened container. Fails if one is already held.
    pub fn occupy(&self, handle: ContainerHandle) -> Result<(), TaskError> {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(open) = slot.as_ref() {
            return Err(TaskError::PreconditionUnmet(format!(
                "{open} is still open"
            )));
        }
        *slot = Some(handle);
        Ok(())
    }

    pub fn current(&self) -> Option<ContainerHandle> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Option<ContainerHandle> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Everything a component needs to act for one agent.
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub mover: Arc<dyn Mover>,
    pub world: Arc<dyn World>,
    pub config: Arc<AppConfig>,
    pub events: Arc<EventBus>,
    pub container: ContainerSlot,
}

impl SessionContext {
    pub fn new(mover: Arc<dyn Mover>, world: Arc<dyn World>, config: AppConfig) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            mover,
            world,
            config: Arc::new(config),
            events: Arc::new(EventBus::default()),
            container: ContainerSlot::default(),
        }
    }

    pub fn publish(&self, event: DomainEvent) {
        self.events.publish(event);
    }
}

/// An activity that owns the agent until dropped.
pub(crate) struct Activity<'a> {
    _guard: MutexGuard<'a, ()>,
    pub cancel: CancellationToken,
}

/// The per-agent entry point. Intent operations live in `intents.rs`.
pub struct AgentSession {
    pub(crate) ctx: SessionContext,
    activity: tokio::sync::Mutex<()>,
    current: Mutex<CancellationToken>,
    /// Bumped by every `stop()`; intents queued across a bump give up.
    stops: AtomicU64,
}

impl AgentSession {
    pub fn new(mover: Arc<dyn Mover>, world: Arc<dyn World>, config: AppConfig) -> Self {
        Self::from_context(SessionContext::new(mover, world, config))
    }

    pub fn from_context(ctx: SessionContext) -> Self {
        info!(
            session_id = %ctx.session_id,
            mover = ctx.mover.name(),
            busy_policy = ?ctx.config.session.busy_policy,
            "Agent session created"
        );
        Self {
            ctx,
            activity: tokio::sync::Mutex::new(()),
            current: Mutex::new(CancellationToken::new()),
            stops: AtomicU64::new(0),
        }
    }

    /// Share an existing event bus (e.g. one bus for several sessions).
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.ctx.events = events;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn session_id(&self) -> &str {
        &self.ctx.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.ctx.events.subscribe()
    }

    /// Whether an activity currently holds the agent.
    pub fn is_busy(&self) -> bool {
        self.activity.try_lock().is_err()
    }

    /// Take ownership of the agent for one intent, per the busy policy.
    ///
    /// An intent that was waiting in the queue when `stop()` ran resolves
    /// as cancelled instead of starting.
    pub(crate) async fn begin(&self) -> Result<Activity<'_>, TaskError> {
        let epoch = self.stops.load(Ordering::SeqCst);
        let guard = match self.ctx.config.session.busy_policy {
            BusyPolicy::Queue => self.activity.lock().await,
            BusyPolicy::Reject => self.activity.try_lock().map_err(|_| TaskError::Busy)?,
        };
        if self.stops.load(Ordering::SeqCst) != epoch {
            info!(session_id = %self.ctx.session_id, "Queued intent dropped by stop");
            return Err(TaskError::Cancelled);
        }
        let cancel = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();
        Ok(Activity {
            _guard: guard,
            cancel,
        })
    }

    /// Cancel whatever the agent is doing and release the mover.
    ///
    /// An in-flight pursuit resolves as cancelled and clears its own goal,
    /// and intents still queued behind it are cancelled before they start.
    /// When the agent is idle, any goal left on the mover is cleared here.
    pub fn stop(&self) -> IntentResult {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        let busy = self.is_busy();
        if !busy {
            if let Err(e) = self.ctx.mover.set_goal(None, false) {
                warn!(error = %e, "Failed to clear mover goal on stop");
                return IntentResult::fail(format!("Stop failed: {e}"), "mover_error");
            }
            self.ctx.mover.clear_controls();
        }

        self.ctx.publish(DomainEvent::ActivityCancelled {
            session_id: self.ctx.session_id.clone(),
            timestamp: Utc::now(),
        });
        info!(session_id = %self.ctx.session_id, busy, "Stop requested");

        IntentResult::ok("Stopped moving").with("interrupted_activity", busy)
    }
}
