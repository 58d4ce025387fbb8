//! The Action Supervisor.
//!
//! Holds the one "current action" slot.  Every [`dispatch`] first cancels the
//! action in the slot and waits until it, and every watcher it spawned, has
//! terminated; only then does the next action start.  `dispatch` takes
//! `&mut self`, so there is exactly one writer of the slot.
//!
//! [`dispatch`]: ActionSupervisor::dispatch

use std::sync::Arc;
use std::time::Duration;

use rover_hal::{Drive, ObstacleSensor, RoutePlanner};
use rover_middleware::TelemetrySink;
use rover_types::{Command, RoverError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::action::{self, ActionContext, ActionState, join_bounded};
use crate::stats::SupervisorStats;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// The robot's capabilities as seen by actions.
#[derive(Clone)]
pub struct Capabilities {
    pub drive: Arc<dyn Drive>,
    /// Hazard check for free forward motion.
    pub obstacles: Arc<dyn ObstacleSensor>,
    /// Hazard check while following a planned route.  Should only see
    /// unmapped objects: the planner has already routed around the walls.
    pub route_obstacles: Arc<dyn ObstacleSensor>,
    pub planner: Arc<dyn RoutePlanner>,
}

/// Timing and policy knobs of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupervisorConfig {
    /// Period of the position ticker.
    pub tick_interval: Duration,
    /// Period of the obstacle watcher.
    pub watch_poll: Duration,
    /// How long `dispatch` waits for a cancelled action before forcing it.
    pub join_timeout: Duration,
    /// Run the obstacle watcher during navigation too.
    pub navigate_obstacle_watch: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            watch_poll: Duration::from_millis(5),
            join_timeout: Duration::from_secs(2),
            navigate_obstacle_watch: true,
        }
    }
}

/// What `dispatch` did with a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A motion action is running in the background.
    Running(Uuid),
    /// The action reached a terminal state before `dispatch` returned.
    Finished { id: Uuid, state: ActionState },
    /// Stop: the previous action, if any, has ended and nothing new started.
    Idle,
    /// End of program: everything is stopped and the session should close.
    Shutdown,
}

struct ActiveAction {
    id: Uuid,
    command: Command,
    token: CancellationToken,
    /// Stops the action's watchers.
    watch_token: CancellationToken,
    /// Yields `None` once every watcher of the action has exited.
    watchers_released: mpsc::Receiver<()>,
    task: JoinHandle<ActionState>,
}

// ────────────────────────────────────────────────────────────────────────────
// ActionSupervisor
// ────────────────────────────────────────────────────────────────────────────

pub struct ActionSupervisor {
    caps: Capabilities,
    sink: Arc<TelemetrySink>,
    config: SupervisorConfig,
    stats: Arc<SupervisorStats>,
    root: CancellationToken,
    active: Option<ActiveAction>,
}

impl ActionSupervisor {
    pub fn new(caps: Capabilities, sink: Arc<TelemetrySink>, config: SupervisorConfig) -> Self {
        Self {
            caps,
            sink,
            config,
            stats: Arc::new(SupervisorStats::new()),
            root: CancellationToken::new(),
            active: None,
        }
    }

    /// Derive every action token from `token`, so cancelling it (for
    /// example on Ctrl-C) cancels whatever is running.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.root = token;
        self
    }

    pub fn stats(&self) -> Arc<SupervisorStats> {
        Arc::clone(&self.stats)
    }

    /// The command of the action still running, if any.
    pub fn active_command(&self) -> Option<&Command> {
        self.active
            .as_ref()
            .filter(|a| !a.task.is_finished())
            .map(|a| &a.command)
    }

    pub fn is_idle(&self) -> bool {
        self.active_command().is_none()
    }

    /// Request cooperative termination of the running action.
    ///
    /// Does not wait; the next `dispatch` or [`shutdown`](Self::shutdown)
    /// joins it.
    pub fn cancel_active(&self) {
        if let Some(active) = &self.active {
            debug!(action = %active.id, "cancelling active action");
            active.token.cancel();
        }
    }

    /// End the running action, then start one for `command`.
    ///
    /// Navigate runs to completion (or cancellation) before this returns;
    /// the other motions return as soon as they are under way.
    #[instrument(skip(self, command), fields(command = command.label()))]
    pub async fn dispatch(&mut self, command: Command) -> DispatchOutcome {
        self.finish_active().await;

        match command {
            Command::Stop => DispatchOutcome::Idle,
            Command::Shutdown => {
                self.stop_drive().await;
                DispatchOutcome::Shutdown
            }
            Command::Navigate(_) => {
                let active = self.start(command);
                let id = active.id;
                let state = self.run_to_end(active).await;
                DispatchOutcome::Finished { id, state }
            }
            Command::MoveForward if self.path_blocked() => {
                let id = Uuid::new_v4();
                info!(action = %id, "obstacle ahead; forward motion not started");
                self.stats.action_started();
                self.stats.action_finished(&ActionState::Cancelled);
                DispatchOutcome::Finished {
                    id,
                    state: ActionState::Cancelled,
                }
            }
            motion => {
                let active = self.start(motion);
                let id = active.id;
                self.active = Some(active);
                DispatchOutcome::Running(id)
            }
        }
    }

    /// Cancel and join the running action, then stop the drive.
    pub async fn shutdown(&mut self) {
        self.finish_active().await;
        self.stop_drive().await;
        let s = self.stats.snapshot();
        info!(
            started = s.started,
            completed = s.completed,
            cancelled = s.cancelled,
            failed = s.failed,
            join_timeouts = s.join_timeouts,
            "supervisor shut down"
        );
    }

    fn path_blocked(&self) -> bool {
        match self.caps.obstacles.is_obstacle_ahead() {
            Ok(blocked) => blocked,
            Err(e) => {
                warn!(error = %e, "obstacle pre-check failed; treating as blocked");
                true
            }
        }
    }

    fn start(&self, command: Command) -> ActiveAction {
        let id = Uuid::new_v4();
        let token = self.root.child_token();
        // Not a child of `token`: the ticker keeps reporting while a
        // cancelled action brings the drive to rest.
        let watch_token = CancellationToken::new();
        let (released, watchers_released) = mpsc::channel(1);
        let ctx = ActionContext {
            id,
            caps: self.caps.clone(),
            sink: Arc::clone(&self.sink),
            stats: Arc::clone(&self.stats),
            config: self.config,
            token: token.clone(),
            watch_token: watch_token.clone(),
            released,
        };
        debug!(action = %id, command = command.label(), state = %ActionState::Created, "action created");
        self.stats.action_started();
        let task = tokio::spawn(action::run(ctx, command.clone()));
        ActiveAction {
            id,
            command,
            token,
            watch_token,
            watchers_released,
            task,
        }
    }

    /// Wait for a blocking action.  If the session is torn down meanwhile,
    /// fall back to the bounded join.
    async fn run_to_end(&self, mut active: ActiveAction) -> ActionState {
        tokio::select! {
            joined = &mut active.task => match joined {
                Ok(state) => state,
                Err(e) => {
                    error!(action = %active.id, error = %e, "action task panicked");
                    ActionState::Failed(e.to_string())
                }
            },
            _ = self.root.cancelled() => self.reap(active).await,
        }
    }

    async fn finish_active(&mut self) {
        if let Some(active) = self.active.take() {
            let id = active.id;
            let state = self.reap(active).await;
            debug!(action = %id, state = %state, "previous action joined");
        }
    }

    /// Cancel `active` and wait for it, bounded by the join timeout.  On
    /// timeout the drive is stopped directly, the task aborted and its
    /// orphaned watchers stopped.
    async fn reap(&self, mut active: ActiveAction) -> ActionState {
        active.token.cancel();
        if let Some(state) = join_bounded(&mut active.task, self.config.join_timeout).await {
            return state;
        }

        let err = RoverError::JoinTimeout {
            action: active.id.to_string(),
            timeout: self.config.join_timeout,
        };
        error!(
            action = %active.id,
            command = active.command.label(),
            error = %err,
            "forcing drive stop and aborting action"
        );
        self.stats.join_timeout();
        self.stop_drive().await;
        active.task.abort();
        // Resolves once the aborted body, and its running guard, are dropped.
        let _ = (&mut active.task).await;
        self.stats.action_finished(&ActionState::Cancelled);
        self.release_watchers(active).await;
        ActionState::Cancelled
    }

    /// Stop the watchers an aborted action left behind and wait for them,
    /// again bounded by the join timeout.
    async fn release_watchers(&self, mut active: ActiveAction) {
        active.watch_token.cancel();
        let released = active.watchers_released.recv();
        if tokio::time::timeout(self.config.join_timeout, released).await.is_err() {
            warn!(action = %active.id, "watchers of the aborted action are still running");
        }
    }

    async fn stop_drive(&self) {
        if let Err(e) = self.caps.drive.stop().await {
            error!(error = %e, "drive stop failed");
        }
    }
}
