//! Tokio runtime adapter
//!
//! [`EngineDriver`] owns a [`CycleEngine`] on its own task and serialises
//! everything that touches it: timer firings from [`TokioClock`], commands
//! from any number of [`EngineHandle`] clones, and storage-sync signals
//! bridged from an event bus. Every change is published on a `watch`
//! channel of [`CycleState`] snapshots.
//!
//! The driver stops on [`EngineHandle::shutdown`] or once every handle is
//! dropped. Bus bridges hold only a weak sender and are unsubscribed on
//! exit, so they never keep a driver alive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::clock::{Clock, TimerId};
use crate::cycle::engine::CycleEngine;
use crate::cycle::kind::CycleType;
use crate::cycle::state::{CycleState, Notice};
use crate::error::EngineError;
use crate::events::{Channel, Event, EventBus, SubscriptionId};

const COMMAND_BUFFER: usize = 64;

/// Wall clock whose timers are tokio interval tasks.
///
/// Firings are sent on the receiver returned by [`TokioClock::new`]; hand it
/// to [`EngineDriver::new`]. Timers can only be scheduled from inside a
/// tokio runtime.
pub struct TokioClock {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TimerId, JoinHandle<()>>>,
    ticks: mpsc::UnboundedSender<TimerId>,
}

impl TokioClock {
    /// Create the clock and the receiving end of its firings
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (ticks, rx) = mpsc::unbounded_channel();
        let clock = Self {
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
            ticks,
        };
        (clock, rx)
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule_periodic(&self, interval: Duration) -> TimerId {
        let id = TimerId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let period = interval.max(Duration::from_millis(1));
        let ticks = self.ticks.clone();

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                timer.tick().await;
                if ticks.send(id).is_err() {
                    break;
                }
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(id, task);
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        let task = self.tasks.lock().ok().and_then(|mut tasks| tasks.remove(&id));
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for TokioClock {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Start(Reply<Result<(), EngineError>>),
    Pause(Reply<Result<(), EngineError>>),
    Skip(Reply<Result<(), EngineError>>),
    Reset(Reply<()>),
    SetCycleType(CycleType, Reply<()>),
    Select(Option<String>, Reply<()>),
    CloseCelebration(Reply<()>),
    SetMaxFocus(bool, Reply<()>),
    Revalidate(Reply<()>),
    TakeNotices(Reply<Vec<Notice>>),
    StorageChanged(String),
    Shutdown,
}

/// Event loop that owns the engine
pub struct EngineDriver {
    engine: CycleEngine,
    ticks: mpsc::UnboundedReceiver<TimerId>,
    commands: mpsc::Receiver<Command>,
    sync: mpsc::WeakSender<Command>,
    bridges: Vec<(Arc<dyn EventBus>, SubscriptionId)>,
    state: watch::Sender<CycleState>,
}

impl EngineDriver {
    /// Wrap `engine`, whose clock delivers firings on `ticks`
    #[must_use]
    pub fn new(engine: CycleEngine, ticks: mpsc::UnboundedReceiver<TimerId>) -> (Self, EngineHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (state, state_rx) = watch::channel(engine.snapshot());
        let driver = Self {
            engine,
            ticks,
            commands,
            sync: command_tx.downgrade(),
            bridges: Vec::new(),
            state,
        };
        let handle = EngineHandle {
            commands: command_tx,
            state: state_rx,
        };
        (driver, handle)
    }

    /// Forward storage-sync events from `bus` to the engine once it runs.
    ///
    /// Delivery is best-effort: events are dropped if the command queue is
    /// full or the driver has stopped, and the periodic check catches up
    /// later. The subscription is removed when [`run`](Self::run) returns.
    pub fn bridge_bus(&mut self, bus: Arc<dyn EventBus>) -> SubscriptionId {
        let sync = self.sync.clone();
        let id = bus.subscribe(
            Channel::StorageSync,
            Box::new(move |event| {
                let Event::StorageSync { key } = event else {
                    return;
                };
                let Some(commands) = sync.upgrade() else {
                    return;
                };
                if let Err(err) = commands.try_send(Command::StorageChanged(key.clone())) {
                    tracing::debug!(%err, key = %key, "storage sync not forwarded");
                }
            }),
        );
        self.bridges.push((bus, id));
        id
    }

    /// Mount the engine and process firings and commands until shutdown
    /// or until every handle is dropped. The engine is unmounted and bus
    /// bridges are removed on exit.
    pub async fn run(mut self) {
        self.engine.mount();
        self.publish();
        tracing::info!("engine driver started");

        loop {
            tokio::select! {
                biased;
                Some(id) = self.ticks.recv() => {
                    self.engine.handle_timer(id);
                    self.publish();
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
            }
        }

        for (bus, id) in self.bridges.drain(..) {
            bus.unsubscribe(id);
        }
        self.engine.unmount();
        self.publish();
        tracing::info!("engine driver stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let result = self.engine.start();
                self.respond(reply, result);
            }
            Command::Pause(reply) => {
                let result = self.engine.pause();
                self.respond(reply, result);
            }
            Command::Skip(reply) => {
                let result = self.engine.skip();
                self.respond(reply, result);
            }
            Command::Reset(reply) => {
                self.engine.reset();
                self.respond(reply, ());
            }
            Command::SetCycleType(cycle_type, reply) => {
                self.engine.set_cycle_type(cycle_type);
                self.respond(reply, ());
            }
            Command::Select(id, reply) => {
                self.engine.select_challenge(id.as_deref());
                self.respond(reply, ());
            }
            Command::CloseCelebration(reply) => {
                self.engine.close_celebration();
                self.respond(reply, ());
            }
            Command::SetMaxFocus(enabled, reply) => {
                self.engine.set_max_focus(enabled);
                self.respond(reply, ());
            }
            Command::Revalidate(reply) => {
                self.engine.revalidate();
                self.respond(reply, ());
            }
            Command::TakeNotices(reply) => {
                let notices = self.engine.take_notices();
                self.respond(reply, notices);
            }
            Command::StorageChanged(key) => {
                self.engine.handle_storage_change(&key);
                self.publish();
            }
            Command::Shutdown => {}
        }
    }

    /// Publish first so a caller awaiting the reply sees the new snapshot
    fn respond<T>(&self, reply: Reply<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    fn publish(&self) {
        let snapshot = self.engine.snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Cloneable command API for a running [`EngineDriver`]
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<CycleState>,
}

impl EngineHandle {
    async fn ask<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| EngineError::DriverStopped)?;
        rx.await.map_err(|_| EngineError::DriverStopped)
    }

    /// See [`CycleEngine::start`]
    pub async fn start(&self) -> Result<(), EngineError> {
        self.ask(Command::Start).await?
    }

    /// See [`CycleEngine::pause`]
    pub async fn pause(&self) -> Result<(), EngineError> {
        self.ask(Command::Pause).await?
    }

    /// See [`CycleEngine::skip`]
    pub async fn skip(&self) -> Result<(), EngineError> {
        self.ask(Command::Skip).await?
    }

    /// See [`CycleEngine::reset`]
    pub async fn reset(&self) -> Result<(), EngineError> {
        self.ask(Command::Reset).await
    }

    /// See [`CycleEngine::set_cycle_type`]
    pub async fn set_cycle_type(&self, cycle_type: CycleType) -> Result<(), EngineError> {
        self.ask(|reply| Command::SetCycleType(cycle_type, reply)).await
    }

    /// See [`CycleEngine::select_challenge`]
    pub async fn select_challenge(&self, id: Option<&str>) -> Result<(), EngineError> {
        let id = id.map(str::to_string);
        self.ask(|reply| Command::Select(id, reply)).await
    }

    /// See [`CycleEngine::close_celebration`]
    pub async fn close_celebration(&self) -> Result<(), EngineError> {
        self.ask(Command::CloseCelebration).await
    }

    /// See [`CycleEngine::set_max_focus`]
    pub async fn set_max_focus(&self, enabled: bool) -> Result<(), EngineError> {
        self.ask(|reply| Command::SetMaxFocus(enabled, reply)).await
    }

    /// See [`CycleEngine::revalidate`]
    pub async fn revalidate(&self) -> Result<(), EngineError> {
        self.ask(Command::Revalidate).await
    }

    /// See [`CycleEngine::take_notices`]
    pub async fn take_notices(&self) -> Result<Vec<Notice>, EngineError> {
        self.ask(Command::TakeNotices).await
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> CycleState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every snapshot change
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CycleState> {
        self.state.clone()
    }

    /// Ask the driver to stop. Already stopped drivers are ignored.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}
