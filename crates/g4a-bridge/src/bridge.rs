//! Serialized access to the worker
//!
//! The worker is a single interactive process: two interleaved send/read pairs
//! would read each other's output. [`WorkerBridge`] therefore hands every
//! request to one background task that owns the transport and runs commands
//! strictly one at a time in arrival order.
//!
//! `stop` is the exception to queue order. It bumps a stop epoch before it
//! enqueues itself; any send, read or exchange issued under an older epoch
//! fails with `WorkerNotRunning`, whether it is still queued or already
//! waiting on the worker.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::lifecycle::{EventCallback, WorkerEvent};
use g4a_transport::{
    ReadOptions, TransportError, WorkerState, WorkerSupervisor, WorkerTransport,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument, debug, debug_span, info, warn};
use uuid::Uuid;

/// Snapshot of the worker published after every command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WorkerStatus {
    /// Lifecycle state
    pub state: WorkerState,
    /// OS process id while a worker is attached
    pub pid: Option<u32>,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Start {
        reply: Reply<()>,
    },
    Stop {
        force_kill_timeout: Option<Duration>,
        reply: Reply<()>,
    },
    Send {
        message: String,
        epoch: u64,
        reply: Reply<()>,
    },
    Read {
        options: ReadOptions,
        epoch: u64,
        reply: Reply<String>,
    },
    Exchange {
        message: String,
        options: ReadOptions,
        epoch: u64,
        reply: Reply<String>,
    },
}

/// Cloneable handle to a worker owned by a background task
///
/// Dropping the last handle stops the worker.
#[derive(Clone)]
pub struct WorkerBridge {
    commands: mpsc::Sender<Command>,
    stop_epoch: Arc<watch::Sender<u64>>,
    status: watch::Receiver<WorkerStatus>,
    read_options: ReadOptions,
}

impl std::fmt::Debug for WorkerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerBridge")
            .field("status", &*self.status.borrow())
            .field("read_options", &self.read_options)
            .finish()
    }
}

/// Builder for [`WorkerBridge`]
pub struct WorkerBridgeBuilder {
    config: BridgeConfig,
    on_event: Option<EventCallback>,
}

impl WorkerBridgeBuilder {
    /// Register a callback for lifecycle events
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WorkerEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(callback));
        self
    }

    /// Resolve the worker binary and spawn the bridge task.
    ///
    /// Must be called from within a tokio runtime. The worker itself is not
    /// launched until [`WorkerBridge::start`].
    ///
    /// # Errors
    ///
    /// Fails when the host platform has no worker executable and no explicit
    /// binary is configured.
    pub fn spawn(self) -> Result<WorkerBridge> {
        let supervisor = WorkerSupervisor::new(self.config.worker_config()?);
        Ok(self.spawn_with(supervisor))
    }

    /// Spawn the bridge task around an arbitrary transport
    pub fn spawn_with<T>(self, transport: T) -> WorkerBridge
    where
        T: WorkerTransport + 'static,
    {
        let (commands, queue) = mpsc::channel(self.config.queue_capacity.max(1));
        let (stop_epoch, epoch_rx) = watch::channel(0u64);
        let (status_tx, status) = watch::channel(WorkerStatus::default());

        let actor = BridgeActor {
            transport,
            stop_epoch: epoch_rx,
            status: status_tx,
            force_kill_timeout: self.config.force_kill_timeout,
            on_event: self.on_event,
        };
        tokio::spawn(actor.run(queue));

        WorkerBridge {
            commands,
            stop_epoch: Arc::new(stop_epoch),
            status,
            read_options: self.config.read,
        }
    }
}

impl WorkerBridge {
    /// Create a builder
    pub fn builder(config: BridgeConfig) -> WorkerBridgeBuilder {
        WorkerBridgeBuilder {
            config,
            on_event: None,
        }
    }

    /// Bridge over the platform worker described by `config`
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::builder(config).spawn()
    }

    /// Bridge over a custom transport, e.g. [`MockWorker`](crate::testing::MockWorker)
    pub fn with_transport<T>(config: BridgeConfig, transport: T) -> Self
    where
        T: WorkerTransport + 'static,
    {
        Self::builder(config).spawn_with(transport)
    }

    /// Start the worker; a no-op if it is already running
    pub async fn start(&self) -> Result<()> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Stop the worker, preempting every queued or in-flight exchange.
    ///
    /// Resolves once the process has exited.
    pub async fn stop(&self) -> Result<()> {
        self.request_stop(None).await
    }

    /// Like [`stop`](Self::stop), with a force-kill timeout for this call only
    pub async fn stop_with(&self, force_kill_timeout: Duration) -> Result<()> {
        self.request_stop(Some(force_kill_timeout)).await
    }

    async fn request_stop(&self, force_kill_timeout: Option<Duration>) -> Result<()> {
        self.stop_epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        self.request(|reply| Command::Stop {
            force_kill_timeout,
            reply,
        })
        .await
    }

    /// Write one line to the worker
    pub async fn send(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let epoch = self.current_epoch();
        self.request(|reply| Command::Send {
            message,
            epoch,
            reply,
        })
        .await
    }

    /// Read the next response with the configured options
    pub async fn read_response(&self) -> Result<String> {
        self.read_response_with(self.read_options).await
    }

    /// Read the next response with explicit options
    pub async fn read_response_with(&self, options: ReadOptions) -> Result<String> {
        let epoch = self.current_epoch();
        self.request(|reply| Command::Read {
            options,
            epoch,
            reply,
        })
        .await
    }

    /// Send `message` and read its response with no other caller in between
    pub async fn exchange(&self, message: impl Into<String>) -> Result<String> {
        let message = message.into();
        let options = self.read_options;
        let epoch = self.current_epoch();
        self.request(|reply| Command::Exchange {
            message,
            options,
            epoch,
            reply,
        })
        .await
    }

    /// Latest published worker state
    pub fn state(&self) -> WorkerState {
        self.status.borrow().state
    }

    /// Latest published worker pid
    pub fn pid(&self) -> Option<u32> {
        self.status.borrow().pid
    }

    /// Latest published status snapshot
    pub fn status(&self) -> WorkerStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<WorkerStatus> {
        self.status.clone()
    }

    /// Read options used by [`read_response`](Self::read_response) and [`exchange`](Self::exchange)
    pub fn read_options(&self) -> ReadOptions {
        self.read_options
    }

    fn current_epoch(&self) -> u64 {
        *self.stop_epoch.borrow()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| BridgeError::Closed)?;
        response.await.map_err(|_| BridgeError::Closed)?
    }
}

/// Background task that owns the transport
struct BridgeActor<T> {
    transport: T,
    stop_epoch: watch::Receiver<u64>,
    status: watch::Sender<WorkerStatus>,
    force_kill_timeout: Duration,
    on_event: Option<EventCallback>,
}

impl<T: WorkerTransport> BridgeActor<T> {
    async fn run(mut self, mut queue: mpsc::Receiver<Command>) {
        while let Some(command) = queue.recv().await {
            self.handle(command).await;
        }

        debug!("All bridge handles dropped, shutting worker down");
        if let Err(err) = self.stop(self.force_kill_timeout).await {
            warn!("Stopping worker on bridge shutdown failed: {}", err);
        }
        self.publish();
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let result = self.start().await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Stop {
                force_kill_timeout,
                reply,
            } => {
                let timeout = force_kill_timeout.unwrap_or(self.force_kill_timeout);
                let result = self.stop(timeout).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Send {
                message,
                epoch,
                reply,
            } => {
                if reply.is_closed() {
                    debug!("Send abandoned by caller, skipping");
                    return;
                }
                let mut stop_epoch = self.stop_epoch.clone();
                let result =
                    preemptible(&mut stop_epoch, epoch, self.transport.send(&message)).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Read {
                options,
                epoch,
                reply,
            } => {
                if reply.is_closed() {
                    debug!("Read abandoned by caller, skipping");
                    return;
                }
                let mut stop_epoch = self.stop_epoch.clone();
                let result = preemptible(
                    &mut stop_epoch,
                    epoch,
                    self.transport.read_response(&options),
                )
                .await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Exchange {
                message,
                options,
                epoch,
                reply,
            } => {
                if reply.is_closed() {
                    debug!("Exchange abandoned by caller, skipping");
                    return;
                }
                let result = self.exchange(&message, &options, epoch).await;
                self.publish();
                let _ = reply.send(result);
            }
        }
    }

    async fn start(&mut self) -> Result<()> {
        let was_running = self.transport.state().is_running();
        match self.transport.start().await {
            Ok(()) => {
                if !was_running {
                    self.emit(WorkerEvent::Started {
                        pid: self.transport.pid(),
                    });
                }
                Ok(())
            }
            Err(err) => {
                self.emit(WorkerEvent::StartFailed {
                    error: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    async fn stop(&mut self, force_kill_timeout: Duration) -> Result<()> {
        if !self.transport.state().is_running() {
            return Ok(());
        }

        self.status.send_replace(WorkerStatus {
            state: WorkerState::Stopping,
            pid: self.transport.pid(),
        });
        self.transport.stop(force_kill_timeout).await?;
        self.emit(WorkerEvent::Stopped);
        Ok(())
    }

    async fn exchange(&mut self, message: &str, options: &ReadOptions, epoch: u64) -> Result<String> {
        let exchange_id = Uuid::new_v4();
        let span = debug_span!("exchange", id = %exchange_id);
        let mut stop_epoch = self.stop_epoch.clone();

        let result = preemptible(
            &mut stop_epoch,
            epoch,
            self.transport.exchange(message, options),
        )
        .instrument(span)
        .await;

        match &result {
            Ok(response) => self.emit(WorkerEvent::ExchangeCompleted {
                exchange_id,
                response_len: response.len(),
            }),
            Err(_) if *stop_epoch.borrow() != epoch => {
                self.emit(WorkerEvent::Interrupted { exchange_id })
            }
            Err(err) => debug!(%exchange_id, "Exchange failed: {}", err),
        }
        result
    }

    fn publish(&mut self) {
        let status = WorkerStatus {
            state: self.transport.state(),
            pid: self.transport.pid(),
        };
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }

    fn emit(&self, event: WorkerEvent) {
        match &event {
            WorkerEvent::Started { .. } | WorkerEvent::Stopped => info!("{}", event.description()),
            WorkerEvent::StartFailed { .. } | WorkerEvent::Interrupted { .. } => {
                warn!("{}", event.description())
            }
            WorkerEvent::ExchangeCompleted { .. } => debug!("{}", event.description()),
        }
        if let Some(callback) = &self.on_event {
            callback(&event);
        }
    }
}

/// Run `operation` unless a stop is requested before or while it runs
async fn preemptible<T, F>(stop_epoch: &mut watch::Receiver<u64>, epoch: u64, operation: F) -> Result<T>
where
    F: Future<Output = g4a_transport::Result<T>>,
{
    if *stop_epoch.borrow() != epoch {
        debug!("Stop requested while queued, skipping");
        return Err(TransportError::WorkerNotRunning.into());
    }

    tokio::select! {
        result = operation => result.map_err(BridgeError::from),
        () = stop_requested(stop_epoch, epoch) => {
            debug!("Stop requested, abandoning in-flight operation");
            Err(TransportError::WorkerNotRunning.into())
        }
    }
}

async fn stop_requested(stop_epoch: &mut watch::Receiver<u64>, epoch: u64) {
    // All handles gone: nobody can request a stop any more
    if stop_epoch.wait_for(|current| *current != epoch).await.is_err() {
        std::future::pending::<()>().await;
    }
}
