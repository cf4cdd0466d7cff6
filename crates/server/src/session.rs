// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-robot connection lifecycle: handshake, heartbeat, job dispatch and
//! result relay, framed over [`orc_wire::Message`].

use async_trait::async_trait;
use orc_core::{Clock, Job, JobId, Robot, RobotId, RobotStatus};
use orc_engine::{HealthMonitor, JobSender, PriorityQueue, SecurityManager, SendOutcome};
use orc_storage::PersistenceStore;
use orc_wire::{read_frame, write_frame, Message, Payload, ProtocolError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{split, AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Authenticating,
    Authenticated,
    Running,
    Failed,
    Closed,
}

/// A message a session task accepts from the rest of the server.
pub enum SessionCommand {
    ExecuteJob { job: Box<Job>, reply: oneshot::Sender<SendOutcome> },
}

/// Maps a connected robot to the channel its owning session task reads
/// commands from. Cloned freely; the map itself lives behind one lock.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<RobotId, mpsc::Sender<SessionCommand>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, robot_id: RobotId, sender: mpsc::Sender<SessionCommand>) {
        self.inner.lock().insert(robot_id, sender);
    }

    pub fn remove(&self, robot_id: RobotId) {
        self.inner.lock().remove(&robot_id);
    }

    pub fn get(&self, robot_id: RobotId) -> Option<mpsc::Sender<SessionCommand>> {
        self.inner.lock().get(&robot_id).cloned()
    }

    pub fn connected_count(&self) -> usize {
        self.inner.lock().len()
    }
}

/// [`JobSender`] that hands a job to whichever session task owns the
/// target robot's connection, if any is currently registered.
pub struct RegistrySender {
    registry: SessionRegistry,
}

impl RegistrySender {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl JobSender for RegistrySender {
    async fn send_job(&self, robot_id: RobotId, job: &Job) -> SendOutcome {
        let Some(sender) = self.registry.get(robot_id) else {
            return SendOutcome::Rejected("robot session not connected".into());
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if sender.send(SessionCommand::ExecuteJob { job: Box::new(job.clone()), reply: reply_tx }).await.is_err() {
            return SendOutcome::Rejected("robot session closed".into());
        }
        reply_rx.await.unwrap_or_else(|_| SendOutcome::Rejected("robot session dropped without replying".into()))
    }
}

/// Callbacks the engine registers to advance queue/recovery state as a
/// session observes protocol events. Invoked from the session's own
/// task, never under any subsystem lock.
pub struct SessionCallbacks {
    pub on_robot_connected: Box<dyn Fn(Robot) + Send + Sync>,
    pub on_robot_disconnected: Box<dyn Fn(RobotId) + Send + Sync>,
    pub on_job_progress: Box<dyn Fn(JobId, u8, Option<String>) + Send + Sync>,
    pub on_job_complete: Box<dyn Fn(JobId, Option<serde_json::Value>) + Send + Sync>,
    pub on_job_failed: Box<dyn Fn(JobId, String) + Send + Sync>,
    pub on_job_cancelled: Box<dyn Fn(JobId) + Send + Sync>,
}

/// Drives one robot's connection from handshake through to disconnect.
pub struct RobotSession<C: Clock, S: PersistenceStore> {
    clock: C,
    storage: Arc<S>,
    security: Arc<SecurityManager<C>>,
    health: Arc<HealthMonitor<C>>,
    queue: Arc<PriorityQueue<C>>,
    registry: SessionRegistry,
    callbacks: Arc<SessionCallbacks>,
    handshake_timeout: Duration,
    dispatch_timeout: Duration,
}

impl<C: Clock, S: PersistenceStore> RobotSession<C, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        storage: Arc<S>,
        security: Arc<SecurityManager<C>>,
        health: Arc<HealthMonitor<C>>,
        queue: Arc<PriorityQueue<C>>,
        registry: SessionRegistry,
        callbacks: Arc<SessionCallbacks>,
        handshake_timeout: Duration,
        dispatch_timeout: Duration,
    ) -> Self {
        Self { clock, storage, security, health, queue, registry, callbacks, handshake_timeout, dispatch_timeout }
    }

    /// Owns the connection until the robot disconnects or a protocol
    /// error ends the session. Never panics; every error path logs and
    /// returns.
    pub async fn run<IO>(&self, mut io: IO)
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut state = SessionState::Connected;
        let mut next_id: u64 = 0;
        let (command_tx, mut command_rx) = mpsc::channel::<SessionCommand>(32);
        let pending: Arc<Mutex<HashMap<JobId, oneshot::Sender<SendOutcome>>>> = Arc::new(Mutex::new(HashMap::new()));

        state = SessionState::Authenticating;
        let (mut read_half, mut write_half) = split(io);
        let robot_id = match self.authenticate(&mut read_half, &mut write_half, &mut next_id, self.handshake_timeout).await {
            Ok(robot) => {
                state = SessionState::Authenticated;
                let id = robot.id;
                self.registry.register(id, command_tx.clone());
                (self.callbacks.on_robot_connected)(robot);
                id
            }
            Err(reason) => {
                tracing::warn!(%reason, "session handshake failed");
                let _ = self.send_error(&mut write_half, &mut next_id, reason).await;
                return;
            }
        };

        state = SessionState::Running;
        tracing::info!(%robot_id, "robot session authenticated");

        // Read loop runs on its own task so `tokio::select!` below never
        // cancels a partially-read frame.
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Result<Message, ProtocolError>>(32);
        let reader_task = tokio::spawn(async move {
            loop {
                let frame = read_frame::<_, Message>(&mut read_half).await;
                let is_err = frame.is_err();
                if inbound_tx.send(frame).await.is_err() || is_err {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                incoming = inbound_rx.recv() => {
                    match incoming {
                        Some(Ok(message)) => {
                            if !self.handle_message(robot_id, message, &pending) {
                                break;
                            }
                        }
                        Some(Err(ProtocolError::Io(_))) | None => break,
                        Some(Err(err)) => {
                            tracing::warn!(%robot_id, %err, "malformed message from robot");
                            break;
                        }
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::ExecuteJob { job, reply }) => {
                            let job_id = job.id;
                            let outgoing = Message::new(
                                self.next_id(&mut next_id),
                                self.clock.now_utc(),
                                Payload::ExecuteJob { job },
                            );
                            if write_frame(&mut write_half, &outgoing).await.is_err() {
                                let _ = reply.send(SendOutcome::Rejected("write failed".into()));
                                break;
                            }
                            pending.lock().insert(job_id, reply);
                            self.spawn_dispatch_timeout(job_id, pending.clone());
                        }
                        None => break,
                    }
                }
            }
        }
        reader_task.abort();

        state = SessionState::Closed;
        tracing::info!(%robot_id, ?state, "robot session ended");
        self.registry.remove(robot_id);
        for (_, reply) in pending.lock().drain() {
            let _ = reply.send(SendOutcome::Rejected("session closed before robot replied".into()));
        }
        (self.callbacks.on_robot_disconnected)(robot_id);
        let _ = state;
    }

    fn next_id(&self, counter: &mut u64) -> u64 {
        let id = *counter;
        *counter += 1;
        id
    }

    /// After `dispatch_timeout`, fails the job's pending reply if the
    /// robot never accepted or rejected it.
    fn spawn_dispatch_timeout(&self, job_id: JobId, pending: Arc<Mutex<HashMap<JobId, oneshot::Sender<SendOutcome>>>>) {
        let timeout = self.dispatch_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(reply) = pending.lock().remove(&job_id) {
                let _ = reply.send(SendOutcome::Rejected("robot did not respond within dispatch_timeout".into()));
            }
        });
    }

    async fn authenticate<R, W>(&self, reader: &mut R, writer: &mut W, next_id: &mut u64, timeout: Duration) -> Result<Robot, String>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let message = tokio::time::timeout(timeout, read_frame::<_, Message>(reader))
            .await
            .map_err(|_| "handshake timed out".to_string())?
            .map_err(|e| format!("handshake read failed: {e}"))?;

        let Payload::Handshake { robot_id, name, token, capabilities: _, tags, environment } = message.payload else {
            return Err("expected HANDSHAKE as the first message".to_string());
        };

        if self.security.validate_token(&token).is_none() {
            return Err("invalid or expired token".to_string());
        }

        let robot = match self.storage.get_robots().await {
            Ok(robots) => robots.into_iter().find(|r| r.id == robot_id),
            Err(_) => None,
        };
        let mut robot = robot.unwrap_or_else(|| Robot::new(name.clone(), 1));
        robot.id = robot_id;
        robot.name = name;
        robot.status = RobotStatus::Online;
        robot.tags = tags.into_iter().collect();
        robot.environment = environment;
        robot.last_heartbeat = Some(self.clock.now_utc());

        if self.storage.save_robot(robot.clone()).await.is_err() {
            return Err("failed to persist robot record".to_string());
        }

        let ack = Message::new(
            self.next_id(next_id),
            self.clock.now_utc(),
            Payload::HandshakeAck { session_id: robot_id.to_string(), server_version: env!("CARGO_PKG_VERSION").to_string() },
        );
        write_frame(writer, &ack).await.map_err(|e| format!("failed to send HANDSHAKE_ACK: {e}"))?;

        Ok(robot)
    }

    async fn send_error<W>(&self, writer: &mut W, next_id: &mut u64, reason: String) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let message = Message::new(self.next_id(next_id), self.clock.now_utc(), Payload::Error { message: reason });
        write_frame(writer, &message).await
    }

    /// Returns `false` when the session should close.
    fn handle_message(&self, robot_id: RobotId, message: Message, pending: &Mutex<HashMap<JobId, oneshot::Sender<SendOutcome>>>) -> bool {
        match message.payload {
            Payload::Heartbeat { cpu_percent, memory_percent, disk_percent, active_jobs: _ } => {
                self.health.record_heartbeat(robot_id, cpu_percent, memory_percent, disk_percent);
                true
            }
            Payload::JobAccepted { job_id } => {
                self.complete_pending(pending, &job_id, SendOutcome::Accepted);
                true
            }
            Payload::JobRejected { job_id, reason } => {
                self.complete_pending(pending, &job_id, SendOutcome::Rejected(reason.unwrap_or_default()));
                true
            }
            Payload::JobProgress { job_id, progress, current_node } => {
                if let Some(id) = parse_job_id(&job_id) {
                    self.queue.update_progress(id, progress, current_node.clone());
                    (self.callbacks.on_job_progress)(id, progress, current_node);
                }
                true
            }
            Payload::JobCompleted { job_id, result } => {
                if let Some(id) = parse_job_id(&job_id) {
                    self.queue.complete(id, result.clone());
                    (self.callbacks.on_job_complete)(id, result);
                }
                true
            }
            Payload::JobFailed { job_id, error_message } => {
                if let Some(id) = parse_job_id(&job_id) {
                    self.queue.fail(id, error_message.clone());
                    (self.callbacks.on_job_failed)(id, error_message);
                }
                true
            }
            Payload::JobCancelled { job_id } => {
                if let Some(id) = parse_job_id(&job_id) {
                    self.queue.cancel(id, "cancelled by robot");
                    (self.callbacks.on_job_cancelled)(id);
                }
                true
            }
            Payload::RobotStatus { status: _ } => true,
            Payload::Error { message } => {
                tracing::warn!(%robot_id, %message, "robot reported an error");
                true
            }
            Payload::Handshake { .. } | Payload::HandshakeAck { .. } | Payload::ExecuteJob { .. } => {
                tracing::warn!(%robot_id, "unexpected server-originated message type from robot");
                false
            }
        }
    }

    fn complete_pending(&self, pending: &Mutex<HashMap<JobId, oneshot::Sender<SendOutcome>>>, job_id: &str, outcome: SendOutcome) {
        let Some(id) = parse_job_id(job_id) else { return };
        if let Some(reply) = pending.lock().remove(&id) {
            let _ = reply.send(outcome);
        }
    }
}

fn parse_job_id(value: &str) -> Option<JobId> {
    if value.is_empty() {
        None
    } else {
        Some(JobId::from_string(value))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
