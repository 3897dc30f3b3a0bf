//! Worker spawning and transport
//!
//! A worker is reached only through two queues: commands in, events out.
//! The process spawner runs it as a child speaking newline-delimited JSON on
//! stdin/stdout. Dropping every command sender closes stdin and kills the
//! child.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::{WorkerCommand, WorkerEvent};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Worker channel closed")]
    Closed,

    #[error("No worker running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two ends the supervisor holds
pub struct WorkerChannels {
    pub commands: mpsc::Sender<WorkerCommand>,
    pub events: mpsc::Receiver<WorkerEvent>,
}

impl WorkerChannels {
    /// Channels for an in-process worker: returns the supervisor side and the
    /// worker side (command receiver, event sender).
    pub fn pair() -> (Self, mpsc::Receiver<WorkerCommand>, mpsc::Sender<WorkerEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                commands: command_tx,
                events: event_rx,
            },
            command_rx,
            event_tx,
        )
    }
}

/// Creates isolated workers
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn(&self) -> Result<WorkerChannels, BridgeError>;
}

/// Supervisor's handle on the live worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub generation: u64,
    commands: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    pub fn new(generation: u64, commands: mpsc::Sender<WorkerCommand>) -> Self {
        Self {
            generation,
            commands,
        }
    }

    pub async fn send(&self, command: WorkerCommand) -> Result<(), BridgeError> {
        debug!(generation = self.generation, command = command.name(), "Sending to worker");
        self.commands.send(command).await.map_err(|_| BridgeError::Closed)
    }

    pub fn sender(&self) -> mpsc::Sender<WorkerCommand> {
        self.commands.clone()
    }
}

/// Runs the worker as a child process
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(&self) -> Result<WorkerChannels, BridgeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Spawn(format!("{}: {e}", self.program.display())))?;

        let pid = child.id();
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Spawn("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Spawn("stdout not captured".to_string()))?;

        info!(program = %self.program.display(), ?pid, "Worker process started");

        let (channels, mut command_rx, event_tx) = WorkerChannels::pair();

        // Writer owns the child; when every sender is gone the child is killed.
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                let mut line = match serde_json::to_vec(&command) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(command = command.name(), error = %e, "Failed to encode command");
                        continue;
                    }
                };
                line.push(b'\n');

                if let Err(e) = stdin.write_all(&line).await {
                    warn!(error = %e, "Worker stdin closed");
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    warn!(error = %e, "Worker stdin flush failed");
                    break;
                }
            }
            drop(stdin);
            drop(child);
            debug!(?pid, "Worker writer finished");
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<WorkerEvent>(&line) {
                        Ok(event) => {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Ignoring malformed worker message"),
                    },
                    Ok(None) => {
                        info!(?pid, "Worker output closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Worker output read failed");
                        break;
                    }
                }
            }
        });

        Ok(channels)
    }
}
