//! Driver handle that owns a child process.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use glot_pool::{DriverError, DriverService, PooledDriver};
use glot_protocol::{NativeParseRequest, NativeParseResponse, ParseRequest, ParseResponse};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::DRIVER_TARGET;
use crate::command::DriverCommand;
use crate::error::ProcessError;
use crate::framing::{FramedChannel, StdioChannel};
use crate::lifecycle::{kill_child, terminate_child};
use crate::rpc;

static INSTANCE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique instance id of the form `<language>-<sequence>`.
#[must_use]
pub fn instance_id(language: &str) -> String {
    let sequence = INSTANCE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{language}-{sequence}")
}

enum ProcessState {
    NotStarted,
    Running { child: Child, channel: StdioChannel },
    Stopped,
}

/// A driver instance running as a child process.
///
/// Requests are JSON-RPC calls over the child's stdio. Any failure of the
/// channel or the process itself kills the child and marks the handle
/// stopped, so the pool that owns it will evict it.
pub struct ProcessDriver {
    id: String,
    command: DriverCommand,
    state: ProcessState,
    next_request: i64,
}

impl ProcessDriver {
    /// Creates a handle that will launch `command` when started.
    #[must_use]
    pub fn new(id: impl Into<String>, command: DriverCommand) -> Self {
        Self {
            id: id.into(),
            command,
            state: ProcessState::NotStarted,
            next_request: 1,
        }
    }

    /// Returns `true` while the child process is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running { .. })
    }

    fn spawn(&self) -> Result<(Child, StdioChannel), ProcessError> {
        let program = self.command.program.display().to_string();
        debug!(
            target: DRIVER_TARGET,
            instance = %self.id,
            %program,
            args = ?self.command.args,
            "spawning driver process"
        );

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .envs(self.command.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.command.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ProcessError::BinaryNotFound {
                    program: program.clone(),
                    source,
                }
            } else {
                ProcessError::SpawnFailed {
                    message: format!("failed to start {program}"),
                    source,
                }
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _killed = kill_child(&mut child);
            return Err(ProcessError::SpawnFailed {
                message: format!("failed to capture stdio of {program}"),
                source: std::io::Error::other("stdio not piped"),
            });
        };

        debug!(target: DRIVER_TARGET, instance = %self.id, pid = child.id(), "driver process spawned");
        Ok((
            child,
            FramedChannel::new(BufReader::new(stdout), BufWriter::new(stdin)),
        ))
    }

    fn request<P, T>(&mut self, method: &str, params: &P) -> Result<T, ProcessError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_request;
        self.next_request += 1;

        let ProcessState::Running { channel, .. } = &mut self.state else {
            return Err(ProcessError::NotRunning);
        };
        let outcome = rpc::call(channel, id, method, params);
        if let Err(error) = &outcome {
            if error.is_fatal() {
                warn!(
                    target: DRIVER_TARGET,
                    instance = %self.id,
                    method,
                    error = %error,
                    "driver channel failed, killing process"
                );
                self.abandon();
            }
        }
        outcome
    }

    fn abandon(&mut self) {
        if let ProcessState::Running { mut child, .. } =
            std::mem::replace(&mut self.state, ProcessState::Stopped)
        {
            if let Err(error) = kill_child(&mut child) {
                warn!(target: DRIVER_TARGET, instance = %self.id, error = %error, "failed to kill driver");
            }
        }
    }

    /// Asks the driver to shut down and waits for it to exit.
    ///
    /// Sends a `shutdown` request followed by an `exit` notification without
    /// waiting for replies, then kills the process if it has not exited after
    /// a short grace period.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Teardown`] when the process cannot be killed.
    pub fn shutdown(&mut self) -> Result<(), ProcessError> {
        let id = self.next_request;
        self.next_request += 1;

        let ProcessState::Running { mut child, mut channel } =
            std::mem::replace(&mut self.state, ProcessState::Stopped)
        else {
            return Ok(());
        };
        debug!(target: DRIVER_TARGET, instance = %self.id, "shutting down driver");

        if let Err(error) = rpc::post(&mut channel, id, "shutdown", &Value::Null) {
            debug!(target: DRIVER_TARGET, instance = %self.id, error = %error, "shutdown request failed");
        }
        if let Err(error) = rpc::notify(&mut channel, "exit") {
            debug!(target: DRIVER_TARGET, instance = %self.id, error = %error, "exit notification failed");
        }
        drop(channel);

        terminate_child(&mut child, &self.id).map_err(ProcessError::Teardown)
    }
}

impl PooledDriver for ProcessDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self) -> Result<(), DriverError> {
        if self.is_running() {
            return Ok(());
        }
        let (child, channel) = self.spawn()?;
        self.state = ProcessState::Running { child, channel };
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.shutdown().map_err(DriverError::from)
    }

    fn service(&mut self) -> &mut dyn DriverService {
        self
    }
}

impl DriverService for ProcessDriver {
    fn parse(&mut self, request: &ParseRequest) -> Result<ParseResponse, DriverError> {
        self.request("parse", request).map_err(DriverError::from)
    }

    fn native_parse(
        &mut self,
        request: &NativeParseRequest,
    ) -> Result<NativeParseResponse, DriverError> {
        self.request("nativeParse", request)
            .map_err(DriverError::from)
    }
}

impl Drop for ProcessDriver {
    fn drop(&mut self) {
        self.abandon();
    }
}

impl std::fmt::Debug for ProcessDriver {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            ProcessState::NotStarted => "not_started".to_owned(),
            ProcessState::Running { child, .. } => format!("running (pid: {})", child.id()),
            ProcessState::Stopped => "stopped".to_owned(),
        };
        formatter
            .debug_struct("ProcessDriver")
            .field("id", &self.id)
            .field("program", &self.command.program)
            .field("state", &state)
            .finish()
    }
}
