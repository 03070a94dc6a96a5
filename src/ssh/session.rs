// ABOUTME: Session engine: one-shot command execution and interactive shells.
// ABOUTME: Both run on an already authenticated Connection.

use super::client::Connection;
use super::error::{Error, Result};
use super::terminal::{self, InputEvent, RawModeGuard};
use russh::{ChannelMsg, Pty};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

const TERM: &str = "xterm-256color";
const TERMINAL_SPEED: u32 = 14400;

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_status: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// Tracks a running command until both its exit status and EOF arrive.
#[derive(Debug, Default)]
struct ExecProgress {
    exit_status: Option<u32>,
    eof: bool,
}

impl ExecProgress {
    /// Handle one channel message. Returns true once the command is done.
    async fn feed<O, E>(
        &mut self,
        msg: Option<ChannelMsg>,
        stdout: &mut O,
        stderr: &mut E,
    ) -> Result<bool>
    where
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        match msg {
            Some(ChannelMsg::Data { data }) => {
                stdout.write_all(&data).await?;
                stdout.flush().await?;
            }
            Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                stderr.write_all(&data).await?;
                stderr.flush().await?;
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                self.exit_status = Some(exit_status);
                return Ok(self.eof);
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                return Err(Error::Session(format!(
                    "remote command terminated by signal {:?}",
                    signal_name
                )));
            }
            Some(ChannelMsg::Eof) => {
                self.eof = true;
                return Ok(self.exit_status.is_some());
            }
            Some(ChannelMsg::Close) | None => return Ok(true),
            Some(_) => {}
        }
        Ok(false)
    }

    /// No exit status means the transport died under the command.
    fn finish(self) -> Result<u32> {
        self.exit_status.ok_or(Error::ChannelClosed)
    }
}

/// What the interactive loop does with one local input event.
#[derive(Debug, PartialEq, Eq)]
enum InputAction {
    Send(Vec<u8>),
    Resize,
    SendEof,
    Ignore,
}

/// Local input state for an interactive shell.
///
/// Stdin reaching EOF stops data forwarding, but resize events keep flowing
/// until every input source is gone.
#[derive(Debug)]
struct ShellInput {
    stdin_open: bool,
    sources_open: bool,
}

impl Default for ShellInput {
    fn default() -> Self {
        Self {
            stdin_open: true,
            sources_open: true,
        }
    }
}

impl ShellInput {
    fn is_open(&self) -> bool {
        self.sources_open
    }

    fn on_event(&mut self, event: Option<InputEvent>) -> InputAction {
        match event {
            Some(InputEvent::Data(bytes)) if self.stdin_open => InputAction::Send(bytes),
            Some(InputEvent::Data(_)) => InputAction::Ignore,
            Some(InputEvent::Resize) => InputAction::Resize,
            Some(InputEvent::Eof) => self.close_stdin(),
            None => {
                self.sources_open = false;
                self.close_stdin()
            }
        }
    }

    fn close_stdin(&mut self) -> InputAction {
        if std::mem::replace(&mut self.stdin_open, false) {
            InputAction::SendEof
        } else {
            InputAction::Ignore
        }
    }
}

impl Connection {
    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.command_timeout()).await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit_status = self.exec_streaming(command, &mut stdout, &mut stderr).await?;

        Ok(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Execute a command, writing its output as it arrives.
    ///
    /// No timeout applies; the command runs until it exits or the connection
    /// drops. Returns the remote exit status.
    pub async fn exec_streaming<O, E>(
        &self,
        command: &str,
        stdout: &mut O,
        stderr: &mut E,
    ) -> Result<u32>
    where
        O: AsyncWrite + Unpin + Send,
        E: AsyncWrite + Unpin + Send,
    {
        let mut channel = self
            .handle()
            .channel_open_session()
            .await
            .map_err(|e| Error::Session(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Session(format!("failed to exec command: {}", e)))?;

        let mut progress = ExecProgress::default();
        while !progress.feed(channel.wait().await, stdout, stderr).await? {}
        progress.finish()
    }

    /// Attach the local terminal to a remote login shell.
    ///
    /// Succeeds only when the remote shell exits with status 0. The local
    /// terminal is restored on every exit path.
    pub async fn run_interactive(&self) -> Result<()> {
        let _raw = RawModeGuard::activate()
            .map_err(|e| Error::Session(format!("failed to enter raw mode: {}", e)))?;

        let (cols, rows) = terminal::size();
        let mut channel = self
            .handle()
            .channel_open_session()
            .await
            .map_err(|e| Error::Session(format!("failed to open channel: {}", e)))?;

        let modes = [
            (Pty::ECHO, 1),
            (Pty::TTY_OP_ISPEED, TERMINAL_SPEED),
            (Pty::TTY_OP_OSPEED, TERMINAL_SPEED),
        ];
        channel
            .request_pty(true, TERM, cols, rows, 0, 0, &modes)
            .await
            .map_err(|e| Error::Session(format!("PTY request failed: {}", e)))?;
        channel
            .request_shell(true)
            .await
            .map_err(|e| Error::Session(format!("shell request failed: {}", e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        terminal::spawn_resize_watcher(tx.clone())?;
        terminal::spawn_stdin_reader(tx);

        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();
        let mut input = ShellInput::default();
        let mut exit_status = None;

        loop {
            tokio::select! {
                event = rx.recv(), if input.is_open() => match input.on_event(event) {
                    InputAction::Send(bytes) => channel.data(&bytes[..]).await?,
                    InputAction::Resize => {
                        let (cols, rows) = terminal::size();
                        channel.window_change(cols, rows, 0, 0).await?;
                    }
                    InputAction::SendEof => {
                        let _ = channel.eof().await;
                    }
                    InputAction::Ignore => {}
                },
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.write_all(&data).await?;
                        stdout.flush().await?;
                    }
                    Some(ChannelMsg::ExtendedData { data, .. }) => {
                        stderr.write_all(&data).await?;
                        stderr.flush().await?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        exit_status = Some(status);
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        return Err(Error::Session(format!(
                            "remote shell terminated by signal {:?}",
                            signal_name
                        )));
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                },
            }
        }

        match exit_status {
            Some(0) => Ok(()),
            Some(status) => Err(Error::ExitStatus(status)),
            None => Err(Error::ChannelClosed),
        }
    }
}
