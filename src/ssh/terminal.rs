// ABOUTME: Local terminal helpers for interactive sessions.
// ABOUTME: Raw mode guard, window size, stdin/resize pumps and hidden password prompts.

use crossterm::terminal::{disable_raw_mode, enable_raw_mode, size as term_size};
use secrecy::SecretString;
use std::io::{self, Read};
use std::thread;
use tokio::sync::mpsc::UnboundedSender;

/// Fallback when the terminal size can't be queried (e.g. stdout redirected).
pub const DEFAULT_SIZE: (u32, u32) = (80, 24);

/// Events fed into an interactive session loop.
#[derive(Debug)]
pub(crate) enum InputEvent {
    Data(Vec<u8>),
    Resize,
    Eof,
}

/// Puts the terminal in raw mode; restores it when dropped.
pub(crate) struct RawModeGuard;

impl RawModeGuard {
    pub(crate) fn activate() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Current (columns, rows), or the 80x24 default.
pub fn size() -> (u32, u32) {
    term_size()
        .map(|(cols, rows)| (u32::from(cols.max(1)), u32::from(rows.max(1))))
        .unwrap_or(DEFAULT_SIZE)
}

/// Forward raw stdin bytes until EOF or the receiver goes away.
pub(crate) fn spawn_stdin_reader(tx: UnboundedSender<InputEvent>) {
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => {
                    let _ = tx.send(InputEvent::Eof);
                    break;
                }
                Ok(n) => {
                    if tx.send(InputEvent::Data(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    let _ = tx.send(InputEvent::Eof);
                    break;
                }
            }
        }
    });
}

/// Emit `InputEvent::Resize` on every SIGWINCH until the receiver goes away.
#[cfg(unix)]
pub(crate) fn spawn_resize_watcher(tx: UnboundedSender<InputEvent>) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut winch = signal(SignalKind::window_change())?;
    tokio::spawn(async move {
        while winch.recv().await.is_some() {
            if tx.send(InputEvent::Resize).is_err() {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn spawn_resize_watcher(_tx: UnboundedSender<InputEvent>) -> io::Result<()> {
    Ok(())
}

/// Prompt on the terminal without echo.
pub async fn read_secret(prompt: String) -> io::Result<SecretString> {
    tokio::task::spawn_blocking(move || {
        rpassword::prompt_password(prompt).map(|s| SecretString::new(s.into_boxed_str()))
    })
    .await
    .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_never_zero() {
        let (cols, rows) = size();
        assert!(cols >= 1);
        assert!(rows >= 1);
    }
}
