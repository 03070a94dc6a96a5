// ABOUTME: Bidirectional byte pump between two streams.
// ABOUTME: Stops both directions as soon as either one finishes.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const BUFFER_SIZE: usize = 16 * 1024;

/// Bytes moved by one bridged pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Transfer {
    /// `a` to `b`.
    pub up: u64,
    /// `b` to `a`.
    pub down: u64,
}

/// Copy between `a` and `b` until one direction hits EOF or an error.
///
/// Both streams are dropped on return, which closes them and unblocks the
/// peer of the direction that was still running.
pub async fn bridge<A, B>(a: A, b: B) -> Transfer
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);
    let mut up = 0u64;
    let mut down = 0u64;

    tokio::select! {
        r = pump(&mut a_read, &mut b_write, &mut up) => {
            if let Err(e) = r {
                tracing::debug!(error = %e, "relay upstream copy ended with error");
            }
        }
        r = pump(&mut b_read, &mut a_write, &mut down) => {
            if let Err(e) = r {
                tracing::debug!(error = %e, "relay downstream copy ended with error");
            }
        }
    }

    Transfer { up, down }
}

async fn pump<R, W>(reader: &mut R, writer: &mut W, counter: &mut u64) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            let _ = writer.shutdown().await;
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *counter += n as u64;
    }
}
