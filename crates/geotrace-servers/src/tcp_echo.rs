//! Raw TCP echo server.
//!
//! Every chunk a client sends is logged and written straight back prefixed
//! with `Echo: `. There is no framing: whatever one read returns is one
//! echo. Connections are independent tasks.

use anyhow::Context;
use bytes::{BufMut, BytesMut};
use geotrace_core::config::ListenConfig;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

const ECHO_PREFIX: &[u8] = b"Echo: ";
const READ_CAPACITY: usize = 4096;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind `config.listen` and echo until the process is asked to stop.
pub async fn run(config: &ListenConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind echo server to {}", config.listen))?;
    info!("echo server listening on {}", listener.local_addr()?);
    serve(listener, crate::shutdown_signal()).await
}

/// Accept connections on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    accept_loop(&listener, shutdown).await
}

/// Source of incoming connections.
pub(crate) trait Accept {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

async fn accept_loop<A: Accept>(
    acceptor: &A,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("echo server stopped accepting connections");
                return Ok(());
            }
            accepted = acceptor.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(stream, peer));
                }
                Err(e) => {
                    // Errors such as EMFILE persist; back off instead of spinning.
                    warn!("accept failed: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
}

/// Echo one client until it disconnects. Socket errors end the connection
/// and are logged, never propagated.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%peer, "client connected");
    if let Err(e) = echo(stream, peer).await {
        warn!(%peer, "socket error: {e}");
    }
    info!(%peer, "client disconnected");
}

async fn echo<S>(mut stream: S, peer: SocketAddr) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut input = BytesMut::with_capacity(READ_CAPACITY);
    let mut output = BytesMut::with_capacity(READ_CAPACITY + ECHO_PREFIX.len());

    loop {
        input.clear();
        if stream.read_buf(&mut input).await? == 0 {
            return Ok(());
        }
        info!(%peer, "received: {}", String::from_utf8_lossy(&input).trim());

        output.clear();
        output.put_slice(ECHO_PREFIX);
        output.put_slice(&input);
        stream.write_all(&output).await?;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
