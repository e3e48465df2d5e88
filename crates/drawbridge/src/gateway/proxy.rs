//! Piping a client through to the backend.

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::protocol::frame::reframe;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to `backend`, replays what was already read from the client and
/// copies both directions until either side closes.
///
/// `frames` are unprefixed frames consumed while inspecting the connection;
/// `leftover` is whatever the client sent after them.
pub async fn pipe(mut client: TcpStream, backend: &str, frames: &[Bytes], leftover: BytesMut) -> Result<()> {
    let mut upstream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(backend))
        .await
        .context("Backend connect timed out")?
        .with_context(|| format!("Failed to connect to backend {backend}"))?;
    upstream.set_nodelay(true).ok();

    for frame in frames {
        upstream.write_all(&reframe(frame)).await.context("Failed to replay frame")?;
    }
    if !leftover.is_empty() {
        upstream.write_all(&leftover).await.context("Failed to replay buffered data")?;
    }

    let (sent, received) = tokio::io::copy_bidirectional(&mut client, &mut upstream)
        .await
        .context("Pipe closed with error")?;
    tracing::debug!(backend = backend, sent = sent, received = received, "Pipe closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_replays_frames_then_copies() {
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap().to_string();
        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let front_addr = front.local_addr().unwrap();

        let proxy = tokio::spawn(async move {
            let (client, _) = front.accept().await.unwrap();
            let frames = [Bytes::from_static(&[0x00, 0x2A])];
            pipe(client, &backend_addr, &frames, BytesMut::from(&b"rest"[..])).await
        });

        let mut client = TcpStream::connect(front_addr).await.unwrap();
        let (mut upstream, _) = backend.accept().await.unwrap();

        let mut replayed = [0u8; 7];
        upstream.read_exact(&mut replayed).await.unwrap();
        assert_eq!(&replayed, &[0x02, 0x00, 0x2A, b'r', b'e', b's', b't']);

        client.write_all(b"ping").await.unwrap();
        let mut forwarded = [0u8; 4];
        upstream.read_exact(&mut forwarded).await.unwrap();
        assert_eq!(&forwarded, b"ping");

        upstream.write_all(b"pong").await.unwrap();
        let mut back = [0u8; 4];
        client.read_exact(&mut back).await.unwrap();
        assert_eq!(&back, b"pong");

        drop(client);
        drop(upstream);
        proxy.await.unwrap().ok();
    }
}
