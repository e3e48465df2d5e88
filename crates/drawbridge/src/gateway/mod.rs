//! Game-facing TCP listener.
//!
//! Reads the handshake and login itself, pipes status pings and verified
//! players to the backend, and runs everyone else through a fallback session.

mod connection;
mod proxy;

pub use connection::handle_connection;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::state::AppState;

/// Accepts connections until shutdown, one task per connection
pub async fn serve(listener: TcpListener, state: AppState, mut shutdown: broadcast::Receiver<()>) {
    let mut accepted: u64 = 0;
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    accepted += 1;
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, state).await {
                            tracing::debug!(address = %peer.ip(), error = %e, "Connection closed with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            },
            _ = shutdown.recv() => {
                tracing::info!(
                    accepted = accepted,
                    "🛑 Game listener shutting down..."
                );
                break;
            }
        }
    }
}
