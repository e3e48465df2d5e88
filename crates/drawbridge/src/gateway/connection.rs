//! One client connection, from the first byte to the verdict.

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use moat_common::constants::MAX_SERVERBOUND_FRAME_LEN;
use moat_common::{AddressRecord, FailureSeverity};

use crate::fallback::{Progress, Session, SessionFailure};
use crate::limits::{Admission, RateDecision};
use crate::protocol::packets::chat::text_component;
use crate::protocol::packets::{
    Clientbound, Disconnect, Handshake, LoginDisconnect, LoginStart, LoginSuccess, NextState, Serverbound,
};
use crate::protocol::{FrameCodec, ProtocolError, ProtocolVersion, offline_uuid};
use crate::state::AppState;

use super::proxy;

/// First byte of a pre-netty server list ping
const LEGACY_PING: u8 = 0xFE;

type Connection = Framed<TcpStream, FrameCodec>;

/// Why a login was turned away before verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Blacklisted,
    Denied { seconds: u64 },
    UnsupportedVersion,
    InvalidUsername,
    RateLimited,
    RejoinTooFast,
    AlreadyVerifying,
    QueueFull,
    QueueTimeout { position: usize },
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Blacklisted => "blacklisted",
            Self::Denied { .. } => "denied",
            Self::UnsupportedVersion => "unsupported version",
            Self::InvalidUsername => "invalid username",
            Self::RateLimited => "rate limited",
            Self::RejoinTooFast => "rejoin too fast",
            Self::AlreadyVerifying => "already verifying",
            Self::QueueFull => "queue full",
            Self::QueueTimeout { .. } => "queue timeout",
        }
    }

    fn message(self, state: &AppState) -> String {
        let messages = &state.config.messages;
        match self {
            Self::Blacklisted => messages.blacklisted.clone(),
            Self::Denied { seconds } => messages.denied.replace("{seconds}", &seconds.to_string()),
            Self::UnsupportedVersion => messages.unsupported_version.clone(),
            Self::InvalidUsername => messages.invalid_username.clone(),
            Self::RateLimited => messages.rate_limited.clone(),
            Self::RejoinTooFast => messages.rejoin_too_fast.clone(),
            Self::AlreadyVerifying => messages.already_verifying.clone(),
            Self::QueueFull => messages.queue_full.clone(),
            Self::QueueTimeout { position } => messages.queued.replace("{position}", &position.to_string()),
        }
    }
}

/// Drives one accepted connection
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: AppState) -> Result<()> {
    let address = peer.ip();
    let read_timeout = Duration::from_millis(state.config.verification.read_timeout_ms);
    stream.set_nodelay(true).ok();

    let mut first = [0u8; 1];
    let peeked = tokio::time::timeout(read_timeout, stream.peek(&mut first))
        .await
        .context("No data before read timeout")??;
    if peeked == 0 {
        return Ok(());
    }
    if first[0] == LEGACY_PING {
        return proxy::pipe(stream, &state.config.backend_addr, &[], Default::default()).await;
    }

    let mut framed = Framed::new(stream, FrameCodec::new(MAX_SERVERBOUND_FRAME_LEN));
    let Some(handshake_frame) = next_frame(&mut framed, read_timeout).await? else {
        return Ok(());
    };
    let handshake = Handshake::decode_frame(handshake_frame.clone())?;
    if handshake.next_state == NextState::Status {
        return forward(framed, &state, vec![handshake_frame]).await;
    }

    let Some(login_frame) = next_frame(&mut framed, read_timeout).await? else {
        return Ok(());
    };
    let frames = vec![handshake_frame, login_frame.clone()];

    if state.blacklist.has(&address) {
        return reject(framed, &state, address, Rejection::Blacklisted).await;
    }
    if let Some(left) = state.deny_list.remaining_at(&address, Instant::now()) {
        let seconds = left.as_secs().max(1);
        return reject(framed, &state, address, Rejection::Denied { seconds }).await;
    }

    let Some(version) = ProtocolVersion::from_protocol(handshake.protocol) else {
        // no layout to read the login with; the address alone decides
        if state.verified.has(&address) {
            return forward(framed, &state, frames).await;
        }
        tracing::debug!(address = %address, protocol = handshake.protocol, "Unsupported protocol");
        return reject(framed, &state, address, Rejection::UnsupportedVersion).await;
    };

    let login = LoginStart::decode_frame(login_frame, version)?;
    let identity = login.uuid.unwrap_or_else(|| offline_uuid(&login.username));
    if state.verified.has_identity(&address, &identity) {
        tracing::debug!(address = %address, username = %login.username, "Verified player, piping to backend");
        return forward(framed, &state, frames).await;
    }

    if !state.settings.validation.username.is_match(&login.username) {
        return reject(framed, &state, address, Rejection::InvalidUsername).await;
    }
    match state.rate_limiter.check(address) {
        RateDecision::Allowed => {}
        RateDecision::Limited => return reject(framed, &state, address, Rejection::RateLimited).await,
        RateDecision::CoolingDown => return reject(framed, &state, address, Rejection::RejoinTooFast).await,
    }
    let Some(_claim) = state.begin_verifying(address) else {
        return reject(framed, &state, address, Rejection::AlreadyVerifying).await;
    };

    let _permit = match state.queue.try_admit() {
        Admission::Admitted(permit) => permit,
        Admission::Queued(ticket) => {
            let position = ticket.position;
            tracing::debug!(address = %address, position = position, "Queued for verification");
            let max_wait = Duration::from_secs(state.config.queue.max_wait_secs);
            match tokio::time::timeout(max_wait, ticket.wait()).await {
                Ok(Some(permit)) => permit,
                Ok(None) => return Ok(()),
                // the dropped ticket hands its slot back on the next poll
                Err(_) => return reject(framed, &state, address, Rejection::QueueTimeout { position }).await,
            }
        }
        Admission::Rejected => return reject(framed, &state, address, Rejection::QueueFull).await,
    };

    let result = verify(&mut framed, &state, address, login.username, identity, version).await;
    state.rate_limiter.mark_finished(address);
    result
}

/// Runs the fallback session and applies its verdict
async fn verify(
    framed: &mut Connection,
    state: &AppState,
    address: IpAddr,
    username: String,
    identity: uuid::Uuid,
    version: ProtocolVersion,
) -> Result<()> {
    let success = LoginSuccess {
        uuid: identity,
        username: username.clone(),
    };
    framed.send(success.encode_frame(version)).await?;

    let mut session = Session::new(
        address,
        username,
        identity,
        version,
        state.settings.clone(),
        state.captcha_pool.clone(),
    );
    session.start(Instant::now(), state.queue.active());
    flush(framed, &mut session).await?;

    let read_timeout = Duration::from_millis(state.config.verification.read_timeout_ms);
    let outcome = loop {
        match step(framed, &mut session, read_timeout).await {
            Ok(Some(Progress::Continue)) => flush(framed, &mut session).await?,
            Ok(Some(Progress::Verified)) => break Ok(()),
            Ok(None) => {
                tracing::debug!(address = %address, state = %session.state(), "Client left during verification");
                return Ok(());
            }
            Err(failure) => break Err(failure),
        }
    };
    // anything queued before the verdict, like a last wrong-answer message
    flush(framed, &mut session).await.ok();

    match outcome {
        Ok(()) => {
            state.verified.add(session.record());
            tracing::info!(
                address = %address,
                username = session.username(),
                version = %version,
                brand = session.brand().unwrap_or("-"),
                "✅ Player verified"
            );
            disconnect(framed, version, &state.config.messages.verified).await;
        }
        Err(failure) => {
            record_failure(state, &session, &failure);
            let message = state.config.messages.for_failure(&failure).to_string();
            disconnect(framed, version, &message).await;
        }
    }
    Ok(())
}

/// Waits for the next packet; `None` once the client hung up
async fn step(
    framed: &mut Connection,
    session: &mut Session,
    read_timeout: Duration,
) -> Result<Option<Progress>, SessionFailure> {
    let read_deadline = tokio::time::Instant::now() + read_timeout;
    let deadline = tokio::time::Instant::from_std(session.deadline()).min(read_deadline);
    let frame = match tokio::time::timeout_at(deadline, framed.next()).await {
        Err(_) => return Err(session.expire()),
        Ok(None) => return Ok(None),
        // a reset connection is a client leaving, not a malformed packet
        Ok(Some(Err(ProtocolError::Io(_)))) => return Ok(None),
        Ok(Some(frame)) => frame?,
    };
    let packet = Serverbound::decode_frame(frame.freeze(), session.version())?;
    session.handle(packet, Instant::now()).map(Some)
}

fn record_failure(state: &AppState, session: &Session, failure: &SessionFailure) {
    let address = session.address();
    if failure.is_protocol() {
        tracing::debug!(address = %address, username = session.username(), error = %failure, "Protocol violation");
    } else {
        tracing::info!(address = %address, username = session.username(), reason = %failure, "❌ Verification failed");
    }

    let Some(severity) = failure.severity() else {
        return;
    };
    if state.deny_list.record_failure(address, severity) {
        tracing::info!(address = %address, "Address temporarily denied");
    }
    if severity == FailureSeverity::Severe && state.config.blacklist.blacklist_on_severe {
        state.blacklist.add(AddressRecord::new(address, None));
        tracing::warn!(address = %address, "Address blacklisted");
    }
}

async fn next_frame(framed: &mut Connection, read_timeout: Duration) -> Result<Option<Bytes>> {
    match tokio::time::timeout(read_timeout, framed.next()).await {
        Err(_) => anyhow::bail!("read timed out"),
        Ok(None) => Ok(None),
        Ok(Some(frame)) => Ok(Some(frame?.freeze())),
    }
}

/// Encodes and writes everything the session queued
async fn flush(framed: &mut Connection, session: &mut Session) -> Result<(), ProtocolError> {
    let version = session.version();
    let outbox = session.take_outbox();
    if outbox.is_empty() {
        return Ok(());
    }
    for packet in outbox {
        if !packet.is_supported(version) {
            return Err(ProtocolError::Unsupported {
                packet: packet.name(),
                version,
            });
        }
        framed.feed(packet.encode_frame(version)).await?;
    }
    framed.flush().await
}

/// Play-phase disconnect; errors are ignored since the socket is closing anyway
async fn disconnect(framed: &mut Connection, version: ProtocolVersion, message: &str) {
    let packet = Clientbound::Disconnect(Disconnect::text(message));
    framed.send(packet.encode_frame(version)).await.ok();
}

async fn reject(mut framed: Connection, state: &AppState, address: IpAddr, rejection: Rejection) -> Result<()> {
    tracing::debug!(address = %address, reason = rejection.as_str(), "Login rejected");
    let packet = LoginDisconnect {
        reason: text_component(&rejection.message(state)),
    };
    framed.send(packet.encode_frame()).await?;
    Ok(())
}

async fn forward(framed: Connection, state: &AppState, frames: Vec<Bytes>) -> Result<()> {
    let parts = framed.into_parts();
    proxy::pipe(parts.io, &state.config.backend_addr, &frames, parts.read_buf).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::protocol::Decode;
    use crate::protocol::buffer::ReadExt;
    use crate::protocol::packets::play::{ClientSettings, KeepAlive, PluginMessage};
    use crate::protocol::packets::ids;
    use crate::protocol::version::ProtocolVersion::V1_8;
    use crate::state::tests::test_state;
    use tokio::net::TcpListener;

    async fn gateway(state: AppState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                let state = state.clone();
                tokio::spawn(async move { handle_connection(stream, peer, state).await });
            }
        });
        addr
    }

    fn quick_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.behavior.gravity = false;
        config.behavior.collision = false;
        config
    }

    async fn login(addr: SocketAddr, version: ProtocolVersion, username: &str) -> Connection {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Framed::new(stream, FrameCodec::default());
        let handshake = Handshake {
            protocol: version.protocol(),
            host: "localhost".into(),
            port: 25565,
            next_state: NextState::Login,
        };
        client.send(handshake.encode_frame()).await.unwrap();
        let start = LoginStart::new(username).encode_frame(version);
        client.send(start).await.unwrap();
        client
    }

    async fn read(client: &mut Connection) -> Bytes {
        client.next().await.unwrap().unwrap().freeze()
    }

    fn packet_id(frame: &Bytes) -> i32 {
        frame.clone().read_var_int().unwrap()
    }

    #[tokio::test]
    async fn test_clean_client_is_verified_then_piped_state() {
        let state = test_state(quick_config());
        let addr = gateway(state.clone()).await;
        let version = V1_8;

        let mut client = login(addr, version, "Steve").await;
        let success = read(&mut client).await;
        assert_eq!(packet_id(&success), ids::login::SUCCESS);

        // join game, then the keepalive to echo
        read(&mut client).await;
        let mut keep_alive = read(&mut client).await;
        keep_alive.read_var_int().unwrap();
        let keep_alive = KeepAlive::decode(&mut keep_alive, version).unwrap();

        let settings = ClientSettings {
            locale: "en_us".into(),
            ..ClientSettings::default()
        };
        for packet in [
            Serverbound::ClientSettings(settings),
            Serverbound::PluginMessage(PluginMessage::brand_message("vanilla", version)),
            Serverbound::KeepAlive(keep_alive),
        ] {
            client.send(packet.encode_frame(version)).await.unwrap();
        }

        // disconnect with the verified message
        read(&mut client).await;
        let address: IpAddr = "127.0.0.1".parse().unwrap();
        let identity = offline_uuid("Steve");
        assert!(state.verified.has_identity(&address, &identity));
    }

    #[tokio::test]
    async fn test_misbehaving_client_is_denied() {
        let state = test_state(quick_config());
        let addr = gateway(state.clone()).await;
        let version = V1_8;

        let mut client = login(addr, version, "Bot").await;
        read(&mut client).await;
        // skip settings and brand
        client
            .send(Serverbound::KeepAlive(KeepAlive { id: 1 }).encode_frame(version))
            .await
            .unwrap();
        while client.next().await.is_some() {}

        let address: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(state.deny_list.is_denied(&address));
        assert!(!state.verified.has(&address));

        let mut retry = login(addr, version, "Bot").await;
        let rejected = read(&mut retry).await;
        assert_eq!(packet_id(&rejected), ids::login::DISCONNECT);
    }

    #[tokio::test]
    async fn test_invalid_username_is_rejected() {
        let state = test_state(quick_config());
        let addr = gateway(state).await;
        let mut client = login(addr, V1_8, "bad name").await;
        let rejected = read(&mut client).await;
        assert_eq!(packet_id(&rejected), ids::login::DISCONNECT);
    }

    #[tokio::test]
    async fn test_queued_client_is_told_its_position_after_max_wait() {
        let mut config = quick_config();
        config.queue.max_verifying = 1;
        config.queue.max_wait_secs = 1;
        let state = test_state(config);
        let Admission::Admitted(_held) = state.queue.try_admit() else {
            panic!("first slot should be free");
        };
        let addr = gateway(state.clone()).await;

        let mut client = login(addr, V1_8, "Waiter").await;
        let rejected = tokio::time::timeout(Duration::from_secs(5), read(&mut client))
            .await
            .unwrap();
        assert_eq!(packet_id(&rejected), ids::login::DISCONNECT);
        assert!(String::from_utf8_lossy(&rejected).contains("number 1"));
        assert!(!state.verified.has(&"127.0.0.1".parse().unwrap()));
    }
}
