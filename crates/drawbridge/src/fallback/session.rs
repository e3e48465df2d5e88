//! Per-connection verification state machine.
//!
//! The session never touches the socket: the gateway feeds it decoded
//! packets with the time they arrived and flushes [`Session::take_outbox`]
//! after every call. The first packet that does not fit the current stage
//! ends the session.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moat_common::{AddressRecord, CaptchaKind};
use rand::Rng;
use uuid::Uuid;

use super::behavior::{FallCheck, FallProgress, PLATFORM_TOP, PLATFORM_X, PLATFORM_Y, PLATFORM_Z, SPAWN_X, SPAWN_Z};
use super::{Progress, SessionFailure, SessionSettings, SessionState};
use crate::captcha::{CaptchaChallenge, CaptchaPool};
use crate::protocol::packets::play::brand_channel;
use crate::protocol::packets::{
    BlockChange, BlockKind, ClientSettings, Clientbound, EmptyChunk, JoinGame, KeepAlive, PlayerAbilities,
    PluginMessage, PositionLook, Serverbound, SetExperience, SetSlot, SystemChat,
};
use crate::protocol::version::ProtocolVersion::{V1_9, V1_12_2};
use crate::protocol::{ProtocolError, ProtocolVersion};

/// Position updates between keepalives while a CAPTCHA is shown
const KEEP_ALIVE_INTERVAL: u32 = 20;

/// Hotbar slots 0-8
const HOTBAR_SLOTS: i16 = 9;

/// Handshake sub-steps seen so far
#[derive(Debug, Default)]
struct HandshakeSteps {
    settings: bool,
    brand: bool,
}

#[derive(Debug)]
struct CaptchaStage {
    challenge: Arc<CaptchaChallenge>,
    attempts_left: u32,
    started: Instant,
    /// Remaining whole seconds last shown on the experience bar
    countdown: u64,
    movements: u32,
    /// Puzzle: currently held hotbar slot
    selected: i16,
    /// 1.9+: teleport to the platform not yet confirmed
    teleport_id: Option<i32>,
}

pub struct Session {
    address: IpAddr,
    username: String,
    identity: Uuid,
    version: ProtocolVersion,
    settings: Arc<SessionSettings>,
    pool: Arc<CaptchaPool>,
    state: SessionState,
    started: Instant,
    run_behavior: bool,
    steps: HandshakeSteps,
    /// Keepalive id awaiting its echo
    keep_alive: Option<i64>,
    fall: Option<FallCheck>,
    captcha: Option<CaptchaStage>,
    brand: Option<String>,
    outbox: Vec<Clientbound>,
}

impl Session {
    pub fn new(
        address: IpAddr,
        username: impl Into<String>,
        identity: Uuid,
        version: ProtocolVersion,
        settings: Arc<SessionSettings>,
        pool: Arc<CaptchaPool>,
    ) -> Self {
        Self {
            address,
            username: username.into(),
            identity,
            version,
            settings,
            pool,
            state: SessionState::Handshake,
            started: Instant::now(),
            run_behavior: false,
            steps: HandshakeSteps::default(),
            keep_alive: None,
            fall: None,
            captcha: None,
            brand: None,
            outbox: Vec::new(),
        }
    }

    /// Joins the client into the fallback world; `verifying` is the number of
    /// sessions currently being verified
    pub fn start(&mut self, now: Instant, verifying: usize) {
        self.started = now;
        self.run_behavior =
            self.settings.behavior_enabled() && verifying >= self.settings.behavior_min_verifying;
        let entity_id = rand::rng().random_range(1..i32::MAX);
        self.outbox.push(Clientbound::JoinGame(JoinGame::new(entity_id)));
        self.send_keep_alive();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Client brand, once received
    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    /// Entry for the verified store
    pub fn record(&self) -> AddressRecord {
        AddressRecord::new(self.address, Some(self.identity))
    }

    /// Packets queued since the last call, in send order
    pub fn take_outbox(&mut self) -> Vec<Clientbound> {
        std::mem::take(&mut self.outbox)
    }

    /// When the current stage times out
    pub fn deadline(&self) -> Instant {
        match &self.captcha {
            Some(captcha) if self.state.is_captcha() => captcha.started + self.settings.captcha_max_duration,
            _ => self.started + self.settings.verification_timeout,
        }
    }

    /// Fails the session because its deadline passed
    pub fn expire(&mut self) -> SessionFailure {
        let stage = self.state;
        self.state = SessionState::Failed;
        SessionFailure::Timeout { stage }
    }

    /// Feeds one packet received at `now`
    pub fn handle(&mut self, packet: Serverbound, now: Instant) -> Result<Progress, SessionFailure> {
        let result = if now >= self.deadline() && !self.state.is_finished() {
            Err(SessionFailure::Timeout { stage: self.state })
        } else {
            self.dispatch(packet, now)
        };
        match &result {
            Ok(Progress::Verified) => self.state = SessionState::Verified,
            Ok(Progress::Continue) => {}
            Err(_) => self.state = SessionState::Failed,
        }
        result
    }

    fn dispatch(&mut self, packet: Serverbound, now: Instant) -> Result<Progress, SessionFailure> {
        match self.state {
            SessionState::Handshake => self.on_handshake(packet, now),
            SessionState::BehaviorCheck => self.on_behavior(packet, now),
            SessionState::CaptchaHand | SessionState::CaptchaPuzzle => self.on_captcha(packet, now),
            SessionState::Verified | SessionState::Failed => Err(self.unexpected(&packet)),
        }
    }

    fn unexpected(&self, packet: &Serverbound) -> SessionFailure {
        SessionFailure::Unexpected {
            state: self.state,
            packet: packet.name(),
        }
    }

    fn on_handshake(&mut self, packet: Serverbound, now: Instant) -> Result<Progress, SessionFailure> {
        match packet {
            Serverbound::ClientSettings(settings) if !self.steps.settings => {
                self.check_settings(&settings)?;
                self.steps.settings = true;
                Ok(Progress::Continue)
            }
            Serverbound::PluginMessage(message) if !message.is_brand_channel() => Ok(Progress::Continue),
            Serverbound::PluginMessage(message) if self.steps.settings && !self.steps.brand => {
                self.check_brand(&message)?;
                self.steps.brand = true;
                Ok(Progress::Continue)
            }
            Serverbound::KeepAlive(keep_alive) if self.steps.brand => {
                self.check_keep_alive(keep_alive)?;
                self.advance(now)
            }
            other => Err(self.unexpected(&other)),
        }
    }

    fn on_behavior(&mut self, packet: Serverbound, now: Instant) -> Result<Progress, SessionFailure> {
        match &packet {
            Serverbound::ClientSettings(settings) => {
                self.check_settings(settings)?;
                return Ok(Progress::Continue);
            }
            Serverbound::PluginMessage(message) if !message.is_brand_channel() => {
                return Ok(Progress::Continue);
            }
            _ => {}
        }

        let unexpected = self.unexpected(&packet);
        let Some(check) = self.fall.as_mut() else {
            return Err(unexpected);
        };
        let progress = match packet {
            Serverbound::TeleportConfirm(confirm) => {
                check.confirm(confirm.teleport_id).map_err(SessionFailure::Behavior)?;
                FallProgress::Pending
            }
            Serverbound::Position(position) => check
                .movement(position.x, position.y, position.z, position.on_ground)
                .map_err(SessionFailure::Behavior)?,
            Serverbound::PositionRotation(position) => check
                .movement(position.x, position.y, position.z, position.on_ground)
                .map_err(SessionFailure::Behavior)?,
            Serverbound::Rotation(rotation) => {
                check.ground_flag(rotation.on_ground).map_err(SessionFailure::Behavior)?;
                FallProgress::Pending
            }
            Serverbound::OnGround(flag) => {
                check.ground_flag(flag.on_ground).map_err(SessionFailure::Behavior)?;
                FallProgress::Pending
            }
            _ => return Err(unexpected),
        };

        match progress {
            FallProgress::Passed => self.advance(now),
            FallProgress::Pending => Ok(Progress::Continue),
        }
    }

    fn on_captcha(&mut self, packet: Serverbound, now: Instant) -> Result<Progress, SessionFailure> {
        let unexpected = self.unexpected(&packet);
        let puzzle = self.state == SessionState::CaptchaPuzzle;
        match packet {
            Serverbound::ClientSettings(settings) => {
                self.check_settings(&settings)?;
                Ok(Progress::Continue)
            }
            Serverbound::PluginMessage(message) if !message.is_brand_channel() => Ok(Progress::Continue),
            Serverbound::Position(_) | Serverbound::PositionRotation(_) => {
                self.tick_countdown(now);
                Ok(Progress::Continue)
            }
            Serverbound::Rotation(_) | Serverbound::OnGround(_) => Ok(Progress::Continue),
            Serverbound::KeepAlive(keep_alive) => {
                self.check_keep_alive(keep_alive)?;
                Ok(Progress::Continue)
            }
            Serverbound::TeleportConfirm(confirm) => {
                let captcha = self.captcha.as_mut().ok_or(unexpected)?;
                if captcha.teleport_id.take() != Some(confirm.teleport_id) {
                    return Err(ProtocolError::Invalid("teleport id").into());
                }
                Ok(Progress::Continue)
            }
            Serverbound::Chat(chat) if !puzzle => {
                if !self.settings.validation.chat.is_match(&chat.message) {
                    return Err(SessionFailure::InvalidInput { field: "chat" });
                }
                self.submit(&chat.message)
            }
            Serverbound::HeldItemChange(held) => {
                if let Some(captcha) = self.captcha.as_mut() {
                    captcha.selected = held.slot;
                }
                Ok(Progress::Continue)
            }
            Serverbound::ArmAnimation(_) if puzzle => {
                let selected = self.captcha.as_ref().ok_or(unexpected)?.selected;
                self.submit(&selected.to_string())
            }
            // swinging while reading the code is harmless
            Serverbound::ArmAnimation(_) => Ok(Progress::Continue),
            _ => Err(unexpected),
        }
    }

    fn check_settings(&self, settings: &ClientSettings) -> Result<(), SessionFailure> {
        if !self.settings.validation.locale.is_match(&settings.locale) {
            return Err(SessionFailure::InvalidInput { field: "locale" });
        }
        Ok(())
    }

    fn check_brand(&mut self, message: &PluginMessage) -> Result<(), SessionFailure> {
        if message.channel != brand_channel(self.version) {
            return Err(ProtocolError::Invalid("brand channel").into());
        }
        let brand = message.brand(self.version, self.settings.max_brand_length)?;
        if !self.settings.validation.brand.is_match(&brand) {
            return Err(SessionFailure::InvalidInput { field: "brand" });
        }
        self.brand = Some(brand);
        Ok(())
    }

    fn check_keep_alive(&mut self, keep_alive: KeepAlive) -> Result<(), SessionFailure> {
        match self.keep_alive.take() {
            Some(id) if id == keep_alive.id => Ok(()),
            Some(_) => Err(ProtocolError::Invalid("keep alive id").into()),
            None => Err(self.unexpected(&Serverbound::KeepAlive(keep_alive))),
        }
    }

    fn send_keep_alive(&mut self) {
        let mut rng = rand::rng();
        // older clients carry a 32-bit id
        let id = if self.version >= V1_12_2 {
            rng.random_range(1..i64::MAX)
        } else {
            rng.random_range(1..i32::MAX) as i64
        };
        self.keep_alive = Some(id);
        self.outbox.push(Clientbound::KeepAlive(KeepAlive { id }));
    }

    /// Moves on from a finished stage
    fn advance(&mut self, now: Instant) -> Result<Progress, SessionFailure> {
        if self.state == SessionState::Handshake && self.run_behavior {
            self.begin_behavior();
            return Ok(Progress::Continue);
        }
        match self.settings.captcha {
            Some(kind) => {
                self.begin_captcha(kind, now)?;
                Ok(Progress::Continue)
            }
            None => Ok(Progress::Verified),
        }
    }

    fn send_platform(&mut self) {
        self.outbox.push(Clientbound::EmptyChunk(EmptyChunk { x: 0, z: 0 }));
        for x in PLATFORM_X - 1..=PLATFORM_X + 1 {
            for z in PLATFORM_Z - 1..=PLATFORM_Z + 1 {
                self.outbox.push(Clientbound::BlockChange(BlockChange {
                    x,
                    y: PLATFORM_Y,
                    z,
                    block: BlockKind::Stone,
                }));
            }
        }
    }

    fn teleport(&mut self, y: f64, teleport_id: i32) {
        self.outbox.push(Clientbound::PositionLook(PositionLook {
            x: SPAWN_X,
            y,
            z: SPAWN_Z,
            yaw: 0.0,
            pitch: 0.0,
            teleport_id,
        }));
    }

    fn begin_behavior(&mut self) {
        let teleport_id = rand::rng().random_range(1..i32::MAX);
        let check = FallCheck::new(
            teleport_id,
            self.version >= V1_9,
            self.settings.movement_ticks,
            self.settings.gravity,
            self.settings.collision,
        );
        self.send_platform();
        self.outbox.push(Clientbound::PlayerAbilities(PlayerAbilities::grounded()));
        self.teleport(check.spawn_y(), teleport_id);
        self.fall = Some(check);
        self.state = SessionState::BehaviorCheck;
    }

    fn begin_captcha(&mut self, kind: CaptchaKind, now: Instant) -> Result<(), SessionFailure> {
        let challenge = self.pool.random().ok_or(SessionFailure::Preparing)?;

        if self.fall.is_none() {
            self.send_platform();
        }
        let teleport_id = rand::rng().random_range(1..i32::MAX);
        self.outbox.push(Clientbound::PlayerAbilities(PlayerAbilities::frozen()));
        self.teleport(PLATFORM_TOP, teleport_id);
        for hotbar in 0..HOTBAR_SLOTS {
            self.outbox.push(Clientbound::SetSlot(SetSlot::hotbar_map(hotbar)));
        }
        self.outbox.extend(challenge.map_packets(self.version));

        let instructions = match kind {
            CaptchaKind::Hand => &self.settings.messages.captcha_hand,
            CaptchaKind::Puzzle => &self.settings.messages.captcha_puzzle,
        };
        self.outbox.push(Clientbound::SystemChat(SystemChat::text(instructions)));

        let countdown = self.settings.captcha_max_duration.as_secs();
        self.outbox
            .push(countdown_packet(countdown, self.settings.captcha_max_duration));

        self.captcha = Some(CaptchaStage {
            challenge,
            attempts_left: self.settings.captcha_max_attempts.max(1),
            started: now,
            countdown,
            movements: 0,
            selected: 0,
            teleport_id: (self.version >= V1_9).then_some(teleport_id),
        });
        self.state = match kind {
            CaptchaKind::Hand => SessionState::CaptchaHand,
            CaptchaKind::Puzzle => SessionState::CaptchaPuzzle,
        };
        Ok(())
    }

    /// Refreshes the countdown and keeps the connection alive
    fn tick_countdown(&mut self, now: Instant) {
        let total = self.settings.captcha_max_duration;
        let Some(captcha) = self.captcha.as_mut() else {
            return;
        };
        let remaining = total
            .saturating_sub(now.saturating_duration_since(captcha.started))
            .as_secs();
        if remaining != captcha.countdown {
            captcha.countdown = remaining;
            self.outbox.push(countdown_packet(remaining, total));
        }

        captcha.movements += 1;
        let due = captcha.movements >= KEEP_ALIVE_INTERVAL;
        if due {
            captcha.movements = 0;
        }
        if due && self.keep_alive.is_none() {
            self.send_keep_alive();
        }
    }

    fn submit(&mut self, guess: &str) -> Result<Progress, SessionFailure> {
        let Some(captcha) = self.captcha.as_mut() else {
            return Err(SessionFailure::Challenge);
        };
        if guess == captcha.challenge.answer() {
            return Ok(Progress::Verified);
        }
        captcha.attempts_left = captcha.attempts_left.saturating_sub(1);
        if captcha.attempts_left == 0 {
            return Err(SessionFailure::Challenge);
        }
        let message = self
            .settings
            .messages
            .incorrect_captcha
            .replace("{attempts}", &captcha.attempts_left.to_string());
        self.outbox.push(Clientbound::SystemChat(SystemChat::text(&message)));
        Ok(Progress::Continue)
    }
}

/// Experience bar showing `remaining` of `total` seconds
fn countdown_packet(remaining: u64, total: Duration) -> Clientbound {
    let total = total.as_secs();
    let bar = if total == 0 { 0.0 } else { remaining as f32 / total as f32 };
    Clientbound::SetExperience(SetExperience {
        bar: bar.clamp(0.0, 1.0),
        level: remaining.min(i32::MAX as u64) as i32,
        total: 0,
    })
}
