//! Shared constants for Moat components.

/// Default game listener address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:25565";

/// Default backend game server address
pub const DEFAULT_BACKEND_ADDR: &str = "127.0.0.1:25566";

/// Default admin HTTP listen address
pub const DEFAULT_ADMIN_ADDR: &str = "127.0.0.1:8888";

/// Overall verification timeout (seconds)
pub const VERIFICATION_TIMEOUT_SECS: u64 = 15;

/// Read timeout for the initial handshake/login frames (milliseconds)
pub const READ_TIMEOUT_MS: u64 = 3_000;

/// Minimum pause between two verification attempts of one address (milliseconds)
pub const REJOIN_DELAY_MS: u64 = 8_000;

/// Sessions allowed in verification at once
pub const MAX_VERIFYING: usize = 1_024;

/// Admissions per queue tick
pub const MAX_QUEUE_POLLS: usize = 20;

/// Queue tick interval (milliseconds)
pub const QUEUE_POLL_INTERVAL_MS: u64 = 1_000;

/// Longest a queued connection waits for a slot (seconds)
pub const QUEUE_MAX_WAIT_SECS: u64 = 30;

/// Waiting connections before new ones are turned away
pub const MAX_QUEUE_SIZE: usize = 8_192;

/// Attempts per address per window
pub const RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Rate limit window (seconds)
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Pending durable writes per address table before new ones stay in memory only
pub const STORE_WRITE_BUFFER: usize = 4_096;

/// Interval for purging expired rate limit and deny entries (seconds)
pub const PURGE_INTERVAL_SECS: u64 = 30;

/// Minor failures before an address is temporarily denied
pub const DENY_THRESHOLD: u32 = 2;

/// Temporary deny duration (seconds)
pub const DENY_DURATION_SECS: u64 = 600;

/// Ticks of free fall checked by the gravity check
pub const MOVEMENT_TICKS: u32 = 8;

/// CAPTCHA answer attempts
pub const CAPTCHA_MAX_ATTEMPTS: u32 = 3;

/// CAPTCHA stage time limit (seconds)
pub const CAPTCHA_MAX_DURATION_SECS: u64 = 45;

/// Challenges kept in the precomputed pool
pub const CAPTCHA_PRECOMPUTE: usize = 500;

/// Pool rebuild interval (seconds)
pub const CAPTCHA_REFRESH_SECS: u64 = 3_600;

/// Default answer alphabet for text challenges
pub const CAPTCHA_DICTIONARY: &str = "abcdefhjkmnoprstuxyz2345678";

/// Default text challenge answer length
pub const CAPTCHA_ANSWER_LENGTH: usize = 5;

/// Largest frame a client may send before it is verified (bytes)
pub const MAX_SERVERBOUND_FRAME_LEN: usize = 32 * 1024;

/// Longest accepted client brand
pub const MAX_BRAND_LENGTH: usize = 64;

/// Storage table and column names
pub mod tables {
    /// Addresses that passed verification, entries `ip,uuid`
    pub const VERIFIED: &str = "verified";

    /// Permanently blacklisted addresses, entries `ip`
    pub const BLACKLIST: &str = "blacklist";

    /// Column holding the serialized entries of a table
    pub const ENTRIES: &str = "entries";
}

/// Redis key layout
pub mod redis_keys {
    /// Prefix for every table key: moat:{table}:{column}
    pub const TABLE_PREFIX: &str = "moat:";

    /// Full key of a table column
    pub fn table_key(table: &str, column: &str) -> String {
        format!("{TABLE_PREFIX}{table}:{column}")
    }
}
