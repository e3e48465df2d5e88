//! Core types shared across Moat components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

/// CAPTCHA challenge variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaKind {
    /// Map with distorted text; the answer is typed in chat
    #[default]
    Hand,
    /// 3x3 numbered grid; the answer is picked from the hotbar and swung
    Puzzle,
}

/// How hard a verification failure counts against an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSeverity {
    /// Counted; denied once the per-address threshold is reached
    Minor,
    /// Denied immediately
    Severe,
}

impl FailureSeverity {
    pub fn is_severe(&self) -> bool {
        matches!(self, Self::Severe)
    }
}

/// One persisted address entry.
///
/// Serialized as `ip,uuid` in the verified table and as `ip` in the blacklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Remote address
    pub address: IpAddr,

    /// Identity that passed verification from this address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Uuid>,
}

impl AddressRecord {
    pub fn new(address: IpAddr, identity: Option<Uuid>) -> Self {
        Self { address, identity }
    }

    /// Storage entry for this record
    pub fn to_entry(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            Some(identity) => write!(f, "{},{}", self.address, identity),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Error returned when a stored entry cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry(pub String);

impl fmt::Display for InvalidEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address entry: {:?}", self.0)
    }
}

impl std::error::Error for InvalidEntry {}

impl FromStr for AddressRecord {
    type Err = InvalidEntry;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidEntry(entry.to_string());
        let (address, identity) = match entry.split_once(',') {
            Some((address, identity)) => {
                let identity = Uuid::parse_str(identity.trim()).map_err(|_| invalid())?;
                (address, Some(identity))
            }
            None => (entry, None),
        };
        let address = address.trim().parse().map_err(|_| invalid())?;
        Ok(Self { address, identity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_format() {
        let identity = Uuid::from_u128(0x1234);
        let record = AddressRecord::new("10.1.2.3".parse().unwrap(), Some(identity));
        assert_eq!(
            record.to_entry(),
            "10.1.2.3,00000000-0000-0000-0000-000000001234"
        );
        assert_eq!(record.to_entry().parse::<AddressRecord>().unwrap(), record);

        let bare = AddressRecord::new("::1".parse().unwrap(), None);
        assert_eq!(bare.to_entry(), "::1");
        assert_eq!("::1".parse::<AddressRecord>().unwrap(), bare);
    }

    #[test]
    fn test_invalid_entries() {
        assert!("not-an-ip".parse::<AddressRecord>().is_err());
        assert!("10.0.0.1,not-a-uuid".parse::<AddressRecord>().is_err());
    }

    #[test]
    fn test_captcha_kind_serde() {
        let kind: CaptchaKind = serde_json::from_str("\"puzzle\"").unwrap();
        assert_eq!(kind, CaptchaKind::Puzzle);
        assert_eq!(CaptchaKind::default(), CaptchaKind::Hand);
    }
}
