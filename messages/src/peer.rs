use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0:?} is not of the form ip:port")]
    MissingPort(String),

    #[error("invalid port in {0:?}")]
    InvalidPort(String),
}

/// A peer's listening address. Ordered by `(ip, port)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub ip: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (ip, port) = s
            .rsplit_once(':')
            .filter(|(ip, _)| !ip.is_empty())
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;
        Ok(Self::new(ip, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let addr: PeerAddress = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(addr, PeerAddress::new("127.0.0.1", 4000));
        assert_eq!(addr.to_string(), "127.0.0.1:4000");
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            "localhost".parse::<PeerAddress>(),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            ":80".parse::<PeerAddress>(),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            "10.0.0.1:http".parse::<PeerAddress>(),
            Err(AddressError::InvalidPort(_))
        ));
        assert!("10.0.0.1:70000".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn orders_by_ip_then_port() {
        let mut addrs = vec![
            PeerAddress::new("10.0.0.2", 1),
            PeerAddress::new("10.0.0.1", 9),
            PeerAddress::new("10.0.0.1", 2),
        ];
        addrs.sort();
        assert_eq!(
            addrs,
            vec![
                PeerAddress::new("10.0.0.1", 2),
                PeerAddress::new("10.0.0.1", 9),
                PeerAddress::new("10.0.0.2", 1),
            ]
        );
    }
}
