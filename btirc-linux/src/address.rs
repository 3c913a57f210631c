//! Peer address URLs: `btspp://98D3318041DE:1` (RFCOMM) and `tcp://host:port`.

use std::fmt;
use std::str::FromStr;

/// Highest valid RFCOMM server channel.
const MAX_RFCOMM_CHANNEL: u8 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    Rfcomm { address: [u8; 6], channel: u8 },
    Tcp { host: String, port: u16 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing scheme in {0:?} (expected btspp:// or tcp://)")]
    MissingScheme(String),
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("missing channel or port in {0:?}")]
    MissingPort(String),
    #[error("invalid Bluetooth address {0:?}")]
    BadDeviceAddress(String),
    #[error("invalid RFCOMM channel {0:?} (1-30)")]
    BadChannel(String),
    #[error("invalid port {0:?}")]
    BadPort(String),
    #[error("missing host in {0:?}")]
    MissingHost(String),
}

impl FromStr for PeerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| AddressError::MissingScheme(s.to_string()))?;
        // JSR-82 style options (";authenticate=false;...") are accepted and ignored.
        let target = rest.split(';').next().unwrap_or(rest);
        let (host, port) = target
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        match scheme.to_ascii_lowercase().as_str() {
            "btspp" => {
                let address = parse_bt_address(host)
                    .ok_or_else(|| AddressError::BadDeviceAddress(host.to_string()))?;
                let channel = port
                    .parse::<u8>()
                    .ok()
                    .filter(|c| (1..=MAX_RFCOMM_CHANNEL).contains(c))
                    .ok_or_else(|| AddressError::BadChannel(port.to_string()))?;
                Ok(PeerAddress::Rfcomm { address, channel })
            }
            "tcp" => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| AddressError::BadPort(port.to_string()))?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    return Err(AddressError::MissingHost(s.to_string()));
                }
                Ok(PeerAddress::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            other => Err(AddressError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddress::Rfcomm { address, channel } => {
                write!(f, "btspp://{}:{}", format_bt_address(address), channel)
            }
            PeerAddress::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp://[{}]:{}", host, port)
            }
            PeerAddress::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
        }
    }
}

/// Parse `98D3318041DE` or `98:D3:31:80:41:DE` (any case) into bytes, most significant first.
pub fn parse_bt_address(s: &str) -> Option<[u8; 6]> {
    let hex: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = [0u8; 6];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

/// Bluetooth address as 12 uppercase hex digits, no separators.
pub fn format_bt_address(address: &[u8; 6]) -> String {
    address.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfcomm_url() {
        let a: PeerAddress = "btspp://98D3318041DE:1".parse().unwrap();
        assert_eq!(
            a,
            PeerAddress::Rfcomm {
                address: [0x98, 0xD3, 0x31, 0x80, 0x41, 0xDE],
                channel: 1
            }
        );
        assert_eq!(a.to_string(), "btspp://98D3318041DE:1");
    }

    #[test]
    fn rfcomm_url_with_colons_and_options() {
        let a: PeerAddress = "btspp://98:d3:31:80:41:de:3;authenticate=false;encrypt=false"
            .parse()
            .unwrap();
        assert_eq!(
            a,
            PeerAddress::Rfcomm {
                address: [0x98, 0xD3, 0x31, 0x80, 0x41, 0xDE],
                channel: 3
            }
        );
    }

    #[test]
    fn rejects_bad_rfcomm() {
        assert!(matches!(
            "btspp://98D3318041:1".parse::<PeerAddress>(),
            Err(AddressError::BadDeviceAddress(_))
        ));
        assert!(matches!(
            "btspp://98D3318041DE:0".parse::<PeerAddress>(),
            Err(AddressError::BadChannel(_))
        ));
        assert!(matches!(
            "btspp://98D3318041DE:31".parse::<PeerAddress>(),
            Err(AddressError::BadChannel(_))
        ));
        assert!(matches!(
            "98D3318041DE:1".parse::<PeerAddress>(),
            Err(AddressError::MissingScheme(_))
        ));
        assert!(matches!(
            "btl2cap://98D3318041DE:1".parse::<PeerAddress>(),
            Err(AddressError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn parses_tcp_url() {
        let a: PeerAddress = "tcp://localhost:7000".parse().unwrap();
        assert_eq!(
            a,
            PeerAddress::Tcp {
                host: "localhost".into(),
                port: 7000
            }
        );
        let v6: PeerAddress = "tcp://[::1]:7000".parse().unwrap();
        assert_eq!(
            v6,
            PeerAddress::Tcp {
                host: "::1".into(),
                port: 7000
            }
        );
        assert_eq!(v6.to_string(), "tcp://[::1]:7000");
        assert!(matches!(
            "tcp://localhost:http".parse::<PeerAddress>(),
            Err(AddressError::BadPort(_))
        ));
    }

    #[test]
    fn formats_bt_address() {
        assert_eq!(
            format_bt_address(&[0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]),
            "001A7DDA7113"
        );
    }
}
