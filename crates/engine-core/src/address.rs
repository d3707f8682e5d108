//! Native socket addresses, represented inline with no heap allocation.
//!
//! A `V4`/`V6`/`Unix` split with `Display` formatting and a `From<std::net::SocketAddr>`
//! bridge, so callers never touch a `PathBuf` or heap allocation for the common cases.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Maximum bytes a `sockaddr_un` path may occupy, matching the Linux/BSD ABI limit.
pub const MAX_UNIX_PATH: usize = 108;

/// A resolved, native-form socket address.
///
/// Copyable and allocation-free for the `V4`/`V6` cases. The `Unix` case stores the
/// path inline in a fixed-size buffer capped at [`MAX_UNIX_PATH`] bytes rather than
/// heap-allocating a `PathBuf` for every address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResolvedAddress {
    V4 { octets: [u8; 4], port: u16 },
    V6 { segments: [u16; 8], port: u16 },
    Unix { path: [u8; MAX_UNIX_PATH], len: u8 },
}

impl ResolvedAddress {
    pub fn unix<P: AsRef<Path>>(path: P) -> Option<Self> {
        let bytes = path.as_ref().to_str()?.as_bytes();
        if bytes.len() > MAX_UNIX_PATH {
            return None;
        }
        let mut buf = [0u8; MAX_UNIX_PATH];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(ResolvedAddress::Unix {
            path: buf,
            len: bytes.len() as u8,
        })
    }

    pub fn unix_path(&self) -> Option<PathBuf> {
        match self {
            ResolvedAddress::Unix { path, len } => {
                let s = std::str::from_utf8(&path[..*len as usize]).ok()?;
                Some(PathBuf::from(s))
            }
            _ => None,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            ResolvedAddress::V4 { port, .. } => Some(*port),
            ResolvedAddress::V6 { port, .. } => Some(*port),
            ResolvedAddress::Unix { .. } => None,
        }
    }

    pub fn is_loopback(&self) -> bool {
        match self {
            ResolvedAddress::V4 { octets, .. } => octets[0] == 127,
            ResolvedAddress::V6 { segments, .. } => {
                segments == &[0, 0, 0, 0, 0, 0, 0, 1]
            }
            ResolvedAddress::Unix { .. } => true,
        }
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedAddress::V4 { octets, port } => {
                write!(f, "{}.{}.{}.{}:{}", octets[0], octets[1], octets[2], octets[3], port)
            }
            ResolvedAddress::V6 { segments, port } => {
                let parts: Vec<String> = segments.iter().map(|s| format!("{s:x}")).collect();
                write!(f, "[{}]:{}", parts.join(":"), port)
            }
            ResolvedAddress::Unix { .. } => {
                write!(f, "unix:{}", self.unix_path().unwrap_or_default().display())
            }
        }
    }
}

impl From<SocketAddr> for ResolvedAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => ResolvedAddress::V4 {
                octets: v4.ip().octets(),
                port: v4.port(),
            },
            SocketAddr::V6(v6) => ResolvedAddress::V6 {
                segments: v6.ip().segments(),
                port: v6.port(),
            },
        }
    }
}

impl TryFrom<ResolvedAddress> for SocketAddr {
    type Error = ();

    fn try_from(addr: ResolvedAddress) -> Result<Self, Self::Error> {
        use std::net::{Ipv4Addr, Ipv6Addr};
        match addr {
            ResolvedAddress::V4 { octets, port } => {
                Ok(SocketAddr::from((Ipv4Addr::from(octets), port)))
            }
            ResolvedAddress::V6 { segments, port } => {
                Ok(SocketAddr::from((Ipv6Addr::from(segments), port)))
            }
            ResolvedAddress::Unix { .. } => Err(()),
        }
    }
}

/// Parses the textual URI forms the engine accepts: `ipv4:host:port`,
/// `ipv6:[host]:port`, and `unix:path`. Returns `None` for anything that isn't already
/// a literal address (hostnames must go through the DNS resolver first).
pub fn parse_uri(uri: &str) -> Option<ResolvedAddress> {
    if let Some(rest) = uri.strip_prefix("unix:") {
        return ResolvedAddress::unix(rest);
    }
    if let Some(rest) = uri.strip_prefix("ipv4:") {
        return rest.parse::<SocketAddr>().ok().map(ResolvedAddress::from);
    }
    if let Some(rest) = uri.strip_prefix("ipv6:") {
        return rest.parse::<SocketAddr>().ok().map(ResolvedAddress::from);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_v4() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let resolved = ResolvedAddress::from(addr);
        assert_eq!(resolved.port(), Some(9000));
        assert!(resolved.is_loopback());
        assert_eq!(SocketAddr::try_from(resolved).unwrap(), addr);
    }

    #[test]
    fn round_trips_v6() {
        let addr: SocketAddr = "[::1]:9000".parse().unwrap();
        let resolved = ResolvedAddress::from(addr);
        assert!(resolved.is_loopback());
        assert_eq!(SocketAddr::try_from(resolved).unwrap(), addr);
    }

    #[test]
    fn unix_path_round_trips() {
        let resolved = ResolvedAddress::unix("/tmp/engine.sock").unwrap();
        assert_eq!(resolved.unix_path().unwrap().to_str().unwrap(), "/tmp/engine.sock");
    }

    #[test]
    fn rejects_oversized_unix_path() {
        let long = "/tmp/".to_string() + &"a".repeat(200);
        assert!(ResolvedAddress::unix(long).is_none());
    }

    #[test]
    fn parses_uri_schemes() {
        assert_eq!(
            parse_uri("ipv6:[::1]:8080").unwrap().port(),
            Some(8080)
        );
        assert_eq!(parse_uri("ipv4:127.0.0.1:80").unwrap().port(), Some(80));
        assert!(parse_uri("unix:/tmp/x.sock").is_some());
        assert!(parse_uri("garbage").is_none());
    }
}
