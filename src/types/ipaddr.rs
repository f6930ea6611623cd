//! IPv4/IPv6 addresses with an optional CIDR prefix.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ipnet::IpNet;
use once_cell::sync::Lazy;

static LOOPBACK_V4: Lazy<IpNet> = Lazy::new(|| net("127.0.0.0/8"));
static LOOPBACK_V6: Lazy<IpNet> = Lazy::new(|| net("::1/128"));
static MULTICAST_V4: Lazy<IpNet> = Lazy::new(|| net("224.0.0.0/4"));
static MULTICAST_V6: Lazy<IpNet> = Lazy::new(|| net("ff00::/8"));

fn net(s: &str) -> IpNet {
    s.parse().unwrap_or_else(|_| unreachable!("static network literal {s}"))
}

/// An address or range. A bare address carries the full-length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpAddr(IpNet);

impl IpAddr {
    pub fn is_ipv4(&self) -> bool {
        matches!(self.0, IpNet::V4(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.0, IpNet::V6(_))
    }

    /// True when the whole range lies inside the loopback range.
    pub fn is_loopback(&self) -> bool {
        LOOPBACK_V4.contains(&self.0) || LOOPBACK_V6.contains(&self.0)
    }

    /// True when the whole range lies inside the multicast range.
    pub fn is_multicast(&self) -> bool {
        MULTICAST_V4.contains(&self.0) || MULTICAST_V6.contains(&self.0)
    }

    /// True when this range is contained in `range`. Mixed families never match.
    pub fn is_in_range(&self, range: &IpAddr) -> bool {
        range.0.contains(&self.0)
    }
}

impl FromStr for IpAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("`{s}` is not a valid IP address or range");
        if s.contains('/') {
            let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
            // ipnet tolerates forms Cedar rejects, such as a `+` or leading zeros in the prefix.
            if prefix.is_empty()
                || !prefix.bytes().all(|b| b.is_ascii_digit())
                || (prefix.len() > 1 && prefix.starts_with('0'))
            {
                return Err(invalid());
            }
            let addr: std::net::IpAddr = addr.parse().map_err(|_| invalid())?;
            let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
            return IpNet::new(addr, prefix).map(IpAddr).map_err(|_| invalid());
        }
        let addr: std::net::IpAddr = s.parse().map_err(|_| invalid())?;
        Ok(IpAddr(IpNet::from(addr)))
    }
}

impl Display for IpAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.0.prefix_len() == self.0.max_prefix_len() {
            write!(f, "{}", self.0.addr())
        } else {
            write!(f, "{}", self.0)
        }
    }
}
