//! SRV records.

use std::{cmp::Reverse, fmt, fmt::Display, net::Ipv6Addr};

use http::uri::Scheme;
use rand::Rng;
use url::Url;

/// Representation of types that contain the fields of a SRV record.
pub trait SrvRecord {
    /// Type representing the SRV record's target. Must implement `Display` so
    /// it can be used to create a `Url`.
    type Target: Display + ?Sized;

    /// Gets a SRV record's target.
    fn target(&self) -> &Self::Target;

    /// Gets a SRV record's port.
    fn port(&self) -> u16;

    /// Gets a SRV record's priority.
    fn priority(&self) -> u16;

    /// Gets a SRV record's weight.
    fn weight(&self) -> u16;

    /// Parses a SRV record into a URL with a given scheme (e.g. http).
    fn parse(&self, scheme: Scheme) -> Result<Url, url::ParseError> {
        // Parse a placeholder URL and then set the host and port separately,
        // so a target such as `foo.com:123/bar` cannot smuggle in a port or
        // path of its own.
        let mut url = Url::parse(&format!("{}://placeholder.invalid", scheme.as_str()))?;
        let target = self.target().to_string();
        let host = target.strip_suffix('.').unwrap_or(&target);
        match host.parse::<Ipv6Addr>() {
            Ok(ip) => url
                .set_ip_host(ip.into())
                .map_err(|_| url::ParseError::InvalidIpv6Address)?,
            Err(_) => url.set_host(Some(host))?,
        }
        url.set_port(Some(self.port()))
            .map_err(|_| url::ParseError::SetHostOnCannotBeABaseUrl)?;

        Ok(url)
    }

    /// Generates a key to sort a SRV record by priority and weight per RFC 2782.
    fn sort_key(&self, rng: impl Rng) -> (u16, Reverse<u32>) {
        sort_key(self.priority(), self.weight(), rng)
    }
}

/// Generates a key to sort a SRV record by priority and weight per RFC 2782.
pub(crate) fn sort_key(priority: u16, weight: u16, mut rng: impl Rng) -> (u16, Reverse<u32>) {
    // Sort ascending by priority, then descending (hence `Reverse`) by randomized weight
    let rand = rng.random::<u16>() as u32;
    (priority, Reverse(weight as u32 * rand))
}

/// A service location discovered through a SRV lookup.
///
/// Endpoints are detached from whichever [`SrvResolver`] produced them, so
/// they can be cached and handed out to concurrent callers.
///
/// [`SrvResolver`]: crate::resolver::SrvResolver
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    priority: u16,
    weight: u16,
}

impl Endpoint {
    /// Creates an endpoint. A trailing root label dot on `host` is dropped.
    pub fn new(host: impl Into<String>, port: u16, priority: u16, weight: u16) -> Self {
        let mut host = host.into();
        if host.len() > 1 && host.ends_with('.') {
            host.pop();
        }
        Self {
            host,
            port,
            priority,
            weight,
        }
    }

    /// Copies the fields of any SRV record into an endpoint.
    pub fn from_record<R: SrvRecord + ?Sized>(record: &R) -> Self {
        Self::new(
            record.target().to_string(),
            record.port(),
            record.priority(),
            record.weight(),
        )
    }

    /// Host name or address of the endpoint.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port of the endpoint.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// SRV priority; lower values are preferred.
    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// SRV weight among endpoints of equal priority.
    pub fn weight(&self) -> u16 {
        self.weight
    }
}

impl SrvRecord for Endpoint {
    type Target = str;

    fn target(&self) -> &Self::Target {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn priority(&self) -> u16 {
        self.priority
    }

    fn weight(&self) -> u16 {
        self.weight
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_root_dot() {
        let endpoint = Endpoint::new("node1.example.com.", 443, 1, 10);
        assert_eq!(endpoint.host(), "node1.example.com");
        assert_eq!(endpoint.to_string(), "node1.example.com:443");
    }

    #[test]
    fn parse_sets_scheme_host_and_port() {
        let url = Endpoint::new("10.0.0.5", 9000, 0, 10)
            .parse(Scheme::HTTP)
            .unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:9000/");
    }

    #[test]
    fn parse_brackets_ipv6_targets() {
        let url = Endpoint::new("::1", 8080, 0, 0).parse(Scheme::HTTP).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:8080/");
    }

    #[test]
    fn parse_rejects_target_with_path() {
        assert!(Endpoint::new("foo.com/bar", 80, 0, 0)
            .parse(Scheme::HTTP)
            .is_err());
    }

    #[test]
    fn sort_key_orders_by_priority_first() {
        let mut rng = rand::rng();
        let low = Endpoint::new("a", 1, 0, 0).sort_key(&mut rng);
        let high = Endpoint::new("b", 1, 1, u16::MAX).sort_key(&mut rng);
        assert!(low < high);
    }
}
