use serde::{Deserialize, Serialize};

/// Scheme used to reach an upstream proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }
}

impl std::fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One upstream proxy, identified by its connection descriptor.
///
/// Immutable once created; two endpoints are equal when their descriptors are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(scheme: ProxyScheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Parse one `host:port` line from the listing service.
    ///
    /// A line is accepted only if it carries a colon-separated host and a
    /// numeric port; anything else is rejected so the caller can skip it.
    /// Listed proxies are plain HTTP.
    pub fn from_listing_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let (host, port) = line.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        Some(Self::new(ProxyScheme::Http, host, port))
    }

    /// Connection URL, e.g. `http://203.0.113.5:8080`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_line() {
        let endpoint = ProxyEndpoint::from_listing_line("203.0.113.5:8080").unwrap();
        assert_eq!(endpoint.scheme, ProxyScheme::Http);
        assert_eq!(endpoint.host, "203.0.113.5");
        assert_eq!(endpoint.port, 8080);
        assert_eq!(endpoint.url(), "http://203.0.113.5:8080");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let endpoint = ProxyEndpoint::from_listing_line("  10.0.0.1:3128 \r").unwrap();
        assert_eq!(endpoint.host, "10.0.0.1");
        assert_eq!(endpoint.port, 3128);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(ProxyEndpoint::from_listing_line("").is_none());
        assert!(ProxyEndpoint::from_listing_line("no-colon-here").is_none());
        assert!(ProxyEndpoint::from_listing_line(":8080").is_none());
        assert!(ProxyEndpoint::from_listing_line("host:").is_none());
        assert!(ProxyEndpoint::from_listing_line("host:notaport").is_none());
        assert!(ProxyEndpoint::from_listing_line("host:99999").is_none());
    }

    #[test]
    fn test_equality_by_descriptor() {
        let a = ProxyEndpoint::new(ProxyScheme::Http, "10.0.0.1", 8080);
        let b = ProxyEndpoint::from_listing_line("10.0.0.1:8080").unwrap();
        assert_eq!(a, b);

        let c = ProxyEndpoint::new(ProxyScheme::Http, "10.0.0.1", 8081);
        assert_ne!(a, c);
    }
}
