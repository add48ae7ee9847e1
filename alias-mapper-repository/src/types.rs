//! Request-level types shared by the repository implementations.

use std::fmt;

use url::Url;

/// Address of one search cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Url);

impl Endpoint {
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    /// Parse an endpoint from a URL string such as `http://localhost:9501`.
    pub fn parse(value: &str) -> Result<Self, url::ParseError> {
        Url::parse(value.trim()).map(Self)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        let endpoint = Endpoint::parse(" http://localhost:9501 ").unwrap();
        assert_eq!(endpoint.url().port(), Some(9501));
        assert_eq!(endpoint.to_string(), "http://localhost:9501/");
    }

    #[test]
    fn test_parse_invalid_endpoint() {
        assert!(Endpoint::parse("not a url").is_err());
    }
}
