use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;

const LOOPBACK_V4: &str = "127.0.0.1";

/// Caller address as seen through the edge proxy.
///
/// Taken from the first `x-forwarded-for` hop, then `x-real-ip`. IPv6 loopback
/// forms seen in local development are normalized to `127.0.0.1`, which is what
/// the payment provider expects in its signed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| raw.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        };

        let raw = forwarded.or_else(real_ip).unwrap_or(LOOPBACK_V4);
        ClientIp(normalize_loopback(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize_loopback(ip: &str) -> String {
    match ip {
        "::1" | "::ffff:127.0.0.1" | "0:0:0:0:0:0:0:1" => LOOPBACK_V4.to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rstest::rstest;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[rstest]
    #[case(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")], "203.0.113.9")]
    #[case(&[("x-real-ip", "198.51.100.4")], "198.51.100.4")]
    #[case(&[("x-forwarded-for", "::1")], "127.0.0.1")]
    #[case(&[("x-real-ip", "::ffff:127.0.0.1")], "127.0.0.1")]
    #[case(&[], "127.0.0.1")]
    fn resolves_client_ip(#[case] pairs: &[(&'static str, &'static str)], #[case] expected: &str) {
        assert_eq!(ClientIp::from_headers(&headers(pairs)).as_str(), expected);
    }

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(ClientIp::from_headers(&map).as_str(), "203.0.113.1");
    }
}
