/*!
# Weather Protocol - shared wire vocabulary

Types and constants used by the aggregator and by both clients:
- `LogicalClock`: the Lamport clock each process keeps
- `payload`: the single encode/decode pair for readings and snapshots
- header names, default port and endpoint normalisation
*/

pub mod clock;
pub mod payload;

pub use clock::{LogicalClock, MAX_CLOCK};
pub use payload::{Attributes, PayloadError};

/// Header carrying a Lamport clock value, in both directions.
/// Lowercase so it can be used directly as an `http::HeaderName`.
pub const LAMPORT_CLOCK_HEADER: &str = "lamport-clock";

/// Port the aggregator listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 4567;

/// Resource path used by the clients.
pub const WEATHER_PATH: &str = "/weather.json";

/// Attribute naming the producer (station) a reading belongs to.
pub const ID_ATTRIBUTE: &str = "id";

/// Turns a user-supplied server argument into a full endpoint URL.
///
/// Accepts `host:port`, `http://host:port` or a complete URL with a path.
pub fn weather_endpoint(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("http://{server}")
    };

    let after_scheme = with_scheme
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&with_scheme);

    if after_scheme.contains('/') {
        with_scheme
    } else {
        format!("{with_scheme}{WEATHER_PATH}")
    }
}

/// Parses a `Lamport-Clock` header value. Values above `MAX_CLOCK` are
/// refused like any other malformed value.
pub fn parse_clock(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|clock| *clock <= MAX_CLOCK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_endpoint_variants() {
        assert_eq!(weather_endpoint("localhost:4567"), "http://localhost:4567/weather.json");
        assert_eq!(weather_endpoint("http://localhost:4567"), "http://localhost:4567/weather.json");
        assert_eq!(
            weather_endpoint("http://servername.domain.domain:4567/"),
            "http://servername.domain.domain:4567/weather.json"
        );
        assert_eq!(weather_endpoint("http://host:80/custom"), "http://host:80/custom");
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock(" 42 "), Some(42));
        assert_eq!(parse_clock("-1"), None);
        assert_eq!(parse_clock("abc"), None);
        assert_eq!(parse_clock("9223372036854775807"), Some(MAX_CLOCK));
        assert_eq!(parse_clock("9223372036854775808"), None);
        assert_eq!(parse_clock("18446744073709551615"), None);
    }
}
