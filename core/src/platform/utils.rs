//! Shared parsing helpers for socket-tool output.

/// Extract the port from a local-address column.
///
/// Handles the formats the socket tools print:
/// - IPv4: `127.0.0.1:3000`, `0.0.0.0:135`, `*:8080`
/// - IPv6: `[::1]:3000`, `[::ffff:127.0.0.1]:9222`, `[::]:445`
pub(crate) fn parse_port(address: &str) -> Option<u16> {
    if address.starts_with('[') {
        // IPv6 format: [addr]:port
        let bracket_end = address.find(']')?;
        let rest = address.get(bracket_end + 1..)?;
        let port_str = rest.strip_prefix(':')?;
        return port_str.parse().ok();
    }

    // IPv4 format: addr:port - the port follows the last colon
    let last_colon = address.rfind(':')?;
    address.get(last_colon + 1..)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4_port() {
        assert_eq!(parse_port("127.0.0.1:3000"), Some(3000));
        assert_eq!(parse_port("0.0.0.0:135"), Some(135));
        assert_eq!(parse_port("*:8080"), Some(8080));
    }

    #[test]
    fn test_parse_ipv6_port() {
        assert_eq!(parse_port("[::1]:3000"), Some(3000));
        assert_eq!(parse_port("[::ffff:127.0.0.1]:9222"), Some(9222));
        assert_eq!(parse_port("[fe80::1]:8080"), Some(8080));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_port("garbage"), None);
        assert_eq!(parse_port("[::1]"), None);
        assert_eq!(parse_port("1.2.3.4:notaport"), None);
    }
}
