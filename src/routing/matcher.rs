//! Route matching logic.
//!
//! # Responsibilities
//! - Normalize the requested host for lookup
//! - Match path prefixes on segment boundaries
//! - Strip a matched prefix and join the remainder onto a backend path
//!
//! # Design Decisions
//! - Host matching is case-insensitive and ignores the port and a trailing dot
//! - Path matching is case-sensitive
//! - An empty prefix matches every path of its host
//! - No regex, plain string comparisons only

/// Lowercase a host and drop any port or trailing dot.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let host = if let Some(rest) = raw.strip_prefix('[') {
        // Bracketed IPv6, optionally followed by a port.
        match rest.split_once(']') {
            Some((addr, _)) => return format!("[{}]", addr.to_ascii_lowercase()),
            None => raw,
        }
    } else {
        match raw.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') && is_port(port) => host,
            _ => raw,
        }
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_port(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `path` falls under `prefix`.
///
/// `prefix` carries no trailing slash, so `/app` matches `/app` and
/// `/app/x` but not `/application`.
pub fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Remove `prefix` from the front of `path`.
pub fn strip_prefix<'a>(prefix: &str, path: &'a str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

/// Join two path pieces with exactly one slash between them.
pub fn join_paths(base: &str, rest: &str) -> String {
    match (base.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", base, &rest[1..]),
        (false, false) => format!("{}/{}", base, rest),
        _ => format!("{}{}", base, rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_normalization() {
        assert_eq!(normalize_host("example.com"), "example.com");
        assert_eq!(normalize_host("EXAMPLE.COM"), "example.com");
        assert_eq!(normalize_host("Example.com:8443"), "example.com");
        assert_eq!(normalize_host("example.com."), "example.com");
        assert_eq!(normalize_host("[::1]:443"), "[::1]");
        assert_eq!(normalize_host("[::1]"), "[::1]");
    }

    #[test]
    fn test_path_matcher() {
        assert!(prefix_matches("/api", "/api"));
        assert!(prefix_matches("/api", "/api/v1"));
        assert!(!prefix_matches("/api", "/images"));
        assert!(!prefix_matches("/api", "/apiary"));
        assert!(!prefix_matches("/api", "/API/v1"));
        assert!(prefix_matches("", "/anything"));
    }

    #[test]
    fn test_strip_and_join() {
        assert_eq!(strip_prefix("/app", "/app/users"), "/users");
        assert_eq!(strip_prefix("/app", "/app"), "");
        assert_eq!(strip_prefix("", "/users"), "/users");

        assert_eq!(join_paths("/", "/users"), "/users");
        assert_eq!(join_paths("/base", "/users"), "/base/users");
        assert_eq!(join_paths("/base/", "users"), "/base/users");
        assert_eq!(join_paths("/base", ""), "/base/");
        assert_eq!(join_paths("", ""), "/");
    }
}
