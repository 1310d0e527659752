/// Hostname exclusion list built from NO_PROXY.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoProxy {
    patterns: Vec<String>,
}

impl NoProxy {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.to_vec(),
        }
    }

    /// Hostnames compare ASCII case-insensitively.
    pub fn matches(&self, hostname: &str) -> bool {
        let host = hostname.to_ascii_lowercase();
        self.patterns.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            if host == pattern {
                return true;
            }
            // ".example.com" covers any subdomain, never the bare domain
            if pattern.starts_with('.') {
                return host.ends_with(&pattern);
            }
            host.len() > pattern.len()
                && host.ends_with(&pattern)
                && host.as_bytes()[host.len() - pattern.len() - 1] == b'.'
        })
    }
}

/// Whether `hostname` must bypass the proxy according to `patterns`.
pub fn is_no_proxy(hostname: &str, patterns: &[String]) -> bool {
    NoProxy::new(patterns).matches(hostname)
}
