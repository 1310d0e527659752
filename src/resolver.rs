use crate::filter::is_no_proxy;
use crate::proxy::{ProxyConfig, ProxyKind};
use url::{Host, Url};

/// How a target URL should be reached under a given configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Through `url`, taken from the `kind` setting.
    Proxy { kind: ProxyKind, url: &'a str },
    /// Host is listed in NO_PROXY.
    Bypass,
    /// No setting covers the target's protocol.
    Unconfigured,
    /// Target is not a usable URL.
    InvalidTarget,
}

impl<'a> Route<'a> {
    pub fn proxy_url(&self) -> Option<&'a str> {
        match self {
            Route::Proxy { url, .. } => Some(url),
            _ => None,
        }
    }
}

pub fn route<'a>(target_url: &str, config: &'a ProxyConfig) -> Route<'a> {
    let url = match Url::parse(target_url) {
        Ok(url) => url,
        Err(_) => return Route::InvalidTarget,
    };
    // IPv6 literals are compared without their brackets
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => return Route::InvalidTarget,
    };

    if is_no_proxy(&host, &config.no_proxy) {
        return Route::Bypass;
    }

    let (kind, specific) = if url.scheme() == "https" {
        (ProxyKind::Https, config.https.as_deref())
    } else {
        (ProxyKind::Http, config.http.as_deref())
    };

    match (specific, config.all.as_deref()) {
        (Some(url), _) => Route::Proxy { kind, url },
        (None, Some(url)) => Route::Proxy {
            kind: ProxyKind::All,
            url,
        },
        (None, None) => Route::Unconfigured,
    }
}

/// Proxy URL that applies to `target_url`, or `None` for a direct connection.
pub fn effective_proxy<'a>(target_url: &str, config: &'a ProxyConfig) -> Option<&'a str> {
    route(target_url, config).proxy_url()
}
