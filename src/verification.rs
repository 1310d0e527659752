use crate::proxy::{mask_credentials, ProxyKind};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::io;
use std::time::{Duration, Instant};

/// `proxyUrl` recorded for probes that bypass any proxy.
pub const DIRECT: &str = "(direct)";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Error codes attached to failed probes.
pub mod codes {
    pub const ECONNREFUSED: &str = "ECONNREFUSED";
    pub const ECONNRESET: &str = "ECONNRESET";
    pub const ETIMEDOUT: &str = "ETIMEDOUT";
    pub const ENETUNREACH: &str = "ENETUNREACH";
    pub const EHOSTUNREACH: &str = "EHOSTUNREACH";
    pub const ENOTFOUND: &str = "ENOTFOUND";
    pub const ABORT_ERR: &str = "ABORT_ERR";
    pub const ERR_INVALID_URL: &str = "ERR_INVALID_URL";

    pub const UNABLE_TO_GET_ISSUER_CERT_LOCALLY: &str = "UNABLE_TO_GET_ISSUER_CERT_LOCALLY";
    pub const UNABLE_TO_VERIFY_LEAF_SIGNATURE: &str = "UNABLE_TO_VERIFY_LEAF_SIGNATURE";
    pub const SELF_SIGNED_CERT_IN_CHAIN: &str = "SELF_SIGNED_CERT_IN_CHAIN";
    pub const CERT_HAS_EXPIRED: &str = "CERT_HAS_EXPIRED";
    pub const ERR_TLS_CERT_ALTNAME_INVALID: &str = "ERR_TLS_CERT_ALTNAME_INVALID";

    pub const TLS: [&str; 5] = [
        UNABLE_TO_GET_ISSUER_CERT_LOCALLY,
        UNABLE_TO_VERIFY_LEAF_SIGNATURE,
        SELF_SIGNED_CERT_IN_CHAIN,
        CERT_HAS_EXPIRED,
        ERR_TLS_CERT_ALTNAME_INVALID,
    ];
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub success: bool,
    pub proxy_type: ProxyKind,
    pub proxy_url: String,
    pub target_url: String,
    pub response_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl TestResult {
    pub fn failed(
        proxy_type: ProxyKind,
        proxy_url: &str,
        target_url: &str,
        response_time: u64,
        info: ErrorInfo,
    ) -> Self {
        Self {
            success: false,
            proxy_type,
            proxy_url: proxy_url.to_string(),
            target_url: target_url.to_string(),
            response_time,
            status_code: info.status,
            error: Some(info.message),
            error_code: info.code,
        }
    }
}

/// A transport failure reduced to a message, an optional code and, when the
/// proxy refused to tunnel, the status it answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            message: message.into(),
            code: code.map(str::to_string),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The probe timer fired before the request finished.
    pub fn aborted() -> Self {
        Self::new("This operation was aborted", Some(codes::ABORT_ERR))
    }

    /// Walks the `source()` chain and keeps the innermost error that maps
    /// to a known code. Without one, the innermost message is used.
    ///
    /// The outermost error only wraps its causes and its text embeds the
    /// request URL, so message text is read from the causes alone.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut chain = vec![err];
        let mut current = err.source();
        while let Some(cause) = current {
            chain.push(cause);
            current = cause.source();
        }

        let readable = |depth: usize, cause: &(dyn StdError + 'static)| {
            depth > 0 && !cause.is::<reqwest::Error>()
        };

        let info = match chain
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, cause)| {
                error_code(*cause, readable(depth, *cause)).map(|code| (*cause, code))
            })
        {
            Some((cause, code)) => Self::new(non_empty_message(cause, err), Some(code)),
            None => {
                let innermost = chain.last().copied().unwrap_or(err);
                Self::new(non_empty_message(innermost, err), None)
            }
        };

        let auth_required = chain
            .iter()
            .enumerate()
            .any(|(depth, cause)| {
                readable(depth, *cause) && is_proxy_auth_failure(&cause.to_string())
            });
        if auth_required {
            info.with_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED.as_u16())
        } else {
            info
        }
    }
}

fn non_empty_message(err: &(dyn StdError + 'static), fallback: &(dyn StdError + 'static)) -> String {
    let message = err.to_string();
    if !message.is_empty() {
        return message;
    }
    let message = fallback.to_string();
    if message.is_empty() {
        format!("{:?}", fallback)
    } else {
        message
    }
}

fn error_code(err: &(dyn StdError + 'static), read_message: bool) -> Option<&'static str> {
    if let Some(tls) = err.downcast_ref::<rustls::Error>() {
        return tls_code(tls);
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        // tokio-rustls reports handshake failures as io::Error(InvalidData)
        if let Some(tls) = io_err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        {
            return tls_code(tls);
        }
        let code = match io_err.kind() {
            io::ErrorKind::ConnectionRefused => Some(codes::ECONNREFUSED),
            io::ErrorKind::ConnectionReset => Some(codes::ECONNRESET),
            io::ErrorKind::TimedOut => Some(codes::ETIMEDOUT),
            io::ErrorKind::NetworkUnreachable => Some(codes::ENETUNREACH),
            io::ErrorKind::HostUnreachable => Some(codes::EHOSTUNREACH),
            _ => None,
        };
        if code.is_some() {
            return code;
        }
    }
    if read_message {
        message_code(&err.to_string())
    } else {
        None
    }
}

fn tls_code(err: &rustls::Error) -> Option<&'static str> {
    use rustls::CertificateError;

    match err {
        rustls::Error::InvalidCertificate(cert) => Some(match cert {
            CertificateError::UnknownIssuer => codes::UNABLE_TO_GET_ISSUER_CERT_LOCALLY,
            CertificateError::Expired => codes::CERT_HAS_EXPIRED,
            CertificateError::NotValidForName => codes::ERR_TLS_CERT_ALTNAME_INVALID,
            _ => message_code(&err.to_string()).unwrap_or(codes::UNABLE_TO_VERIFY_LEAF_SIGNATURE),
        }),
        _ => None,
    }
}

fn is_proxy_auth_failure(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("proxy authorization required")
        || message.contains("proxy authentication required")
}

fn message_code(message: &str) -> Option<&'static str> {
    let message = message.to_ascii_lowercase();

    if message.starts_with("dns error")
        || message.contains("failed to lookup address")
        || message.contains("name or service not known")
        || message.contains("nodename nor servname")
    {
        return Some(codes::ENOTFOUND);
    }

    if !message.contains("certificate") {
        return None;
    }
    if message.contains("unknownissuer") || message.contains("unknown issuer") {
        Some(codes::UNABLE_TO_GET_ISSUER_CERT_LOCALLY)
    } else if message.contains("expired") {
        Some(codes::CERT_HAS_EXPIRED)
    } else if message.contains("notvalidforname") || message.contains("not valid for name") {
        Some(codes::ERR_TLS_CERT_ALTNAME_INVALID)
    } else if message.contains("self signed") || message.contains("self-signed") {
        Some(codes::SELF_SIGNED_CERT_IN_CHAIN)
    } else {
        Some(codes::UNABLE_TO_VERIFY_LEAF_SIGNATURE)
    }
}

/// 2xx and 3xx count as a working path.
pub fn is_ok_status(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub insecure: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            insecure: false,
        }
    }
}

/// One request against `target_url`, through `proxy` or directly when
/// `proxy` is `None`. Failures are reported in the returned result.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target_url: &str, kind: ProxyKind, proxy: Option<&str>) -> TestResult;
}

/// Issues a HEAD request with a fresh `reqwest` client per call.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    options: ProbeOptions,
}

impl HttpProbe {
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    fn client(&self, proxy: Option<&str>) -> reqwest::Result<Client> {
        let builder = Client::builder()
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(self.options.insecure);

        let builder = match proxy {
            Some(url) => builder.proxy(reqwest::Proxy::all(url)?),
            // ignore *_PROXY variables the client would otherwise pick up
            None => builder.no_proxy(),
        };

        builder.build()
    }

    async fn send(&self, target_url: &str, proxy: Option<&str>) -> Result<StatusCode, ErrorInfo> {
        let client = self
            .client(proxy)
            .map_err(|e| ErrorInfo::from_error(&e))?;

        match tokio::time::timeout(self.options.timeout, client.head(target_url).send()).await {
            Ok(Ok(resp)) => Ok(resp.status()),
            Ok(Err(e)) => Err(ErrorInfo::from_error(&e)),
            Err(_) => Err(ErrorInfo::aborted()),
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target_url: &str, kind: ProxyKind, proxy: Option<&str>) -> TestResult {
        let proxy_url = proxy.unwrap_or(DIRECT);
        debug!(
            "starting {} test: {} via {}",
            kind,
            target_url,
            mask_credentials(proxy_url)
        );

        let start = Instant::now();
        let outcome = self.send(target_url, proxy).await;
        let response_time = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(status) => {
                debug!("{} test finished: {} in {}ms", kind, status.as_u16(), response_time);
                TestResult {
                    success: is_ok_status(status),
                    proxy_type: kind,
                    proxy_url: proxy_url.to_string(),
                    target_url: target_url.to_string(),
                    response_time,
                    status_code: Some(status.as_u16()),
                    error: None,
                    error_code: None,
                }
            }
            Err(info) => {
                debug!(
                    "{} test failed: {} ({})",
                    kind,
                    info.message,
                    info.code.as_deref().unwrap_or("no code")
                );
                TestResult::failed(kind, proxy_url, target_url, response_time, info)
            }
        }
    }
}
