use crate::proxy::{parse_proxy_url, ProxyConfig};
use crate::runner::{RunOptions, DEFAULT_HTTPS_TARGET, DEFAULT_HTTP_TARGET};
use crate::verification::{ProbeOptions, DEFAULT_TIMEOUT};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "proxy-doctor.toml";

/// Optional defaults read from `proxy-doctor.toml`; command-line flags win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeout_ms: Option<u64>,
    pub insecure: bool,
    pub targets: Targets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl Settings {
    /// Reads the default file, falling back to built-in values when absent.
    pub fn new() -> Result<Self> {
        Self::load(Path::new(DEFAULT_CONFIG_FILE), false)
    }

    /// A missing file is only an error when `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(data) => Self::from_toml(&data)
                .with_context(|| format!("invalid settings file {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read settings file {}", path.display())),
        }
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn probe_options(&self, timeout_ms: Option<u64>, insecure: bool) -> ProbeOptions {
        let timeout = timeout_ms
            .or(self.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);
        ProbeOptions {
            timeout,
            insecure: insecure || self.insecure,
        }
    }

    /// Resolves targets and protocol selection.
    ///
    /// `--target` replaces the default target of its own protocol. With no
    /// `--http`/`--https` flag, only that protocol is tested; explicit flags
    /// always decide the selection.
    pub fn run_options(
        &self,
        target: Option<&str>,
        http: bool,
        https: bool,
        direct: bool,
    ) -> Result<RunOptions> {
        let mut http_target = self
            .targets
            .http
            .clone()
            .unwrap_or_else(|| DEFAULT_HTTP_TARGET.to_string());
        let mut https_target = self
            .targets
            .https
            .clone()
            .unwrap_or_else(|| DEFAULT_HTTPS_TARGET.to_string());
        validate_target(&http_target)?;
        validate_target(&https_target)?;

        let (mut test_http, mut test_https) = (true, true);

        if let Some(target) = target {
            if validate_target(target)? {
                https_target = target.to_string();
                test_http = false;
            } else {
                http_target = target.to_string();
                test_https = false;
            }
        }

        if http || https {
            test_http = http;
            test_https = https;
        }

        Ok(RunOptions {
            http_target,
            https_target,
            test_http,
            test_https,
            direct,
        })
    }
}

/// Returns whether the target is https.
fn validate_target(target: &str) -> Result<bool> {
    let url = Url::parse(target).with_context(|| format!("Invalid target URL: {}", target))?;
    if url.host_str().is_none() {
        bail!("Invalid target URL: {} has no host", target);
    }
    match url.scheme() {
        "http" => Ok(false),
        "https" => Ok(true),
        other => bail!("Invalid target URL: unsupported scheme {} in {}", other, target),
    }
}

/// Config for an explicit `--proxy`, used for both protocols.
pub fn override_config(proxy: &str) -> Result<ProxyConfig> {
    if parse_proxy_url(proxy).is_none() {
        bail!("Invalid proxy URL: {}", proxy);
    }
    Ok(ProxyConfig::from_override(proxy))
}
