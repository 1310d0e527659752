use crate::progress::Progress;
use crate::proxy::{mask_credentials, parse_proxy_url, ProxyConfig, ProxyKind};
use crate::resolver::{route, Route};
use crate::verification::{codes, ErrorInfo, Probe, TestResult, DIRECT};
use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HTTP_TARGET: &str = "http://www.google.com";
pub const DEFAULT_HTTPS_TARGET: &str = "https://www.google.com";

/// What to probe in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub http_target: String,
    pub https_target: String,
    pub test_http: bool,
    pub test_https: bool,
    pub direct: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            http_target: DEFAULT_HTTP_TARGET.to_string(),
            https_target: DEFAULT_HTTPS_TARGET.to_string(),
            test_http: true,
            test_https: true,
            direct: false,
        }
    }
}

/// Runs the selected probes one after another, HTTP first.
///
/// In direct mode both targets are probed without a proxy. Otherwise each
/// target is routed through the resolver: NO_PROXY hosts are probed
/// directly, protocols with no proxy configured are skipped.
pub async fn run_all_tests(
    config: &ProxyConfig,
    options: &RunOptions,
    prober: &dyn Probe,
    progress: &dyn Progress,
) -> Vec<TestResult> {
    let plan = [
        (ProxyKind::Http, options.http_target.as_str(), options.test_http),
        (ProxyKind::Https, options.https_target.as_str(), options.test_https),
    ];

    let mut results = Vec::new();
    for (kind, target, enabled) in plan {
        if !enabled {
            continue;
        }
        progress.set_message(&format!("Testing {} connectivity to {}...", kind, target));

        if options.direct {
            results.push(prober.probe(target, kind, None).await);
            continue;
        }

        match route(target, config) {
            Route::Proxy { kind: via, url } => {
                if parse_proxy_url(url).is_none() {
                    warn!("{} proxy is not a valid URL: {}", via, mask_credentials(url));
                    results.push(TestResult::failed(
                        via,
                        url,
                        target,
                        0,
                        ErrorInfo::new(
                            format!("Invalid proxy URL: {}", mask_credentials(url)),
                            Some(codes::ERR_INVALID_URL),
                        ),
                    ));
                    continue;
                }
                results.push(prober.probe(target, via, Some(url)).await);
            }
            Route::Bypass => {
                info!("{} matches NO_PROXY, testing directly", target);
                results.push(prober.probe(target, kind, None).await);
            }
            Route::Unconfigured => {
                debug!("no {} proxy configured, skipping {}", kind, target);
            }
            Route::InvalidTarget => {
                results.push(TestResult::failed(
                    kind,
                    DIRECT,
                    target,
                    0,
                    ErrorInfo::new(format!("Invalid target URL: {}", target), Some(codes::ERR_INVALID_URL)),
                ));
            }
        }
    }
    results
}

/// Everything a run produced, as written by `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub config: ProxyConfig,
    pub results: Vec<TestResult>,
    pub all_passed: bool,
    pub timestamp: String,
}

impl TestSummary {
    /// `all_passed` is false when nothing was probed.
    pub fn new(config: ProxyConfig, results: Vec<TestResult>) -> Self {
        let all_passed = !results.is_empty() && results.iter().all(|r| r.success);
        Self {
            config,
            results,
            all_passed,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Silent;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Succeeds every probe and records the calls it saw.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, ProxyKind, Option<String>)>>,
    }

    #[async_trait]
    impl Probe for Recorder {
        async fn probe(&self, target_url: &str, kind: ProxyKind, proxy: Option<&str>) -> TestResult {
            self.calls
                .lock()
                .unwrap()
                .push((target_url.to_string(), kind, proxy.map(str::to_string)));
            TestResult {
                success: true,
                proxy_type: kind,
                proxy_url: proxy.unwrap_or(DIRECT).to_string(),
                target_url: target_url.to_string(),
                response_time: 1,
                status_code: Some(200),
                error: None,
                error_code: None,
            }
        }
    }

    fn calls(recorder: &Recorder) -> Vec<(String, ProxyKind, Option<String>)> {
        recorder.calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn probes_http_then_https_through_their_proxies() {
        let config = ProxyConfig {
            http: Some("http://h:8080".into()),
            https: Some("http://s:8443".into()),
            ..Default::default()
        };
        let recorder = Recorder::default();
        let results = run_all_tests(&config, &RunOptions::default(), &recorder, &Silent).await;

        assert_eq!(results.len(), 2);
        assert_eq!(
            calls(&recorder),
            vec![
                (DEFAULT_HTTP_TARGET.into(), ProxyKind::Http, Some("http://h:8080".into())),
                (DEFAULT_HTTPS_TARGET.into(), ProxyKind::Https, Some("http://s:8443".into())),
            ]
        );
    }

    #[tokio::test]
    async fn all_proxy_covers_both_protocols() {
        let config = ProxyConfig {
            all: Some("http://a:3128".into()),
            ..Default::default()
        };
        let recorder = Recorder::default();
        let results = run_all_tests(&config, &RunOptions::default(), &recorder, &Silent).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.proxy_type == ProxyKind::All));
        assert!(results.iter().all(|r| r.proxy_url == "http://a:3128"));
    }

    #[tokio::test]
    async fn skips_protocols_without_proxy() {
        let config = ProxyConfig {
            http: Some("http://h:8080".into()),
            ..Default::default()
        };
        let recorder = Recorder::default();
        let results = run_all_tests(&config, &RunOptions::default(), &recorder, &Silent).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].proxy_type, ProxyKind::Http);
    }

    #[tokio::test]
    async fn direct_mode_ignores_config() {
        let recorder = Recorder::default();
        let options = RunOptions {
            direct: true,
            ..Default::default()
        };
        let results = run_all_tests(&ProxyConfig::default(), &options, &recorder, &Silent).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.proxy_url == DIRECT));
        assert!(calls(&recorder).iter().all(|(_, _, proxy)| proxy.is_none()));
    }

    #[tokio::test]
    async fn no_proxy_hosts_are_probed_directly() {
        let config = ProxyConfig {
            http: Some("http://h:8080".into()),
            no_proxy: vec![".internal".into()],
            ..Default::default()
        };
        let options = RunOptions {
            http_target: "http://svc.internal".into(),
            test_https: false,
            ..Default::default()
        };
        let recorder = Recorder::default();
        let results = run_all_tests(&config, &options, &recorder, &Silent).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].proxy_url, DIRECT);
    }

    #[tokio::test]
    async fn unusable_proxy_is_reported_without_probing() {
        let config = ProxyConfig {
            http: Some("proxy-without-scheme:8080".into()),
            ..Default::default()
        };
        let options = RunOptions {
            test_https: false,
            ..Default::default()
        };
        let recorder = Recorder::default();
        let results = run_all_tests(&config, &options, &recorder, &Silent).await;

        assert!(calls(&recorder).is_empty());
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].error_code.as_deref(), Some(codes::ERR_INVALID_URL));
    }

    #[test]
    fn summary_requires_at_least_one_result() {
        let summary = TestSummary::new(ProxyConfig::default(), Vec::new());
        assert!(!summary.all_passed);
        assert_eq!(summary.failed_count(), 0);
        assert!(summary.timestamp.ends_with('Z'));
    }
}
