use crate::proxy::ProxyConfig;
use std::collections::HashMap;

const HTTP_VARS: [&str; 2] = ["HTTP_PROXY", "http_proxy"];
const HTTPS_VARS: [&str; 2] = ["HTTPS_PROXY", "https_proxy"];
const ALL_VARS: [&str; 2] = ["ALL_PROXY", "all_proxy"];
const NO_PROXY_VARS: [&str; 2] = ["NO_PROXY", "no_proxy"];

/// Read-only key/value lookup the detector works against.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl Environment for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// First non-empty value among `names`, in order.
fn first_set(env: &impl Environment, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env.var(name))
        .find(|value| !value.is_empty())
}

/// Splits a NO_PROXY value on commas, trimming and dropping empty entries.
pub fn parse_no_proxy(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Builds a [`ProxyConfig`] from the proxy variables, uppercase names first.
pub fn detect_proxy(env: &impl Environment) -> ProxyConfig {
    ProxyConfig {
        http: first_set(env, &HTTP_VARS),
        https: first_set(env, &HTTPS_VARS),
        all: first_set(env, &ALL_VARS),
        no_proxy: parse_no_proxy(first_set(env, &NO_PROXY_VARS).as_deref()),
    }
}
