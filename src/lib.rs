pub mod configuration;
pub mod diagnosis;
pub mod env;
pub mod filter;
pub mod output;
pub mod progress;
pub mod proxy;
pub mod resolver;
pub mod runner;
pub mod verification;

pub use diagnosis::{diagnose, DiagnosticInfo};
pub use env::{detect_proxy, Environment, ProcessEnv};
pub use filter::is_no_proxy;
pub use proxy::{has_proxy_configured, parse_proxy_url, ParsedProxy, ProxyConfig, ProxyKind};
pub use resolver::effective_proxy;
pub use runner::{run_all_tests, RunOptions, TestSummary};
pub use verification::{HttpProbe, Probe, ProbeOptions, TestResult};
