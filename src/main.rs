use anyhow::Result;
use clap::Parser;
use log::debug;
use proxy_doctor::configuration::{override_config, Settings};
use proxy_doctor::output::Output;
use proxy_doctor::progress;
use proxy_doctor::proxy::mask_credentials;
use proxy_doctor::{
    detect_proxy, has_proxy_configured, run_all_tests, HttpProbe, ProcessEnv, TestSummary,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "proxy-doctor",
    version,
    about = "CLI tool to diagnose HTTP/HTTPS proxy connectivity"
)]
struct Cli {
    /// Proxy URL to test (overrides environment variables)
    #[arg(short, long, value_name = "URL")]
    proxy: Option<String>,

    /// Target URL to test connectivity against
    #[arg(short, long, value_name = "URL")]
    target: Option<String>,

    /// Request timeout in milliseconds [default: 10000]
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output results as JSON
    #[arg(short, long)]
    json: bool,

    /// Test HTTP proxy only
    #[arg(long)]
    http: bool,

    /// Test HTTPS proxy only
    #[arg(long)]
    https: bool,

    /// Test without any proxy
    #[arg(short, long)]
    direct: bool,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Settings file [default: proxy-doctor.toml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_logger(cli: &Cli) {
    let level = if cli.json {
        log::LevelFilter::Warn
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("proxy_doctor", level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(&cli);

    let output = Output::new(cli.json);
    let code = match run(&cli, output).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            output.unexpected(&e);
            1
        }
    };
    std::process::exit(code);
}

/// Returns whether every probe passed.
async fn run(cli: &Cli, output: Output) -> Result<bool> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path, true)?,
        None => Settings::new()?,
    };
    let run_options = settings.run_options(cli.target.as_deref(), cli.http, cli.https, cli.direct)?;
    let probe_options = settings.probe_options(cli.timeout, cli.insecure);

    let config = match &cli.proxy {
        Some(proxy) => {
            debug!("using provided proxy: {}", mask_credentials(proxy));
            override_config(proxy)?
        }
        None => detect_proxy(&ProcessEnv),
    };

    output.header();
    output.config(&config);

    if !cli.direct && !has_proxy_configured(&config) {
        output.warn("No proxy configuration found.");
        output.warn("Set HTTP_PROXY, HTTPS_PROXY, or ALL_PROXY environment variables,");
        output.warn("or use --proxy <url> to specify a proxy to test.");
        if output.is_json() {
            output.summary(&TestSummary::new(config, Vec::new()));
        }
        return Ok(false);
    }

    debug!(
        "timeout {}ms, insecure: {}",
        probe_options.timeout.as_millis(),
        probe_options.insecure
    );
    let prober = HttpProbe::new(probe_options);
    let progress = progress::for_output(output.is_json(), "Testing proxy connectivity...");
    let results = run_all_tests(&config, &run_options, &prober, progress.as_ref()).await;
    progress.finish();

    for result in &results {
        output.result(result);
    }

    let summary = TestSummary::new(config, results);
    output.summary(&summary);
    Ok(summary.all_passed)
}
