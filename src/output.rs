use crate::diagnosis::diagnose;
use crate::proxy::{mask_credentials, ProxyConfig};
use crate::runner::TestSummary;
use crate::verification::TestResult;
use colored::Colorize;
use std::fmt::Write as _;

/// Writes either the human-readable report or the JSON summary to stdout.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn header(&self) {
        if self.json {
            return;
        }
        println!();
        println!(
            "{}{}",
            "Proxy Doctor".cyan().bold(),
            " - Checking your proxy configuration...".bright_black()
        );
        println!();
    }

    pub fn config(&self, config: &ProxyConfig) {
        if !self.json {
            print!("{}", render_config(config));
        }
    }

    pub fn result(&self, result: &TestResult) {
        if !self.json {
            print!("{}", render_result(result));
        }
    }

    pub fn summary(&self, summary: &TestSummary) {
        if self.json {
            match serde_json::to_string_pretty(summary) {
                Ok(json) => println!("{}", json),
                Err(e) => log::error!("cannot serialize summary: {}", e),
            }
            return;
        }

        let total = summary.results.len();
        let failed = summary.failed_count();
        if total == 0 {
            println!(
                "{}",
                "No proxy tests were run. Check if proxy environment variables are set.".yellow()
            );
        } else if failed == 0 {
            println!("{}", "All proxy connections are working correctly!".green().bold());
        } else {
            println!("{}", format!("{}/{} proxy tests failed.", failed, total).red().bold());
        }
        println!();
    }

    pub fn warn(&self, message: &str) {
        if !self.json {
            println!("{}", format!("warning: {}", message).yellow());
        }
    }

    /// Fatal error: stdout in human mode, the logger in JSON mode.
    pub fn unexpected(&self, err: &anyhow::Error) {
        if self.json {
            log::error!("{:#}", err);
        } else {
            println!("{}", render_unexpected(err).red());
        }
    }
}

pub fn render_unexpected(err: &anyhow::Error) -> String {
    format!("Unexpected error: {:#}", err)
}

pub fn render_config(config: &ProxyConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Detected Proxy Settings:".yellow().bold());

    let no_proxy = (!config.no_proxy.is_empty()).then(|| config.no_proxy.join(", "));
    let rows = [
        ("HTTP_PROXY:", config.http.as_deref().map(mask_credentials)),
        ("HTTPS_PROXY:", config.https.as_deref().map(mask_credentials)),
        ("ALL_PROXY:", config.all.as_deref().map(mask_credentials)),
        ("NO_PROXY:", no_proxy),
    ];
    for (name, value) in rows {
        let value = match value {
            Some(v) => v.green().to_string(),
            None => "(not set)".bright_black().to_string(),
        };
        let _ = writeln!(out, "   {:<14} {}", name, value);
    }
    out.push('\n');
    out
}

pub fn render_result(result: &TestResult) -> String {
    let mut out = String::new();
    let label = result.proxy_type.to_string();
    let target = format!("   -> Target: {}", result.target_url);
    let via = format!("   -> Via: {}", mask_credentials(&result.proxy_url));

    if result.success {
        let _ = writeln!(out, "{}", format!("[PASS] {} Proxy Test", label).green());
        let _ = writeln!(out, "{}", target.bright_black());
        let _ = writeln!(out, "{}", via.bright_black());
        let status = result.status_code.map(|s| s.to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{}{}",
            "   Success".green(),
            format!(" ({}ms)", result.response_time).bright_black(),
            format!(" [{}]", status).cyan()
        );
    } else {
        let _ = writeln!(out, "{}", format!("[FAIL] {} Proxy Test", label).red());
        let _ = writeln!(out, "{}", target.bright_black());
        let _ = writeln!(out, "{}", via.bright_black());
        let _ = writeln!(
            out,
            "{}{}",
            "   Failed".red(),
            format!(" ({}ms)", result.response_time).bright_black()
        );
        if let Some(status) = result.status_code {
            let _ = writeln!(out, "{}", format!("   Status: {}", status).red());
        }
        if let Some(error) = &result.error {
            let _ = writeln!(out, "{}", format!("   Error: {}", error).red());
        }
        if let Some(diagnostic) = diagnose(result) {
            let _ = writeln!(out, "{}", format!("   Issue: {}", diagnostic.issue).yellow());
            let _ = writeln!(out, "{}", format!("   Hint: {}", diagnostic.suggestion).yellow());
        }
    }
    out.push('\n');
    out
}
