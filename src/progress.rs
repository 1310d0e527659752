use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Feedback shown while probes are in flight.
pub trait Progress: Send + Sync {
    fn set_message(&self, message: &str);
    fn finish(&self);
}

/// Terminal spinner on stderr.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl Progress for Spinner {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Used with `--json`, where stdout carries only the summary.
pub struct Silent;

impl Progress for Silent {
    fn set_message(&self, _message: &str) {}

    fn finish(&self) {}
}

pub fn for_output(json: bool, message: &str) -> Box<dyn Progress> {
    if json {
        Box::new(Silent)
    } else {
        Box::new(Spinner::start(message))
    }
}
