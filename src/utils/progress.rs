//! Bundler progress bar

use colored::Colorize;
use console::Term;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_WIDTH: u64 = 20;

/// Renders driver progress events as a single bar on stderr
///
/// Disabled when stderr is not a terminal.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
    last_step: u64,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let enabled = Term::stderr().features().is_attended();
        Self::with_enabled(enabled)
    }

    /// Reporter that never draws
    pub fn hidden() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        let bar = enabled.then(|| {
            let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
            let template = format!(
                "{} {{bar:{}}} {} {{msg}}",
                " WEBPACK ".black().on_green(),
                BAR_WIDTH,
                "{percent}%".magenta()
            );
            if let Ok(style) = ProgressStyle::with_template(&template) {
                bar.set_style(style.progress_chars("= "));
            }
            bar
        });

        Self { bar, last_step: 0 }
    }

    /// Handle one progress event, `percent` in `0.0..=1.0`
    pub fn update(&mut self, percent: f64, message: &str) {
        let Some(bar) = &self.bar else {
            return;
        };

        let percent = percent.clamp(0.0, 1.0);
        let step = (percent * BAR_WIDTH as f64).ceil() as u64;

        if bar.is_finished() {
            bar.reset();
            self.last_step = 0;
        }

        if step != self.last_step {
            bar.set_position((percent * 100.0).round() as u64);
            bar.set_message(message.cyan().to_string());
            self.last_step = step;
        }

        if percent >= 1.0 {
            bar.finish_and_clear();
        }
    }

    /// Remove the bar if a compilation ended without reaching 100%
    pub fn clear(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        self.last_step = 0;
    }

    #[cfg(test)]
    fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
