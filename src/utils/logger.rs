//! Console logger with colored severity badges
//!
//! `error` only prints. Deciding to exit is left to `main`.

use std::fmt::Display;

use colored::Colorize;

/// Informational message
pub fn info(message: impl Display) {
    eprintln!("{} {}", " INFO ".black().on_bright_blue(), message.to_string().blue());
}

/// Something the user should look at
pub fn warn(message: impl Display) {
    eprintln!("{} {}", " WARN ".black().on_yellow(), message.to_string().yellow());
}

/// A failure. Callers still return their error afterwards.
pub fn error(message: impl Display) {
    eprintln!("{} {}", " ERROR ".black().on_red(), message.to_string().red());
}
