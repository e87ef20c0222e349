//! Utility functions and helpers

pub mod ports;

use std::fmt::Display;
use std::path::Path;

use colored::Colorize;

pub use ports::{acquire_port, is_port_free};

/// Print an informational status line
pub fn dev_log(message: impl Display) {
    eprintln!("{} {}", "◈".cyan(), message);
}

/// Print a warning status line
pub fn dev_warn(message: impl Display) {
    eprintln!("{} {}", "◈".yellow(), message);
}

/// Print an error status line
pub fn dev_error(message: impl Display) {
    eprintln!("{} {}", "◈".red(), message.to_string().red());
}

/// Get relative path from base to target
pub fn relative_path(from: &Path, to: &Path) -> Option<String> {
    pathdiff::diff_paths(to, from)
        .map(|p| p.display().to_string())
}

/// Clean a path by removing . and .. components
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if path.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}
