//! User-facing console output for the trigr CLI
//!
//! Messages go to stderr so a manifest printed on stdout stays machine
//! readable. Every message is also appended to the optional log file,
//! regardless of verbosity.

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Debug,
    Step,
    Warn,
    Error,
    Success,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Step => "STEP",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Success => "SUCCESS",
        }
    }

    /// Minimum verbosity for the console; errors ignore `quiet`
    fn visible(self, state: &State) -> bool {
        match self {
            Level::Error => true,
            _ if state.quiet => false,
            Level::Debug => state.verbosity >= 1,
            Level::Step => state.verbosity >= 2,
            Level::Warn | Level::Success => true,
        }
    }

    fn prefix(self) -> ColoredString {
        match self {
            Level::Debug => "debug:".blue().bold(),
            Level::Step => "trace:".dimmed(),
            Level::Warn => "warning:".yellow().bold(),
            Level::Error => "error:".red().bold(),
            Level::Success => "\u{2714}".green().bold(),
        }
    }
}

#[derive(Default)]
struct State {
    verbosity: u8,
    quiet: bool,
    log_file: Option<PathBuf>,
    spinner: Option<ProgressBar>,
}

static STATE: Mutex<State> = Mutex::new(State {
    verbosity: 0,
    quiet: false,
    log_file: None,
    spinner: None,
});

fn state() -> Option<MutexGuard<'static, State>> {
    STATE.lock().ok()
}

/// Set the verbosity, quiet flag and optional log file
///
/// The log file's parent directory is created when missing; the file itself
/// is opened in append mode on every write.
pub fn init(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<(), String> {
    if let Some(parent) = log_file
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create log directory {}: {}", parent.display(), e))?;
    }

    let mut guard = state().ok_or_else(|| "Logger state is poisoned".to_string())?;
    guard.verbosity = verbosity;
    guard.quiet = quiet;
    if let Some(path) = log_file {
        guard.log_file = Some(path.to_path_buf());
    }
    Ok(())
}

pub fn verbosity() -> u8 {
    state().map_or(0, |s| s.verbosity)
}

pub fn is_quiet() -> bool {
    state().is_some_and(|s| s.quiet)
}

/// Force colored output on or off, overriding terminal detection
pub fn set_color(enabled: bool) {
    colored::control::set_override(enabled);
}

/// Tracing filter directive matching the current verbosity
pub fn verbosity_to_filter() -> &'static str {
    if is_quiet() {
        return "error";
    }
    match verbosity() {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn emit(level: Level, message: &str) {
    let Some(guard) = state() else {
        eprintln!("{} {}", level.prefix(), message);
        return;
    };

    if let Some(path) = &guard.log_file {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "[{}] {} {}", timestamp, level.tag(), message);
        }
    }

    if level.visible(&guard) {
        let line = format!("{} {}", level.prefix(), message);
        match &guard.spinner {
            Some(spinner) => spinner.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }
}

pub fn debug(message: &str) {
    emit(Level::Debug, message);
}

/// Pipeline progress; shown on the console at `-vv`
pub fn step(message: &str) {
    emit(Level::Step, message);
}

pub fn warn(message: &str) {
    emit(Level::Warn, message);
}

/// Always printed, even with `--quiet`
pub fn error(message: &str) {
    emit(Level::Error, message);
}

pub fn success(message: &str) {
    emit(Level::Success, message);
}

pub fn log_path() -> Option<PathBuf> {
    state().and_then(|s| s.log_file.clone())
}

/// Point the user at the log file after a failure
pub fn show_log_path() {
    if let Some(path) = log_path() {
        eprintln!("Log file: {}", path.display());
    }
}

/// Show a spinner while a long phase runs
///
/// Skipped when verbose output would interleave with it, or when quiet.
pub fn spinner_start(message: &str) {
    let Some(mut guard) = state() else {
        return;
    };
    if guard.verbosity > 0 || guard.quiet {
        return;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    if let Some(previous) = guard.spinner.replace(spinner) {
        previous.finish_and_clear();
    }
}

pub fn spinner_stop() {
    let spinner = state().and_then(|mut s| s.spinner.take());
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_records_every_level() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join("logs").join("trigr.log");
        assert!(init(0, true, Some(&path)).is_ok());

        debug("first");
        warn("second");
        step("third");

        let Ok(content) = fs::read_to_string(&path) else {
            panic!("log file should exist");
        };
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("DEBUG first"));
        assert!(lines[1].ends_with("WARN second"));
        assert!(lines[2].ends_with("STEP third"));
        assert_eq!(log_path(), Some(path.clone()));
        assert_eq!(verbosity_to_filter(), "error");
    }

    #[test]
    fn test_level_visibility() {
        let quiet = State {
            quiet: true,
            ..State::default()
        };
        assert!(Level::Error.visible(&quiet));
        assert!(!Level::Warn.visible(&quiet));

        let verbose = State {
            verbosity: 1,
            ..State::default()
        };
        assert!(Level::Debug.visible(&verbose));
        assert!(!Level::Step.visible(&verbose));
    }
}
