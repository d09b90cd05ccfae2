#![deny(missing_docs)]
//! Shared logging utilities for the press workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! a per-thread issue context that prefixes every message, and a minimal test
//! initializer for the global logger.

use std::cell::RefCell;

thread_local! {
    /// Identifier of the issue currently being processed on this thread.
    static ISSUE_CONTEXT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets (or clears) the issue identifier attached to log lines on this thread.
/// The pipeline calls this once per issue.
pub fn set_issue_context(issue_id: Option<&str>) {
    ISSUE_CONTEXT.with(|ctx| *ctx.borrow_mut() = issue_id.map(str::to_owned));
}

/// Returns the issue identifier attached to this thread, if any.
pub fn issue_context() -> Option<String> {
    ISSUE_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Message prefix derived from the current issue context (`"[id] "` or empty).
#[doc(hidden)]
pub fn context_prefix() -> String {
    ISSUE_CONTEXT.with(|ctx| match ctx.borrow().as_deref() {
        Some(id) => format!("[{id}] "),
        None => String::new(),
    })
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
