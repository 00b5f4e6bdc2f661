//! Structured logging and progress reporting, built on `tracing` for log
//! lines, `console` for colored prefixes, and `indicatif` for per-task
//! progress bars (the per-task spans themselves are styled via
//! `tracing-indicatif` where they're entered, in `scheduler::run_one`).

use std::collections::HashMap;
use std::sync::Mutex;

use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::span::EnteredSpan;

const ANSI_RED: Style = Style::new().red();
const ANSI_YELLOW: Style = Style::new().yellow();
const ANSI_DIM: Style = Style::new().dim();

/// Every fallible, user-facing operation logs through this trait rather than
/// calling `tracing` macros directly, so tests can substitute a silent logger
/// and so a future front-end could swap in a different backend.
pub trait Logger: Send + Sync {
    /// Pushes `project:target` onto the logging context. The returned guard
    /// pops it on drop, which gives the context stack push-on-enter,
    /// pop-on-every-exit-path behavior even when the caller returns early
    /// through `?`.
    fn push_context(&self, project: &str, target: &str) -> ContextGuard;

    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn debug(&self, message: &str);

    fn start_progress(&self, id: &str, message: &str);
    fn update_progress(&self, id: &str, message: &str);
    fn complete_progress(&self, id: &str, message: &str);
}

/// RAII handle returned by [`Logger::push_context`]. Wraps a `tracing`
/// [`EnteredSpan`], whose own `Drop` impl exits the span — so popping the
/// logging context is just a side effect of the guard going out of scope.
pub struct ContextGuard {
    _entered: EnteredSpan,
}

/// Default [`Logger`] backed by `tracing` for structured log lines and
/// `indicatif` for progress bars, one per live task.
pub struct TracingLogger {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl TracingLogger {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        Self {
            multi: MultiProgress::new(),
            style,
            bars: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for TracingLogger {
    fn push_context(&self, project: &str, target: &str) -> ContextGuard {
        let span = tracing::span!(tracing::Level::INFO, "target", project = %project, target = %target);
        ContextGuard {
            _entered: span.entered(),
        }
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", ANSI_RED.apply_to(message));
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", ANSI_YELLOW.apply_to(message));
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{}", ANSI_DIM.apply_to(message));
    }

    fn start_progress(&self, id: &str, message: &str) {
        tracing::info!("{message}");
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(self.style.clone());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        self.bars
            .lock()
            .expect("progress bar map lock poisoned")
            .insert(id.to_string(), bar);
    }

    fn update_progress(&self, id: &str, message: &str) {
        if let Some(bar) = self.bars.lock().expect("progress bar map lock poisoned").get(id) {
            bar.set_message(message.to_string());
        }
    }

    fn complete_progress(&self, id: &str, message: &str) {
        if let Some(bar) = self.bars.lock().expect("progress bar map lock poisoned").remove(id) {
            bar.finish_with_message(message.to_string());
        }
    }
}

/// A [`Logger`] that discards everything. Used in tests that exercise the
/// scheduler/resolver but don't want to assert on log output.
pub struct SilentLogger;

impl Logger for SilentLogger {
    fn push_context(&self, project: &str, target: &str) -> ContextGuard {
        let span = tracing::span!(tracing::Level::TRACE, "target", project = %project, target = %target);
        ContextGuard {
            _entered: span.entered(),
        }
    }

    fn error(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
    fn start_progress(&self, _id: &str, _message: &str) {}
    fn update_progress(&self, _id: &str, _message: &str) {}
    fn complete_progress(&self, _id: &str, _message: &str) {}
}
