//! One small error enum per component, rolled up into [`BuildError`] via
//! `#[from]` so each subsystem's failures stay distinguishable while callers
//! can still propagate everything with a single `?`.

use thiserror::Error;

/// Raised by [`crate::task::Task::validate`] when a task's configuration is
/// missing required fields or is otherwise unusable.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InvalidTaskConfig(pub String);

impl InvalidTaskConfig {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Dependency resolution failures: a [`crate::target::Dependency`] or target
/// spec that doesn't resolve to anything in the registry.
#[derive(Debug, Error)]
pub enum UnknownTargetError {
    #[error("unknown project `{0}`")]
    UnknownProject(String),

    #[error("unknown target `{target}` in project `{project}`")]
    UnknownTarget { project: String, target: String },

    #[error(
        "target spec `{0}` is ambiguous: the registry has more than one project, use `project:target`"
    )]
    AmbiguousProject(String),
}

/// Failures while building or validating a target's task DAG.
#[derive(Debug, Error)]
pub enum TaskGraphError {
    #[error("circular file dependency between tasks `{a}` and `{b}`")]
    CircularFileDependency { a: String, b: String },

    #[error("artifact `{name}` already has a producer in this task list")]
    DuplicateArtifactProducer { name: String },

    #[error("artifact `{name}` is consumed but has no producer and no default")]
    MissingArtifactProducer { name: String },

    #[error("cycle in task graph: {}", .path.join(" -> "))]
    CycleInTaskGraph { path: Vec<String> },

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("glob expansion error: {0}")]
    GlobIter(#[from] glob::GlobError),

    #[error("glob expansion produced a non-UTF-8 path: {0}")]
    NonUtf8Path(String),
}

/// Failures from the [`crate::artifact::Artifact`] channel itself.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact `{name}` already has a producer")]
    DuplicateProducer { name: String },

    #[error("artifact `{name}` has no value and no default")]
    Unresolved { name: String },
}

/// Malformed `target_spec` grammar: `ident (":" ident)?`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetSpecError {
    #[error("target spec must not be empty")]
    Empty,

    #[error("target spec `{0}` has an empty component")]
    EmptyComponent(String),

    #[error("target spec `{0}` has more than one `:`")]
    TooManyComponents(String),
}

/// The crate-wide error type. Every fallible entry point in `kiln` returns this.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid task configuration for target `{target}`: {source}")]
    InvalidTaskConfig {
        target: String,
        #[source]
        source: InvalidTaskConfig,
    },

    #[error(transparent)]
    UnknownTarget(#[from] UnknownTargetError),

    #[error("cyclic target dependency: {0}")]
    CyclicTargetDependency(String),

    #[error(transparent)]
    TaskGraph(#[from] TaskGraphError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("task `{task}` failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "no progress could be made scheduling target `{target}`; this indicates an undetected cycle"
    )]
    NoProgress { target: String },

    #[error(transparent)]
    TargetSpec(#[from] TargetSpecError),

    /// A child process spawned by a concrete task exited non-zero, or was
    /// killed by a signal (`code: None`). The core never constructs this
    /// itself — it has no process-spawning dependency of its own — but task
    /// authors are expected to wrap their child-process failures in it so
    /// that `BuildError` can represent the §7 "external command" row
    /// uniformly. Deliberately carries only the command name and exit code,
    /// no stack trace, per §7's "surfaced without stack traces" rule.
    #[error("command `{command}` failed{}", .code.map(|c| format!(" (exit code {c})")).unwrap_or_else(|| " (terminated by signal)".to_string()))]
    ExternalCommand { command: String, code: Option<i32> },
}

impl BuildError {
    /// Convenience constructor for task authors wrapping a child-process
    /// failure, e.g. `BuildError::external_command("cp", status.code())`.
    pub fn external_command(command: impl Into<String>, code: Option<i32>) -> Self {
        Self::ExternalCommand {
            command: command.into(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_command_with_exit_code_has_no_stack_trace_in_its_display() {
        let err = BuildError::external_command("cp", Some(1));
        assert_eq!(err.to_string(), "command `cp` failed (exit code 1)");
    }

    #[test]
    fn external_command_killed_by_signal_has_no_exit_code() {
        let err = BuildError::external_command("zip", None);
        assert_eq!(err.to_string(), "command `zip` failed (terminated by signal)");
    }
}
