//! The `Task` capability set: a unit of work that declares its file
//! inputs/outputs and the artifacts it consumes/produces, then runs against
//! a [`TaskContext`]. A small, object-safe trait that scheduling code holds
//! as `Arc<dyn Task>`. A task holds its own `Arc<Artifact<T>>` fields
//! directly rather than receiving resolved dependency values as an argument,
//! since reads/writes flow through a shared channel rather than a single
//! return value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::artifact::AnyArtifact;
use crate::error::{BuildError, InvalidTaskConfig};
use crate::logger::Logger;

/// Unique identity of a constructed task, minted once at construction time.
/// This is what [`crate::artifact::Artifact::register_producer`] records, so
/// that "the same task re-registering" is idempotent while "two different
/// tasks claiming the same artifact" is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub fn fresh() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything passed into [`Task::execute`]. Notably carries the target's
/// `base_dir` as plain configuration rather than the process ever calling
/// `chdir`.
pub struct TaskContext<'a> {
    pub target: &'a str,
    pub base_dir: &'a Utf8Path,
    pub logger: &'a dyn Logger,
}

/// The core trait for all tasks in a target's task list.
pub trait Task: Send + Sync {
    fn id(&self) -> TaskId;
    fn name(&self) -> &str;

    /// Glob patterns or plain paths read by this task, relative to the
    /// target's `base_dir` unless already absolute.
    fn inputs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Glob patterns or plain paths written by this task.
    fn outputs(&self) -> Vec<String> {
        Vec::new()
    }

    /// Artifacts this task reads. Declared here purely so the DAG builder can
    /// wire a producer -> consumer edge; the actual typed read happens inside
    /// `execute` through the task's own `Arc<Artifact<T>>` field.
    fn input_artifacts(&self) -> Vec<Arc<dyn AnyArtifact>> {
        Vec::new()
    }

    /// Artifacts this task produces. A task with a non-empty set here always
    /// runs, regardless of the incremental oracle's verdict.
    fn output_artifacts(&self) -> Vec<Arc<dyn AnyArtifact>> {
        Vec::new()
    }

    /// Called synchronously, in declaration order, when a `Target` is built.
    /// Must not have side effects.
    fn validate(&self) -> Result<(), InvalidTaskConfig> {
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()>;
}

/// Expands glob patterns and normalizes plain paths against `base_dir`.
/// Patterns containing `*`, `?`, or `[` are treated as globs; everything
/// else is joined to `base_dir` unless already absolute.
pub(crate) fn resolve_paths(
    patterns: &[String],
    base_dir: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>, BuildError> {
    use crate::error::TaskGraphError;

    let mut resolved = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            let full = base_dir.join(pattern.as_str());
            for entry in glob::glob(full.as_str()).map_err(TaskGraphError::from)? {
                let path = entry.map_err(TaskGraphError::from)?;
                let path = Utf8PathBuf::try_from(path)
                    .map_err(|e| TaskGraphError::NonUtf8Path(e.to_string()))?;
                resolved.push(path);
            }
        } else {
            let path = Utf8PathBuf::from(pattern.as_str());
            resolved.push(if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            });
        }
    }
    Ok(resolved)
}

/// Metadata every concrete task embeds: a fresh [`TaskId`] and a display name.
pub struct TaskMeta {
    id: TaskId,
    name: String,
}

impl TaskMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TaskId::fresh(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

type ValidateFn = Box<dyn Fn() -> Result<(), InvalidTaskConfig> + Send + Sync>;
type RunFn = Box<dyn Fn(&TaskContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// A generic closure-backed [`Task`], for callers who don't want to declare a
/// dedicated struct per task. This is deliberately the only concrete `Task`
/// the crate ships: a catalogue of domain tasks (copy, delete, archive, ...)
/// is out of scope.
pub struct FnTask {
    meta: TaskMeta,
    inputs: Vec<String>,
    outputs: Vec<String>,
    input_artifacts: Vec<Arc<dyn AnyArtifact>>,
    output_artifacts: Vec<Arc<dyn AnyArtifact>>,
    validate: Option<ValidateFn>,
    run: RunFn,
}

impl FnTask {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&TaskContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            meta: TaskMeta::new(name),
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_artifacts: Vec::new(),
            output_artifacts: Vec::new(),
            validate: None,
            run: Box::new(run),
        }
    }

    pub fn with_inputs(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inputs.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_outputs(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.outputs.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_validate(
        mut self,
        validate: impl Fn() -> Result<(), InvalidTaskConfig> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Declares this task as a consumer of `artifact`.
    pub fn consumes(mut self, artifact: Arc<dyn AnyArtifact>) -> Self {
        self.input_artifacts.push(artifact);
        self
    }

    /// Declares this task as the producer of `artifact`, registering itself
    /// with it immediately.
    pub fn produces<T: Send + Sync + 'static>(
        mut self,
        artifact: Arc<crate::artifact::Artifact<T>>,
    ) -> Result<Self, crate::error::ArtifactError> {
        artifact.register_producer(self.meta.id())?;
        self.output_artifacts.push(artifact);
        Ok(self)
    }
}

impl Task for FnTask {
    fn id(&self) -> TaskId {
        self.meta.id()
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn input_artifacts(&self) -> Vec<Arc<dyn AnyArtifact>> {
        self.input_artifacts.clone()
    }

    fn output_artifacts(&self) -> Vec<Arc<dyn AnyArtifact>> {
        self.output_artifacts.clone()
    }

    fn validate(&self) -> Result<(), InvalidTaskConfig> {
        match &self.validate {
            Some(f) => f(),
            None => Ok(()),
        }
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
        (self.run)(ctx)
    }
}
