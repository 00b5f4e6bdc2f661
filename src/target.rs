//! `Target` and `Dependency`. A target bundles the tasks that build it, the
//! other targets/projects it depends on, and the directory its paths resolve
//! relative to. Dependency references are modeled as a tagged sum with three
//! variants rather than a single string, so project- and target-scoped
//! references can't be confused at the type level.

use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::artifact::AnyArtifact;
use crate::error::BuildError;
use crate::task::Task;

/// A target-level dependency, resolved by [`crate::resolver::TargetResolver`]
/// before the target's own tasks run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Dependency {
    /// Another target in the same project.
    Local(String),
    /// A target in a different project (the project's own closure runs first).
    Target { project: String, target: String },
    /// Another project's full closure, without running one specific target of it.
    Project(String),
}

/// A named, buildable unit: a task list plus the dependencies that must be
/// satisfied before those tasks run.
pub struct Target {
    pub(crate) name: String,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) tasks: Vec<Arc<dyn Task>>,
    pub(crate) artifacts: Vec<Arc<dyn AnyArtifact>>,
    pub(crate) base_dir: Option<Utf8PathBuf>,
}

impl Target {
    /// Constructs a target from its task list, validating every task in
    /// declaration order. A validation failure aborts target construction.
    pub fn new(name: impl Into<String>, tasks: Vec<Arc<dyn Task>>) -> Result<Self, BuildError> {
        let name = name.into();
        for task in &tasks {
            task.validate()
                .map_err(|source| BuildError::InvalidTaskConfig {
                    target: name.clone(),
                    source,
                })?;
        }
        Ok(Self {
            name,
            dependencies: Vec::new(),
            tasks,
            artifacts: Vec::new(),
            base_dir: None,
        })
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Records an artifact as one this target is known to produce. Purely
    /// informational bookkeeping for introspection; the DAG builder derives
    /// the actual producer/consumer wiring from each task's own
    /// `output_artifacts`/`input_artifacts`.
    pub fn produces(mut self, artifact: Arc<dyn AnyArtifact>) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn tasks(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    /// Artifacts this target has declared itself a producer of via
    /// [`Target::produces`], for introspection (e.g. a `list`-style front
    /// end describing what a target makes available to its dependents).
    pub fn artifacts(&self) -> &[Arc<dyn AnyArtifact>] {
        &self.artifacts
    }

    pub fn base_dir(&self) -> Option<&camino::Utf8Path> {
        self.base_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidTaskConfig;
    use crate::task::{FnTask, TaskContext};

    #[test]
    fn construction_validates_tasks_in_order() {
        let good: Arc<dyn Task> = Arc::new(FnTask::new("good", |_ctx: &TaskContext<'_>| Ok(())));
        let bad: Arc<dyn Task> = Arc::new(
            FnTask::new("bad", |_ctx: &TaskContext<'_>| Ok(()))
                .with_validate(|| Err(InvalidTaskConfig::new("missing field"))),
        );
        let err = Target::new("broken", vec![good, bad]).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTaskConfig { .. }));
    }

    #[test]
    fn builder_chain_accumulates_dependencies() {
        let target = Target::new("build", vec![])
            .unwrap()
            .depends_on(Dependency::Local("fetch".to_string()))
            .depends_on(Dependency::Project("shared".to_string()));
        assert_eq!(target.dependencies().len(), 2);
    }

    #[test]
    fn produces_is_readable_back_through_artifacts() {
        let classpath: Arc<crate::artifact::Artifact<Vec<String>>> =
            crate::artifact::Artifact::new("classpath");
        let target = Target::new("build", vec![])
            .unwrap()
            .produces(classpath.clone() as Arc<dyn AnyArtifact>);

        assert_eq!(target.artifacts().len(), 1);
        assert_eq!(target.artifacts()[0].name(), "classpath");
    }
}
