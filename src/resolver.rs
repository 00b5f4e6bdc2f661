//! Target-level resolution: a depth-first walk over the project/target
//! dependency graphs that runs each project's own dependency closure before
//! any of its targets, then each target's dependencies before the target
//! itself, memoizing on `executed_projects`/`executed_targets` so diamond
//! dependencies run at most once per invocation.

use std::collections::HashSet;

use crate::error::BuildError;
use crate::logger::Logger;
use crate::project::ProjectRegistry;
use crate::scheduler::TaskScheduler;
use crate::target::Dependency;

fn project_key(project: &str) -> String {
    format!("project:{project}")
}

fn target_key(project: &str, target: &str) -> String {
    format!("{project}:{target}")
}

/// Drives the resolution of one or more target specs against a
/// [`ProjectRegistry`], running each target's [`TaskScheduler`] once its
/// dependencies (and their dependencies) have run. Each `in_progress_*` set
/// is entered and left on every exit path of its matching `run_*` method
/// (including error returns), which is what makes cycle detection sound
/// across repeated `execute` calls on the same resolver. Projects and
/// targets keep separate `in_progress` sets, just like they keep separate
/// `executed_*` sets: a project and a target can legitimately share a name
/// (a project literally named `"project"` referenced while a target `"foo"`
/// in it is running would otherwise collide on the single string
/// `"project:foo"` used by both `project_key("foo")` and
/// `target_key("project", "foo")`), so a shared namespace would raise
/// spurious cycles.
pub struct TargetResolver<'a> {
    registry: &'a ProjectRegistry,
    logger: &'a dyn Logger,
    executed_projects: HashSet<String>,
    executed_targets: HashSet<String>,
    in_progress_projects: HashSet<String>,
    in_progress_targets: HashSet<String>,
}

impl<'a> TargetResolver<'a> {
    pub fn new(registry: &'a ProjectRegistry, logger: &'a dyn Logger) -> Self {
        Self {
            registry,
            logger,
            executed_projects: HashSet::new(),
            executed_targets: HashSet::new(),
            in_progress_projects: HashSet::new(),
            in_progress_targets: HashSet::new(),
        }
    }

    /// Runs `project:target`, and everything it transitively depends on that
    /// hasn't already run in this resolver's lifetime.
    pub fn execute(&mut self, project: &str, target: &str) -> Result<(), BuildError> {
        self.run_project_closure(project)?;
        self.run_target(project, target)
    }

    fn run_project_closure(&mut self, project: &str) -> Result<(), BuildError> {
        if self.executed_projects.contains(project) {
            return Ok(());
        }

        if self.in_progress_projects.contains(project) {
            return Err(BuildError::CyclicTargetDependency(project_key(project)));
        }
        self.in_progress_projects.insert(project.to_string());

        let result = self.run_project_closure_inner(project);

        self.in_progress_projects.remove(project);
        if result.is_ok() {
            self.executed_projects.insert(project.to_string());
        }
        result
    }

    fn run_project_closure_inner(&mut self, project: &str) -> Result<(), BuildError> {
        let proj = self
            .registry
            .get_project(project)
            .ok_or_else(|| crate::error::UnknownTargetError::UnknownProject(project.to_string()))?;
        let deps = proj.dependencies().to_vec();

        for dep in &deps {
            self.run_project_closure(dep)?;
        }
        Ok(())
    }

    fn run_target(&mut self, project: &str, target: &str) -> Result<(), BuildError> {
        let key = target_key(project, target);
        if self.executed_targets.contains(&key) {
            return Ok(());
        }
        if self.in_progress_targets.contains(&key) {
            return Err(BuildError::CyclicTargetDependency(key));
        }
        self.in_progress_targets.insert(key.clone());

        let result = self.run_target_inner(project, target, &key);

        self.in_progress_targets.remove(&key);
        if result.is_ok() {
            self.executed_targets.insert(key);
        }
        result
    }

    fn run_target_inner(&mut self, project: &str, target: &str, key: &str) -> Result<(), BuildError> {
        let guard = self.logger.push_context(project, target);

        let proj = self
            .registry
            .get_project(project)
            .ok_or_else(|| crate::error::UnknownTargetError::UnknownProject(project.to_string()))?;
        let tgt = proj
            .get_target(target)
            .ok_or_else(|| crate::error::UnknownTargetError::UnknownTarget {
                project: project.to_string(),
                target: target.to_string(),
            })?;

        let dependencies = tgt.dependencies().to_vec();
        let tasks = tgt.tasks().to_vec();
        let base_dir = tgt
            .base_dir()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| camino::Utf8PathBuf::from("."));

        for dependency in &dependencies {
            match dependency {
                Dependency::Local(name) => self.run_target(project, name)?,
                Dependency::Target { project: p, target: t } => {
                    self.run_project_closure(p)?;
                    self.run_target(p, t)?;
                }
                Dependency::Project(p) => self.run_project_closure(p)?,
            }
        }

        let scheduler = TaskScheduler::new();
        let run_result = scheduler.run(key, &tasks, &base_dir, self.logger);

        drop(guard);
        run_result
    }
}
