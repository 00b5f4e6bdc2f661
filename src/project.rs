//! `Project` and `ProjectRegistry`: the top-level containers target
//! resolution walks over. The registry owns `Project`s by value in a
//! `HashMap` rather than through owning pointer cycles, so targets can
//! reference sibling projects by name without any lifetime gymnastics.

use std::collections::HashMap;

use camino::Utf8PathBuf;

use crate::error::{BuildError, UnknownTargetError};
use crate::target::Target;
use crate::target_spec::TargetSpec;

/// A named collection of targets plus the other projects it depends on.
pub struct Project {
    pub(crate) name: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) targets: HashMap<String, Target>,
    pub(crate) base_dir: Option<Utf8PathBuf>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            targets: HashMap::new(),
            base_dir: None,
        }
    }

    pub fn depends_on(mut self, project: impl Into<String>) -> Self {
        self.dependencies.push(project.into());
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.insert(target.name().to_string(), target);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn get_target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }
}

/// Owns every [`Project`] in a build, keyed by name. Duplicate target names
/// across different projects are permitted; callers disambiguate with
/// `project:target` via [`ProjectRegistry::resolve_spec`].
#[derive(Default)]
pub struct ProjectRegistry {
    projects: HashMap<String, Project>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, project: Project) {
        self.projects.insert(project.name.clone(), project);
    }

    pub fn get_project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Resolves a parsed [`TargetSpec`] against this registry. A spec with no
    /// project component is only unambiguous when the registry holds exactly
    /// one project.
    pub fn resolve_spec(&self, spec: &TargetSpec) -> Result<(&Project, &Target), BuildError> {
        let project = match &spec.project {
            Some(name) => self
                .get_project(name)
                .ok_or_else(|| UnknownTargetError::UnknownProject(name.clone()))?,
            None => {
                if self.projects.len() != 1 {
                    let rendered = spec.target.clone();
                    return Err(UnknownTargetError::AmbiguousProject(rendered).into());
                }
                self.projects.values().next().expect("len checked above")
            }
        };

        let target = project
            .get_target(&spec.target)
            .ok_or_else(|| UnknownTargetError::UnknownTarget {
                project: project.name.clone(),
                target: spec.target.clone(),
            })?;

        Ok((project, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_target(name: &str) -> Target {
        Target::new(name, vec![]).unwrap()
    }

    #[test]
    fn resolve_spec_with_explicit_project() {
        let mut registry = ProjectRegistry::new();
        registry.register(Project::new("app").with_target(empty_target("build")));

        let spec = TargetSpec::parse("app:build").unwrap();
        let (project, target) = registry.resolve_spec(&spec).unwrap();
        assert_eq!(project.name(), "app");
        assert_eq!(target.name(), "build");
    }

    #[test]
    fn resolve_spec_bare_target_requires_single_project() {
        let mut registry = ProjectRegistry::new();
        registry.register(Project::new("app").with_target(empty_target("build")));
        registry.register(Project::new("lib").with_target(empty_target("build")));

        let spec = TargetSpec::parse("build").unwrap();
        let err = registry.resolve_spec(&spec).unwrap_err();
        assert!(matches!(
            err,
            BuildError::UnknownTarget(UnknownTargetError::AmbiguousProject(_))
        ));
    }

    #[test]
    fn resolve_spec_bare_target_with_one_project() {
        let mut registry = ProjectRegistry::new();
        registry.register(Project::new("app").with_target(empty_target("build")));

        let spec = TargetSpec::parse("build").unwrap();
        let (project, _target) = registry.resolve_spec(&spec).unwrap();
        assert_eq!(project.name(), "app");
    }

    #[test]
    fn resolve_spec_unknown_project() {
        let registry = ProjectRegistry::new();
        let spec = TargetSpec::parse("missing:build").unwrap();
        assert!(matches!(
            registry.resolve_spec(&spec).unwrap_err(),
            BuildError::UnknownTarget(UnknownTargetError::UnknownProject(_))
        ));
    }
}
