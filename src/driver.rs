//! The top-level driver: resolves each requested target spec against the
//! registry and runs it through one [`TargetResolver`], so
//! memoization of shared dependencies spans the whole invocation rather than
//! resetting per spec. On the first failure it logs a single `Build failed`
//! line and stops — no partial-success summary is printed for specs that
//! happened to run first.

use crate::error::BuildError;
use crate::logger::Logger;
use crate::project::ProjectRegistry;
use crate::resolver::TargetResolver;
use crate::target_spec::TargetSpec;

/// Runs every target spec in `specs`, in order, against `registry`.
pub fn run(registry: &ProjectRegistry, specs: &[TargetSpec], logger: &dyn Logger) -> Result<(), BuildError> {
    let mut resolver = TargetResolver::new(registry, logger);

    for spec in specs {
        let (project, target) = registry.resolve_spec(spec)?;
        let project_name = project.name().to_string();
        let target_name = target.name().to_string();

        if let Err(err) = resolver.execute(&project_name, &target_name) {
            logger.error(&format!("Build failed: {err}"));
            return Err(err);
        }
    }

    Ok(())
}
