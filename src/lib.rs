#![deny(unsafe_code, clippy::panic)]

//! `kiln` is a two-layer build orchestration engine:
//!
//! - [`resolver::TargetResolver`] walks project/target dependency graphs and
//!   decides *which* targets must run, in what order, at most once per
//!   invocation.
//! - [`scheduler::TaskScheduler`] takes one target's task list, builds a
//!   per-target task DAG from file and [`artifact::Artifact`] edges, and
//!   runs it level by level, skipping tasks the [`oracle::IncrementalOracle`]
//!   finds already up to date.
//!
//! [`driver::run`] ties the two together for a whole invocation.

pub mod artifact;
pub mod driver;
pub mod error;
mod graph;
pub mod logger;
mod oracle;
pub mod project;
pub mod resolver;
pub mod scheduler;
pub mod target;
pub mod target_spec;
pub mod task;

pub use camino;

pub use artifact::Artifact;
pub use error::BuildError;
pub use logger::{Logger, SilentLogger, TracingLogger};
pub use project::{Project, ProjectRegistry};
pub use resolver::TargetResolver;
pub use scheduler::TaskScheduler;
pub use target::{Dependency, Target};
pub use target_spec::TargetSpec;
pub use task::{FnTask, Task, TaskContext, TaskId};
