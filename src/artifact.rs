//! Typed artifact channels: a single named cell that exactly one task may
//! produce and any number of tasks may consume. Values are type-erased at
//! the graph-wiring layer only (via [`AnyArtifact`]); the typed value itself
//! never leaves `Artifact<T>`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ArtifactError;
use crate::task::TaskId;

/// Opaque identity used to match an artifact's producer declaration against
/// its consumer declarations during DAG construction, without needing to know
/// the artifact's value type `T`.
pub type ArtifactId = u64;

fn next_artifact_id() -> ArtifactId {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

enum ArtifactDefault<T> {
    Value(Arc<T>),
    Factory(Box<dyn Fn() -> T + Send + Sync>),
}

/// A typed, named, at-most-one-producer value channel.
///
/// Tasks hold `Arc<Artifact<T>>` directly as fields and call [`Artifact::get_value`]/
/// [`Artifact::set_value`] from inside [`crate::task::Task::execute`]; the
/// scheduler never touches the typed value, only the type-erased [`AnyArtifact`]
/// view used to infer DAG edges.
pub struct Artifact<T: Send + Sync + 'static> {
    name: String,
    id: ArtifactId,
    default: Option<ArtifactDefault<T>>,
    cell: Mutex<Option<Arc<T>>>,
    producer: Mutex<Option<TaskId>>,
}

impl<T: Send + Sync + 'static> Artifact<T> {
    /// An artifact with no default: reads before the producer runs fail.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            id: next_artifact_id(),
            default: None,
            cell: Mutex::new(None),
            producer: Mutex::new(None),
        })
    }

    /// An artifact that falls back to a fixed value until a producer sets one.
    pub fn with_default(name: impl Into<String>, default: T) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            id: next_artifact_id(),
            default: Some(ArtifactDefault::Value(Arc::new(default))),
            cell: Mutex::new(None),
            producer: Mutex::new(None),
        })
    }

    /// An artifact whose default is computed lazily, once, on first read.
    pub fn with_default_fn(
        name: impl Into<String>,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            id: next_artifact_id(),
            default: Some(ArtifactDefault::Factory(Box::new(factory))),
            cell: Mutex::new(None),
            producer: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares `task` as this artifact's producer. Idempotent for the same
    /// task; fails if a different task already holds the slot. Concrete tasks
    /// call this from their own constructor as soon as they're built, which
    /// is why it takes `&self` rather than requiring ownership.
    pub fn register_producer(&self, task: TaskId) -> Result<(), ArtifactError> {
        let mut producer = self.producer.lock().expect("artifact producer lock poisoned");
        match *producer {
            Some(existing) if existing != task => Err(ArtifactError::DuplicateProducer {
                name: self.name.clone(),
            }),
            _ => {
                *producer = Some(task);
                Ok(())
            }
        }
    }

    pub fn has_producer(&self) -> bool {
        self.producer.lock().expect("artifact producer lock poisoned").is_some()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn has_value(&self) -> bool {
        self.cell.lock().expect("artifact cell lock poisoned").is_some()
    }

    /// Stores `value`, overwriting whatever was there before.
    pub fn set_value(&self, value: T) {
        *self.cell.lock().expect("artifact cell lock poisoned") = Some(Arc::new(value));
    }

    /// Returns the stored value, falling back to the default if unset. The
    /// factory default is memoized into the cell on first read so repeated
    /// reads observe the same instance until the next [`Artifact::reset`].
    pub fn get_value(&self) -> Result<Arc<T>, ArtifactError> {
        let mut cell = self.cell.lock().expect("artifact cell lock poisoned");
        if let Some(value) = cell.as_ref() {
            return Ok(Arc::clone(value));
        }
        match &self.default {
            Some(ArtifactDefault::Value(value)) => Ok(Arc::clone(value)),
            Some(ArtifactDefault::Factory(factory)) => {
                let value = Arc::new(factory());
                *cell = Some(Arc::clone(&value));
                Ok(value)
            }
            None => Err(ArtifactError::Unresolved {
                name: self.name.clone(),
            }),
        }
    }

    /// Clears the stored value. The producer relationship and any default are
    /// untouched; a subsequent [`Artifact::get_value`] call falls back to the
    /// default (if any) until the producer runs again.
    pub fn reset(&self) {
        *self.cell.lock().expect("artifact cell lock poisoned") = None;
    }
}

/// Type-erased view of an [`Artifact`] used by [`crate::task::Task::input_artifacts`]
/// and [`crate::task::Task::output_artifacts`] so the DAG builder can wire
/// producer/consumer edges without knowing each artifact's value type.
pub trait AnyArtifact: Send + Sync {
    fn artifact_id(&self) -> ArtifactId;
    fn name(&self) -> &str;
    fn has_default(&self) -> bool;
}

impl<T: Send + Sync + 'static> AnyArtifact for Artifact<T> {
    fn artifact_id(&self) -> ArtifactId {
        self.id
    }

    fn name(&self) -> &str {
        Artifact::name(self)
    }

    fn has_default(&self) -> bool {
        Artifact::has_default(self)
    }
}
