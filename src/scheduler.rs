//! Per-target task execution: builds the task DAG via [`crate::graph`], then
//! runs it level by level — every ready node in a wave executes
//! concurrently via `rayon::scope` with results collected over a
//! `crossbeam_channel`, the scheduler barriers on the wave, then recomputes
//! the next ready set.

use std::sync::{Arc, LazyLock};

use camino::Utf8Path;
use indicatif::ProgressStyle;
use petgraph::graph::NodeIndex;
use petgraph::Direction::Incoming;
use tracing::{span, Level};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::error::BuildError;
use crate::graph::{self, TaskGraph, TaskNode};
use crate::logger::Logger;
use crate::oracle::IncrementalOracle;
use crate::task::TaskContext;

/// Style for the per-task span's progress bar, shown by an `IndicatifLayer`
/// if the host binary installs one on its `tracing` subscriber; if it
/// doesn't, these calls are inert.
static TASK_PROGRESS_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
});

/// Executes the task list of a single target.
pub struct TaskScheduler {
    max_concurrency: Option<usize>,
}

impl TaskScheduler {
    /// Defaults to `available_parallelism() * 2` ready tasks per wave, a
    /// generous headroom over the core count that still bounds how many
    /// tasks get spawned into `rayon::scope` at once for a very wide wave.
    pub fn new() -> Self {
        let default_cap = std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(2);
        Self {
            max_concurrency: Some(default_cap),
        }
    }

    /// Caps how many ready tasks run concurrently within a single wave,
    /// overriding the default. `rayon`'s own global thread pool size remains
    /// the hard ceiling regardless of this setting; this only controls how a
    /// wide wave gets subdivided into batches.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max.max(1));
        self
    }

    pub fn run(
        &self,
        target: &str,
        tasks: &[Arc<dyn crate::task::Task>],
        base_dir: &Utf8Path,
        logger: &dyn Logger,
    ) -> Result<(), BuildError> {
        if tasks.is_empty() {
            logger.debug(&format!("{target}: no tasks to run"));
            return Ok(());
        }

        for task in tasks {
            task.validate()
                .map_err(|source| BuildError::InvalidTaskConfig {
                    target: target.to_string(),
                    source,
                })?;
        }

        let task_graph = graph::build(tasks, base_dir)?;
        self.run_waves(target, task_graph, base_dir, logger)
    }

    fn run_waves(
        &self,
        target: &str,
        task_graph: TaskGraph,
        base_dir: &Utf8Path,
        logger: &dyn Logger,
    ) -> Result<(), BuildError> {
        let TaskGraph { nodes, graph } = task_graph;
        let total = nodes.len();
        let mut completed = vec![false; total];
        let mut completed_count = 0usize;

        while completed_count < total {
            let ready: Vec<usize> = (0..total)
                .filter(|&i| {
                    !completed[i]
                        && graph
                            .neighbors_directed(NodeIndex::new(i), Incoming)
                            .all(|dep| completed[dep.index()])
                })
                .collect();

            if ready.is_empty() {
                return Err(BuildError::NoProgress {
                    target: target.to_string(),
                });
            }

            let batch_size = self.max_concurrency.unwrap_or(ready.len());
            for batch in ready.chunks(batch_size.max(1)) {
                let results = run_batch(target, batch, &nodes, base_dir, logger);
                for (idx, result) in results {
                    completed[idx] = true;
                    completed_count += 1;
                    if let Err(source) = result {
                        return Err(BuildError::TaskFailed {
                            task: nodes[idx].task.name().to_string(),
                            source,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one wave (or sub-batch of a wave) concurrently via `rayon::scope`,
/// collecting every result over a channel before returning — so a failing
/// task doesn't cut off its in-flight siblings; the scheduler still awaits
/// the other in-flight members of the wave before surfacing the failure.
fn run_batch(
    target: &str,
    indices: &[usize],
    nodes: &[TaskNode],
    base_dir: &Utf8Path,
    logger: &dyn Logger,
) -> Vec<(usize, anyhow::Result<()>)> {
    let (tx, rx) = crossbeam_channel::unbounded();

    rayon::scope(|scope| {
        for &idx in indices {
            let tx = tx.clone();
            let node = &nodes[idx];
            scope.spawn(move |_| {
                let result = run_one(target, node, base_dir, logger);
                let _ = tx.send((idx, result));
            });
        }
    });
    drop(tx);

    rx.iter().collect()
}

fn run_one(
    target: &str,
    node: &TaskNode,
    base_dir: &Utf8Path,
    logger: &dyn Logger,
) -> anyhow::Result<()> {
    let name = node.task.name().to_string();

    // Artifact producers always run regardless of the oracle's verdict; the
    // oracle only gets to skip tasks whose completion is solely evidenced by
    // files on disk.
    let always_runs = !node.task.output_artifacts().is_empty();
    if !always_runs && IncrementalOracle::up_to_date(&node.inputs, &node.outputs) {
        logger.debug(&format!("{target}/{name}: up to date, skipping"));
        return Ok(());
    }

    logger.start_progress(&name, &format!("running {name}"));

    let task_span = span!(Level::INFO, "task", name = %name);
    task_span.pb_set_style(&TASK_PROGRESS_STYLE);
    task_span.pb_set_message(&format!("running {name}"));
    let _entered = task_span.enter();

    let ctx = TaskContext {
        target,
        base_dir,
        logger,
    };
    let result = node.task.execute(&ctx);
    match &result {
        Ok(()) => logger.complete_progress(&name, &format!("{name} done")),
        Err(err) => logger.error(&format!("{name} failed: {err}")),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::SilentLogger;
    use crate::task::{FnTask, Task};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn task(name: &'static str, order: Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Task> {
        Arc::new(FnTask::new(name, move |_ctx| {
            order.lock().unwrap().push(name);
            Ok(())
        }))
    }

    #[test]
    fn empty_task_list_is_a_no_op() {
        let scheduler = TaskScheduler::new();
        let logger = SilentLogger;
        let result = scheduler.run("t", &[], Utf8Path::new("/base"), &logger);
        assert!(result.is_ok());
    }

    #[test]
    fn independent_tasks_all_run() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tasks = vec![task("a", Arc::clone(&order)), task("b", Arc::clone(&order))];
        let scheduler = TaskScheduler::new();
        let logger = SilentLogger;
        scheduler.run("t", &tasks, Utf8Path::new("/base"), &logger).unwrap();
        let ran = order.lock().unwrap();
        assert_eq!(ran.len(), 2);
        assert!(ran.contains(&"a"));
        assert!(ran.contains(&"b"));
    }

    #[test]
    fn dependent_task_runs_after_its_artifact_producer() {
        let artifact: Arc<crate::artifact::Artifact<u32>> = crate::artifact::Artifact::new("n");
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_producer = Arc::clone(&order);
        let producer = FnTask::new("producer", move |_ctx| {
            order_producer.lock().unwrap().push("producer");
            Ok(())
        })
        .produces(Arc::clone(&artifact))
        .unwrap();

        let order_consumer = Arc::clone(&order);
        let consumer = FnTask::new("consumer", move |_ctx| {
            order_consumer.lock().unwrap().push("consumer");
            Ok(())
        })
        .consumes(artifact);

        let tasks: Vec<Arc<dyn Task>> = vec![Arc::new(consumer), Arc::new(producer)];
        let scheduler = TaskScheduler::new();
        let logger = SilentLogger;
        scheduler.run("t", &tasks, Utf8Path::new("/base"), &logger).unwrap();

        let ran = order.lock().unwrap();
        assert_eq!(*ran, vec!["producer", "consumer"]);
    }

    #[test]
    fn a_failing_task_still_lets_its_wave_siblings_finish() {
        let ran_sibling = Arc::new(AtomicUsize::new(0));
        let ran_sibling_clone = Arc::clone(&ran_sibling);

        let failing: Arc<dyn Task> = Arc::new(FnTask::new("failing", |_ctx| {
            anyhow::bail!("boom")
        }));
        let sibling: Arc<dyn Task> = Arc::new(FnTask::new("sibling", move |_ctx| {
            ran_sibling_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let tasks = vec![failing, sibling];
        let scheduler = TaskScheduler::new();
        let logger = SilentLogger;
        let result = scheduler.run("t", &tasks, Utf8Path::new("/base"), &logger);
        assert!(result.is_err());
        assert_eq!(ran_sibling.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn artifact_producer_always_runs_even_when_outputs_are_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let base = camino::Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let output = base.join("out.txt");
        std::fs::write(&output, "stale").unwrap();

        let artifact: Arc<crate::artifact::Artifact<u32>> = crate::artifact::Artifact::new("n");
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let producer = FnTask::new("producer", move |_ctx| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .with_outputs(["out.txt"])
        .produces(artifact)
        .unwrap();

        let tasks: Vec<Arc<dyn Task>> = vec![Arc::new(producer)];
        let scheduler = TaskScheduler::new();
        let logger = SilentLogger;
        scheduler.run("t", &tasks, &base, &logger).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
