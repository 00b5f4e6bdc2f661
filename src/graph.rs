//! Per-target task DAG construction: resolves every task's declared
//! inputs/outputs to absolute paths, infers edges from file-path overlap and
//! from artifact producer/consumer declarations, then checks the combined
//! edge set for cycles.

use std::collections::HashMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

use crate::artifact::ArtifactId;
use crate::error::{BuildError, TaskGraphError};
use crate::task::{Task, resolve_paths};

/// One task plus its resolved, absolute input/output path sets.
pub(crate) struct TaskNode {
    pub task: Arc<dyn Task>,
    pub inputs: Vec<Utf8PathBuf>,
    pub outputs: Vec<Utf8PathBuf>,
}

/// The built DAG: the task nodes in declaration order, and the edge set
/// (`producer index -> consumer index`) over them. Node `i` in `nodes`
/// always corresponds to `NodeIndex::new(i)` in `graph`, since nodes are
/// added to the petgraph in the same order without ever being removed.
pub(crate) struct TaskGraph {
    pub nodes: Vec<TaskNode>,
    pub graph: DiGraph<(), ()>,
}

/// Two paths overlap iff they're equal or one is a strict directory prefix
/// of the other.
fn paths_overlap(a: &Utf8Path, b: &Utf8Path) -> bool {
    a == b || is_strict_prefix(a, b) || is_strict_prefix(b, a)
}

fn is_strict_prefix(parent: &Utf8Path, other: &Utf8Path) -> bool {
    let parent_str = parent.as_str().trim_end_matches('/');
    let other_str = other.as_str();
    other_str.len() > parent_str.len()
        && other_str.starts_with(parent_str)
        && other_str.as_bytes()[parent_str.len()] == b'/'
}

pub(crate) fn build(tasks: &[Arc<dyn Task>], base_dir: &Utf8Path) -> Result<TaskGraph, BuildError> {
    let resolved: Vec<(Vec<Utf8PathBuf>, Vec<Utf8PathBuf>)> = tasks
        .par_iter()
        .map(|task| -> Result<_, BuildError> {
            let inputs = resolve_paths(&task.inputs(), base_dir)?;
            let outputs = resolve_paths(&task.outputs(), base_dir)?;
            Ok((inputs, outputs))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let nodes: Vec<TaskNode> = tasks
        .iter()
        .cloned()
        .zip(resolved)
        .map(|(task, (inputs, outputs))| TaskNode { task, inputs, outputs })
        .collect();

    let mut graph = DiGraph::<(), ()>::new();
    for _ in &nodes {
        graph.add_node(());
    }

    infer_file_edges(&nodes, &mut graph)?;
    infer_artifact_edges(&nodes, &mut graph)?;
    detect_cycles(&graph, &nodes)?;

    Ok(TaskGraph { nodes, graph })
}

fn infer_file_edges(nodes: &[TaskNode], graph: &mut DiGraph<(), ()>) -> Result<(), BuildError> {
    for a in 0..nodes.len() {
        for b in (a + 1)..nodes.len() {
            let a_writes_into_b =
                nodes[a].outputs.iter().any(|o| nodes[b].inputs.iter().any(|i| paths_overlap(o, i)));
            let b_writes_into_a =
                nodes[b].outputs.iter().any(|o| nodes[a].inputs.iter().any(|i| paths_overlap(o, i)));

            match (a_writes_into_b, b_writes_into_a) {
                (true, true) => {
                    return Err(TaskGraphError::CircularFileDependency {
                        a: nodes[a].task.name().to_string(),
                        b: nodes[b].task.name().to_string(),
                    }
                    .into());
                }
                (true, false) => {
                    graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
                }
                (false, true) => {
                    graph.add_edge(NodeIndex::new(b), NodeIndex::new(a), ());
                }
                (false, false) => {}
            }
        }
    }
    Ok(())
}

fn infer_artifact_edges(nodes: &[TaskNode], graph: &mut DiGraph<(), ()>) -> Result<(), BuildError> {
    let mut producer_of: HashMap<ArtifactId, usize> = HashMap::new();

    for (idx, node) in nodes.iter().enumerate() {
        for artifact in node.task.output_artifacts() {
            match producer_of.get(&artifact.artifact_id()) {
                Some(&existing) if existing != idx => {
                    return Err(TaskGraphError::DuplicateArtifactProducer {
                        name: artifact.name().to_string(),
                    }
                    .into());
                }
                _ => {
                    producer_of.insert(artifact.artifact_id(), idx);
                }
            }
        }
    }

    for (idx, node) in nodes.iter().enumerate() {
        for artifact in node.task.input_artifacts() {
            match producer_of.get(&artifact.artifact_id()) {
                Some(&producer_idx) if producer_idx != idx => {
                    graph.add_edge(NodeIndex::new(producer_idx), NodeIndex::new(idx), ());
                }
                Some(_) => {}
                None => {
                    if !artifact.has_default() {
                        return Err(TaskGraphError::MissingArtifactProducer {
                            name: artifact.name().to_string(),
                        }
                        .into());
                    }
                }
            }
        }
    }

    Ok(())
}

fn detect_cycles(graph: &DiGraph<(), ()>, nodes: &[TaskNode]) -> Result<(), BuildError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        node: NodeIndex,
        graph: &DiGraph<(), ()>,
        nodes: &[TaskNode],
        marks: &mut [Mark],
        path: &mut Vec<NodeIndex>,
    ) -> Result<(), BuildError> {
        match marks[node.index()] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = path.iter().position(|&n| n == node).unwrap_or(0);
                let cycle = path[start..]
                    .iter()
                    .map(|&i| nodes[i.index()].task.name().to_string())
                    .chain(std::iter::once(nodes[node.index()].task.name().to_string()))
                    .collect();
                return Err(TaskGraphError::CycleInTaskGraph { path: cycle }.into());
            }
            Mark::Unvisited => {}
        }

        marks[node.index()] = Mark::InProgress;
        path.push(node);
        for edge in graph.edges(node) {
            visit(edge.target(), graph, nodes, marks, path)?;
        }
        path.pop();
        marks[node.index()] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut path = Vec::new();
    for idx in graph.node_indices() {
        if marks[idx.index()] == Mark::Unvisited {
            visit(idx, graph, nodes, &mut marks, &mut path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskContext;
    use crate::task::FnTask;

    fn task(name: &str, inputs: &[&str], outputs: &[&str]) -> Arc<dyn Task> {
        Arc::new(
            FnTask::new(name, |_ctx: &TaskContext<'_>| Ok(()))
                .with_inputs(inputs.iter().map(|s| s.to_string()))
                .with_outputs(outputs.iter().map(|s| s.to_string())),
        )
    }

    #[test]
    fn independent_tasks_have_no_edges() {
        let tasks = vec![task("a", &["a.in"], &["a.out"]), task("b", &["b.in"], &["b.out"])];
        let graph = build(&tasks, Utf8Path::new("/base")).unwrap();
        assert_eq!(graph.graph.edge_count(), 0);
    }

    #[test]
    fn output_overlapping_input_creates_an_edge() {
        let tasks = vec![
            task("producer", &[], &["shared.txt"]),
            task("consumer", &["shared.txt"], &[]),
        ];
        let graph = build(&tasks, Utf8Path::new("/base")).unwrap();
        assert_eq!(graph.graph.edge_count(), 1);
        assert!(graph.graph.contains_edge(NodeIndex::new(0), NodeIndex::new(1)));
    }

    #[test]
    fn directory_prefix_counts_as_overlap() {
        let tasks = vec![
            task("producer", &[], &["out/"]),
            task("consumer", &["out/file.txt"], &[]),
        ];
        let graph = build(&tasks, Utf8Path::new("/base")).unwrap();
        assert_eq!(graph.graph.edge_count(), 1);
    }

    #[test]
    fn mutual_file_overlap_is_rejected() {
        let tasks = vec![
            task("a", &["b.out"], &["a.out"]),
            task("b", &["a.out"], &["b.out"]),
        ];
        let err = build(&tasks, Utf8Path::new("/base")).unwrap_err();
        assert!(matches!(
            err,
            BuildError::TaskGraph(TaskGraphError::CircularFileDependency { .. })
        ));
    }

    #[test]
    fn missing_artifact_producer_without_default_fails() {
        let artifact: Arc<crate::artifact::Artifact<u32>> = crate::artifact::Artifact::new("count");
        let consumer = FnTask::new("consumer", |_ctx: &TaskContext<'_>| Ok(())).consumes(artifact);
        let tasks: Vec<Arc<dyn Task>> = vec![Arc::new(consumer)];
        let err = build(&tasks, Utf8Path::new("/base")).unwrap_err();
        assert!(matches!(
            err,
            BuildError::TaskGraph(TaskGraphError::MissingArtifactProducer { .. })
        ));
    }

    #[test]
    fn missing_artifact_producer_with_default_is_fine() {
        let artifact = crate::artifact::Artifact::with_default("count", 0u32);
        let consumer = FnTask::new("consumer", |_ctx: &TaskContext<'_>| Ok(())).consumes(artifact);
        let tasks: Vec<Arc<dyn Task>> = vec![Arc::new(consumer)];
        assert!(build(&tasks, Utf8Path::new("/base")).is_ok());
    }

    #[test]
    fn artifact_edge_orders_producer_before_consumer() {
        let artifact: Arc<crate::artifact::Artifact<u32>> = crate::artifact::Artifact::new("count");
        let producer = FnTask::new("producer", |_ctx: &TaskContext<'_>| Ok(()))
            .produces(Arc::clone(&artifact))
            .unwrap();
        let consumer = FnTask::new("consumer", |_ctx: &TaskContext<'_>| Ok(())).consumes(artifact);
        let tasks: Vec<Arc<dyn Task>> = vec![Arc::new(consumer), Arc::new(producer)];
        let graph = build(&tasks, Utf8Path::new("/base")).unwrap();
        // consumer is declared first (index 0), producer second (index 1);
        // the edge must still run producer -> consumer.
        assert!(graph.graph.contains_edge(NodeIndex::new(1), NodeIndex::new(0)));
    }
}
