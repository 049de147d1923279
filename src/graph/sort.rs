//! Deterministic topological ordering of graph nodes.
//!
//! Nodes are stably pre-sorted by name and then reduced with Kahn's
//! algorithm, always releasing the smallest name among the ready nodes. The
//! resulting order therefore depends only on the node names and the edges
//! between them, never on declaration order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use super::cycle::find_cycle;
use super::node::GraphNode;

/// The nodes could not be ordered because their dependencies form a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("dependency cycle detected: {}", cycle.join(" -> "))]
#[diagnostic(
    code(bffgen::graph::cycle),
    help("nodes left unordered: {}", nodes.join(", "))
)]
pub struct CycleError {
    /// Names of every node left unordered, in name order.
    pub nodes: Vec<String>,
    /// One concrete cycle, starting and ending with the same node.
    pub cycle: Vec<String>,
}

/// An input that no node in the sort produces.
///
/// Such inputs are treated as external files: they impose no ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// The consuming node.
    pub node: String,
    /// The input that did not match any node output.
    pub input: String,
}

/// Result of a successful sort.
#[derive(Debug)]
pub struct Sorted<N> {
    /// Nodes in dependency order: producers before consumers.
    pub order: Vec<N>,
    /// Inputs dropped from the graph because nothing produces them.
    pub unresolved: Vec<UnresolvedReference>,
}

struct Edges {
    forward: Vec<BTreeSet<usize>>,
    reverse: Vec<BTreeSet<usize>>,
    unresolved: Vec<UnresolvedReference>,
}

fn resolve_edges<N: GraphNode>(nodes: &[N]) -> Edges {
    let mut producers: HashMap<&str, usize> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        for output in node.outputs() {
            producers.insert(output.path.as_str(), idx);
        }
    }

    let mut forward = vec![BTreeSet::new(); nodes.len()];
    let mut reverse = vec![BTreeSet::new(); nodes.len()];
    let mut unresolved = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        for input in node.inputs() {
            match producers.get(input.as_str()) {
                Some(&dep) => {
                    if let Some(deps) = forward.get_mut(idx) {
                        deps.insert(dep);
                    }
                    if let Some(dependents) = reverse.get_mut(dep) {
                        dependents.insert(idx);
                    }
                }
                None => {
                    debug!(node = node.name(), input = %input, "treating unresolved input as external file");
                    unresolved.push(UnresolvedReference {
                        node: node.name().to_owned(),
                        input: input.clone(),
                    });
                }
            }
        }
    }
    Edges {
        forward,
        reverse,
        unresolved,
    }
}

/// Order `nodes` so that every node follows the producers of its inputs.
///
/// # Errors
///
/// Returns [`CycleError`] when the dependencies cannot be satisfied. A node
/// consuming one of its own outputs is always a cycle.
///
/// # Examples
///
/// ```
/// use bffgen::graph::{sort, CommandNode, GraphNode};
///
/// let gen_cmd = CommandNode::new("gen", vec!["gen".into()]).with_outputs(vec!["a.h".into()]);
/// let use_it = CommandNode::new("compile", vec!["cc".into()]).with_inputs(vec!["a.h".into()]);
/// let sorted = sort(vec![use_it, gen_cmd])?;
/// let names: Vec<_> = sorted.order.iter().map(|c| c.name().to_owned()).collect();
/// assert_eq!(names, ["gen", "compile"]);
/// # Ok::<(), bffgen::graph::CycleError>(())
/// ```
pub fn sort<N: GraphNode>(mut nodes: Vec<N>) -> Result<Sorted<N>, CycleError> {
    nodes.sort_by(|a, b| a.name().cmp(b.name()));
    let Edges {
        forward,
        reverse,
        unresolved,
    } = resolve_edges(&nodes);

    let mut pending: Vec<usize> = forward.iter().map(BTreeSet::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();
    let mut sequence = Vec::with_capacity(nodes.len());
    while let Some(Reverse(idx)) = ready.pop() {
        sequence.push(idx);
        for &dependent in reverse.get(idx).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
    }

    if sequence.len() < nodes.len() {
        let names: Vec<&str> = nodes.iter().map(GraphNode::name).collect();
        let stuck: Vec<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(idx, _)| idx)
            .collect();
        let cycle = find_cycle(&stuck, &forward, &names);
        let stuck_names = stuck
            .iter()
            .filter_map(|idx| names.get(*idx).map(|name| (*name).to_owned()))
            .collect();
        return Err(CycleError {
            nodes: stuck_names,
            cycle,
        });
    }

    let mut slots: Vec<Option<N>> = nodes.into_iter().map(Some).collect();
    let order = sequence
        .into_iter()
        .filter_map(|idx| slots.get_mut(idx).and_then(Option::take))
        .collect();
    Ok(Sorted { order, unresolved })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::OutputId;
    use rstest::rstest;

    #[derive(Debug, Clone)]
    struct Stub {
        name: String,
        outputs: Vec<OutputId>,
        inputs: Vec<String>,
    }

    impl GraphNode for Stub {
        fn name(&self) -> &str {
            &self.name
        }
        fn outputs(&self) -> &[OutputId] {
            &self.outputs
        }
        fn inputs(&self) -> &[String] {
            &self.inputs
        }
    }

    fn stub(name: &str, outputs: &[&str], inputs: &[&str]) -> Stub {
        Stub {
            name: name.to_owned(),
            outputs: outputs.iter().map(|o| OutputId::file(*o)).collect(),
            inputs: inputs.iter().map(|i| (*i).to_owned()).collect(),
        }
    }

    fn names(sorted: &Sorted<Stub>) -> Vec<&str> {
        sorted.order.iter().map(|n| n.name.as_str()).collect()
    }

    #[rstest]
    fn chain_sorts_in_dependency_order_regardless_of_input_order(
        #[values(0, 1, 2)] rotation: usize,
    ) {
        let mut nodes = vec![
            stub("C", &["c"], &["b"]),
            stub("A", &["a"], &[]),
            stub("B", &["b"], &["a"]),
        ];
        nodes.rotate_left(rotation);
        let sorted = sort(nodes).expect("acyclic");
        assert_eq!(names(&sorted), ["A", "B", "C"]);
    }

    #[rstest]
    fn independent_nodes_follow_name_order() {
        let sorted = sort(vec![stub("z", &[], &[]), stub("m", &[], &[]), stub("a", &[], &[])])
            .expect("acyclic");
        assert_eq!(names(&sorted), ["a", "m", "z"]);
    }

    #[rstest]
    fn lowest_ready_name_is_released_first() {
        // "b" sorts first by name but is only released once "z" has run.
        let sorted = sort(vec![
            stub("z", &["zo"], &[]),
            stub("b", &[], &["zo"]),
            stub("y", &[], &[]),
        ])
        .expect("acyclic");
        assert_eq!(names(&sorted), ["y", "z", "b"]);
    }

    #[rstest]
    fn self_loop_is_a_cycle() {
        let err = sort(vec![stub("A", &["x"], &["x"])]).expect_err("cycle");
        assert_eq!(err.nodes, ["A"]);
        assert_eq!(err.cycle, ["A", "A"]);
    }

    #[rstest]
    fn mutual_dependency_is_a_cycle() {
        let err = sort(vec![stub("B", &["b"], &["a"]), stub("A", &["a"], &["b"])])
            .expect_err("cycle");
        assert_eq!(err.nodes, ["A", "B"]);
        assert_eq!(err.cycle, ["A", "B", "A"]);
        assert_eq!(err.to_string(), "dependency cycle detected: A -> B -> A");
    }

    #[rstest]
    fn unresolved_inputs_are_reported_but_do_not_block() {
        let sorted = sort(vec![stub("A", &["a"], &["main.c"])]).expect("acyclic");
        assert_eq!(names(&sorted), ["A"]);
        assert_eq!(
            sorted.unresolved,
            [UnresolvedReference {
                node: "A".into(),
                input: "main.c".into(),
            }]
        );
    }

    #[rstest]
    fn last_producer_of_an_output_wins() {
        let sorted = sort(vec![
            stub("a", &["x"], &[]),
            stub("b", &["x"], &[]),
            stub("c", &[], &["x"]),
        ])
        .expect("acyclic");
        // "c" depends on "b" only; name order places "a" first regardless.
        assert_eq!(names(&sorted), ["a", "b", "c"]);
    }

    #[rstest]
    fn sorting_twice_is_stable() {
        let input = vec![
            stub("d", &["d"], &["b", "c"]),
            stub("c", &["c"], &["a"]),
            stub("b", &["b"], &["a"]),
            stub("a", &["a"], &[]),
        ];
        let first = sort(input.clone()).expect("acyclic");
        let second = sort(input).expect("acyclic");
        assert_eq!(names(&first), names(&second));
        assert_eq!(names(&first), ["a", "b", "c", "d"]);
    }
}
