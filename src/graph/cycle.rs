//! Extraction of one concrete cycle from the nodes a sort could not order.

use std::collections::{BTreeSet, HashMap};

/// Tracks the visitation state of a node during the cycle walk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Find a cycle among `stuck` nodes, following `forward` dependency edges.
///
/// Edges leading outside `stuck` are ignored. The returned path starts and
/// ends with the same node name and is rotated so the smallest name leads.
pub(crate) fn find_cycle(
    stuck: &[usize],
    forward: &[BTreeSet<usize>],
    names: &[&str],
) -> Vec<String> {
    let members: BTreeSet<usize> = stuck.iter().copied().collect();
    let mut walker = CycleWalker {
        forward,
        members: &members,
        stack: Vec::new(),
        states: HashMap::new(),
    };
    for &start in stuck {
        if let Some(found) = walker.visit(start) {
            let named = found
                .into_iter()
                .filter_map(|idx| names.get(idx).map(|name| (*name).to_owned()))
                .collect();
            return canonicalize_cycle(named);
        }
    }
    Vec::new()
}

struct CycleWalker<'a> {
    forward: &'a [BTreeSet<usize>],
    members: &'a BTreeSet<usize>,
    stack: Vec<usize>,
    states: HashMap<usize, VisitState>,
}

impl CycleWalker<'_> {
    fn visit(&mut self, node: usize) -> Option<Vec<usize>> {
        match self.states.get(&node) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self.stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<usize> = self.stack.iter().skip(idx).copied().collect();
                cycle.push(node);
                return Some(cycle);
            }
            None => {
                self.states.insert(node, VisitState::Visiting);
            }
        }

        self.stack.push(node);
        let deps = self.forward.get(node).into_iter().flatten();
        for &dep in deps {
            if !self.members.contains(&dep) {
                continue;
            }
            if let Some(cycle) = self.visit(dep) {
                return Some(cycle);
            }
        }
        self.stack.pop();
        self.states.insert(node, VisitState::Visited);
        None
    }
}

/// Rotate a closed cycle path so its smallest member comes first.
pub(crate) fn canonicalize_cycle(mut cycle: Vec<String>) -> Vec<String> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn edges(list: &[&[usize]]) -> Vec<BTreeSet<usize>> {
        list.iter().map(|deps| deps.iter().copied().collect()).collect()
    }

    #[rstest]
    fn self_edge_is_a_cycle_of_one() {
        let forward = edges(&[&[0]]);
        assert_eq!(find_cycle(&[0], &forward, &["a"]), names(&["a", "a"]));
    }

    #[rstest]
    fn nodes_hanging_off_a_cycle_are_not_part_of_it() {
        // d depends on the a <-> b loop but is not on it.
        let forward = edges(&[&[1], &[0], &[], &[0]]);
        let cycle = find_cycle(&[3, 0, 1], &forward, &["a", "b", "c", "d"]);
        assert_eq!(cycle, names(&["a", "b", "a"]));
    }

    #[rstest]
    fn edges_outside_the_stuck_set_are_ignored() {
        let forward = edges(&[&[2, 1], &[0], &[]]);
        let cycle = find_cycle(&[0, 1], &forward, &["a", "b", "c"]);
        assert_eq!(cycle, names(&["a", "b", "a"]));
    }

    #[rstest]
    fn canonicalize_cycle_rotates_smallest_node() {
        let canonical = canonicalize_cycle(names(&["c", "a", "b", "c"]));
        assert_eq!(canonical, names(&["a", "b", "c", "a"]));
    }

    #[rstest]
    fn canonicalize_cycle_handles_reverse_direction() {
        let canonical = canonicalize_cycle(names(&["c", "b", "a", "c"]));
        assert_eq!(canonical, names(&["a", "c", "b", "a"]));
    }
}
