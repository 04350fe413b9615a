//! Dependency graph algorithms.
//!
//! Everything here works on a snapshot of the depends-on edge list. Forward
//! and reverse adjacency are derived from that one list per query, so the
//! two directions can never disagree. None of these functions touch storage;
//! callers load the edges inside the transaction that will act on the result.

use crate::types::Dependency;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Task id -> set of directly related task ids.
pub type Adjacency = HashMap<String, HashSet<String>>;

/// Errors raised by graph validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Adding `task_id -> depends_on_task_id` would close a loop.
    #[error("adding dependency {task_id} -> {depends_on_task_id} would create a cycle")]
    CycleDetected {
        task_id: String,
        depends_on_task_id: String,
    },
}

impl GraphError {
    fn cycle(task_id: &str, depends_on_task_id: &str) -> Self {
        GraphError::CycleDetected {
            task_id: task_id.to_string(),
            depends_on_task_id: depends_on_task_id.to_string(),
        }
    }
}

/// Build the forward view: task -> tasks it directly depends on.
pub fn build_adjacency(edges: &[Dependency]) -> Adjacency {
    let mut adjacency = Adjacency::new();
    for edge in edges {
        adjacency
            .entry(edge.task_id.clone())
            .or_default()
            .insert(edge.depends_on_task_id.clone());
    }
    adjacency
}

/// Build the reverse view: task -> tasks that directly depend on it.
pub fn build_reverse_adjacency(edges: &[Dependency]) -> Adjacency {
    let mut adjacency = Adjacency::new();
    for edge in edges {
        adjacency
            .entry(edge.depends_on_task_id.clone())
            .or_default()
            .insert(edge.task_id.clone());
    }
    adjacency
}

/// Whether `target` can be reached from `start` following edges forward.
///
/// A node always reaches itself. The visited set keeps this finite even if
/// the adjacency somehow contains a cycle.
pub fn has_path(adjacency: &Adjacency, start: &str, target: &str) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![start];

    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(next) = adjacency.get(node) {
            stack.extend(next.iter().map(String::as_str).filter(|n| !seen.contains(n)));
        }
    }

    false
}

/// Every node reachable from `start` (excluding `start` itself).
fn reachable_from(adjacency: &Adjacency, start: &str) -> BTreeSet<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let Some(next) = adjacency.get(current) else {
            continue;
        };
        for node in next {
            if node != start && seen.insert(node.clone()) {
                queue.push_back(node);
            }
        }
    }

    seen
}

/// Whether adding `task_id -> depends_on_task_id` to `edges` would create a cycle.
///
/// A self dependency is always a cycle. Otherwise the candidate edge is added
/// to a scratch adjacency and the check asks whether `depends_on_task_id`
/// can then reach `task_id`.
pub fn would_create_cycle(edges: &[Dependency], task_id: &str, depends_on_task_id: &str) -> bool {
    if task_id == depends_on_task_id {
        return true;
    }
    let mut adjacency = build_adjacency(edges);
    adjacency
        .entry(task_id.to_string())
        .or_default()
        .insert(depends_on_task_id.to_string());
    has_path(&adjacency, depends_on_task_id, task_id)
}

/// Like [`would_create_cycle`] but as a `Result`, for callers that propagate.
pub fn check_new_edge(
    edges: &[Dependency],
    task_id: &str,
    depends_on_task_id: &str,
) -> Result<(), GraphError> {
    if would_create_cycle(edges, task_id, depends_on_task_id) {
        return Err(GraphError::cycle(task_id, depends_on_task_id));
    }
    Ok(())
}

/// `task_id` plus every task that transitively depends on it.
///
/// None of these may become a dependency of `task_id`.
pub fn blocked_set(edges: &[Dependency], task_id: &str) -> BTreeSet<String> {
    let reverse = build_reverse_adjacency(edges);
    let mut blocked = reachable_from(&reverse, task_id);
    blocked.insert(task_id.to_string());
    blocked
}

/// Tasks from `all_tasks` that `task_id` may depend on without closing a cycle.
pub fn available_dependency_candidates<'a, I>(
    all_tasks: I,
    edges: &[Dependency],
    task_id: &str,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let blocked = blocked_set(edges, task_id);
    all_tasks
        .into_iter()
        .filter(|id| !blocked.contains(*id))
        .map(str::to_string)
        .collect()
}

/// Every task `task_id` depends on, directly or transitively.
pub fn transitive_dependencies(edges: &[Dependency], task_id: &str) -> BTreeSet<String> {
    reachable_from(&build_adjacency(edges), task_id)
}

/// Validate replacing the outgoing edges of `task_id` with `new_dependencies`.
///
/// The previous outgoing edges of `task_id` are dropped first, so only the
/// final graph is checked. Returns the first offending pair in id order.
pub fn check_replacement(
    edges: &[Dependency],
    task_id: &str,
    new_dependencies: &BTreeSet<String>,
) -> Result<(), GraphError> {
    if new_dependencies.contains(task_id) {
        return Err(GraphError::cycle(task_id, task_id));
    }

    let mut adjacency = build_adjacency(
        &edges
            .iter()
            .filter(|e| e.task_id != task_id)
            .cloned()
            .collect::<Vec<_>>(),
    );
    adjacency.insert(task_id.to_string(), new_dependencies.iter().cloned().collect());

    for dep in new_dependencies {
        if has_path(&adjacency, dep, task_id) {
            return Err(GraphError::cycle(task_id, dep));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnPath,
    Done,
}

fn sorted_neighbors<'a>(adjacency: &'a Adjacency, node: &str) -> std::vec::IntoIter<&'a str> {
    let mut next: Vec<&str> = adjacency
        .get(node)
        .map(|set| set.iter().map(String::as_str).collect())
        .unwrap_or_default();
    next.sort_unstable();
    next.into_iter()
}

/// Find any cycle in the edge set.
///
/// Returns a closed walk `[a, b, ..., a]`, or `None` when the graph is a DAG.
/// Iterative DFS so deep chains cannot overflow the stack.
pub fn find_cycle(edges: &[Dependency]) -> Option<Vec<String>> {
    let adjacency = build_adjacency(edges);
    let mut state: HashMap<&str, Visit> = HashMap::new();

    let mut roots: Vec<&str> = adjacency.keys().map(String::as_str).collect();
    roots.sort_unstable();

    for root in roots {
        if state.contains_key(root) {
            continue;
        }

        let mut path: Vec<&str> = vec![root];
        let mut stack = vec![sorted_neighbors(&adjacency, root)];
        state.insert(root, Visit::OnPath);

        while let Some(children) = stack.last_mut() {
            match children.next() {
                Some(next) => match state.get(next) {
                    Some(Visit::OnPath) => {
                        if let Some(pos) = path.iter().position(|n| *n == next) {
                            let mut cycle: Vec<String> =
                                path[pos..].iter().map(|n| n.to_string()).collect();
                            cycle.push(next.to_string());
                            return Some(cycle);
                        }
                    }
                    Some(Visit::Done) => {}
                    None => {
                        state.insert(next, Visit::OnPath);
                        path.push(next);
                        stack.push(sorted_neighbors(&adjacency, next));
                    }
                },
                None => {
                    stack.pop();
                    if let Some(finished) = path.pop() {
                        state.insert(finished, Visit::Done);
                    }
                }
            }
        }
    }

    None
}
