//! Property tests for the dependency graph.
//!
//! Pure graph functions are checked against arbitrary edge sets; the store is
//! driven with random edge insertions to confirm it never persists a cycle.

use household_tasks::db::Database;
use household_tasks::graph::{
    available_dependency_candidates, blocked_set, build_adjacency, find_cycle, has_path,
    would_create_cycle,
};
use household_tasks::types::{Dependency, NewTask};
use proptest::prelude::*;

const NODES: usize = 8;

fn node(i: usize) -> String {
    format!("t{}", i)
}

/// Edges that only point from a higher index to a lower one, so always a DAG.
fn dag_edges() -> impl Strategy<Value = Vec<Dependency>> {
    prop::collection::vec((1..NODES, 0..NODES), 0..20).prop_map(|pairs| {
        let mut edges: Vec<Dependency> = pairs
            .into_iter()
            .filter_map(|(from, to)| (to < from).then(|| Dependency::new(node(from), node(to))))
            .collect();
        edges.sort();
        edges.dedup();
        edges
    })
}

/// Arbitrary requested edges, cycles and self-loops included.
fn edge_requests() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..NODES, 0..NODES), 0..30)
}

proptest! {
    #[test]
    fn self_edge_always_cycles(edges in dag_edges(), i in 0..NODES) {
        prop_assert!(would_create_cycle(&edges, &node(i), &node(i)));
    }

    #[test]
    fn new_edge_cycles_iff_reverse_path_exists(
        edges in dag_edges(),
        a in 0..NODES,
        b in 0..NODES,
    ) {
        prop_assume!(a != b);
        let adjacency = build_adjacency(&edges);
        prop_assert_eq!(
            would_create_cycle(&edges, &node(a), &node(b)),
            has_path(&adjacency, &node(b), &node(a))
        );
    }

    #[test]
    fn candidates_exclude_exactly_the_blocked_set(edges in dag_edges(), t in 0..NODES) {
        let all: Vec<String> = (0..NODES).map(node).collect();
        let task = node(t);
        let candidates =
            available_dependency_candidates(all.iter().map(String::as_str), &edges, &task);
        let blocked = blocked_set(&edges, &task);

        prop_assert!(!candidates.contains(&task));
        for id in &all {
            prop_assert_eq!(candidates.contains(id), !blocked.contains(id));
            // Every candidate is a legal new edge.
            if candidates.contains(id) {
                prop_assert!(!would_create_cycle(&edges, &task, id));
            }
        }
    }

    #[test]
    fn generated_dags_have_no_cycle(edges in dag_edges()) {
        prop_assert!(find_cycle(&edges).is_none());
    }

    #[test]
    fn store_never_persists_a_cycle(requests in edge_requests()) {
        let db = Database::open_in_memory().unwrap();
        let ids: Vec<String> = (0..NODES)
            .map(|i| {
                db.create_task(NewTask {
                    title: format!("Task {}", i),
                    priority: 3,
                    difficulty: 3,
                    ..Default::default()
                })
                .unwrap()
                .id
            })
            .collect();

        for (from, to) in requests {
            let before = db.get_all_dependencies().unwrap();
            let predicted = would_create_cycle(&before, &ids[from], &ids[to]);
            let result = db.add_dependency(&ids[from], &ids[to]);
            prop_assert_eq!(result.is_err(), predicted);
            if predicted {
                prop_assert_eq!(db.get_all_dependencies().unwrap().len(), before.len());
            }
        }

        prop_assert!(db.verify_graph().unwrap().is_none());
    }
}
