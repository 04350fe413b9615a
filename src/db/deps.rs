//! Dependency edge storage and graph queries.
//!
//! Every mutation loads the edge table, asks the graph module whether the
//! change is allowed and writes, all inside one transaction.

use super::tasks::{get_task_summary_internal, list_task_summaries_internal};
use super::{Database, placeholders};
use crate::error::ApiError;
use crate::graph;
use crate::types::{Dependency, TaskDependencyGraph, TaskStatus, TaskSummary};
use anyhow::Result;
use rusqlite::{Connection, params, params_from_iter};
use std::collections::BTreeSet;

/// Load every edge.
pub(crate) fn load_edges(conn: &Connection) -> Result<Vec<Dependency>> {
    let mut stmt = conn.prepare("SELECT task_id, depends_on_task_id FROM task_dependencies")?;
    let edges = stmt
        .query_map([], |row| {
            Ok(Dependency {
                task_id: row.get(0)?,
                depends_on_task_id: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(edges)
}

pub(crate) fn task_exists(conn: &Connection, task_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE id = ?1",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Task ids from `ids` that have no row, in id order.
pub(crate) fn missing_task_ids(conn: &Connection, ids: &BTreeSet<String>) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id FROM tasks WHERE id IN ({})",
        placeholders(ids.len(), 0)
    );
    let mut stmt = conn.prepare(&sql)?;
    let found: BTreeSet<String> = stmt
        .query_map(params_from_iter(ids.iter()), |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(ids.difference(&found).cloned().collect())
}

fn insert_edge(conn: &Connection, task_id: &str, depends_on_task_id: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_task_id) VALUES (?1, ?2)",
        params![task_id, depends_on_task_id],
    )?;
    Ok(inserted > 0)
}

/// Replace the outgoing edges of `task_id` after validating the final graph.
///
/// Callers must have checked that every id in `dependencies` exists.
pub(crate) fn replace_dependencies_internal(
    conn: &Connection,
    task_id: &str,
    dependencies: &BTreeSet<String>,
) -> Result<()> {
    let edges = load_edges(conn)?;
    graph::check_replacement(&edges, task_id, dependencies).map_err(ApiError::from)?;

    conn.execute(
        "DELETE FROM task_dependencies WHERE task_id = ?1",
        params![task_id],
    )?;
    for dep in dependencies {
        insert_edge(conn, task_id, dep)?;
    }
    Ok(())
}

fn neighbour_summaries(conn: &Connection, sql: &str, task_id: &str) -> Result<Vec<TaskSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let mut summaries = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(summary) = get_task_summary_internal(conn, &id)? {
            summaries.push(summary);
        }
    }
    Ok(summaries)
}

/// Direct dependencies of a task.
pub(crate) fn depends_on_internal(conn: &Connection, task_id: &str) -> Result<Vec<TaskSummary>> {
    neighbour_summaries(
        conn,
        "SELECT d.depends_on_task_id FROM task_dependencies d
         INNER JOIN tasks t ON t.id = d.depends_on_task_id
         WHERE d.task_id = ?1
         ORDER BY t.created_at, t.id",
        task_id,
    )
}

fn depended_by_internal(conn: &Connection, task_id: &str) -> Result<Vec<TaskSummary>> {
    neighbour_summaries(
        conn,
        "SELECT d.task_id FROM task_dependencies d
         INNER JOIN tasks t ON t.id = d.task_id
         WHERE d.depends_on_task_id = ?1
         ORDER BY t.created_at, t.id",
        task_id,
    )
}

impl Database {
    /// Make `task_id` depend on `depends_on_task_id`.
    ///
    /// Returns `true` when a new edge was written and `false` when it already
    /// existed. A cycle is rejected before anything is written.
    pub fn add_dependency(&self, task_id: &str, depends_on_task_id: &str) -> Result<bool> {
        let inserted = self.with_tx(|tx| {
            let requested: BTreeSet<String> = [task_id, depends_on_task_id]
                .into_iter()
                .map(str::to_string)
                .collect();
            let missing = missing_task_ids(tx, &requested)?;
            if !missing.is_empty() {
                return Err(ApiError::tasks_not_found(&missing).into());
            }

            let edges = load_edges(tx)?;
            graph::check_new_edge(&edges, task_id, depends_on_task_id).map_err(ApiError::from)?;

            insert_edge(tx, task_id, depends_on_task_id)
        });

        match &inserted {
            Ok(true) => tracing::info!(task_id, depends_on_task_id, "Added dependency"),
            Ok(false) => tracing::debug!(task_id, depends_on_task_id, "Dependency already present"),
            Err(e) => tracing::debug!(task_id, depends_on_task_id, error = %e, "Dependency rejected"),
        }
        inserted
    }

    /// Remove an edge. Returns whether a row was deleted; an absent edge is not an error.
    pub fn remove_dependency(&self, task_id: &str, depends_on_task_id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            if !task_exists(tx, task_id)? {
                return Err(ApiError::task_not_found(task_id).into());
            }
            let removed = tx.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on_task_id = ?2",
                params![task_id, depends_on_task_id],
            )?;
            if removed > 0 {
                tracing::info!(task_id, depends_on_task_id, "Removed dependency");
            }
            Ok(removed > 0)
        })
    }

    /// Get all edges.
    pub fn get_all_dependencies(&self) -> Result<Vec<Dependency>> {
        self.with_conn(load_edges)
    }

    /// Direct depends-on and depended-by neighbours of a task.
    pub fn get_dependency_graph(&self, task_id: &str) -> Result<TaskDependencyGraph> {
        self.with_conn(|conn| {
            if !task_exists(conn, task_id)? {
                return Err(ApiError::task_not_found(task_id).into());
            }
            Ok(TaskDependencyGraph {
                depends_on: depends_on_internal(conn, task_id)?,
                depended_by: depended_by_internal(conn, task_id)?,
            })
        })
    }

    /// Tasks that `task_id` could depend on without creating a cycle.
    pub fn get_available_dependencies(&self, task_id: &str) -> Result<Vec<TaskSummary>> {
        self.with_conn(|conn| {
            if !task_exists(conn, task_id)? {
                return Err(ApiError::task_not_found(task_id).into());
            }
            let edges = load_edges(conn)?;
            let all = list_task_summaries_internal(conn)?;
            let allowed = graph::available_dependency_candidates(
                all.iter().map(|t| t.id.as_str()),
                &edges,
                task_id,
            );
            Ok(all.into_iter().filter(|t| allowed.contains(&t.id)).collect())
        })
    }

    /// Unfinished tasks that `task_id` waits on, directly or transitively.
    pub fn get_transitive_blockers(&self, task_id: &str) -> Result<Vec<TaskSummary>> {
        self.with_conn(|conn| {
            if !task_exists(conn, task_id)? {
                return Err(ApiError::task_not_found(task_id).into());
            }
            let edges = load_edges(conn)?;
            let upstream = graph::transitive_dependencies(&edges, task_id);
            let blockers = list_task_summaries_internal(conn)?
                .into_iter()
                .filter(|t| upstream.contains(&t.id) && t.status != TaskStatus::Done)
                .collect();
            Ok(blockers)
        })
    }

    /// Check the stored graph for cycles. Returns the cycle if one exists.
    pub fn verify_graph(&self) -> Result<Option<Vec<String>>> {
        let edges = self.get_all_dependencies()?;
        let cycle = graph::find_cycle(&edges);
        match &cycle {
            Some(path) => tracing::error!(cycle = %path.join(" -> "), "Dependency graph contains a cycle"),
            None => tracing::info!(edges = edges.len(), "Dependency graph is acyclic"),
        }
        Ok(cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::NewTask;

    fn task(db: &Database, title: &str) -> String {
        db.create_task(NewTask {
            title: title.into(),
            priority: 3,
            difficulty: 3,
            ..Default::default()
        })
        .unwrap()
        .id
    }

    #[test]
    fn add_dependency_reports_existing_edge() {
        let db = Database::open_in_memory().unwrap();
        let a = task(&db, "a");
        let b = task(&db, "b");

        assert!(db.add_dependency(&a, &b).unwrap());
        assert!(!db.add_dependency(&a, &b).unwrap());
        assert_eq!(db.get_all_dependencies().unwrap().len(), 1);
    }

    #[test]
    fn add_dependency_names_all_missing_tasks() {
        let db = Database::open_in_memory().unwrap();
        let err = ApiError::from(db.add_dependency("x", "y").unwrap_err());
        assert_eq!(err.code, ErrorCode::TaskNotFound);
        assert!(err.message.contains('x') && err.message.contains('y'));
    }

    #[test]
    fn replace_rejects_cycle_and_keeps_old_edges() {
        let db = Database::open_in_memory().unwrap();
        let a = task(&db, "a");
        let b = task(&db, "b");
        let c = task(&db, "c");
        db.add_dependency(&b, &a).unwrap();
        db.add_dependency(&a, &c).unwrap();

        let deps: BTreeSet<String> = [b.clone()].into_iter().collect();
        let result = db.with_tx(|tx| replace_dependencies_internal(tx, &a, &deps));
        assert_eq!(ApiError::from(result.unwrap_err()).code, ErrorCode::DependencyCycle);

        let edges = db.get_all_dependencies().unwrap();
        assert!(edges.contains(&Dependency::new(a.as_str(), c.as_str())));
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn remove_dependency_deletes_only_the_named_edge() {
        let db = Database::open_in_memory().unwrap();
        let a = task(&db, "a");
        let b = task(&db, "b");
        let c = task(&db, "c");
        db.add_dependency(&a, &b).unwrap();
        db.add_dependency(&a, &c).unwrap();

        assert!(db.remove_dependency(&a, &b).unwrap());
        assert_eq!(
            db.get_all_dependencies().unwrap(),
            vec![Dependency::new(a.as_str(), c.as_str())]
        );

        let err = ApiError::from(db.remove_dependency("gone", &c).unwrap_err());
        assert_eq!(err.code, ErrorCode::TaskNotFound);
        assert_eq!(db.get_all_dependencies().unwrap().len(), 1);
    }

    #[test]
    fn verify_graph_on_empty_store() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.verify_graph().unwrap(), None);
    }
}
