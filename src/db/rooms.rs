//! Room storage.
//!
//! Rooms live independently of tasks. The task service only needs to know
//! whether referenced rooms exist; the rest is plain CRUD.

use super::{Database, new_id, now_ms, placeholders};
use crate::error::ApiError;
use crate::types::{NewRoom, Room, RoomDetails, RoomStats, RoomUpdate};
use anyhow::Result;
use rusqlite::{Connection, Row, params, params_from_iter};
use std::collections::BTreeSet;

const NAME_MAX: usize = 100;
const COLOR_MAX: usize = 20;
const FLOOR_MAX: usize = 100;

fn parse_room_row(row: &Row) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get("id")?,
        name: row.get("name")?,
        color: row.get("color")?,
        floor: row.get("floor")?,
    })
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(ApiError::invalid_value(
            field,
            &format!("{} must be at most {} characters", field, max),
        )
        .into());
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ApiError::invalid_value("name", "name must not be empty").into());
    }
    check_len("name", name, NAME_MAX)
}

fn validate_optional(color: Option<&str>, floor: Option<&str>) -> Result<()> {
    if let Some(color) = color {
        check_len("color", color, COLOR_MAX)?;
    }
    if let Some(floor) = floor {
        check_len("floor", floor, FLOOR_MAX)?;
    }
    Ok(())
}

/// Room ids from `ids` that have no row, in id order.
pub(crate) fn missing_room_ids(conn: &Connection, ids: &BTreeSet<String>) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id FROM rooms WHERE id IN ({})",
        placeholders(ids.len(), 0)
    );
    let mut stmt = conn.prepare(&sql)?;
    let found: BTreeSet<String> = stmt
        .query_map(params_from_iter(ids.iter()), |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(ids.difference(&found).cloned().collect())
}

/// Rooms associated with a task, ordered by name.
pub(crate) fn rooms_for_task(conn: &Connection, task_id: &str) -> Result<Vec<Room>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name, r.color, r.floor
         FROM rooms r
         INNER JOIN task_rooms tr ON tr.room_id = r.id
         WHERE tr.task_id = ?1
         ORDER BY r.name, r.id",
    )?;
    let rooms = stmt
        .query_map(params![task_id], parse_room_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rooms)
}

fn get_room_internal(conn: &Connection, room_id: &str) -> Result<Option<(Room, i64)>> {
    let result = conn.query_row(
        "SELECT id, name, color, floor, created_at FROM rooms WHERE id = ?1",
        params![room_id],
        |row| Ok((parse_room_row(row)?, row.get::<_, i64>("created_at")?)),
    );
    match result {
        Ok(room) => Ok(Some(room)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn room_stats_internal(conn: &Connection, room_id: &str) -> Result<RoomStats> {
    let stats = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN t.status = 'done' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN t.status = 'in_progress' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN t.status = 'blocked' THEN 1 ELSE 0 END), 0)
         FROM task_rooms tr
         INNER JOIN tasks t ON t.id = tr.task_id
         WHERE tr.room_id = ?1",
        params![room_id],
        |row| {
            Ok(RoomStats {
                total_tasks: row.get(0)?,
                completed: row.get(1)?,
                in_progress: row.get(2)?,
                blocked: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}

impl Database {
    /// Create a room.
    pub fn create_room(&self, input: NewRoom) -> Result<Room> {
        validate_name(&input.name)?;
        validate_optional(input.color.as_deref(), input.floor.as_deref())?;

        let room = Room {
            id: new_id(),
            name: input.name,
            color: input.color,
            floor: input.floor,
        };
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rooms (id, name, color, floor, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&room.id, &room.name, &room.color, &room.floor, now],
            )?;
            Ok(())
        })?;

        tracing::debug!(room_id = %room.id, name = %room.name, "Created room");
        Ok(room)
    }

    /// Get a room with its task statistics.
    pub fn get_room(&self, room_id: &str) -> Result<Option<RoomDetails>> {
        self.with_conn(|conn| {
            let Some((room, created_at)) = get_room_internal(conn, room_id)? else {
                return Ok(None);
            };
            let stats = room_stats_internal(conn, room_id)?;
            Ok(Some(RoomDetails {
                room,
                created_at,
                stats,
            }))
        })
    }

    /// List all rooms ordered by name.
    pub fn list_rooms(&self) -> Result<Vec<Room>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, color, floor FROM rooms ORDER BY name, id")?;
            let rooms = stmt
                .query_map([], parse_room_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rooms)
        })
    }

    /// Apply a partial update to a room.
    pub fn update_room(&self, room_id: &str, update: RoomUpdate) -> Result<Room> {
        if let Some(ref name) = update.name {
            validate_name(name)?;
        }
        validate_optional(update.color.as_deref(), update.floor.as_deref())?;

        self.with_tx(|tx| {
            let Some((mut room, _)) = get_room_internal(tx, room_id)? else {
                return Err(ApiError::room_not_found(room_id).into());
            };
            if let Some(name) = update.name {
                room.name = name;
            }
            if update.color.is_some() {
                room.color = update.color;
            }
            if update.floor.is_some() {
                room.floor = update.floor;
            }
            tx.execute(
                "UPDATE rooms SET name = ?1, color = ?2, floor = ?3 WHERE id = ?4",
                params![&room.name, &room.color, &room.floor, room_id],
            )?;
            Ok(room)
        })
    }

    /// Delete a room. Refused while any task is still associated with it.
    pub fn delete_room(&self, room_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            if get_room_internal(tx, room_id)?.is_none() {
                return Err(ApiError::room_not_found(room_id).into());
            }
            let assigned: i64 = tx.query_row(
                "SELECT COUNT(*) FROM task_rooms WHERE room_id = ?1",
                params![room_id],
                |row| row.get(0),
            )?;
            if assigned > 0 {
                return Err(ApiError::conflict("Room has assigned tasks")
                    .with_details(format!("{} task(s) reference room {}", assigned, room_id))
                    .into());
            }
            tx.execute("DELETE FROM rooms WHERE id = ?1", params![room_id])?;
            tracing::debug!(room_id, "Deleted room");
            Ok(())
        })
    }

    /// Task counts for one room.
    pub fn room_stats(&self, room_id: &str) -> Result<RoomStats> {
        self.with_conn(|conn| {
            if get_room_internal(conn, room_id)?.is_none() {
                return Err(ApiError::room_not_found(room_id).into());
            }
            room_stats_internal(conn, room_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn code(err: anyhow::Error) -> ErrorCode {
        ApiError::from(err).code
    }

    #[test]
    fn create_and_list_rooms_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.create_room(NewRoom {
            name: "Kitchen".into(),
            ..Default::default()
        })
        .unwrap();
        db.create_room(NewRoom {
            name: "Bathroom".into(),
            color: Some("#00f".into()),
            floor: Some("Ground".into()),
        })
        .unwrap();

        let names: Vec<String> = db.list_rooms().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Bathroom", "Kitchen"]);
    }

    #[test]
    fn create_room_rejects_empty_name() {
        let db = Database::open_in_memory().unwrap();
        let err = db.create_room(NewRoom::default()).unwrap_err();
        assert_eq!(code(err), ErrorCode::InvalidFieldValue);
    }

    #[test]
    fn update_room_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let room = db
            .create_room(NewRoom {
                name: "Attic".into(),
                color: Some("red".into()),
                floor: None,
            })
            .unwrap();

        let updated = db
            .update_room(
                &room.id,
                RoomUpdate {
                    floor: Some("Top".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Attic");
        assert_eq!(updated.color.as_deref(), Some("red"));
        assert_eq!(updated.floor.as_deref(), Some("Top"));
    }

    #[test]
    fn missing_room_lookups() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_room("nope").unwrap().is_none());
        assert_eq!(code(db.delete_room("nope").unwrap_err()), ErrorCode::RoomNotFound);
        assert_eq!(code(db.room_stats("nope").unwrap_err()), ErrorCode::RoomNotFound);
    }

    #[test]
    fn missing_room_ids_reports_only_unknown() {
        let db = Database::open_in_memory().unwrap();
        let room = db
            .create_room(NewRoom {
                name: "Hall".into(),
                ..Default::default()
            })
            .unwrap();
        let ids: BTreeSet<String> = [room.id.clone(), "ghost".to_string()].into_iter().collect();
        let missing = db.with_conn(|conn| missing_room_ids(conn, &ids)).unwrap();
        assert_eq!(missing, vec!["ghost".to_string()]);
    }
}
