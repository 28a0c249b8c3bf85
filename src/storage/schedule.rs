//! Schedule item queries

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{opt_ts, push_window, ts};
use crate::error::{Result, SyncError};
use crate::types::{
    ItemId, ItemStatus, NewScheduleItem, Priority, ScheduleFilter, ScheduleItem,
    ScheduleItemPatch,
};

const ITEM_COLUMNS: &str = "id, owner_id, title, description, subject, due_date, start_time,
        end_time, duration_minutes, priority, status, tags, reminder, recurrence,
        completed_at, created_at, updated_at, last_synced_at";

fn item_from_row(row: &Row) -> rusqlite::Result<ScheduleItem> {
    let priority_str: String = row.get("priority")?;
    let status_str: String = row.get("status")?;
    let tags_json: String = row.get("tags")?;
    let reminder_json: Option<String> = row.get("reminder")?;
    let recurrence_json: Option<String> = row.get("recurrence")?;
    let due_date: Option<String> = row.get("due_date")?;
    let start_time: Option<String> = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_synced_at: String = row.get("last_synced_at")?;

    Ok(ScheduleItem {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        subject: row.get("subject")?,
        due_date: opt_ts(due_date),
        start_time: opt_ts(start_time),
        end_time: opt_ts(end_time),
        duration: row.get("duration_minutes")?,
        priority: priority_str.parse().unwrap_or_default(),
        status: status_str.parse().unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        reminder: reminder_json.and_then(|s| serde_json::from_str(&s).ok()),
        recurrence: recurrence_json.and_then(|s| serde_json::from_str(&s).ok()),
        completed_at: opt_ts(completed_at),
        created_at: ts(&created_at),
        updated_at: ts(&updated_at),
        last_synced_at: ts(&last_synced_at),
    })
}

/// Get a schedule item by id, scoped to the owner
pub fn get_item(conn: &Connection, owner_id: &str, id: ItemId) -> Result<Option<ScheduleItem>> {
    let sql = format!(
        "SELECT {} FROM schedule_items WHERE owner_id = ? AND id = ?",
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row(params![owner_id, id], item_from_row).optional()?)
}

/// Insert one schedule item, stamping the watermark
pub fn create_item(
    conn: &Connection,
    owner_id: &str,
    input: &NewScheduleItem,
) -> Result<ScheduleItem> {
    input.validate()?;

    let now = Utc::now().to_rfc3339();
    let tags_json = serde_json::to_string(&input.tags)?;
    let reminder_json = input
        .reminder
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let recurrence_json = input
        .recurrence
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO schedule_items
            (owner_id, title, description, subject, due_date, start_time, end_time,
             duration_minutes, priority, priority_rank, status, tags, reminder,
             recurrence, completed_at, created_at, updated_at, last_synced_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            owner_id,
            input.title,
            input.description,
            input.subject,
            input.due_date.map(|d| d.to_rfc3339()),
            input.start_time.map(|d| d.to_rfc3339()),
            input.end_time.map(|d| d.to_rfc3339()),
            input.duration,
            input.priority.as_str(),
            input.priority.rank(),
            input.status.as_str(),
            tags_json,
            reminder_json,
            recurrence_json,
            input.completed_at.map(|d| d.to_rfc3339()),
            now,
            now,
            now,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_item(conn, owner_id, id)?.ok_or_else(|| SyncError::not_found("schedule item", id.to_string()))
}

/// Apply a sparse patch to a schedule item (last write wins)
pub fn update_item(
    conn: &Connection,
    owner_id: &str,
    patch: &ScheduleItemPatch,
) -> Result<ScheduleItem> {
    patch.validate()?;

    let now = Utc::now().to_rfc3339();
    let mut updates = vec![
        "updated_at = ?".to_string(),
        "last_synced_at = ?".to_string(),
    ];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(now.clone()), Box::new(now)];

    if let Some(ref title) = patch.title {
        updates.push("title = ?".to_string());
        values.push(Box::new(title.clone()));
    }
    if let Some(ref description) = patch.description {
        updates.push("description = ?".to_string());
        values.push(Box::new(description.clone()));
    }
    if let Some(ref subject) = patch.subject {
        updates.push("subject = ?".to_string());
        values.push(Box::new(subject.clone()));
    }
    if let Some(due_date) = patch.due_date {
        updates.push("due_date = ?".to_string());
        values.push(Box::new(due_date.to_rfc3339()));
    }
    if let Some(start_time) = patch.start_time {
        updates.push("start_time = ?".to_string());
        values.push(Box::new(start_time.to_rfc3339()));
    }
    if let Some(end_time) = patch.end_time {
        updates.push("end_time = ?".to_string());
        values.push(Box::new(end_time.to_rfc3339()));
    }
    if let Some(duration) = patch.duration {
        updates.push("duration_minutes = ?".to_string());
        values.push(Box::new(duration));
    }
    if let Some(priority) = patch.priority {
        updates.push("priority = ?".to_string());
        values.push(Box::new(priority.as_str().to_string()));
        updates.push("priority_rank = ?".to_string());
        values.push(Box::new(priority.rank()));
    }
    if let Some(status) = patch.status {
        updates.push("status = ?".to_string());
        values.push(Box::new(status.as_str().to_string()));
    }
    if let Some(ref tags) = patch.tags {
        updates.push("tags = ?".to_string());
        values.push(Box::new(serde_json::to_string(tags)?));
    }
    if let Some(ref reminder) = patch.reminder {
        updates.push("reminder = ?".to_string());
        values.push(Box::new(serde_json::to_string(reminder)?));
    }
    if let Some(ref recurrence) = patch.recurrence {
        updates.push("recurrence = ?".to_string());
        values.push(Box::new(serde_json::to_string(recurrence)?));
    }
    if let Some(completed_at) = patch.completed_at {
        updates.push("completed_at = ?".to_string());
        values.push(Box::new(completed_at.to_rfc3339()));
    }

    let sql = format!(
        "UPDATE schedule_items SET {} WHERE owner_id = ? AND id = ?",
        updates.join(", ")
    );
    values.push(Box::new(owner_id.to_string()));
    values.push(Box::new(patch.id));

    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let affected = conn.execute(&sql, param_refs.as_slice())?;

    if affected == 0 {
        return Err(SyncError::not_found("schedule item", patch.id.to_string()));
    }

    get_item(conn, owner_id, patch.id)?
        .ok_or_else(|| SyncError::not_found("schedule item", patch.id.to_string()))
}

/// List schedule items with filters, watermark, and pagination
pub fn list_items(
    conn: &Connection,
    owner_id: &str,
    filter: &ScheduleFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ScheduleItem>, i64)> {
    let mut conditions = vec!["owner_id = ?".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id.to_string())];

    if let Some(status) = filter.status {
        conditions.push("status = ?".to_string());
        params_vec.push(Box::new(status.as_str().to_string()));
    }
    if let Some(priority) = filter.priority {
        conditions.push("priority = ?".to_string());
        params_vec.push(Box::new(priority.as_str().to_string()));
    }
    if let Some(ref subject) = filter.subject {
        conditions.push("subject = ?".to_string());
        params_vec.push(Box::new(subject.clone()));
    }
    if let Some(after) = filter.due_after {
        conditions.push("due_date >= ?".to_string());
        params_vec.push(Box::new(after.to_rfc3339()));
    }
    if let Some(before) = filter.due_before {
        conditions.push("due_date <= ?".to_string());
        params_vec.push(Box::new(before.to_rfc3339()));
    }
    if let Some(since) = filter.since {
        conditions.push("last_synced_at > ?".to_string());
        params_vec.push(Box::new(since.to_rfc3339()));
    }

    let where_clause = conditions.join(" AND ");

    let total: i64 = {
        let sql = format!("SELECT COUNT(*) FROM schedule_items WHERE {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?
    };

    // Soonest due first, higher priority breaking ties, newest creation
    // after that, id last to keep pagination stable
    let mut sql = format!(
        "SELECT {} FROM schedule_items WHERE {}
         ORDER BY due_date ASC, priority_rank DESC, created_at DESC, id DESC",
        ITEM_COLUMNS, where_clause
    );
    push_window(&mut sql, &mut params_vec, limit, offset);

    let param_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(param_refs.as_slice(), item_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((items, total))
}

/// Delete one item by id; returns the number of rows removed (0 or 1)
pub fn delete_item(conn: &Connection, owner_id: &str, id: ItemId) -> Result<i64> {
    let deleted = conn.execute(
        "DELETE FROM schedule_items WHERE owner_id = ? AND id = ?",
        params![owner_id, id],
    )?;
    Ok(deleted as i64)
}

/// Delete several items by id; returns the number of rows removed
pub fn delete_items(conn: &Connection, owner_id: &str, ids: &[ItemId]) -> Result<i64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
    let sql = format!(
        "DELETE FROM schedule_items WHERE owner_id = ? AND id IN ({})",
        placeholders.join(", ")
    );

    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id.to_string())];
    for id in ids {
        values.push(Box::new(*id));
    }
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();

    let deleted = conn.execute(&sql, param_refs.as_slice())?;
    Ok(deleted as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use chrono::{Duration, Utc};

    fn new_item(title: &str, priority: Priority) -> NewScheduleItem {
        NewScheduleItem {
            title: title.to_string(),
            description: None,
            subject: Some("physics".to_string()),
            due_date: Some(Utc::now() + Duration::days(1)),
            start_time: None,
            end_time: None,
            duration: Some(60),
            priority,
            status: ItemStatus::Pending,
            tags: vec![],
            reminder: None,
            recurrence: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let item = create_item(conn, "alice", &new_item("Lab report", Priority::High))?;
                assert_eq!(item.title, "Lab report");
                assert_eq!(item.priority, Priority::High);
                assert_eq!(item.updated_at, item.last_synced_at);

                let fetched = get_item(conn, "alice", item.id)?.unwrap();
                assert_eq!(fetched.id, item.id);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_get_is_owner_scoped() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let item = create_item(conn, "alice", &new_item("Lab report", Priority::High))?;
                assert!(get_item(conn, "bob", item.id)?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_patch_updates_only_named_fields() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let item = create_item(conn, "alice", &new_item("Lab report", Priority::Medium))?;

                let patch = ScheduleItemPatch {
                    id: item.id,
                    status: Some(ItemStatus::Completed),
                    completed_at: Some(Utc::now()),
                    title: None,
                    description: None,
                    subject: None,
                    due_date: None,
                    start_time: None,
                    end_time: None,
                    duration: None,
                    priority: None,
                    tags: None,
                    reminder: None,
                    recurrence: None,
                };
                let updated = update_item(conn, "alice", &patch)?;
                assert_eq!(updated.status, ItemStatus::Completed);
                assert_eq!(updated.title, "Lab report");
                assert_eq!(updated.subject.as_deref(), Some("physics"));
                assert!(updated.last_synced_at > item.last_synced_at);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_update_foreign_item_is_not_found() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let item = create_item(conn, "alice", &new_item("Lab report", Priority::Low))?;
                let patch = ScheduleItemPatch {
                    id: item.id,
                    status: Some(ItemStatus::Cancelled),
                    title: None,
                    description: None,
                    subject: None,
                    due_date: None,
                    start_time: None,
                    end_time: None,
                    duration: None,
                    priority: None,
                    tags: None,
                    reminder: None,
                    recurrence: None,
                    completed_at: None,
                };
                let result = update_item(conn, "bob", &patch);
                assert!(matches!(result, Err(SyncError::NotFound(_, _))));

                // Stored row untouched
                let stored = get_item(conn, "alice", item.id)?.unwrap();
                assert_eq!(stored.status, ItemStatus::Pending);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_list_ordering_by_due_then_priority() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let due = Utc::now() + Duration::days(2);
                let mut early = new_item("Early", Priority::Low);
                early.due_date = Some(due - Duration::days(1));
                let mut late_low = new_item("Late low", Priority::Low);
                late_low.due_date = Some(due);
                let mut late_urgent = new_item("Late urgent", Priority::Urgent);
                late_urgent.due_date = Some(due);

                create_item(conn, "alice", &late_low)?;
                create_item(conn, "alice", &late_urgent)?;
                create_item(conn, "alice", &early)?;

                let (items, _) = list_items(conn, "alice", &ScheduleFilter::default(), 50, 0)?;
                let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
                assert_eq!(titles, vec!["Early", "Late urgent", "Late low"]);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_delete_many_ignores_foreign_ids() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                let a = create_item(conn, "alice", &new_item("A", Priority::Low))?;
                let b = create_item(conn, "alice", &new_item("B", Priority::Low))?;
                let foreign = create_item(conn, "bob", &new_item("C", Priority::Low))?;

                let deleted = delete_items(conn, "alice", &[a.id, b.id, foreign.id])?;
                assert_eq!(deleted, 2);
                assert!(get_item(conn, "bob", foreign.id)?.is_some());
                Ok(())
            })
            .unwrap();
    }
}
