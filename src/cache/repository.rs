//! Durable local cache: keyed full-aggregate snapshots in SQLite.
//!
//! The catalog (courses + prerequisites) is written after every successful
//! fetch under a single well-known key. Completion snapshots are written only
//! for authenticated subjects, keyed by user id; anonymous completion never
//! touches this store.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::models::{CurriculumData, CurriculumDocument};

const CATALOG_KEY: &str = "catalog";

pub async fn init_schema(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            key TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(db)
    .await?;
    Ok(())
}

async fn save(db: &SqlitePool, key: &str, data: &str) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO snapshots (key, data, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(data)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

async fn load(db: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT data FROM snapshots WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|r| r.get("data")))
}

pub async fn save_catalog(db: &SqlitePool, data: &CurriculumData) -> Result<(), sqlx::Error> {
    let doc = CurriculumDocument {
        courses: data.courses.clone(),
        prerequisites: data.prerequisites.clone(),
    };
    let text = serde_json::to_string(&doc).unwrap_or_else(|_| "{}".to_string());
    save(db, CATALOG_KEY, &text).await
}

pub async fn load_catalog(db: &SqlitePool) -> Result<Option<CurriculumDocument>, sqlx::Error> {
    let Some(text) = load(db, CATALOG_KEY).await? else {
        return Ok(None);
    };
    Ok(serde_json::from_str(&text).ok())
}

fn completed_key(user_id: &str) -> String {
    format!("completed:{}", user_id)
}

pub async fn save_completed(
    db: &SqlitePool,
    user_id: &str,
    completed: &[String],
) -> Result<(), sqlx::Error> {
    let text = serde_json::to_string(completed).unwrap_or_else(|_| "[]".to_string());
    save(db, &completed_key(user_id), &text).await
}

pub async fn load_completed(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Option<Vec<String>>, sqlx::Error> {
    let Some(text) = load(db, &completed_key(user_id)).await? else {
        return Ok(None);
    };
    Ok(serde_json::from_str(&text).ok())
}

/// Cascade removal of a deleted course from the catalog snapshot and every
/// completion snapshot. The backend may or may not cascade on its side; the
/// cache does it regardless.
pub async fn purge_course(db: &SqlitePool, course_id: &str) -> Result<(), sqlx::Error> {
    if let Some(mut doc) = load_catalog(db).await? {
        doc.courses.retain(|c| c.id != course_id);
        doc.prerequisites
            .retain(|p| p.from != course_id && p.to != course_id);
        let text = serde_json::to_string(&doc).unwrap_or_else(|_| "{}".to_string());
        save(db, CATALOG_KEY, &text).await?;
    }

    let rows = sqlx::query("SELECT key, data FROM snapshots WHERE key LIKE 'completed:%'")
        .fetch_all(db)
        .await?;
    for row in rows {
        let key: String = row.get("key");
        let data: String = row.get("data");
        let Ok(mut ids) = serde_json::from_str::<Vec<String>>(&data) else {
            continue;
        };
        let before = ids.len();
        ids.retain(|id| id != course_id);
        if ids.len() != before {
            let text = serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string());
            save(db, &key, &text).await?;
        }
    }
    Ok(())
}
