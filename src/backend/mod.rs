pub mod dto;

use std::env;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;
use dto::{CompletedRow, CourseRow, PrerequisiteRow, WeeklySlotRow};

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
}

impl BackendConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let base_url = env::var("CURRICULUM_API_URL")
            .map_err(|_| AppError::Validation("CURRICULUM_API_URL is not set".to_string()))?;
        let api_key = env::var("CURRICULUM_API_KEY")
            .map_err(|_| AppError::Validation("CURRICULUM_API_KEY is not set".to_string()))?;

        Ok(Self { base_url, api_key })
    }
}

/// The hosted relational store, reduced to the row operations the adapter
/// needs on its four tables. Weekly-slot replacement is exposed as separate
/// delete and insert steps so callers can surface a partial failure instead
/// of pretending the pair was atomic.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<CourseRow>, AppError>;
    async fn list_prerequisites(&self) -> Result<Vec<PrerequisiteRow>, AppError>;
    async fn list_weekly_slots(&self) -> Result<Vec<WeeklySlotRow>, AppError>;
    async fn list_completed(&self, subject_id: &str) -> Result<Vec<CompletedRow>, AppError>;

    async fn find_course(&self, id: &str) -> Result<Option<CourseRow>, AppError>;
    async fn upsert_course(&self, row: &CourseRow) -> Result<(), AppError>;
    async fn delete_course(&self, id: &str) -> Result<(), AppError>;

    async fn delete_weekly_slots(&self, course_id: &str) -> Result<(), AppError>;
    async fn insert_weekly_slots(&self, row: &WeeklySlotRow) -> Result<(), AppError>;

    async fn insert_prerequisite(&self, row: &PrerequisiteRow) -> Result<(), AppError>;
    async fn delete_prerequisite(&self, from: &str, to: &str) -> Result<(), AppError>;
    async fn update_prerequisite_kind(
        &self,
        from: &str,
        to: &str,
        kind: &str,
    ) -> Result<(), AppError>;

    async fn insert_completed(&self, course_id: &str, subject_id: &str) -> Result<(), AppError>;
    async fn delete_completed(&self, course_id: &str, subject_id: &str) -> Result<(), AppError>;
}

/// PostgREST-style client for the hosted backend.
pub struct HttpCatalogBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpCatalogBackend {
    pub fn new(config: BackendConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Backend(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Query values go through reqwest's percent-encoding, so ids containing
    /// `&`, `#`, or spaces cannot corrupt an `eq.` filter.
    fn request(
        &self,
        method: reqwest::Method,
        table: &str,
        query: &[(&str, String)],
    ) -> reqwest::RequestBuilder {
        self.client
            .request(
                method,
                format!("{}/rest/v1/{}", self.config.base_url, table),
            )
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .query(query)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let response = self
            .request(reqwest::Method::GET, table, query)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("{} fetch failed: {}", table, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!(
                "{} fetch failed: {} {}",
                table, status, body
            )));
        }

        let body_text = response.text().await.unwrap_or_default();
        serde_json::from_str(&body_text)
            .map_err(|e| AppError::Backend(format!("failed to parse {} rows: {}", table, e)))
    }

    async fn write<B: Serialize>(
        &self,
        method: reqwest::Method,
        table: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        prefer: Option<&str>,
    ) -> Result<(), AppError> {
        let mut request = self.request(method, table, query);
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("{} write failed: {}", table, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!(
                "{} write failed: {} {}",
                table, status, body
            )));
        }
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn select_all() -> [(&'static str, String); 1] {
    [("select", "*".to_string())]
}

#[async_trait]
impl CatalogBackend for HttpCatalogBackend {
    async fn list_courses(&self) -> Result<Vec<CourseRow>, AppError> {
        self.get_rows("courses", &select_all()).await
    }

    async fn list_prerequisites(&self) -> Result<Vec<PrerequisiteRow>, AppError> {
        self.get_rows("prerequisites", &select_all()).await
    }

    async fn list_weekly_slots(&self) -> Result<Vec<WeeklySlotRow>, AppError> {
        self.get_rows("weekly_slots", &select_all()).await
    }

    async fn list_completed(&self, subject_id: &str) -> Result<Vec<CompletedRow>, AppError> {
        self.get_rows(
            "completed_courses",
            &[("select", "*".to_string()), ("subject_id", eq(subject_id))],
        )
        .await
    }

    async fn find_course(&self, id: &str) -> Result<Option<CourseRow>, AppError> {
        let mut rows: Vec<CourseRow> = self
            .get_rows("courses", &[("select", "*".to_string()), ("id", eq(id))])
            .await?;
        Ok(rows.pop())
    }

    async fn upsert_course(&self, row: &CourseRow) -> Result<(), AppError> {
        self.write(
            reqwest::Method::POST,
            "courses",
            &[("on_conflict", "id".to_string())],
            Some(row),
            Some("resolution=merge-duplicates"),
        )
        .await
    }

    async fn delete_course(&self, id: &str) -> Result<(), AppError> {
        self.write::<()>(
            reqwest::Method::DELETE,
            "courses",
            &[("id", eq(id))],
            None,
            None,
        )
        .await
    }

    async fn delete_weekly_slots(&self, course_id: &str) -> Result<(), AppError> {
        self.write::<()>(
            reqwest::Method::DELETE,
            "weekly_slots",
            &[("course_id", eq(course_id))],
            None,
            None,
        )
        .await
    }

    async fn insert_weekly_slots(&self, row: &WeeklySlotRow) -> Result<(), AppError> {
        self.write(reqwest::Method::POST, "weekly_slots", &[], Some(row), None)
            .await
    }

    /// Inserting an edge that already exists must be a no-op, not an error:
    /// the caller's aggregate may be stale under last-write-wins editing.
    async fn insert_prerequisite(&self, row: &PrerequisiteRow) -> Result<(), AppError> {
        self.write(
            reqwest::Method::POST,
            "prerequisites",
            &[("on_conflict", "from,to".to_string())],
            Some(row),
            Some("resolution=ignore-duplicates"),
        )
        .await
    }

    async fn delete_prerequisite(&self, from: &str, to: &str) -> Result<(), AppError> {
        self.write::<()>(
            reqwest::Method::DELETE,
            "prerequisites",
            &[("from", eq(from)), ("to", eq(to))],
            None,
            None,
        )
        .await
    }

    async fn update_prerequisite_kind(
        &self,
        from: &str,
        to: &str,
        kind: &str,
    ) -> Result<(), AppError> {
        let body = serde_json::json!({ "kind": kind });
        self.write(
            reqwest::Method::PATCH,
            "prerequisites",
            &[("from", eq(from)), ("to", eq(to))],
            Some(&body),
            None,
        )
        .await
    }

    async fn insert_completed(&self, course_id: &str, subject_id: &str) -> Result<(), AppError> {
        let row = CompletedRow {
            course_id: course_id.to_string(),
            subject_id: subject_id.to_string(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        self.write(
            reqwest::Method::POST,
            "completed_courses",
            &[("on_conflict", "course_id,subject_id".to_string())],
            Some(&row),
            Some("resolution=merge-duplicates"),
        )
        .await
    }

    async fn delete_completed(&self, course_id: &str, subject_id: &str) -> Result<(), AppError> {
        self.write::<()>(
            reqwest::Method::DELETE,
            "completed_courses",
            &[("course_id", eq(course_id)), ("subject_id", eq(subject_id))],
            None,
            None,
        )
        .await
    }
}

#[derive(Default)]
struct MemoryTables {
    courses: Vec<CourseRow>,
    prerequisites: Vec<PrerequisiteRow>,
    weekly_slots: Vec<WeeklySlotRow>,
    completed: Vec<CompletedRow>,
}

/// In-memory stand-in for the hosted backend. Backs tests and the offline
/// mode of the service binary.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<MemoryTables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogBackend for MemoryBackend {
    async fn list_courses(&self) -> Result<Vec<CourseRow>, AppError> {
        Ok(self.tables.lock().unwrap().courses.clone())
    }

    async fn list_prerequisites(&self) -> Result<Vec<PrerequisiteRow>, AppError> {
        Ok(self.tables.lock().unwrap().prerequisites.clone())
    }

    async fn list_weekly_slots(&self) -> Result<Vec<WeeklySlotRow>, AppError> {
        Ok(self.tables.lock().unwrap().weekly_slots.clone())
    }

    async fn list_completed(&self, subject_id: &str) -> Result<Vec<CompletedRow>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .completed
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn find_course(&self, id: &str) -> Result<Option<CourseRow>, AppError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .courses
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn upsert_course(&self, row: &CourseRow) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        tables.courses.retain(|r| r.id != row.id);
        tables.courses.push(row.clone());
        Ok(())
    }

    async fn delete_course(&self, id: &str) -> Result<(), AppError> {
        self.tables.lock().unwrap().courses.retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_weekly_slots(&self, course_id: &str) -> Result<(), AppError> {
        self.tables
            .lock()
            .unwrap()
            .weekly_slots
            .retain(|r| r.course_id != course_id);
        Ok(())
    }

    async fn insert_weekly_slots(&self, row: &WeeklySlotRow) -> Result<(), AppError> {
        self.tables.lock().unwrap().weekly_slots.push(row.clone());
        Ok(())
    }

    async fn insert_prerequisite(&self, row: &PrerequisiteRow) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        // Same duplicate handling as the HTTP client: an existing (from, to)
        // pair keeps its row and the insert is silently dropped.
        let exists = tables
            .prerequisites
            .iter()
            .any(|r| r.from == row.from && r.to == row.to);
        if !exists {
            tables.prerequisites.push(row.clone());
        }
        Ok(())
    }

    async fn delete_prerequisite(&self, from: &str, to: &str) -> Result<(), AppError> {
        self.tables
            .lock()
            .unwrap()
            .prerequisites
            .retain(|r| !(r.from == from && r.to == to));
        Ok(())
    }

    async fn update_prerequisite_kind(
        &self,
        from: &str,
        to: &str,
        kind: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        for row in tables
            .prerequisites
            .iter_mut()
            .filter(|r| r.from == from && r.to == to)
        {
            row.kind = kind.to_string();
            row.updated_at = Some(chrono::Utc::now().to_rfc3339());
        }
        Ok(())
    }

    async fn insert_completed(&self, course_id: &str, subject_id: &str) -> Result<(), AppError> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .completed
            .retain(|r| !(r.course_id == course_id && r.subject_id == subject_id));
        tables.completed.push(CompletedRow {
            course_id: course_id.to_string(),
            subject_id: subject_id.to_string(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        });
        Ok(())
    }

    async fn delete_completed(&self, course_id: &str, subject_id: &str) -> Result<(), AppError> {
        self.tables
            .lock()
            .unwrap()
            .completed
            .retain(|r| !(r.course_id == course_id && r.subject_id == subject_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_backend() -> HttpCatalogBackend {
        HttpCatalogBackend::new(BackendConfig {
            base_url: "http://localhost".to_string(),
            api_key: "test-key".to_string(),
        })
        .expect("Failed to build client")
    }

    #[test]
    fn filter_values_are_percent_encoded() {
        let backend = http_backend();
        let request = backend
            .request(
                reqwest::Method::GET,
                "courses",
                &[("id", eq("mat 101&x#y"))],
            )
            .build()
            .expect("Failed to build request");

        let query = request.url().query().expect("query missing");
        assert!(!query.contains("101&x"));
        assert!(!query.contains('#'));
        assert!(query.contains("%26"));
        assert!(query.contains("%23"));
    }

    #[test]
    fn prerequisite_insert_asks_the_backend_to_ignore_duplicates() {
        let backend = http_backend();
        let request = backend
            .request(
                reqwest::Method::POST,
                "prerequisites",
                &[("on_conflict", "from,to".to_string())],
            )
            .header("Prefer", "resolution=ignore-duplicates")
            .build()
            .expect("Failed to build request");

        assert!(request
            .url()
            .query()
            .unwrap()
            .contains("on_conflict=from%2Cto"));
        assert_eq!(
            request.headers().get("Prefer").unwrap(),
            "resolution=ignore-duplicates"
        );
    }
}
