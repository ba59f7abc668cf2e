//! The persistence adapter: one explicit store object owned by the
//! application root. It holds the backend client, the durable cache, the
//! session state, and the current in-memory aggregate, which is rebuilt whole
//! on every fetch and swapped in as a single unit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::backend::dto::{CourseRow, PrerequisiteRow, WeeklySlotRow};
use crate::backend::CatalogBackend;
use crate::cache::repository as cache;
use crate::error::AppError;
use crate::models::{
    export_document, parse_import_document, Course, CurriculumData, Prerequisite, RelationKind,
};
use crate::session::{SessionState, Subject};
use crate::watch::{ChangeFeed, Subscription};

#[derive(Debug, Default, Serialize)]
pub struct FetchStats {
    pub courses: usize,
    pub prerequisites: usize,
    pub completed: usize,
    /// True when the backend was unreachable and the durable cache served
    /// the last-known snapshot instead.
    pub from_cache: bool,
}

pub struct CurriculumStore {
    backend: Arc<dyn CatalogBackend>,
    cache: SqlitePool,
    session: Mutex<SessionState>,
    current: RwLock<Arc<CurriculumData>>,
    feed: ChangeFeed,
}

impl CurriculumStore {
    pub async fn new(
        backend: Arc<dyn CatalogBackend>,
        cache_db: SqlitePool,
    ) -> Result<Self, AppError> {
        cache::init_schema(&cache_db).await?;
        Ok(Self {
            backend,
            cache: cache_db,
            session: Mutex::new(SessionState::new()),
            current: RwLock::new(Arc::new(CurriculumData::default())),
            feed: ChangeFeed::new(),
        })
    }

    /// The current aggregate. Cheap to call; the returned snapshot stays
    /// coherent even while a fetch replaces the store's copy.
    pub fn data(&self) -> Arc<CurriculumData> {
        self.current.read().unwrap().clone()
    }

    pub fn subject(&self) -> Subject {
        self.session.lock().unwrap().subject.clone()
    }

    pub fn feed(&self) -> ChangeFeed {
        self.feed.clone()
    }

    pub fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }

    pub fn login(&self, user_id: &str) {
        self.session.lock().unwrap().login(user_id);
        // Anonymous completion does not carry over; the caller re-fetches.
        self.swap(|data| data.completed.clear());
    }

    pub fn logout(&self) {
        self.session.lock().unwrap().logout();
        self.swap(|data| data.completed.clear());
    }

    fn require_auth(&self) -> Result<String, AppError> {
        let session = self.session.lock().unwrap();
        match &session.subject {
            Subject::Authenticated { user_id } => Ok(user_id.clone()),
            Subject::Anonymous { .. } => Err(AppError::LoginRequired),
        }
    }

    fn swap(&self, mutate: impl FnOnce(&mut CurriculumData)) {
        let mut guard = self.current.write().unwrap();
        let mut data = (**guard).clone();
        mutate(&mut data);
        *guard = Arc::new(data);
    }

    /// Fetches all four tables concurrently, joins weekly slots onto their
    /// courses, and swaps the fresh aggregate in. An empty backend yields an
    /// empty aggregate; an unreachable backend falls back to the cache's
    /// last-known snapshot.
    pub async fn fetch_all(&self) -> Result<FetchStats, AppError> {
        let subject = self.subject();

        let completed_rows = async {
            match &subject {
                Subject::Authenticated { user_id } => self.backend.list_completed(user_id).await,
                Subject::Anonymous { .. } => Ok(Vec::new()),
            }
        };
        let fetched = tokio::try_join!(
            self.backend.list_courses(),
            self.backend.list_prerequisites(),
            self.backend.list_weekly_slots(),
            completed_rows,
        );

        let (course_rows, prereq_rows, slot_rows, completed_rows) = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                warn!("backend fetch failed, trying cached snapshot: {}", e);
                return self.load_from_cache(&subject, e).await;
            }
        };

        let mut slots_by_course: HashMap<String, WeeklySlotRow> = slot_rows
            .into_iter()
            .map(|row| (row.course_id.clone(), row))
            .collect();

        let mut courses = Vec::with_capacity(course_rows.len());
        for row in course_rows {
            let id = row.id.clone();
            let Some(mut course) = row.into_course() else {
                warn!("skipping course {} with unknown type", id);
                continue;
            };
            if let Some(slot_row) = slots_by_course.remove(&course.id) {
                course.slots = slot_row.slots();
            }
            courses.push(course);
        }

        let prerequisites: Vec<Prerequisite> = prereq_rows
            .into_iter()
            .filter_map(|row| {
                let from = row.from.clone();
                let edge = row.into_edge();
                if edge.is_none() {
                    warn!("skipping prerequisite from {} with unknown kind", from);
                }
                edge
            })
            .collect();

        let completed = match &subject {
            Subject::Authenticated { .. } => {
                completed_rows.into_iter().map(|r| r.course_id).collect()
            }
            Subject::Anonymous { .. } => {
                let session = self.session.lock().unwrap();
                session.anon_completed.iter().cloned().collect()
            }
        };

        let data = CurriculumData {
            courses,
            prerequisites,
            completed,
        };
        let stats = FetchStats {
            courses: data.courses.len(),
            prerequisites: data.prerequisites.len(),
            completed: data.completed.len(),
            from_cache: false,
        };

        if let Err(e) = cache::save_catalog(&self.cache, &data).await {
            warn!("failed to write catalog snapshot: {}", e);
        }
        if let Subject::Authenticated { user_id } = &subject {
            if let Err(e) = cache::save_completed(&self.cache, user_id, &data.completed).await {
                warn!("failed to write completion snapshot: {}", e);
            }
        }

        *self.current.write().unwrap() = Arc::new(data);
        info!(
            "fetched {} courses, {} prerequisites, {} completed",
            stats.courses, stats.prerequisites, stats.completed
        );
        Ok(stats)
    }

    async fn load_from_cache(
        &self,
        subject: &Subject,
        backend_err: AppError,
    ) -> Result<FetchStats, AppError> {
        let Some(doc) = cache::load_catalog(&self.cache).await? else {
            return Err(backend_err);
        };
        let completed = match subject {
            Subject::Authenticated { user_id } => cache::load_completed(&self.cache, user_id)
                .await?
                .unwrap_or_default(),
            Subject::Anonymous { .. } => {
                let session = self.session.lock().unwrap();
                session.anon_completed.iter().cloned().collect()
            }
        };
        let data = CurriculumData {
            courses: doc.courses,
            prerequisites: doc.prerequisites,
            completed,
        };
        let stats = FetchStats {
            courses: data.courses.len(),
            prerequisites: data.prerequisites.len(),
            completed: data.completed.len(),
            from_cache: true,
        };
        *self.current.write().unwrap() = Arc::new(data);
        info!("serving last-known snapshot from cache");
        Ok(stats)
    }

    /// Creates or replaces one course. On rename the caller passes the prior
    /// id, which must exist. Weekly slots are replaced delete-then-insert;
    /// when the slot step fails the course row stays written and the failure
    /// surfaces as a partial write for the user to retry.
    pub async fn upsert_course(
        &self,
        course: Course,
        prior_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.require_auth()?;
        course.validate()?;

        if let Some(prior) = prior_id {
            if self.backend.find_course(prior).await?.is_none() {
                return Err(AppError::NotFound(format!("course not found: {}", prior)));
            }
        }

        self.backend
            .upsert_course(&CourseRow::from_course(&course))
            .await?;

        // Rename: retire the row at the prior id once the new one is in.
        if let Some(prior) = prior_id.filter(|p| *p != course.id) {
            self.backend.delete_weekly_slots(prior).await?;
            self.backend.delete_course(prior).await?;
        }

        let slot_step = async {
            self.backend.delete_weekly_slots(&course.id).await?;
            if !course.slots.is_empty() {
                self.backend
                    .insert_weekly_slots(&WeeklySlotRow::from_course(&course))
                    .await?;
            }
            Ok::<(), AppError>(())
        };
        if let Err(e) = slot_step.await {
            error!(
                "course {} written but weekly slots failed: {}",
                course.id, e
            );
            return Err(AppError::PartialWrite(format!(
                "course {} was saved but its weekly slots were not: {}",
                course.id, e
            )));
        }

        let prior_owned = prior_id.map(str::to_string);
        self.swap(move |data| {
            data.courses
                .retain(|c| c.id != course.id && Some(&c.id) != prior_owned.as_ref());
            data.courses.push(course);
        });
        self.save_catalog_snapshot().await;
        Ok(())
    }

    /// Deletes a course: slot rows first, then the course row, then a
    /// defensive cascade over edges and completion records in the aggregate
    /// and the cache, whether or not the backend cascades on its side.
    pub async fn delete_course(&self, id: &str) -> Result<(), AppError> {
        self.require_auth()?;

        self.backend.delete_weekly_slots(id).await?;
        self.backend.delete_course(id).await?;

        let id_owned = id.to_string();
        self.swap(move |data| {
            data.courses.retain(|c| c.id != id_owned);
            data.prerequisites
                .retain(|p| p.from != id_owned && p.to != id_owned);
            data.completed.retain(|c| c != &id_owned);
        });
        {
            let mut session = self.session.lock().unwrap();
            session.anon_completed.remove(id);
        }
        if let Err(e) = cache::purge_course(&self.cache, id).await {
            warn!("cache cascade for course {} failed: {}", id, e);
        }
        Ok(())
    }

    /// Adding an edge that already exists is a no-op, not an error.
    pub async fn add_prerequisite(
        &self,
        from: &str,
        to: &str,
        kind: RelationKind,
    ) -> Result<(), AppError> {
        self.require_auth()?;
        let edge = Prerequisite {
            from: from.to_string(),
            to: to.to_string(),
            kind,
        };
        edge.validate()?;

        let exists = self
            .data()
            .prerequisites
            .iter()
            .any(|p| p.from == from && p.to == to);
        if exists {
            return Ok(());
        }

        self.backend
            .insert_prerequisite(&PrerequisiteRow::from_edge(&edge))
            .await?;
        self.swap(move |data| data.prerequisites.push(edge));
        self.save_catalog_snapshot().await;
        Ok(())
    }

    pub async fn remove_prerequisite(&self, from: &str, to: &str) -> Result<(), AppError> {
        self.require_auth()?;
        self.backend.delete_prerequisite(from, to).await?;

        let (from, to) = (from.to_string(), to.to_string());
        self.swap(move |data| {
            data.prerequisites
                .retain(|p| !(p.from == from && p.to == to));
        });
        self.save_catalog_snapshot().await;
        Ok(())
    }

    pub async fn update_prerequisite_kind(
        &self,
        from: &str,
        to: &str,
        kind: RelationKind,
    ) -> Result<(), AppError> {
        self.require_auth()?;
        self.backend
            .update_prerequisite_kind(from, to, kind.as_str())
            .await?;

        let (from, to) = (from.to_string(), to.to_string());
        self.swap(move |data| {
            for p in data
                .prerequisites
                .iter_mut()
                .filter(|p| p.from == from && p.to == to)
            {
                p.kind = kind;
            }
        });
        self.save_catalog_snapshot().await;
        Ok(())
    }

    /// Routes to durable or ephemeral completion storage based on the auth
    /// state at this call, not a state captured earlier in the session.
    pub async fn set_completion(&self, course_id: &str, completed: bool) -> Result<(), AppError> {
        let subject = self.subject();
        match &subject {
            Subject::Authenticated { user_id } => {
                if completed {
                    self.backend.insert_completed(course_id, user_id).await?;
                } else {
                    self.backend.delete_completed(course_id, user_id).await?;
                }
            }
            Subject::Anonymous { .. } => {
                let mut session = self.session.lock().unwrap();
                if completed {
                    session.anon_completed.insert(course_id.to_string());
                } else {
                    session.anon_completed.remove(course_id);
                }
            }
        }

        let id = course_id.to_string();
        self.swap(move |data| {
            data.completed.retain(|c| c != &id);
            if completed {
                data.completed.push(id);
            }
        });

        if let Subject::Authenticated { user_id } = &subject {
            let completed_ids = self.data().completed.clone();
            if let Err(e) = cache::save_completed(&self.cache, user_id, &completed_ids).await {
                warn!("failed to write completion snapshot: {}", e);
            }
        }
        Ok(())
    }

    /// Waits for the next change notification and re-fetches the aggregate.
    /// Returns None once the feed is closed; this is the loop a long-lived
    /// consumer runs.
    pub async fn refresh_on_change(
        &self,
        subscription: &mut Subscription,
    ) -> Result<Option<FetchStats>, AppError> {
        let Some(table) = subscription.changed().await else {
            return Ok(None);
        };
        info!("{:?} changed, re-fetching", table);
        let stats = self.fetch_all().await?;
        Ok(Some(stats))
    }

    pub fn export_document(&self) -> Result<String, AppError> {
        export_document(&self.data())
    }

    /// Imports a catalog document: shape is validated, referential integrity
    /// is not. Every course and edge is written through to the backend.
    pub async fn import_document(&self, text: &str) -> Result<(), AppError> {
        self.require_auth()?;
        let doc = parse_import_document(text)?;

        for course in &doc.courses {
            course.validate()?;
        }
        for edge in &doc.prerequisites {
            edge.validate()?;
        }

        for course in &doc.courses {
            self.backend
                .upsert_course(&CourseRow::from_course(course))
                .await?;
            self.backend.delete_weekly_slots(&course.id).await?;
            if !course.slots.is_empty() {
                self.backend
                    .insert_weekly_slots(&WeeklySlotRow::from_course(course))
                    .await?;
            }
        }
        for edge in &doc.prerequisites {
            self.backend
                .insert_prerequisite(&PrerequisiteRow::from_edge(edge))
                .await?;
        }

        let completed = self.data().completed.clone();
        let data = CurriculumData {
            courses: doc.courses,
            prerequisites: doc.prerequisites,
            completed,
        };
        if let Err(e) = cache::save_catalog(&self.cache, &data).await {
            warn!("failed to write catalog snapshot: {}", e);
        }
        *self.current.write().unwrap() = Arc::new(data);
        Ok(())
    }

    async fn save_catalog_snapshot(&self) {
        let data = self.data();
        if let Err(e) = cache::save_catalog(&self.cache, &data).await {
            warn!("failed to write catalog snapshot: {}", e);
        }
    }
}
