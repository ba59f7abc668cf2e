use serde::{Deserialize, Serialize};

use crate::models::{Course, CourseKind, MeetingSlot, Prerequisite, RelationKind, Weekday,
    MAX_WEEKLY_SLOTS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRow {
    pub id: String,
    pub name: String,
    pub period: i64,
    pub row: i64,
    pub hours: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub credits: i64,
    #[serde(default)]
    pub professor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl CourseRow {
    pub fn from_course(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            name: course.name.clone(),
            period: course.period as i64,
            row: course.row as i64,
            hours: course.hours.clone(),
            kind: kind_to_str(course.kind).to_string(),
            credits: course.credits as i64,
            professor: course.professor.clone(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Slots are joined on afterwards from the weekly_slots table.
    /// Returns None for rows with an unknown type, which callers skip with a
    /// warning rather than failing the whole fetch.
    pub fn into_course(self) -> Option<Course> {
        let kind = parse_kind(&self.kind)?;
        Some(Course {
            id: self.id,
            name: self.name,
            period: self.period.max(1) as u32,
            row: self.row as i32,
            hours: self.hours,
            kind,
            credits: self.credits as i32,
            professor: self.professor,
            slots: Vec::new(),
        })
    }
}

fn parse_kind(s: &str) -> Option<CourseKind> {
    match s.to_ascii_lowercase().as_str() {
        "mandatory" => Some(CourseKind::Mandatory),
        "elective" => Some(CourseKind::Elective),
        "optional" => Some(CourseKind::Optional),
        "extracurricular" => Some(CourseKind::Extracurricular),
        _ => None,
    }
}

fn kind_to_str(kind: CourseKind) -> &'static str {
    match kind {
        CourseKind::Mandatory => "mandatory",
        CourseKind::Elective => "elective",
        CourseKind::Optional => "optional",
        CourseKind::Extracurricular => "extracurricular",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisiteRow {
    pub from: String,
    pub to: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl PrerequisiteRow {
    pub fn from_edge(edge: &Prerequisite) -> Self {
        Self {
            from: edge.from.clone(),
            to: edge.to.clone(),
            kind: edge.kind.as_str().to_string(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn into_edge(self) -> Option<Prerequisite> {
        Some(Prerequisite {
            from: self.from,
            to: self.to,
            kind: RelationKind::parse(&self.kind)?,
        })
    }
}

/// The weekly_slots table is fixed at three (day, time) column pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklySlotRow {
    pub course_id: String,
    #[serde(default)]
    pub day1: Option<String>,
    #[serde(default)]
    pub time1: Option<String>,
    #[serde(default)]
    pub day2: Option<String>,
    #[serde(default)]
    pub time2: Option<String>,
    #[serde(default)]
    pub day3: Option<String>,
    #[serde(default)]
    pub time3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl WeeklySlotRow {
    /// Slots past the third are silently dropped; validation upstream is
    /// expected to have rejected them already.
    pub fn from_course(course: &Course) -> Self {
        let mut row = Self {
            course_id: course.id.clone(),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        let mut slots = course.slots.iter().take(MAX_WEEKLY_SLOTS);
        if let Some(s) = slots.next() {
            row.day1 = Some(s.day.as_str().to_string());
            row.time1 = Some(s.time.clone());
        }
        if let Some(s) = slots.next() {
            row.day2 = Some(s.day.as_str().to_string());
            row.time2 = Some(s.time.clone());
        }
        if let Some(s) = slots.next() {
            row.day3 = Some(s.day.as_str().to_string());
            row.time3 = Some(s.time.clone());
        }
        row
    }

    /// Pairs with an unparseable day or a missing half are dropped.
    pub fn slots(&self) -> Vec<MeetingSlot> {
        let pairs = [
            (&self.day1, &self.time1),
            (&self.day2, &self.time2),
            (&self.day3, &self.time3),
        ];
        pairs
            .into_iter()
            .filter_map(|(day, time)| {
                let day = Weekday::parse(day.as_deref()?)?;
                let time = time.clone()?;
                Some(MeetingSlot { day, time })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedRow {
    pub course_id: String,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_row_round_trips_three_slots() {
        let row = WeeklySlotRow {
            course_id: "c1".to_string(),
            day1: Some("monday".to_string()),
            time1: Some("08:00".to_string()),
            day2: Some("wednesday".to_string()),
            time2: Some("10:00".to_string()),
            day3: None,
            time3: None,
            updated_at: None,
        };
        let slots = row.slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].day, Weekday::Monday);
        assert_eq!(slots[1].time, "10:00");
    }

    #[test]
    fn slot_row_drops_unparseable_day() {
        let row = WeeklySlotRow {
            course_id: "c1".to_string(),
            day1: Some("someday".to_string()),
            time1: Some("08:00".to_string()),
            ..Default::default()
        };
        assert!(row.slots().is_empty());
    }

    #[test]
    fn unknown_course_type_is_skipped() {
        let row = CourseRow {
            id: "c1".to_string(),
            name: "X".to_string(),
            period: 1,
            row: 0,
            hours: "54h".to_string(),
            kind: "mystery".to_string(),
            credits: 4,
            professor: None,
            updated_at: None,
        };
        assert!(row.into_course().is_none());
    }
}
