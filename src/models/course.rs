use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Backend schema limit: the weekly_slots table has three (day, time) column pairs.
pub const MAX_WEEKLY_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "monday" | "mon" => Some(Weekday::Monday),
            "tuesday" | "tue" => Some(Weekday::Tuesday),
            "wednesday" | "wed" => Some(Weekday::Wednesday),
            "thursday" | "thu" => Some(Weekday::Thursday),
            "friday" | "fri" => Some(Weekday::Friday),
            "saturday" | "sat" => Some(Weekday::Saturday),
            "sunday" | "sun" => Some(Weekday::Sunday),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeetingSlot {
    pub day: Weekday,
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseKind {
    Mandatory,
    Elective,
    Optional,
    Extracurricular,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    /// Recommended semester index, 1-based.
    pub period: u32,
    /// Vertical position in the graph layout, not meaningful otherwise.
    pub row: i32,
    /// Free-text credit-hour label, e.g. "54h".
    pub hours: String,
    pub kind: CourseKind,
    pub credits: i32,
    #[serde(default)]
    pub professor: Option<String>,
    #[serde(default)]
    pub slots: Vec<MeetingSlot>,
}

impl Course {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::Validation("course id must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("course name must not be empty".to_string()));
        }
        if self.period < 1 {
            return Err(AppError::Validation(format!(
                "course {} has period {}, expected >= 1",
                self.id, self.period
            )));
        }
        if self.slots.len() > MAX_WEEKLY_SLOTS {
            return Err(AppError::Validation(format!(
                "course {} declares {} weekly slots, at most {} are supported",
                self.id,
                self.slots.len(),
                MAX_WEEKLY_SLOTS
            )));
        }
        Ok(())
    }

    /// Numeric credit-hours parsed from the free-text label ("54h" -> 54.0).
    /// Non-numeric or missing labels count as zero.
    pub fn credit_hours(&self) -> f64 {
        let digits: String = self
            .hours
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(0.0)
    }
}
