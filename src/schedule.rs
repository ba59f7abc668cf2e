//! Weekly schedule grid: at most one course per (weekday, time) slot.
//! In-memory only; rebuilt each session from the catalog plus user actions.

use std::collections::HashMap;

use crate::error::AppError;
use crate::models::{Course, CurriculumData, Weekday};

#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    slots: HashMap<(Weekday, String), String>,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupant(&self, day: Weekday, time: &str) -> Option<&str> {
        self.slots
            .get(&(day, time.to_string()))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Assigns the course to every one of its meeting slots, or to none: if
    /// any slot is already occupied the whole operation is rejected and the
    /// conflict names the occupying course.
    pub fn add_course(&mut self, course: &Course) -> Result<(), AppError> {
        for slot in &course.slots {
            if let Some(occupant) = self.occupant(slot.day, &slot.time) {
                return Err(AppError::Conflict(format!(
                    "{} {} is already taken by {}",
                    slot.day.as_str(),
                    slot.time,
                    occupant
                )));
            }
        }
        for slot in &course.slots {
            self.slots
                .insert((slot.day, slot.time.clone()), course.id.clone());
        }
        Ok(())
    }

    /// Clears every slot currently held by the course.
    pub fn remove_course(&mut self, course_id: &str) {
        self.slots.retain(|_, occupant| occupant != course_id);
    }

    /// Courses that can still be placed on the grid: completed courses are
    /// excluded entirely, as are courses with no declared meeting slots.
    pub fn candidates<'a>(&self, data: &'a CurriculumData) -> Vec<&'a Course> {
        data.courses
            .iter()
            .filter(|c| !c.slots.is_empty())
            .filter(|c| !data.completed.contains(&c.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseKind, MeetingSlot};

    fn course(id: &str, slots: &[(Weekday, &str)]) -> Course {
        Course {
            id: id.to_string(),
            name: id.to_string(),
            period: 1,
            row: 0,
            hours: "54h".to_string(),
            kind: CourseKind::Mandatory,
            credits: 4,
            professor: None,
            slots: slots
                .iter()
                .map(|(day, time)| MeetingSlot {
                    day: *day,
                    time: time.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn conflict_names_the_occupying_course() {
        let mut schedule = ScheduleBuilder::new();
        schedule
            .add_course(&course("algebra", &[(Weekday::Monday, "08:00")]))
            .expect("first course must fit");

        let err = schedule
            .add_course(&course("physics", &[(Weekday::Monday, "08:00")]))
            .unwrap_err();
        match err {
            AppError::Conflict(msg) => assert!(msg.contains("algebra")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn rejected_addition_leaves_schedule_unchanged() {
        let mut schedule = ScheduleBuilder::new();
        schedule
            .add_course(&course("algebra", &[(Weekday::Tuesday, "10:00")]))
            .unwrap();

        // Second slot collides, so the first must not be assigned either.
        let result = schedule.add_course(&course(
            "physics",
            &[(Weekday::Monday, "08:00"), (Weekday::Tuesday, "10:00")],
        ));
        assert!(result.is_err());
        assert_eq!(schedule.occupant(Weekday::Monday, "08:00"), None);
        assert_eq!(schedule.occupant(Weekday::Tuesday, "10:00"), Some("algebra"));
    }

    #[test]
    fn add_assigns_all_declared_slots() {
        let mut schedule = ScheduleBuilder::new();
        schedule
            .add_course(&course(
                "algebra",
                &[(Weekday::Monday, "08:00"), (Weekday::Wednesday, "08:00")],
            ))
            .unwrap();
        assert_eq!(schedule.occupant(Weekday::Monday, "08:00"), Some("algebra"));
        assert_eq!(
            schedule.occupant(Weekday::Wednesday, "08:00"),
            Some("algebra")
        );
    }

    #[test]
    fn remove_clears_every_slot_of_the_course() {
        let mut schedule = ScheduleBuilder::new();
        schedule
            .add_course(&course(
                "algebra",
                &[(Weekday::Monday, "08:00"), (Weekday::Wednesday, "08:00")],
            ))
            .unwrap();
        schedule.remove_course("algebra");
        assert!(schedule.is_empty());
    }

    #[test]
    fn completed_courses_are_not_candidates() {
        let data = CurriculumData {
            courses: vec![
                course("algebra", &[(Weekday::Monday, "08:00")]),
                course("physics", &[(Weekday::Tuesday, "08:00")]),
            ],
            prerequisites: Vec::new(),
            completed: vec!["algebra".to_string()],
        };
        let schedule = ScheduleBuilder::new();
        let ids: Vec<&str> = schedule
            .candidates(&data)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["physics"]);
    }
}
