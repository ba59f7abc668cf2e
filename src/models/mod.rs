pub mod course;
pub mod curriculum;
pub mod prerequisite;

pub use course::{Course, CourseKind, MeetingSlot, Weekday, MAX_WEEKLY_SLOTS};
pub use curriculum::{export_document, parse_import_document, CurriculumData, CurriculumDocument};
pub use prerequisite::{Prerequisite, RelationKind};
