//! Completion and eligibility derived from the current aggregate.

use std::collections::HashSet;

use crate::models::{Course, CurriculumData};

pub struct CompletionEngine<'a> {
    data: &'a CurriculumData,
    completed: HashSet<&'a str>,
}

impl<'a> CompletionEngine<'a> {
    pub fn new(data: &'a CurriculumData) -> Self {
        let completed = data.completed.iter().map(String::as_str).collect();
        Self { data, completed }
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// A course is eligible when every incoming edge has a completed source.
    /// Relation kind does not change the gating, only presentation color.
    pub fn is_eligible(&self, id: &str) -> bool {
        self.data
            .prerequisites
            .iter()
            .filter(|p| p.to == id)
            .all(|p| self.completed.contains(p.from.as_str()))
    }

    /// Share of credit-hours completed, in [0, 100]. Hour labels that do not
    /// parse count as zero; an empty catalog yields 0.
    pub fn completed_credit_percentage(&self) -> f64 {
        let total: f64 = self.data.courses.iter().map(Course::credit_hours).sum();
        if total == 0.0 {
            return 0.0;
        }
        let done: f64 = self
            .data
            .courses
            .iter()
            .filter(|c| self.completed.contains(c.id.as_str()))
            .map(Course::credit_hours)
            .sum();
        done / total * 100.0
    }

    /// Direct prerequisites of a course, resolved to catalog entries.
    /// Dangling edges (source not in the catalog) are skipped.
    pub fn ancestors(&self, id: &str) -> Vec<&'a Course> {
        self.data
            .prerequisites
            .iter()
            .filter(|p| p.to == id)
            .filter_map(|p| self.data.course(&p.from))
            .collect()
    }

    /// Direct dependents of a course. One hop, not a transitive closure.
    pub fn descendants(&self, id: &str) -> Vec<&'a Course> {
        self.data
            .prerequisites
            .iter()
            .filter(|p| p.from == id)
            .filter_map(|p| self.data.course(&p.to))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseKind, Prerequisite, RelationKind};

    fn course(id: &str, period: u32, hours: &str) -> Course {
        Course {
            id: id.to_string(),
            name: id.to_string(),
            period,
            row: 0,
            hours: hours.to_string(),
            kind: CourseKind::Mandatory,
            credits: 4,
            professor: None,
            slots: Vec::new(),
        }
    }

    fn edge(from: &str, to: &str, kind: RelationKind) -> Prerequisite {
        Prerequisite {
            from: from.to_string(),
            to: to.to_string(),
            kind,
        }
    }

    #[test]
    fn eligibility_requires_all_incoming_sources_completed() {
        let data = CurriculumData {
            courses: vec![course("a", 1, "54h"), course("b", 1, "54h"), course("c", 2, "54h")],
            prerequisites: vec![
                edge("a", "c", RelationKind::Hard),
                edge("b", "c", RelationKind::Flexible),
            ],
            completed: vec!["a".to_string()],
        };
        let engine = CompletionEngine::new(&data);
        assert!(!engine.is_eligible("c"));

        let data = CurriculumData {
            completed: vec!["a".to_string(), "b".to_string()],
            ..data
        };
        let engine = CompletionEngine::new(&data);
        assert!(engine.is_eligible("c"));
    }

    #[test]
    fn relation_kind_does_not_change_gating() {
        // A pending co-requisite blocks eligibility just like a hard edge.
        let data = CurriculumData {
            courses: vec![course("a", 1, "54h"), course("b", 1, "54h")],
            prerequisites: vec![edge("a", "b", RelationKind::Corequisite)],
            completed: Vec::new(),
        };
        let engine = CompletionEngine::new(&data);
        assert!(!engine.is_eligible("b"));
    }

    #[test]
    fn course_with_no_prerequisites_is_eligible() {
        let data = CurriculumData {
            courses: vec![course("a", 1, "54h")],
            prerequisites: Vec::new(),
            completed: Vec::new(),
        };
        assert!(CompletionEngine::new(&data).is_eligible("a"));
    }

    #[test]
    fn percentage_empty_catalog_is_zero() {
        let data = CurriculumData::default();
        assert_eq!(CompletionEngine::new(&data).completed_credit_percentage(), 0.0);
    }

    #[test]
    fn percentage_all_completed_is_hundred() {
        let data = CurriculumData {
            courses: vec![course("a", 1, "54h"), course("b", 1, "36h")],
            prerequisites: Vec::new(),
            completed: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            CompletionEngine::new(&data).completed_credit_percentage(),
            100.0
        );
    }

    #[test]
    fn percentage_weights_by_hour_label() {
        let data = CurriculumData {
            courses: vec![course("a", 1, "75h"), course("b", 1, "25h")],
            prerequisites: Vec::new(),
            completed: vec!["a".to_string()],
        };
        assert_eq!(
            CompletionEngine::new(&data).completed_credit_percentage(),
            75.0
        );
    }

    #[test]
    fn unparseable_hours_count_as_zero() {
        let data = CurriculumData {
            courses: vec![course("a", 1, "??"), course("b", 1, "50h")],
            prerequisites: Vec::new(),
            completed: vec!["b".to_string()],
        };
        assert_eq!(
            CompletionEngine::new(&data).completed_credit_percentage(),
            100.0
        );
    }

    #[test]
    fn toggle_restores_prior_percentage() {
        let mut data = CurriculumData {
            courses: vec![course("a", 1, "54h"), course("b", 1, "54h")],
            prerequisites: Vec::new(),
            completed: vec!["a".to_string()],
        };
        let before = CompletionEngine::new(&data).completed_credit_percentage();

        data.completed.push("b".to_string());
        data.completed.retain(|id| id != "b");

        let engine = CompletionEngine::new(&data);
        assert!(!engine.is_completed("b"));
        assert_eq!(engine.completed_credit_percentage(), before);
    }

    #[test]
    fn ancestors_skip_dangling_sources() {
        // Imported documents may carry edges whose endpoints are missing.
        let data = CurriculumData {
            courses: Vec::new(),
            prerequisites: vec![edge("X", "Y", RelationKind::Hard)],
            completed: Vec::new(),
        };
        assert!(CompletionEngine::new(&data).ancestors("Y").is_empty());
    }

    #[test]
    fn ancestors_and_descendants_are_one_hop() {
        let data = CurriculumData {
            courses: vec![course("a", 1, "54h"), course("b", 2, "54h"), course("c", 3, "54h")],
            prerequisites: vec![
                edge("a", "b", RelationKind::Hard),
                edge("b", "c", RelationKind::Hard),
            ],
            completed: Vec::new(),
        };
        let engine = CompletionEngine::new(&data);
        let ancestors: Vec<&str> = engine.ancestors("c").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ancestors, vec!["b"]);
        let descendants: Vec<&str> =
            engine.descendants("a").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(descendants, vec!["b"]);
    }
}
