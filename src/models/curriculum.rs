use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Course, Prerequisite};

/// The aggregate the UI works from. Rebuilt whole on every fetch and swapped
/// in as one unit; never mutated piecemeal by readers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurriculumData {
    pub courses: Vec<Course>,
    pub prerequisites: Vec<Prerequisite>,
    /// Completed course ids for the current subject.
    pub completed: Vec<String>,
}

impl CurriculumData {
    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }
}

/// Import/export document. Completion state is deliberately excluded: the
/// document describes the catalog, not any one subject's progress.
#[derive(Debug, Serialize, Deserialize)]
pub struct CurriculumDocument {
    pub courses: Vec<Course>,
    pub prerequisites: Vec<Prerequisite>,
}

pub fn export_document(data: &CurriculumData) -> Result<String, AppError> {
    let doc = CurriculumDocument {
        courses: data.courses.clone(),
        prerequisites: data.prerequisites.clone(),
    };
    serde_json::to_string_pretty(&doc)
        .map_err(|e| AppError::Validation(format!("failed to serialize document: {}", e)))
}

/// Accepts any document where `courses` and `prerequisites` are both present
/// and array-typed. Referential integrity is not checked: an edge whose
/// endpoints are missing from `courses` imports as a dangling edge.
pub fn parse_import_document(text: &str) -> Result<CurriculumDocument, AppError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| AppError::Validation(format!("document is not valid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| AppError::Validation("document must be a JSON object".to_string()))?;

    for key in ["courses", "prerequisites"] {
        match obj.get(key) {
            Some(v) if v.is_array() => {}
            Some(_) => {
                return Err(AppError::Validation(format!("{} must be an array", key)));
            }
            None => {
                return Err(AppError::Validation(format!("missing {} array", key)));
            }
        }
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("malformed document: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_rejects_missing_prerequisites_key() {
        let err = parse_import_document(r#"{"courses": []}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn import_rejects_non_array_courses() {
        let err = parse_import_document(r#"{"courses": 3, "prerequisites": []}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn import_accepts_dangling_edges() {
        // Only shape is validated, not referential integrity.
        let doc = parse_import_document(
            r#"{"courses": [], "prerequisites": [{"from": "X", "to": "Y", "kind": "hard"}]}"#,
        )
        .expect("shape-valid document must import");
        assert!(doc.courses.is_empty());
        assert_eq!(doc.prerequisites.len(), 1);
        assert_eq!(doc.prerequisites[0].from, "X");
    }

    #[test]
    fn export_omits_completion_state() {
        let data = CurriculumData {
            courses: Vec::new(),
            prerequisites: Vec::new(),
            completed: vec!["c1".to_string()],
        };
        let text = export_document(&data).unwrap();
        assert!(!text.contains("completed"));
    }
}
