use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Course;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Hard,
    Corequisite,
    Flexible,
}

impl RelationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hard" => Some(RelationKind::Hard),
            "corequisite" => Some(RelationKind::Corequisite),
            "flexible" => Some(RelationKind::Flexible),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Hard => "hard",
            RelationKind::Corequisite => "corequisite",
            RelationKind::Flexible => "flexible",
        }
    }
}

/// Directed prerequisite edge: `from` must be taken before (or, for
/// co-requisites, alongside) `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
}

impl Prerequisite {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.from == self.to {
            return Err(AppError::Validation(format!(
                "course {} cannot be its own prerequisite",
                self.from
            )));
        }
        Ok(())
    }

    /// Form-boundary check only: stored edges may violate period ordering
    /// (stale data), so this is never applied when loading.
    pub fn validate_against_catalog(&self, courses: &[Course]) -> Result<(), AppError> {
        self.validate()?;
        let from = courses.iter().find(|c| c.id == self.from);
        let to = courses.iter().find(|c| c.id == self.to);
        if let (Some(from), Some(to)) = (from, to) {
            if from.period >= to.period {
                return Err(AppError::Validation(format!(
                    "prerequisite {} -> {} goes backwards: period {} >= {}",
                    self.from, self.to, from.period, to.period
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseKind;

    fn course(id: &str, period: u32) -> Course {
        Course {
            id: id.to_string(),
            name: id.to_string(),
            period,
            row: 0,
            hours: "54h".to_string(),
            kind: CourseKind::Mandatory,
            credits: 4,
            professor: None,
            slots: Vec::new(),
        }
    }

    #[test]
    fn self_edge_is_rejected() {
        let edge = Prerequisite {
            from: "a".to_string(),
            to: "a".to_string(),
            kind: RelationKind::Hard,
        };
        assert!(edge.validate().is_err());
    }

    #[test]
    fn backwards_period_rejected_at_form_boundary() {
        let catalog = vec![course("a", 2), course("b", 1)];
        let edge = Prerequisite {
            from: "a".to_string(),
            to: "b".to_string(),
            kind: RelationKind::Hard,
        };
        assert!(edge.validate().is_ok());
        assert!(edge.validate_against_catalog(&catalog).is_err());
    }

    #[test]
    fn unresolvable_endpoints_pass_the_catalog_check() {
        let edge = Prerequisite {
            from: "x".to_string(),
            to: "y".to_string(),
            kind: RelationKind::Hard,
        };
        assert!(edge.validate_against_catalog(&[]).is_ok());
    }
}
