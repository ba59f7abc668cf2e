use std::collections::HashSet;

use uuid::Uuid;

/// Who completion state belongs to. Authenticated subjects persist in the
/// backend; anonymous subjects live only as long as the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Authenticated { user_id: String },
    Anonymous { session_id: String },
}

impl Subject {
    pub fn anonymous() -> Self {
        Subject::Anonymous {
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Subject::Authenticated { .. })
    }

    pub fn id(&self) -> &str {
        match self {
            Subject::Authenticated { user_id } => user_id,
            Subject::Anonymous { session_id } => session_id,
        }
    }
}

/// Ephemeral per-session state. The anonymous completion set is never
/// written anywhere durable and is discarded on login, logout, or restart.
#[derive(Debug)]
pub struct SessionState {
    pub subject: Subject,
    pub anon_completed: HashSet<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            subject: Subject::anonymous(),
            anon_completed: HashSet::new(),
        }
    }

    pub fn login(&mut self, user_id: &str) {
        self.subject = Subject::Authenticated {
            user_id: user_id.to_string(),
        };
        self.anon_completed.clear();
    }

    pub fn logout(&mut self) {
        self.subject = Subject::anonymous();
        self.anon_completed.clear();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_discards_anonymous_completion() {
        let mut session = SessionState::new();
        session.anon_completed.insert("c1".to_string());
        session.login("u1");
        assert!(session.subject.is_authenticated());
        assert!(session.anon_completed.is_empty());
    }

    #[test]
    fn logout_starts_a_fresh_anonymous_session() {
        let mut session = SessionState::new();
        let first_id = session.subject.id().to_string();
        session.login("u1");
        session.logout();
        assert!(!session.subject.is_authenticated());
        assert_ne!(session.subject.id(), first_id);
    }
}
