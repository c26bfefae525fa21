use serde::{Deserialize, Serialize};

/// Identifier of an agent-side user on the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An agent-side user who may author outbound messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

impl User {
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_joins_and_trims() {
        let mut user = User {
            id: UserId(3),
            email: "bob@example.com".to_string(),
            first_name: "Bob".to_string(),
            last_name: "McFlows".to_string(),
            avatar: None,
        };
        assert_eq!(user.name(), "Bob McFlows");

        user.last_name = String::new();
        assert_eq!(user.name(), "Bob");
    }
}
