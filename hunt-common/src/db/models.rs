//! Database models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    pub team_id: Option<String>,
    pub team_join_seq: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: String,
    pub code: String,
    pub name: String,
    pub leader_id: String,
    pub points: i64,
}

impl Team {
    /// Leadership is derived from the team row, never stored on the user
    pub fn is_leader(&self, user_id: &str) -> bool {
        self.leader_id == user_id
    }
}

/// A team together with its members, oldest membership first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamWithMembers {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<User>,
}

impl TeamWithMembers {
    pub fn leader(&self) -> Option<&User> {
        self.members.iter().find(|m| self.team.is_leader(&m.id))
    }

    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestionGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_sequence: bool,
    pub number_of_questions: i64,
    pub phase: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: String,
    pub group_id: String,
    pub sequence_index: i64,
    pub prompt: String,
    pub answer_hash: String,
    pub hint: Option<String>,
    pub hint_cost: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgressRecord {
    pub team_id: String,
    pub question_group_id: String,
    pub completed_count: i64,
}

/// A batch of questions as supplied by the question feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGroupInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_sequence: bool,
    pub number_of_questions: u32,
    #[serde(default = "default_phase")]
    pub phase: u32,
    pub questions: Vec<QuestionInput>,
}

fn default_phase() -> u32 {
    1
}

/// One question with its plaintext answer, prior to hashing
#[derive(Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    #[serde(alias = "question")]
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub hint_cost: Option<u32>,
}

// Keeps plaintext answers out of logs
impl std::fmt::Debug for QuestionInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionInput")
            .field("prompt", &self.prompt)
            .field("answer", &"<redacted>")
            .field("hint", &self.hint)
            .field("hint_cost", &self.hint_cost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_input_debug_redacts_answer() {
        let input = QuestionInput {
            prompt: "Capital of France?".to_string(),
            answer: "PARIS".to_string(),
            hint: None,
            hint_cost: None,
        };
        let debug = format!("{:?}", input);
        assert!(debug.contains("Capital of France?"));
        assert!(!debug.contains("PARIS"));
    }

    #[test]
    fn test_group_input_accepts_question_alias() {
        let json = r#"{
            "name": "Round 1",
            "number_of_questions": 1,
            "questions": [{ "question": "2+2?", "answer": "4" }]
        }"#;
        let input: QuestionGroupInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.phase, 1);
        assert!(!input.is_sequence);
        assert_eq!(input.questions[0].prompt, "2+2?");
    }
}
