//! Core data types
//!
//! Answer records produced by the capture engine, the session identifier and
//! the ordered score map produced by the scoring engine.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score map key for the synthetic cognitive score
pub const COGNITIVE_KEY: &str = "COGNITIVE";

/// Sparse mapping from dimension code to tag weight in [0, 1]
pub type TagWeights = IndexMap<String, f64>;

/// Opaque session identifier handed out by the session collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sampled pointer position, relative to question activation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    /// Milliseconds since the question became active
    pub elapsed_ms: u64,
}

/// An option entering hover focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverEvent {
    /// 0-based option index
    pub option: usize,
    /// Milliseconds since the question became active
    pub elapsed_ms: u64,
}

/// Behavioral answer to one scenario, with the motor features captured while deciding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Scenario identifier
    pub scenario_id: u32,
    /// 0-based index of the chosen option
    pub choice: usize,
    /// Tag weights of the chosen option, copied at answer time
    pub tags: TagWeights,
    /// Elapsed decision time in seconds
    pub decision_time_sec: f64,
    /// Latency of the first pointer movement (0 when the pointer never moved)
    pub first_move_ms: u64,
    /// Number of times the hovered option changed
    pub hover_changes: u32,
    /// Total pointer-move events
    pub move_count: u32,
    /// Number of sharp direction changes in the pointer path
    pub path_complexity: u32,
    /// Number of distinct options hovered
    pub unique_hovers: u32,
    /// Ordered hover-start events
    pub hover_sequence: Vec<HoverEvent>,
    /// Cumulative dwell per option in milliseconds
    pub option_dwell_ms: Vec<u64>,
    /// Number of pointer samples recorded
    pub path_points: u32,
}

/// Answer to one cognitive question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveAnswer {
    pub question_id: String,
    pub choice: usize,
    /// Elapsed decision time in seconds
    pub decision_time_sec: f64,
    /// Evaluated at commit time against the reference answer
    pub correct: bool,
}

/// Ordered map from dimension code (or `COGNITIVE`) to an integer score in [0, 100]
///
/// Iteration order is the order scores were inserted, which the scoring engine
/// keeps equal to the reference dimension order followed by `COGNITIVE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreMap(IndexMap<String, u8>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, score: u8) {
        self.0.insert(code.into(), score.min(100));
    }

    pub fn get(&self, code: &str) -> Option<u8> {
        self.0.get(code).copied()
    }

    pub fn cognitive(&self) -> Option<u8> {
        self.get(COGNITIVE_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_transparent() {
        let id = SessionId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn test_generated_session_ids_differ() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn test_score_map_keeps_insertion_order() {
        let mut scores = ScoreMap::new();
        scores.insert("VD", 76);
        scores.insert("TA", 50);
        scores.insert(COGNITIVE_KEY, 49);

        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"VD":76,"TA":50,"COGNITIVE":49}"#);

        let codes: Vec<&str> = scores.codes().collect();
        assert_eq!(codes, vec!["VD", "TA", "COGNITIVE"]);
        assert_eq!(scores.cognitive(), Some(49));
    }

    #[test]
    fn test_score_map_caps_at_100() {
        let mut scores = ScoreMap::new();
        scores.insert("VD", 250);
        assert_eq!(scores.get("VD"), Some(100));
    }

    #[test]
    fn test_cognitive_answer_deserialization() {
        let json = r#"{
            "question_id": "C1",
            "choice": 2,
            "decision_time_sec": 5.0,
            "correct": true
        }"#;

        let answer: CognitiveAnswer = serde_json::from_str(json).unwrap();
        assert_eq!(answer.question_id, "C1");
        assert_eq!(answer.choice, 2);
        assert!(answer.correct);
    }
}
