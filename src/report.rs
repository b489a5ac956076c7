//! Profile report encoder
//!
//! Turns a session's score map into a self-describing report: producer
//! metadata, one reading per dimension with its interpretation, the cognitive
//! score and a summary of the underlying answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reference::ReferenceData;
use crate::types::{Answer, CognitiveAnswer, ScoreMap, SessionId};
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Scores above this read as the dimension's high pole
pub const HIGH_BAND_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    High,
}

impl Band {
    pub fn of(score: u8) -> Self {
        if score > HIGH_BAND_THRESHOLD {
            Band::High
        } else {
            Band::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionReading {
    pub code: String,
    pub name: String,
    pub score: u8,
    pub band: Band,
    /// Narrative for the band the score falls in
    pub interpretation: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSummary {
    pub scenario_answers: usize,
    pub cognitive_answers: usize,
    pub cognitive_correct: usize,
    /// Mean over scenario answers, 0 when there are none
    pub mean_decision_time_sec: f64,
    pub mean_first_move_ms: f64,
}

impl AnswerSummary {
    pub fn from_answers(answers: &[Answer], cognitive_answers: &[CognitiveAnswer]) -> Self {
        let n = answers.len();
        let mean = |sum: f64| if n == 0 { 0.0 } else { sum / n as f64 };
        Self {
            scenario_answers: n,
            cognitive_answers: cognitive_answers.len(),
            cognitive_correct: cognitive_answers.iter().filter(|a| a.correct).count(),
            mean_decision_time_sec: mean(answers.iter().map(|a| a.decision_time_sec).sum()),
            mean_first_move_ms: mean(answers.iter().map(|a| a.first_move_ms as f64).sum()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub report_version: String,
    pub producer: ReportProducer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub computed_at_utc: String,
    pub dimensions: Vec<DimensionReading>,
    pub cognitive_score: u8,
    pub summary: AnswerSummary,
}

/// Profile report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build a report at the current time
    pub fn encode(
        &self,
        reference: &ReferenceData,
        scores: &ScoreMap,
        answers: &[Answer],
        cognitive_answers: &[CognitiveAnswer],
        session_id: Option<&SessionId>,
    ) -> ProfileReport {
        self.encode_at(
            reference,
            scores,
            answers,
            cognitive_answers,
            session_id,
            Utc::now(),
        )
    }

    /// Build a report stamped with `computed_at`
    ///
    /// Dimensions follow reference order; codes missing from the score map
    /// are skipped.
    pub fn encode_at(
        &self,
        reference: &ReferenceData,
        scores: &ScoreMap,
        answers: &[Answer],
        cognitive_answers: &[CognitiveAnswer],
        session_id: Option<&SessionId>,
        computed_at: DateTime<Utc>,
    ) -> ProfileReport {
        let dimensions = reference
            .dimensions
            .iter()
            .filter_map(|dimension| {
                let score = scores.get(&dimension.code)?;
                let band = Band::of(score);
                let interpretation = match band {
                    Band::High => dimension.high.clone(),
                    Band::Low => dimension.low.clone(),
                };
                Some(DimensionReading {
                    code: dimension.code.clone(),
                    name: dimension.name.clone(),
                    score,
                    band,
                    interpretation,
                    color: dimension.color.clone(),
                })
            })
            .collect();

        ProfileReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: session_id.cloned(),
            computed_at_utc: computed_at.to_rfc3339(),
            dimensions,
            cognitive_score: scores.cognitive().unwrap_or(0),
            summary: AnswerSummary::from_answers(answers, cognitive_answers),
        }
    }
}
