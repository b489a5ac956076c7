//! Questionnaire reference data
//!
//! Dimensions, phases of scenarios, cognitive questions, the cognitive schedule
//! and the open question. Loaded once, validated, and read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ReferenceError;
use crate::types::TagWeights;

const BUILTIN_REFERENCE: &str = include_str!("../data/reference.json");

/// One behavioral trait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Short code, e.g. `VD`
    pub code: String,
    pub name: String,
    pub short: String,
    pub description: String,
    /// Visual accent (hex color)
    pub color: String,
    /// Interpretation for low scores
    pub low: String,
    /// Interpretation for high scores
    pub high: String,
}

/// One answer choice of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOption {
    pub text: String,
    /// A-priori behavioral signature of choosing this option
    #[serde(default)]
    pub tags: TagWeights,
}

/// One situational multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: u32,
    pub context: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_text: Option<String>,
    /// Countdown shown to the respondent; never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_sec: Option<u32>,
    pub options: Vec<ScenarioOption>,
}

/// An ordered group of scenarios sharing a theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub description: String,
    pub scenarios: Vec<Scenario>,
}

/// A logic/reasoning item
///
/// The correct index stays inside the engine; callers rendering the question
/// receive a [`CognitivePrompt`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveQuestion {
    pub id: String,
    pub level: u8,
    pub context: String,
    pub prompt: String,
    pub options: Vec<String>,
    correct: usize,
    #[serde(default)]
    pub explanation: String,
}

impl CognitiveQuestion {
    pub fn new(
        id: impl Into<String>,
        level: u8,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: usize,
    ) -> Self {
        Self {
            id: id.into(),
            level,
            context: String::new(),
            prompt: prompt.into(),
            options,
            correct,
            explanation: String::new(),
        }
    }

    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct
    }

    /// Client-facing view without the correct index
    pub fn prompt_view(&self) -> CognitivePrompt {
        CognitivePrompt {
            id: self.id.clone(),
            level: self.level,
            context: self.context.clone(),
            prompt: self.prompt.clone(),
            options: self.options.clone(),
        }
    }
}

/// A cognitive question as shown to the respondent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CognitivePrompt {
    pub id: String,
    pub level: u8,
    pub context: String,
    pub prompt: String,
    pub options: Vec<String>,
}

/// Cognitive batch inserted after a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// 0-based index of the phase the batch follows
    pub after_phase: usize,
    /// Indices into the cognitive question list
    pub questions: Vec<usize>,
}

/// Mapping from "after phase N" to an ordered batch of cognitive questions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CognitiveSchedule(Vec<ScheduleEntry>);

impl CognitiveSchedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self(entries)
    }

    /// Batch to run after the given phase (empty when none is scheduled)
    pub fn batch_after(&self, phase_index: usize) -> &[usize] {
        self.0
            .iter()
            .find(|entry| entry.after_phase == phase_index)
            .map(|entry| entry.questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.0
    }

    pub fn total_questions(&self) -> usize {
        self.0.iter().map(|entry| entry.questions.len()).sum()
    }
}

/// The closing open-ended question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenQuestion {
    pub context: String,
    pub prompt: String,
    #[serde(default)]
    pub sub_text: String,
    #[serde(default)]
    pub placeholder: String,
}

/// Complete, immutable questionnaire definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// Dimensions in presentation order
    pub dimensions: Vec<Dimension>,
    pub phases: Vec<Phase>,
    pub cognitive: Vec<CognitiveQuestion>,
    #[serde(default)]
    pub schedule: CognitiveSchedule,
    #[serde(default)]
    pub open_question: OpenQuestion,
}

impl ReferenceData {
    /// The questionnaire bundled with the crate
    pub fn builtin() -> Result<Self, ReferenceError> {
        Self::from_json(BUILTIN_REFERENCE)
    }

    /// Parse and validate a reference data document
    pub fn from_json(json: &str) -> Result<Self, ReferenceError> {
        let data: ReferenceData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    pub fn dimension(&self, code: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.code == code)
    }

    pub fn dimension_codes(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.code.as_str())
    }

    pub fn scenario(&self, phase_index: usize, scenario_index: usize) -> Option<&Scenario> {
        self.phases.get(phase_index)?.scenarios.get(scenario_index)
    }

    pub fn scenario_count(&self) -> usize {
        self.phases.iter().map(|p| p.scenarios.len()).sum()
    }

    pub fn cognitive_question(&self, index: usize) -> Option<&CognitiveQuestion> {
        self.cognitive.get(index)
    }

    pub fn cognitive_by_id(&self, id: &str) -> Option<&CognitiveQuestion> {
        self.cognitive.iter().find(|q| q.id == id)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ReferenceError> {
        if self.dimensions.is_empty() {
            return invalid("at least one dimension is required");
        }
        let mut codes = HashSet::new();
        for dimension in &self.dimensions {
            if dimension.code.is_empty() {
                return invalid("dimension code must not be empty");
            }
            if !codes.insert(dimension.code.as_str()) {
                return invalid(format!("duplicate dimension code {}", dimension.code));
            }
        }

        if self.phases.is_empty() {
            return invalid("at least one phase is required");
        }
        let mut scenario_ids = HashSet::new();
        for (phase_index, phase) in self.phases.iter().enumerate() {
            if phase.scenarios.is_empty() {
                return invalid(format!("phase {} has no scenarios", phase_index));
            }
            for scenario in &phase.scenarios {
                if !scenario_ids.insert(scenario.id) {
                    return invalid(format!("duplicate scenario id {}", scenario.id));
                }
                if scenario.options.len() < 2 {
                    return invalid(format!("scenario {} needs at least 2 options", scenario.id));
                }
                for option in &scenario.options {
                    for (code, weight) in &option.tags {
                        if !codes.contains(code.as_str()) {
                            return invalid(format!(
                                "scenario {} tags unknown dimension {}",
                                scenario.id, code
                            ));
                        }
                        if !(0.0..=1.0).contains(weight) {
                            return invalid(format!(
                                "scenario {} tag {} weight {} outside [0, 1]",
                                scenario.id, code, weight
                            ));
                        }
                    }
                }
            }
        }

        let mut question_ids = HashSet::new();
        for question in &self.cognitive {
            if !question_ids.insert(question.id.as_str()) {
                return invalid(format!("duplicate cognitive question id {}", question.id));
            }
            if question.correct >= question.options.len() {
                return invalid(format!(
                    "cognitive question {} correct index {} out of range",
                    question.id, question.correct
                ));
            }
        }

        let mut scheduled_phases = HashSet::new();
        for entry in self.schedule.entries() {
            if entry.after_phase >= self.phases.len() {
                return invalid(format!(
                    "schedule references unknown phase {}",
                    entry.after_phase
                ));
            }
            if !scheduled_phases.insert(entry.after_phase) {
                return invalid(format!(
                    "phase {} is scheduled more than once",
                    entry.after_phase
                ));
            }
            if let Some(bad) = entry.questions.iter().find(|&&q| q >= self.cognitive.len()) {
                return invalid(format!(
                    "schedule references unknown cognitive question {}",
                    bad
                ));
            }
        }

        Ok(())
    }
}

fn invalid<T>(message: impl Into<String>) -> Result<T, ReferenceError> {
    Err(ReferenceError::Invalid(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r##"{
            "dimensions": [
                { "code": "VD", "name": "Velocity", "short": "V", "description": "",
                  "color": "#fff", "low": "slow", "high": "fast" }
            ],
            "phases": [
                { "name": "P", "description": "", "scenarios": [
                    { "id": 1, "context": "", "prompt": "Q1", "options": [
                        { "text": "A", "tags": { "VD": 0.8 } },
                        { "text": "B" }
                    ] }
                ] }
            ],
            "cognitive": [
                { "id": "C1", "level": 1, "context": "", "prompt": "?",
                  "options": ["x", "y"], "correct": 1 }
            ],
            "schedule": [ { "after_phase": 0, "questions": [0] } ]
        }"##
    }

    #[test]
    fn test_builtin_reference_is_valid() {
        let data = ReferenceData::builtin().unwrap();
        assert_eq!(data.dimensions.len(), 8);
        assert_eq!(data.phases.len(), 4);
        assert_eq!(data.scenario_count(), 16);
        assert_eq!(data.cognitive.len(), 8);
        assert_eq!(data.schedule.total_questions(), 8);

        let codes: Vec<&str> = data.dimension_codes().collect();
        assert_eq!(codes, vec!["VD", "TA", "PA", "RS", "PF", "SE", "LC", "CP"]);
    }

    #[test]
    fn test_builtin_time_pressure_hint() {
        let data = ReferenceData::builtin().unwrap();
        let scenario = data.scenario(0, 3).unwrap();
        assert_eq!(scenario.id, 4);
        assert_eq!(scenario.time_limit_sec, Some(15));
    }

    #[test]
    fn test_minimal_reference_parses() {
        let data = ReferenceData::from_json(minimal_json()).unwrap();
        assert_eq!(data.schedule.batch_after(0), &[0]);
        assert!(data.schedule.batch_after(1).is_empty());
        assert!(data.scenario(0, 0).unwrap().options[1].tags.is_empty());
        assert_eq!(data.open_question, OpenQuestion::default());
    }

    #[test]
    fn test_prompt_view_hides_correct_index() {
        let data = ReferenceData::builtin().unwrap();
        let question = data.cognitive_question(0).unwrap();
        assert!(question.is_correct(2));
        assert!(!question.is_correct(0));

        let json = serde_json::to_value(question.prompt_view()).unwrap();
        assert!(json.get("correct").is_none());
        assert_eq!(json["id"], "C1");
    }

    #[test]
    fn test_unknown_tag_dimension_rejected() {
        let json = minimal_json().replace(r#""VD": 0.8"#, r#""XX": 0.8"#);
        assert!(matches!(
            ReferenceData::from_json(&json),
            Err(ReferenceError::Invalid(_))
        ));
    }

    #[test]
    fn test_tag_weight_out_of_range_rejected() {
        let json = minimal_json().replace(r#""VD": 0.8"#, r#""VD": 1.5"#);
        assert!(ReferenceData::from_json(&json).is_err());
    }

    #[test]
    fn test_correct_index_out_of_range_rejected() {
        let json = minimal_json().replace(r#""correct": 1"#, r#""correct": 5"#);
        assert!(ReferenceData::from_json(&json).is_err());
    }

    #[test]
    fn test_schedule_with_unknown_question_rejected() {
        let json = minimal_json().replace(r#""questions": [0]"#, r#""questions": [0, 3]"#);
        assert!(ReferenceData::from_json(&json).is_err());
    }

    #[test]
    fn test_schedule_with_unknown_phase_rejected() {
        let json = minimal_json().replace(r#""after_phase": 0"#, r#""after_phase": 2"#);
        assert!(ReferenceData::from_json(&json).is_err());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            ReferenceData::from_json("not json"),
            Err(ReferenceError::Parse(_))
        ));
    }
}
