//! Engine configuration
//!
//! Every tunable threshold lives here as a named constant, grouped into
//! serde-loadable structs. Partial JSON files override only the fields they name.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Cross-product magnitude above which a path segment counts as a sharp turn
pub const PATH_TURN_THRESHOLD: f64 = 500.0;

/// Dwell of the pass-through transition stage
pub const TRANSITION_DWELL_MS: u64 = 2000;

/// Minimum length of the open-ended answer
pub const MIN_OPEN_ANSWER_CHARS: usize = 10;

/// Weight of the declarative component in the blend
pub const DECLARATIVE_WEIGHT: f64 = 0.7;

/// Weight of the motor component in the blend
pub const MOTOR_WEIGHT: f64 = 0.3;

/// Declarative average used for dimensions no answer tagged
pub const NEUTRAL_PRIOR: f64 = 0.5;

/// Bound on the summed motor adjustment of one dimension
pub const MAX_MOTOR_ADJUSTMENT: f64 = 0.2;

/// Mean decision time (seconds) below which decisions count as fast
pub const FAST_DECISION_SEC: f64 = 5.0;

/// Mean decision time (seconds) above which decisions count as slow
pub const SLOW_DECISION_SEC: f64 = 15.0;

/// Nudge applied to the velocity dimension for fast/slow decisions
pub const DECISION_SPEED_NUDGE: f64 = 0.15;

/// Mean hover changes below which the respondent counts as unhesitating
pub const LOW_HOVER_CHANGES: f64 = 2.0;

/// Mean unique hovers above which the respondent counts as exhaustive
pub const HIGH_UNIQUE_HOVERS: f64 = 3.0;

/// Mean unique hovers below which the respondent counts as satisficing
pub const LOW_UNIQUE_HOVERS: f64 = 2.0;

/// Mean first-move latency (ms) below which the respondent counts as proactive
pub const FAST_FIRST_MOVE_MS: f64 = 1000.0;

/// Cognitive answers correct under this many seconds earn a bonus
pub const FAST_CORRECT_SEC: f64 = 8.0;

/// Bonus points per fast correct cognitive answer
pub const FAST_CORRECT_BONUS: f64 = 2.0;

/// Cognitive answers wrong under this many seconds incur a penalty
pub const IMPULSIVE_WRONG_SEC: f64 = 4.0;

/// Penalty points per impulsive wrong cognitive answer
pub const IMPULSIVE_WRONG_PENALTY: f64 = 3.0;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub capture: CaptureConfig,
    pub flow: FlowConfig,
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config and validate it
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.capture.path_turn_threshold >= 0.0) {
            return Err(ConfigError::Invalid(
                "capture.path_turn_threshold must be non-negative".to_string(),
            ));
        }
        self.scoring.validate()
    }
}

/// Capture engine tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub path_turn_threshold: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            path_turn_threshold: PATH_TURN_THRESHOLD,
        }
    }
}

/// Flow controller tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub transition_dwell_ms: u64,
    pub min_open_answer_chars: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            transition_dwell_ms: TRANSITION_DWELL_MS,
            min_open_answer_chars: MIN_OPEN_ANSWER_CHARS,
        }
    }
}

/// Aggregate motor feature a heuristic is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorFeature {
    /// Mean decision time in seconds
    MeanDecisionTime,
    /// Mean hover-change count
    MeanHoverChanges,
    /// Mean distinct-options-hovered count
    MeanUniqueHovers,
    /// Mean first-move latency in milliseconds
    MeanFirstMove,
    /// Mean path complexity
    MeanPathComplexity,
}

/// Adjustment applied when a feature crosses a threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub threshold: f64,
    pub adjustment: f64,
}

/// Threshold heuristic for one dimension
///
/// `below` fires when the feature mean is strictly under its threshold,
/// `above` when strictly over. At most one of the two fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorRule {
    pub dimension: String,
    pub feature: MotorFeature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<Nudge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<Nudge>,
}

impl MotorRule {
    /// Thresholds must be non-negative, and `below` may not sit above `above`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (side, nudge) in [("below", self.below), ("above", self.above)] {
            if let Some(nudge) = nudge {
                if !(nudge.threshold >= 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "motor rule for {}: {} threshold must be non-negative (got {})",
                        self.dimension, side, nudge.threshold
                    )));
                }
            }
        }
        if let (Some(below), Some(above)) = (self.below, self.above) {
            if below.threshold > above.threshold {
                return Err(ConfigError::Invalid(format!(
                    "motor rule for {}: below threshold {} exceeds above threshold {}",
                    self.dimension, below.threshold, above.threshold
                )));
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, value: f64) -> f64 {
        if let Some(below) = self.below {
            if value < below.threshold {
                return below.adjustment;
            }
        }
        if let Some(above) = self.above {
            if value > above.threshold {
                return above.adjustment;
            }
        }
        0.0
    }
}

/// Speed bonus and impulsivity penalty for cognitive answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitiveRules {
    pub fast_correct_sec: f64,
    pub fast_correct_bonus: f64,
    pub impulsive_wrong_sec: f64,
    pub impulsive_wrong_penalty: f64,
}

impl Default for CognitiveRules {
    fn default() -> Self {
        Self {
            fast_correct_sec: FAST_CORRECT_SEC,
            fast_correct_bonus: FAST_CORRECT_BONUS,
            impulsive_wrong_sec: IMPULSIVE_WRONG_SEC,
            impulsive_wrong_penalty: IMPULSIVE_WRONG_PENALTY,
        }
    }
}

impl CognitiveRules {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("fast_correct_sec", self.fast_correct_sec),
            ("fast_correct_bonus", self.fast_correct_bonus),
            ("impulsive_wrong_sec", self.impulsive_wrong_sec),
            ("impulsive_wrong_penalty", self.impulsive_wrong_penalty),
        ];
        for (name, value) in fields {
            if !(value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "scoring.cognitive.{} must be non-negative (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Scoring engine tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub declarative_weight: f64,
    pub motor_weight: f64,
    pub neutral_prior: f64,
    pub max_motor_adjustment: f64,
    pub motor_rules: Vec<MotorRule>,
    pub cognitive: CognitiveRules,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            declarative_weight: DECLARATIVE_WEIGHT,
            motor_weight: MOTOR_WEIGHT,
            neutral_prior: NEUTRAL_PRIOR,
            max_motor_adjustment: MAX_MOTOR_ADJUSTMENT,
            motor_rules: default_motor_rules(),
            cognitive: CognitiveRules::default(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.declarative_weight < 0.0 || self.motor_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "scoring weights must be non-negative".to_string(),
            ));
        }
        if (self.declarative_weight + self.motor_weight - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "scoring weights must sum to 1 (got {} + {})",
                self.declarative_weight, self.motor_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.neutral_prior) {
            return Err(ConfigError::Invalid(
                "scoring.neutral_prior must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=0.5).contains(&self.max_motor_adjustment) {
            return Err(ConfigError::Invalid(
                "scoring.max_motor_adjustment must be within [0, 0.5]".to_string(),
            ));
        }
        self.cognitive.validate()?;
        for rule in &self.motor_rules {
            rule.validate()?;
        }
        Ok(())
    }

    /// Rules registered for a dimension, in declaration order
    pub fn rules_for<'a>(&'a self, dimension: &'a str) -> impl Iterator<Item = &'a MotorRule> {
        self.motor_rules
            .iter()
            .filter(move |rule| rule.dimension == dimension)
    }
}

/// Heuristics for the velocity, ambiguity, exploration and locus dimensions
pub fn default_motor_rules() -> Vec<MotorRule> {
    vec![
        MotorRule {
            dimension: "VD".to_string(),
            feature: MotorFeature::MeanDecisionTime,
            below: Some(Nudge {
                threshold: FAST_DECISION_SEC,
                adjustment: DECISION_SPEED_NUDGE,
            }),
            above: Some(Nudge {
                threshold: SLOW_DECISION_SEC,
                adjustment: -DECISION_SPEED_NUDGE,
            }),
        },
        MotorRule {
            dimension: "TA".to_string(),
            feature: MotorFeature::MeanHoverChanges,
            below: Some(Nudge {
                threshold: LOW_HOVER_CHANGES,
                adjustment: 0.1,
            }),
            above: None,
        },
        MotorRule {
            dimension: "SE".to_string(),
            feature: MotorFeature::MeanUniqueHovers,
            below: Some(Nudge {
                threshold: LOW_UNIQUE_HOVERS,
                adjustment: -0.1,
            }),
            above: Some(Nudge {
                threshold: HIGH_UNIQUE_HOVERS,
                adjustment: 0.2,
            }),
        },
        MotorRule {
            dimension: "LC".to_string(),
            feature: MotorFeature::MeanFirstMove,
            below: Some(Nudge {
                threshold: FAST_FIRST_MOVE_MS,
                adjustment: 0.1,
            }),
            above: None,
        },
    ]
}
