//! Dimension scoring
//!
//! Blends the declarative signal (tag weights of chosen options) with a motor
//! adjustment derived from interaction timing, and scores cognitive answers.
//!
//! Scoring is a pure function of its inputs: no clock, no randomness, so a
//! session can be re-scored from its stored answers at any time.
//!
//! Formula per dimension:
//! ```text
//! raw   = declarative_avg * 0.7 + (0.5 + motor_adjustment) * 0.3
//! score = round(raw * 100), clamped to [0, 100]
//! ```

use crate::config::{CognitiveRules, MotorFeature, ScoringConfig};
use crate::types::{Answer, CognitiveAnswer, ScoreMap, COGNITIVE_KEY};

/// Aggregate motor features across all answers of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorSummary {
    pub answer_count: usize,
    pub mean_decision_time_sec: f64,
    pub mean_hover_changes: f64,
    pub mean_unique_hovers: f64,
    pub mean_first_move_ms: f64,
    pub mean_path_complexity: f64,
}

impl MotorSummary {
    /// Summarize answers
    ///
    /// Every mean of an empty answer list is 0, and the heuristics still
    /// evaluate against those zeros.
    pub fn from_answers(answers: &[Answer]) -> Self {
        Self {
            answer_count: answers.len(),
            mean_decision_time_sec: mean(answers.iter().map(|a| a.decision_time_sec)),
            mean_hover_changes: mean(answers.iter().map(|a| a.hover_changes as f64)),
            mean_unique_hovers: mean(answers.iter().map(|a| a.unique_hovers as f64)),
            mean_first_move_ms: mean(answers.iter().map(|a| a.first_move_ms as f64)),
            mean_path_complexity: mean(answers.iter().map(|a| a.path_complexity as f64)),
        }
    }

    pub fn feature(&self, feature: MotorFeature) -> f64 {
        match feature {
            MotorFeature::MeanDecisionTime => self.mean_decision_time_sec,
            MotorFeature::MeanHoverChanges => self.mean_hover_changes,
            MotorFeature::MeanUniqueHovers => self.mean_unique_hovers,
            MotorFeature::MeanFirstMove => self.mean_first_move_ms,
            MotorFeature::MeanPathComplexity => self.mean_path_complexity,
        }
    }
}

/// Scoring engine parameterized by a [`ScoringConfig`]
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score every dimension (in the given order) plus `COGNITIVE`
    pub fn score<'a, I>(
        &self,
        dimension_codes: I,
        answers: &[Answer],
        cognitive_answers: &[CognitiveAnswer],
    ) -> ScoreMap
    where
        I: IntoIterator<Item = &'a str>,
    {
        let summary = MotorSummary::from_answers(answers);
        let mut scores = ScoreMap::new();

        for code in dimension_codes {
            scores.insert(code, self.dimension_score(code, answers, &summary));
        }
        scores.insert(
            COGNITIVE_KEY,
            cognitive_score(cognitive_answers, &self.config.cognitive),
        );

        scores
    }

    /// Blended 0-100 score of one dimension
    pub fn dimension_score(
        &self,
        code: &str,
        answers: &[Answer],
        summary: &MotorSummary,
    ) -> u8 {
        let declarative = declarative_average(code, answers, self.config.neutral_prior);
        let motor = motor_adjustment(code, summary, &self.config);
        let raw = declarative * self.config.declarative_weight
            + (0.5 + motor) * self.config.motor_weight;
        round_points(raw * 100.0)
    }
}

/// Score with the default configuration
pub fn compute_scores<'a, I>(
    dimension_codes: I,
    answers: &[Answer],
    cognitive_answers: &[CognitiveAnswer],
) -> ScoreMap
where
    I: IntoIterator<Item = &'a str>,
{
    ScoringEngine::default().score(dimension_codes, answers, cognitive_answers)
}

/// Mean tag weight for a dimension over the answers whose chosen option tags it
///
/// Untagged dimensions get the neutral prior rather than zero.
pub fn declarative_average(code: &str, answers: &[Answer], neutral_prior: f64) -> f64 {
    let weights: Vec<f64> = answers
        .iter()
        .filter_map(|a| a.tags.get(code).copied())
        .collect();

    if weights.is_empty() {
        return neutral_prior;
    }
    mean(weights.into_iter()).clamp(0.0, 1.0)
}

/// Signed motor correction for a dimension
///
/// Sums every rule registered for the dimension and clamps the total to
/// `±max_motor_adjustment`.
pub fn motor_adjustment(code: &str, summary: &MotorSummary, config: &ScoringConfig) -> f64 {
    let total: f64 = config
        .rules_for(code)
        .map(|rule| rule.evaluate(summary.feature(rule.feature)))
        .sum();
    total.clamp(-config.max_motor_adjustment, config.max_motor_adjustment)
}

/// Cognitive score: accuracy plus a bonus for fast correct answers and a
/// penalty for impulsive wrong ones
pub fn cognitive_score(answers: &[CognitiveAnswer], rules: &CognitiveRules) -> u8 {
    if answers.is_empty() {
        return 0;
    }

    let mut correct = 0usize;
    let mut adjustment = 0.0;
    for answer in answers {
        if answer.correct {
            correct += 1;
            if answer.decision_time_sec < rules.fast_correct_sec {
                adjustment += rules.fast_correct_bonus;
            }
        } else if answer.decision_time_sec < rules.impulsive_wrong_sec {
            adjustment -= rules.impulsive_wrong_penalty;
        }
    }

    let base = correct as f64 / answers.len() as f64 * 100.0;
    round_points(base + adjustment)
}

/// Round a 0-100 value half away from zero and clamp it
///
/// The value is first snapped to 1e-9 so float noise cannot pull an exact
/// half (0.755 * 100 evaluates to 75.49999999999999) below the boundary.
pub fn round_points(points: f64) -> u8 {
    let snapped = (points * 1e9).round() / 1e9;
    snapped.round().clamp(0.0, 100.0) as u8
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagWeights;
    use pretty_assertions::assert_eq;

    const CODES: [&str; 4] = ["VD", "TA", "SE", "CP"];

    fn answer(tags: &[(&str, f64)], decision_time_sec: f64) -> Answer {
        let tags: TagWeights = tags.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Answer {
            scenario_id: 1,
            choice: 0,
            tags,
            decision_time_sec,
            first_move_ms: 1500,
            hover_changes: 3,
            move_count: 40,
            path_complexity: 2,
            unique_hovers: 2,
            hover_sequence: vec![],
            option_dwell_ms: vec![0, 0, 0, 0],
            path_points: 40,
        }
    }

    fn cog(correct: bool, decision_time_sec: f64) -> CognitiveAnswer {
        CognitiveAnswer {
            question_id: "C1".to_string(),
            choice: 0,
            decision_time_sec,
            correct,
        }
    }

    #[test]
    fn test_fast_velocity_answers_score_76() {
        let answers = vec![answer(&[("VD", 0.8)], 3.0), answer(&[("VD", 0.8)], 3.0)];
        let scores = compute_scores(CODES, &answers, &[]);
        assert_eq!(scores.get("VD"), Some(76));
    }

    #[test]
    fn test_untagged_dimension_without_heuristic_scores_50() {
        let answers = vec![answer(&[("VD", 0.8)], 3.0)];
        let scores = compute_scores(CODES, &answers, &[]);
        assert_eq!(scores.get("CP"), Some(50));
    }

    #[test]
    fn test_no_answers_still_fires_motor_heuristics() {
        // Zero means: fast decisions, no hovering, instant first move.
        let scores = compute_scores(["VD", "TA", "SE", "LC", "CP"], &[], &[]);
        assert_eq!(scores.get("VD"), Some(55));
        assert_eq!(scores.get("TA"), Some(53));
        assert_eq!(scores.get("SE"), Some(47));
        assert_eq!(scores.get("LC"), Some(53));
        assert_eq!(scores.get("CP"), Some(50));
        assert_eq!(scores.cognitive(), Some(0));
    }

    #[test]
    fn test_empty_summary_is_all_zero() {
        let summary = MotorSummary::from_answers(&[]);
        assert_eq!(summary.answer_count, 0);
        assert_eq!(summary.mean_decision_time_sec, 0.0);
        assert_eq!(summary.mean_first_move_ms, 0.0);
        assert_eq!(motor_adjustment("VD", &summary, &ScoringConfig::default()), 0.15);
    }

    #[test]
    fn test_cognitive_fast_correct_and_impulsive_wrong() {
        let scores = compute_scores(CODES, &[], &[cog(true, 5.0), cog(false, 2.0)]);
        assert_eq!(scores.cognitive(), Some(49));
    }

    #[test]
    fn test_cognitive_slow_answers_have_no_adjustment() {
        let rules = CognitiveRules::default();
        assert_eq!(cognitive_score(&[cog(true, 9.0), cog(false, 6.0)], &rules), 50);
    }

    #[test]
    fn test_cognitive_score_clamped() {
        let rules = CognitiveRules::default();
        let all_fast_correct: Vec<_> = (0..8).map(|_| cog(true, 1.0)).collect();
        assert_eq!(cognitive_score(&all_fast_correct, &rules), 100);

        let all_impulsive: Vec<_> = (0..8).map(|_| cog(false, 1.0)).collect();
        assert_eq!(cognitive_score(&all_impulsive, &rules), 0);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let answers = vec![
            answer(&[("VD", 0.7), ("TA", 0.3)], 6.2),
            answer(&[("SE", 0.9)], 11.0),
            answer(&[("TA", 0.6)], 18.5),
        ];
        let cognitive = vec![cog(true, 7.0), cog(false, 12.0)];
        let first = compute_scores(CODES, &answers, &cognitive);
        let second = compute_scores(CODES, &answers, &cognitive);
        assert_eq!(first, second);
    }

    #[test]
    fn test_score_order_follows_dimension_order() {
        let scores = compute_scores(["SE", "VD", "TA"], &[], &[]);
        let codes: Vec<&str> = scores.codes().collect();
        assert_eq!(codes, vec!["SE", "VD", "TA", COGNITIVE_KEY]);
    }

    #[test]
    fn test_slow_decisions_pull_velocity_down() {
        let answers = vec![answer(&[("VD", 0.5)], 20.0)];
        // 0.5 * 0.7 + 0.35 * 0.3 = 0.455
        assert_eq!(compute_scores(["VD"], &answers, &[]).get("VD"), Some(46));
    }

    #[test]
    fn test_exploration_rules() {
        let config = ScoringConfig::default();
        let mut summary = MotorSummary::from_answers(&[answer(&[], 10.0)]);

        summary.mean_unique_hovers = 4.0;
        assert_eq!(motor_adjustment("SE", &summary, &config), 0.2);
        summary.mean_unique_hovers = 1.0;
        assert_eq!(motor_adjustment("SE", &summary, &config), -0.1);
        summary.mean_unique_hovers = 2.5;
        assert_eq!(motor_adjustment("SE", &summary, &config), 0.0);
    }

    #[test]
    fn test_locus_and_ambiguity_rules() {
        let config = ScoringConfig::default();
        let mut summary = MotorSummary::from_answers(&[answer(&[], 10.0)]);
        assert_eq!(motor_adjustment("LC", &summary, &config), 0.0);
        assert_eq!(motor_adjustment("TA", &summary, &config), 0.0);

        summary.mean_first_move_ms = 400.0;
        summary.mean_hover_changes = 1.0;
        assert_eq!(motor_adjustment("LC", &summary, &config), 0.1);
        assert_eq!(motor_adjustment("TA", &summary, &config), 0.1);
    }

    #[test]
    fn test_dimension_without_rule_has_zero_adjustment() {
        let config = ScoringConfig::default();
        let summary = MotorSummary::from_answers(&[answer(&[], 1.0)]);
        assert_eq!(motor_adjustment("CP", &summary, &config), 0.0);
    }

    #[test]
    fn test_stacked_rules_clamped_to_bound() {
        let mut config = ScoringConfig::default();
        let extra = config.motor_rules[0].clone();
        config.motor_rules.push(extra);
        let summary = MotorSummary::from_answers(&[answer(&[], 1.0)]);
        assert_eq!(motor_adjustment("VD", &summary, &config), 0.2);
    }

    #[test]
    fn test_declarative_average_uses_only_tagged_answers() {
        let answers = vec![
            answer(&[("VD", 0.2)], 6.0),
            answer(&[("TA", 0.9)], 6.0),
            answer(&[("VD", 0.6)], 6.0),
        ];
        assert!((declarative_average("VD", &answers, 0.5) - 0.4).abs() < 1e-9);
        assert_eq!(declarative_average("PF", &answers, 0.5), 0.5);
    }

    #[test]
    fn test_scores_stay_in_range_for_extreme_tags() {
        let answers = vec![answer(&[("VD", 1.0)], 0.5), answer(&[("TA", 0.0)], 30.0)];
        let scores = compute_scores(CODES, &answers, &[]);
        for (_, score) in scores.iter() {
            assert!(score <= 100);
        }
        assert_eq!(scores.get("VD"), Some(81));
    }

    #[test]
    fn test_round_points_boundaries() {
        assert_eq!(round_points(75.49999999999999), 76);
        assert_eq!(round_points(75.4), 75);
        assert_eq!(round_points(-12.0), 0);
        assert_eq!(round_points(140.0), 100);
        assert_eq!(round_points(49.0), 49);
    }
}
