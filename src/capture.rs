//! Motor signal capture
//!
//! Instruments pointer movement and option hovering over the lifetime of one
//! active question, and turns them into the feature fields of an answer record.
//!
//! Lifecycle: [`MotorCapture::reset`] activates a question, event handlers
//! accumulate state, and one `capture_*` call commits it. Handlers are ignored
//! while no question is active and a second commit returns `None`.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

use crate::config::CaptureConfig;
use crate::reference::{CognitiveQuestion, Scenario};
use crate::types::{Answer, CognitiveAnswer, HoverEvent, PathPoint};

/// Motor features of one committed question
#[derive(Debug, Clone, PartialEq)]
pub struct MotorFeatures {
    pub decision_time_sec: f64,
    pub first_move_ms: u64,
    pub hover_changes: u32,
    pub move_count: u32,
    pub path_complexity: u32,
    pub unique_hovers: u32,
    pub hover_sequence: Vec<HoverEvent>,
    pub option_dwell_ms: Vec<u64>,
    pub path_points: u32,
}

/// Per-question pointer and hover instrumentation
#[derive(Debug, Clone)]
pub struct MotorCapture {
    config: CaptureConfig,
    active: bool,
    started_at: DateTime<Utc>,
    first_move_ms: Option<u64>,
    last_position: Option<(f64, f64)>,
    path: Vec<PathPoint>,
    hover_sequence: Vec<HoverEvent>,
    option_dwell_ms: Vec<u64>,
    hovered: Option<usize>,
    hover_started_at: Option<DateTime<Utc>>,
    hover_changes: u32,
    move_count: u32,
}

impl Default for MotorCapture {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}

impl MotorCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            active: false,
            started_at: DateTime::<Utc>::default(),
            first_move_ms: None,
            last_position: None,
            path: Vec::new(),
            hover_sequence: Vec::new(),
            option_dwell_ms: Vec::new(),
            hovered: None,
            hover_started_at: None,
            hover_changes: 0,
            move_count: 0,
        }
    }

    /// Activate a new question with `option_count` options, starting at `now`
    pub fn reset(&mut self, now: DateTime<Utc>, option_count: usize) {
        self.active = true;
        self.started_at = now;
        self.first_move_ms = None;
        self.last_position = None;
        self.path.clear();
        self.hover_sequence.clear();
        self.option_dwell_ms = vec![0; option_count];
        self.hovered = None;
        self.hover_started_at = None;
        self.hover_changes = 0;
        self.move_count = 0;
    }

    /// Whether a question is active and not yet committed
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_position(&self) -> Option<(f64, f64)> {
        self.last_position
    }

    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    pub fn on_pointer_move(&mut self, x: f64, y: f64, now: DateTime<Utc>) {
        if !self.active {
            return;
        }
        let elapsed_ms = self.elapsed_ms(now);
        self.move_count = self.move_count.saturating_add(1);
        if self.first_move_ms.is_none() {
            self.first_move_ms = Some(elapsed_ms);
        }
        self.path.push(PathPoint { x, y, elapsed_ms });
        self.last_position = Some((x, y));
    }

    pub fn on_hover_start(&mut self, option: usize, now: DateTime<Utc>) {
        if !self.active {
            return;
        }
        self.flush_dwell(now);
        if let Some(previous) = self.hovered {
            if previous != option {
                self.hover_changes = self.hover_changes.saturating_add(1);
            }
        }
        self.hover_sequence.push(HoverEvent {
            option,
            elapsed_ms: self.elapsed_ms(now),
        });
        self.hovered = Some(option);
        self.hover_started_at = Some(now);
    }

    /// Close the dwell of `option` if it is the one being tracked; otherwise a no-op
    pub fn on_hover_end(&mut self, option: usize, now: DateTime<Utc>) {
        if !self.active || self.hovered != Some(option) {
            return;
        }
        self.flush_dwell(now);
    }

    /// Commit a scenario answer
    pub fn capture_answer(
        &mut self,
        scenario: &Scenario,
        choice: usize,
        now: DateTime<Utc>,
    ) -> Option<Answer> {
        let features = self.finalize(now)?;
        let tags = scenario
            .options
            .get(choice)
            .map(|option| option.tags.clone())
            .unwrap_or_default();

        debug!(
            scenario_id = scenario.id,
            choice,
            decision_time_sec = features.decision_time_sec,
            path_complexity = features.path_complexity,
            "Captured scenario answer"
        );

        Some(Answer {
            scenario_id: scenario.id,
            choice,
            tags,
            decision_time_sec: features.decision_time_sec,
            first_move_ms: features.first_move_ms,
            hover_changes: features.hover_changes,
            move_count: features.move_count,
            path_complexity: features.path_complexity,
            unique_hovers: features.unique_hovers,
            hover_sequence: features.hover_sequence,
            option_dwell_ms: features.option_dwell_ms,
            path_points: features.path_points,
        })
    }

    /// Commit a cognitive answer, evaluating correctness against the reference
    pub fn capture_cognitive(
        &mut self,
        question: &CognitiveQuestion,
        choice: usize,
        now: DateTime<Utc>,
    ) -> Option<CognitiveAnswer> {
        let features = self.finalize(now)?;
        debug!(
            question_id = %question.id,
            choice,
            decision_time_sec = features.decision_time_sec,
            "Captured cognitive answer"
        );
        Some(CognitiveAnswer {
            question_id: question.id.clone(),
            choice,
            decision_time_sec: features.decision_time_sec,
            correct: question.is_correct(choice),
        })
    }

    /// Close the active question and derive its motor features
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<MotorFeatures> {
        if !self.active {
            return None;
        }
        self.flush_dwell(now);
        self.active = false;

        let decision_time_sec = self.elapsed_ms(now) as f64 / 1000.0;

        Some(MotorFeatures {
            decision_time_sec,
            first_move_ms: self.first_move_ms.unwrap_or(0),
            hover_changes: self.hover_changes,
            move_count: self.move_count,
            path_complexity: path_complexity(&self.path, self.config.path_turn_threshold),
            unique_hovers: unique_hovers(&self.hover_sequence),
            hover_sequence: self.hover_sequence.clone(),
            option_dwell_ms: self.option_dwell_ms.clone(),
            path_points: saturating_count(self.path.len()),
        })
    }

    fn flush_dwell(&mut self, now: DateTime<Utc>) {
        if let (Some(option), Some(since)) = (self.hovered, self.hover_started_at.take()) {
            let dwell = (now - since).num_milliseconds().max(0) as u64;
            if let Some(slot) = self.option_dwell_ms.get_mut(option) {
                *slot = slot.saturating_add(dwell);
            }
        }
    }

    fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Count sharp direction changes along a pointer path
///
/// Slides a 3-point window over the path and counts the windows whose
/// consecutive direction vectors have a cross product magnitude above
/// `threshold`.
pub fn path_complexity(points: &[PathPoint], threshold: f64) -> u32 {
    let count = points
        .windows(3)
        .filter(|w| {
            let (dx1, dy1) = (w[1].x - w[0].x, w[1].y - w[0].y);
            let (dx2, dy2) = (w[2].x - w[1].x, w[2].y - w[1].y);
            (dx1 * dy2 - dy1 * dx2).abs() > threshold
        })
        .count();
    saturating_count(count)
}

/// Number of distinct options ever hovered
pub fn unique_hovers(sequence: &[HoverEvent]) -> u32 {
    let distinct = sequence
        .iter()
        .map(|h| h.option)
        .collect::<HashSet<_>>()
        .len();
    saturating_count(distinct)
}

fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
