//! Test-flow controller
//!
//! State machine sequencing a test attempt:
//! `intro → transition → scenario → (cognitive)* → transition → … → openq → result`.
//!
//! The controller owns the motor capture for the active question and resets
//! it on every question change. Per-question persistence is best-effort; only
//! session creation and completion can block progress.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::capture::MotorCapture;
use crate::config::EngineConfig;
use crate::error::{FlowError, SessionError};
use crate::reference::{CognitivePrompt, OpenQuestion, ReferenceData, Scenario};
use crate::session::SessionBackend;
use crate::types::{Answer, CognitiveAnswer, ScoreMap, SessionId};

/// Top-level stage of a test attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intro,
    Transition,
    Scenario,
    Cognitive,
    #[serde(rename = "openq")]
    OpenQuestion,
    Result,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intro => "intro",
            Stage::Transition => "transition",
            Stage::Scenario => "scenario",
            Stage::Cognitive => "cognitive",
            Stage::OpenQuestion => "openq",
            Stage::Result => "result",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient, per-attempt flow state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub stage: Stage,
    pub phase_index: usize,
    /// Cursor within the current phase; meaningful in `transition`/`scenario`
    pub scenario_index: usize,
    /// Linear step counter; only ever increases
    pub global_step: u32,
    /// Question indices of the active cognitive batch
    pub cognitive_batch: Vec<usize>,
    /// Cursor within the cognitive batch; meaningful in `cognitive`
    pub cognitive_cursor: usize,
    pub transition_started_at: Option<DateTime<Utc>>,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            stage: Stage::Intro,
            phase_index: 0,
            scenario_index: 0,
            global_step: 0,
            cognitive_batch: Vec::new(),
            cognitive_cursor: 0,
            transition_started_at: None,
        }
    }
}

/// Position of the respondent in the test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub global_step: u32,
    pub total_steps: u32,
    pub scenario_number: u32,
    pub total_scenarios: u32,
}

/// The question currently awaiting an answer, as shown to the respondent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionView {
    Scenario {
        step: u32,
        phase_name: String,
        scenario: Scenario,
    },
    Cognitive {
        step: u32,
        batch_position: usize,
        batch_len: usize,
        prompt: CognitivePrompt,
    },
    OpenQuestion {
        question: OpenQuestion,
        min_chars: usize,
    },
}

/// Orchestrates one test attempt against a session backend
pub struct FlowController<B> {
    reference: Arc<ReferenceData>,
    backend: B,
    config: EngineConfig,
    capture: MotorCapture,
    state: FlowState,
    session_id: Option<SessionId>,
    answers: Vec<Answer>,
    cognitive_answers: Vec<CognitiveAnswer>,
    open_answer: Option<String>,
    scores: Option<ScoreMap>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl<B: SessionBackend> FlowController<B> {
    pub fn new(reference: Arc<ReferenceData>, backend: B) -> Self {
        Self::with_config(reference, backend, EngineConfig::default())
    }

    pub fn with_config(reference: Arc<ReferenceData>, backend: B, config: EngineConfig) -> Self {
        let capture = MotorCapture::new(config.capture.clone());
        Self {
            reference,
            backend,
            config,
            capture,
            state: FlowState::default(),
            session_id: None,
            answers: Vec::new(),
            cognitive_answers: Vec::new(),
            open_answer: None,
            scores: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn cognitive_answers(&self) -> &[CognitiveAnswer] {
        &self.cognitive_answers
    }

    pub fn open_answer(&self) -> Option<&str> {
        self.open_answer.as_deref()
    }

    /// Scores, available once the test reached `result`
    pub fn scores(&self) -> Option<&ScoreMap> {
        self.scores.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Open a session and enter the first transition
    ///
    /// On failure the controller stays in `intro` so the start can be retried.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Stage, FlowError> {
        self.expect_stage(Stage::Intro)?;

        let session_id = match self.backend.create_session() {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Session creation failed, staying in intro");
                return Err(FlowError::SessionUnavailable(e));
            }
        };

        info!(session_id = %session_id, "Test started");
        self.session_id = Some(session_id);
        self.started_at = Some(now);
        self.enter_transition(0, now);
        Ok(self.state.stage)
    }

    /// Advance timed stages; returns the stage after polling
    ///
    /// A transition ends once its dwell has elapsed. The next question is
    /// considered shown at the end of the dwell, not at the polling instant.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Stage {
        if self.state.stage == Stage::Transition {
            if let Some(started) = self.state.transition_started_at {
                let ends_at = started + self.transition_dwell();
                if now >= ends_at {
                    self.activate_scenario(ends_at);
                }
            }
        }
        self.state.stage
    }

    pub fn pointer_move(&mut self, x: f64, y: f64, now: DateTime<Utc>) {
        if self.is_answering() {
            self.capture.on_pointer_move(x, y, now);
        }
    }

    pub fn hover_start(&mut self, option: usize, now: DateTime<Utc>) {
        if self.is_answering() {
            self.capture.on_hover_start(option, now);
        }
    }

    pub fn hover_end(&mut self, option: usize, now: DateTime<Utc>) {
        if self.is_answering() {
            self.capture.on_hover_end(option, now);
        }
    }

    /// Commit `option` for the question shown at `step`
    ///
    /// A step that no longer matches the active question is rejected, so a
    /// repeated submission can never answer the next question.
    pub fn choose(
        &mut self,
        step: u32,
        option: usize,
        now: DateTime<Utc>,
    ) -> Result<Stage, FlowError> {
        if !self.is_answering() {
            return Err(FlowError::InvalidStage {
                expected: "scenario or cognitive".to_string(),
                found: self.state.stage.to_string(),
            });
        }
        if step != self.state.global_step {
            return Err(FlowError::StaleCommit {
                expected: self.state.global_step,
                got: step,
            });
        }
        if !self.capture.is_active() {
            return Err(FlowError::NotActive);
        }

        match self.state.stage {
            Stage::Scenario => self.commit_scenario(option, now)?,
            _ => self.commit_cognitive(option, now)?,
        }
        Ok(self.state.stage)
    }

    /// Commit the open answer and complete the session
    ///
    /// Completion failure keeps the controller in `openq` for a retry.
    pub fn submit_open_answer(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<&ScoreMap, FlowError> {
        self.expect_stage(Stage::OpenQuestion)?;

        let text = text.trim();
        let min = self.config.flow.min_open_answer_chars;
        let got = text.chars().count();
        if got < min {
            return Err(FlowError::OpenAnswerTooShort { min, got });
        }

        let session_id = self.session_id.clone().ok_or_else(|| {
            FlowError::CompletionFailed(SessionError::Unavailable(
                "no session was opened".to_string(),
            ))
        })?;

        if let Err(e) = self.backend.record_open_answer(&session_id, text) {
            warn!(session_id = %session_id, error = %e, "Failed to persist open answer");
        }
        self.open_answer = Some(text.to_string());

        let scores = match self.backend.complete_session(&session_id) {
            Ok(scores) => scores,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Session completion failed");
                return Err(FlowError::CompletionFailed(e));
            }
        };

        info!(
            session_id = %session_id,
            answers = self.answers.len(),
            cognitive_answers = self.cognitive_answers.len(),
            "Test completed"
        );
        self.state.stage = Stage::Result;
        self.finished_at = Some(now);
        let scores: &ScoreMap = self.scores.insert(scores);
        Ok(scores)
    }

    /// The question awaiting an answer, if any
    pub fn current_question(&self) -> Option<QuestionView> {
        match self.state.stage {
            Stage::Scenario => {
                let phase = self.reference.phases.get(self.state.phase_index)?;
                let scenario = phase.scenarios.get(self.state.scenario_index)?;
                Some(QuestionView::Scenario {
                    step: self.state.global_step,
                    phase_name: phase.name.clone(),
                    scenario: scenario.clone(),
                })
            }
            Stage::Cognitive => {
                let index = *self
                    .state
                    .cognitive_batch
                    .get(self.state.cognitive_cursor)?;
                let question = self.reference.cognitive_question(index)?;
                Some(QuestionView::Cognitive {
                    step: self.state.global_step,
                    batch_position: self.state.cognitive_cursor,
                    batch_len: self.state.cognitive_batch.len(),
                    prompt: question.prompt_view(),
                })
            }
            Stage::OpenQuestion => Some(QuestionView::OpenQuestion {
                question: self.reference.open_question.clone(),
                min_chars: self.config.flow.min_open_answer_chars,
            }),
            Stage::Intro | Stage::Transition | Stage::Result => None,
        }
    }

    pub fn progress(&self) -> Progress {
        let total_scenarios = self.reference.scenario_count() as u32;
        let total_steps = total_scenarios + self.reference.schedule.total_questions() as u32;
        let answered = self.answers.len() as u32;
        let scenario_number = match self.state.stage {
            Stage::Scenario => answered + 1,
            _ => answered,
        }
        .min(total_scenarios);

        Progress {
            global_step: self.state.global_step,
            total_steps,
            scenario_number,
            total_scenarios,
        }
    }

    fn commit_scenario(&mut self, option: usize, now: DateTime<Utc>) -> Result<(), FlowError> {
        let reference = Arc::clone(&self.reference);
        let scenario = reference
            .scenario(self.state.phase_index, self.state.scenario_index)
            .ok_or(FlowError::NotActive)?;
        check_option(option, scenario.options.len())?;

        let answer = self
            .capture
            .capture_answer(scenario, option, now)
            .ok_or(FlowError::NotActive)?;

        if let Some(id) = &self.session_id {
            if let Err(e) = self.backend.record_answer(id, &answer) {
                warn!(session_id = %id, scenario_id = answer.scenario_id, error = %e, "Failed to persist answer");
            }
        }
        self.answers.push(answer);

        self.state.scenario_index += 1;
        self.state.global_step += 1;

        let phase_len = reference
            .phases
            .get(self.state.phase_index)
            .map(|phase| phase.scenarios.len())
            .unwrap_or(0);
        if self.state.scenario_index < phase_len {
            self.activate_scenario(now);
        } else {
            self.finish_phase(now);
        }
        Ok(())
    }

    fn commit_cognitive(&mut self, option: usize, now: DateTime<Utc>) -> Result<(), FlowError> {
        let reference = Arc::clone(&self.reference);
        let question = self
            .state
            .cognitive_batch
            .get(self.state.cognitive_cursor)
            .and_then(|&index| reference.cognitive_question(index))
            .ok_or(FlowError::NotActive)?;
        check_option(option, question.options.len())?;

        let answer = self
            .capture
            .capture_cognitive(question, option, now)
            .ok_or(FlowError::NotActive)?;

        if let Some(id) = &self.session_id {
            if let Err(e) = self.backend.record_cognitive_answer(id, &answer) {
                warn!(session_id = %id, question_id = %answer.question_id, error = %e, "Failed to persist cognitive answer");
            }
        }
        self.cognitive_answers.push(answer);

        self.state.cognitive_cursor += 1;
        self.state.global_step += 1;

        if self.state.cognitive_cursor < self.state.cognitive_batch.len() {
            self.activate_cognitive(now);
        } else {
            self.state.cognitive_batch.clear();
            self.state.cognitive_cursor = 0;
            self.next_phase_or_end(now);
        }
        Ok(())
    }

    fn finish_phase(&mut self, now: DateTime<Utc>) {
        let batch = self
            .reference
            .schedule
            .batch_after(self.state.phase_index)
            .to_vec();

        if batch.is_empty() {
            self.next_phase_or_end(now);
        } else {
            debug!(
                phase = self.state.phase_index,
                questions = batch.len(),
                "Entering cognitive batch"
            );
            self.state.stage = Stage::Cognitive;
            self.state.cognitive_batch = batch;
            self.state.cognitive_cursor = 0;
            self.activate_cognitive(now);
        }
    }

    fn next_phase_or_end(&mut self, now: DateTime<Utc>) {
        let next = self.state.phase_index + 1;
        if next < self.reference.phases.len() {
            self.enter_transition(next, now);
        } else {
            debug!(step = self.state.global_step, "All phases finished, entering open question");
            self.state.stage = Stage::OpenQuestion;
        }
    }

    fn enter_transition(&mut self, phase_index: usize, now: DateTime<Utc>) {
        debug!(phase = phase_index, "Entering transition");
        self.state.stage = Stage::Transition;
        self.state.phase_index = phase_index;
        self.state.scenario_index = 0;
        self.state.transition_started_at = Some(now);

        if self.config.flow.transition_dwell_ms == 0 {
            self.activate_scenario(now);
        }
    }

    fn activate_scenario(&mut self, now: DateTime<Utc>) {
        let option_count = self
            .reference
            .scenario(self.state.phase_index, self.state.scenario_index)
            .map(|scenario| scenario.options.len())
            .unwrap_or(0);

        self.state.stage = Stage::Scenario;
        self.state.transition_started_at = None;
        self.capture.reset(now, option_count);
    }

    fn activate_cognitive(&mut self, now: DateTime<Utc>) {
        let option_count = self
            .state
            .cognitive_batch
            .get(self.state.cognitive_cursor)
            .and_then(|&index| self.reference.cognitive_question(index))
            .map(|question| question.options.len())
            .unwrap_or(0);
        self.capture.reset(now, option_count);
    }

    fn is_answering(&self) -> bool {
        matches!(self.state.stage, Stage::Scenario | Stage::Cognitive)
    }

    fn expect_stage(&self, expected: Stage) -> Result<(), FlowError> {
        if self.state.stage == expected {
            Ok(())
        } else {
            Err(FlowError::InvalidStage {
                expected: expected.to_string(),
                found: self.state.stage.to_string(),
            })
        }
    }

    fn transition_dwell(&self) -> Duration {
        Duration::milliseconds(self.config.flow.transition_dwell_ms as i64)
    }
}

fn check_option(option: usize, available: usize) -> Result<(), FlowError> {
    if option < available {
        Ok(())
    } else {
        Err(FlowError::InvalidChoice { option, available })
    }
}
