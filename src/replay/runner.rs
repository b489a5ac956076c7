//! Replay of an interaction stream through the flow controller

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ReplayError;
use crate::flow::{FlowController, Progress, Stage};
use crate::replay::event::{InteractionEvent, InteractionEventAdapter, InteractionKind};
use crate::session::SessionBackend;
use crate::types::{Answer, CognitiveAnswer, ScoreMap, SessionId};

/// Where a replayed attempt ended up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub stage: Stage,
    pub progress: Progress,
    pub events_applied: usize,
    pub answers: Vec<Answer>,
    pub cognitive_answers: Vec<CognitiveAnswer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_answer: Option<String>,
    /// Present once the attempt reached `result`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreMap>,
}

impl ReplayOutcome {
    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Result
    }
}

/// Validate `events` and feed them to `controller` in order
///
/// The controller is polled at every event's timestamp before the event is
/// applied, so transitions elapse exactly as they would have live. Any event
/// the controller rejects aborts the replay.
pub fn replay<B: SessionBackend>(
    controller: &mut FlowController<B>,
    events: &[InteractionEvent],
) -> Result<ReplayOutcome, ReplayError> {
    InteractionEventAdapter::validate_events(events)?;

    for (index, event) in events.iter().enumerate() {
        let now = event.timestamp;
        controller.poll(now);

        let applied = match &event.kind {
            InteractionKind::Start => controller.start(now).map(|_| ()),
            InteractionKind::Tick => Ok(()),
            InteractionKind::PointerMove { x, y } => {
                controller.pointer_move(*x, *y, now);
                Ok(())
            }
            InteractionKind::HoverStart { option } => {
                controller.hover_start(*option, now);
                Ok(())
            }
            InteractionKind::HoverEnd { option } => {
                controller.hover_end(*option, now);
                Ok(())
            }
            InteractionKind::Choose { option, step } => {
                let step = step.unwrap_or(controller.state().global_step);
                controller.choose(step, *option, now).map(|_| ())
            }
            InteractionKind::OpenAnswer { text } => {
                controller.submit_open_answer(text, now).map(|_| ())
            }
        };

        applied.map_err(|source| {
            debug!(index, event = event.kind.name(), error = %source, "Replay event rejected");
            ReplayError::Flow { index, source }
        })?;
    }

    let outcome = ReplayOutcome {
        session_id: controller.session_id().cloned(),
        stage: controller.stage(),
        progress: controller.progress(),
        events_applied: events.len(),
        answers: controller.answers().to_vec(),
        cognitive_answers: controller.cognitive_answers().to_vec(),
        open_answer: controller.open_answer().map(str::to_string),
        scores: controller.scores().cloned(),
    };

    info!(
        events = outcome.events_applied,
        stage = %outcome.stage,
        answers = outcome.answers.len(),
        cognitive_answers = outcome.cognitive_answers.len(),
        "Replay finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::reference::ReferenceData;
    use crate::replay::EventValidationError;
    use crate::session::{InMemorySessionStore, SessionService};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn controller() -> FlowController<SessionService<InMemorySessionStore>> {
        let reference = Arc::new(ReferenceData::builtin().unwrap());
        let service = SessionService::new(InMemorySessionStore::new(), Arc::clone(&reference));
        FlowController::new(reference, service)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    /// A complete attempt: every question answered with option 0 after 1.5s
    fn full_attempt(questions: usize) -> Vec<InteractionEvent> {
        let mut now = t0();
        let mut events = vec![InteractionEvent::new(now, InteractionKind::Start)];
        for _ in 0..questions {
            now += Duration::milliseconds(2500);
            events.push(InteractionEvent::new(
                now,
                InteractionKind::PointerMove { x: 10.0, y: 20.0 },
            ));
            events.push(InteractionEvent::new(
                now,
                InteractionKind::HoverStart { option: 0 },
            ));
            now += Duration::milliseconds(1500);
            events.push(InteractionEvent::new(
                now,
                InteractionKind::Choose {
                    option: 0,
                    step: None,
                },
            ));
        }
        now += Duration::milliseconds(5000);
        events.push(InteractionEvent::new(
            now,
            InteractionKind::OpenAnswer {
                text: "I like to gather facts before acting.".to_string(),
            },
        ));
        events
    }

    #[test]
    fn test_full_replay_reaches_result() {
        let mut controller = controller();
        let events = full_attempt(24);
        let outcome = replay(&mut controller, &events).unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.events_applied, events.len());
        assert_eq!(outcome.answers.len(), 16);
        assert_eq!(outcome.cognitive_answers.len(), 8);
        assert_eq!(outcome.progress.global_step, 24);
        assert!(outcome.session_id.is_some());

        let scores = outcome.scores.unwrap();
        assert_eq!(scores.len(), 9);
        assert_eq!(outcome.answers[0].first_move_ms, 500);
        assert_eq!(outcome.answers[0].decision_time_sec, 2.0);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let events = full_attempt(24);
        let first = replay(&mut controller(), &events).unwrap();
        let second = replay(&mut controller(), &events).unwrap();
        assert_eq!(first.scores, second.scores);
        assert_eq!(first.answers, second.answers);
    }

    #[test]
    fn test_partial_replay_stops_mid_test() {
        let mut controller = controller();
        let mut events = full_attempt(5);
        events.pop();
        let outcome = replay(&mut controller, &events).unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.stage, Stage::Cognitive);
        assert_eq!(outcome.answers.len(), 4);
        assert_eq!(outcome.cognitive_answers.len(), 1);
        assert!(outcome.scores.is_none());
    }

    #[test]
    fn test_rejected_event_reports_index() {
        let mut controller = controller();
        let events = vec![
            InteractionEvent::new(t0(), InteractionKind::Start),
            InteractionEvent::new(
                t0() + Duration::milliseconds(100),
                InteractionKind::Choose {
                    option: 0,
                    step: None,
                },
            ),
        ];
        match replay(&mut controller, &events) {
            Err(ReplayError::Flow { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(source, FlowError::InvalidStage { .. }));
            }
            other => panic!("expected flow error, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_stale_step_rejected() {
        let mut controller = controller();
        let at = |ms: i64| t0() + Duration::milliseconds(ms);
        let events = vec![
            InteractionEvent::new(at(0), InteractionKind::Start),
            InteractionEvent::new(at(3000), InteractionKind::Choose { option: 1, step: Some(0) }),
            InteractionEvent::new(at(3010), InteractionKind::Choose { option: 1, step: Some(0) }),
        ];
        match replay(&mut controller, &events) {
            Err(ReplayError::Flow { index, source }) => {
                assert_eq!(index, 2);
                assert_eq!(source, FlowError::StaleCommit { expected: 1, got: 0 });
            }
            other => panic!("expected stale commit, got {:?}", other),
        }
        assert_eq!(controller.answers().len(), 1);
    }

    #[test]
    fn test_invalid_stream_not_applied() {
        let mut controller = controller();
        let events = vec![
            InteractionEvent::new(t0(), InteractionKind::Start),
            InteractionEvent::new(t0() - Duration::milliseconds(1), InteractionKind::Tick),
        ];
        match replay(&mut controller, &events) {
            Err(ReplayError::Validation { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(source, EventValidationError::OutOfOrder { .. }));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(controller.stage(), Stage::Intro);
    }
}
