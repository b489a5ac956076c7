//! interaction_event.v1 schema definition
//!
//! One timestamped respondent interaction per record. A complete test attempt
//! is an ordered stream of these, starting with `start` and ending with
//! `open_answer`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// Current schema version
pub const SCHEMA_VERSION: &str = "interaction_event.v1";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// What happened at an instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionKind {
    /// Respondent pressed start
    Start,
    /// Clock advance with no interaction; lets timed transitions elapse
    Tick,
    PointerMove { x: f64, y: f64 },
    HoverStart { option: usize },
    HoverEnd { option: usize },
    /// Option committed; `step` defaults to the active question's step
    Choose {
        option: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
    },
    OpenAnswer { text: String },
}

impl InteractionKind {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionKind::Start => "start",
            InteractionKind::Tick => "tick",
            InteractionKind::PointerMove { .. } => "pointer_move",
            InteractionKind::HoverStart { .. } => "hover_start",
            InteractionKind::HoverEnd { .. } => "hover_end",
            InteractionKind::Choose { .. } => "choose",
            InteractionKind::OpenAnswer { .. } => "open_answer",
        }
    }
}

/// The interaction_event.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: InteractionKind,
}

impl InteractionEvent {
    pub fn new(timestamp: DateTime<Utc>, kind: InteractionKind) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp,
            kind,
        }
    }

    /// Validate a single record in isolation
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(EventValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        match &self.kind {
            InteractionKind::PointerMove { x, y } if !x.is_finite() || !y.is_finite() => {
                Err(EventValidationError::NonFiniteCoordinate)
            }
            InteractionKind::OpenAnswer { text } if text.trim().is_empty() => {
                Err(EventValidationError::EmptyOpenAnswer)
            }
            _ => Ok(()),
        }
    }
}

/// Validation errors for interaction events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Pointer coordinates must be finite")]
    NonFiniteCoordinate,

    #[error("Open answer text is empty")]
    EmptyOpenAnswer,

    #[error("Timestamp {current} precedes previous event at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

/// Parsing and batch validation of interaction event streams
pub struct InteractionEventAdapter;

impl InteractionEventAdapter {
    /// Parse a JSON string containing an array of events
    pub fn parse_array(json: &str) -> Result<Vec<InteractionEvent>, ReplayError> {
        serde_json::from_str(json).map_err(|e| ReplayError::Parse(e.to_string()))
    }

    /// Parse NDJSON (newline-delimited JSON) containing events
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<InteractionEvent>, ReplayError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<InteractionEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(ReplayError::Parse(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Validate every record and require non-decreasing timestamps
    pub fn validate_events(events: &[InteractionEvent]) -> Result<(), ReplayError> {
        let mut previous: Option<DateTime<Utc>> = None;
        for (index, event) in events.iter().enumerate() {
            event
                .validate()
                .map_err(|source| ReplayError::Validation { index, source })?;

            if let Some(previous) = previous {
                if event.timestamp < previous {
                    return Err(ReplayError::Validation {
                        index,
                        source: EventValidationError::OutOfOrder {
                            previous,
                            current: event.timestamp,
                        },
                    });
                }
            }
            previous = Some(event.timestamp);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"{"timestamp":"2024-03-01T09:00:00Z","type":"start"}

{"timestamp":"2024-03-01T09:00:02.500Z","type":"pointer_move","x":120.5,"y":88.0}
{"schema_version":"interaction_event.v1","timestamp":"2024-03-01T09:00:04Z","type":"choose","option":2}
"#;
        let events = InteractionEventAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, InteractionKind::Start);
        assert_eq!(events[0].schema_version, SCHEMA_VERSION);
        assert_eq!(
            events[1].kind,
            InteractionKind::PointerMove { x: 120.5, y: 88.0 }
        );
        assert_eq!(
            events[2].kind,
            InteractionKind::Choose {
                option: 2,
                step: None
            }
        );
        assert_eq!(events[2].timestamp, ts("2024-03-01T09:00:04Z"));
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"timestamp\":\"2024-03-01T09:00:00Z\",\"type\":\"start\"}\n{\"type\":\"tick\"}\n";
        let err = InteractionEventAdapter::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array_with_step() {
        let json = r#"[{"timestamp":"2024-03-01T09:00:00Z","type":"choose","option":1,"step":4},
                       {"timestamp":"2024-03-01T09:00:01Z","type":"open_answer","text":"hello there"}]"#;
        let events = InteractionEventAdapter::parse_array(json).unwrap();
        assert_eq!(
            events[0].kind,
            InteractionKind::Choose {
                option: 1,
                step: Some(4)
            }
        );
        assert_eq!(events[1].kind.name(), "open_answer");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"[{"timestamp":"2024-03-01T09:00:00Z","type":"scroll"}]"#;
        assert!(matches!(
            InteractionEventAdapter::parse_array(json),
            Err(ReplayError::Parse(_))
        ));
    }

    #[test]
    fn test_serialized_form_is_flat() {
        let event = InteractionEvent::new(
            ts("2024-03-01T09:00:00Z"),
            InteractionKind::HoverStart { option: 3 },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "hover_start");
        assert_eq!(json["option"], 3);
        assert_eq!(json["schema_version"], SCHEMA_VERSION);
    }

    #[test]
    fn test_validate_events() {
        let events = vec![
            InteractionEvent::new(ts("2024-03-01T09:00:05Z"), InteractionKind::Start),
            InteractionEvent::new(ts("2024-03-01T09:00:05Z"), InteractionKind::Tick),
            InteractionEvent::new(ts("2024-03-01T09:00:04Z"), InteractionKind::Tick),
        ];
        match InteractionEventAdapter::validate_events(&events) {
            Err(ReplayError::Validation { index, source }) => {
                assert_eq!(index, 2);
                assert!(matches!(source, EventValidationError::OutOfOrder { .. }));
            }
            other => panic!("expected out-of-order error, got {:?}", other),
        }
        assert!(InteractionEventAdapter::validate_events(&events[..2]).is_ok());
    }

    #[test]
    fn test_validate_record_contents() {
        let at = ts("2024-03-01T09:00:00Z");
        let moved = InteractionEvent::new(
            at,
            InteractionKind::PointerMove {
                x: f64::NAN,
                y: 1.0,
            },
        );
        assert_eq!(
            moved.validate(),
            Err(EventValidationError::NonFiniteCoordinate)
        );

        let blank = InteractionEvent::new(
            at,
            InteractionKind::OpenAnswer {
                text: "   ".to_string(),
            },
        );
        assert_eq!(blank.validate(), Err(EventValidationError::EmptyOpenAnswer));

        let mut versioned = InteractionEvent::new(at, InteractionKind::Start);
        versioned.schema_version = "interaction_event.v0".to_string();
        assert!(matches!(
            versioned.validate(),
            Err(EventValidationError::InvalidSchemaVersion { .. })
        ));
    }
}
