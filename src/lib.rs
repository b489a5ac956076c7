//! Decision Profile - questionnaire flow, motor-signal capture and scoring
//!
//! Administers a multi-phase situational questionnaire and derives a
//! behavioral/cognitive profile from both the chosen options and the pointer
//! behavior recorded while the respondent decides:
//! flow controller → motor capture → session persistence → scoring.
//!
//! ## Modules
//!
//! - **Flow**: state machine sequencing scenarios, cognitive batches and the open question
//! - **Capture**: per-question pointer/hover instrumentation into answer features
//! - **Scoring**: declarative tags blended with motor heuristics into 0-100 scores
//! - **Session**: persistence collaborator contract and an in-memory implementation
//! - **Replay**: offline replay of recorded interaction streams

pub mod capture;
pub mod config;
pub mod error;
pub mod flow;
pub mod reference;
pub mod replay;
pub mod report;
pub mod scoring;
pub mod session;
pub mod types;

pub use capture::MotorCapture;
pub use config::EngineConfig;
pub use error::{ConfigError, FlowError, ReferenceError, ReplayError, SessionError};
pub use flow::{FlowController, Progress, QuestionView, Stage};
pub use reference::ReferenceData;
pub use report::{ProfileReport, ReportEncoder};
pub use scoring::{compute_scores, ScoringEngine};
pub use session::{InMemorySessionStore, SessionBackend, SessionService, SessionStore};
pub use types::{Answer, CognitiveAnswer, ScoreMap, SessionId};

// Replay exports
pub use replay::{replay, InteractionEvent, InteractionEventAdapter, ReplayOutcome, SCHEMA_VERSION};

/// Engine version embedded in reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "decision-profile";
