//! Session persistence collaborator
//!
//! The flow controller talks to persistence only through [`SessionBackend`].
//! [`SessionService`] is the stock implementation: it keeps sessions in an
//! injected [`SessionStore`] and seals them with the scoring engine on
//! completion.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::reference::ReferenceData;
use crate::scoring::ScoringEngine;
use crate::types::{Answer, CognitiveAnswer, ScoreMap, SessionId};

/// Server-side aggregate of one test attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
    pub cognitive_answers: Vec<CognitiveAnswer>,
    pub open_answer: Option<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Populated exactly once, when the session is completed
    pub scores: Option<ScoreMap>,
}

impl Session {
    pub fn new(id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            answers: Vec::new(),
            cognitive_answers: Vec::new(),
            open_answer: None,
            completed: false,
            completed_at: None,
            scores: None,
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.completed {
            Err(SessionError::Sealed(self.id.clone()))
        } else {
            Ok(())
        }
    }
}

/// Create/read/update access to sessions by id
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: Session) -> Result<(), SessionError>;

    fn get(&self, id: &SessionId) -> Option<Session>;

    /// Apply `f` to the stored session in place
    fn update<R, F>(&self, id: &SessionId, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut Session) -> R;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn insert(&self, session: Session) -> Result<(), SessionError> {
        (**self).insert(session)
    }

    fn get(&self, id: &SessionId) -> Option<Session> {
        (**self).get(id)
    }

    fn update<R, F>(&self, id: &SessionId, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut Session) -> R,
    {
        (**self).update(id, f)
    }
}

/// Process-local store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: Session) -> Result<(), SessionError> {
        if self.sessions.contains_key(&session.id) {
            return Err(SessionError::CreateFailed(format!(
                "session {} already exists",
                session.id
            )));
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    fn update<R, F>(&self, id: &SessionId, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        Ok(f(entry.value_mut()))
    }
}

/// Capabilities the flow controller needs from the persistence tier
pub trait SessionBackend {
    /// Open a new session
    fn create_session(&self) -> Result<SessionId, SessionError>;

    fn record_answer(&self, id: &SessionId, answer: &Answer) -> Result<(), SessionError>;

    fn record_cognitive_answer(
        &self,
        id: &SessionId,
        answer: &CognitiveAnswer,
    ) -> Result<(), SessionError>;

    fn record_open_answer(&self, id: &SessionId, text: &str) -> Result<(), SessionError>;

    /// Score and seal the session
    ///
    /// Completing an already-completed session returns its stored scores.
    fn complete_session(&self, id: &SessionId) -> Result<ScoreMap, SessionError>;
}

impl<T: SessionBackend + ?Sized> SessionBackend for Arc<T> {
    fn create_session(&self) -> Result<SessionId, SessionError> {
        (**self).create_session()
    }

    fn record_answer(&self, id: &SessionId, answer: &Answer) -> Result<(), SessionError> {
        (**self).record_answer(id, answer)
    }

    fn record_cognitive_answer(
        &self,
        id: &SessionId,
        answer: &CognitiveAnswer,
    ) -> Result<(), SessionError> {
        (**self).record_cognitive_answer(id, answer)
    }

    fn record_open_answer(&self, id: &SessionId, text: &str) -> Result<(), SessionError> {
        (**self).record_open_answer(id, text)
    }

    fn complete_session(&self, id: &SessionId) -> Result<ScoreMap, SessionError> {
        (**self).complete_session(id)
    }
}

/// Session backend over a [`SessionStore`]
pub struct SessionService<S> {
    store: S,
    reference: Arc<ReferenceData>,
    engine: ScoringEngine,
}

impl<S: SessionStore> SessionService<S> {
    pub fn new(store: S, reference: Arc<ReferenceData>) -> Self {
        Self::with_engine(store, reference, ScoringEngine::default())
    }

    pub fn with_engine(store: S, reference: Arc<ReferenceData>, engine: ScoringEngine) -> Self {
        Self {
            store,
            reference,
            engine,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of a stored session
    pub fn session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.store
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }
}

impl<S: SessionStore> SessionBackend for SessionService<S> {
    fn create_session(&self) -> Result<SessionId, SessionError> {
        let id = SessionId::generate();
        self.store.insert(Session::new(id.clone(), Utc::now()))?;
        info!(session_id = %id, "Session created");
        Ok(id)
    }

    fn record_answer(&self, id: &SessionId, answer: &Answer) -> Result<(), SessionError> {
        self.store.update(id, |session| -> Result<(), SessionError> {
            session.ensure_open()?;
            session.answers.push(answer.clone());
            Ok(())
        })??;
        debug!(session_id = %id, scenario_id = answer.scenario_id, "Answer recorded");
        Ok(())
    }

    fn record_cognitive_answer(
        &self,
        id: &SessionId,
        answer: &CognitiveAnswer,
    ) -> Result<(), SessionError> {
        self.store.update(id, |session| -> Result<(), SessionError> {
            session.ensure_open()?;
            session.cognitive_answers.push(answer.clone());
            Ok(())
        })??;
        debug!(session_id = %id, question_id = %answer.question_id, "Cognitive answer recorded");
        Ok(())
    }

    fn record_open_answer(&self, id: &SessionId, text: &str) -> Result<(), SessionError> {
        self.store.update(id, |session| -> Result<(), SessionError> {
            session.ensure_open()?;
            session.open_answer = Some(text.to_string());
            Ok(())
        })??;
        debug!(session_id = %id, chars = text.chars().count(), "Open answer recorded");
        Ok(())
    }

    fn complete_session(&self, id: &SessionId) -> Result<ScoreMap, SessionError> {
        let reference = &self.reference;
        let engine = &self.engine;

        let (scores, newly_completed) = self.store.update(id, |session| {
            if let (true, Some(scores)) = (session.completed, session.scores.as_ref()) {
                return (scores.clone(), false);
            }
            let scores = engine.score(
                reference.dimension_codes(),
                &session.answers,
                &session.cognitive_answers,
            );
            session.scores = Some(scores.clone());
            session.completed = true;
            session.completed_at = Some(Utc::now());
            (scores, true)
        })?;

        if newly_completed {
            info!(
                session_id = %id,
                cognitive = scores.cognitive().unwrap_or(0),
                "Session completed"
            );
        } else {
            debug!(session_id = %id, "Session already completed, returning stored scores");
        }
        Ok(scores)
    }
}
