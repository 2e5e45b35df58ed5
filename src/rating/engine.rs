//! Rating engine: owns live comparison sessions and talks to the store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::resolver;
use super::sampler::ComparisonSession;
use super::selector::CandidateSelector;
use super::store::RatingStore;
use crate::config::EngineConfig;
use crate::error::{RatingError, Result};
use crate::models::*;

struct LiveSession {
    session: ComparisonSession,
    /// A write for this session is in flight.
    busy: bool,
    touched_at: Instant,
}

pub struct RatingEngine<S> {
    store: S,
    selector: Mutex<Box<dyn CandidateSelector>>,
    sessions: Mutex<HashMap<Uuid, LiveSession>>,
    session_ttl: Duration,
}

impl<S: RatingStore> RatingEngine<S> {
    pub fn new(store: S, selector: Box<dyn CandidateSelector>) -> Self {
        Self {
            store,
            selector: Mutex::new(selector),
            sessions: Mutex::new(HashMap::new()),
            session_ttl: EngineConfig::default().session_ttl,
        }
    }

    pub fn from_config(store: S, config: &EngineConfig) -> Self {
        let mut engine = Self::new(store, config.selection.build(config.seed));
        engine.session_ttl = config.session_ttl;
        engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bands(&self) -> Vec<BandInfo> {
        SentimentBand::ALL.iter().map(|band| band.info()).collect()
    }

    pub fn ensure_book(&self, book: BookRef) -> Result<Book> {
        if book.external_ref.trim().is_empty() {
            return Err(RatingError::validation("external_ref must not be empty"));
        }
        if book.title.trim().is_empty() {
            return Err(RatingError::validation("title must not be empty"));
        }
        Ok(self.store.ensure_book_exists(book)?)
    }

    pub fn book(&self, book_id: Uuid) -> Result<Book> {
        self.store
            .get_book(book_id)?
            .ok_or_else(|| RatingError::not_found(format!("book {}", book_id)))
    }

    /// The user's ratings, highest first, optionally limited to one band.
    pub fn ratings(&self, user_id: Uuid, band: Option<SentimentBand>) -> Result<Vec<RatedBook>> {
        let ratings = match band {
            Some(band) => self.store.fetch_rated_books(user_id, band)?,
            None => self.store.fetch_all_rated_books(user_id)?,
        };
        Ok(ratings)
    }

    /// Open a comparison session for rating `input.book_id` in `input.sentiment`.
    ///
    /// Nothing is kept when loading the user's existing ratings fails.
    pub fn start_session(&self, user_id: Uuid, input: StartSessionInput) -> Result<SessionView> {
        self.book(input.book_id)?;

        if self.store.get_rating(user_id, input.book_id)?.is_some() {
            return Err(RatingError::conflict(format!(
                "book {} is already rated",
                input.book_id
            )));
        }

        let existing = self
            .store
            .fetch_rated_books(user_id, input.sentiment)
            .map_err(|e| {
                tracing::error!(user_id = %user_id, "Failed to load existing ratings: {:#}", e);
                RatingError::Io(e)
            })?;

        let session = {
            let mut selector = self.selector.lock().expect("selector lock poisoned");
            ComparisonSession::start(
                user_id,
                input.book_id,
                input.sentiment,
                existing,
                selector.as_mut(),
            )?
        };
        let view = session.view();

        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        self.prune_idle(&mut sessions);
        tracing::info!(
            session_id = %session.id(),
            user_id = %user_id,
            book_id = %input.book_id,
            sentiment = input.sentiment.as_str(),
            candidates = session.books().len(),
            "Started rating session"
        );
        sessions.insert(
            session.id(),
            LiveSession {
                session,
                busy: false,
                touched_at: Instant::now(),
            },
        );

        Ok(view)
    }

    pub fn session(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionView> {
        self.with_session(user_id, session_id, |live| Ok(live.session.view()))
    }

    /// Apply a comparison choice. A choice the session cannot take ends it.
    pub fn choose(&self, user_id: Uuid, session_id: Uuid, choice: Choice) -> Result<SessionView> {
        let result = self.with_session(user_id, session_id, |live| {
            if live.busy {
                return Err(RatingError::Busy(session_id));
            }
            let mut selector = self.selector.lock().expect("selector lock poisoned");
            live.session.choose(choice, selector.as_mut())?;
            Ok(live.session.view())
        });
        self.discard_if_invalid(session_id, result)
    }

    pub fn undo(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionView> {
        self.with_session(user_id, session_id, |live| {
            if live.busy {
                return Err(RatingError::Busy(session_id));
            }
            live.session.undo();
            Ok(live.session.view())
        })
    }

    /// Discard a session without writing anything.
    pub fn cancel(&self, user_id: Uuid, session_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        match sessions.get(&session_id) {
            Some(live) if live.session.user_id() == user_id => {
                if live.busy {
                    return Err(RatingError::Busy(session_id));
                }
            }
            _ => return Err(session_not_found(session_id)),
        }
        sessions.remove(&session_id);
        tracing::info!(session_id = %session_id, "Cancelled rating session");
        Ok(())
    }

    /// Resolve a finished session and persist the result.
    ///
    /// The plan is computed against the band as stored at submit time, so
    /// ratings committed by other sessions of the same user are respected.
    /// On a storage, lookup or conflict failure the session stays open so the
    /// submit can be retried or cancelled. A validation failure ends it.
    pub fn submit(&self, user_id: Uuid, session_id: Uuid) -> Result<RatingOutcome> {
        let claimed = self.with_session(user_id, session_id, |live| {
            if live.busy {
                return Err(RatingError::Busy(session_id));
            }
            if !live.session.is_finished() {
                return Err(RatingError::validation(format!(
                    "session {} has not finished comparing",
                    session_id
                )));
            }
            live.busy = true;
            Ok(live.session.clone())
        });
        let session = self.discard_if_invalid(session_id, claimed)?;
        let book_id = session.book_id();

        let result = self.write_plan(user_id, &session);

        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        match result {
            Ok(outcome) => {
                sessions.remove(&session_id);
                tracing::info!(
                    session_id = %session_id,
                    book_id = %book_id,
                    rating = outcome.rated.rating,
                    updated = outcome.updated.len(),
                    "Submitted rating"
                );
                Ok(outcome)
            }
            Err(e @ RatingError::Validation(_)) => {
                sessions.remove(&session_id);
                tracing::warn!(session_id = %session_id, "Discarded rating session: {}", e);
                Err(e)
            }
            Err(e) => {
                if let Some(live) = sessions.get_mut(&session_id) {
                    live.busy = false;
                    live.touched_at = Instant::now();
                }
                tracing::warn!(session_id = %session_id, "Submit failed: {}", e);
                Err(e)
            }
        }
    }

    fn write_plan(&self, user_id: Uuid, session: &ComparisonSession) -> Result<RatingOutcome> {
        let book_id = session.book_id();
        if self.store.get_book(book_id)?.is_none() {
            return Err(RatingError::not_found(format!("book {}", book_id)));
        }
        if self.store.get_rating(user_id, book_id)?.is_some() {
            return Err(RatingError::conflict(format!(
                "book {} is already rated",
                book_id
            )));
        }

        let current = self
            .store
            .fetch_rated_books(user_id, session.band())
            .map_err(|e| {
                tracing::error!(user_id = %user_id, "Failed to reload existing ratings: {:#}", e);
                RatingError::Io(e)
            })?;
        let plan = resolver::resolve(session, &current)?;

        self.store
            .commit_rating_plan(user_id, &plan)
            .map_err(|e| {
                tracing::error!(user_id = %user_id, book_id = %book_id, "Failed to write rating: {:#}", e);
                RatingError::Io(e)
            })
    }

    /// Drop the session when `result` reports an inconsistent comparison state.
    fn discard_if_invalid<T>(&self, session_id: Uuid, result: Result<T>) -> Result<T> {
        if let Err(RatingError::Validation(reason)) = &result {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            if sessions.remove(&session_id).is_some() {
                tracing::warn!(session_id = %session_id, "Discarded rating session: {}", reason);
            }
        }
        result
    }

    fn with_session<T>(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        f: impl FnOnce(&mut LiveSession) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        let live = sessions
            .get_mut(&session_id)
            .filter(|live| live.session.user_id() == user_id)
            .ok_or_else(|| session_not_found(session_id))?;
        live.touched_at = Instant::now();
        f(live)
    }

    fn prune_idle(&self, sessions: &mut HashMap<Uuid, LiveSession>) {
        let ttl = self.session_ttl;
        sessions.retain(|id, live| {
            let keep = live.busy || live.touched_at.elapsed() < ttl;
            if !keep {
                tracing::debug!(session_id = %id, "Dropping idle rating session");
            }
            keep
        });
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }
}

fn session_not_found(session_id: Uuid) -> RatingError {
    RatingError::not_found(format!("session {}", session_id))
}
