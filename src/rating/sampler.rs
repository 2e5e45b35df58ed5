//! Pairwise comparison state machine.
//!
//! A session narrows the position of a new book inside the user's existing
//! ratings for one band. Existing ratings are kept highest first; the session
//! tracks the window `[lo, hi)` of insertion indices that are still possible.
//! "Prefer new" against book `c` closes the window from above (`hi = c`),
//! "prefer existing" closes it from below (`lo = c + 1`). Once the window is
//! empty the position is decided.

use uuid::Uuid;

use super::band::range_for;
use super::selector::CandidateSelector;
use crate::error::{RatingError, Result};
use crate::models::{Choice, Placement, RatedBook, SentimentBand, SessionState, SessionView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    displayed: usize,
    cursor: usize,
    lo: usize,
    hi: usize,
}

#[derive(Debug, Clone)]
pub struct ComparisonSession {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    band: SentimentBand,
    books: Vec<RatedBook>,
    cursor: usize,
    displayed: usize,
    lo: usize,
    hi: usize,
    history: Vec<Snapshot>,
    placement: Option<Placement>,
    /// Set when the placement came from an explicit tie declaration.
    declared_tie: bool,
}

impl ComparisonSession {
    /// Open a session over `books`, the user's existing ratings in `band`.
    ///
    /// With no existing ratings the session is finished immediately at
    /// [`Placement::Middle`].
    pub fn start(
        user_id: Uuid,
        book_id: Uuid,
        band: SentimentBand,
        mut books: Vec<RatedBook>,
        selector: &mut dyn CandidateSelector,
    ) -> Result<Self> {
        let range = range_for(band);
        for rated in &books {
            if rated.book_id == book_id {
                return Err(RatingError::conflict(format!(
                    "book {} is already rated",
                    book_id
                )));
            }
            if rated.sentiment != band || !range.contains(rated.rating) {
                return Err(RatingError::validation(format!(
                    "rating {} of book {} does not belong to band {}",
                    rated.rating,
                    rated.book_id,
                    band.as_str()
                )));
            }
        }
        books.sort_by(|a, b| b.rating.total_cmp(&a.rating));

        let len = books.len();
        let mut session = Self {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            band,
            books,
            cursor: 0,
            displayed: 0,
            lo: 0,
            hi: len,
            history: Vec::new(),
            placement: None,
            declared_tie: false,
        };

        if len == 0 {
            session.placement = Some(Placement::Middle);
        } else {
            let entry = selector.entry(len).min(len - 1);
            session.cursor = entry;
            session.displayed = entry;
        }

        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn book_id(&self) -> Uuid {
        self.book_id
    }

    pub fn band(&self) -> SentimentBand {
        self.band
    }

    /// Existing ratings, highest first.
    pub fn books(&self) -> &[RatedBook] {
        &self.books
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    pub fn is_finished(&self) -> bool {
        self.placement.is_some()
    }

    /// The book currently shown against the new one, while comparing.
    pub fn comparison(&self) -> Option<&RatedBook> {
        if self.is_finished() {
            None
        } else {
            self.books.get(self.displayed)
        }
    }

    /// Number of books still inside the undecided window.
    pub fn remaining(&self) -> usize {
        self.hi - self.lo
    }

    pub fn can_undo(&self) -> bool {
        match self.placement {
            Some(Placement::Middle) => false,
            Some(_) if self.declared_tie => true,
            _ => !self.history.is_empty(),
        }
    }

    /// Quick display value for the current placement.
    pub fn provisional_rating(&self) -> Option<f64> {
        let range = range_for(self.band);
        self.placement.map(|placement| match placement {
            Placement::Top => range.max,
            Placement::Bottom => range.min,
            Placement::Middle | Placement::Tied { .. } => range.midpoint(),
        })
    }

    pub fn choose(&mut self, choice: Choice, selector: &mut dyn CandidateSelector) -> Result<()> {
        if self.is_finished() {
            return Err(RatingError::validation(format!(
                "session {} is already finished",
                self.id
            )));
        }

        let current = self.displayed;
        match choice {
            Choice::PreferNew => {
                self.push_history();
                self.hi = current;
                if self.lo == self.hi {
                    self.decide();
                } else {
                    self.step_to(current - 1);
                }
            }
            Choice::PreferExisting => {
                self.push_history();
                self.lo = current + 1;
                if self.lo == self.hi {
                    self.decide();
                } else {
                    self.step_to(current + 1);
                }
            }
            Choice::Tie => {
                self.placement = Some(Placement::Tied {
                    book_id: self.books[current].book_id,
                });
                self.declared_tie = true;
            }
            Choice::Skip => {
                if let Some(next) = selector.redraw(self.lo..self.hi, current) {
                    self.displayed = next;
                }
            }
        }

        tracing::debug!(
            session_id = %self.id,
            ?choice,
            cursor = self.cursor,
            lo = self.lo,
            hi = self.hi,
            placement = ?self.placement,
            "Applied comparison choice"
        );
        Ok(())
    }

    /// Revert the last action. A no-op when there is nothing to revert.
    pub fn undo(&mut self) {
        match self.placement {
            Some(Placement::Middle) => return,
            Some(_) if self.declared_tie => {
                self.placement = None;
                self.declared_tie = false;
                return;
            }
            _ => {}
        }

        let Some(previous) = self.history.pop() else {
            return;
        };
        self.displayed = previous.displayed;
        self.cursor = previous.cursor;
        self.lo = previous.lo;
        self.hi = previous.hi;
        self.placement = None;
    }

    pub fn view(&self) -> SessionView {
        let state = match (self.placement, self.provisional_rating()) {
            (Some(placement), Some(provisional_rating)) => SessionState::Finished {
                placement,
                provisional_rating,
            },
            _ => SessionState::Comparing {
                comparison: self.books[self.displayed].clone(),
                cursor: self.cursor,
                remaining: self.remaining(),
            },
        };

        SessionView {
            id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            sentiment: self.band,
            state,
            can_undo: self.can_undo(),
        }
    }

    fn push_history(&mut self) {
        self.history.push(Snapshot {
            displayed: self.displayed,
            cursor: self.cursor,
            lo: self.lo,
            hi: self.hi,
        });
    }

    fn step_to(&mut self, index: usize) {
        self.cursor = index;
        self.displayed = index;
    }

    fn decide(&mut self) {
        let position = self.lo;
        self.placement = Some(if position == 0 {
            Placement::Top
        } else if position == self.books.len() {
            Placement::Bottom
        } else {
            // Sandwiched between two adjacent books after a change of direction.
            Placement::Tied {
                book_id: self.books[self.displayed].book_id,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::selector::{FirstSelector, MiddleSelector};
    use chrono::Utc;

    fn rated(rating: f64) -> RatedBook {
        let now = Utc::now();
        RatedBook {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            book_id: Uuid::new_v4(),
            rating,
            sentiment: SentimentBand::for_rating(rating),
            tied_book_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn loved(ratings: &[f64]) -> Vec<RatedBook> {
        ratings.iter().map(|r| rated(*r)).collect()
    }

    fn start(books: Vec<RatedBook>, selector: &mut dyn CandidateSelector) -> ComparisonSession {
        ComparisonSession::start(Uuid::nil(), Uuid::new_v4(), SentimentBand::Loved, books, selector)
            .unwrap()
    }

    #[test]
    fn empty_band_finishes_in_the_middle() {
        let session = start(Vec::new(), &mut FirstSelector);
        assert_eq!(session.placement(), Some(Placement::Middle));
        assert_eq!(session.provisional_rating(), Some(8.5));
        assert!(!session.can_undo());
    }

    #[test]
    fn preferring_new_every_time_reaches_top() {
        let mut sel = MiddleSelector;
        let mut session = start(loved(&[9.5, 9.0, 8.0, 7.5, 7.0]), &mut sel);
        assert_eq!(session.cursor(), 2);
        while !session.is_finished() {
            session.choose(Choice::PreferNew, &mut sel).unwrap();
        }
        assert_eq!(session.placement(), Some(Placement::Top));
        assert_eq!(session.provisional_rating(), Some(10.0));
    }

    #[test]
    fn preferring_existing_every_time_reaches_bottom() {
        let mut sel = MiddleSelector;
        let mut session = start(loved(&[9.5, 9.0, 8.0, 7.5, 7.0]), &mut sel);
        while !session.is_finished() {
            session.choose(Choice::PreferExisting, &mut sel).unwrap();
        }
        assert_eq!(session.placement(), Some(Placement::Bottom));
        assert_eq!(session.provisional_rating(), Some(7.0));
    }

    #[test]
    fn change_of_direction_ties_with_displayed_book() {
        let mut sel = FirstSelector;
        let books = loved(&[9.0, 7.5]);
        let second = books[1].book_id;
        let mut session = start(books, &mut sel);

        session.choose(Choice::PreferExisting, &mut sel).unwrap();
        assert_eq!(session.cursor(), 1);
        session.choose(Choice::PreferNew, &mut sel).unwrap();

        assert_eq!(session.placement(), Some(Placement::Tied { book_id: second }));
    }

    #[test]
    fn unsorted_input_is_ordered_highest_first() {
        let session = start(loved(&[7.5, 9.0, 8.0]), &mut FirstSelector);
        let ratings: Vec<f64> = session.books().iter().map(|b| b.rating).collect();
        assert_eq!(ratings, vec![9.0, 8.0, 7.5]);
    }

    #[test]
    fn rejects_ratings_outside_the_band() {
        let result = ComparisonSession::start(
            Uuid::nil(),
            Uuid::new_v4(),
            SentimentBand::Loved,
            loved(&[9.0, 6.0]),
            &mut FirstSelector,
        );
        assert!(matches!(result, Err(RatingError::Validation(_))));
    }

    #[test]
    fn rejects_a_book_already_in_the_list() {
        let books = loved(&[9.0]);
        let existing = books[0].book_id;
        let result = ComparisonSession::start(
            Uuid::nil(),
            existing,
            SentimentBand::Loved,
            books,
            &mut FirstSelector,
        );
        assert!(matches!(result, Err(RatingError::Conflict(_))));
    }

    #[test]
    fn choices_after_finish_are_rejected() {
        let mut sel = FirstSelector;
        let mut session = start(loved(&[9.0]), &mut sel);
        session.choose(Choice::PreferNew, &mut sel).unwrap();
        assert!(session.is_finished());
        assert!(matches!(
            session.choose(Choice::PreferNew, &mut sel),
            Err(RatingError::Validation(_))
        ));
    }

    #[test]
    fn undo_restores_previous_comparison_and_cursor() {
        let mut sel = MiddleSelector;
        let mut session = start(loved(&[9.5, 9.0, 8.0, 7.5, 7.0]), &mut sel);
        let before = session.comparison().unwrap().book_id;

        session.choose(Choice::PreferExisting, &mut sel).unwrap();
        assert_eq!(session.cursor(), 3);

        session.undo();
        assert_eq!(session.cursor(), 2);
        assert_eq!(session.comparison().unwrap().book_id, before);
        assert_eq!(session.remaining(), 5);
    }

    #[test]
    fn undo_with_empty_history_is_a_noop() {
        let mut sel = MiddleSelector;
        let mut session = start(loved(&[9.0, 8.0, 7.0]), &mut sel);
        let cursor = session.cursor();
        session.undo();
        session.undo();
        assert_eq!(session.cursor(), cursor);
        assert!(!session.is_finished());
    }

    #[test]
    fn undo_reopens_a_decided_placement() {
        let mut sel = FirstSelector;
        let mut session = start(loved(&[9.0, 8.0]), &mut sel);
        session.choose(Choice::PreferNew, &mut sel).unwrap();
        assert_eq!(session.placement(), Some(Placement::Top));

        session.undo();
        assert!(!session.is_finished());
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn undo_after_tie_declaration_reopens_same_comparison() {
        let mut sel = FirstSelector;
        let mut session = start(loved(&[9.0, 8.0]), &mut sel);
        session.choose(Choice::PreferExisting, &mut sel).unwrap();
        session.choose(Choice::Tie, &mut sel).unwrap();
        assert!(session.is_finished());

        session.undo();
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.comparison().unwrap().rating, 8.0);
        assert!(session.can_undo());
    }

    #[test]
    fn skip_changes_only_the_displayed_book() {
        let mut sel = FirstSelector;
        let books = loved(&[9.5, 9.0, 8.0]);
        let second = books[1].book_id;
        let mut session = start(books, &mut sel);

        session.choose(Choice::Skip, &mut sel).unwrap();
        assert_eq!(session.cursor(), 0);
        assert!(!session.is_finished());
        assert!(!session.can_undo());
        assert_eq!(session.comparison().unwrap().book_id, second);

        session.choose(Choice::Tie, &mut sel).unwrap();
        assert_eq!(session.placement(), Some(Placement::Tied { book_id: second }));
    }

    #[test]
    fn skip_with_single_candidate_keeps_the_same_book() {
        let mut sel = FirstSelector;
        let books = loved(&[9.0]);
        let only = books[0].book_id;
        let mut session = start(books, &mut sel);
        session.choose(Choice::Skip, &mut sel).unwrap();
        assert_eq!(session.comparison().unwrap().book_id, only);
    }

    #[test]
    fn skip_stays_within_the_undecided_window() {
        let mut sel = FirstSelector;
        let books = loved(&[9.5, 9.0, 8.0, 7.5]);
        let third = books[2].book_id;
        let mut session = start(books, &mut sel);

        // 9.5 is better, so index 0 is out of the window.
        session.choose(Choice::PreferExisting, &mut sel).unwrap();
        session.choose(Choice::Skip, &mut sel).unwrap();
        assert_eq!(session.comparison().unwrap().book_id, third);
    }

    #[test]
    fn view_reports_comparing_state() {
        let mut sel = FirstSelector;
        let session = start(loved(&[9.0, 8.0]), &mut sel);
        let view = session.view();
        match view.state {
            SessionState::Comparing {
                comparison,
                cursor,
                remaining,
            } => {
                assert_eq!(comparison.rating, 9.0);
                assert_eq!(cursor, 0);
                assert_eq!(remaining, 2);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }
}
