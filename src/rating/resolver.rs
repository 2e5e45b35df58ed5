//! Turns a finished comparison session into concrete ratings.
//!
//! Existing ratings are grouped into slots (one slot per tie group, highest
//! first), the new book is placed into the slot list, and every slot is then
//! spread evenly across the band: the first slot gets the band maximum, the
//! last one the band minimum. Members of a slot share one rating and list
//! each other as tied.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::band::{range_for, BandRange};
use super::sampler::ComparisonSession;
use crate::error::{RatingError, Result};
use crate::models::{Placement, RatedBook, RatingDraft, RatingPlan, RatingUpdate, SentimentBand};

const RATING_EPSILON: f64 = 1e-9;

/// Build the write plan for a finished session against `current`, the
/// band's ratings as they are now rather than when the session started.
pub fn resolve(session: &ComparisonSession, current: &[RatedBook]) -> Result<RatingPlan> {
    let placement = session.placement().ok_or_else(|| {
        RatingError::validation(format!("session {} has not finished comparing", session.id()))
    })?;
    plan_rating(session.book_id(), session.band(), current, placement)
}

/// Rating for slot `index` of `slots` evenly spread across `range`.
pub fn interpolate(range: BandRange, index: usize, slots: usize) -> f64 {
    if slots <= 1 {
        return range.midpoint();
    }
    if index == 0 {
        return range.max;
    }
    if index >= slots - 1 {
        return range.min;
    }
    range.max - range.span() * index as f64 / (slots - 1) as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Member {
    Existing(usize),
    New,
}

/// Compute the new rating and every change it implies for `existing`.
pub fn plan_rating(
    book_id: Uuid,
    band: SentimentBand,
    existing: &[RatedBook],
    placement: Placement,
) -> Result<RatingPlan> {
    let mut books: Vec<&RatedBook> = existing.iter().collect();
    books.sort_by(|a, b| b.rating.total_cmp(&a.rating));

    let index: HashMap<Uuid, usize> = books
        .iter()
        .enumerate()
        .map(|(i, rated)| (rated.book_id, i))
        .collect();
    check_links(book_id, &books, &index)?;

    let mut slots = group_slots(&books, &index);
    match placement {
        Placement::Top => slots.insert(0, vec![Member::New]),
        Placement::Bottom => slots.push(vec![Member::New]),
        Placement::Middle => {
            if !slots.is_empty() {
                return Err(RatingError::validation(
                    "middle placement requires an empty band",
                ));
            }
            slots.push(vec![Member::New]);
        }
        Placement::Tied { book_id: partner } => {
            let partner_idx = *index.get(&partner).ok_or_else(|| {
                RatingError::not_found(format!("tie partner {} is not rated in this band", partner))
            })?;
            let slot = slots
                .iter_mut()
                .find(|slot| slot.contains(&Member::Existing(partner_idx)))
                .ok_or_else(|| RatingError::validation("tie partner has no slot"))?;
            slot.push(Member::New);
        }
    }

    let range = range_for(band);
    let total = slots.len();
    let mut draft = None;
    let mut updates = Vec::new();

    for (position, slot) in slots.iter().enumerate() {
        let rating = interpolate(range, position, total);
        let ids: Vec<Uuid> = slot
            .iter()
            .map(|member| match member {
                Member::Existing(i) => books[*i].book_id,
                Member::New => book_id,
            })
            .collect();

        for member in slot {
            match member {
                Member::New => {
                    draft = Some(RatingDraft {
                        book_id,
                        rating,
                        sentiment: band,
                        tied_book_ids: closed_ties(book_id, &[], &ids),
                    });
                }
                Member::Existing(i) => {
                    let rated = books[*i];
                    let tied_book_ids = closed_ties(rated.book_id, &rated.tied_book_ids, &ids);
                    if (rated.rating - rating).abs() > RATING_EPSILON
                        || tied_book_ids != rated.tied_book_ids
                    {
                        updates.push(RatingUpdate {
                            book_id: rated.book_id,
                            rating,
                            tied_book_ids,
                        });
                    }
                }
            }
        }
    }

    let draft = draft.ok_or_else(|| RatingError::validation("new book was not placed"))?;
    tracing::debug!(
        book_id = %book_id,
        rating = draft.rating,
        ties = draft.tied_book_ids.len(),
        updates = updates.len(),
        "Resolved rating plan"
    );

    Ok(RatingPlan { draft, updates })
}

/// Reject tie links that cannot be reconciled within this band.
fn check_links(book_id: Uuid, books: &[&RatedBook], index: &HashMap<Uuid, usize>) -> Result<()> {
    if index.contains_key(&book_id) {
        return Err(RatingError::conflict(format!(
            "book {} is already rated in this band",
            book_id
        )));
    }

    for rated in books {
        for partner in &rated.tied_book_ids {
            if *partner == rated.book_id {
                return Err(RatingError::conflict(format!(
                    "book {} is tied with itself",
                    rated.book_id
                )));
            }
            if *partner == book_id {
                return Err(RatingError::conflict(format!(
                    "book {} is already tied with the book being rated",
                    rated.book_id
                )));
            }
            if !index.contains_key(partner) {
                tracing::warn!(
                    book_id = %rated.book_id,
                    partner = %partner,
                    "Tie partner is not one of the user's ratings in this band"
                );
                return Err(RatingError::conflict(format!(
                    "tie partner {} of book {} is not owned by the same user",
                    partner, rated.book_id
                )));
            }
        }
    }

    Ok(())
}

/// Group existing books into tie slots, highest first.
///
/// Books land in the same slot when linked through tie lists (in either
/// direction) or when they carry identical ratings.
fn group_slots(books: &[&RatedBook], index: &HashMap<Uuid, usize>) -> Vec<Vec<Member>> {
    let mut parent: Vec<usize> = (0..books.len()).collect();

    for (i, rated) in books.iter().enumerate() {
        for partner in &rated.tied_book_ids {
            if let Some(&j) = index.get(partner) {
                union(&mut parent, i, j);
            }
        }
        if i > 0 && (books[i - 1].rating - rated.rating).abs() <= RATING_EPSILON {
            union(&mut parent, i - 1, i);
        }
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut slots: Vec<Vec<Member>> = Vec::new();
    for i in 0..books.len() {
        let root = find(&mut parent, i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            slots.push(Vec::new());
            slots.len() - 1
        });
        slots[slot].push(Member::Existing(i));
    }
    slots
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        // Keep the higher rated book as root so slot order follows rating order.
        parent[ra.max(rb)] = ra.min(rb);
    }
}

/// Tie list for `owner` inside a group: existing order first, missing members appended.
fn closed_ties(owner: Uuid, current: &[Uuid], group: &[Uuid]) -> Vec<Uuid> {
    let members: HashSet<&Uuid> = group.iter().filter(|id| **id != owner).collect();
    let mut ties: Vec<Uuid> = Vec::with_capacity(members.len());
    let mut seen = HashSet::new();

    for id in current.iter().chain(group.iter()) {
        if members.contains(id) && seen.insert(*id) {
            ties.push(*id);
        }
    }
    ties
}
