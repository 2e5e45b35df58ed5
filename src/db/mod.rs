mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use uuid::Uuid;

use crate::models::*;
use crate::rating::RatingStore;

const RATING_COLUMNS: &str =
    "id, user_id, book_id, rating, sentiment, tied_book_ids, created_at, updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "rankshelf")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("rankshelf.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Book operations
    // ============================================================

    pub fn get_book(&self, id: Uuid) -> Result<Option<Book>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.query_row(
            "SELECT id, external_ref, title, author, cover_url, category, created_at
             FROM books WHERE id = ?",
            [id.to_string()],
            book_from_row,
        )
        .optional()
        .context("Failed to load book")
    }

    pub fn get_book_by_ref(&self, external_ref: &str) -> Result<Option<Book>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.query_row(
            "SELECT id, external_ref, title, author, cover_url, category, created_at
             FROM books WHERE external_ref = ?",
            [external_ref],
            book_from_row,
        )
        .optional()
        .context("Failed to load book")
    }

    /// Return the book with `input.external_ref`, creating it on first sight.
    pub fn ensure_book_exists(&self, input: BookRef) -> Result<Book> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        // A concurrent insert of the same reference is absorbed by the UNIQUE constraint.
        conn.execute(
            "INSERT INTO books (id, external_ref, title, author, cover_url, category, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(external_ref) DO NOTHING",
            (
                id.to_string(),
                &input.external_ref,
                &input.title,
                &input.author,
                &input.cover_url,
                &input.category,
                now.to_rfc3339(),
            ),
        )
        .context("Failed to insert book")?;

        conn.query_row(
            "SELECT id, external_ref, title, author, cover_url, category, created_at
             FROM books WHERE external_ref = ?",
            [&input.external_ref],
            book_from_row,
        )
        .context("Failed to load book")
    }

    // ============================================================
    // Rating operations
    // ============================================================

    pub fn get_rated_books(&self, user_id: Uuid, sentiment: SentimentBand) -> Result<Vec<RatedBook>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings
             WHERE user_id = ? AND sentiment = ? ORDER BY rating DESC, created_at"
        ))?;

        let ratings = stmt
            .query_map((user_id.to_string(), sentiment.as_str()), rated_book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ratings)
    }

    pub fn get_all_rated_books(&self, user_id: Uuid) -> Result<Vec<RatedBook>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings
             WHERE user_id = ? ORDER BY rating DESC, created_at"
        ))?;

        let ratings = stmt
            .query_map([user_id.to_string()], rated_book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ratings)
    }

    pub fn get_rating(&self, user_id: Uuid, book_id: Uuid) -> Result<Option<RatedBook>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rating = conn
            .query_row(
                &format!("SELECT {RATING_COLUMNS} FROM ratings WHERE user_id = ? AND book_id = ?"),
                (user_id.to_string(), book_id.to_string()),
                rated_book_from_row,
            )
            .optional()?;
        Ok(rating)
    }

    /// Write a new rating and all updates it implies in one transaction.
    pub fn commit_rating_plan(&self, user_id: Uuid, plan: &RatingPlan) -> Result<RatingOutcome> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let rated = insert_rating(&tx, user_id, &plan.draft)?;
        let mut updated = Vec::with_capacity(plan.updates.len());
        for update in &plan.updates {
            updated.push(update_ties(&tx, user_id, update)?);
        }

        // Dropping `tx` on any error above rolls everything back.
        tx.commit().context("Failed to commit rating")?;

        Ok(RatingOutcome { rated, updated })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl RatingStore for Database {
    fn fetch_rated_books(&self, user_id: Uuid, band: SentimentBand) -> Result<Vec<RatedBook>> {
        self.get_rated_books(user_id, band)
    }

    fn fetch_all_rated_books(&self, user_id: Uuid) -> Result<Vec<RatedBook>> {
        self.get_all_rated_books(user_id)
    }

    fn get_rating(&self, user_id: Uuid, book_id: Uuid) -> Result<Option<RatedBook>> {
        Database::get_rating(self, user_id, book_id)
    }

    fn get_book(&self, book_id: Uuid) -> Result<Option<Book>> {
        Database::get_book(self, book_id)
    }

    fn ensure_book_exists(&self, book: BookRef) -> Result<Book> {
        Database::ensure_book_exists(self, book)
    }

    fn commit_rating_plan(&self, user_id: Uuid, plan: &RatingPlan) -> Result<RatingOutcome> {
        Database::commit_rating_plan(self, user_id, plan)
    }
}

fn insert_rating(tx: &Transaction, user_id: Uuid, draft: &RatingDraft) -> Result<RatedBook> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    tx.execute(
        "INSERT INTO ratings (id, user_id, book_id, rating, sentiment, tied_book_ids, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        (
            id.to_string(),
            user_id.to_string(),
            draft.book_id.to_string(),
            draft.rating,
            draft.sentiment.as_str(),
            serde_json::to_string(&draft.tied_book_ids)?,
            now.to_rfc3339(),
            now.to_rfc3339(),
        ),
    )
    .with_context(|| format!("Failed to insert rating for book {}", draft.book_id))?;

    Ok(RatedBook {
        id,
        user_id,
        book_id: draft.book_id,
        rating: draft.rating,
        sentiment: draft.sentiment,
        tied_book_ids: draft.tied_book_ids.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Update an existing rating's value and tie list. The row must belong to `user_id`.
fn update_ties(tx: &Transaction, user_id: Uuid, update: &RatingUpdate) -> Result<RatedBook> {
    let now = Utc::now();
    let rows = tx.execute(
        "UPDATE ratings SET rating = ?, tied_book_ids = ?, updated_at = ?
         WHERE book_id = ? AND user_id = ?",
        (
            update.rating,
            serde_json::to_string(&update.tied_book_ids)?,
            now.to_rfc3339(),
            update.book_id.to_string(),
            user_id.to_string(),
        ),
    )?;

    if rows == 0 {
        anyhow::bail!(
            "Rating for book {} not found for user {}",
            update.book_id,
            user_id
        );
    }

    tx.query_row(
        &format!("SELECT {RATING_COLUMNS} FROM ratings WHERE user_id = ? AND book_id = ?"),
        (user_id.to_string(), update.book_id.to_string()),
        rated_book_from_row,
    )
    .context("Failed to reload updated rating")
}

fn book_from_row(row: &Row) -> rusqlite::Result<Book> {
    Ok(Book {
        id: parse_uuid(row.get::<_, String>(0)?),
        external_ref: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        cover_url: row.get(4)?,
        category: row.get(5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn rated_book_from_row(row: &Row) -> rusqlite::Result<RatedBook> {
    let sentiment: String = row.get(4)?;
    let ties_json: String = row.get(5)?;

    Ok(RatedBook {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        book_id: parse_uuid(row.get::<_, String>(2)?),
        rating: row.get(3)?,
        sentiment: SentimentBand::from_str(&sentiment).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown sentiment '{}'", sentiment).into(),
            )
        })?,
        tied_book_ids: serde_json::from_str(&ties_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
