//! SQLite-backed storage for numbers, threads, and texts.
//!
//! A thread is addressed by its participant set: the sorted, deduped
//! digit strings of everyone involved, joined with commas, held in a
//! unique column. Sending a text resolves the set to a thread in one
//! transaction, creating numbers and the thread on first contact.
//! Creating a thread whose key is already taken fails the unique
//! constraint and is answered with the existing row, so resolving a
//! set is idempotent at the storage layer.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE numbers (
//!     id     INTEGER PRIMARY KEY,
//!     digits TEXT NOT NULL UNIQUE
//! );
//!
//! CREATE TABLE threads (
//!     id               INTEGER PRIMARY KEY,
//!     name             TEXT,
//!     participants_key TEXT NOT NULL UNIQUE
//! );
//!
//! CREATE TABLE thread_participants (
//!     thread_id INTEGER NOT NULL REFERENCES threads(id),
//!     number_id INTEGER NOT NULL REFERENCES numbers(id),
//!     PRIMARY KEY (thread_id, number_id)
//! );
//!
//! CREATE TABLE thread_reads (
//!     thread_id INTEGER NOT NULL REFERENCES threads(id),
//!     number_id INTEGER NOT NULL REFERENCES numbers(id),
//!     PRIMARY KEY (thread_id, number_id)
//! );
//!
//! CREATE TABLE texts (
//!     id         INTEGER PRIMARY KEY,
//!     thread_id  INTEGER NOT NULL REFERENCES threads(id),
//!     sender_id  INTEGER NOT NULL REFERENCES numbers(id),
//!     content    TEXT NOT NULL,
//!     sent_at    INTEGER NOT NULL,
//!     created_at INTEGER NOT NULL
//! );
//!
//! CREATE TABLE text_hidden (
//!     text_id   INTEGER NOT NULL REFERENCES texts(id),
//!     number_id INTEGER NOT NULL REFERENCES numbers(id),
//!     PRIMARY KEY (text_id, number_id)
//! );
//! ```
//!
//! Read state and per-number deletion are membership sets, not flags
//! on the text row: a row in `thread_reads` means "this number has
//! read the thread", a row in `text_hidden` means "this number no
//! longer sees this text". Texts themselves are never deleted.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use crate::clock::GameClock;
use crate::error::{MessagingError, Result};
use crate::model::{Text, Thread};
use crate::number::PhoneNumber;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS numbers (
    id     INTEGER PRIMARY KEY,
    digits TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS threads (
    id               INTEGER PRIMARY KEY,
    name             TEXT,
    participants_key TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS thread_participants (
    thread_id INTEGER NOT NULL REFERENCES threads(id),
    number_id INTEGER NOT NULL REFERENCES numbers(id),
    PRIMARY KEY (thread_id, number_id)
);

CREATE TABLE IF NOT EXISTS thread_reads (
    thread_id INTEGER NOT NULL REFERENCES threads(id),
    number_id INTEGER NOT NULL REFERENCES numbers(id),
    PRIMARY KEY (thread_id, number_id)
);

CREATE TABLE IF NOT EXISTS texts (
    id         INTEGER PRIMARY KEY,
    thread_id  INTEGER NOT NULL REFERENCES threads(id),
    sender_id  INTEGER NOT NULL REFERENCES numbers(id),
    content    TEXT NOT NULL,
    sent_at    INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_texts_thread_sent
    ON texts(thread_id, sent_at DESC);

CREATE TABLE IF NOT EXISTS text_hidden (
    text_id   INTEGER NOT NULL REFERENCES texts(id),
    number_id INTEGER NOT NULL REFERENCES numbers(id),
    PRIMARY KEY (text_id, number_id)
);
"#;

const TEXT_COLUMNS: &str = "tx.id, tx.thread_id, n.digits, tx.content, tx.sent_at, tx.created_at";

/// Message store backed by a single SQLite connection.
///
/// All game-time stamps come from the [`GameClock`] handed in at
/// construction; the store never reads the wall clock for them. The
/// connection is not shared, so callers serialize access; separate
/// store instances may point at the same database file.
pub struct MessageStore {
    conn: Connection,
    clock: Arc<dyn GameClock>,
}

impl MessageStore {
    /// Open (or create) the message database at `path`, creating
    /// parent directories as needed.
    pub fn open(path: &Path, clock: Arc<dyn GameClock>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self { conn, clock };
        store.init_schema()?;
        debug!("opened message database at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory store. Meant for tests and tooling.
    pub fn open_in_memory(clock: Arc<dyn GameClock>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn, clock };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        debug!("message database schema ready");
        Ok(())
    }

    /// Current game time in seconds, read from the store's clock.
    pub fn game_now(&self) -> i64 {
        self.clock.now()
    }

    /// Validate `raw` and register the number, returning the parsed
    /// form. Registering an already-known number is a no-op.
    pub fn resolve_or_create(&self, raw: &str) -> Result<PhoneNumber> {
        let number = PhoneNumber::parse(raw)?;
        ensure_number(&self.conn, &number)?;
        Ok(number)
    }

    /// Send a text from `sender` to `recipients`.
    ///
    /// The participant set is the sender plus every recipient, deduped;
    /// the sender is always stripped from the recipient side. The set
    /// resolves to the thread holding exactly those participants,
    /// created on first contact along with any unseen numbers. The new
    /// text marks the thread unread for everyone but the sender, who is
    /// considered caught up. Everything happens in one transaction.
    ///
    /// Fails with [`MessagingError::NoRecipients`] when the set
    /// collapses to the sender alone.
    pub fn send(&self, sender: &str, recipients: &[&str], content: &str) -> Result<Text> {
        let sender = PhoneNumber::parse(sender)?;
        let mut participants = BTreeSet::new();
        participants.insert(sender.clone());
        for raw in recipients {
            participants.insert(PhoneNumber::parse(raw)?);
        }
        if participants.len() < 2 {
            return Err(MessagingError::NoRecipients);
        }

        let sent_at = self.clock.now();
        let created_at = Utc::now().timestamp_millis();

        let tx = self.conn.unchecked_transaction()?;

        let sender_id = ensure_number(&tx, &sender)?;
        let mut participant_ids = Vec::with_capacity(participants.len());
        for number in &participants {
            if *number == sender {
                participant_ids.push(sender_id);
            } else {
                participant_ids.push(ensure_number(&tx, number)?);
            }
        }

        let key = participants_key(&participants);
        let thread_id = thread_for_key(&tx, &key)?;
        for number_id in &participant_ids {
            tx.execute(
                "INSERT OR IGNORE INTO thread_participants (thread_id, number_id) VALUES (?1, ?2)",
                params![thread_id, number_id],
            )?;
        }

        tx.execute(
            "INSERT INTO texts (thread_id, sender_id, content, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![thread_id, sender_id, content, sent_at, created_at],
        )?;
        let text_id = tx.last_insert_rowid();

        // the new text is unread for everyone but the sender
        for number_id in &participant_ids {
            if *number_id == sender_id {
                tx.execute(
                    "INSERT OR IGNORE INTO thread_reads (thread_id, number_id) VALUES (?1, ?2)",
                    params![thread_id, number_id],
                )?;
            } else {
                tx.execute(
                    "DELETE FROM thread_reads WHERE thread_id = ?1 AND number_id = ?2",
                    params![thread_id, number_id],
                )?;
            }
        }

        tx.commit()?;

        let recipients = participants
            .iter()
            .filter(|number| **number != sender)
            .cloned()
            .collect();
        info!("text {} sent on thread {} by {}", text_id, thread_id, sender);
        Ok(Text {
            id: text_id,
            thread_id,
            sender,
            recipients,
            content: content.to_string(),
            sent_at,
            created_at,
        })
    }

    /// Threads `number` takes part in, keyed by thread id, each mapped
    /// to its most recently sent text (ties broken by highest text id).
    ///
    /// Hidden texts are not filtered here; hiding affects histories,
    /// not the thread listing. A valid number the store has never seen
    /// yields an empty map.
    pub fn get_threads_for(&self, number: &str) -> Result<BTreeMap<i64, Text>> {
        let number = PhoneNumber::parse(number)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEXT_COLUMNS}
             FROM texts tx
             JOIN numbers n ON n.id = tx.sender_id
             WHERE tx.thread_id IN (
                       SELECT tp.thread_id FROM thread_participants tp
                       JOIN numbers pn ON pn.id = tp.number_id
                       WHERE pn.digits = ?1)
               AND tx.id = (
                       SELECT t2.id FROM texts t2
                       WHERE t2.thread_id = tx.thread_id
                       ORDER BY t2.sent_at DESC, t2.id DESC
                       LIMIT 1)"
        ))?;
        let rows = stmt.query_map(params![number.digits()], text_row)?;
        let mut latest = Vec::new();
        for row in rows {
            latest.push(row?);
        }

        let mut threads = BTreeMap::new();
        for row in latest {
            let text = self.hydrate(row)?;
            threads.insert(text.thread_id, text);
        }
        Ok(threads)
    }

    /// Every text visible to `number`, oldest first: texts of all
    /// threads the number takes part in, minus the ones it has hidden.
    pub fn get_texts_for(&self, number: &str) -> Result<Vec<Text>> {
        let number = PhoneNumber::parse(number)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEXT_COLUMNS}
             FROM texts tx
             JOIN numbers n ON n.id = tx.sender_id
             WHERE tx.thread_id IN (
                       SELECT tp.thread_id FROM thread_participants tp
                       JOIN numbers pn ON pn.id = tp.number_id
                       WHERE pn.digits = ?1)
               AND tx.id NOT IN (
                       SELECT th.text_id FROM text_hidden th
                       JOIN numbers hn ON hn.id = th.number_id
                       WHERE hn.digits = ?1)
             ORDER BY tx.sent_at, tx.id"
        ))?;
        let rows = stmt.query_map(params![number.digits()], text_row)?;
        let mut collected = Vec::new();
        for row in rows {
            collected.push(row?);
        }

        let mut texts = Vec::with_capacity(collected.len());
        for row in collected {
            texts.push(self.hydrate(row)?);
        }
        Ok(texts)
    }

    /// Number of texts visible to `number`, without loading them.
    pub fn count_texts_for(&self, number: &str) -> Result<u64> {
        let number = PhoneNumber::parse(number)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM texts tx
             WHERE tx.thread_id IN (
                       SELECT tp.thread_id FROM thread_participants tp
                       JOIN numbers pn ON pn.id = tp.number_id
                       WHERE pn.digits = ?1)
               AND tx.id NOT IN (
                       SELECT th.text_id FROM text_hidden th
                       JOIN numbers hn ON hn.id = th.number_id
                       WHERE hn.digits = ?1)",
            params![number.digits()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// The last `limit` texts of a thread still visible to `viewer`,
    /// in chronological order. This is the window a phone screen
    /// renders when the thread is opened.
    pub fn thread_texts(&self, thread_id: i64, viewer: &str, limit: usize) -> Result<Vec<Text>> {
        let viewer = PhoneNumber::parse(viewer)?;
        require_thread(&self.conn, thread_id)?;
        // SQLite reads a negative LIMIT as no limit, so clamp rather than wrap
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEXT_COLUMNS}
             FROM texts tx
             JOIN numbers n ON n.id = tx.sender_id
             WHERE tx.thread_id = ?1
               AND tx.id NOT IN (
                       SELECT th.text_id FROM text_hidden th
                       JOIN numbers hn ON hn.id = th.number_id
                       WHERE hn.digits = ?2)
             ORDER BY tx.sent_at DESC, tx.id DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![thread_id, viewer.digits(), limit], text_row)?;
        let mut collected = Vec::new();
        for row in rows {
            collected.push(row?);
        }
        collected.reverse();

        let mut texts = Vec::with_capacity(collected.len());
        for row in collected {
            texts.push(self.hydrate(row)?);
        }
        Ok(texts)
    }

    /// Load a thread with its participant set.
    pub fn get_thread(&self, thread_id: i64) -> Result<Thread> {
        let found: Option<(i64, Option<String>)> = self
            .conn
            .query_row(
                "SELECT id, name FROM threads WHERE id = ?1",
                params![thread_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (id, name) = found.ok_or(MessagingError::ThreadNotFound(thread_id))?;
        let participants = self.participants_of(id)?;
        Ok(Thread {
            id,
            name,
            participants,
        })
    }

    /// Load a single text by id.
    pub fn get_text(&self, text_id: i64) -> Result<Text> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {TEXT_COLUMNS}
                     FROM texts tx
                     JOIN numbers n ON n.id = tx.sender_id
                     WHERE tx.id = ?1"
                ),
                params![text_id],
                text_row,
            )
            .optional()?
            .ok_or(MessagingError::TextNotFound(text_id))?;
        self.hydrate(row)
    }

    /// Set or clear a thread's display name.
    pub fn set_thread_name(&self, thread_id: i64, name: Option<&str>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE threads SET name = ?1 WHERE id = ?2",
            params![name, thread_id],
        )?;
        if updated == 0 {
            return Err(MessagingError::ThreadNotFound(thread_id));
        }
        Ok(())
    }

    /// Mark a thread read for `number`. Idempotent.
    ///
    /// The thread must exist and the number must be known; read state
    /// is never a reason to invent either.
    pub fn mark_read(&self, thread_id: i64, number: &str) -> Result<()> {
        let number = PhoneNumber::parse(number)?;
        require_thread(&self.conn, thread_id)?;
        let number_id = known_number_id(&self.conn, &number)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO thread_reads (thread_id, number_id) VALUES (?1, ?2)",
            params![thread_id, number_id],
        )?;
        debug!("thread {} marked read for {}", thread_id, number);
        Ok(())
    }

    /// Mark a thread unread for `number`. Idempotent, with the same
    /// preconditions as [`MessageStore::mark_read`].
    pub fn mark_unread(&self, thread_id: i64, number: &str) -> Result<()> {
        let number = PhoneNumber::parse(number)?;
        require_thread(&self.conn, thread_id)?;
        let number_id = known_number_id(&self.conn, &number)?;
        self.conn.execute(
            "DELETE FROM thread_reads WHERE thread_id = ?1 AND number_id = ?2",
            params![thread_id, number_id],
        )?;
        debug!("thread {} marked unread for {}", thread_id, number);
        Ok(())
    }

    /// Whether `number` has read the thread. A valid number the store
    /// has never seen reads as unread rather than erroring; only the
    /// thread id is validated.
    pub fn has_read(&self, thread_id: i64, number: &str) -> Result<bool> {
        let number = PhoneNumber::parse(number)?;
        require_thread(&self.conn, thread_id)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM thread_reads tr
             JOIN numbers n ON n.id = tr.number_id
             WHERE tr.thread_id = ?1 AND n.digits = ?2",
            params![thread_id, number.digits()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Hide a text from `number`'s view of history. Idempotent; other
    /// participants keep seeing the text, and the text row itself is
    /// never removed.
    pub fn hide_text(&self, text_id: i64, number: &str) -> Result<()> {
        let number = PhoneNumber::parse(number)?;
        require_text(&self.conn, text_id)?;
        let number_id = known_number_id(&self.conn, &number)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO text_hidden (text_id, number_id) VALUES (?1, ?2)",
            params![text_id, number_id],
        )?;
        debug!("text {} hidden for {}", text_id, number);
        Ok(())
    }

    fn participants_of(&self, thread_id: i64) -> Result<Vec<PhoneNumber>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.digits FROM thread_participants tp
             JOIN numbers n ON n.id = tp.number_id
             WHERE tp.thread_id = ?1
             ORDER BY n.digits",
        )?;
        let rows = stmt.query_map(params![thread_id], |row| row.get::<_, String>(0))?;
        let mut participants = Vec::new();
        for digits in rows {
            participants.push(PhoneNumber::parse(&digits?)?);
        }
        Ok(participants)
    }

    fn hydrate(&self, row: TextRow) -> Result<Text> {
        let sender = PhoneNumber::parse(&row.sender)?;
        let recipients = self
            .participants_of(row.thread_id)?
            .into_iter()
            .filter(|number| *number != sender)
            .collect();
        Ok(Text {
            id: row.id,
            thread_id: row.thread_id,
            sender,
            recipients,
            content: row.content,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

/// Raw text row before the participant set is attached.
struct TextRow {
    id: i64,
    thread_id: i64,
    sender: String,
    content: String,
    sent_at: i64,
    created_at: i64,
}

fn text_row(row: &rusqlite::Row) -> rusqlite::Result<TextRow> {
    Ok(TextRow {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        sender: row.get(2)?,
        content: row.get(3)?,
        sent_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn participants_key(participants: &BTreeSet<PhoneNumber>) -> String {
    participants
        .iter()
        .map(PhoneNumber::digits)
        .collect::<Vec<_>>()
        .join(",")
}

fn ensure_number(conn: &Connection, number: &PhoneNumber) -> Result<i64> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO numbers (digits) VALUES (?1)",
        params![number.digits()],
    )?;
    if inserted > 0 {
        debug!("registered number {}", number);
    }
    let id = conn.query_row(
        "SELECT id FROM numbers WHERE digits = ?1",
        params![number.digits()],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn known_number_id(conn: &Connection, number: &PhoneNumber) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM numbers WHERE digits = ?1",
        params![number.digits()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| MessagingError::UnknownNumber(number.to_string()))
}

fn thread_for_key(conn: &Connection, key: &str) -> Result<i64> {
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM threads WHERE participants_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?
    {
        return Ok(id);
    }
    create_thread_for_key(conn, key)
}

fn create_thread_for_key(conn: &Connection, key: &str) -> Result<i64> {
    match conn.execute(
        "INSERT INTO threads (participants_key) VALUES (?1)",
        params![key],
    ) {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            debug!("created thread {} for {}", id, key);
            Ok(id)
        }
        // key already taken, answer with the existing row
        Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
            let id = conn.query_row(
                "SELECT id FROM threads WHERE participants_key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(id)
        }
        Err(e) => Err(e.into()),
    }
}

fn require_thread(conn: &Connection, thread_id: i64) -> Result<()> {
    conn.query_row(
        "SELECT 1 FROM threads WHERE id = ?1",
        params![thread_id],
        |_row| Ok(()),
    )
    .optional()?
    .ok_or(MessagingError::ThreadNotFound(thread_id))
}

fn require_text(conn: &Connection, text_id: i64) -> Result<()> {
    conn.query_row(
        "SELECT 1 FROM texts WHERE id = ?1",
        params![text_id],
        |_row| Ok(()),
    )
    .optional()?
    .ok_or(MessagingError::TextNotFound(text_id))
}
