//! Core library for gridtext, an in-game text messaging system.
//!
//! Characters own seven-digit phone numbers and text each other
//! through threads. A thread is identified by its participant set, so
//! a message to the same group of numbers always lands in the same
//! conversation, and a three-way conversation is distinct from any
//! pair among the same people. Read state and message deletion are
//! tracked per number: one participant hiding a text or catching up
//! on a thread never affects what the others see.
//!
//! Everything is persisted in a single SQLite database owned by
//! [`MessageStore`]. Message timestamps come from a [`GameClock`], so
//! the in-game calendar can run apart from the wall clock.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gridtext_messaging::{ManualClock, MessageStore};
//!
//! # fn main() -> gridtext_messaging::Result<()> {
//! let store = MessageStore::open_in_memory(Arc::new(ManualClock::new(0)))?;
//! let text = store.send("555-0001", &["555-0002"], "you up?")?;
//!
//! let threads = store.get_threads_for("555-0002")?;
//! assert_eq!(threads[&text.thread_id].content, "you up?");
//! assert!(!store.has_read(text.thread_id, "555-0002")?);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod model;
pub mod number;
pub mod store;

mod error;

pub use clock::{format_duration, GameClock, ManualClock, OffsetClock, SystemClock};
pub use error::{MessagingError, Result};
pub use model::{Text, Thread};
pub use number::PhoneNumber;
pub use store::MessageStore;
