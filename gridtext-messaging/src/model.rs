//! Thread and text message models.

use serde::{Deserialize, Serialize};

use crate::clock::format_duration;
use crate::number::PhoneNumber;

/// A conversation between a fixed set of phone numbers.
///
/// Thread identity is the participant set itself: two texts belong to
/// the same thread exactly when sender plus recipients form the same
/// set of numbers. A three-way conversation is therefore a different
/// thread than any two-way conversation among the same people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    /// Database id of the thread
    pub id: i64,
    /// Optional display name, unset for most conversations
    pub name: Option<String>,
    /// Every number taking part, sorted by digit string
    pub participants: Vec<PhoneNumber>,
}

impl Thread {
    /// Name to show in a thread listing: the stored name when one was
    /// set, otherwise the comma-joined participant numbers.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => join_numbers(&self.participants),
        }
    }

    /// Participants other than `viewer`, in participant order. This is
    /// the header a phone screen shows for the conversation.
    pub fn others(&self, viewer: &PhoneNumber) -> Vec<PhoneNumber> {
        self.participants
            .iter()
            .filter(|number| *number != viewer)
            .cloned()
            .collect()
    }
}

/// A single text message inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    /// Database id of the text
    pub id: i64,
    /// Thread this text belongs to
    pub thread_id: i64,
    /// Number the text was sent from
    pub sender: PhoneNumber,
    /// Thread participants minus the sender, sorted by digit string
    pub recipients: Vec<PhoneNumber>,
    /// Message body
    pub content: String,
    /// Logical game time the text was sent, in seconds
    pub sent_at: i64,
    /// Wall-clock creation time, in milliseconds since the epoch
    pub created_at: i64,
}

impl Text {
    /// Elapsed game time since this text was sent, e.g.
    /// "1 hour, 10 minutes ago". `now` is the current game time in
    /// seconds; stamps in the future read as "moments ago".
    pub fn sent_ago(&self, now: i64) -> String {
        format!("{} ago", format_duration(now - self.sent_at))
    }
}

fn join_numbers(numbers: &[PhoneNumber]) -> String {
    numbers
        .iter()
        .map(|number| number.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(raw: &str) -> PhoneNumber {
        PhoneNumber::parse(raw).unwrap()
    }

    fn sample_thread() -> Thread {
        Thread {
            id: 1,
            name: None,
            participants: vec![number("111-0000"), number("555-0001"), number("555-0002")],
        }
    }

    #[test]
    fn test_display_name_defaults_to_participants() {
        let thread = sample_thread();
        assert_eq!(thread.display_name(), "111-0000, 555-0001, 555-0002");
    }

    #[test]
    fn test_display_name_prefers_stored_name() {
        let mut thread = sample_thread();
        thread.name = Some("the crew".to_string());
        assert_eq!(thread.display_name(), "the crew");
    }

    #[test]
    fn test_others_excludes_viewer() {
        let thread = sample_thread();
        let others = thread.others(&number("555-0001"));
        assert_eq!(others, vec![number("111-0000"), number("555-0002")]);
    }

    #[test]
    fn test_sent_ago() {
        let text = Text {
            id: 1,
            thread_id: 1,
            sender: number("555-0001"),
            recipients: vec![number("555-0002")],
            content: "hi".to_string(),
            sent_at: 1_000,
            created_at: 0,
        };
        assert_eq!(text.sent_ago(1_030), "moments ago");
        assert_eq!(text.sent_ago(1_000 + 3_660), "1 hour, 1 minute ago");
        // future stamp, clock moved backwards
        assert_eq!(text.sent_ago(500), "moments ago");
    }
}
