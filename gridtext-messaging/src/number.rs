//! Phone number value object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MessagingError, Result};

/// Number of digits in a phone number.
pub const NUMBER_DIGITS: usize = 7;

/// A seven-digit in-game phone number.
///
/// A number is a digit string, never an integer: leading zeros are
/// significant, so "0011223" and "11223" are different numbers. The
/// canonical form is the bare digits ("5550001"); the display form
/// inserts a hyphen after the third digit ("555-0001"). Both forms
/// parse back to the same number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse a phone number from user input.
    ///
    /// Hyphens are stripped before validation, so "555-0001" and
    /// "5550001" are accepted equally. Anything that does not reduce
    /// to exactly seven ASCII digits is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(|c| *c != '-').collect();
        if digits.len() != NUMBER_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(MessagingError::InvalidNumber(raw.to_string()));
        }
        Ok(Self(digits))
    }

    /// The bare digit string, as stored.
    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", &self.0[..3], &self.0[3..])
    }
}

impl FromStr for PhoneNumber {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = MessagingError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.to_string()
    }
}
