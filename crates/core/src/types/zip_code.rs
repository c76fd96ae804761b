//! Brazilian postal code (CEP) type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ZipCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ZipCodeError {
    /// The input has no digits at all.
    #[error("zip code cannot be empty")]
    Empty,
    /// The input does not have exactly eight digits.
    #[error("zip code must have {expected} digits (got {got})")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
        /// Number of digits found after normalization.
        got: usize,
    },
}

/// A normalized Brazilian zip code: exactly eight ASCII digits.
///
/// ## Examples
///
/// ```
/// use marketplace_core::ZipCode;
///
/// let zip = ZipCode::parse("01310-100").unwrap();
/// assert_eq!(zip.as_str(), "01310100");
/// assert_eq!(zip.formatted(), "01310-100");
///
/// assert!(ZipCode::parse("1234").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Number of digits in a CEP.
    pub const LENGTH: usize = 8;

    /// Strip every non-digit character.
    ///
    /// Normalizing an already-normalized code returns it unchanged.
    #[must_use]
    pub fn normalize(input: &str) -> String {
        input.chars().filter(char::is_ascii_digit).collect()
    }

    /// Parse a zip code, accepting any punctuation around the digits.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not contain exactly eight digits.
    pub fn parse(input: &str) -> Result<Self, ZipCodeError> {
        let digits = Self::normalize(input);
        if digits.is_empty() {
            return Err(ZipCodeError::Empty);
        }
        if digits.len() != Self::LENGTH {
            return Err(ZipCodeError::WrongLength {
                expected: Self::LENGTH,
                got: digits.len(),
            });
        }
        Ok(Self(digits))
    }

    /// Returns the eight digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the zip code as `NNNNN-NNN`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let (head, tail) = self.0.split_at(5);
        format!("{head}-{tail}")
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl std::str::FromStr for ZipCode {
    type Err = ZipCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = ZipCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

impl AsRef<str> for ZipCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
