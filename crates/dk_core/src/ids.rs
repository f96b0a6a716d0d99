//! Token identifiers for rooms, users, and candidates.
//! Room and user ids are ASCII tokens `^[A-Za-z0-9_.:-]{1,64}$`. Candidate ids
//! are handed out by the upstream venue search, so they only need to be
//! non-empty, at most 256 bytes, and free of control characters.

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors returned when validating or parsing ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdError {
    Empty,
    TooLong,
    BadChar,
    Control,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::Empty => f.write_str("empty id"),
            IdError::TooLong => f.write_str("id too long"),
            IdError::BadChar => f.write_str("id contains a character outside [A-Za-z0-9_.:-]"),
            IdError::Control => f.write_str("id contains a control character"),
        }
    }
}

const TOKEN_MAX_LEN: usize = 64;
const EXTERNAL_MAX_LEN: usize = 256;

/// Shape check shared by every token newtype.
pub fn check_token(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > TOKEN_MAX_LEN {
        return Err(IdError::TooLong);
    }
    let ok = s
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(IdError::BadChar)
    }
}

/// Looser check for ids minted outside the engine.
pub fn check_external(s: &str) -> Result<(), IdError> {
    if s.trim().is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > EXTERNAL_MAX_LEN {
        return Err(IdError::TooLong);
    }
    if s.chars().any(char::is_control) {
        return Err(IdError::Control);
    }
    Ok(())
}

macro_rules! def_token {
    ($(#[$m:meta])* $name:ident, $check:path) => {
        $(#[$m])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $check(s)?;
                Ok($name(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                $check(&value)?;
                Ok($name(value))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;
            #[inline]
            fn try_from(value: &str) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

def_token!(
    /// Venue identity as handed out by the candidate source.
    CandidateId,
    check_external
);
def_token!(
    /// Participant identity inside a room.
    UserId,
    check_token
);
def_token!(
    /// Room key; stored documents live under `room:{id}`.
    RoomId,
    check_token
);

impl RoomId {
    /// Store key for this room.
    pub fn store_key(&self) -> String {
        let mut key = String::with_capacity(5 + self.0.len());
        key.push_str("room:");
        key.push_str(&self.0);
        key
    }
}
