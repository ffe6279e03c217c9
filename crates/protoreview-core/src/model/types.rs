//! Identifier types shared by every protoreview component.
//!
//! All identifiers are opaque strings. They are validated once at the edge
//! (deserialization, CLI parsing) so the rest of the code can treat them as
//! well-formed keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upper bound on the byte length of any identifier.
pub const MAX_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// The kind of identifier that failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A step identifier.
    StepId,
    /// A user identifier.
    UserId,
    /// A protocol identifier.
    ProtocolId,
    /// A pull request identifier.
    PullRequestId,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepId => write!(f, "step id"),
            Self::UserId => write!(f, "user id"),
            Self::ProtocolId => write!(f, "protocol id"),
            Self::PullRequestId => write!(f, "pull request id"),
        }
    }
}

/// Error returned when an identifier string is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?} ({})", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

fn validate_id(kind: ErrorKind, s: &str) -> Result<(), ValidationError> {
    let fail = |reason: String| ValidationError {
        kind,
        value: s.to_owned(),
        reason,
    };
    if s.is_empty() {
        return Err(fail("must not be empty".to_owned()));
    }
    if s.len() > MAX_ID_LEN {
        return Err(fail(format!(
            "must be at most {MAX_ID_LEN} bytes, got {}",
            s.len()
        )));
    }
    if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(fail(
            "must not contain whitespace or control characters".to_owned(),
        ));
    }
    Ok(())
}

/// 24 lowercase hex characters, the shape of the document ids existing
/// callers already hold.
fn random_hex_id() -> String {
    let n: u128 = rand::random();
    format!("{:024x}", n >> 32)
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier, validating its format.
            ///
            /// # Errors
            /// Returns an error if the string is empty, too long, or contains
            /// whitespace or control characters.
            pub fn new(s: &str) -> Result<Self, ValidationError> {
                validate_id($kind, s)?;
                Ok(Self(s.to_owned()))
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                validate_id($kind, &s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_id!(
    /// Identity of one protocol step. Stable across versions: a step id is
    /// never reassigned to a different conceptual step.
    StepId,
    ErrorKind::StepId
);

string_id!(
    /// Identity of a user, as supplied by the identity collaborator.
    UserId,
    ErrorKind::UserId
);

string_id!(
    /// Identity of a protocol record.
    ProtocolId,
    ErrorKind::ProtocolId
);

string_id!(
    /// Identity of a pull request record.
    PullRequestId,
    ErrorKind::PullRequestId
);

impl ProtocolId {
    /// Generate a fresh random protocol id.
    #[must_use]
    pub fn random() -> Self {
        Self(random_hex_id())
    }
}

impl PullRequestId {
    /// Generate a fresh random pull request id.
    #[must_use]
    pub fn random() -> Self {
        Self(random_hex_id())
    }
}

/// Generate a random id for records that have no typed identity of their own
/// (comments).
#[must_use]
pub fn random_record_id() -> String {
    random_hex_id()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
