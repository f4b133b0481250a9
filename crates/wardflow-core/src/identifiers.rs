//! Validated identifier newtypes shared across the workspace.
//!
//! String-backed identifiers (`AgentId`, `ConversationId`, `CapabilityName`)
//! are validated on construction to keep audit records and routing keys free
//! of injection and path-traversal garbage. Generated identifiers
//! (`WorkflowId`, `CorrelationId`) are UUID-backed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error type for identifier validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    /// The identifier string is empty
    Empty,
    /// The identifier contains only whitespace
    WhitespaceOnly,
    /// The identifier has leading or trailing whitespace
    LeadingTrailingWhitespace,
    /// The identifier contains invalid characters
    InvalidCharacters,
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identifier cannot be empty"),
            Self::WhitespaceOnly => write!(f, "identifier cannot be whitespace-only"),
            Self::LeadingTrailingWhitespace => {
                write!(f, "identifier cannot have leading or trailing whitespace")
            }
            Self::InvalidCharacters => write!(
                f,
                "identifier can only contain alphanumeric characters, hyphens, underscores, and dots"
            ),
        }
    }
}

impl std::error::Error for IdValidationError {}

fn validate_identifier(s: &str) -> Result<(), IdValidationError> {
    if s.is_empty() {
        return Err(IdValidationError::Empty);
    }
    if s.trim().is_empty() {
        return Err(IdValidationError::WhitespaceOnly);
    }
    if s != s.trim() {
        return Err(IdValidationError::LeadingTrailingWhitespace);
    }
    if !s
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(IdValidationError::InvalidCharacters);
    }
    Ok(())
}

macro_rules! validated_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Parse and validate from a string.
            ///
            /// Returns an error if the string is empty, whitespace-only,
            /// padded with whitespace, or contains characters outside
            /// `[A-Za-z0-9._-]`.
            pub fn parse(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
                let s = id.as_ref();
                validate_identifier(s)?;
                Ok(Self(s.to_string()))
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<&str> for $name {
            /// # Panics
            ///
            /// Panics if the string fails validation. For non-panicking
            /// construction, use `parse()` instead.
            fn from(s: &str) -> Self {
                Self::parse(s).unwrap_or_else(|e| {
                    panic!("Invalid {} '{}': {}", stringify!($name), s, e)
                })
            }
        }

        impl From<String> for $name {
            /// # Panics
            ///
            /// Panics if the string fails validation. For non-panicking
            /// construction, use `parse()` instead.
            fn from(s: String) -> Self {
                Self::parse(&s).unwrap_or_else(|e| {
                    panic!("Invalid {} '{}': {}", stringify!($name), s, e)
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

validated_id! {
    /// Unique identifier for an agent participating in a workflow.
    ///
    /// Valid ids are non-empty, unpadded, and limited to alphanumerics,
    /// hyphens, underscores, and dots.
    AgentId
}

validated_id! {
    /// Identifier for an ordered message stream shared by a set of agents.
    ConversationId
}

validated_id! {
    /// Name of an external capability an agent may request through the
    /// gateway (tool call, data query).
    CapabilityName
}

macro_rules! generated_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::generate()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

generated_id! {
    /// Identifier for one top-level workflow, created at submission.
    WorkflowId
}

generated_id! {
    /// Correlation identifier tying a capability request to its verdict,
    /// audit trail, and retries.
    CorrelationId
}
