//! Core identifier types with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A cycle anchor day outside 1..=31.
    #[error("cycle anchor day must be between 1 and 31, got {value}")]
    AnchorDayOutOfRange { value: u32 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated client identifier.
    ///
    /// Client IDs must be non-empty strings. They key both the prepaid plan
    /// and every consumption ledger row written for that client.
    ClientId, "client ID"
);

define_string_id!(
    /// A validated time entry identifier.
    ///
    /// Entry IDs must be non-empty strings. They are opaque to the engine and
    /// used only to key ledger rows back to the entry that consumed hours.
    EntryId, "entry ID"
);

define_string_id!(
    /// A validated invoice identifier.
    ///
    /// Invoice IDs tie a batch of ledger rows to the invoice that generated
    /// them, so regenerating that invoice can roll back its own allocations.
    InvoiceId, "invoice ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_rejects_empty() {
        assert!(ClientId::new("").is_err());
        assert!(ClientId::new("client-1").is_ok());
    }

    #[test]
    fn entry_id_rejects_empty() {
        assert!(EntryId::new("").is_err());
        assert!(EntryId::new("entry-1").is_ok());
    }

    #[test]
    fn invoice_id_serde_roundtrip() {
        let id = InvoiceId::new("inv-42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"inv-42\"");
        let parsed: InvoiceId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn invoice_id_serde_rejects_empty() {
        let result: Result<InvoiceId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn client_id_as_ref() {
        let id = ClientId::new("acme").unwrap();
        let s: &str = id.as_ref();
        assert_eq!(s, "acme");
    }
}
