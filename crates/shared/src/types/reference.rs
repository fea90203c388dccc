//! Foreign-key references that may arrive as a bare id or an expanded record.
//!
//! Callers hand the engine company, expense and user references in either
//! form. Every foreign-key read goes through [`Reference::resolve`] so both
//! forms compare and persist identically.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A record that owns a canonical typed identifier.
pub trait Identified {
    /// The typed identifier of the record.
    type Id: Copy + Display + FromStr;

    /// Entity name used in error messages.
    const KIND: &'static str;

    /// Returns the record's identifier.
    fn id(&self) -> Self::Id;
}

/// A bare identifier that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} ID format: '{raw}'")]
pub struct InvalidReference {
    /// Entity name of the reference.
    pub kind: &'static str,
    /// The raw value that failed to parse.
    pub raw: String,
}

/// Either a bare identifier or a previously expanded record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    /// A bare identifier, not yet validated.
    Id(String),
    /// An expanded record.
    Record(T),
}

impl<T: Identified> Reference<T> {
    /// Builds a reference from an already typed identifier.
    pub fn from_id(id: T::Id) -> Self {
        Self::Id(id.to_string())
    }

    /// Returns the canonical identifier of the referenced record.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReference`] when the bare-identifier form is malformed.
    pub fn resolve(&self) -> Result<T::Id, InvalidReference> {
        match self {
            Self::Record(record) => Ok(record.id()),
            Self::Id(raw) => raw.trim().parse().map_err(|_| InvalidReference {
                kind: T::KIND,
                raw: raw.clone(),
            }),
        }
    }

    /// Returns the expanded record, if this reference carries one.
    pub fn record(&self) -> Option<&T> {
        match self {
            Self::Record(record) => Some(record),
            Self::Id(_) => None,
        }
    }
}

impl<T> From<T> for Reference<T> {
    fn from(record: T) -> Self {
        Self::Record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompanyId;
    use rstest::rstest;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Company {
        id: CompanyId,
        name: String,
    }

    impl Identified for Company {
        type Id = CompanyId;
        const KIND: &'static str = "company";

        fn id(&self) -> CompanyId {
            self.id
        }
    }

    fn acme() -> Company {
        Company {
            id: CompanyId::new(),
            name: "Acme".to_string(),
        }
    }

    #[test]
    fn test_both_forms_resolve_to_same_id() {
        let company = acme();
        let bare: Reference<Company> = Reference::from_id(company.id);
        let expanded: Reference<Company> = company.clone().into();

        assert_eq!(bare.resolve().unwrap(), company.id);
        assert_eq!(expanded.resolve().unwrap(), company.id);
        assert!(bare.record().is_none());
        assert_eq!(expanded.record(), Some(&company));
    }

    #[rstest]
    #[case("")]
    #[case("not-a-uuid")]
    #[case("507f1f77bcf86cd799439011")]
    fn test_malformed_id_is_rejected(#[case] raw: &str) {
        let reference: Reference<Company> = Reference::Id(raw.to_string());
        let err = reference.resolve().unwrap_err();
        assert_eq!(err.kind, "company");
        assert_eq!(err.raw, raw);
        assert!(err.to_string().contains("Invalid company ID format"));
    }

    #[test]
    fn test_deserializes_either_form() {
        let company = acme();

        let bare: Reference<Company> =
            serde_json::from_value(serde_json::json!(company.id.to_string())).unwrap();
        assert_eq!(bare.resolve().unwrap(), company.id);

        let expanded: Reference<Company> =
            serde_json::from_value(serde_json::to_value(&company).unwrap()).unwrap();
        assert_eq!(expanded, Reference::Record(company));
    }
}
