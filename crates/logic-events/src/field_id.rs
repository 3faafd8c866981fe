#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

/// A reference to a driver field, of the form `moniker.field`.
///
/// `FieldId` is the shared currency between the poll cache, the catalogue's
/// `sources` lists, and the provider collaborator: every place a virtual
/// field names an upstream value, it does so with one of these.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    pub moniker: String,
    pub field: String,
}

/// Why a candidate `moniker.field` string failed to parse as a [`FieldId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldIdError {
    #[error("field reference '{0}' is missing the '.' separator between moniker and field")]
    MissingSeparator(String),

    #[error("field reference '{0}' has an empty moniker")]
    EmptyMoniker(String),

    #[error("field name '{0}' is empty")]
    EmptyFieldName(String),

    #[error(
        "field name '{name}' is invalid: first character must be alphanumeric, \
         later characters must be alphanumeric, '-' or '_'"
    )]
    InvalidFieldName { name: String },
}

impl FieldId {
    pub fn new(moniker: impl Into<String>, field: impl Into<String>) -> Result<Self, FieldIdError> {
        let moniker = moniker.into();
        let field = field.into();
        if moniker.is_empty() {
            return Err(FieldIdError::EmptyMoniker(format!("{moniker}.{field}")));
        }
        validate_field_name(&field)?;
        Ok(Self { moniker, field })
    }
}

/// First character alphanumeric; subsequent characters alphanumeric, `-`, or `_`.
pub fn validate_field_name(name: &str) -> Result<(), FieldIdError> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(FieldIdError::EmptyFieldName(name.to_string())),
        Some(c) if !c.is_alphanumeric() => {
            return Err(FieldIdError::InvalidFieldName { name: name.to_string() });
        }
        Some(_) => {}
    }
    for c in chars {
        if !(c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(FieldIdError::InvalidFieldName { name: name.to_string() });
        }
    }
    Ok(())
}

impl FromStr for FieldId {
    type Err = FieldIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dot = s.find('.').ok_or_else(|| FieldIdError::MissingSeparator(s.to_string()))?;
        let (moniker, rest) = s.split_at(dot);
        let field = &rest[1..];
        FieldId::new(moniker, field)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.moniker, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moniker_dot_field() {
        let id: FieldId = "gw.Door1".parse().unwrap();
        assert_eq!(id.moniker, "gw");
        assert_eq!(id.field, "Door1");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(matches!("gwDoor1".parse::<FieldId>(), Err(FieldIdError::MissingSeparator(_))));
    }

    #[test]
    fn rejects_empty_moniker() {
        assert!(matches!(".Door1".parse::<FieldId>(), Err(FieldIdError::EmptyMoniker(_))));
    }

    #[test]
    fn rejects_field_name_starting_with_hyphen() {
        assert!(matches!("gw.-Door1".parse::<FieldId>(), Err(FieldIdError::InvalidFieldName { .. })));
    }

    #[test]
    fn accepts_hyphen_and_underscore_after_first_char() {
        assert!("gw.Door-1_a".parse::<FieldId>().is_ok());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let id = FieldId::new("gw", "Door1").unwrap();
        let round_tripped: FieldId = id.to_string().parse().unwrap();
        assert_eq!(id, round_tripped);
    }
}
