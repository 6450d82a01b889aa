//! Item data provider boundary.
//!
//! The real provider is a remote service; [`CatalogProvider`] is an
//! in-memory stand-in with the same contract.

use thiserror::Error;

use crate::board::ItemPayload;

/// Lookup failures. `NotFound` and `Transport` stay distinct so a caller
/// can say "not found" rather than "try again".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("{0}")]
    Validation(String),
    #[error("`{0}` not found")]
    NotFound(String),
    #[error("lookup service unavailable: {0}")]
    Transport(String),
}

impl LookupError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            LookupError::Validation(message) => message.clone(),
            LookupError::NotFound(query) => format!("\"{query}\" not found"),
            LookupError::Transport(_) => "Lookup failed, please try again".to_string(),
        }
    }
}

pub trait ItemProvider {
    fn fetch_by_name(&self, name: &str) -> Result<ItemPayload, LookupError>;

    fn fetch_by_fingering(&self, pattern: &str) -> Result<ItemPayload, LookupError>;

    /// An empty list means "no matches", not a failure.
    fn search_suggestions(&self, query: &str) -> Result<Vec<ItemPayload>, LookupError>;
}

/// Six symbols, each a digit or a lowercase letter (`x` marks a muted string).
pub fn is_fingering_pattern(input: &str) -> bool {
    input.chars().count() == 6
        && input
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}

/// Provider backed by a fixed list of payloads.
#[derive(Debug, Clone, Default)]
pub struct CatalogProvider {
    entries: Vec<ItemPayload>,
    outage: Option<String>,
}

impl CatalogProvider {
    pub fn new(entries: Vec<ItemPayload>) -> Self {
        Self {
            entries,
            outage: None,
        }
    }

    /// Every call fails with a transport error until [`Self::restore`].
    pub fn with_outage(mut self, reason: impl Into<String>) -> Self {
        self.outage = Some(reason.into());
        self
    }

    pub fn restore(&mut self) {
        self.outage = None;
    }

    fn available(&self) -> Result<(), LookupError> {
        match &self.outage {
            Some(reason) => Err(LookupError::Transport(reason.clone())),
            None => Ok(()),
        }
    }
}

impl ItemProvider for CatalogProvider {
    fn fetch_by_name(&self, name: &str) -> Result<ItemPayload, LookupError> {
        self.available()?;
        let wanted = name.trim();
        self.entries
            .iter()
            .find(|entry| entry.label().eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| LookupError::NotFound(wanted.to_string()))
    }

    fn fetch_by_fingering(&self, pattern: &str) -> Result<ItemPayload, LookupError> {
        self.available()?;
        self.entries
            .iter()
            .find(|entry| entry.variants.iter().any(|v| v.frets == pattern))
            .cloned()
            .ok_or_else(|| LookupError::NotFound(pattern.to_string()))
    }

    fn search_suggestions(&self, query: &str) -> Result<Vec<ItemPayload>, LookupError> {
        self.available()?;
        let needle = query.trim().to_lowercase();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.label().to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PayloadVariant;

    fn catalog() -> CatalogProvider {
        CatalogProvider::new(vec![
            ItemPayload::new("C", "").with_variant(PayloadVariant::new("x32010", "032010")),
            ItemPayload::new("C", "m7").with_variant(PayloadVariant::new("x35343", "013121")),
            ItemPayload::new("A", "m").with_variant(PayloadVariant::new("x02210", "002310")),
        ])
    }

    #[test]
    fn fingering_pattern_shape() {
        assert!(is_fingering_pattern("x32010"));
        assert!(is_fingering_pattern("a0b1c2"));
        assert!(!is_fingering_pattern("x3201"));
        assert!(!is_fingering_pattern("X32010"));
        assert!(!is_fingering_pattern("x3201-"));
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        let found = catalog().fetch_by_name(" am ").unwrap();
        assert_eq!(found.label(), "Am");
        assert_eq!(
            catalog().fetch_by_name("F#"),
            Err(LookupError::NotFound("F#".to_string()))
        );
    }

    #[test]
    fn fingering_lookup_matches_variant_frets() {
        let found = catalog().fetch_by_fingering("x35343").unwrap();
        assert_eq!(found.label(), "Cm7");
    }

    #[test]
    fn empty_suggestions_differ_from_outage() {
        assert_eq!(catalog().search_suggestions("zzz"), Ok(Vec::new()));
        assert_eq!(catalog().search_suggestions("c").unwrap().len(), 2);

        let down = catalog().with_outage("connection refused");
        let err = down.search_suggestions("c").unwrap_err();
        assert!(matches!(err, LookupError::Transport(_)));
        assert_eq!(err.user_message(), "Lookup failed, please try again");
    }
}
