//! Fan-out search sources and the normalized search term

use capview_ingest::EntityKind;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-insensitive equality, used for short identifier-like columns.
    Equals,
    /// Case-insensitive substring match, used for free-text columns.
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPredicate {
    pub column: &'static str,
    pub mode: MatchMode,
}

/// One table queried during the fan-out stage.
///
/// A row matches when any predicate matches; its `key_column` value is the
/// business key that lands in the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSource {
    pub name: &'static str,
    pub entity: EntityKind,
    pub key_column: &'static str,
    pub predicates: &'static [SearchPredicate],
}

const fn equals(column: &'static str) -> SearchPredicate {
    SearchPredicate {
        column,
        mode: MatchMode::Equals,
    }
}

const fn contains(column: &'static str) -> SearchPredicate {
    SearchPredicate {
        column,
        mode: MatchMode::Contains,
    }
}

pub static SEARCH_SOURCES: &[SearchSource] = &[
    SearchSource {
        name: "registers",
        entity: EntityKind::Registers,
        key_column: "regcode",
        predicates: &[
            equals("regcode"),
            equals("sepa"),
            contains("name"),
            contains("name_in_quotes"),
            contains("without_quotes"),
        ],
    },
    SearchSource {
        name: "beneficial_owners",
        entity: EntityKind::BeneficialOwners,
        key_column: "legal_entity_registration_number",
        predicates: &[contains("forename"), contains("surname")],
    },
    SearchSource {
        name: "members",
        entity: EntityKind::Members,
        key_column: "legal_entity_registration_number",
        predicates: &[contains("name")],
    },
];

/// A validated, lowercased search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    lowered: String,
}

impl SearchTerm {
    /// Blank or whitespace-only terms are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "Search term 'q' must not be blank".to_string(),
            ));
        }
        Ok(Self {
            lowered: raw.to_lowercase(),
        })
    }

    /// Value compared against `LOWER(column)` for equality predicates.
    pub fn lowered(&self) -> &str {
        &self.lowered
    }

    /// `LIKE` pattern for substring predicates, with `%`, `_` and `\` escaped
    /// so they match literally (`ESCAPE '\'`).
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.lowered.len() + 2);
        pattern.push('%');
        for ch in self.lowered.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push('%');
        pattern
    }

    /// In-process equivalent of the SQL predicate for one column value.
    pub fn matches(&self, mode: MatchMode, value: &str) -> bool {
        let value = value.to_lowercase();
        match mode {
            MatchMode::Equals => value == self.lowered,
            MatchMode::Contains => value.contains(&self.lowered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_terms_are_rejected() {
        assert!(matches!(SearchTerm::parse(""), Err(Error::InvalidRequest(_))));
        assert!(matches!(
            SearchTerm::parse(" \t "),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        let term = SearchTerm::parse("50%_A\\b").unwrap();
        assert_eq!(term.lowered(), "50%_a\\b");
        assert_eq!(term.like_pattern(), "%50\\%\\_a\\\\b%");
    }

    #[test]
    fn match_modes_follow_column_policy() {
        let term = SearchTerm::parse("Alfa").unwrap();
        assert!(term.matches(MatchMode::Contains, "SIA ALFA Baltic"));
        assert!(!term.matches(MatchMode::Equals, "SIA Alfa"));
        assert!(term.matches(MatchMode::Equals, "ALFA"));
    }

    #[test]
    fn sources_cover_registers_owners_and_members() {
        let names: Vec<_> = SEARCH_SOURCES.iter().map(|s| s.name).collect();
        assert_eq!(names, ["registers", "beneficial_owners", "members"]);
        for source in SEARCH_SOURCES {
            let descriptor = source.entity.descriptor();
            assert!(descriptor.has_column(source.key_column));
            for predicate in source.predicates {
                assert!(descriptor.has_column(predicate.column));
            }
        }
    }
}
