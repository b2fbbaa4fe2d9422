//! Search-term tags attached to stored publications
//!
//! Tags are persisted as a single comma-joined string (`"sepsis, septic shock"`).
//! Membership ignores ASCII case and tags are only ever appended. A term
//! that itself contains commas is stored as its comma-separated pieces.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTags {
    terms: Vec<String>,
}

impl SearchTags {
    /// Parse a stored tag string, ignoring empty entries and surrounding whitespace
    pub fn parse(stored: &str) -> Self {
        let mut tags = Self::default();
        for term in stored.split(',') {
            tags.append(term);
        }
        tags
    }

    /// `true` when every comma-separated piece of `term` is present
    pub fn contains(&self, term: &str) -> bool {
        let mut pieces = pieces(term).peekable();
        pieces.peek().is_some() && pieces.all(|piece| self.contains_piece(piece))
    }

    fn contains_piece(&self, piece: &str) -> bool {
        self.terms.iter().any(|t| t.eq_ignore_ascii_case(piece))
    }

    /// Append each piece of `term` that is not blank or already present.
    ///
    /// Returns `true` when the set changed.
    pub fn append(&mut self, term: &str) -> bool {
        let mut changed = false;
        for piece in pieces(term) {
            if !self.contains_piece(piece) {
                self.terms.push(piece.to_string());
                changed = true;
            }
        }
        changed
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for SearchTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.terms.join(", "))
    }
}

fn pieces(term: &str) -> impl Iterator<Item = &str> {
    term.split(',').map(str::trim).filter(|piece| !piece.is_empty())
}

/// Canonical tag string for a search term (`" a ,b"` becomes `"a, b"`)
pub fn normalize_search_term(term: &str) -> String {
    SearchTags::parse(term).to_string()
}

/// Merge `term` into a stored tag string.
///
/// Returns the new tag string, or `None` when the term was already present.
pub fn merge_search_term(stored: Option<&str>, term: &str) -> Option<String> {
    let mut tags = SearchTags::parse(stored.unwrap_or_default());
    if tags.append(term) {
        Some(tags.to_string())
    } else {
        None
    }
}
