//! Coding-sequence change descriptors.
//!
//! HGVS-like strings such as `c.1799T>A`, `c.215del5` or `c.76_77insTT` are
//! classified once, here, into a [`ChangeDescriptor`]. Nothing downstream
//! looks at the raw string again.

use std::fmt::{self, Display};

use log::debug;
use serde::{Deserialize, Serialize};

/// Inserted sequence of an insertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Insertion {
    /// Only the length is known; rendered as a run of `N`.
    NRun(usize),
    /// The literal inserted bases.
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeDescriptor {
    Substitution { to: String },
    Deletion { length: usize },
    Insertion(Insertion),
    /// A change that could not be classified. It is kept, not rejected.
    Unknown { raw: String },
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_bases(s: &str, alphabet: &[u8]) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| alphabet.contains(&b.to_ascii_uppercase()))
}

/// Last non-empty piece of `s` split on `pattern`: the text after the last
/// occurrence, or the text before it when nothing follows (`c.215del`).
fn after_last<'a>(s: &'a str, pattern: &str) -> &'a str {
    s.rsplit(pattern).find(|piece| !piece.is_empty()).unwrap_or("")
}

impl ChangeDescriptor {
    ///
    /// Classify a coding-sequence change string.
    ///
    /// Rules, in priority order: `>` is a substitution, `del` a deletion, `ins`
    /// an insertion, anything else is unknown.
    ///
    pub fn parse(cds: &str) -> Self {
        let cds = cds.trim();

        if cds.contains('>') {
            return ChangeDescriptor::Substitution {
                to: after_last(cds, ">").to_string(),
            };
        }

        if cds.contains("del") {
            let deletion = after_last(cds, "del");
            return if is_digits(deletion) {
                match deletion.parse::<usize>() {
                    Ok(length) => ChangeDescriptor::Deletion { length },
                    Err(_) => ChangeDescriptor::Unknown {
                        raw: deletion.to_string(),
                    },
                }
            } else if is_bases(deletion, b"ACTG") {
                ChangeDescriptor::Deletion {
                    length: deletion.len(),
                }
            } else {
                debug!("Unknown deletion: {}", deletion);
                ChangeDescriptor::Unknown {
                    raw: deletion.to_string(),
                }
            };
        }

        if cds.contains("ins") {
            let insertion = after_last(cds, "ins");
            return if is_digits(insertion) {
                match insertion.parse::<usize>() {
                    Ok(n) => ChangeDescriptor::Insertion(Insertion::NRun(n)),
                    Err(_) => ChangeDescriptor::Unknown {
                        raw: insertion.to_string(),
                    },
                }
            } else if is_bases(insertion, b"NACTG") {
                ChangeDescriptor::Insertion(Insertion::Literal(insertion.to_string()))
            } else {
                debug!("Unknown insertion: {}", insertion);
                ChangeDescriptor::Unknown {
                    raw: insertion.to_string(),
                }
            };
        }

        debug!("Unknown change: {}", cds);
        ChangeDescriptor::Unknown {
            raw: cds.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ChangeDescriptor::Unknown { .. })
    }

    ///
    /// Serialize into the change segment of a genomic mutation id.
    ///
    pub fn serialize(&self) -> String {
        match self {
            ChangeDescriptor::Substitution { to } => to.clone(),
            ChangeDescriptor::Deletion { length } => "-".repeat(*length),
            ChangeDescriptor::Insertion(Insertion::NRun(n)) => format!("+{}", "N".repeat(*n)),
            ChangeDescriptor::Insertion(Insertion::Literal(bases)) => format!("+{}", bases),
            ChangeDescriptor::Unknown { raw } => format!("?({})", raw),
        }
    }
}

impl Display for ChangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("c.1799T>A", "A")]
    #[case("c.35_36GG>TT", "TT")]
    #[case("c.215del5", "-----")]
    #[case("c.215delAC", "--")]
    #[case("c.215delact", "---")]
    #[case("c.76_77ins3", "+NNN")]
    #[case("c.76_77insTT", "+TT")]
    #[case("c.76_77insNNA", "+NNA")]
    fn test_parse_and_serialize(#[case] cds: &str, #[case] expected: &str) {
        assert_eq!(ChangeDescriptor::parse(cds).serialize(), expected);
    }

    #[test]
    fn test_substitution_wins_over_deletion() {
        // `>` has priority even when `del` also appears
        let change = ChangeDescriptor::parse("c.del1A>G");
        assert_eq!(
            change,
            ChangeDescriptor::Substitution {
                to: "G".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_deletion_keeps_text() {
        let change = ChangeDescriptor::parse("c.123_125delinsAT");
        assert_eq!(
            change,
            ChangeDescriptor::Unknown {
                raw: "insAT".to_string()
            }
        );
        assert_eq!(change.serialize(), "?(insAT)");
    }

    #[test]
    fn test_unknown_insertion_keeps_text() {
        let change = ChangeDescriptor::parse("c.10_11ins(20)");
        assert!(change.is_unknown());
        assert_eq!(change.serialize(), "?((20))");
    }

    #[test]
    fn test_unknown_change_is_wrapped() {
        let change = ChangeDescriptor::parse("c.?");
        assert_eq!(change.serialize(), "?(c.?)");
    }

    #[test]
    fn test_bare_deletion_is_unknown() {
        let change = ChangeDescriptor::parse("c.215del");
        assert!(change.is_unknown());
        assert_eq!(change.serialize(), "?(c.215)");

        // distinct records stay distinct
        assert_eq!(ChangeDescriptor::parse("c.216del").serialize(), "?(c.216)");
        assert_eq!(ChangeDescriptor::parse("c.76_77ins").serialize(), "?(c.76_77)");
    }

    #[test]
    fn test_deletion_length_matches_dashes() {
        for n in 0..64 {
            let serialized = ChangeDescriptor::Deletion { length: n }.serialize();
            assert_eq!(serialized.len(), n);
            assert!(serialized.chars().all(|c| c == '-'));
        }
    }
}
