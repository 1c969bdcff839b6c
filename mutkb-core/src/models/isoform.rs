use std::fmt::{self, Display};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::consts::SEGMENT_SEPARATOR;

static PROTEIN_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z*][a-z]{0,2}\d+(?:[A-Z*]|FrameShift)").expect("valid protein change regex")
});

static POINT_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:p\.)?([A-Z*][a-z]{0,2})\d+([A-Z*][a-z]{0,2}|=)$")
        .expect("valid point change regex")
});

///
/// A protein accession paired with an amino-acid change, e.g.
/// `ENSP00000269305:R175H`.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutatedIsoform(String);

impl MutatedIsoform {
    pub fn new(protein: &str, change: &str) -> Self {
        MutatedIsoform(format!("{}{}{}", protein, SEGMENT_SEPARATOR, change))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Protein accession: everything before the first separator.
    pub fn protein(&self) -> &str {
        self.0
            .split_once(SEGMENT_SEPARATOR)
            .map(|(protein, _)| protein)
            .unwrap_or(&self.0)
    }

    /// Amino-acid change: everything after the first separator.
    pub fn change(&self) -> &str {
        self.0
            .split_once(SEGMENT_SEPARATOR)
            .map(|(_, change)| change)
            .unwrap_or("")
    }

    /// Whether the change looks like a residue change or frameshift.
    pub fn is_protein_change(&self) -> bool {
        PROTEIN_CHANGE.is_match(self.change())
    }

    /// A point change whose alternate residue equals the reference.
    pub fn is_synonymous(&self) -> bool {
        match POINT_CHANGE.captures(self.change()) {
            Some(caps) => &caps[2] == "=" || caps[1] == caps[2],
            None => false,
        }
    }
}

impl From<&str> for MutatedIsoform {
    fn from(value: &str) -> Self {
        MutatedIsoform(value.to_string())
    }
}

impl From<String> for MutatedIsoform {
    fn from(value: String) -> Self {
        MutatedIsoform(value)
    }
}

impl AsRef<str> for MutatedIsoform {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for MutatedIsoform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_partition() {
        let mi = MutatedIsoform::from("ENSP00000123:p.Arg175His");
        assert_eq!(mi.protein(), "ENSP00000123");
        assert_eq!(mi.change(), "p.Arg175His");
        assert_eq!(MutatedIsoform::new("ENSP1", "V600E").as_str(), "ENSP1:V600E");
    }

    #[rstest]
    #[case("ENSP1:R175H", true)]
    #[case("ENSP1:K12FrameShift", true)]
    #[case("ENSP1:*123Q", true)]
    #[case("ENSP1:p.Arg175His", true)]
    #[case("ENSP1:UTR", false)]
    #[case("ENSP1", false)]
    fn test_is_protein_change(#[case] mi: &str, #[case] expected: bool) {
        assert_eq!(MutatedIsoform::from(mi).is_protein_change(), expected);
    }

    #[rstest]
    #[case("ENSP1:R175R", true)]
    #[case("ENSP1:p.Arg175=", true)]
    #[case("ENSP1:R175H", false)]
    #[case("ENSP1:K12FrameShift", false)]
    fn test_is_synonymous(#[case] mi: &str, #[case] expected: bool) {
        assert_eq!(MutatedIsoform::from(mi).is_synonymous(), expected);
    }
}
