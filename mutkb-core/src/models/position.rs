use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{LEGACY_CHROMOSOME_CODES, MITOCHONDRIAL, SEGMENT_SEPARATOR};
use crate::errors::CodecError;

///
/// Canonical chromosome name: `1`..`22`, `X`, `Y` or `MT`.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chromosome(String);

impl Chromosome {
    ///
    /// Canonicalize a raw chromosome token.
    ///
    /// Legacy codes `23`, `24` and `25` become `X`, `Y` and `MT`. Tokens that are
    /// empty, or three characters or longer (other than `MT`) after the rewrite,
    /// are rejected.
    ///
    pub fn canonicalize(raw: &str) -> Result<Self, CodecError> {
        let raw = raw.trim();
        let token = LEGACY_CHROMOSOME_CODES
            .iter()
            .find(|(code, _)| *code == raw)
            .map(|(_, name)| *name)
            .unwrap_or(raw);

        if token.is_empty() || (token.len() >= 3 && token != MITOCHONDRIAL) {
            return Err(CodecError::InvalidChromosome(raw.to_string()));
        }

        Ok(Chromosome(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// A single base on a canonical chromosome.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenomicPosition {
    pub chromosome: Chromosome,
    pub offset: u64,
}

impl GenomicPosition {
    pub fn new(chromosome: Chromosome, offset: u64) -> Self {
        GenomicPosition { chromosome, offset }
    }
}

impl FromStr for GenomicPosition {
    type Err = CodecError;

    /// Parse `chr:start` or `chr:start-end`; only the start coordinate is kept.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CodecError::UnlocalizedMutation);
        }

        let start = s.split('-').next().unwrap_or(s);
        let (chr, offset) = start
            .split_once(SEGMENT_SEPARATOR)
            .ok_or_else(|| CodecError::InvalidPosition(s.to_string()))?;

        let chromosome = Chromosome::canonicalize(chr)?;
        let offset = offset
            .trim()
            .parse::<u64>()
            .map_err(|_| CodecError::InvalidPosition(s.to_string()))?;

        Ok(GenomicPosition { chromosome, offset })
    }
}

impl Display for GenomicPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.chromosome, SEGMENT_SEPARATOR, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("23", "X")]
    #[case("24", "Y")]
    #[case("25", "MT")]
    #[case("7", "7")]
    #[case("X", "X")]
    #[case("MT", "MT")]
    #[case("M", "M")]
    fn test_canonicalize_accepts(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Chromosome::canonicalize(raw).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("chr7")]
    #[case("100")]
    #[case("Un_gl000220")]
    #[case("")]
    fn test_canonicalize_rejects(#[case] raw: &str) {
        assert!(matches!(
            Chromosome::canonicalize(raw),
            Err(CodecError::InvalidChromosome(_))
        ));
    }

    #[test]
    fn test_parse_range_keeps_start() {
        let pos: GenomicPosition = "7:140453136-140453140".parse().unwrap();
        assert_eq!(pos.chromosome.as_str(), "7");
        assert_eq!(pos.offset, 140453136);
        assert_eq!(pos.to_string(), "7:140453136");
    }

    #[test]
    fn test_parse_legacy_code() {
        let pos: GenomicPosition = "23:1000".parse().unwrap();
        assert_eq!(pos.to_string(), "X:1000");
    }

    #[test]
    fn test_parse_empty_is_unlocalized() {
        assert_eq!(
            "  ".parse::<GenomicPosition>(),
            Err(CodecError::UnlocalizedMutation)
        );
    }

    #[test]
    fn test_parse_bad_offset() {
        assert!(matches!(
            "7:abc".parse::<GenomicPosition>(),
            Err(CodecError::InvalidPosition(_))
        ));
        assert!(matches!(
            "7".parse::<GenomicPosition>(),
            Err(CodecError::InvalidPosition(_))
        ));
    }
}
