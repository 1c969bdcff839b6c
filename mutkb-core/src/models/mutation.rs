use std::borrow::Borrow;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::change::ChangeDescriptor;
use super::position::{Chromosome, GenomicPosition};
use crate::consts::SEGMENT_SEPARATOR;
use crate::errors::CodecError;

///
/// Canonical mutation key: `chromosome:offset:change`.
///
/// Two catalog rows that normalize to the same triple are the same mutation.
/// This is the join key of every derived table.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenomicMutationId(String);

impl GenomicMutationId {
    pub fn new(position: &GenomicPosition, change: &ChangeDescriptor) -> Self {
        GenomicMutationId(format!(
            "{}{}{}",
            position,
            SEGMENT_SEPARATOR,
            change.serialize()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn segments(&self) -> (&str, &str, &str) {
        let mut parts = self.0.splitn(3, SEGMENT_SEPARATOR);
        let chr = parts.next().unwrap_or("");
        let offset = parts.next().unwrap_or("");
        let change = parts.next().unwrap_or("");
        (chr, offset, change)
    }

    pub fn chromosome(&self) -> &str {
        self.segments().0
    }

    pub fn offset(&self) -> u64 {
        self.segments().1.parse().unwrap_or(0)
    }

    /// The serialized change segment.
    pub fn change(&self) -> &str {
        self.segments().2
    }

    /// `chromosome:offset`, the part a liftover service translates.
    pub fn position_key(&self) -> String {
        let (chr, offset, _) = self.segments();
        format!("{}{}{}", chr, SEGMENT_SEPARATOR, offset)
    }

    ///
    /// Same change at another position. Used when lifting between builds.
    ///
    pub fn with_position(&self, position: &GenomicPosition) -> Self {
        GenomicMutationId(format!(
            "{}{}{}",
            position,
            SEGMENT_SEPARATOR,
            self.change()
        ))
    }

    ///
    /// False when the change segment came from an unclassified descriptor.
    ///
    pub fn is_confident(&self) -> bool {
        !self.change().contains('?')
    }
}

impl FromStr for GenomicMutationId {
    type Err = CodecError;

    /// Parse an already-encoded id. The chromosome and offset are validated,
    /// the change segment is kept verbatim.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, SEGMENT_SEPARATOR);
        let (chr, offset, change) = match (parts.next(), parts.next(), parts.next()) {
            (Some(chr), Some(offset), Some(change)) => (chr, offset, change),
            _ => return Err(CodecError::InvalidPosition(s.to_string())),
        };
        if change.is_empty() {
            return Err(CodecError::MissingChange(s.to_string()));
        }
        let position: GenomicPosition = format!("{}{}{}", chr, SEGMENT_SEPARATOR, offset).parse()?;
        Ok(GenomicMutationId(format!(
            "{}{}{}",
            position, SEGMENT_SEPARATOR, change
        )))
    }
}

impl Display for GenomicMutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for GenomicMutationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for GenomicMutationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<GenomicMutationId> for String {
    fn from(value: GenomicMutationId) -> Self {
        value.0
    }
}

impl From<(Chromosome, u64, ChangeDescriptor)> for GenomicMutationId {
    fn from((chromosome, offset, change): (Chromosome, u64, ChangeDescriptor)) -> Self {
        GenomicMutationId::new(&GenomicPosition::new(chromosome, offset), &change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_segments() {
        let id: GenomicMutationId = "17:7577121:-----".parse().unwrap();
        assert_eq!(id.chromosome(), "17");
        assert_eq!(id.offset(), 7577121);
        assert_eq!(id.change(), "-----");
        assert_eq!(id.position_key(), "17:7577121");
        assert!(id.is_confident());
    }

    #[test]
    fn test_unknown_change_is_not_confident() {
        let id: GenomicMutationId = "1:100:?(c.?)".parse().unwrap();
        assert!(!id.is_confident());
        assert_eq!(id.change(), "?(c.?)");

        // separators inside the change segment are kept
        let id: GenomicMutationId = "1:100:?(c.1:2)".parse().unwrap();
        assert_eq!(id.change(), "?(c.1:2)");
    }

    #[test]
    fn test_parse_canonicalizes_chromosome() {
        let id: GenomicMutationId = "23:5:A".parse().unwrap();
        assert_eq!(id.as_str(), "X:5:A");
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        assert!("7:100".parse::<GenomicMutationId>().is_err());
        assert!("7:100:".parse::<GenomicMutationId>().is_err());
    }

    #[test]
    fn test_with_position() {
        let id: GenomicMutationId = "7:140453136:A".parse().unwrap();
        let moved = id.with_position(&"7:140099605".parse().unwrap());
        assert_eq!(moved.as_str(), "7:140099605:A");
    }
}
