use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::Path;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use mutkb_core::GenomicPosition;
use mutkb_core::utils::read_pairs;

use crate::errors::LiftError;

/// Name of a reference genome assembly, e.g. `hg19`, `hg18`, `GRCh38`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenomeBuild(String);

impl GenomeBuild {
    pub fn new<S: Into<String>>(name: S) -> Self {
        GenomeBuild(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GenomeBuild {
    fn from(value: &str) -> Self {
        GenomeBuild::new(value)
    }
}

///
/// Translates genome positions between builds.
///
/// Positions missing from the returned map are unmapped. Implementations
/// should fail with [`LiftError::Service`] rather than block indefinitely.
///
pub trait LiftoverService: Send + Sync {
    fn lift_positions(
        &self,
        positions: &[GenomicPosition],
        from: &GenomeBuild,
        to: &GenomeBuild,
    ) -> Result<HashMap<GenomicPosition, GenomicPosition>, LiftError>;
}

///
/// A liftover service backed by a precomputed position table.
///
/// The table maps `chr:pos` in one build to `chr:pos` in another and is
/// usable in both directions. When several source positions land on the same
/// target, the reverse direction keeps the first one listed.
///
#[derive(Debug, Clone)]
pub struct PositionMapLiftover {
    source: GenomeBuild,
    target: GenomeBuild,
    forward: FxHashMap<GenomicPosition, GenomicPosition>,
    reverse: FxHashMap<GenomicPosition, GenomicPosition>,
}

impl PositionMapLiftover {
    pub fn from_pairs(
        source: GenomeBuild,
        target: GenomeBuild,
        pairs: Vec<(String, String)>,
    ) -> Result<Self, LiftError> {
        let mut forward = FxHashMap::default();
        let mut reverse = FxHashMap::default();

        for (i, (from, to)) in pairs.into_iter().enumerate() {
            let parse = |raw: &str| {
                raw.trim()
                    .parse::<GenomicPosition>()
                    .map_err(|e| LiftError::InvalidMapping {
                        line: i + 1,
                        reason: format!("'{}': {}", raw, e),
                    })
            };
            let from = parse(&from)?;
            let to = parse(&to)?;
            reverse.entry(to.clone()).or_insert_with(|| from.clone());
            forward.insert(from, to);
        }

        Ok(PositionMapLiftover {
            source,
            target,
            forward,
            reverse,
        })
    }

    ///
    /// Load a two-column TSV (optionally gzipped) of `chr:pos` pairs.
    ///
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        source: GenomeBuild,
        target: GenomeBuild,
    ) -> Result<Self, LiftError> {
        let pairs = read_pairs(path.as_ref()).map_err(|e| LiftError::MappingRead(format!("{:#}", e)))?;
        Self::from_pairs(source, target, pairs)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    fn direction(
        &self,
        from: &GenomeBuild,
        to: &GenomeBuild,
    ) -> Option<&FxHashMap<GenomicPosition, GenomicPosition>> {
        if from == &self.source && to == &self.target {
            Some(&self.forward)
        } else if from == &self.target && to == &self.source {
            Some(&self.reverse)
        } else {
            None
        }
    }
}

impl LiftoverService for PositionMapLiftover {
    fn lift_positions(
        &self,
        positions: &[GenomicPosition],
        from: &GenomeBuild,
        to: &GenomeBuild,
    ) -> Result<HashMap<GenomicPosition, GenomicPosition>, LiftError> {
        let table = self
            .direction(from, to)
            .ok_or_else(|| LiftError::UnsupportedBuilds {
                from: from.to_string(),
                to: to.to_string(),
            })?;

        Ok(positions
            .iter()
            .filter_map(|p| table.get(p).map(|t| (p.clone(), t.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pos(s: &str) -> GenomicPosition {
        s.parse().unwrap()
    }

    #[test]
    fn test_from_path_both_directions() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# hg19\thg18").unwrap();
        writeln!(file, "1:100\t1:90").unwrap();
        writeln!(file, "23:500\t23:480").unwrap();
        file.flush().unwrap();

        let service =
            PositionMapLiftover::from_path(file.path(), "hg19".into(), "hg18".into()).unwrap();
        assert_eq!(service.len(), 2);

        let out = service
            .lift_positions(&[pos("1:100"), pos("X:500"), pos("5:5")], &"hg19".into(), &"hg18".into())
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[&pos("X:500")], pos("X:480"));

        let back = service
            .lift_positions(&[pos("1:90")], &"hg18".into(), &"hg19".into())
            .unwrap();
        assert_eq!(back[&pos("1:90")], pos("1:100"));
    }

    #[test]
    fn test_unsupported_builds() {
        let service = PositionMapLiftover::from_pairs("hg19".into(), "hg18".into(), vec![]).unwrap();
        let err = service
            .lift_positions(&[pos("1:1")], &"hg19".into(), &"GRCh38".into())
            .unwrap_err();
        assert!(matches!(err, LiftError::UnsupportedBuilds { .. }));
    }

    #[test]
    fn test_invalid_mapping_line() {
        let err = PositionMapLiftover::from_pairs(
            "hg19".into(),
            "hg18".into(),
            vec![("1:1".into(), "1:2".into()), ("chr1:x".into(), "1:3".into())],
        )
        .unwrap_err();
        assert!(matches!(err, LiftError::InvalidMapping { line: 2, .. }));
    }
}
