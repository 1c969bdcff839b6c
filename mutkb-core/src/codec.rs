//! Mutation normalization codec.
//!
//! Turns a raw genome position (`chr:start[-end]`) and a coding-sequence change
//! (`c.1799T>A`, `c.215del5`, ...) into a [`GenomicMutationId`]. Pure and
//! deterministic: the same input always yields the same id, so results can be
//! cached and deduplicated freely.

use rayon::prelude::*;

use crate::errors::CodecError;
use crate::models::{ChangeDescriptor, GenomicMutationId, GenomicPosition};
use crate::source::RawRow;

///
/// Encode a raw position and change into a canonical mutation id.
///
/// # Arguments
/// - raw_position: `chr:start` or `chr:start-end`; only the start is kept
/// - raw_change: coding-sequence change descriptor
///
/// # Returns
/// - the id, or the reason the row cannot be localized as a point mutation.
///   Unclassifiable changes are not an error: they are wrapped as `?(...)`.
///
pub fn encode(
    raw_position: Option<&str>,
    raw_change: Option<&str>,
) -> Result<GenomicMutationId, CodecError> {
    let raw_position = raw_position
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(CodecError::UnlocalizedMutation)?;

    let position: GenomicPosition = raw_position.parse()?;

    let raw_change = raw_change
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CodecError::MissingChange(position.to_string()))?;

    let change = ChangeDescriptor::parse(raw_change);

    Ok(GenomicMutationId::new(&position, &change))
}

///
/// Like [`encode`], but collapses every failure to `None`.
///
pub fn encode_mutation(raw_position: &str, raw_change: Option<&str>) -> Option<GenomicMutationId> {
    encode(Some(raw_position), raw_change).ok()
}

///
/// Encode a batch of `(position, change)` pairs in parallel.
///
/// Output order matches input order.
///
pub fn encode_batch<P, C>(pairs: &[(Option<P>, Option<C>)]) -> Vec<Result<GenomicMutationId, CodecError>>
where
    P: AsRef<str> + Sync,
    C: AsRef<str> + Sync,
{
    pairs
        .par_iter()
        .map(|(position, change)| {
            encode(
                position.as_ref().map(|p| p.as_ref()),
                change.as_ref().map(|c| c.as_ref()),
            )
        })
        .collect()
}

/// Encode the position and change of each catalog row in parallel, in order.
pub fn encode_rows(rows: &[RawRow]) -> Vec<Result<GenomicMutationId, CodecError>> {
    rows.par_iter()
        .map(|row| encode(row.position.as_deref(), row.change.as_deref()))
        .collect()
}
