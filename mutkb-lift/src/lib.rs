//! Genome build lifting for mutation identifiers.
//!
//! The actual coordinate translation is delegated to a [`LiftoverService`];
//! this crate batches unique positions into a single service call and
//! propagates unmapped positions as `None`.
//!
//! ```rust
//! use mutkb_core::GenomicMutationId;
//! use mutkb_lift::{lift, GenomeBuild, PositionMapLiftover};
//!
//! let service = PositionMapLiftover::from_pairs(
//!     GenomeBuild::new("hg19"),
//!     GenomeBuild::new("hg18"),
//!     vec![("7:140453136".to_string(), "7:140099605".to_string())],
//! )
//! .unwrap();
//!
//! let ids: Vec<GenomicMutationId> = vec!["7:140453136:A".parse().unwrap()];
//! let lifted = lift(&service, &ids, &GenomeBuild::new("hg19"), &GenomeBuild::new("hg18")).unwrap();
//! assert_eq!(lifted[&ids[0]].as_ref().unwrap().as_str(), "7:140099605:A");
//! ```

pub mod errors;
pub mod service;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};

use mutkb_core::{DerivedTable, GenomicMutationId, GenomicPosition, Multiplicity, TableError};

pub use errors::LiftError;
pub use service::{GenomeBuild, LiftoverService, PositionMapLiftover};

/// Mapping produced by [`lift`]: every input id, unmapped ones as `None`.
pub type LiftMapping = BTreeMap<GenomicMutationId, Option<GenomicMutationId>>;

///
/// Lift a set of mutation ids from one genome build to another.
///
/// Duplicate ids and ids sharing a position are sent to the service once.
/// Ids whose position can't be parsed, or that the service doesn't map, come
/// back as `None`. Lifting to the same build is the identity and never calls
/// the service.
///
pub fn lift<'a, I>(
    service: &dyn LiftoverService,
    ids: I,
    from: &GenomeBuild,
    to: &GenomeBuild,
) -> Result<LiftMapping, LiftError>
where
    I: IntoIterator<Item = &'a GenomicMutationId>,
{
    let unique: BTreeSet<&GenomicMutationId> = ids.into_iter().collect();

    if from == to {
        return Ok(unique
            .into_iter()
            .map(|id| (id.clone(), Some(id.clone())))
            .collect());
    }

    let mut positions: BTreeMap<&GenomicMutationId, Option<GenomicPosition>> = BTreeMap::new();
    let mut batch: BTreeSet<GenomicPosition> = BTreeSet::new();
    for id in unique {
        match id.position_key().parse::<GenomicPosition>() {
            Ok(position) => {
                batch.insert(position.clone());
                positions.insert(id, Some(position));
            }
            Err(e) => {
                debug!("Not lifting '{}': {}", id, e);
                positions.insert(id, None);
            }
        }
    }

    let batch: Vec<GenomicPosition> = batch.into_iter().collect();
    info!(
        "Lifting {} ids ({} unique positions) from {} to {}",
        positions.len(),
        batch.len(),
        from,
        to
    );
    let translated = if batch.is_empty() {
        Default::default()
    } else {
        service.lift_positions(&batch, from, to)?
    };

    let mut mapping = LiftMapping::new();
    let mut unmapped = 0usize;
    for (id, position) in positions {
        let lifted = position
            .and_then(|p| translated.get(&p))
            .map(|target| id.with_position(target));
        if lifted.is_none() {
            unmapped += 1;
        }
        mapping.insert(id.clone(), lifted);
    }

    if unmapped > 0 {
        warn!("{} of {} ids could not be lifted from {} to {}", unmapped, mapping.len(), from, to);
    }
    Ok(mapping)
}

///
/// Rewrite the mutation ids held in `field` of `table` through `mapping`.
///
/// Values that map to `None`, or are missing from the mapping, are dropped
/// together with their parallel values in the other fields. Keys left with no
/// values are removed. Single tables drop the whole key.
///
pub fn lift_table(
    table: &DerivedTable,
    field: &str,
    mapping: &LiftMapping,
    name: &str,
) -> Result<DerivedTable, TableError> {
    let idx = table.schema().field_index(field)?;
    let mut lifted = DerivedTable::new(name, table.schema().clone());
    let mut dropped = 0usize;

    for (key, values) in table.iter() {
        let mut kept: Vec<Vec<String>> = vec![Vec::new(); values.len()];
        for (row, raw) in values[idx].iter().enumerate() {
            let target = raw
                .parse::<GenomicMutationId>()
                .ok()
                .and_then(|id| mapping.get(&id).cloned().flatten());
            let Some(target) = target else {
                dropped += 1;
                continue;
            };
            for (f, column) in values.iter().enumerate() {
                if f == idx {
                    kept[f].push(target.as_str().to_string());
                } else if table.multiplicity() != Multiplicity::Flat {
                    if let Some(v) = column.get(row) {
                        kept[f].push(v.clone());
                    }
                }
            }
        }
        if kept[idx].is_empty() {
            continue;
        }
        lifted.insert(key.clone(), kept)?;
    }

    if dropped > 0 {
        info!("Dropped {} unmapped values while lifting table '{}'", dropped, table.name());
    }
    Ok(lifted)
}
