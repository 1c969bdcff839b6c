//! Join and aggregation utilities over [`DerivedTable`]s.
//!
//! Every derivation in the knowledge base is some combination of these:
//! gather all values of a table ([`flatten`]), pair up parallel fields
//! ([`zip_fields`]), follow a key through an intermediate mapping
//! ([`multi_join`]) and regroup composite keys by their prefix
//! ([`group_by_prefix`]) so external services are queried once per prefix.
//!
//! ```rust
//! use mutkb_join::group_by_prefix;
//!
//! let groups = group_by_prefix(["ENSP1:R175H", "ENSP1:R248Q", "ENSP2:V600E"], ':');
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups["ENSP1"], vec!["ENSP1:R175H", "ENSP1:R248Q"]);
//! ```

pub mod errors;

use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;

use fxhash::FxHashSet;
use log::warn;
use mutkb_core::{DerivedTable, TableSchema};

pub use errors::{JoinError, Result};

///
/// All values of the target (first) field of a table, deduplicated.
///
pub fn flatten(table: &DerivedTable) -> BTreeSet<String> {
    table
        .iter()
        .flat_map(|(_, values)| values[0].iter().cloned())
        .collect()
}

///
/// All values of `field` across every key of a table, deduplicated.
///
pub fn flatten_field(table: &DerivedTable, field: &str) -> Result<BTreeSet<String>> {
    let idx = table.schema().field_index(field)?;
    Ok(table
        .iter()
        .flat_map(|(_, values)| values[idx].iter().cloned())
        .collect())
}

///
/// Pair up parallel arrays positionally.
///
/// `[[a1, a2], [b1, b2]]` becomes `[[a1, b1], [a2, b2]]`.
///
/// # Returns
/// - the row tuples, or `MalformedRow` when the arrays differ in length
///
pub fn zip_fields(key: &str, arrays: &[Vec<String>]) -> Result<Vec<Vec<String>>> {
    let len = arrays.first().map(|a| a.len()).unwrap_or(0);
    if arrays.iter().any(|a| a.len() != len) {
        return Err(JoinError::MalformedRow {
            key: key.to_string(),
            lengths: arrays.iter().map(|a| a.len()).collect(),
        });
    }

    Ok((0..len)
        .map(|i| arrays.iter().map(|a| a[i].clone()).collect())
        .collect())
}

///
/// Inverse of [`zip_fields`]: turn row tuples of `width` values into
/// `width` parallel arrays.
///
pub fn unzip_rows(key: &str, rows: &[Vec<String>], width: usize) -> Result<Vec<Vec<String>>> {
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(JoinError::MalformedRow {
            key: key.to_string(),
            lengths: vec![width, bad.len()],
        });
    }

    let mut arrays = vec![Vec::with_capacity(rows.len()); width];
    for row in rows {
        for (array, value) in arrays.iter_mut().zip(row) {
            array.push(value.clone());
        }
    }
    Ok(arrays)
}

/// Rows produced by [`zip_rows`] plus the number of keys that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zipped {
    pub rows: BTreeMap<String, Vec<Vec<String>>>,
    pub skipped: usize,
}

///
/// Zip the parallel arrays of every key. A key whose arrays differ in length
/// is logged and skipped; the others are still returned.
///
pub fn zip_rows<I, K>(entries: I) -> Zipped
where
    I: IntoIterator<Item = (K, Vec<Vec<String>>)>,
    K: Into<String>,
{
    let mut zipped = Zipped::default();
    for (key, arrays) in entries {
        let key = key.into();
        match zip_fields(&key, &arrays) {
            Ok(rows) => {
                zipped.rows.insert(key, rows);
            }
            Err(e) => {
                warn!("Skipping key: {}", e);
                zipped.skipped += 1;
            }
        }
    }
    zipped
}

/// [`zip_rows`] over every row of a table.
pub fn zip_table(table: &DerivedTable) -> Zipped {
    zip_rows(table.iter().map(|(k, v)| (k.clone(), v.clone())))
}

///
/// Follow every key of `a` through an intermediate mapping.
///
/// For each key, every intermediate value is looked up with `lookup`;
/// intermediates the lookup does not know are dropped silently. Targets are
/// deduplicated, first occurrence wins. Keys whose intermediates all miss map
/// to an empty list.
///
pub fn multi_join<K, V, I, T, F>(a: impl IntoIterator<Item = (K, V)>, lookup: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    V: IntoIterator<Item = I>,
    T: Eq + Hash + Clone,
    F: Fn(&I) -> Option<T>,
{
    multi_join_flat(a, |i| lookup(i).map(|t| vec![t]))
}

///
/// Like [`multi_join`], for intermediate mappings that are themselves
/// multi-valued.
///
pub fn multi_join_flat<K, V, I, T, F, W>(
    a: impl IntoIterator<Item = (K, V)>,
    lookup: F,
) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    V: IntoIterator<Item = I>,
    T: Eq + Hash + Clone,
    F: Fn(&I) -> Option<W>,
    W: IntoIterator<Item = T>,
{
    let mut joined = BTreeMap::new();
    for (key, intermediates) in a {
        let mut seen = FxHashSet::default();
        let mut targets = Vec::new();
        for intermediate in intermediates {
            if let Some(found) = lookup(&intermediate) {
                for target in found {
                    if seen.insert(target.clone()) {
                        targets.push(target);
                    }
                }
            }
        }
        joined.insert(key, targets);
    }
    joined
}

///
/// Join the target field of table `a` through the target field of table `b`
/// into a new flat table.
///
pub fn join_tables(a: &DerivedTable, b: &DerivedTable, name: &str, schema: TableSchema) -> Result<DerivedTable> {
    let joined = multi_join_flat(
        a.iter().map(|(k, v)| (k.clone(), v[0].iter())),
        |i| b.target(i.as_str()).map(|t| t.to_vec()),
    );

    let mut table = DerivedTable::new(name, schema);
    for (key, targets) in joined {
        table.extend(key, targets)?;
    }
    Ok(table)
}

/// Split a composite key at the first `sep`. Without a separator the whole
/// key is the prefix.
pub fn split_prefix(item: &str, sep: char) -> (&str, &str) {
    item.split_once(sep).unwrap_or((item, ""))
}

///
/// Group composite keys (e.g. `ENSP00000123:p.Arg175His`) by their prefix.
///
/// Within a group, items keep their input order; duplicates are dropped.
///
pub fn group_by_prefix<I, S>(items: I, sep: char) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for item in items {
        let item = item.as_ref();
        if !seen.insert(item.to_string()) {
            continue;
        }
        let (prefix, _) = split_prefix(item, sep);
        groups
            .entry(prefix.to_string())
            .or_default()
            .push(item.to_string());
    }
    groups
}

///
/// Reverse a multi-valued mapping: value → keys holding it.
///
pub fn invert<'a, I, V>(entries: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = (&'a String, V)>,
    V: IntoIterator<Item = &'a String>,
{
    let mut inverted: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, values) in entries {
        for value in values {
            let keys = inverted.entry(value.clone()).or_default();
            if keys.last() != Some(key) {
                keys.push(key.clone());
            }
        }
    }
    inverted
}
