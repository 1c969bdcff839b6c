//! Derived tables: keyed, multi-field tables produced by the knowledge base.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::errors::TableError;

///
/// How values under one key are shaped, and how a repeated key merges.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    /// One value per field. A repeated key overwrites.
    Single,
    /// One field holding a list. A repeated key appends.
    Flat,
    /// Parallel lists, one per field, all the same length. A repeated key
    /// appends to every list at once.
    Double,
}

impl Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Multiplicity::Single => "single",
            Multiplicity::Flat => "flat",
            Multiplicity::Double => "double",
        };
        write!(f, "{}", s)
    }
}

/// Declared shape of a derived table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSchema {
    pub key_field: String,
    pub fields: Vec<String>,
    pub multiplicity: Multiplicity,
}

impl TableSchema {
    pub fn new<S: Into<String>>(key_field: S, fields: &[&str], multiplicity: Multiplicity) -> Self {
        TableSchema {
            key_field: key_field.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            multiplicity,
        }
    }

    pub fn single<S: Into<String>>(key_field: S, fields: &[&str]) -> Self {
        Self::new(key_field, fields, Multiplicity::Single)
    }

    pub fn flat<S: Into<String>>(key_field: S, field: &str) -> Self {
        Self::new(key_field, &[field], Multiplicity::Flat)
    }

    pub fn double<S: Into<String>>(key_field: S, fields: &[&str]) -> Self {
        Self::new(key_field, fields, Multiplicity::Double)
    }

    ///
    /// Check the declaration itself: a key field, at least one field, no
    /// duplicate field names, exactly one field for flat tables.
    ///
    pub fn validate(&self) -> Result<(), TableError> {
        if self.key_field.trim().is_empty() {
            return Err(TableError::InvalidSchema("empty key field".to_string()));
        }
        if self.fields.is_empty() {
            return Err(TableError::InvalidSchema("no fields declared".to_string()));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].contains(field) {
                return Err(TableError::InvalidSchema(format!("duplicate field '{}'", field)));
            }
        }
        if self.multiplicity == Multiplicity::Flat && self.fields.len() != 1 {
            return Err(TableError::InvalidSchema(format!(
                "flat tables hold exactly one field, {} declared",
                self.fields.len()
            )));
        }
        Ok(())
    }

    pub fn field_index(&self, field: &str) -> Result<usize, TableError> {
        self.fields
            .iter()
            .position(|f| f == field)
            .ok_or_else(|| TableError::UnknownField(field.to_string()))
    }

    fn check_row(&self, key: &str, values: &[Vec<String>]) -> Result<(), TableError> {
        let mismatch = |reason: String| TableError::ShapeMismatch {
            key: key.to_string(),
            reason,
        };

        if values.len() != self.fields.len() {
            return Err(mismatch(format!(
                "{} value lists for {} fields",
                values.len(),
                self.fields.len()
            )));
        }

        match self.multiplicity {
            Multiplicity::Single => {
                if let Some(bad) = values.iter().find(|v| v.len() != 1) {
                    return Err(mismatch(format!(
                        "single table field holds {} values",
                        bad.len()
                    )));
                }
            }
            Multiplicity::Flat => {}
            Multiplicity::Double => {
                let len = values.first().map(|v| v.len()).unwrap_or(0);
                if values.iter().any(|v| v.len() != len) {
                    let lengths: Vec<usize> = values.iter().map(|v| v.len()).collect();
                    return Err(mismatch(format!("parallel lists differ in length {:?}", lengths)));
                }
            }
        }
        Ok(())
    }
}

///
/// A named table mapping a key to one value list per declared field.
///
/// Rows are kept sorted by key so that equal content serializes identically.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedTable {
    name: String,
    schema: TableSchema,
    rows: BTreeMap<String, Vec<Vec<String>>>,
}

impl DerivedTable {
    pub fn new<S: Into<String>>(name: S, schema: TableSchema) -> Self {
        DerivedTable {
            name: name.into(),
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn key_field(&self) -> &str {
        &self.schema.key_field
    }

    pub fn fields(&self) -> &[String] {
        &self.schema.fields
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.schema.multiplicity
    }

    ///
    /// Merge a row under `key` following the table multiplicity.
    ///
    /// `values` holds one list per declared field.
    ///
    pub fn insert<K: Into<String>>(&mut self, key: K, values: Vec<Vec<String>>) -> Result<(), TableError> {
        let key = key.into();
        self.schema.check_row(&key, &values)?;

        match self.rows.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(values);
            }
            Entry::Occupied(mut slot) => match self.schema.multiplicity {
                Multiplicity::Single => {
                    slot.insert(values);
                }
                Multiplicity::Flat | Multiplicity::Double => {
                    for (existing, new) in slot.get_mut().iter_mut().zip(values) {
                        existing.extend(new);
                    }
                }
            },
        }
        Ok(())
    }

    /// Append one value to a flat table.
    pub fn push<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Result<(), TableError> {
        self.insert(key, vec![vec![value.into()]])
    }

    /// Append a list of values to a flat table. An empty list still creates the key.
    pub fn extend<K: Into<String>>(&mut self, key: K, values: Vec<String>) -> Result<(), TableError> {
        self.insert(key, vec![values])
    }

    /// Append one value per field to a double table, or set a single table row.
    pub fn push_row<K: Into<String>>(&mut self, key: K, row: Vec<String>) -> Result<(), TableError> {
        self.insert(key, row.into_iter().map(|v| vec![v]).collect())
    }

    pub fn get(&self, key: &str) -> Option<&[Vec<String>]> {
        self.rows.get(key).map(|v| v.as_slice())
    }

    /// Values of `field` under `key`.
    pub fn values(&self, key: &str, field: &str) -> Result<Option<&[String]>, TableError> {
        let idx = self.schema.field_index(field)?;
        Ok(self.rows.get(key).map(|v| v[idx].as_slice()))
    }

    /// Values of the first (target) field under `key`.
    pub fn target(&self, key: &str) -> Option<&[String]> {
        self.rows.get(key).map(|v| v[0].as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> + '_ {
        self.rows.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Vec<String>>)> + '_ {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    ///
    /// Check every row against the schema. Tables built through
    /// [`DerivedTable::insert`] always pass; this guards tables read back
    /// from disk or assembled elsewhere.
    ///
    pub fn validate(&self) -> Result<(), TableError> {
        self.schema.validate()?;
        for (key, values) in &self.rows {
            self.schema.check_row(key, values)?;
        }
        Ok(())
    }
}
