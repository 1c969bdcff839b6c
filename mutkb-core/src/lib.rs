//! Core library for mutkb: somatic mutation models and the mutation
//! normalization codec.
//!
//! - [`models`]: chromosomes, genome positions, change descriptors, canonical
//!   mutation ids and mutated isoforms
//! - [`codec`]: raw position + change string → [`models::GenomicMutationId`]
//! - [`models::DerivedTable`]: keyed tables shared by the join engine and the
//!   knowledge base
//! - [`source`]: the raw catalog row stream every derivation starts from
//!
//! ```rust
//! use mutkb_core::codec::encode_mutation;
//!
//! let id = encode_mutation("7:140453136-140453136", Some("c.1799T>A")).unwrap();
//! assert_eq!(id.as_str(), "7:140453136:A");
//!
//! assert!(encode_mutation("", Some("c.1799T>A")).is_none());
//! ```

pub mod codec;
pub mod consts;
pub mod errors;
pub mod models;
pub mod source;
pub mod utils;

pub use codec::{encode, encode_batch, encode_mutation, encode_rows};
pub use errors::{CodecError, SourceError, TableError};
pub use models::{
    ChangeDescriptor, Chromosome, DerivedTable, GenomicMutationId, GenomicPosition, Multiplicity,
    MutatedIsoform, TableSchema,
};
pub use source::{RawRow, SourceTableProvider, TsvCatalogSource};
