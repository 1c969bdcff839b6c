//! On-demand derivation graph and the somatic mutation catalog knowledge base.
//!
//! - [`graph`]: named derived tables computed once, on first use, with
//!   per-name single flight and cycle detection
//! - [`store`]: bincode persistence of materialized tables
//! - [`catalog`]: the catalog tables and their producers
//! - [`services`]: identifier, isoform, damage score and statistics services
//! - [`config`]: [`KbConfig`], from a builder or a TOML file

pub mod catalog;
pub mod config;
pub mod consts;
pub mod errors;
pub mod graph;
pub mod services;
pub mod stats;
pub mod store;
pub mod utils;

pub use catalog::{CatalogKnowledgeBase, catalog_schema, register_catalog};
pub use config::{KbConfig, KbConfigBuilder};
pub use errors::{KbError, Result};
pub use graph::{DerivationGraph, FnProducer, Producer};
pub use services::{
    CatalogServices, DamageScoreSource, IdentifierService, IsoformService, StatisticalTest,
    TableBackedServices,
};
pub use stats::WelchTTest;
pub use store::TableStore;
