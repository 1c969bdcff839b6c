//! Knowledge base configuration.
//!
//! A [`KbConfig`] can be assembled with [`KbConfig::builder`] or read from a
//! TOML file:
//!
//! ```toml
//! organism = "Hsa"
//! build = "hg18"
//! catalog_build = "hg19"
//! namespace = "cosmic"
//! version = "v68"
//! cache_folder = "~/.mutkb"
//!
//! [columns]
//! position = "Mutation GRCh37 genome position"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mutkb_core::consts::DEFAULT_BATCH_SIZE;
use mutkb_core::source::ColumnMap;
use mutkb_lift::GenomeBuild;

use crate::consts::{DEFAULT_BUILD, DEFAULT_NAMESPACE, DEFAULT_ORGANISM, DEFAULT_VERSION};
use crate::errors::{KbError, Result};
use crate::utils::{expand_path, get_default_cache_folder};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    /// Organism code, e.g. `Hsa`.
    pub organism: String,
    /// Build the knowledge base tables are expressed in.
    pub build: GenomeBuild,
    /// Build of the positions found in the catalog. Defaults to the catalog
    /// export build, hg19.
    pub catalog_build: GenomeBuild,
    /// Namespace and version tag of persisted tables. Changing either one
    /// starts a fresh cache.
    pub namespace: String,
    pub version: String,
    /// Root of the persisted cache; see [`KbConfig::cache_folder`].
    pub cache_folder: Option<PathBuf>,
    pub batch_size: usize,
    pub columns: ColumnMap,
}

impl Default for KbConfig {
    fn default() -> Self {
        KbConfig {
            organism: DEFAULT_ORGANISM.to_string(),
            build: GenomeBuild::new(DEFAULT_BUILD),
            catalog_build: GenomeBuild::new(DEFAULT_BUILD),
            namespace: DEFAULT_NAMESPACE.to_string(),
            version: DEFAULT_VERSION.to_string(),
            cache_folder: None,
            batch_size: DEFAULT_BATCH_SIZE,
            columns: ColumnMap::default(),
        }
    }
}

impl KbConfig {
    pub fn builder() -> KbConfigBuilder {
        KbConfigBuilder::default()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: KbConfig = toml::from_str(raw).map_err(|e| KbError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| KbError::store(path, e))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| KbError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(KbError::Config("batch_size must be positive".to_string()));
        }
        for (what, value) in [
            ("organism", &self.organism),
            ("namespace", &self.namespace),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(KbError::Config(format!("{} must not be empty", what)));
            }
            if value.contains(['/', '\\']) {
                return Err(KbError::Config(format!("{} '{}' contains a path separator", what, value)));
            }
        }
        Ok(())
    }

    /// Cache root: the configured folder, else `$MUTKB_CACHE`, else
    /// `~/.mutkb/`, with `~` and environment variables expanded.
    pub fn cache_folder(&self) -> PathBuf {
        let raw = self
            .cache_folder
            .clone()
            .unwrap_or_else(get_default_cache_folder);
        expand_path(&raw)
    }

    /// `<cache>/<namespace>/<version>/<organism>-<build>`
    pub fn store_dir(&self) -> PathBuf {
        self.cache_folder()
            .join(&self.namespace)
            .join(&self.version)
            .join(format!("{}-{}", self.organism, self.build))
    }

    /// Whether catalog positions must be lifted into the knowledge base build.
    pub fn needs_lift(&self) -> bool {
        self.build != self.catalog_build
    }
}

/// Builder for [`KbConfig`]; unset values take the defaults.
#[derive(Default)]
pub struct KbConfigBuilder {
    organism: Option<String>,
    build: Option<GenomeBuild>,
    catalog_build: Option<GenomeBuild>,
    namespace: Option<String>,
    version: Option<String>,
    cache_folder: Option<PathBuf>,
    columns: Option<ColumnMap>,
    batch_size: Option<usize>,
}

impl KbConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organism<S: Into<String>>(mut self, organism: S) -> Self {
        self.organism = Some(organism.into());
        self
    }

    pub fn with_build<S: Into<String>>(mut self, build: S) -> Self {
        self.build = Some(GenomeBuild::new(build));
        self
    }

    pub fn with_catalog_build<S: Into<String>>(mut self, build: S) -> Self {
        self.catalog_build = Some(GenomeBuild::new(build));
        self
    }

    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_cache_folder(mut self, path: PathBuf) -> Self {
        self.cache_folder = Some(path);
        self
    }

    pub fn with_columns(mut self, columns: ColumnMap) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Consumes the builder and validates the resulting configuration.
    pub fn finish(self) -> Result<KbConfig> {
        let defaults = KbConfig::default();
        let config = KbConfig {
            organism: self.organism.unwrap_or(defaults.organism),
            build: self.build.unwrap_or(defaults.build),
            catalog_build: self.catalog_build.unwrap_or(defaults.catalog_build),
            namespace: self.namespace.unwrap_or(defaults.namespace),
            version: self.version.unwrap_or(defaults.version),
            cache_folder: self.cache_folder.or(defaults.cache_folder),
            columns: self.columns.unwrap_or(defaults.columns),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
        };
        config.validate()?;
        Ok(config)
    }
}
