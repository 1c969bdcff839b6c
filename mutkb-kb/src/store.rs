//! Persisted table store.
//!
//! Each table lives in `<root>/<name>.bin`, bincode-encoded. Writes go to a
//! temporary file in the same directory that is renamed over the final path
//! once complete, so a reader sees either the previous table or the new one.

use std::fs::{self, File, create_dir_all};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use log::{debug, info};
use tempfile::NamedTempFile;

use mutkb_core::DerivedTable;

use crate::consts::DEFAULT_TABLE_EXT;
use crate::errors::{KbError, Result};

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    /// Open a store rooted at `root`, creating the folder if needed.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        create_dir_all(&root).map_err(|e| KbError::store(&root, e))?;
        Ok(TableStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, DEFAULT_TABLE_EXT))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Load a persisted table, `None` when nothing is stored under `name`.
    pub fn load(&self, name: &str) -> Result<Option<DerivedTable>> {
        let path = self.path(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KbError::store(path, e)),
        };
        let len = file.metadata().map_err(|e| KbError::store(&path, e))?.len();

        // lengths read from a damaged file can't claim more than the file holds
        let table: DerivedTable = bincode_options()
            .with_limit(len)
            .deserialize_from(BufReader::new(file))
            .map_err(|source| KbError::Serialization {
                path: path.clone(),
                source,
            })?;
        debug!("Loaded '{}' from {:?}", name, path);
        Ok(Some(table))
    }

    /// Persist `table` under its own name, replacing any previous copy.
    pub fn save(&self, table: &DerivedTable) -> Result<PathBuf> {
        let path = self.path(table.name());

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| KbError::store(&self.root, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            bincode_options()
                .serialize_into(&mut writer, table)
                .map_err(|source| KbError::Serialization {
                    path: path.clone(),
                    source,
                })?;
            writer.flush().map_err(|e| KbError::store(&path, e))?;
        }
        tmp.persist(&path).map_err(|e| KbError::store(&path, e.error))?;

        info!("Persisted '{}' ({} keys) to {:?}", table.name(), table.len(), path);
        Ok(path)
    }

    /// Remove a persisted table. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(KbError::store(path, e)),
        }
    }

    /// Names of all persisted tables, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| KbError::store(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| KbError::store(&self.root, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(DEFAULT_TABLE_EXT) {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutkb_core::TableSchema;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    #[fixture]
    fn store_dir() -> TempDir {
        tempdir().unwrap()
    }

    fn table(name: &str) -> DerivedTable {
        let mut table = DerivedTable::new(name, TableSchema::flat("Sample", "Genomic Mutation"));
        table.push("s1", "7:140453136:A").unwrap();
        table.push("s1", "17:7577121:-----").unwrap();
        table
    }

    #[rstest]
    fn test_save_and_load(store_dir: TempDir) {
        let store = TableStore::new(store_dir.path().join("cosmic/v1")).unwrap();
        let path = store.save(&table("sample_mutations")).unwrap();
        assert!(path.ends_with("sample_mutations.bin"));

        let loaded = store.load("sample_mutations").unwrap().unwrap();
        assert_eq!(loaded, table("sample_mutations"));
        assert!(store.load("missing").unwrap().is_none());
    }

    #[rstest]
    fn test_save_leaves_no_temporary_files(store_dir: TempDir) {
        let store = TableStore::new(store_dir.path()).unwrap();
        store.save(&table("a")).unwrap();
        store.save(&table("a")).unwrap();
        store.save(&table("b")).unwrap();

        let files = fs::read_dir(store_dir.path()).unwrap().count();
        assert_eq!(files, 2);
        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[rstest]
    fn test_remove(store_dir: TempDir) {
        let store = TableStore::new(store_dir.path()).unwrap();
        store.save(&table("a")).unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(!store.contains("a"));
    }

    #[rstest]
    fn test_corrupt_file_is_a_decode_error(store_dir: TempDir) {
        let store = TableStore::new(store_dir.path()).unwrap();
        fs::write(store.path("bad"), b"not bincode").unwrap();
        assert!(matches!(store.load("bad"), Err(KbError::Serialization { .. })));

        store.save(&table("cut")).unwrap();
        let bytes = fs::read(store.path("cut")).unwrap();
        fs::write(store.path("cut"), &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(store.load("cut"), Err(KbError::Serialization { .. })));
    }
}
