//! Source table provider: the raw catalog rows every derivation starts from.
//!
//! Catalogs are far too large to hold in memory, so providers hand out a lazy
//! row iterator and consumers process it as a stream.

use std::io::{BufRead, Lines};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{
    CDS_COLUMN, GENE_NAME_COLUMN, MUTATION_ID_COLUMN, POSITION_COLUMN, PUBMED_COLUMN,
    SAMPLE_COLUMN, ZYGOSITY_COLUMN,
};
use crate::errors::SourceError;
use crate::utils::get_dynamic_reader;

/// One mutation observation in one sample, as found in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub mutation_id: Option<String>,
    pub sample: String,
    pub gene_name: Option<String>,
    pub position: Option<String>,
    pub change: Option<String>,
    pub zygosity: Option<String>,
    pub pubmed: Option<String>,
}

impl RawRow {
    pub fn new(sample: &str, position: Option<&str>, change: Option<&str>) -> Self {
        RawRow {
            sample: sample.to_string(),
            position: position.map(String::from),
            change: change.map(String::from),
            ..Default::default()
        }
    }

    pub fn with_zygosity(mut self, zygosity: &str) -> Self {
        self.zygosity = Some(zygosity.to_string());
        self
    }

    pub fn with_pubmed(mut self, pubmed: &str) -> Self {
        self.pubmed = Some(pubmed.to_string());
        self
    }

    pub fn with_gene_name(mut self, gene_name: &str) -> Self {
        self.gene_name = Some(gene_name.to_string());
        self
    }
}

pub type RowIter<'a> = Box<dyn Iterator<Item = Result<RawRow, SourceError>> + Send + 'a>;

///
/// Anything that can stream raw catalog rows.
///
/// `rows` may be called more than once; each call starts a fresh pass.
///
pub trait SourceTableProvider: Send + Sync {
    fn rows(&self) -> Result<RowIter<'_>, SourceError>;
}

impl SourceTableProvider for Vec<RawRow> {
    fn rows(&self) -> Result<RowIter<'_>, SourceError> {
        Ok(Box::new(self.iter().cloned().map(Ok::<RawRow, SourceError>)))
    }
}

///
/// Names of the catalog columns read into a [`RawRow`].
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub mutation_id: String,
    pub sample: String,
    pub gene_name: String,
    pub position: String,
    pub change: String,
    pub zygosity: String,
    pub pubmed: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            mutation_id: MUTATION_ID_COLUMN.to_string(),
            sample: SAMPLE_COLUMN.to_string(),
            gene_name: GENE_NAME_COLUMN.to_string(),
            position: POSITION_COLUMN.to_string(),
            change: CDS_COLUMN.to_string(),
            zygosity: ZYGOSITY_COLUMN.to_string(),
            pubmed: PUBMED_COLUMN.to_string(),
        }
    }
}

/// Column indices resolved against a header line. Only `sample` is required.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    mutation_id: Option<usize>,
    sample: usize,
    gene_name: Option<usize>,
    position: Option<usize>,
    change: Option<usize>,
    zygosity: Option<usize>,
    pubmed: Option<usize>,
    width: usize,
}

impl ColumnIndex {
    pub fn resolve(header: &[&str], columns: &ColumnMap) -> Result<Self, SourceError> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        let sample =
            find(&columns.sample).ok_or_else(|| SourceError::MissingColumn(columns.sample.clone()))?;

        Ok(ColumnIndex {
            mutation_id: find(&columns.mutation_id),
            sample,
            gene_name: find(&columns.gene_name),
            position: find(&columns.position),
            change: find(&columns.change),
            zygosity: find(&columns.zygosity),
            pubmed: find(&columns.pubmed),
            width: header.len(),
        })
    }

    /// Index of the position column, if present in the header.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Index of the change column, if present in the header.
    pub fn change(&self) -> Option<usize> {
        self.change
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, fields: &[&str], line: usize) -> Result<RawRow, SourceError> {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let sample = fields
            .get(self.sample)
            .map(|s| s.trim().to_string())
            .ok_or(SourceError::MalformedLine {
                line,
                expected: self.width,
                found: fields.len(),
            })?;

        Ok(RawRow {
            mutation_id: cell(self.mutation_id),
            sample,
            gene_name: cell(self.gene_name),
            position: cell(self.position),
            change: cell(self.change),
            zygosity: cell(self.zygosity),
            pubmed: cell(self.pubmed),
        })
    }
}

/// Strip the `#` some exports put in front of the header line.
pub fn header_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\n', '\r'])
        .trim_start_matches('#')
        .split('\t')
        .collect()
}

///
/// Catalog export on disk: a tab separated (optionally gzipped) file with a
/// header line naming its columns.
///
#[derive(Debug, Clone)]
pub struct TsvCatalogSource {
    pub path: PathBuf,
    pub columns: ColumnMap,
}

impl TsvCatalogSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        TsvCatalogSource {
            path: path.as_ref().to_path_buf(),
            columns: ColumnMap::default(),
        }
    }

    pub fn with_columns(mut self, columns: ColumnMap) -> Self {
        self.columns = columns;
        self
    }
}

struct TsvRows<R: BufRead> {
    lines: Lines<R>,
    index: ColumnIndex,
    line_num: usize,
}

impl<R: BufRead> Iterator for TsvRows<R> {
    type Item = Result<RawRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_num += 1;

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
            return Some(self.index.row(&fields, self.line_num));
        }
    }
}

impl SourceTableProvider for TsvCatalogSource {
    fn rows(&self) -> Result<RowIter<'_>, SourceError> {
        let mut reader = get_dynamic_reader(&self.path)?;

        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Err(SourceError::MissingHeader(self.path.display().to_string()));
        }
        let index = ColumnIndex::resolve(&header_fields(&header), &self.columns)?;

        Ok(Box::new(TsvRows {
            lines: reader.lines(),
            index,
            line_num: 1,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Write;

    #[fixture]
    fn catalog() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.tsv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "Gene name\tSample name\tMutation ID\tMutation CDS\tMutation zygosity\tMutation GRCh37 genome position\tPubmed_PMID"
        )
        .unwrap();
        writeln!(f, "BRAF\tS1\tCOSM476\tc.1799T>A\thet\t7:140453136-140453136\t123").unwrap();
        writeln!(f, "TP53\tS2\tCOSM10648\tc.215del5\t\t17:7577121\t").unwrap();
        writeln!(f, "KRAS\tS3\tCOSM521\tc.35G>A\thom\t\t").unwrap();
        (dir, path)
    }

    #[rstest]
    fn test_tsv_rows(catalog: (tempfile::TempDir, PathBuf)) {
        let (_dir, path) = catalog;
        let source = TsvCatalogSource::new(&path);
        let rows: Vec<RawRow> = source.rows().unwrap().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            RawRow {
                mutation_id: Some("COSM476".to_string()),
                sample: "S1".to_string(),
                gene_name: Some("BRAF".to_string()),
                position: Some("7:140453136-140453136".to_string()),
                change: Some("c.1799T>A".to_string()),
                zygosity: Some("het".to_string()),
                pubmed: Some("123".to_string()),
            }
        );
        assert_eq!(rows[1].zygosity, None);
        assert_eq!(rows[1].pubmed, None);
        // trailing empty cells are dropped by the exporter
        assert_eq!(rows[2].position, None);
    }

    #[rstest]
    fn test_rows_can_be_streamed_twice(catalog: (tempfile::TempDir, PathBuf)) {
        let (_dir, path) = catalog;
        let source = TsvCatalogSource::new(&path);
        assert_eq!(source.rows().unwrap().count(), 3);
        assert_eq!(source.rows().unwrap().count(), 3);
    }

    #[test]
    fn test_missing_sample_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        std::fs::write(&path, "a\tb\n1\t2\n").unwrap();
        let source = TsvCatalogSource::new(&path);
        assert!(matches!(source.rows(), Err(SourceError::MissingColumn(_))));
    }

    #[test]
    fn test_hash_prefixed_header() {
        let fields = header_fields("#Sample name\tMutation CDS\n");
        assert_eq!(fields, vec!["Sample name", "Mutation CDS"]);
    }
}
