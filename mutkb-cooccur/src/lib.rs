//! Co-occurrence of protein mutations with mutations in genes of interest.
//!
//! [`build_cooccurrence_matrix`] walks every sample of the catalog, keeps the
//! samples carrying one of the isoforms of interest (or, with soft matching,
//! any mutation in a gene contributing one), and lists which of the sample's
//! mutated isoforms fall in each gene of interest.

pub mod errors;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use fxhash::{FxHashMap, FxHashSet};
use log::{info, warn};
use rayon::prelude::*;

use mutkb_core::consts::{GENOMIC_MUTATION_FIELD, SAMPLE_COLUMN};
use mutkb_core::{DerivedTable, MutatedIsoform, TableSchema};
use mutkb_kb::consts::{MUTATION_ISOFORMS, SAMPLE_MUTATIONS, SAMPLE_PMIDS};
use mutkb_kb::{CatalogServices, DerivationGraph};

pub use errors::{CooccurError, Result};

/// Trailing evidence column of the matrix.
pub const PMID_FIELD: &str = "PMID";

/// Name of the table produced by [`CooccurrenceMatrix::to_table`].
pub const COOCCURRENCE_TABLE: &str = "cooccurrence_matrix";

/// Joins the isoforms of one cell, and the PMIDs, into a single value.
pub const CELL_SEPARATOR: &str = "|";

/// One matrix row: the isoforms hit in each gene of interest, in gene order,
/// and the publications reporting the sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixRow {
    pub cells: Vec<Vec<MutatedIsoform>>,
    pub pmids: Vec<String>,
}

///
/// Samples × genes of interest. Only samples with at least one isoform in a
/// gene of interest are present.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooccurrenceMatrix {
    genes: Vec<String>,
    labels: Vec<String>,
    rows: BTreeMap<String, MatrixRow>,
}

impl CooccurrenceMatrix {
    /// Gene ids of the columns, sorted.
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Column headers: the gene name where one is known, else the gene id.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn samples(&self) -> impl Iterator<Item = &String> + '_ {
        self.rows.keys()
    }

    pub fn row(&self, sample: &str) -> Option<&MatrixRow> {
        self.rows.get(sample)
    }

    /// Isoforms of `sample` in the gene with id or label `gene`.
    pub fn cell(&self, sample: &str, gene: &str) -> Option<&[MutatedIsoform]> {
        let column = self
            .genes
            .iter()
            .position(|g| g == gene)
            .or_else(|| self.labels.iter().position(|l| l == gene))?;
        self.rows.get(sample).map(|row| row.cells[column].as_slice())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    ///
    /// Convert to a `Double` table keyed by `Sample name`, one field per gene
    /// label plus [`PMID_FIELD`]. Each field holds a single value: the cell's
    /// isoforms joined by [`CELL_SEPARATOR`], empty when none.
    ///
    pub fn to_table(&self) -> Result<DerivedTable> {
        let mut fields: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        fields.push(PMID_FIELD);
        let mut table = DerivedTable::new(
            COOCCURRENCE_TABLE,
            TableSchema::double(SAMPLE_COLUMN, &fields),
        );

        for (sample, row) in &self.rows {
            let mut values: Vec<Vec<String>> = row
                .cells
                .iter()
                .map(|cell| vec![join_cell(cell.iter().map(MutatedIsoform::as_str))])
                .collect();
            values.push(vec![join_cell(row.pmids.iter().map(String::as_str))]);
            table.insert(sample.as_str(), values)?;
        }
        Ok(table)
    }

    /// Render as TSV with a `Sample name` header row.
    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write!(out, "{}", SAMPLE_COLUMN)?;
        for label in &self.labels {
            write!(out, "\t{}", label)?;
        }
        writeln!(out, "\t{}", PMID_FIELD)?;

        for (sample, row) in &self.rows {
            write!(out, "{}", sample)?;
            for cell in &row.cells {
                write!(out, "\t{}", join_cell(cell.iter().map(MutatedIsoform::as_str)))?;
            }
            writeln!(out, "\t{}", join_cell(row.pmids.iter().map(String::as_str)))?;
        }
        Ok(())
    }

    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let wrap = |source| CooccurError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut out = BufWriter::new(File::create(path).map_err(wrap)?);
        self.write(&mut out).map_err(wrap)?;
        out.flush().map_err(wrap)
    }
}

fn join_cell<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(CELL_SEPARATOR)
}

///
/// Build the co-occurrence matrix of `isoforms_of_interest` against
/// `genes_of_interest` (gene names or ids).
///
/// A sample is kept when it carries one of the isoforms of interest, or with
/// `soft_match` any mutated isoform in a gene contributing one. Only
/// non-synonymous protein changes are considered. Kept samples with no
/// isoform in any gene of interest are left out.
///
/// Soft matching widens the candidate samples to the whole contributing
/// gene, not only to samples the annotation service reports for the
/// isoforms of interest. A sample mutated anywhere in BRAF counts as a
/// soft match for `V600E`, including residues far from 600.
///
pub fn build_cooccurrence_matrix(
    graph: &DerivationGraph,
    services: &CatalogServices,
    isoforms_of_interest: &[MutatedIsoform],
    genes_of_interest: &[String],
    soft_match: bool,
) -> Result<CooccurrenceMatrix> {
    let identifiers = services.identifiers.as_ref();

    let interest: FxHashSet<&MutatedIsoform> = isoforms_of_interest.iter().collect();
    let mut contributing = FxHashSet::default();
    for protein in isoforms_of_interest.iter().map(MutatedIsoform::protein).collect::<BTreeSet<_>>() {
        match identifiers
            .gene_for_protein(protein)
            .map_err(CooccurError::service("protein to gene"))?
        {
            Some(gene) => {
                contributing.insert(gene);
            }
            None => warn!("No gene found for protein {}", protein),
        }
    }

    let genes: Vec<String> = identifiers
        .translate_genes(genes_of_interest)
        .map_err(CooccurError::service("gene translation"))?
        .into_values()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if genes.is_empty() {
        warn!("None of the genes of interest {:?} could be resolved", genes_of_interest);
    }
    let labels = gene_labels(services, &genes)?;

    let sample_mutations = graph.get(SAMPLE_MUTATIONS)?;
    let mutation_isoforms = graph.get(MUTATION_ISOFORMS)?;
    let sample_pmids = graph.get(SAMPLE_PMIDS)?;
    let mutation_column = sample_mutations.schema().field_index(GENOMIC_MUTATION_FIELD)?;

    // non-synonymous protein changes per sample
    let candidates: Vec<(&String, BTreeSet<MutatedIsoform>)> = sample_mutations
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(sample, values)| {
            let isoforms = values[mutation_column]
                .iter()
                .filter_map(|mutation| mutation_isoforms.target(mutation))
                .flatten()
                .map(|mi| MutatedIsoform::from(mi.as_str()))
                .filter(|mi| mi.is_protein_change() && !mi.is_synonymous())
                .collect();
            (sample, isoforms)
        })
        .collect();

    let proteins: BTreeSet<&str> = candidates
        .iter()
        .flat_map(|(_, isoforms)| isoforms.iter().map(MutatedIsoform::protein))
        .collect();
    let protein_genes: FxHashMap<String, String> = proteins
        .into_par_iter()
        .map(|protein| {
            identifiers
                .gene_for_protein(protein)
                .map(|gene| gene.map(|g| (protein.to_string(), g)))
                .map_err(CooccurError::service("protein to gene"))
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let columns: FxHashMap<&str, usize> =
        genes.iter().enumerate().map(|(i, g)| (g.as_str(), i)).collect();

    let rows: BTreeMap<String, MatrixRow> = candidates
        .into_par_iter()
        .filter(|(_, isoforms)| {
            if soft_match {
                isoforms.iter().any(|mi| {
                    protein_genes
                        .get(mi.protein())
                        .is_some_and(|gene| contributing.contains(gene))
                })
            } else {
                isoforms.iter().any(|mi| interest.contains(mi))
            }
        })
        .filter_map(|(sample, isoforms)| {
            let mut cells = vec![Vec::new(); genes.len()];
            for mi in isoforms {
                let column = protein_genes
                    .get(mi.protein())
                    .and_then(|gene| columns.get(gene.as_str()));
                if let Some(&column) = column {
                    cells[column].push(mi);
                }
            }
            if cells.iter().all(Vec::is_empty) {
                return None;
            }
            let pmids = sample_pmids
                .target(sample)
                .map(|p| p.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect())
                .unwrap_or_default();
            Some((sample.clone(), MatrixRow { cells, pmids }))
        })
        .collect();

    info!(
        "Co-occurrence matrix: {} of {} samples across {} genes",
        rows.len(),
        sample_mutations.len(),
        genes.len()
    );
    Ok(CooccurrenceMatrix {
        genes,
        labels,
        rows,
    })
}

/// Column headers for `genes`, falling back to the id when the name is
/// unknown or already taken.
fn gene_labels(services: &CatalogServices, genes: &[String]) -> Result<Vec<String>> {
    let mut seen = FxHashSet::default();
    let mut labels = Vec::with_capacity(genes.len());
    for gene in genes {
        let name = services
            .identifiers
            .gene_name(gene)
            .map_err(CooccurError::service("gene name"))?;
        let label = match name {
            Some(name) if !seen.contains(&name) => name,
            _ => gene.clone(),
        };
        seen.insert(label.clone());
        labels.push(label);
    }
    Ok(labels)
}
