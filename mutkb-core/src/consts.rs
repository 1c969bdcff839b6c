//! Constants shared across the mutkb crates: catalog column names, derived
//! field names and the chromosome rewrite table.

// Catalog column names (as found in the catalog export header)

pub const MUTATION_ID_COLUMN: &str = "Mutation ID";
pub const SAMPLE_COLUMN: &str = "Sample name";
pub const GENE_NAME_COLUMN: &str = "Gene name";
pub const POSITION_COLUMN: &str = "Mutation GRCh37 genome position";
pub const CDS_COLUMN: &str = "Mutation CDS";
pub const ZYGOSITY_COLUMN: &str = "Mutation zygosity";
pub const PUBMED_COLUMN: &str = "Pubmed_PMID";

// Field names used by derived tables

pub const GENOMIC_MUTATION_FIELD: &str = "Genomic Mutation";
pub const SAMPLE_FIELD: &str = "Sample";
pub const ZYGOSITY_FIELD: &str = "Mutation zygosity";
pub const PUBMED_FIELD: &str = "Pubmed_PMID";
pub const GENE_ID_FIELD: &str = "Ensembl Gene ID";
pub const PROTEIN_ID_FIELD: &str = "Ensembl Protein ID";
pub const MUTATED_ISOFORM_FIELD: &str = "Mutated Isoform";
pub const CHANGE_FIELD: &str = "Change";

/// Separator between the segments of a genomic mutation id and between the
/// protein and change of a mutated isoform.
pub const SEGMENT_SEPARATOR: char = ':';

/// Legacy numeric chromosome codes used by older catalog exports.
pub const LEGACY_CHROMOSOME_CODES: &[(&str, &str)] = &[("23", "X"), ("24", "Y"), ("25", "MT")];

/// The only chromosome token of three or more characters that is accepted.
pub const MITOCHONDRIAL: &str = "MT";

/// Rows encoded per parallel batch when streaming a catalog.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;
