//! Constants for knowledge base configuration, table names and persisted
//! file organization.

// Environment variable names

/// Environment variable name for setting the cache directory location.
///
/// When set, this overrides the default cache location (`~/.mutkb/`).
///
/// # Example
///
/// ```bash
/// export MUTKB_CACHE=/custom/cache/path
/// ```
pub const MUTKB_CACHE_ENV: &str = "MUTKB_CACHE";

/// Default cache folder name created under the home directory.
pub const DEFAULT_CACHE_SUBFOLDER: &str = ".mutkb/";

// Configuration defaults

pub const DEFAULT_ORGANISM: &str = "Hsa";
pub const DEFAULT_BUILD: &str = "hg19";
pub const DEFAULT_NAMESPACE: &str = "cosmic";
pub const DEFAULT_VERSION: &str = "v1";

// File extension constants

/// Extension of persisted tables. Tables are stored bincode-encoded.
pub const DEFAULT_TABLE_EXT: &str = ".bin";

// Catalog table names

pub const SAMPLE_MUTATIONS: &str = "sample_mutations";
pub const SAMPLE_PMIDS: &str = "sample_pmids";
pub const MUTATION_INDEX: &str = "mutation_index";
pub const MUTATION_GENES: &str = "mutation_genes";
pub const MUTATION_ISOFORMS: &str = "mutation_isoforms";
pub const MUTATION_PROTEIN_CHANGES: &str = "mutation_protein_changes";
pub const GENE_PRINCIPAL_ISOFORM_MUTATIONS: &str = "gene_principal_isoform_mutations";
pub const GENE_DAMAGE_ANALYSIS: &str = "gene_damage_analysis";

// Damage analysis fields

pub const AVG_DAMAGE_FIELD: &str = "Avg. damage score";
pub const BG_AVG_DAMAGE_FIELD: &str = "Bg. Avg. damage score";
pub const P_VALUE_FIELD: &str = "T-test p-value";

/// Missing-score marker used by damage predictors.
pub const MISSING_DAMAGE_SCORE: f64 = -999.0;

/// Both the mutated residues and the distinct background scores must reach
/// this count before a test is run.
pub const MIN_DAMAGE_OBSERVATIONS: usize = 3;

/// Prefix of the protein ids the damage analysis covers.
pub const ENSEMBL_PROTEIN_PREFIX: &str = "ENSP";

// Lookup files read by `TableBackedServices`, all two-column TSVs

/// `chr:pos` → Ensembl gene id
pub const POSITION_GENES_FILE: &str = "position_genes.tsv";
/// Ensembl gene id → Ensembl transcript id
pub const GENE_TRANSCRIPTS_FILE: &str = "gene_transcripts.tsv";
/// Ensembl transcript id → Ensembl protein id
pub const TRANSCRIPT_PROTEINS_FILE: &str = "transcript_proteins.tsv";
/// Ensembl gene id → associated gene name
pub const GENE_NAMES_FILE: &str = "gene_names.tsv";
/// Ensembl gene id → principal protein isoform
pub const PRINCIPAL_ISOFORMS_FILE: &str = "principal_isoforms.tsv";
/// Genomic mutation → mutated isoform
pub const MUTATED_ISOFORMS_FILE: &str = "mutated_isoforms.tsv";
/// Mutated isoform → `|` separated predictor scores
pub const DAMAGE_SCORES_FILE: &str = "damage_scores.tsv";
