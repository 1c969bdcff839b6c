//! External collaborators of the knowledge base.
//!
//! Gene/transcript/protein identifier translation, mutation → isoform
//! annotation, damage predictor scores and the statistical test are all
//! consumed through the traits below. [`TableBackedServices`] implements the
//! lookups from a folder of two-column TSV files.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use fxhash::FxHashMap;
use log::{info, warn};

use mutkb_core::utils::{read_pairs, split_multi};
use mutkb_core::{GenomicMutationId, GenomicPosition, MutatedIsoform};
use mutkb_lift::LiftoverService;

use crate::consts::{
    DAMAGE_SCORES_FILE, GENE_NAMES_FILE, GENE_TRANSCRIPTS_FILE, MUTATED_ISOFORMS_FILE,
    POSITION_GENES_FILE, PRINCIPAL_ISOFORMS_FILE, TRANSCRIPT_PROTEINS_FILE,
};
use crate::errors::{KbError, Result};
use crate::stats::WelchTTest;

/// Translation between genome positions, genes, transcripts and proteins.
pub trait IdentifierService: Send + Sync {
    /// Genes overlapping each position. Positions outside any gene may be
    /// left out of the result.
    fn genes_for_positions(
        &self,
        positions: &[GenomicPosition],
    ) -> Result<BTreeMap<GenomicPosition, Vec<String>>>;

    fn transcripts_for_gene(&self, gene: &str) -> Result<Vec<String>>;

    fn protein_for_transcript(&self, transcript: &str) -> Result<Option<String>>;

    fn gene_for_protein(&self, protein: &str) -> Result<Option<String>>;

    /// Gene ids for each gene name or id. Unknown names are left out.
    fn translate_genes(&self, genes: &[String]) -> Result<BTreeMap<String, Vec<String>>>;

    fn gene_name(&self, gene: &str) -> Result<Option<String>>;

    /// Principal protein isoforms of a gene.
    fn principal_isoforms(&self, gene: &str) -> Result<Vec<String>>;
}

/// Annotates genomic mutations with the protein changes they cause.
pub trait IsoformService: Send + Sync {
    fn mutated_isoforms(
        &self,
        mutations: &[GenomicMutationId],
    ) -> Result<BTreeMap<GenomicMutationId, Vec<MutatedIsoform>>>;
}

/// One-sided test that `sample` is greater than `background`.
pub trait StatisticalTest: Send + Sync {
    fn one_sided_p_value(&self, sample: &[f64], background: &[f64]) -> Result<f64>;
}

/// Per-residue damage predictor scores.
pub trait DamageScoreSource: Send + Sync {
    /// Predictor scores for every scored mutated isoform of `protein`.
    /// Missing predictions carry the `-999` marker.
    fn damage_scores(&self, protein: &str) -> Result<BTreeMap<String, Vec<f64>>>;
}

///
/// The services a catalog knowledge base is built with.
///
#[derive(Clone)]
pub struct CatalogServices {
    pub identifiers: Arc<dyn IdentifierService>,
    pub isoforms: Arc<dyn IsoformService>,
    pub liftover: Option<Arc<dyn LiftoverService>>,
    pub damage_scores: Option<Arc<dyn DamageScoreSource>>,
    pub statistics: Arc<dyn StatisticalTest>,
}

impl CatalogServices {
    pub fn new(identifiers: Arc<dyn IdentifierService>, isoforms: Arc<dyn IsoformService>) -> Self {
        CatalogServices {
            identifiers,
            isoforms,
            liftover: None,
            damage_scores: None,
            statistics: Arc::new(WelchTTest),
        }
    }

    /// All lookups answered by one [`TableBackedServices`], which also
    /// provides damage scores.
    pub fn from_tables(tables: TableBackedServices) -> Self {
        let tables = Arc::new(tables);
        Self::new(tables.clone(), tables.clone()).with_damage_scores(tables)
    }

    pub fn with_liftover(mut self, liftover: Arc<dyn LiftoverService>) -> Self {
        self.liftover = Some(liftover);
        self
    }

    pub fn with_damage_scores(mut self, source: Arc<dyn DamageScoreSource>) -> Self {
        self.damage_scores = Some(source);
        self
    }

    pub fn with_statistics(mut self, test: Arc<dyn StatisticalTest>) -> Self {
        self.statistics = test;
        self
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

///
/// Identifier, isoform and damage score lookups held in memory.
///
/// Load from a folder with [`TableBackedServices::from_dir`], or fill one in
/// with the `add_*` methods.
///
#[derive(Debug, Clone, Default)]
pub struct TableBackedServices {
    position_genes: FxHashMap<GenomicPosition, Vec<String>>,
    gene_transcripts: FxHashMap<String, Vec<String>>,
    transcript_protein: FxHashMap<String, String>,
    protein_gene: FxHashMap<String, String>,
    gene_names: FxHashMap<String, String>,
    name_genes: FxHashMap<String, Vec<String>>,
    principal: FxHashMap<String, Vec<String>>,
    isoforms: FxHashMap<GenomicMutationId, Vec<MutatedIsoform>>,
    damage: FxHashMap<String, BTreeMap<String, Vec<f64>>>,
}

impl TableBackedServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_gene_position(&mut self, position: GenomicPosition, gene: &str) {
        push_unique(self.position_genes.entry(position).or_default(), gene.to_string());
    }

    /// Record a gene's transcript and, when known, the protein it encodes.
    pub fn add_transcript(&mut self, gene: &str, transcript: &str, protein: Option<&str>) {
        push_unique(
            self.gene_transcripts.entry(gene.to_string()).or_default(),
            transcript.to_string(),
        );
        if let Some(protein) = protein {
            self.transcript_protein
                .insert(transcript.to_string(), protein.to_string());
            self.protein_gene
                .insert(protein.to_string(), gene.to_string());
        }
    }

    fn add_transcript_protein(&mut self, transcript: &str, protein: &str) {
        self.transcript_protein
            .insert(transcript.to_string(), protein.to_string());
    }

    pub fn add_gene_name(&mut self, gene: &str, name: &str) {
        self.gene_names.insert(gene.to_string(), name.to_string());
        push_unique(self.name_genes.entry(name.to_string()).or_default(), gene.to_string());
    }

    pub fn add_principal_isoform(&mut self, gene: &str, protein: &str) {
        push_unique(self.principal.entry(gene.to_string()).or_default(), protein.to_string());
        self.protein_gene
            .entry(protein.to_string())
            .or_insert_with(|| gene.to_string());
    }

    pub fn add_mutated_isoform(&mut self, mutation: GenomicMutationId, isoform: MutatedIsoform) {
        let isoforms = self.isoforms.entry(mutation).or_default();
        if !isoforms.contains(&isoform) {
            isoforms.push(isoform);
        }
    }

    pub fn add_damage_scores(&mut self, isoform: &MutatedIsoform, scores: Vec<f64>) {
        self.damage
            .entry(isoform.protein().to_string())
            .or_default()
            .insert(isoform.as_str().to_string(), scores);
    }

    ///
    /// Load every lookup file present in `dir`. Missing files leave the
    /// matching lookup empty; lines that can't be parsed are skipped.
    ///
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut services = TableBackedServices::new();

        let load = |file: &str| -> Result<Vec<(String, String)>> {
            let path = dir.join(file);
            if !path.is_file() {
                warn!("No {} in {:?}, lookup left empty", file, dir);
                return Ok(Vec::new());
            }
            read_pairs(&path).map_err(|e| KbError::ExternalService(format!("{:#}", e)))
        };

        for (position, gene) in load(POSITION_GENES_FILE)? {
            match position.parse::<GenomicPosition>() {
                Ok(position) => services.add_gene_position(position, gene.trim()),
                Err(e) => warn!("Skipping {} entry '{}': {}", POSITION_GENES_FILE, position, e),
            }
        }
        for (transcript, protein) in load(TRANSCRIPT_PROTEINS_FILE)? {
            services.add_transcript_protein(transcript.trim(), protein.trim());
        }
        for (gene, transcript) in load(GENE_TRANSCRIPTS_FILE)? {
            let protein = services.transcript_protein.get(transcript.trim()).cloned();
            services.add_transcript(gene.trim(), transcript.trim(), protein.as_deref());
        }
        for (gene, name) in load(GENE_NAMES_FILE)? {
            services.add_gene_name(gene.trim(), name.trim());
        }
        for (gene, protein) in load(PRINCIPAL_ISOFORMS_FILE)? {
            services.add_principal_isoform(gene.trim(), protein.trim());
        }
        for (mutation, isoform) in load(MUTATED_ISOFORMS_FILE)? {
            match mutation.parse::<GenomicMutationId>() {
                Ok(mutation) => {
                    for isoform in split_multi(&isoform) {
                        services.add_mutated_isoform(mutation.clone(), MutatedIsoform::from(isoform));
                    }
                }
                Err(e) => warn!("Skipping {} entry '{}': {}", MUTATED_ISOFORMS_FILE, mutation, e),
            }
        }
        for (isoform, scores) in load(DAMAGE_SCORES_FILE)? {
            let parsed: std::result::Result<Vec<f64>, _> =
                split_multi(&scores).iter().map(|s| s.parse::<f64>()).collect();
            match parsed {
                Ok(scores) => services.add_damage_scores(&MutatedIsoform::from(isoform.trim()), scores),
                Err(e) => warn!("Skipping {} entry '{}': {}", DAMAGE_SCORES_FILE, isoform, e),
            }
        }

        info!(
            "Loaded lookups from {:?}: {} positions, {} genes, {} annotated mutations",
            dir,
            services.position_genes.len(),
            services.gene_transcripts.len().max(services.gene_names.len()),
            services.isoforms.len()
        );
        Ok(services)
    }

    fn is_gene_id(&self, gene: &str) -> bool {
        self.gene_names.contains_key(gene)
            || self.gene_transcripts.contains_key(gene)
            || self.principal.contains_key(gene)
    }
}

impl IdentifierService for TableBackedServices {
    fn genes_for_positions(
        &self,
        positions: &[GenomicPosition],
    ) -> Result<BTreeMap<GenomicPosition, Vec<String>>> {
        Ok(positions
            .iter()
            .filter_map(|p| self.position_genes.get(p).map(|g| (p.clone(), g.clone())))
            .collect())
    }

    fn transcripts_for_gene(&self, gene: &str) -> Result<Vec<String>> {
        Ok(self.gene_transcripts.get(gene).cloned().unwrap_or_default())
    }

    fn protein_for_transcript(&self, transcript: &str) -> Result<Option<String>> {
        Ok(self.transcript_protein.get(transcript).cloned())
    }

    fn gene_for_protein(&self, protein: &str) -> Result<Option<String>> {
        Ok(self.protein_gene.get(protein).cloned())
    }

    fn translate_genes(&self, genes: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
        let mut translated = BTreeMap::new();
        for gene in genes {
            if self.is_gene_id(gene) {
                translated.insert(gene.clone(), vec![gene.clone()]);
            } else if let Some(ids) = self.name_genes.get(gene) {
                translated.insert(gene.clone(), ids.clone());
            }
        }
        Ok(translated)
    }

    fn gene_name(&self, gene: &str) -> Result<Option<String>> {
        Ok(self.gene_names.get(gene).cloned())
    }

    fn principal_isoforms(&self, gene: &str) -> Result<Vec<String>> {
        Ok(self.principal.get(gene).cloned().unwrap_or_default())
    }
}

impl IsoformService for TableBackedServices {
    fn mutated_isoforms(
        &self,
        mutations: &[GenomicMutationId],
    ) -> Result<BTreeMap<GenomicMutationId, Vec<MutatedIsoform>>> {
        Ok(mutations
            .iter()
            .filter_map(|m| self.isoforms.get(m).map(|i| (m.clone(), i.clone())))
            .collect())
    }
}

impl DamageScoreSource for TableBackedServices {
    fn damage_scores(&self, protein: &str) -> Result<BTreeMap<String, Vec<f64>>> {
        Ok(self.damage.get(protein).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    #[fixture]
    fn lookup_dir() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(POSITION_GENES_FILE),
            "7:140453136\tENSG00000157764\n23:100\tENSG0000X\nchr7:1\tENSG_BAD\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(GENE_TRANSCRIPTS_FILE),
            "ENSG00000157764\tENST00000288602\nENSG00000157764\tENST00000496384\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(TRANSCRIPT_PROTEINS_FILE),
            "ENST00000288602\tENSP00000288602\n",
        )
        .unwrap();
        fs::write(dir.path().join(GENE_NAMES_FILE), "ENSG00000157764\tBRAF\n").unwrap();
        fs::write(
            dir.path().join(PRINCIPAL_ISOFORMS_FILE),
            "ENSG00000157764\tENSP00000288602\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(MUTATED_ISOFORMS_FILE),
            "7:140453136:A\tENSP00000288602:V600E|ENSP00000419060:V600E\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(DAMAGE_SCORES_FILE),
            "ENSP00000288602:V600E\t0.9|-999|0.7\nENSP00000288602:V600K\tnot-a-score\n",
        )
        .unwrap();
        dir
    }

    #[rstest]
    fn test_from_dir(lookup_dir: TempDir) {
        let services = TableBackedServices::from_dir(lookup_dir.path()).unwrap();
        let braf = "ENSG00000157764".to_string();

        let positions: Vec<GenomicPosition> =
            vec!["7:140453136".parse().unwrap(), "X:100".parse().unwrap(), "1:1".parse().unwrap()];
        let genes = services.genes_for_positions(&positions).unwrap();
        assert_eq!(genes.len(), 2);
        assert_eq!(genes[&positions[0]], vec![braf.clone()]);

        assert_eq!(services.transcripts_for_gene(&braf).unwrap().len(), 2);
        assert_eq!(
            services.gene_for_protein("ENSP00000288602").unwrap(),
            Some(braf.clone())
        );
        assert_eq!(services.gene_name(&braf).unwrap().as_deref(), Some("BRAF"));
        assert_eq!(
            services.principal_isoforms(&braf).unwrap(),
            vec!["ENSP00000288602".to_string()]
        );

        let mutation: GenomicMutationId = "7:140453136:A".parse().unwrap();
        let isoforms = services.mutated_isoforms(&[mutation.clone()]).unwrap();
        assert_eq!(isoforms[&mutation].len(), 2);

        let scores = services.damage_scores("ENSP00000288602").unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores["ENSP00000288602:V600E"], vec![0.9, -999.0, 0.7]);
    }

    #[rstest]
    fn test_translate_genes(lookup_dir: TempDir) {
        let services = TableBackedServices::from_dir(lookup_dir.path()).unwrap();
        let translated = services
            .translate_genes(&["BRAF".to_string(), "ENSG00000157764".to_string(), "NOPE".to_string()])
            .unwrap();
        assert_eq!(translated.len(), 2);
        assert_eq!(translated["BRAF"], vec!["ENSG00000157764".to_string()]);
    }

    #[test]
    fn test_missing_files_leave_lookups_empty() {
        let dir = tempdir().unwrap();
        let services = TableBackedServices::from_dir(dir.path()).unwrap();
        assert!(services.principal_isoforms("ENSG1").unwrap().is_empty());
    }
}
