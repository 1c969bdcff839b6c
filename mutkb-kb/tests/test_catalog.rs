use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::{TempDir, tempdir};

use mutkb_core::TsvCatalogSource;
use mutkb_kb::{
    CatalogKnowledgeBase, CatalogServices, KbConfig, KbError, TableBackedServices,
};
use mutkb_lift::{GenomeBuild, PositionMapLiftover};

const BRAF: &str = "ENSG00000157764";
const TP53: &str = "ENSG00000141510";

const CATALOG: &str = "\
#Mutation ID\tGene name\tSample name\tMutation CDS\tMutation GRCh37 genome position\tMutation zygosity\tPubmed_PMID
COSM476\tBRAF\tS1\tc.1799T>A\t7:140453136-140453136\thet\t111
COSM10704\tTP53\tS1\tc.215del5\t17:7577121-7577125\thom\t111
COSM476\tBRAF\tS2\tc.1799T>A\t7:140453136-140453136\thet\t222
COSM516\tKRAS\tS3\tc.35G>A\t\thet\t333
BROKEN
COSM521\tKRAS\tS2\tc.?\t12:25398284\t\t
";

struct Fixture {
    dir: TempDir,
    catalog: PathBuf,
}

impl Fixture {
    fn config(&self) -> KbConfig {
        KbConfig::builder()
            .with_cache_folder(self.dir.path().join("cache"))
            .with_batch_size(2)
            .finish()
            .unwrap()
    }

    fn source(&self) -> Arc<TsvCatalogSource> {
        Arc::new(TsvCatalogSource::new(&self.catalog))
    }
}

#[fixture]
fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.tsv");
    fs::write(&catalog, CATALOG).unwrap();
    Fixture { dir, catalog }
}

fn lookups() -> TableBackedServices {
    let mut services = TableBackedServices::new();
    services.add_gene_position("7:140453136".parse().unwrap(), BRAF);
    services.add_gene_position("17:7577121".parse().unwrap(), TP53);
    services.add_transcript(BRAF, "ENST00000288602", Some("ENSP00000288602"));
    services.add_transcript(TP53, "ENST00000269305", Some("ENSP00000269305"));
    services.add_gene_name(BRAF, "BRAF");
    services.add_gene_name(TP53, "TP53");
    services.add_principal_isoform(BRAF, "ENSP00000288602");
    services.add_principal_isoform(TP53, "ENSP00000269305");

    let braf_v600e = "7:140453136:A".parse().unwrap();
    services.add_mutated_isoform(braf_v600e, "ENSP00000288602:V600E".into());
    let braf_v600e = "7:140453136:A".parse().unwrap();
    services.add_mutated_isoform(braf_v600e, "ENSP00000419060:V600E".into());
    let braf_v600e = "7:140453136:A".parse().unwrap();
    services.add_mutated_isoform(braf_v600e, "ENSP00000419060:UTR".into());
    services.add_mutated_isoform(
        "17:7577121:-----".parse().unwrap(),
        "ENSP00000269305:P72FrameShift".into(),
    );

    services.add_damage_scores(&"ENSP00000288602:V600E".into(), vec![0.9, 0.8]);
    services.add_damage_scores(&"ENSP00000288602:A1B".into(), vec![0.1]);
    services.add_damage_scores(&"ENSP00000288602:C2D".into(), vec![0.2, -999.0]);
    services.add_damage_scores(&"ENSP00000288602:E3F".into(), vec![-999.0]);
    services
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[rstest]
fn test_sample_tables(fixture: Fixture) {
    let kb = CatalogKnowledgeBase::new(
        fixture.config(),
        fixture.source(),
        CatalogServices::from_tables(lookups()),
    )
    .unwrap();

    let samples = kb.get_table("sample_mutations").unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(
        samples.get("S1").unwrap(),
        &[
            strings(&["7:140453136:A", "17:7577121:-----"]),
            strings(&["het", "hom"]),
        ][..]
    );
    assert_eq!(
        samples.values("S2", "Genomic Mutation").unwrap().unwrap(),
        &strings(&["7:140453136:A", "12:25398284:?(c.?)"])[..]
    );
    assert!(!samples.contains_key("S3"));

    assert_eq!(kb.children("sample_pmids", "S1").unwrap(), strings(&["111"]));
    assert_eq!(kb.children("sample_pmids", "S3").unwrap(), strings(&["333"]));
}

#[rstest]
fn test_annotation_tables(fixture: Fixture) {
    let kb = CatalogKnowledgeBase::new(
        fixture.config(),
        fixture.source(),
        CatalogServices::from_tables(lookups()),
    )
    .unwrap();

    assert_eq!(kb.children("mutation_genes", "7:140453136:A").unwrap(), strings(&[BRAF]));
    assert_eq!(kb.children("mutation_genes", "17:7577121:-----").unwrap(), strings(&[TP53]));
    assert!(kb.children("mutation_genes", "12:25398284:?(c.?)").unwrap().is_empty());

    // isoforms without an amino acid change stay out of the protein changes
    assert!(
        kb.children("mutation_isoforms", "7:140453136:A")
            .unwrap()
            .contains(&"ENSP00000419060:UTR".to_string())
    );
    let changes = kb.get_table("mutation_protein_changes").unwrap();
    assert_eq!(
        changes.get("7:140453136:A").unwrap(),
        &[
            strings(&["ENSP00000288602", "ENSP00000419060"]),
            strings(&["V600E", "V600E"]),
        ][..]
    );

    let principal = kb.get_table("gene_principal_isoform_mutations").unwrap();
    assert_eq!(principal.len(), 2);
    assert_eq!(principal.target(BRAF), Some(&strings(&["ENSP00000288602:V600E"])[..]));
    assert_eq!(
        principal.target(TP53),
        Some(&strings(&["ENSP00000269305:P72FrameShift"])[..])
    );
}

#[rstest]
fn test_mutation_index(fixture: Fixture) {
    let kb = CatalogKnowledgeBase::new(
        fixture.config(),
        fixture.source(),
        CatalogServices::from_tables(lookups()),
    )
    .unwrap();

    let index = kb.get_table("mutation_index").unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(index.target("COSM476"), Some(&strings(&["7:140453136:A"])[..]));
    assert_eq!(index.target("COSM10704"), Some(&strings(&["17:7577121:-----"])[..]));
    // no position, so no genomic mutation
    assert!(!index.contains_key("COSM516"));

    assert_eq!(
        kb.mutation_ids_in_range("7", 140_453_000, 140_454_000).unwrap(),
        strings(&["COSM476"])
    );
    assert_eq!(
        kb.mutation_ids_in_range("12", 25_398_284, 25_398_285).unwrap(),
        strings(&["COSM521"])
    );
    assert!(kb.mutation_ids_in_range("X", 1, u64::MAX).unwrap().is_empty());
    assert!(matches!(
        kb.mutation_ids_in_range("ABC", 1, 10),
        Err(KbError::Codec(_))
    ));
}

#[rstest]
fn test_damage_analysis_below_threshold(fixture: Fixture) {
    let kb = CatalogKnowledgeBase::new(
        fixture.config(),
        fixture.source(),
        CatalogServices::from_tables(lookups()),
    )
    .unwrap();

    let damage = kb.get_table("gene_damage_analysis").unwrap();
    let braf = damage.get(BRAF).unwrap();
    let avg: f64 = braf[0][0].parse().unwrap();
    let background: f64 = braf[1][0].parse().unwrap();
    assert!((avg - 0.85).abs() < 1e-9);
    assert!((background - (0.85 + 0.1 + 0.2) / 3.0).abs() < 1e-9);
    assert_eq!(braf[2], strings(&["1"]));

    // no damage scores at all for TP53's protein
    let tp53 = damage.get(TP53).unwrap();
    assert_eq!(tp53, &[strings(&[""]), strings(&[""]), strings(&["1"])][..]);
}

#[rstest]
fn test_tables_persist_across_instances(fixture: Fixture) {
    let services = CatalogServices::from_tables(lookups());
    let first =
        CatalogKnowledgeBase::new(fixture.config(), fixture.source(), services.clone()).unwrap();
    let samples = first.get_table("sample_mutations").unwrap();
    assert!(
        fixture
            .config()
            .store_dir()
            .join("sample_mutations.bin")
            .is_file()
    );

    // the catalog is gone; only the persisted copy can answer
    fs::remove_file(&fixture.catalog).unwrap();
    let second = CatalogKnowledgeBase::new(fixture.config(), fixture.source(), services).unwrap();
    assert_eq!(second.get_table("sample_mutations").unwrap(), samples);

    second.invalidate("sample_mutations").unwrap();
    assert!(matches!(
        second.get_table("sample_mutations"),
        Err(KbError::Source(_))
    ));
}

#[rstest]
fn test_namespace_version_isolate_caches(fixture: Fixture) {
    let services = CatalogServices::from_tables(lookups());
    let v1 = fixture.config();
    let kb = CatalogKnowledgeBase::new(v1.clone(), fixture.source(), services.clone()).unwrap();
    kb.get_table("sample_pmids").unwrap();

    let mut v2 = v1.clone();
    v2.version = "v2".to_string();
    assert!(!v2.store_dir().join("sample_pmids.bin").exists());
    assert!(v1.store_dir().join("sample_pmids.bin").exists());
}

fn write_chain(dir: &Path) -> PathBuf {
    let path = dir.join("hg19_to_hg18.tsv");
    fs::write(&path, "7:140453136\t7:140099605\n12:25398284\t12:25289551\n").unwrap();
    path
}

#[rstest]
fn test_sample_mutations_lifted_to_other_build(fixture: Fixture) {
    let chain = write_chain(fixture.dir.path());
    let liftover =
        PositionMapLiftover::from_path(chain, GenomeBuild::new("hg19"), GenomeBuild::new("hg18"))
            .unwrap();

    let config = KbConfig::builder()
        .with_cache_folder(fixture.dir.path().join("cache"))
        .with_build("hg18")
        .finish()
        .unwrap();
    let services = CatalogServices::from_tables(lookups()).with_liftover(Arc::new(liftover));
    let kb = CatalogKnowledgeBase::new(config, fixture.source(), services).unwrap();

    let samples = kb.get_table("sample_mutations").unwrap();
    // 17:7577121 has no hg18 counterpart: dropped with its zygosity
    assert_eq!(
        samples.get("S1").unwrap(),
        &[strings(&["7:140099605:A"]), strings(&["het"])][..]
    );
    assert_eq!(
        samples.target("S2"),
        Some(&strings(&["7:140099605:A", "12:25289551:?(c.?)"])[..])
    );

    let index = kb.get_table("mutation_index").unwrap();
    assert_eq!(index.target("COSM476"), Some(&strings(&["7:140099605:A"])[..]));
    assert!(!index.contains_key("COSM10704"));
}

#[rstest]
fn test_lift_without_service_fails(fixture: Fixture) {
    let config = KbConfig::builder()
        .with_cache_folder(fixture.dir.path().join("cache"))
        .with_build("hg18")
        .finish()
        .unwrap();
    let kb = CatalogKnowledgeBase::new(
        config,
        fixture.source(),
        CatalogServices::from_tables(lookups()),
    )
    .unwrap();
    assert!(matches!(kb.get_table("sample_mutations"), Err(KbError::Config(_))));
    assert!(!kb.graph().is_materialized("sample_mutations"));
}
