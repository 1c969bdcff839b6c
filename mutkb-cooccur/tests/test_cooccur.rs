use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::{TempDir, tempdir};

use mutkb_core::{MutatedIsoform, TsvCatalogSource};
use mutkb_cooccur::build_cooccurrence_matrix;
use mutkb_kb::{CatalogKnowledgeBase, CatalogServices, KbConfig, TableBackedServices};

const BRAF: &str = "ENSG00000157764";
const TP53: &str = "ENSG00000141510";

const CATALOG: &str = "\
#Gene name\tSample name\tMutation CDS\tMutation GRCh37 genome position\tMutation zygosity\tPubmed_PMID
BRAF\tS1\tc.1799T>A\t7:140453136-140453136\thet\t111
TP53\tS1\tc.215del5\t17:7577121-7577125\thom\t112
BRAF\tS2\tc.1799T>A\t7:140453136-140453136\thet\t222
KRAS\tS2\tc.?\t12:25398284\t\t
TP53\tS3\tc.216C>T\t17:7577200\thet\t333
";

struct Fixture {
    _dir: TempDir,
    kb: CatalogKnowledgeBase,
    services: CatalogServices,
}

#[fixture]
fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.tsv");
    fs::write(&catalog, CATALOG).unwrap();

    let mut lookups = TableBackedServices::new();
    lookups.add_transcript(BRAF, "ENST00000288602", Some("ENSP00000288602"));
    lookups.add_transcript(TP53, "ENST00000269305", Some("ENSP00000269305"));
    lookups.add_gene_name(BRAF, "BRAF");
    lookups.add_gene_name(TP53, "TP53");
    lookups.add_mutated_isoform(
        "7:140453136:A".parse().unwrap(),
        "ENSP00000288602:V600E".into(),
    );
    // no gene known for this protein
    lookups.add_mutated_isoform(
        "7:140453136:A".parse().unwrap(),
        "ENSP00000419060:V600E".into(),
    );
    lookups.add_mutated_isoform(
        "17:7577121:-----".parse().unwrap(),
        "ENSP00000269305:P72FrameShift".into(),
    );
    lookups.add_mutated_isoform(
        "17:7577121:-----".parse().unwrap(),
        "ENSP00000269305:P72P".into(),
    );
    lookups.add_mutated_isoform("17:7577200:T".parse().unwrap(), "ENSP00000269305:P72P".into());

    let services = CatalogServices::from_tables(lookups);
    let config = KbConfig::builder()
        .with_cache_folder(dir.path().join("cache"))
        .finish()
        .unwrap();
    let kb = CatalogKnowledgeBase::in_memory(
        config,
        Arc::new(TsvCatalogSource::new(&catalog)),
        services.clone(),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        kb,
        services,
    }
}

fn isoforms(values: &[&str]) -> Vec<MutatedIsoform> {
    values.iter().map(|v| MutatedIsoform::from(*v)).collect()
}

fn genes(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[rstest]
fn test_exact_match(fixture: Fixture) {
    let matrix = build_cooccurrence_matrix(
        fixture.kb.graph(),
        &fixture.services,
        &isoforms(&["ENSP00000288602:V600E"]),
        &genes(&["TP53"]),
        false,
    )
    .unwrap();

    assert_eq!(matrix.genes(), &[TP53]);
    assert_eq!(matrix.labels(), &["TP53"]);
    // S2 carries V600E but nothing in TP53; the synonymous change is ignored
    assert_eq!(matrix.samples().collect::<Vec<_>>(), vec!["S1"]);
    assert_eq!(
        matrix.cell("S1", "TP53").unwrap(),
        &isoforms(&["ENSP00000269305:P72FrameShift"])[..]
    );
    assert_eq!(matrix.row("S1").unwrap().pmids, genes(&["111", "112"]));
}

#[rstest]
fn test_every_gene_of_interest_gets_a_column(fixture: Fixture) {
    let matrix = build_cooccurrence_matrix(
        fixture.kb.graph(),
        &fixture.services,
        &isoforms(&["ENSP00000288602:V600E"]),
        &genes(&["TP53", "BRAF", BRAF]),
        false,
    )
    .unwrap();

    assert_eq!(matrix.genes(), &[TP53, BRAF]);
    assert_eq!(matrix.len(), 2);
    assert_eq!(
        matrix.cell("S2", BRAF).unwrap(),
        &isoforms(&["ENSP00000288602:V600E"])[..]
    );
    assert!(matrix.cell("S2", TP53).unwrap().is_empty());

    let table = matrix.to_table().unwrap();
    assert_eq!(table.fields(), &["TP53", "BRAF", "PMID"]);
    assert_eq!(table.values("S2", "PMID").unwrap().unwrap(), &genes(&["222"])[..]);
}

#[rstest]
fn test_soft_match(fixture: Fixture) {
    let interest = isoforms(&["ENSP00000288602:K601E"]);
    let exact = build_cooccurrence_matrix(
        fixture.kb.graph(),
        &fixture.services,
        &interest,
        &genes(&["TP53"]),
        false,
    )
    .unwrap();
    assert!(exact.is_empty());

    let soft = build_cooccurrence_matrix(
        fixture.kb.graph(),
        &fixture.services,
        &interest,
        &genes(&["TP53"]),
        true,
    )
    .unwrap();
    assert_eq!(soft.samples().collect::<Vec<_>>(), vec!["S1"]);
}

#[rstest]
fn test_write_tsv(fixture: Fixture) {
    let matrix = build_cooccurrence_matrix(
        fixture.kb.graph(),
        &fixture.services,
        &isoforms(&["ENSP00000288602:V600E"]),
        &genes(&["TP53"]),
        false,
    )
    .unwrap();

    let out = tempdir().unwrap();
    let path = out.path().join("matrix.tsv");
    matrix.write_tsv(&path).unwrap();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "Sample name\tTP53\tPMID\nS1\tENSP00000269305:P72FrameShift\t111|112\n"
    );
}
