use std::io::Write;

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::NamedTempFile;

use mutkb_core::{GenomicMutationId, encode_mutation};
use mutkb_lift::{GenomeBuild, PositionMapLiftover, lift};

#[fixture]
fn chain_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "7:140453136\t7:140099605").unwrap();
    writeln!(file, "17:7577120\t17:7517845").unwrap();
    writeln!(file, "24:2655030\t24:2715030").unwrap();
    file.flush().unwrap();
    file
}

#[rstest]
fn test_lift_encoded_catalog_ids(chain_file: NamedTempFile) {
    let service = PositionMapLiftover::from_path(
        chain_file.path(),
        GenomeBuild::new("GRCh37"),
        GenomeBuild::new("hg18"),
    )
    .unwrap();

    let ids: Vec<GenomicMutationId> = [
        ("7:140453136-140453136", "c.1799T>A"),
        ("17:7577120-7577120", "c.818G>A"),
        ("24:2655030-2655032", "c.100_102delGGA"),
        ("3:178936091-178936091", "c.1633G>A"),
    ]
    .iter()
    .filter_map(|(pos, change)| encode_mutation(pos, Some(change)))
    .collect();
    assert_eq!(ids.len(), 4);

    let mapping = lift(&service, &ids, &"GRCh37".into(), &"hg18".into()).unwrap();
    let lifted: Vec<Option<&str>> = ids
        .iter()
        .map(|id| mapping[id].as_ref().map(|l| l.as_str()))
        .collect();

    assert_eq!(
        lifted,
        vec![
            Some("7:140099605:A"),
            Some("17:7517845:A"),
            Some("Y:2715030:---"),
            None,
        ]
    );
}

#[rstest]
fn test_round_trip_through_both_builds(chain_file: NamedTempFile) {
    let service =
        PositionMapLiftover::from_path(chain_file.path(), "GRCh37".into(), "hg18".into()).unwrap();
    let ids: Vec<GenomicMutationId> = vec!["7:140453136:A".parse().unwrap()];

    let forward = lift(&service, &ids, &"GRCh37".into(), &"hg18".into()).unwrap();
    let targets: Vec<GenomicMutationId> = forward.values().flatten().cloned().collect();
    let back = lift(&service, &targets, &"hg18".into(), &"GRCh37".into()).unwrap();

    assert_eq!(back.values().flatten().cloned().collect::<Vec<_>>(), ids);
}
