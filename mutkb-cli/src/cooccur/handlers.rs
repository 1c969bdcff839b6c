use std::io::{self, BufWriter, Write};

use anyhow::Result;
use clap::ArgMatches;

use mutkb_cooccur::build_cooccurrence_matrix;
use mutkb_core::MutatedIsoform;

use crate::kb::handlers::open_kb;

pub fn run_cooccur(matches: &ArgMatches) -> Result<()> {
    let isoforms: Vec<MutatedIsoform> = matches
        .get_many::<String>("isoforms")
        .expect("Isoforms of interest are required.")
        .map(|mi| MutatedIsoform::from(mi.trim()))
        .collect();
    let genes: Vec<String> = matches
        .get_many::<String>("genes")
        .expect("Genes of interest are required.")
        .map(|g| g.trim().to_string())
        .collect();
    let soft_match = matches.get_flag("soft-match");

    let (kb, services) = open_kb(matches)?;
    let matrix = build_cooccurrence_matrix(kb.graph(), &services, &isoforms, &genes, soft_match)?;

    match matches.get_one::<String>("output") {
        Some(output) => matrix.write_tsv(output)?,
        None => {
            let mut out = BufWriter::new(io::stdout().lock());
            matrix.write(&mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}
