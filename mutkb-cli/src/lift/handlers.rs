use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{info, warn};

use mutkb_core::GenomicMutationId;
use mutkb_core::utils::get_dynamic_reader_w_stdin;
use mutkb_lift::{GenomeBuild, LiftMapping, PositionMapLiftover, lift};

pub fn run_lift(matches: &ArgMatches) -> Result<()> {
    let mutations = matches
        .get_one::<String>("mutations")
        .expect("A list of mutations is required.");
    let mapping = matches
        .get_one::<String>("mapping")
        .expect("A position map is required.");
    let from = GenomeBuild::new(matches.get_one::<String>("from").expect("Source build has a default").as_str());
    let to = GenomeBuild::new(matches.get_one::<String>("to").expect("Target build is required.").as_str());

    let service = PositionMapLiftover::from_path(mapping, from.clone(), to.clone())
        .with_context(|| format!("Failed to load position map {}", mapping))?;
    info!("Loaded {} mapped positions from {}", service.len(), mapping);

    let ids = read_ids(get_dynamic_reader_w_stdin(mutations)?)?;
    let lifted = lift(&service, &ids, &from, &to)?;

    let writer: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(output) => Box::new(BufWriter::new(
            File::create(output).with_context(|| format!("Failed to create {}", output))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    write_mapping(&lifted, &from, &to, writer)?;
    Ok(())
}

/// One id per line; blank lines skipped, unparsable ids warned about.
pub fn read_ids<R: BufRead>(reader: R) -> Result<Vec<GenomicMutationId>> {
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<GenomicMutationId>() {
            Ok(id) => ids.push(id),
            Err(e) => warn!("Skipping '{}': {}", raw, e),
        }
    }
    Ok(ids)
}

pub fn write_mapping<W: Write>(
    lifted: &LiftMapping,
    from: &GenomeBuild,
    to: &GenomeBuild,
    mut writer: W,
) -> Result<()> {
    writeln!(writer, "{}\t{}", from, to)?;
    for (id, target) in lifted {
        match target {
            Some(target) => writeln!(writer, "{}\t{}", id, target)?,
            None => writeln!(writer, "{}\t", id)?,
        }
    }
    writer.flush()?;
    Ok(())
}
