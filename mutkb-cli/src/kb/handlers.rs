use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{debug, info, warn};

use mutkb_core::{DerivedTable, TsvCatalogSource};
use mutkb_kb::{CatalogKnowledgeBase, CatalogServices, KbConfig, TableBackedServices};
use mutkb_lift::{GenomeBuild, PositionMapLiftover};

use super::cli::{KB_GET, KB_INVALIDATE, KB_LIST, KB_SHOW};

/// Separator between the values of one field when printing a table.
const VALUE_SEPARATOR: &str = "|";

///
/// Build the knowledge base described by the shared `kb` options: the
/// configuration file if given, overridden by the individual flags.
///
pub fn open_kb(matches: &ArgMatches) -> Result<(CatalogKnowledgeBase, CatalogServices)> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => KbConfig::from_path(path)
            .with_context(|| format!("Failed to read configuration {}", path))?,
        None => KbConfig::default(),
    };
    let flag = |name: &str| matches.get_one::<String>(name).cloned();
    if let Some(organism) = flag("organism") {
        config.organism = organism;
    }
    if let Some(build) = flag("build") {
        config.build = GenomeBuild::new(build);
    }
    if let Some(build) = flag("catalog-build") {
        config.catalog_build = GenomeBuild::new(build);
    }
    if let Some(namespace) = flag("namespace") {
        config.namespace = namespace;
    }
    if let Some(tag) = flag("tag") {
        config.version = tag;
    }
    if let Some(folder) = flag("cache-folder") {
        config.cache_folder = Some(PathBuf::from(folder));
    }

    let tables = match flag("lookups") {
        Some(dir) => TableBackedServices::from_dir(&dir)
            .with_context(|| format!("Failed to load lookups from {}", dir))?,
        None => {
            warn!("No --lookups given, annotation tables will be empty");
            TableBackedServices::new()
        }
    };
    let mut services = CatalogServices::from_tables(tables);
    if let Some(mapping) = flag("liftover") {
        let liftover = PositionMapLiftover::from_path(
            &mapping,
            config.catalog_build.clone(),
            config.build.clone(),
        )
        .with_context(|| format!("Failed to load position map {}", mapping))?;
        services = services.with_liftover(Arc::new(liftover));
    }

    // without a catalog only persisted tables can be served
    let catalog = flag("catalog").unwrap_or_else(|| {
        debug!("No --catalog given");
        String::new()
    });
    let source = TsvCatalogSource::new(&catalog).with_columns(config.columns.clone());

    info!(
        "Knowledge base {} {} ({}/{}) at {}",
        config.organism,
        config.build,
        config.namespace,
        config.version,
        config.store_dir().display()
    );
    let kb = CatalogKnowledgeBase::new(config, Arc::new(source), services.clone())?;
    Ok((kb, services))
}

pub fn run_kb(matches: &ArgMatches) -> Result<()> {
    let (subcmd, sub_matches) = matches.subcommand().expect("A subcommand is required");
    let (kb, _) = open_kb(sub_matches)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match subcmd {
        KB_GET => {
            let table = sub_matches
                .get_one::<String>("table")
                .expect("A table name is required.");
            match sub_matches.get_one::<String>("key") {
                Some(key) => {
                    for value in kb.children(table, key)? {
                        writeln!(out, "{}", value)?;
                    }
                }
                None => {
                    let derived = kb.get_table(table)?;
                    writeln!(
                        out,
                        "{}\t{} keys\t{}",
                        derived.name(),
                        derived.len(),
                        derived.multiplicity()
                    )?;
                }
            }
        }
        KB_SHOW => {
            let table = sub_matches
                .get_one::<String>("table")
                .expect("A table name is required.");
            let derived = kb.get_table(table)?;
            let limit = sub_matches.get_one::<usize>("limit").copied();
            if sub_matches.get_flag("json") {
                serde_json::to_writer_pretty(&mut out, &*derived)?;
                writeln!(out)?;
            } else {
                write_table(&derived, limit, &mut out)?;
            }
        }
        KB_INVALIDATE => {
            let table = sub_matches
                .get_one::<String>("table")
                .expect("A table name is required.");
            kb.invalidate(table)?;
            info!("Invalidated {}", table);
        }
        KB_LIST => {
            let store = kb.graph().store();
            for name in kb.names() {
                let state = if kb.graph().is_materialized(&name) {
                    "in memory"
                } else if store.is_some_and(|s| s.contains(&name)) {
                    "persisted"
                } else {
                    "not built"
                };
                writeln!(out, "{}\t{}", name, state)?;
            }
        }
        _ => unreachable!("Unknown kb subcommand: {subcmd}"),
    }

    out.flush()?;
    Ok(())
}

/// TSV rendering: key column then one column per field, multiple values
/// joined by `|`.
pub fn write_table<W: Write>(table: &DerivedTable, limit: Option<usize>, out: &mut W) -> Result<()> {
    write!(out, "{}", table.key_field())?;
    for field in table.fields() {
        write!(out, "\t{}", field)?;
    }
    writeln!(out)?;

    for (key, values) in table.iter().take(limit.unwrap_or(usize::MAX)) {
        write!(out, "{}", key)?;
        for field_values in values {
            write!(out, "\t{}", field_values.join(VALUE_SEPARATOR))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mutkb_core::TableSchema;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_table() {
        let mut table = DerivedTable::new(
            "sample_mutations",
            TableSchema::double("Sample", &["Genomic Mutation", "Mutation zygosity"]),
        );
        table
            .push_row("S1", vec!["7:140453136:A".to_string(), "het".to_string()])
            .unwrap();
        table
            .push_row("S1", vec!["17:7577121:-----".to_string(), "hom".to_string()])
            .unwrap();
        table
            .push_row("S2", vec!["7:140453136:A".to_string(), "het".to_string()])
            .unwrap();

        let mut out = Vec::new();
        write_table(&table, Some(1), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Sample\tGenomic Mutation\tMutation zygosity\nS1\t7:140453136:A|17:7577121:-----\thet|hom\n"
        );
    }
}
