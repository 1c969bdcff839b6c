use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use mutkb_core::consts::{DEFAULT_BATCH_SIZE, GENOMIC_MUTATION_FIELD};
use mutkb_core::encode_batch;
use mutkb_core::source::{ColumnMap, header_fields};
use mutkb_core::utils::get_dynamic_reader_w_stdin;

/// Rows written and rows dropped, by reason.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EncodeReport {
    pub encoded: usize,
    pub skipped: BTreeMap<&'static str, usize>,
}

impl EncodeReport {
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

pub fn run_encode(matches: &ArgMatches) -> Result<()> {
    let catalog = matches
        .get_one::<String>("catalog")
        .expect("A path to a catalog export is required.");
    let batch_size = matches
        .get_one::<usize>("batch-size")
        .copied()
        .unwrap_or(DEFAULT_BATCH_SIZE);
    if batch_size == 0 {
        bail!("--batch-size must be greater than zero");
    }

    let mut columns = ColumnMap::default();
    if let Some(position) = matches.get_one::<String>("position-column") {
        columns.position = position.clone();
    }
    if let Some(change) = matches.get_one::<String>("change-column") {
        columns.change = change.clone();
    }

    let reader = get_dynamic_reader_w_stdin(catalog)?;
    let writer: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(output) => Box::new(BufWriter::new(
            File::create(output).with_context(|| format!("Failed to create {}", output))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {pos} rows encoded {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = annotate_catalog(reader, writer, &columns, batch_size, |rows| {
        spinner.set_position(rows as u64)
    })?;
    spinner.finish_and_clear();

    info!(
        "Encoded {} rows, skipped {}",
        report.encoded,
        report.total_skipped()
    );
    for (reason, count) in &report.skipped {
        info!("  {}: {}", reason, count);
    }

    Ok(())
}

///
/// Stream a catalog export from `reader` to `writer`, appending the
/// normalized mutation id of each row as a last column.
///
/// Rows are encoded `batch_size` at a time in parallel. Rows whose mutation
/// can't be encoded are left out of the output and tallied by reason.
///
pub fn annotate_catalog<R, W, F>(
    mut reader: R,
    mut writer: W,
    columns: &ColumnMap,
    batch_size: usize,
    progress: F,
) -> Result<EncodeReport>
where
    R: BufRead,
    W: Write,
    F: Fn(usize),
{
    let mut header = String::new();
    if reader.read_line(&mut header)? == 0 {
        bail!("The catalog is empty");
    }
    let names = header_fields(&header);
    let find = |name: &str| names.iter().position(|h| h.trim() == name);
    let Some(position) = find(&columns.position) else {
        bail!("No '{}' column in the catalog header", columns.position);
    };
    let change = find(&columns.change);

    writeln!(
        writer,
        "{}\t{}",
        header.trim_end_matches(['\n', '\r']),
        GENOMIC_MUTATION_FIELD
    )?;

    let mut report = EncodeReport::default();
    let mut batch: Vec<String> = Vec::with_capacity(batch_size);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        batch.push(line);
        if batch.len() == batch_size {
            write_batch(&batch, position, change, &mut writer, &mut report)?;
            batch.clear();
            progress(report.encoded);
        }
    }
    write_batch(&batch, position, change, &mut writer, &mut report)?;
    progress(report.encoded);

    writer.flush()?;
    Ok(report)
}

fn write_batch<W: Write>(
    lines: &[String],
    position: usize,
    change: Option<usize>,
    writer: &mut W,
    report: &mut EncodeReport,
) -> Result<()> {
    let pairs: Vec<(Option<&str>, Option<&str>)> = lines
        .iter()
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let cell = |idx: usize| fields.get(idx).copied().map(str::trim).filter(|v| !v.is_empty());
            (cell(position), change.and_then(cell))
        })
        .collect();

    for (line, encoded) in lines.iter().zip(encode_batch(&pairs)) {
        match encoded {
            Ok(id) => {
                writeln!(writer, "{}\t{}", line, id)?;
                report.encoded += 1;
            }
            Err(e) => *report.skipped.entry(e.reason()).or_default() += 1,
        }
    }
    Ok(())
}
