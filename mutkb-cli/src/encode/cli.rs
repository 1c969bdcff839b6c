use clap::{Arg, Command, arg, value_parser};

use mutkb_core::consts::DEFAULT_BATCH_SIZE;

pub const ENCODE_CMD: &str = "encode";

pub fn create_encode_cli() -> Command {
    Command::new(ENCODE_CMD)
        .author("Databio")
        .about("Append a normalized Genomic Mutation column to a catalog export. Rows that can't be encoded are dropped and counted.")
        .arg(
            Arg::new("catalog")
                .required(true)
                .help("Catalog TSV (optionally gzipped), or - for stdin"),
        )
        .arg(arg!(--output <output> "Output TSV, stdout when omitted"))
        .arg(
            arg!(--"batch-size" <size>)
                .value_parser(value_parser!(usize))
                .help(format!("Rows encoded per parallel batch [default: {}]", DEFAULT_BATCH_SIZE)),
        )
        .arg(arg!(--"position-column" <name> "Name of the genome position column"))
        .arg(arg!(--"change-column" <name> "Name of the CDS change column"))
}
