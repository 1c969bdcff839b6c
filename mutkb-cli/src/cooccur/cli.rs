use clap::{Arg, ArgAction, Command, arg};

use crate::kb::cli::kb_args;

pub const COOCCUR_CMD: &str = "cooccur";

pub fn create_cooccur_cli() -> Command {
    Command::new(COOCCUR_CMD)
        .author("Databio")
        .about("Find samples where given protein mutations co-occur with mutations in given genes")
        .arg(
            Arg::new("isoforms")
                .long("isoforms")
                .short('m')
                .required(true)
                .value_delimiter(',')
                .action(ArgAction::Append)
                .help("Mutated isoforms of interest, e.g. ENSP00000288602:V600E"),
        )
        .arg(
            Arg::new("genes")
                .long("genes")
                .short('g')
                .required(true)
                .value_delimiter(',')
                .action(ArgAction::Append)
                .help("Genes of interest, names or Ensembl gene ids"),
        )
        .arg(
            arg!(--"soft-match" "Also keep samples with other mutations in the genes of the isoforms of interest")
                .action(ArgAction::SetTrue),
        )
        .arg(arg!(--output <output> "Output TSV, stdout when omitted"))
        .args(kb_args())
}
