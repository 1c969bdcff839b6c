mod cooccur;
mod encode;
mod kb;
mod lift;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use log::LevelFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "mutkb";
    pub const BIN_NAME: &str = "mutkb";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("Databio")
        .about("Normalize somatic mutation catalogs and query the tables derived from them.")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug messages"),
        )
        .subcommand(encode::cli::create_encode_cli())
        .subcommand(lift::cli::create_lift_cli())
        .subcommand(kb::cli::create_kb_cli())
        .subcommand(cooccur::cli::create_cooccur_cli())
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();

    init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        //
        // ENCODE
        //
        Some((encode::cli::ENCODE_CMD, matches)) => {
            encode::handlers::run_encode(matches)?;
        }

        //
        // LIFT
        //
        Some((lift::cli::LIFT_CMD, matches)) => {
            lift::handlers::run_lift(matches)?;
        }

        //
        // KNOWLEDGE BASE
        //
        Some((kb::cli::KB_CMD, matches)) => {
            kb::handlers::run_kb(matches)?;
        }

        //
        // CO-OCCURRENCE
        //
        Some((cooccur::cli::COOCCUR_CMD, matches)) => {
            cooccur::handlers::run_cooccur(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
