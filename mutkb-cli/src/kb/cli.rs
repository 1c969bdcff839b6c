use clap::{Arg, ArgAction, Command, arg, value_parser};

pub const KB_CMD: &str = "kb";
pub const KB_GET: &str = "get";
pub const KB_SHOW: &str = "show";
pub const KB_INVALIDATE: &str = "invalidate";
pub const KB_LIST: &str = "list";

/// Options locating and configuring a catalog knowledge base. Shared with
/// the `cooccur` command.
pub fn kb_args() -> Vec<Arg> {
    vec![
        arg!(--config <config> "TOML knowledge base configuration"),
        arg!(--catalog <catalog> "Catalog TSV the tables derive from (optionally gzipped)"),
        arg!(--lookups <dir> "Folder of identifier and isoform lookup TSVs"),
        arg!(--liftover <mapping> "chr:pos position map from the catalog build to --build"),
        arg!(--"cache-folder" <path> "Cache folder path"),
        arg!(--organism <organism> "Organism code"),
        arg!(--build <build> "Build of the knowledge base tables"),
        arg!(--"catalog-build" <build> "Build of the catalog positions"),
        arg!(--namespace <namespace> "Namespace of the persisted tables"),
        arg!(--tag <version> "Version tag of the persisted tables"),
    ]
}

fn table_arg() -> Arg {
    Arg::new("table").required(true).help("Table name")
}

pub fn create_kb_cli() -> Command {
    Command::new(KB_CMD)
        .author("Databio")
        .about("Materialize, inspect and invalidate the tables derived from a mutation catalog")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(kb_args().into_iter().map(|a| a.global(true)))
        .subcommand(
            Command::new(KB_GET)
                .about("Materialize a table; with --key print the values recorded for that key")
                .arg(table_arg())
                .arg(arg!(--key <key> "Key to look up")),
        )
        .subcommand(
            Command::new(KB_SHOW)
                .about("Print a table as TSV")
                .arg(table_arg())
                .arg(
                    arg!(--json "Print as JSON instead")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(--limit <rows> "Print at most this many keys")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new(KB_INVALIDATE)
                .about("Drop the cached and persisted copy of a table")
                .arg(table_arg()),
        )
        .subcommand(Command::new(KB_LIST).about("List the registered tables and where they are cached"))
}
