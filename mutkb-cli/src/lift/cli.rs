use clap::{Arg, Command, arg};

pub const LIFT_CMD: &str = "lift";

pub fn create_lift_cli() -> Command {
    Command::new(LIFT_CMD)
        .author("Databio")
        .about("Lift genomic mutation ids between genome builds using a position map.")
        .arg(
            Arg::new("mutations")
                .required(true)
                .help("File with one genomic mutation id per line, or - for stdin"),
        )
        .arg(arg!(--mapping <mapping> "Two-column TSV of chr:pos pairs, source build first").required(true))
        .arg(arg!(--from <build> "Build of the input ids").default_value("hg19"))
        .arg(arg!(--to <build> "Build to lift to").required(true))
        .arg(arg!(--output <output> "Output TSV, stdout when omitted"))
}
