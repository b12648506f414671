use std::fs::File;
use std::io::BufWriter;

use clap::Parser;
use odpt_to_bus_network::{load, FileSource};

#[derive(Parser)]
struct Args {
    /// Path to an ODPT BusstopPole.json file
    #[arg(long)]
    stops: String,

    /// Path to an ODPT BusroutePattern.json file
    #[arg(long)]
    patterns: String,

    /// Output file to write
    #[arg(long, default_value = "network.bin")]
    output: String,
}

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();
    let args = Args::parse();
    let (network, report) = futures::executor::block_on(load(
        &FileSource::new("."),
        &args.stops,
        &args.patterns,
    ));
    if report.failed {
        std::process::exit(1);
    }
    log::info!("{}", serde_json::to_string(&report).unwrap());

    let output = BufWriter::new(File::create(args.output).unwrap());
    bincode::serialize_into(output, &network).unwrap();
}
