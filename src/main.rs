extern crate getopts;
extern crate domain_process;

use std::{env, process};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use getopts::Options;
use tracing::info;
use tracing_subscriber::EnvFilter;

use domain_process::config::ProcessConfig;
use domain_process::family::{family_filter, process_families};
use domain_process::types::RawFamily;
use domain_process::{cdd_parse, fasta, hits_parse, rescue_parse};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn read_families(matches: &getopts::Matches, config: &ProcessConfig) -> Result<Vec<RawFamily>> {
    let sources = ["input", "rescue-dir", "cdd-file"].iter()
        .filter(|name| matches.opt_present(name))
        .count();
    if sources != 1 {
        bail!("exactly one of -i|--input, --rescue-dir or --cdd-file is needed");
    }

    if let Some(input) = matches.opt_str("input") {
        return hits_parse::parse_file(Path::new(&input))
            .with_context(|| format!("failed to read hit document {}", input));
    }
    if let Some(dir) = matches.opt_str("rescue-dir") {
        return rescue_parse::parse_directory(Path::new(&dir), config.rescue_min_found_fraction)
            .with_context(|| format!("failed to read rescue directory {}", dir));
    }
    if let Some(cdd_file) = matches.opt_str("cdd-file") {
        return cdd_parse::parse_file(Path::new(&cdd_file))
            .with_context(|| format!("failed to read CDD file {}", cdd_file));
    }

    Ok(vec![])
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "print this help message");
    opts.optopt("i", "input", "Input JSON hit document", "FILE");
    opts.optopt("", "rescue-dir", "Directory of *_rescuedDomains.tsv files", "DIR");
    opts.optopt("", "cdd-file", "Tabular CDD output with a \"# Fields:\" header", "FILE");
    opts.optopt("s", "sequences", "FASTA file of protein sequences", "FILE");
    opts.optopt("f", "families",
                "Family IDs to process: a comma separated list or a file with one per line",
                "LIST|FILE");
    opts.optopt("c", "config", "JSON configuration file", "FILE");
    opts.optopt("o", "output", "Output JSON file (default: standard output)", "FILE");

    let program = args[0].clone();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("Invalid options\n{}", f);
            print_usage(&program, opts);
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        print_usage(&program, opts);
        process::exit(0);
    }

    info!("{} v{}", PKG_NAME, VERSION);

    let config = match matches.opt_str("config") {
        Some(path) => ProcessConfig::from_file(Path::new(&path))
            .with_context(|| format!("failed to load config {}", path))?,
        None => ProcessConfig::from_env().context("bad configuration in environment")?,
    };

    let mut families = read_families(&matches, &config)?;

    if let Some(fasta_file) = matches.opt_str("sequences") {
        let sequences = fasta::parse_file(Path::new(&fasta_file))
            .with_context(|| format!("failed to read sequences from {}", fasta_file))?;
        let updated = fasta::attach_sequences(&mut families, &sequences);
        info!(updated, "attached sequences");
    }

    let families = family_filter(families, matches.opt_str("families").as_deref())
        .context("failed to read family IDs")?;

    let reports = process_families(&families, &config);
    info!(families = reports.len(), "processed");

    match matches.opt_str("output") {
        Some(output_filename) => {
            let f = File::create(&output_filename)
                .with_context(|| format!("unable to open {}", output_filename))?;
            let mut writer = BufWriter::new(f);
            serde_json::to_writer(&mut writer, &reports)?;
            writer.flush()?;
        },
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &reports)?;
            writeln!(writer)?;
        }
    }

    Ok(())
}
