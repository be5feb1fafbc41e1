// src/bin/cli.rs
use clap::Parser;
use hnair_table::cli::{self, Args};

fn main() {
    let _ = color_eyre::install();
    if let Err(e) = cli::run(Args::parse()) {
        let code = e.exit_code();
        eprintln!("Error: {:?}", color_eyre::eyre::Report::new(e));
        std::process::exit(code);
    }
}
