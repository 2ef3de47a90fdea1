use clap::Parser;
use barsignal::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
