use clap::Parser;
use rolltrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
