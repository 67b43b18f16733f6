mod cli;
mod core;

use clap::Parser;

fn main() {
    let parsed = cli::Cli::parse();
    if let Err(err) = cli::execute(parsed.command) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
