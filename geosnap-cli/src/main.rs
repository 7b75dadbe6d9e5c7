//! GeoSnap CLI - batch export runs and the dispatch server.

mod commands;
mod error;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "geosnap", version, about = "Satellite composite exports for named places")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one export pipeline job and write its manifest.
    Run(commands::run::RunArgs),
    /// Serve the HTTP dispatch layer.
    Serve(commands::serve::ServeArgs),
}

fn main() {
    geosnap::log::init_console("info");

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => commands::run::run(args),
        Command::Serve(args) => commands::serve::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
