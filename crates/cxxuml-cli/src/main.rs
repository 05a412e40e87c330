//! cxxuml CLI - Generate UML sequence diagrams from C++ AST event traces

mod cli;

use clap::Parser;

fn main() {
    let cli_args = cli::Cli::parse();

    // Logging is initialized by the app from the parsed flags
    let app = cli::CxxumlApp::new();

    if let Err(e) = app.run(cli_args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
