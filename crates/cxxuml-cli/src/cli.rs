//! Command-line interface for the cxxuml utility
//!
//! Generates UML sequence diagrams from recorded C++ AST event traces.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use cxxuml::core::config::Config;
use cxxuml::core::logging::init_logging;
use cxxuml::plugins::Orchestrator;
use cxxuml::{DiagramKind, OutputFormat};

/// cxxuml - Generate UML sequence diagrams from C++ AST events
#[derive(Parser)]
#[command(name = "cxxuml")]
#[command(about = "Reconstructs UML sequence diagrams from C++ AST event traces")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Set log level (trace|debug|info|warn|error)
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Set log format (compact|pretty|json)
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Log level options
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format options
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

/// Output generators
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum GeneratorChoice {
    Plantuml,
    Mermaid,
    Json,
}

impl From<GeneratorChoice> for OutputFormat {
    fn from(value: GeneratorChoice) -> Self {
        match value {
            GeneratorChoice::Plantuml => OutputFormat::PlantUml,
            GeneratorChoice::Mermaid => OutputFormat::Mermaid,
            GeneratorChoice::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the configured diagrams
    Generate {
        /// Configuration file
        #[arg(short, long, default_value = ".cxxuml.toml")]
        config: PathBuf,

        /// Only generate these diagrams (repeatable)
        #[arg(short = 'n', long = "diagram-name")]
        diagrams: Vec<String>,

        /// Override the output directory
        #[arg(short, long)]
        output_directory: Option<PathBuf>,

        /// Number of worker threads (0 for one per core)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Override the generators (comma separated)
        #[arg(short, long, value_enum, value_delimiter = ',')]
        generators: Vec<GeneratorChoice>,
    },

    /// List the possible 'from' values of a sequence diagram
    PrintFrom {
        #[arg(short, long, default_value = ".cxxuml.toml")]
        config: PathBuf,

        #[arg(short = 'n', long = "diagram-name")]
        diagram: String,
    },

    /// List the possible 'to' values of a sequence diagram
    PrintTo {
        #[arg(short, long, default_value = ".cxxuml.toml")]
        config: PathBuf,

        #[arg(short = 'n', long = "diagram-name")]
        diagram: String,
    },

    /// Validate a configuration file
    Validate {
        #[arg(short, long, default_value = ".cxxuml.toml")]
        config: PathBuf,
    },

    /// Show supported diagram types
    Types {
        /// Show in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Main CLI application
#[derive(Default)]
pub struct CxxumlApp;

impl CxxumlApp {
    pub fn new() -> Self {
        Self
    }

    /// Run the application with the given CLI arguments
    pub fn run(&self, cli: Cli) -> Result<()> {
        // Environment variables take precedence over the flags
        let log_level = std::env::var("CXXUML_LOG_LEVEL")
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| cli.log_level.as_str().to_string());
        let log_format = std::env::var("CXXUML_LOG_FORMAT")
            .ok()
            .unwrap_or_else(|| cli.log_format.as_str().to_string());

        if let Err(e) = init_logging(Some(&log_level), Some(&log_format)) {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        if cli.verbose {
            eprintln!("cxxuml v{}", env!("CARGO_PKG_VERSION"));
        }

        match cli.command {
            Commands::Generate {
                config,
                diagrams,
                output_directory,
                jobs,
                generators,
            } => self.generate_command(
                config,
                diagrams,
                output_directory,
                jobs,
                generators,
                cli.verbose,
            ),
            Commands::PrintFrom { config, diagram } => self.print_command(config, &diagram, true),
            Commands::PrintTo { config, diagram } => self.print_command(config, &diagram, false),
            Commands::Validate { config } => self.validate_command(config, cli.verbose),
            Commands::Types { json } => self.types_command(json),
        }
    }

    fn generate_command(
        &self,
        config_path: PathBuf,
        diagrams: Vec<String>,
        output_directory: Option<PathBuf>,
        jobs: Option<usize>,
        generators: Vec<GeneratorChoice>,
        verbose: bool,
    ) -> Result<()> {
        let mut config = Config::load(&config_path)?;
        if let Some(directory) = output_directory {
            config.output_directory = directory;
        }
        if let Some(jobs) = jobs {
            config.jobs = jobs;
        }
        if !generators.is_empty() {
            config.generators = generators.into_iter().map(OutputFormat::from).collect();
        }

        let report = Orchestrator::new(config).generate(&diagrams)?;
        for path in &report.generated {
            if verbose {
                eprintln!("Wrote {}", path.display());
            }
            println!("{}", path.display());
        }
        for (name, error) in &report.failed {
            eprintln!("✗ {}: {}", name, error);
        }

        if report.is_success() {
            Ok(())
        } else {
            Err(anyhow!("{} diagram(s) failed", report.failed.len()))
        }
    }

    fn print_command(&self, config_path: PathBuf, diagram: &str, from: bool) -> Result<()> {
        let config = Config::load(&config_path)?;
        let model = Orchestrator::new(config).build_model(diagram)?;
        let values = if from {
            model.list_from_values()
        } else {
            model.list_to_values()
        };
        for value in values {
            println!("{}", value);
        }
        Ok(())
    }

    fn validate_command(&self, config_path: PathBuf, verbose: bool) -> Result<()> {
        let config = match Config::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                println!("✗ Invalid configuration: {}", e);
                return Err(e.into());
            }
        };

        let mut invalid = 0;
        for (name, diagram) in &config.diagrams {
            match diagram.validate(name) {
                Ok(()) => {
                    if verbose {
                        eprintln!("Diagram '{}' is valid", name);
                    }
                }
                Err(e) => {
                    println!("✗ {}: {}", name, e);
                    invalid += 1;
                }
            }
        }

        if invalid > 0 {
            return Err(anyhow!("{} invalid diagram(s)", invalid));
        }
        println!("✓ Valid configuration with {} diagram(s)", config.diagrams.len());
        Ok(())
    }

    fn types_command(&self, json: bool) -> Result<()> {
        let kinds = [
            DiagramKind::Class,
            DiagramKind::Sequence,
            DiagramKind::Package,
            DiagramKind::Include,
        ];

        if json {
            let types: Vec<_> = kinds
                .iter()
                .map(|kind| {
                    serde_json::json!({
                        "name": kind.to_string(),
                        "status": if kind.is_supported() { "supported" } else { "unsupported" },
                    })
                })
                .collect();
            let supported = kinds.iter().filter(|k| k.is_supported()).count();
            let output = serde_json::json!({
                "supported_types": types,
                "total": supported,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Diagram types:");
            for kind in &kinds {
                let status = if kind.is_supported() { "supported" } else { "not supported" };
                println!("  {:<10} - {}", kind.to_string(), status);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "cxxuml",
            "generate",
            "-c",
            "cfg.toml",
            "-n",
            "a",
            "-n",
            "b",
            "-j",
            "2",
            "-g",
            "plantuml,json",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                config,
                diagrams,
                jobs,
                generators,
                ..
            } => {
                assert_eq!(config, PathBuf::from("cfg.toml"));
                assert_eq!(diagrams, vec!["a", "b"]);
                assert_eq!(jobs, Some(2));
                assert_eq!(generators, vec![GeneratorChoice::Plantuml, GeneratorChoice::Json]);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["cxxuml", "types", "--json", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
    }
}
