//! Generator configuration
//!
//! Configuration is read from a TOML file:
//!
//! ```toml
//! output_directory = "docs/diagrams"
//! generators = ["plantuml", "mermaid"]
//! jobs = 4
//!
//! [diagrams.main_sequence]
//! type = "sequence"
//! events = "traces/main.jsonl"
//! title = "Main flow"
//! from = [{ function = "main(int,char **)" }]
//! generate_return_types = true
//! generate_method_arguments = "abbreviated"
//!
//! [diagrams.main_sequence.exclude]
//! namespaces = ["std"]
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DiagramError, DiagramKind, OutputFormat};

/// Start or end point of a sequence diagram
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// Fully qualified function or method signature, e.g. `ns::A::run(int)`
    Function { function: String },
    /// Any callable whose body spans the given line of a file
    File { file: String, line: u32 },
}

impl Location {
    pub fn function(name: impl Into<String>) -> Self {
        Location::Function {
            function: name.into(),
        }
    }

    pub fn file(file: impl Into<String>, line: u32) -> Self {
        Location::File {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Function { function } => write!(f, "{}", function),
            Location::File { file, line } => write!(f, "{}:{}", file, line),
        }
    }
}

/// How call arguments appear in message labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodArguments {
    #[default]
    Full,
    Abbreviated,
    None,
}

/// Namespace filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceFilter {
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl NamespaceFilter {
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// True if `full_name` lives in one of the listed namespaces
    pub fn matches(&self, full_name: &str) -> bool {
        let name = full_name.trim_start_matches("::");
        self.namespaces.iter().any(|ns| {
            let ns = ns.trim_start_matches("::").trim_end_matches("::");
            name == ns || name.starts_with(&format!("{}::", ns))
        })
    }
}

fn default_true() -> bool {
    true
}

/// Settings of a single diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramConfig {
    #[serde(rename = "type")]
    pub kind: DiagramKind,

    /// JSON Lines trace of AST events for this diagram
    #[serde(default)]
    pub events: Option<PathBuf>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub from: Vec<Location>,

    #[serde(default)]
    pub to: Vec<Location>,

    #[serde(default)]
    pub from_to: Vec<(Location, Location)>,

    #[serde(default)]
    pub generate_return_types: bool,

    #[serde(default)]
    pub generate_method_arguments: MethodArguments,

    #[serde(default)]
    pub generate_condition_statements: bool,

    #[serde(default)]
    pub combine_free_functions_into_file_participants: bool,

    /// Expand each activity at most once per rendered diagram
    #[serde(default)]
    pub fold_repeated_activities: bool,

    /// Drop control-flow blocks that contain no calls
    #[serde(default = "default_true")]
    pub fold_empty_blocks: bool,

    /// Participants declared first, in this order
    #[serde(default)]
    pub participants_order: Vec<String>,

    #[serde(default)]
    pub include: NamespaceFilter,

    #[serde(default)]
    pub exclude: NamespaceFilter,
}

impl DiagramConfig {
    /// A sequence diagram reading events from `events`
    pub fn sequence(events: impl Into<PathBuf>) -> Self {
        Self {
            kind: DiagramKind::Sequence,
            events: Some(events.into()),
            title: None,
            comment: None,
            from: Vec::new(),
            to: Vec::new(),
            from_to: Vec::new(),
            generate_return_types: false,
            generate_method_arguments: MethodArguments::Full,
            generate_condition_statements: false,
            combine_free_functions_into_file_participants: false,
            fold_repeated_activities: false,
            fold_empty_blocks: true,
            participants_order: Vec::new(),
            include: NamespaceFilter::default(),
            exclude: NamespaceFilter::default(),
        }
    }

    /// True if a participant with this full name passes the namespace filters
    pub fn should_include(&self, full_name: &str) -> bool {
        if self.exclude.matches(full_name) {
            return false;
        }
        self.include.is_empty() || self.include.matches(full_name)
    }

    /// Check the settings of the diagram called `name`
    pub fn validate(&self, name: &str) -> Result<(), DiagramError> {
        if !self.kind.is_supported() {
            return Err(DiagramError::UnsupportedDiagramType {
                diagram_type: self.kind.to_string(),
            });
        }
        if self.events.is_none() {
            return Err(DiagramError::config_error(format!(
                "Diagram '{}' has no 'events' trace",
                name
            )));
        }
        for location in self.from.iter().chain(self.to.iter()).chain(
            self.from_to
                .iter()
                .flat_map(|(from, to)| [from, to].into_iter()),
        ) {
            let empty = match location {
                Location::Function { function } => function.trim().is_empty(),
                Location::File { file, .. } => file.trim().is_empty(),
            };
            if empty {
                return Err(DiagramError::config_error(format!(
                    "Diagram '{}' has an empty location",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("diagrams")
}

fn default_generators() -> Vec<OutputFormat> {
    vec![OutputFormat::PlantUml]
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    #[serde(default = "default_generators")]
    pub generators: Vec<OutputFormat>,

    /// Worker threads, 0 for one per available core
    #[serde(default)]
    pub jobs: usize,

    #[serde(default)]
    pub diagrams: BTreeMap<String, DiagramConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            generators: default_generators(),
            jobs: 0,
            diagrams: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DiagramError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DiagramError::config_error(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base)
    }

    /// Parse configuration text, resolving relative paths against `base`
    pub fn parse(content: &str, base: &Path) -> Result<Self, DiagramError> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| DiagramError::config_error(e.to_string()))?;

        if config.generators.is_empty() {
            return Err(DiagramError::config_error(
                "At least one generator is required".to_string(),
            ));
        }

        config.output_directory = resolve(base, &config.output_directory);
        for diagram in config.diagrams.values_mut() {
            if let Some(events) = diagram.events.as_ref() {
                diagram.events = Some(resolve(base, events));
            }
        }

        debug!(diagrams = config.diagrams.len(), "Loaded configuration");
        Ok(config)
    }

    /// Validate every diagram, returning the first problem found
    pub fn validate(&self) -> Result<(), DiagramError> {
        for (name, diagram) in &self.diagrams {
            diagram.validate(name)?;
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
output_directory = "out"
generators = ["plantuml", "mermaid", "json"]
jobs = 2

[diagrams.main_sequence]
type = "sequence"
events = "traces/main.jsonl"
from = [{ function = "main()" }]
to = [{ file = "src/a.cc", line = 12 }]
from_to = [[{ function = "a()" }, { function = "c()" }]]
generate_method_arguments = "abbreviated"

[diagrams.main_sequence.exclude]
namespaces = ["std"]

[diagrams.classes]
type = "class"
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::parse(CONFIG, Path::new("/project")).unwrap();
        assert_eq!(config.output_directory, PathBuf::from("/project/out"));
        assert_eq!(config.generators.len(), 3);
        assert_eq!(config.jobs, 2);

        let seq = &config.diagrams["main_sequence"];
        assert_eq!(seq.kind, DiagramKind::Sequence);
        assert_eq!(seq.events, Some(PathBuf::from("/project/traces/main.jsonl")));
        assert_eq!(seq.from, vec![Location::function("main()")]);
        assert_eq!(seq.to, vec![Location::file("src/a.cc", 12)]);
        assert_eq!(
            seq.from_to,
            vec![(Location::function("a()"), Location::function("c()"))]
        );
        assert_eq!(seq.generate_method_arguments, MethodArguments::Abbreviated);
        assert!(seq.fold_empty_blocks);
        assert!(!seq.should_include("std::vector<int>::push_back(int)"));
        assert!(seq.should_include("ns::A::run()"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("", Path::new(".")).unwrap();
        assert_eq!(config.generators, vec![OutputFormat::PlantUml]);
        assert_eq!(config.jobs, 0);
        assert!(config.diagrams.is_empty());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::parse("generators = [", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("Config error"));
    }

    #[test]
    fn test_validate_unsupported_kind() {
        let config = Config::parse(CONFIG, Path::new(".")).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DiagramError::UnsupportedDiagramType { .. }));
        assert!(config.diagrams["main_sequence"]
            .validate("main_sequence")
            .is_ok());
    }

    #[test]
    fn test_validate_missing_events() {
        let mut diagram = DiagramConfig::sequence("x.jsonl");
        diagram.events = None;
        let err = diagram.validate("d").unwrap_err();
        assert!(err.to_string().contains("no 'events' trace"));
    }

    #[test]
    fn test_include_filter() {
        let mut diagram = DiagramConfig::sequence("x.jsonl");
        diagram.include.namespaces = vec!["app".to_string()];
        assert!(diagram.should_include("app::run()"));
        assert!(diagram.should_include("::app::detail::f()"));
        assert!(!diagram.should_include("application::run()"));
        assert!(!diagram.should_include("main()"));
    }
}
