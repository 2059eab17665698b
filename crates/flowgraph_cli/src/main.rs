// SPDX-License-Identifier: MIT OR Apache-2.0
//! `flowgraph` - headless runner for saved dataflow graphs
//!
//! Loads a graph from JSON or RON, optionally fires event slots and feeds
//! boundary inputs, runs a number of passes and prints what the graph
//! produced.
//!
//! ## Logging
//!
//! Filtered through `RUST_LOG`; defaults to `info` for the flowgraph
//! crates.

use clap::{Parser, ValueEnum};
use flowgraph_core::{
    create_default_registry, ConfigError, EngineConfig, FormatError, Graph, GraphData, GraphError, NodeId,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Serialized graph encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Ron,
}

impl Format {
    /// Guess from a file extension, defaulting to JSON
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Self::Ron,
            _ => Self::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "flowgraph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a saved dataflow graph without an editor")]
struct Cli {
    /// Graph file (.json or .ron)
    graph: PathBuf,

    /// Number of passes to run
    #[arg(short, long, default_value_t = 1)]
    steps: usize,

    /// Engine configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pause between passes, in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Input encoding; guessed from the extension when omitted
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Write the graph back here after running
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fire an output slot before running, as NODE:SLOT
    #[arg(long = "trigger", value_name = "NODE:SLOT")]
    triggers: Vec<String>,

    /// Set a boundary input before running, as NAME=JSON
    #[arg(long = "input", value_name = "NAME=JSON")]
    inputs: Vec<String>,

    /// Let script nodes compile, whatever the config says
    #[arg(long)]
    allow_scripts: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Invalid trigger {0:?}, expected NODE:SLOT")]
    BadTrigger(String),

    #[error("Invalid input {0:?}, expected NAME=JSON")]
    BadInput(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn parse_trigger(arg: &str) -> Result<(NodeId, usize), CliError> {
    let bad = || CliError::BadTrigger(arg.to_string());
    let (node, slot) = arg.rsplit_once(':').ok_or_else(bad)?;
    let node = node.parse::<NodeId>().map_err(|_| bad())?;
    let slot = slot.parse::<usize>().map_err(|_| bad())?;
    Ok((node, slot))
}

/// `NAME=JSON`; a value that is not valid JSON is taken as a string
fn parse_input(arg: &str) -> Result<(String, Value), CliError> {
    let (name, raw) = arg
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| CliError::BadInput(arg.to_string()))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

fn load(cli: &Cli, config: EngineConfig) -> Result<Graph, CliError> {
    let text = std::fs::read_to_string(&cli.graph).map_err(io_error(&cli.graph))?;
    let data = match cli.format.unwrap_or_else(|| Format::from_path(&cli.graph)) {
        Format::Json => GraphData::from_json(&text)?,
        Format::Ron => GraphData::from_ron(&text)?,
    };
    let registry = create_default_registry();
    Ok(Graph::from_data(&data, &registry, config)?)
}

fn report(graph: &Graph) -> Value {
    let mut nodes = Map::new();
    for node in graph.nodes() {
        let outputs: Map<String, Value> = node
            .outputs()
            .iter()
            .enumerate()
            .filter_map(|(slot, output)| {
                let name = if output.name.is_empty() { slot.to_string() } else { output.name.clone() };
                output.value.clone().map(|value| (name, value))
            })
            .collect();
        if !outputs.is_empty() {
            nodes.insert(format!("{} {}", node.id(), node.display_title()), Value::Object(outputs));
        }
    }

    let boundary: Map<String, Value> = graph
        .boundary_outputs()
        .iter()
        .map(|(name, entry)| (name.clone(), entry.value.clone().unwrap_or(Value::Null)))
        .collect();

    json!({
        "iteration": graph.iteration(),
        "global_time": graph.global_time(),
        "outputs": boundary,
        "nodes": nodes,
    })
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.allow_scripts {
        config.allow_scripts = true;
    }

    let mut graph = load(cli, config)?;
    tracing::info!(
        "Loaded {} nodes and {} links from {}",
        graph.node_count(),
        graph.link_count(),
        cli.graph.display()
    );
    for link in graph.order_hazards() {
        tracing::warn!("Link {link} feeds a node that runs before its origin; it reads the previous pass");
    }

    for arg in &cli.inputs {
        let (name, value) = parse_input(arg)?;
        if !graph.set_boundary_input_value(&name, Some(value)) {
            tracing::warn!("Graph has no input named {name:?}");
        }
    }
    for arg in &cli.triggers {
        let (node, slot) = parse_trigger(arg)?;
        let trace = graph.trigger_slot(node, slot, None)?;
        tracing::info!("Trigger {node}:{slot} reached {} nodes", trace.reached_nodes().len());
    }

    graph.start();
    for step in 0..cli.steps {
        graph.update();
        if cli.interval_ms > 0 && step + 1 < cli.steps {
            std::thread::sleep(Duration::from_millis(cli.interval_ms));
        }
    }
    graph.stop();
    tracing::debug!("Last pass took {:?}", graph.last_pass_duration());

    let summary = serde_json::to_string_pretty(&report(&graph)).map_err(FormatError::from)?;
    println!("{summary}");

    if let Some(path) = &cli.output {
        let text = match Format::from_path(path) {
            Format::Json => graph.to_json()?,
            Format::Ron => graph.to_ron()?,
        };
        std::fs::write(path, text).map_err(io_error(path))?;
        tracing::info!("Saved graph to {}", path.display());
    }
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("flowgraph_core=info,flowgraph_cli=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trigger() {
        assert_eq!(parse_trigger("3:1").unwrap(), (NodeId::Index(3), 1));
        assert!(parse_trigger("3").is_err());
        assert!(parse_trigger("x:1").is_err());
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("gain=0.5").unwrap(), ("gain".to_string(), json!(0.5)));
        assert_eq!(parse_input("name=bob").unwrap(), ("name".to_string(), json!("bob")));
        assert!(parse_input("=1").is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a.RON")), Format::Ron);
        assert_eq!(Format::from_path(Path::new("a.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a")), Format::Json);
    }
}
