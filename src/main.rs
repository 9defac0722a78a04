use anyhow::{Context, Result};
use clap::Parser;
use std::fs;

use trace_hotspots::cli::Cli;
use trace_hotspots::error::AnalyzeError;
use trace_hotspots::render::PrintableNode;
use trace_hotspots::type_tree::{JsonTypesProvider, NullTypesProvider, TypesProvider};
use trace_hotspots::{ingest, position, render, scanner, span_tree};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();
    match run(args) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

/// Exit codes: 0 success; 1 argument misuse; 2 trace file missing; 3 types
/// file missing; nonzero on uncaught internal error.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AnalyzeError>() {
        Some(AnalyzeError::ArgumentMisuse(_)) => 1,
        Some(AnalyzeError::TraceFileMissing(_)) => 2,
        Some(AnalyzeError::TypesFileMissing(_)) => 3,
        _ => 1,
    }
}

fn run(args: Cli) -> Result<()> {
    let config = args.analysis_config();
    config
        .validate()
        .map_err(AnalyzeError::ArgumentMisuse)
        .map_err(anyhow::Error::from)?;

    if !args.trace_path.exists() {
        return Err(AnalyzeError::TraceFileMissing(args.trace_path).into());
    }
    let trace_file =
        fs::File::open(&args.trace_path).with_context(|| "opening trace file".to_string())?;

    let parsed = ingest::parse(trace_file, config.min_duration)
        .with_context(|| format!("ingesting trace {}", args.trace_path.display()))?;
    let mut tree = span_tree::build(&parsed, &config);

    let mut provider: Box<dyn TypesProvider> = match &args.types_path {
        Some(path) => {
            if !path.exists() {
                return Err(AnalyzeError::TypesFileMissing(path.clone()).into());
            }
            let raw = fs::read_to_string(path).with_context(|| "reading types file".to_string())?;
            Box::new(JsonTypesProvider::from_json_array(&raw))
        }
        None => Box::new(NullTypesProvider),
    };
    trace_hotspots::type_tree::attach(&mut tree, provider.as_mut())?;

    let requests = position::collect(&tree);
    let positions = scanner::normalize_requests(&requests);
    let nodes = render::render(&tree, &positions);

    match &args.json {
        Some(path) => write_json(path, &nodes)?,
        None => print_summary(&nodes),
    }
    Ok(())
}

fn write_json(path: &std::path::Path, nodes: &[PrintableNode]) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, nodes)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn print_summary(nodes: &[PrintableNode]) {
    if nodes.is_empty() {
        println!("No hot spots found");
        return;
    }
    for node in nodes {
        print_node(node, 0);
    }
}

fn print_node(node: &PrintableNode, depth: usize) {
    println!("{}{} ({})", "  ".repeat(depth), node.message, node.time);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}
