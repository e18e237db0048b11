//! Binary entry point for the memory estimation CLI.
#![forbid(unsafe_code)]

use std::error::Error;

use clap::{Args, Parser, Subcommand, ValueEnum};
use huge_arrays::{
    catalog,
    mem::{GraphDimensions, MemoryRange, MemoryTree},
    ParallelOptions,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "huge-estimate",
    version,
    about = "Estimate the memory footprint of huge containers",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "List the structures that can be estimated")]
    List,

    #[command(about = "Estimate one or more structures for a graph shape")]
    Estimate(EstimateCmd),
}

#[derive(Args, Debug)]
struct EstimateCmd {
    #[arg(value_name = "STRUCTURE", required = true, help = "Structure names, see `list`")]
    structures: Vec<String>,

    #[arg(long, help = "Number of nodes")]
    nodes: usize,

    #[arg(long, default_value_t = 0, help = "Number of relationships")]
    relationships: usize,

    #[arg(long, help = "Highest original node id, defaults to nodes - 1")]
    highest_original_id: Option<usize>,

    #[arg(long, help = "Worker count, defaults to available parallelism")]
    concurrency: Option<usize>,

    #[arg(long, value_enum, help = "Print sizes in whole units instead of human readable")]
    block_size: Option<BlockSize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum BlockSize {
    #[value(name = "K")]
    Kib,
    #[value(name = "M")]
    Mib,
    #[value(name = "G")]
    Gib,
}

impl BlockSize {
    fn bytes(self) -> usize {
        match self {
            BlockSize::Kib => 1 << 10,
            BlockSize::Mib => 1 << 20,
            BlockSize::Gib => 1 << 30,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            BlockSize::Kib => "K",
            BlockSize::Mib => "M",
            BlockSize::Gib => "G",
        }
    }

    fn format(self, bytes: usize) -> String {
        format!("{}{}", bytes.div_ceil(self.bytes()), self.suffix())
    }
}

#[derive(Serialize)]
struct ListEntry {
    name: &'static str,
    summary: &'static str,
}

#[derive(Serialize)]
struct EstimateReport {
    dimensions: GraphDimensions,
    concurrency: usize,
    min_bytes: usize,
    max_bytes: usize,
    tree: MemoryTree,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::List => {
            let entries: Vec<ListEntry> = catalog::entries()
                .iter()
                .map(|entry| ListEntry {
                    name: entry.name,
                    summary: entry.summary,
                })
                .collect();
            emit(&cli.format, &entries, || {
                let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
                for entry in &entries {
                    println!("{:width$}  {}", entry.name, entry.summary);
                }
            })?;
        }
        Command::Estimate(cmd) => {
            let report = estimate(&cmd)?;
            emit(&cli.format, &report, || print_report_text(&report, cmd.block_size))?;
        }
    }
    Ok(())
}

fn estimate(cmd: &EstimateCmd) -> Result<EstimateReport, Box<dyn Error>> {
    if let Some(unknown) = cmd
        .structures
        .iter()
        .find(|name| catalog::lookup(name).is_none())
    {
        return Err(format!("unknown structure `{unknown}`, run `list` to see the options").into());
    }
    let options = match cmd.concurrency {
        Some(concurrency) => ParallelOptions::with_concurrency(concurrency),
        None => ParallelOptions::default(),
    };
    options.validate()?;

    let mut dimensions = GraphDimensions::of(cmd.nodes).with_relationships(cmd.relationships);
    if let Some(id) = cmd.highest_original_id {
        dimensions = dimensions.with_highest_original_id(id);
    }
    debug!(
        structures = cmd.structures.len(),
        nodes = cmd.nodes,
        relationships = cmd.relationships,
        concurrency = options.concurrency,
        "cli.estimate.start"
    );

    let tree = match cmd.structures.as_slice() {
        [single] => catalog::lookup(single)
            .map(|entry| entry.estimation().estimate(&dimensions, options.concurrency))
            .ok_or("structure disappeared from the catalog")?,
        many => {
            let names: Vec<&str> = many.iter().map(String::as_str).collect();
            catalog::combined("combined", &names).estimate(&dimensions, options.concurrency)
        }
    };
    Ok(EstimateReport {
        dimensions,
        concurrency: options.concurrency,
        min_bytes: tree.range.min,
        max_bytes: tree.range.max,
        tree,
    })
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_report_text(report: &EstimateReport, block_size: Option<BlockSize>) {
    println!(
        "nodes={} relationships={} concurrency={}",
        report.dimensions.node_count, report.dimensions.relationship_count, report.concurrency
    );
    println!("total: {}", format_range(report.tree.range, block_size));
    print_tree(&report.tree, block_size, 0);
}

fn print_tree(tree: &MemoryTree, block_size: Option<BlockSize>, depth: usize) {
    println!(
        "{:indent$}{}: {}",
        "",
        tree.description,
        format_range(tree.range, block_size),
        indent = depth * 4
    );
    for component in &tree.components {
        print_tree(component, block_size, depth + 1);
    }
}

fn format_range(range: MemoryRange, block_size: Option<BlockSize>) -> String {
    match block_size {
        None => range.to_string(),
        Some(unit) if range.min == range.max => unit.format(range.min),
        Some(unit) => format!("[{} ... {}]", unit.format(range.min), unit.format(range.max)),
    }
}
