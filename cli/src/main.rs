//! unform CLI - OCR form reconciliation tool

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use unform::render::{to_json, JsonFormat};
use unform::{read_graph, Issue, ReconcileOptions, ReconcileResult, Reconciler, SchemaTemplate};

#[derive(Parser)]
#[command(name = "unform")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Reconcile OCR form output with a target schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Match block JSON pages against a template and combine them
    Reconcile {
        /// Block JSON files, one per page, in page order
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Template file (default template if not specified)
        #[arg(short, long, value_name = "FILE", env = "UNFORM_TEMPLATE")]
        template: Option<PathBuf>,

        /// Layout profile with grouping and matching options
        #[arg(short, long, value_name = "FILE")]
        profile: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Skip the value repair stage
        #[arg(long)]
        raw: bool,

        /// Process pages one at a time
        #[arg(long)]
        sequential: bool,

        /// Include statistics and issues in the output
        #[arg(long)]
        report: bool,
    },

    /// Show the fields, tables and checkbox groups found on one page
    Fields {
        /// Block JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Layout profile with grouping options
        #[arg(short, long, value_name = "FILE")]
        profile: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the effective template
    Template {
        /// Template file (default template if not specified)
        #[arg(short, long, value_name = "FILE", env = "UNFORM_TEMPLATE")]
        template: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Reconcile {
            inputs,
            template,
            profile,
            output,
            compact,
            raw,
            sequential,
            report,
        }) => cmd_reconcile(
            &inputs,
            template.as_deref(),
            profile.as_deref(),
            output.as_deref(),
            json_format(compact),
            raw,
            sequential,
            report,
        ),
        Some(Commands::Fields {
            input,
            profile,
            output,
            compact,
        }) => cmd_fields(&input, profile.as_deref(), output.as_deref(), json_format(compact)),
        Some(Commands::Template { template }) => cmd_template(template.as_deref()),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!("{}", "Usage: unform reconcile <FILES>... [--template FILE]".yellow());
            println!("       unform --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn json_format(compact: bool) -> JsonFormat {
    if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    }
}

fn load_template(path: Option<&Path>) -> SchemaTemplate {
    match path {
        Some(path) => SchemaTemplate::load_or_default(path),
        None => SchemaTemplate::default_template(),
    }
}

fn load_options(path: Option<&Path>) -> Result<ReconcileOptions, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(ReconcileOptions::load(path)?),
        None => Ok(ReconcileOptions::default()),
    }
}

fn write_output(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        eprintln!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_reconcile(
    inputs: &[PathBuf],
    template: Option<&Path>,
    profile: Option<&Path>,
    output: Option<&Path>,
    format: JsonFormat,
    raw: bool,
    sequential: bool,
    report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = load_options(profile)?;
    if raw {
        options = options.with_finish(false);
    }
    if sequential {
        options = options.with_parallel(false);
    }
    log::debug!("Reconcile options: {:?}", options);
    let reconciler = Reconciler::new(load_template(template), options);

    let pb = ProgressBar::new(inputs.len() as u64 + 1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    let mut graphs = Vec::with_capacity(inputs.len());
    for input in inputs {
        pb.set_message(format!("Reading {}", input.display()));
        graphs.push(read_graph(input)?);
        pb.inc(1);
    }

    pb.set_message("Reconciling...");
    let result = reconciler.reconcile_pages(&graphs);
    pb.inc(1);
    pb.finish_and_clear();

    let json = if report {
        to_json(&result, format)?
    } else {
        to_json(&result.record, format)?
    };
    write_output(output, &json)?;

    print_summary(&result);
    Ok(())
}

fn cmd_fields(
    input: &Path,
    profile: Option<&Path>,
    output: Option<&Path>,
    format: JsonFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = load_options(profile)?;
    let reconciler = Reconciler::new(SchemaTemplate::default_template(), options);

    let graph = read_graph(input)?;
    let extraction = reconciler.extract_page(&graph);

    let json = to_json(&extraction, format)?;
    write_output(output, &json)?;

    eprintln!(
        "{} {} fields, {} tables, {} checkbox groups",
        "Found".green(),
        extraction.fields.len(),
        extraction.tables.len(),
        extraction.groups.len()
    );
    Ok(())
}

fn cmd_template(template: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let template = load_template(template);
    println!("{}", to_json(&template, JsonFormat::Pretty)?);
    eprintln!("{} {} slots", "Template".cyan().bold(), template.leaf_count());
    Ok(())
}

fn print_summary(result: &ReconcileResult) {
    let stats = &result.stats;

    eprintln!("{}", "Reconciliation Summary".cyan().bold());
    eprintln!("{}", "─".repeat(40).dimmed());
    eprintln!("{}: {}", "Pages".bold(), stats.page_count);
    eprintln!("{}: {}", "Fields".bold(), stats.field_count);
    eprintln!("{}: {}", "Tables".bold(), stats.table_count);
    eprintln!("{}: {}", "Checkbox groups".bold(), stats.checkbox_group_count);
    eprintln!("{}: {}", "Matched".bold(), stats.matched_count.to_string().green());
    eprintln!("{}: {}", "Unmatched".bold(), stats.unmatched_count.to_string().yellow());

    for issue in &result.issues {
        match issue {
            Issue::StructuralGap { page, detail } => {
                eprintln!("  {} page {}: {}", "gap".dimmed(), page, detail)
            }
            Issue::ConversionFailure {
                field,
                value,
                target,
                ..
            } => eprintln!(
                "  {} {}: '{}' is not {}",
                "warn".yellow(),
                field,
                value,
                target
            ),
            Issue::NoMatch { slot } => eprintln!("  {} {}", "miss".dimmed(), slot),
        }
    }
}

fn cmd_version() {
    println!("{} {}", "unform".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("OCR form reconciliation tool");
    println!();
    println!("License: MIT");
}
