//! franq – command-line report renderer.
//!
//! Usage:
//!   franq render <report.json> [--data data.json] [-o out.pdf] [--layout out.json]
//!   franq sample <name> [-o out.pdf]
//!   franq samples
//!
//! If `-o` is omitted the PDF is written next to the report document with the
//! same stem (e.g. `foods.json` → `foods.pdf`).

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use franq::datasource::DataSets;
use franq::element::ErrorPolicy;
use franq::layout_config::LayoutConfig;
use franq::model::{Orientation, Report};
use franq::pipeline::{render_report, PipelineConfig};
use franq::render::render_pdf;
use franq::schema::{load_report, Registry};
use franq::templates::{sample, SAMPLE_NAMES};

#[derive(Parser)]
#[command(name = "franq")]
#[command(version)]
#[command(about = "Banded report renderer: report document + data → PDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output PDF path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also write the frozen page layout as JSON
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,

    /// Use landscape page orientation
    #[arg(short = 'l', long)]
    landscape: bool,

    /// Document title in PDF metadata
    #[arg(short, long)]
    title: Option<String>,

    /// Print this text instead of aborting when a field cannot be resolved
    #[arg(long, value_name = "TEXT")]
    placeholder: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a report document
    Render {
        /// Report document (JSON)
        #[arg(value_name = "REPORT")]
        report: PathBuf,

        /// Data bindings: a JSON object mapping dataset names to record arrays
        #[arg(short, long, value_name = "FILE")]
        data: Option<PathBuf>,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Render one of the built-in sample reports
    Sample {
        /// Sample name (see `franq samples`)
        name: String,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// List the built-in sample reports
    Samples,
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> franq::Result<()> {
    match cli.command {
        Commands::Render { report, data, out } => {
            let json = fs::read_to_string(&report)?;
            let doc = load_report(&json, &Registry::new())?;
            let bindings = match data {
                Some(path) => DataSets::from_json(&fs::read_to_string(path)?)?,
                None => DataSets::new(),
            };
            let output = out.output.clone().unwrap_or_else(|| report.with_extension("pdf"));
            write_report(&doc, bindings, &out, &output)
        }
        Commands::Sample { name, out } => {
            let sample = sample(&name)?;
            eprintln!("{}: {}", sample.name, sample.description);
            let output = out
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.pdf", sample.name)));
            write_report(&sample.report, sample.data, &out, &output)
        }
        Commands::Samples => {
            for name in SAMPLE_NAMES {
                let sample = sample(name)?;
                println!("{:<14} {}", sample.name, sample.description);
            }
            Ok(())
        }
    }
}

fn write_report(report: &Report, data: DataSets<'_>, args: &OutputArgs, output: &Path) -> franq::Result<()> {
    let mut config = PipelineConfig {
        title: args.title.clone(),
        ..PipelineConfig::default()
    };
    if args.landscape {
        config.orientation = Some(Orientation::Landscape);
    }
    if let Some(text) = &args.placeholder {
        config.render.error_policy = ErrorPolicy::Placeholder(text.clone());
    }

    let (layout, summary) = render_report(report, data, &config)?;
    let bytes = render_pdf(&layout)?;

    create_parent(output)?;
    fs::write(output, &bytes)?;
    if let Some(path) = &args.layout {
        write_layout(&layout, path)?;
    }

    let pages = summary.page_count;
    eprintln!(
        "Wrote '{}' ({} bytes, {} page{}, {} record{})",
        output.display(),
        bytes.len(),
        pages,
        if pages == 1 { "" } else { "s" },
        summary.records,
        if summary.records == 1 { "" } else { "s" },
    );
    Ok(())
}

fn write_layout(layout: &LayoutConfig, path: &Path) -> franq::Result<()> {
    create_parent(path)?;
    fs::write(path, layout.to_json()?)?;
    Ok(())
}

fn create_parent(path: &Path) -> franq::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
