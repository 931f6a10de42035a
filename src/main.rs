use clap::{Parser, Subcommand};
use pdfarrange::optimization::QualityTier;
use pdfarrange::pdf_ops;
use pdfarrange::workspace::{EditOp, LoadSummary, Workspace};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pdfarrange")]
#[command(about = "Combine, reorder and rotate pages from several PDF files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List the pages of the given files in combined order")]
    List {
        #[arg(help = "Input PDF files", required = true)]
        inputs: Vec<PathBuf>,
    },
    #[command(about = "Merge whole PDF files, in order, into one")]
    Merge {
        #[arg(help = "Input PDF files", required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long, help = "Output PDF file")]
        output: PathBuf,
        #[arg(long, help = "Output quality (low, standard, high)", default_value = "standard", value_parser = parse_quality)]
        quality: QualityTier,
    },
    #[command(about = "Apply a JSON edit script to the combined pages and save")]
    Edit {
        #[arg(help = "Input PDF files", required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long, help = "Output PDF file")]
        output: PathBuf,
        #[arg(long, help = "JSON file with a list of edit operations")]
        script: PathBuf,
        #[arg(long, help = "Output quality (low, standard, high)", default_value = "standard", value_parser = parse_quality)]
        quality: QualityTier,
    },
}

fn parse_quality(s: &str) -> Result<QualityTier, String> {
    s.parse()
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List { inputs } => list(&inputs),
        Commands::Merge {
            inputs,
            output,
            quality,
        } => match pdf_ops::merge_pdfs(&inputs, &output, quality) {
            Ok(report) => {
                println!(
                    "Successfully merged {} pages into {}",
                    report.pages,
                    output.display()
                );
                if let Some(warning) = report.warning {
                    eprintln!("Warning: {}", warning);
                }
                Ok(())
            }
            Err(e) => Err(e.context("Error merging PDFs")),
        },
        Commands::Edit {
            inputs,
            output,
            script,
            quality,
        } => edit(&inputs, &output, &script, quality),
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn load(inputs: &[PathBuf]) -> anyhow::Result<Workspace> {
    let mut workspace = Workspace::new();
    let summary = workspace.add_files(inputs);
    report_load(&summary);
    if workspace.pages().is_empty() {
        anyhow::bail!("No pages loaded");
    }
    Ok(workspace)
}

fn report_load(summary: &LoadSummary) {
    for path in &summary.skipped {
        eprintln!("Skipping non-PDF file: {}", path.display());
    }
    for (path, error) in &summary.failures {
        eprintln!("Error loading {}: {}", path.display(), error);
    }
}

fn list(inputs: &[PathBuf]) -> anyhow::Result<()> {
    let workspace = load(inputs)?;
    for (i, page) in workspace.pages().iter().enumerate() {
        let rotation = page.rotation();
        if rotation.degrees() == 0 {
            println!("{:>4}  {}  page {}", i + 1, page.display_name(), page.source_page_number());
        } else {
            println!(
                "{:>4}  {}  page {}  ({})",
                i + 1,
                page.display_name(),
                page.source_page_number(),
                rotation
            );
        }
    }
    Ok(())
}

fn edit(inputs: &[PathBuf], output: &Path, script: &Path, quality: QualityTier) -> anyhow::Result<()> {
    use anyhow::Context;

    let text = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read edit script {}", script.display()))?;
    let ops: Vec<EditOp> =
        serde_json::from_str(&text).with_context(|| format!("Invalid edit script {}", script.display()))?;

    let mut workspace = load(inputs)?;
    for (i, op) in ops.iter().enumerate() {
        workspace
            .apply(op)
            .with_context(|| format!("Edit step {} failed", i + 1))?;
    }

    let report = workspace.save(output, quality)?;
    println!(
        "Successfully saved {} pages to {}",
        report.pages,
        output.display()
    );
    if let Some(warning) = report.warning {
        eprintln!("Warning: {}", warning);
    }
    Ok(())
}
