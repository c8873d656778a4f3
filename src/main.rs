use clap::{Parser, Subcommand};
use deckforge::cancel::CancellationToken;
use deckforge::config::{self, FailurePolicy};
use deckforge::discovery::discover_types;
use deckforge::imaging::{RenderTarget, RustRenderer};
use deckforge::pipeline::{self, BuildSummary, PipelineError, PipelineEvent, PipelineOptions};
use deckforge::project::{Headless, Project};
use deckforge::output;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::Sender;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that run the pipeline.
#[derive(clap::Args, Clone, Copy)]
struct RunArgs {
    /// Report failing types and documents and keep going instead of stopping
    #[arg(long)]
    keep_going: bool,

    /// Outline every layer frame in the rendered images
    #[arg(long)]
    proof: bool,
}

#[derive(Parser)]
#[command(name = "deckforge")]
#[command(about = "Merge tables into card templates and render them to PNG")]
#[command(long_about = "\
Merge tables into card templates and render them to PNG

Every CSV file in the data folder is a card type. Each row is merged into the
template of the same name and the chosen sheet is rendered at 300 DPI.

Project structure:

  my-deck/
  ├── deckforge.toml               # Optional project config
  ├── template/
  │   └── monster.toml             # Fields, sheets and layers
  ├── data/
  │   └── monster.csv              # One card per row
  └── build/                       # Recreated on every run
      ├── monster-0.json           # Merged documents
      ├── manifest.json            # What was generated, for `render`
      └── images/
          └── monster-0.png

Reserved columns:
  file   Document name instead of <type>-<row>; a trailing -N picks sheet N
  sheet  Index of the sheet to render (0 = first)

Run 'deckforge gen-config' to generate a documented deckforge.toml.")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: merge → render (default)
    Build(RunArgs),
    /// Merge every table into documents and write the manifest
    Merge(RunArgs),
    /// Render the documents listed in the manifest
    Render(RunArgs),
    /// List the card types found in the data folder
    List,
    /// Print a stock deckforge.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Build(RunArgs {
        keep_going: false,
        proof: false,
    }));

    match command {
        Command::Build(args) => {
            let project = Project::open(&cli.project)?;
            let options = run_options(&project, args);
            let renderer = RustRenderer::new(project.root());
            let summary = with_printer(|tx| {
                pipeline::run(
                    &project,
                    &Headless,
                    &renderer,
                    &options,
                    &CancellationToken::new(),
                    Some(tx),
                )
            })?;
            project.close();
            Ok(finish(&summary))
        }
        Command::Merge(args) => {
            let project = Project::open(&cli.project)?;
            let options = run_options(&project, args);
            let summary = with_printer(|tx| {
                pipeline::merge_stage(
                    &project,
                    &Headless,
                    &options,
                    &CancellationToken::new(),
                    Some(tx),
                )
            })?;
            project.close();
            Ok(finish(&summary))
        }
        Command::Render(args) => {
            let project = Project::open(&cli.project)?;
            let options = run_options(&project, args);
            let renderer = RustRenderer::new(project.root());
            let summary = with_printer(|tx| {
                pipeline::render_stage(
                    &project,
                    &Headless,
                    &renderer,
                    &options,
                    &CancellationToken::new(),
                    Some(tx),
                )
            })?;
            project.close();
            Ok(finish(&summary))
        }
        Command::List => {
            let project = Project::open(&cli.project)?;
            let config = project.config();
            let types = discover_types(&project.data_dir(), &config.table.extension)?;
            output::print_types(&types, &project);
            project.close();
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Project config, overridden by command-line flags.
fn run_options(project: &Project, args: RunArgs) -> PipelineOptions {
    let mut options = PipelineOptions::from_config(project.config());
    if args.keep_going {
        options.on_error = FailurePolicy::Skip;
    }
    if args.proof {
        options.render.target = RenderTarget::Proof;
    }
    options
}

/// Run `f` with a printer thread draining its events to stdout.
fn with_printer<F>(f: F) -> Result<BuildSummary, PipelineError>
where
    F: FnOnce(&Sender<PipelineEvent>) -> Result<BuildSummary, PipelineError>,
{
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = f(&tx);
    drop(tx);
    if printer.join().is_err() {
        tracing::warn!("output thread panicked");
    }
    result
}

fn finish(summary: &BuildSummary) -> ExitCode {
    output::print_summary(summary);
    ExitCode::from(summary.outcome().exit_code())
}
