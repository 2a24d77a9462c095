pub mod cli;
pub mod config;
pub mod display;
pub mod filter;
pub mod model;
pub mod rows;

use anyhow::{Context, Result, bail};
pub use cli::{ColorMode, Commands, OutputFormat, cli_parse};
pub use config::{EditorConfig, load_config};
pub use filter::{FilterError, FilterTree, MatchFilter, MatchType, NodeId, NodeKind};
pub use model::{FilterEditModel, ModelAction, ModelEvent};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` takes precedence over the
/// verbosity flags.
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
    {
        eprintln!("Failed to init tracing subscriber: {e}");
    }
}

fn apply_color_mode(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
}

/// Build the editing model from the configured or requested document
pub fn load_model(
    config: &EditorConfig,
    filters: Option<&std::path::Path>,
) -> Result<FilterEditModel> {
    let Some(path) = filters.or(config.default_document.as_deref()) else {
        bail!("No filter document given. Pass --filters or set default_document in the config");
    };

    let mut model = FilterEditModel::with_config(config);
    model
        .load_path(path)
        .with_context(|| format!("Failed to load filter document '{}'", path.display()))?;
    debug!(path = %path.display(), "filter document loaded");
    Ok(model)
}

pub fn run() -> Result<()> {
    let cli = cli_parse();
    init_logging(cli.verbose, cli.quiet);
    apply_color_mode(cli.color);

    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    let model = load_model(&config, cli.filters.as_deref())?;

    match &cli.command {
        Commands::Show { format } => match format {
            OutputFormat::Text => print!("{}", display::format_tree_text(&model)),
            OutputFormat::Json => println!("{}", display::format_tree_json(&model)),
        },
        Commands::Check {
            rows,
            rejected,
            format,
        } => {
            let rows = rows::parse_rows_file(rows)?;
            let accepted: Vec<bool> = rows
                .iter()
                .map(|row| model.accept(&row.columns, &row.values))
                .collect();

            match format {
                OutputFormat::Text => {
                    print!("{}", display::format_check_text(&rows, &accepted, *rejected))
                }
                OutputFormat::Json => println!("{}", display::format_check_json(&rows, &accepted)),
            }
        }
        Commands::Fmt { output } => {
            let xml = model.to_xml()?;
            match output {
                Some(path) => std::fs::write(path, &xml).with_context(|| {
                    format!("Failed to write output file '{}'", path.display())
                })?,
                None => print!("{xml}"),
            }
        }
    }

    Ok(())
}
