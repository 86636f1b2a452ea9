//! Tabflow CLI - convert tabular files through row actions
//!
//! # Commands
//!
//! ```bash
//! tabflow convert in.csv -o out.json --do 'split:tags=Tags:delimiter=\n'
//! tabflow convert a.csv b.csv -o out.jsonl -c config.json --pick title=Title
//! tabflow actions                  # Describe the action syntax
//! tabflow example-config           # Print an example configuration
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tabflow::logs::{init_logging, log_error, log_info};
use tabflow::transform::DEFAULT_ACTION_DELIMITER;
use tabflow::{convert, ConvertOptions, FormatRegistry, LoadOptions};

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Convert tabular files while applying declarative row actions", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one or more input files into a single output file
    Convert {
        /// Input files (.csv, .json, .jsonl, .xlsx)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file; the extension selects the format
        #[arg(short, long)]
        output: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output column, `target=source` or `field` (repeatable)
        #[arg(long = "pick", value_name = "SPEC")]
        picks: Vec<String>,

        /// Row action, `name:fields[:options]` (repeatable)
        #[arg(long = "do", value_name = "ACTION")]
        actions: Vec<String>,

        /// Separator between the parts of an action
        #[arg(long, default_value_t = DEFAULT_ACTION_DELIMITER)]
        action_delimiter: char,

        /// Keep the staging namespace in the output
        #[arg(long)]
        output_debug: bool,

        /// Write filtered rows to this file
        #[arg(long)]
        filtered_out: Option<PathBuf>,

        /// Skip rows given as FILE:INDEX (repeatable)
        #[arg(long = "ignore-rows", value_name = "FILE:INDEX")]
        ignore_rows: Vec<String>,

        /// Treat the first record as data
        #[arg(long)]
        no_header: bool,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Show available row actions
    Actions,

    /// Show example configuration
    ExampleConfig,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Convert {
            inputs,
            output,
            config,
            picks,
            actions,
            action_delimiter,
            output_debug,
            filtered_out,
            ignore_rows,
            no_header,
            delimiter,
        } => {
            let options = ConvertOptions {
                output,
                filtered_out,
                config,
                actions,
                picks,
                action_delimiter,
                output_debug,
                ignore_rows: ignore_rows.into_iter().collect(),
                load: LoadOptions {
                    no_header,
                    delimiter,
                },
            };
            cmd_convert(&inputs, &options)
        }

        Commands::Actions => cmd_actions(),

        Commands::ExampleConfig => cmd_example_config(),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

fn cmd_convert(inputs: &[PathBuf], options: &ConvertOptions) -> Result<(), Box<dyn std::error::Error>> {
    let registry = FormatRegistry::builtin();
    let report = convert(inputs, options, &registry)?;

    log_info(format!(
        "Read {}, wrote {}, filtered {}, ignored {}",
        report.rows_read, report.rows_written, report.rows_filtered, report.rows_ignored
    ));
    for (key, ids) in report.ids.buckets() {
        log_info(format!("Ids {}: {} assigned", key, ids.len()));
    }
    Ok(())
}

fn cmd_actions() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", tabflow::actions_description());
    Ok(())
}

fn cmd_example_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = tabflow::example_config();
    println!("{}", config.to_json()?);
    Ok(())
}
