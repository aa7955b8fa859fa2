use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::data::ingest::{locate, ColumnSelection};
use crate::data::loader::{load_path, sheet_names, SpreadsheetFormat};
use crate::data::value::Scalar;
use crate::export::{colored_xlsx, write_colored_csv};
use crate::map::Selections;
use crate::resolve::FilterSet;
use crate::server;
use crate::settings::{colors_json, SettingsFile};

#[derive(Debug, Parser)]
#[command(name = "geodash", version, about = "Interactive point-map dashboard for spreadsheets")]
pub struct Cli {
    /// YAML service configuration.
    #[arg(long, global = true, env = "GEODASH_CONFIG")]
    pub config: Option<PathBuf>,
    /// Debug-level logging unless `RUST_LOG` is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the dashboard HTTP server.
    Serve {
        /// Overrides `bind` from the config file.
        #[arg(long, env = "GEODASH_BIND")]
        bind: Option<String>,
    },
    /// Print a spreadsheet's sheets, columns and row count as JSON.
    Inspect { file: PathBuf },
    /// Write the filtered rows with their resolved marker color as CSV, or as
    /// a workbook when `--output` ends in `.xlsx`.
    Export(ExportArgs),
    /// Print the color assignment stored in a settings file.
    Colors { settings: PathBuf },
}

#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub lat: String,
    #[arg(long)]
    pub lon: String,
    #[arg(long)]
    pub name: String,
    /// Saved settings supplying colors, reference column and display options.
    #[arg(long)]
    pub settings: Option<PathBuf>,
    #[arg(long)]
    pub reference: Option<String>,
    /// `COLUMN=V1,V2`; repeatable, all must hold.
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, Vec<String>)>,
    /// Defaults to stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

fn parse_filter(raw: &str) -> Result<(String, Vec<String>), String> {
    let (column, values) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=V1,V2, got '{raw}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err("filter column must not be empty".to_string());
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok((column.to_string(), values))
}

pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "geodash=debug,tower_http=debug"
    } else {
        "geodash=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run_with_args(args: &[String]) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };
    init_tracing(cli.verbose);

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return 1;
        }
    };

    match cli.command {
        Command::Serve { bind } => handle_serve(config, bind),
        Command::Inspect { file } => handle_inspect(&file),
        Command::Export(args) => handle_export(&config, args),
        Command::Colors { settings } => handle_colors(&settings),
    }
}

fn handle_serve(mut config: AppConfig, bind: Option<String>) -> i32 {
    if let Some(bind) = bind {
        config.bind = bind;
    }
    match server::run_server(config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_inspect(file: &Path) -> i32 {
    let table = match load_path(file) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("inspect failed: {err}");
            return 1;
        }
    };
    let format = SpreadsheetFormat::from_path(file);
    let sheets = match format {
        Some(SpreadsheetFormat::Xlsx) => std::fs::read(file)
            .ok()
            .and_then(|bytes| sheet_names(&bytes).ok())
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let payload = serde_json::json!({
        "file": file.display().to_string(),
        "format": format.map(|f| f.as_str()),
        "sheets": sheets,
        "columns": table.schema().columns(),
        "rows": table.len(),
    });
    match serde_json::to_string_pretty(&payload) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize inspection: {err}");
            1
        }
    }
}

fn handle_export(config: &AppConfig, args: ExportArgs) -> i32 {
    let table = match load_path(&args.file) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("export failed: {err}");
            return 1;
        }
    };
    let settings = match args.settings.as_deref().map(SettingsFile::read).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(err) => {
            eprintln!("export failed: {err}");
            return 1;
        }
    };
    let selection = ColumnSelection::new(&args.lat, &args.lon, &args.name);
    let located = match locate(&table, &selection) {
        Ok(located) => located,
        Err(err) => {
            eprintln!("export failed: {err}");
            return 1;
        }
    };
    let report = located.report();
    debug!(?report, "located records");

    let filters: FilterSet = args
        .filters
        .into_iter()
        .map(|(column, values)| (column, values.iter().map(|v| Scalar::infer(v)).collect()))
        .collect();
    let reference = args.reference.or(settings.reference_column);
    let selections = Selections {
        filters: &filters,
        colors: &settings.colors,
        reference_column: reference.as_deref(),
        display: &settings.display,
    };

    let style = config.marker_style();
    let color_column = config.export_color_column.as_str();
    let written = match &args.output {
        Some(path) if SpreadsheetFormat::from_path(path) == Some(SpreadsheetFormat::Xlsx) => {
            colored_xlsx(&located, selections, style, color_column).and_then(|(workbook, rows)| {
                std::fs::write(path, workbook)?;
                Ok(rows)
            })
        }
        Some(path) => match File::create(path) {
            Ok(file) => write_colored_csv(BufWriter::new(file), &located, selections, style, color_column),
            Err(err) => {
                eprintln!("export failed: cannot create {}: {err}", path.display());
                return 1;
            }
        },
        None => write_colored_csv(io::stdout().lock(), &located, selections, style, color_column),
    };
    match written {
        Ok(rows) => {
            if let Some(path) = &args.output {
                println!(
                    "export complete: rows={rows}, dropped={}, output='{}'",
                    report.dropped_rows,
                    path.display()
                );
            }
            0
        }
        Err(err) => {
            eprintln!("export failed: {err}");
            1
        }
    }
}

fn handle_colors(path: &Path) -> i32 {
    let settings = match SettingsFile::read(path) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("colors failed: {err}");
            return 1;
        }
    };
    match colors_json(&settings.colors) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("colors failed: {err}");
            1
        }
    }
}
