//! datagateway - Folder-per-table storage on a remote object store

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use datagateway::audit::AuditAction;
use datagateway::config::{GatewayConfig, StoreConfig};
use datagateway::confirm::{ConfirmationPolicy, ConsolePrompter};
use datagateway::ingest::{parse_cell_value, ReadOptions, ReaderFactory};
use datagateway::model::{CellValue, Table};
use datagateway::render::{render, OutputFormat};
use datagateway::{logging, DeleteOutcome, Selection, Session, TableStore};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Table,
    Json,
    Csv,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Table => OutputFormat::Table,
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::Csv => OutputFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliAuditAction {
    Put,
    Append,
    Delete,
}

impl From<CliAuditAction> for AuditAction {
    fn from(a: CliAuditAction) -> Self {
        match a {
            CliAuditAction::Put => AuditAction::Put,
            CliAuditAction::Append => AuditAction::Append,
            CliAuditAction::Delete => AuditAction::Delete,
        }
    }
}

/// Store tables as folders of Parquet objects on a remote store
#[derive(Parser, Debug)]
#[command(name = "datagateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file with `folder_id` and `store` settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this directory as the store (overrides the config's store)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Root folder holding the tables (overrides the config's folder_id)
    #[arg(long, global = true)]
    folder_id: Option<String>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Confirm destructive operations without asking
    #[arg(long, global = true, conflicts_with = "no_input")]
    yes: bool,

    /// Never prompt; destructive operations are declined
    #[arg(long, global = true)]
    no_input: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List table names
    List,

    /// Print a table's rows
    Get {
        table: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: CliOutputFormat,
    },

    /// Print a table's stored summary
    Meta { table: String },

    /// Store a file as a table
    Put {
        table: String,
        file: PathBuf,

        /// Replace the table if it already has data
        #[arg(long)]
        overwrite: bool,

        /// For Excel files: which sheet to read
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Add the rows of a file to an existing table
    Append {
        table: String,
        file: PathBuf,

        /// For Excel files: which sheet to read
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Delete a whole table, or the rows matching a selection
    Delete {
        table: String,

        /// Select rows where COL equals VALUE (repeat to require several)
        #[arg(long = "where", value_name = "COL=VALUE", conflicts_with_all = ["rows", "mask"])]
        filters: Vec<String>,

        /// Select rows by position (comma-separated)
        #[arg(long, value_delimiter = ',', conflicts_with = "mask")]
        rows: Vec<usize>,

        /// Select rows with one boolean per row (comma-separated)
        #[arg(long, value_delimiter = ',')]
        mask: Vec<String>,
    },

    /// Print a table's audit log
    History { table: String },

    /// Finish a write that stopped after the table's data was stored
    Repair {
        table: String,

        /// The interrupted operation
        #[arg(long, value_enum)]
        action: CliAuditAction,

        /// Rows it wrote, added or removed
        #[arg(long)]
        rows: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(dir) = &cli.store_dir {
        config = config.with_local_store(dir);
    }
    if let Some(folder_id) = &cli.folder_id {
        config = config.with_folder_id(folder_id.as_str());
    }
    if config.store == StoreConfig::Memory {
        tracing::warn!("using an in-memory store; changes are discarded on exit");
    }
    Ok(config)
}

fn confirmation_policy(cli: &Cli) -> ConfirmationPolicy {
    if cli.yes {
        ConfirmationPolicy::AssumeYes
    } else if cli.no_input {
        ConfirmationPolicy::AssumeNo
    } else {
        ConfirmationPolicy::prompt(ConsolePrompter::new())
    }
}

fn read_input(path: &Path, sheet: Option<String>) -> Result<Table> {
    let options = ReadOptions { sheet_name: sheet };
    ReaderFactory::new()
        .read(path, &options)
        .with_context(|| format!("Failed to read input file: {}", path.display()))
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let session = Session::open(&config).context("Failed to open store session")?;
    let store = TableStore::new(session).with_confirmation(confirmation_policy(&cli));

    match cli.command {
        Command::List => {
            for name in store.list()? {
                println!("{}", name);
            }
        }
        Command::Get { table, format } => {
            let data = store.get(&table)?;
            render(&data, format.into(), &mut io::stdout().lock())?;
        }
        Command::Meta { table } => {
            print!("{}", store.meta(&table)?);
        }
        Command::Put {
            table,
            file,
            overwrite,
            sheet,
        } => {
            let data = read_input(&file, sheet)?;
            store.put(&table, &data, overwrite)?;
            println!("Stored {} rows in '{}'", data.row_count(), table);
        }
        Command::Append { table, file, sheet } => {
            let data = read_input(&file, sheet)?;
            store.append(&table, &data)?;
            println!("Appended {} rows to '{}'", data.row_count(), table);
        }
        Command::Delete {
            table,
            filters,
            rows,
            mask,
        } => {
            let outcome = if !filters.is_empty() {
                store.delete_rows(&table, where_selection(&filters)?)?
            } else if !rows.is_empty() {
                store.delete_rows(&table, Selection::rows(rows))?
            } else if !mask.is_empty() {
                let cells = mask.iter().map(|s| parse_cell_value(s));
                store.delete_rows(&table, Selection::from_cells(cells)?)?
            } else {
                store.delete_table(&table)?
            };
            report(&table, outcome);
        }
        Command::History { table } => {
            for entry in store.history(&table)? {
                println!("{}", entry);
            }
        }
        Command::Repair {
            table,
            action,
            rows,
        } => {
            store.repair(&table, action.into(), rows)?;
            println!("Repaired '{}'", table);
        }
    }

    Ok(())
}

/// Rows matching every `COL=VALUE` filter
fn where_selection(filters: &[String]) -> Result<Selection<'static>> {
    let parsed: Vec<(String, CellValue)> = filters
        .iter()
        .map(|f| {
            let (column, value) = f
                .split_once('=')
                .with_context(|| format!("Expected COL=VALUE, got '{}'", f))?;
            Ok((column.trim().to_string(), parse_cell_value(value)))
        })
        .collect::<Result<_>>()?;

    Ok(Selection::predicate(move |table| {
        let mut mask = vec![true; table.row_count()];
        for (column, value) in &parsed {
            let matches = table.column_mask(column, |cell| cell == value)?;
            for (selected, hit) in mask.iter_mut().zip(matches) {
                *selected &= hit;
            }
        }
        Ok(mask)
    }))
}

fn report(table: &str, outcome: DeleteOutcome) {
    match outcome {
        DeleteOutcome::TableDeleted => println!("Deleted table '{}'", table),
        DeleteOutcome::RowsDeleted(n) => println!("Deleted {} rows from '{}'", n, table),
        DeleteOutcome::NoMatches => println!("No rows of '{}' matched; nothing deleted", table),
        DeleteOutcome::NotFound => println!("Table '{}' not found; nothing deleted", table),
        DeleteOutcome::Cancelled => println!("Cancelled; '{}' unchanged", table),
    }
}
