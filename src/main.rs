// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use database::models::{ProductId, RecipeId};
use repository::{EntityKind, ValidationError};
use std::collections::HashSet;
use std::path::PathBuf;

mod backup;
mod costing;
mod database;
mod entry;
mod export;
mod import;
mod nutrition;
mod report;
mod repository;
mod session;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
#[command(about = "Ingredient, recipe and product cost calculator for a bakery")]
struct Args {
    /// Where the database lives. Defaults to the user data directory.
    #[arg(long, global = true, env = "BAKERY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Cost of every recipe and product
    Summary,
    Recipe {
        id: u32,
    },
    Product {
        id: u32,
    },
    Add {
        #[command(subcommand)]
        entity: entry::Entity,
    },
    /// Replaces every field of an existing entity
    Edit {
        id: u32,
        #[command(subcommand)]
        entity: entry::Entity,
    },
    Import {
        kind: EntityKind,
        path: PathBuf,
    },
    Export {
        kind: EntityKind,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Writes an example spreadsheet showing the columns `import` expects
    Template {
        kind: EntityKind,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    Search {
        kind: EntityKind,
        term: String,
    },
    Delete {
        kind: EntityKind,
        #[arg(required = true)]
        ids: Vec<u32>,
    },
    Backup {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Replaces stored data with the contents of a backup file
    Restore {
        path: PathBuf,
        #[arg(long)]
        yes: bool,
    },
    /// Deletes every ingredient, recipe, product, packaging item and nutrition fact
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

/// This is where the database and other user-data lives on-disk. On Linux it should be like:
/// `~/.local/share/bakery_cost_manager/`
fn data_path(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    let path = match data_dir {
        Some(path) => path,
        None => {
            let dirs = directories::BaseDirs::new().ok_or("failed to get user home directory")?;
            dirs.data_dir().join("bakery_cost_manager")
        }
    };
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

fn confirm(yes: bool, action: &str) -> Result<()> {
    if !yes {
        return Err(format!("{action} cannot be undone; pass --yes to confirm").into());
    }
    Ok(())
}

fn run(session: &mut session::Session, command: Commands) -> Result<()> {
    let repository = &mut session.repository;
    match command {
        Commands::Summary => print!("{}", report::Summary(repository)),
        Commands::Recipe { id } => {
            let recipe = repository
                .recipe(RecipeId(id))
                .ok_or(ValidationError::NotFound {
                    kind: EntityKind::Recipes,
                    id,
                })?;
            let breakdown = costing::RecipeCostBreakdown::new(recipe, repository.ingredients());
            print!("{}", report::RecipeDetail(&breakdown));
        }
        Commands::Product { id } => {
            let product = repository
                .product(ProductId(id))
                .ok_or(ValidationError::NotFound {
                    kind: EntityKind::Products,
                    id,
                })?;
            let breakdown = costing::ProductCostBreakdown::new(product, repository.catalog());
            print!("{}", report::ProductDetail(&breakdown));
        }
        Commands::Add { entity } => {
            let id = entry::apply(repository, None, entity)?;
            println!("added {id}");
            session.save();
        }
        Commands::Edit { id, entity } => {
            entry::apply(repository, Some(id), entity)?;
            println!("updated {id}");
            session.save();
        }
        Commands::Import { kind, path } => {
            let result = import::import_path(repository, kind, path)?;
            println!("{} succeeded, {} failed", result.succeeded, result.failed);
            session.save();
        }
        Commands::Export { kind, out } => {
            let path = export::export_to_dir(repository, kind, out)?;
            println!("{}", path.display());
        }
        Commands::Template { kind, out } => {
            let path = export::write_template(kind, out)?;
            println!("{}", path.display());
        }
        Commands::Search { kind, term } => {
            let rows = export::search(repository, kind, &term);
            print!("{}", report::Table { kind, rows: &rows });
        }
        Commands::Delete { kind, ids } => {
            let ids: HashSet<u32> = ids.into_iter().collect();
            let removed = repository.delete(kind, &ids)?;
            println!("deleted {removed} {kind}");
            session.save();
        }
        Commands::Backup { out } => {
            let backup = backup::Backup::new(repository, chrono::Utc::now())?;
            let path = backup.write_to_dir(out)?;
            println!("{}", path.display());
            print!("{}", report::Counts(repository));
        }
        Commands::Restore { path, yes } => {
            confirm(yes, "restoring a backup")?;
            backup::Backup::read_path(path)?.restore_into(repository)?;
            session.save();
            print!("{}", report::Counts(&session.repository));
        }
        Commands::Clear { yes } => {
            confirm(yes, "clearing all data")?;
            repository.clear_all();
            session.save();
            print!("{}", report::Counts(&session.repository));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()?;

    let path = data_path(args.data_dir)?;
    log::info!("using data in {path:?}");
    let conn = database::establish_connection(path.join("data.sqlite"))?;
    let mut session = session::Session::open(conn);
    run(&mut session, args.commands)
}
