//! Filenode CLI: catalogue files against category schemas.
//!
//! Usage:
//!   filenode schema load <file.yaml>... | list | show <name>
//!   filenode scan <dir> [--recursive] [--min-confidence 0.5]
//!   filenode catalogue <file>...
//!   filenode search [--path prefix]... [--filter "key: value, ..."] [--explain]
//!   filenode review <id> [--set key=value]... [--state reviewed]

use clap::{ArgAction, Parser, Subcommand};
use filenode::query::QueryBuilder;
use filenode::record::ExtractedFields;
use filenode::{
    CatalogConfig, Cataloguer, ConfigOverrides, FieldValue, ReviewState, ScanOptions,
    SchemaRegistry, SearchFilter, SqliteStore,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filenode", version, about = "Schema-driven file cataloguer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory of schema documents to load before running
    #[arg(long, global = true)]
    schema_dir: Option<PathBuf>,
    /// Print lists as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage category schemas
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Classify every file in a directory without storing anything
    Scan {
        dir: PathBuf,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Report matches at or above this confidence
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Classify files and store them as unreviewed records
    Catalogue {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show the identifier a file would be given
    SuggestId { path: PathBuf },
    /// Find records by path prefix and property values
    Search {
        /// Path prefix (repeatable; any prefix matches)
        #[arg(long = "path")]
        paths: Vec<String>,
        /// Property filters as "key: value, key2: value2"
        #[arg(long)]
        filter: Option<String>,
        /// Print the query instead of running it
        #[arg(long)]
        explain: bool,
    },
    /// Confirm field values or change a record's review state
    Review {
        identifier: String,
        /// Field assignment key=value (repeatable)
        #[arg(long = "set", value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
        #[arg(long)]
        state: Option<ReviewState>,
    },
    /// Derive a record's identifier again from its file
    Reidentify { identifier: String },
    /// Delete records
    Delete {
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Import a group file of FILE-NODE blocks
    Import {
        file: PathBuf,
        /// Schema the imported records belong to
        #[arg(long)]
        schema: String,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Load schema documents into the database
    Load {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List stored schemas
    List,
    /// Show one schema
    Show { name: String },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("filenode={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct App {
    cataloguer: Cataloguer<SqliteStore>,
    config: CatalogConfig,
    json: bool,
}

fn open_app(cli: &Cli) -> Result<App, String> {
    let overrides = ConfigOverrides {
        config_file: cli.config.clone(),
        database: cli.db.clone(),
        schema_dir: cli.schema_dir.clone(),
    };
    let config = CatalogConfig::resolve(&overrides).map_err(|e| e.to_string())?;

    let store = SqliteStore::open(&config.database)
        .map_err(|e| format!("Failed to open database {}: {}", config.database.display(), e))?;
    let mut cataloguer = Cataloguer::from_store(store)
        .map_err(|e| format!("Failed to load schemas: {}", e))?
        .with_synthesizer(filenode::IdentitySynthesizer::new().with_max_attempts(config.max_attempts))
        .with_search_paths(config.search_paths.clone());

    if let Some(dir) = &config.schema_dir {
        let registry = SchemaRegistry::load_dir(dir).map_err(|e| e.to_string())?;
        for schema in registry.iter() {
            cataloguer
                .register_schema(schema.clone())
                .map_err(|e| e.to_string())?;
        }
    }

    Ok(App {
        cataloguer,
        config,
        json: cli.json,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_schema_load(app: &mut App, files: &[PathBuf]) -> i32 {
    for file in files {
        let schema = match filenode::schema::read_schema_file(file) {
            Ok(schema) => schema,
            Err(e) => {
                eprintln!("Error: {}: {}", file.display(), e);
                return 1;
            }
        };
        match app.cataloguer.register_schema(schema) {
            Ok(schema) => {
                println!("Loaded schema '{}' ({} patterns)", schema.name, schema.patterns.len());
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    0
}

fn cmd_schema_list(app: &App) -> i32 {
    let registry = app.cataloguer.registry();
    if app.json {
        let schemas: Vec<_> = registry.iter().collect();
        return print_json(&schemas);
    }
    if registry.is_empty() {
        println!("No schemas defined.");
        return 0;
    }
    println!("{:<28}  {:>8}  {:>8}  {}", "NAME", "PATTERNS", "PRIORITY", "PATH");
    println!("{}", "-".repeat(72));
    for schema in registry.iter() {
        println!(
            "{:<28}  {:>8}  {:>8}  {}",
            schema.name,
            schema.patterns.len(),
            schema.priority,
            schema.storage_path
        );
    }
    0
}

fn cmd_schema_show(app: &App, name: &str) -> i32 {
    let Some(schema) = app.cataloguer.registry().get(name) else {
        eprintln!("Error: schema '{}' not found", name);
        return 1;
    };
    if app.json {
        return print_json(schema);
    }
    println!("Name:        {}", schema.name);
    println!("Path:        {}", schema.storage_path);
    if !schema.description.is_empty() {
        println!("Description: {}", schema.description);
    }
    println!("Priority:    {}", schema.priority);
    println!("Review:      {}", if schema.user_review_required { "required" } else { "optional" });
    println!("Properties:  {}", schema.property_names().collect::<Vec<_>>().join(", "));
    println!("Patterns:");
    for pattern in &schema.patterns {
        println!("  {:<18} {:<24} {:.2}", pattern.kind, pattern.value, pattern.confidence);
    }
    0
}

fn cmd_scan(app: &App, dir: &Path, recursive: bool, min_confidence: Option<f64>) -> i32 {
    let options = ScanOptions::default()
        .with_min_confidence(min_confidence.unwrap_or(app.config.min_confidence))
        .recursive(recursive);
    let report = match app.cataloguer.scan(dir, options) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    for (path, failure) in &report.failures {
        eprintln!("Warning: {}: {}", path.display(), failure);
    }

    if app.json {
        let entries: Vec<_> = report
            .matched
            .iter()
            .map(|entry| {
                let chosen = &entry.resolution.chosen.classification;
                serde_json::json!({
                    "path": entry.path,
                    "schema": chosen.schema_name,
                    "confidence": chosen.confidence,
                    "matched_pattern": chosen.matched_pattern,
                    "fields": chosen.fields,
                    "similar": entry.resolution.similar_names(),
                })
            })
            .collect();
        return print_json(&entries);
    }

    println!("{:<40}  {:<20}  {:>5}  {}", "FILE", "SCHEMA", "CONF", "PATTERN");
    println!("{}", "-".repeat(80));
    for entry in &report.matched {
        let chosen = &entry.resolution.chosen.classification;
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "{:<40}  {:<20}  {:>5.2}  {}",
            name, chosen.schema_name, chosen.confidence, chosen.matched_pattern
        );
    }
    println!(
        "\n{} matched, {} below threshold, {} unmatched",
        report.matched.len(),
        report.below_threshold,
        report.unmatched
    );
    0
}

fn cmd_catalogue(app: &App, paths: &[PathBuf]) -> i32 {
    let mut code = 0;
    for path in paths {
        match app.cataloguer.catalogue_file(path) {
            Ok(outcome) => {
                println!(
                    "Catalogued {} as '{}' ({}, {:.2})",
                    path.display(),
                    outcome.record.identifier,
                    outcome.record.schema_name,
                    outcome.record.confidence
                );
                if outcome.review_required {
                    println!("  review required: filenode review {}", outcome.record.identifier);
                }
                if !outcome.similar.is_empty() {
                    println!("  similar categories to check: {}", outcome.similar.join(", "));
                }
                for failure in &outcome.failures {
                    eprintln!("Warning: {}: {}", path.display(), failure);
                }
            }
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                code = 1;
            }
        }
    }
    code
}

fn cmd_suggest_id(app: &App, path: &Path) -> i32 {
    match app.cataloguer.suggest_identifier(path) {
        Ok(id) => {
            println!("{}", id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_search(app: &App, paths: &[String], filter: Option<&str>, explain: bool) -> i32 {
    let mut search = SearchFilter::new().with_paths(paths.iter().cloned());
    if let Some(input) = filter {
        search = match search.with_user_input(input) {
            Ok(search) => search,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
    }
    if search.paths.is_empty() {
        search.paths = app.config.search_paths.clone();
    }

    if explain {
        let query = QueryBuilder::cypher().build(&search);
        if app.json {
            return print_json(&query);
        }
        println!("{}", query.template);
        println!();
        println!("{}", query.render_debug());
        return 0;
    }

    let records = match app.cataloguer.search(&search) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if app.json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No matching records.");
        return 0;
    }
    println!("{:<36}  {:<20}  {:<12}  {}", "IDENTIFIER", "SCHEMA", "STATE", "PATH");
    println!("{}", "-".repeat(96));
    for record in &records {
        println!(
            "{:<36}  {:<20}  {:<12}  {}",
            record.identifier, record.schema_name, record.review_state, record.file_path
        );
    }
    0
}

fn cmd_review(
    app: &App,
    identifier: &str,
    assignments: &[(String, String)],
    state: Option<ReviewState>,
) -> i32 {
    if assignments.is_empty() && state.is_none() {
        eprintln!("Error: nothing to do; pass --set key=value or --state");
        return 1;
    }
    let mut record = None;
    if !assignments.is_empty() {
        let updates: ExtractedFields = assignments
            .iter()
            .map(|(key, value)| (key.clone(), FieldValue::from(value.as_str())))
            .collect();
        match app.cataloguer.confirm_fields(identifier, updates) {
            Ok(updated) => record = Some(updated),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    if let Some(state) = state {
        match app.cataloguer.set_review_state(identifier, state) {
            Ok(updated) => record = Some(updated),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    if let Some(record) = record {
        println!("Record '{}' is {}", record.identifier, record.review_state);
    }
    0
}

fn cmd_reidentify(app: &App, identifier: &str) -> i32 {
    match app.cataloguer.reidentify(identifier) {
        Ok(record) if record.identifier == identifier => {
            println!("Identifier '{}' is unchanged", identifier);
            0
        }
        Ok(record) => {
            println!("Renamed '{}' to '{}'", identifier, record.identifier);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_delete(app: &App, identifiers: &[String]) -> i32 {
    match app.cataloguer.delete(identifiers) {
        Ok(deleted) => {
            println!("Deleted {} of {} records", deleted, identifiers.len());
            if deleted == identifiers.len() { 0 } else { 1 }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_import(app: &App, file: &Path, schema: &str) -> i32 {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", file.display(), e);
            return 1;
        }
    };
    match app.cataloguer.import_group(&text, schema) {
        Ok(report) => {
            println!("Imported {} records", report.imported.len());
            for id in &report.duplicates {
                eprintln!("Warning: '{}' already exists, skipped", id);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut app = match open_app(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match &cli.command {
        Commands::Schema { action } => match action {
            SchemaAction::Load { files } => cmd_schema_load(&mut app, files),
            SchemaAction::List => cmd_schema_list(&app),
            SchemaAction::Show { name } => cmd_schema_show(&app, name),
        },
        Commands::Scan { dir, recursive, min_confidence } => {
            cmd_scan(&app, dir, *recursive, *min_confidence)
        }
        Commands::Catalogue { paths } => cmd_catalogue(&app, paths),
        Commands::SuggestId { path } => cmd_suggest_id(&app, path),
        Commands::Search { paths, filter, explain } => {
            cmd_search(&app, paths, filter.as_deref(), *explain)
        }
        Commands::Review { identifier, assignments, state } => {
            cmd_review(&app, identifier, assignments, *state)
        }
        Commands::Reidentify { identifier } => cmd_reidentify(&app, identifier),
        Commands::Delete { identifiers } => cmd_delete(&app, identifiers),
        Commands::Import { file, schema } => cmd_import(&app, file, schema),
    };
    std::process::exit(code);
}
