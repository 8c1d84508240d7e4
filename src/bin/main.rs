//! reportql CLI - Parse reporting queries and resolve their SQL fragments
//!
//! Usage:
//!   reportql parse <QUERY> [--simple] [--format json|text]
//!   reportql resolve [--definition <defs.toml>] <QUERY> [--format json|text]
//!
//! Examples:
//!   reportql parse "select id, name where age > 18 order by name"
//!   reportql parse --simple "where date > '2010-01-01' and date < '2010-02-01'"
//!   reportql resolve --definition reports/sales.toml "select company_name"

use clap::{Parser, Subcommand, ValueEnum};
use reportql::config::Settings;
use reportql::query::{self, ParseOptions};
use reportql::reporting::{ReportingDefinition, Resolver};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "reportql")]
#[command(about = "reportql - Parse reporting queries and resolve their SQL joins")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $REPORTQL_CONFIG, ./reportql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query and print its structure
    Parse {
        /// The query string
        query: String,

        /// Use the restricted grammar (flat conditions)
        #[arg(long)]
        simple: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Parse a query in simple mode and print the SQL fragments it needs
    Resolve {
        /// The query string
        query: String,

        /// Reporting definition file (defaults to the configured one)
        #[arg(short, long)]
        definition: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Text,
    /// Pretty-printed JSON
    Json,
}

/// SQL fragments for one query.
#[derive(Serialize)]
struct Fragments {
    select: String,
    group_by: Option<String>,
    order_by: Option<String>,
    joins: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Parse {
            query,
            simple,
            format,
        } => cmd_parse(&query, simple, format, &settings.parse_options()),
        Commands::Resolve {
            query,
            definition,
            format,
        } => cmd_resolve(&query, definition, format, &settings),
    }
}

fn cmd_parse(source: &str, simple: bool, format: OutputFormat, options: &ParseOptions) -> ExitCode {
    if simple {
        match query::simple_parse_with(source, options) {
            Ok(result) => print_value(&result, format, |r| format!("{:#?}", r)),
            Err(e) => {
                eprintln!("Query error: {}", e);
                ExitCode::FAILURE
            }
        }
    } else {
        match query::parse_with(source, options) {
            Ok(relation) => print_value(&relation, format, |r| r.to_string()),
            Err(e) => {
                eprintln!("Parse error: {}", e);
                ExitCode::FAILURE
            }
        }
    }
}

fn cmd_resolve(
    source: &str,
    definition: Option<PathBuf>,
    format: OutputFormat,
    settings: &Settings,
) -> ExitCode {
    let path = match definition {
        Some(path) => path,
        None => match settings.definition_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("No reporting definition given; pass --definition or set reporting.definition");
                return ExitCode::FAILURE;
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let definition = match ReportingDefinition::from_file(&path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error loading definition '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let parsed = match query::simple_parse_with(source, &settings.parse_options()) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Query error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut resolver = Resolver::from_simple_query(&definition, &parsed);
    let select = resolver.sql_select();
    let group_by = resolver.sql_group_by();
    let order_by = resolver.sql_order_by();
    let joins = match resolver.sql_joins() {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Join resolution error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fragments = Fragments {
        select,
        group_by,
        order_by,
        joins,
    };
    print_value(&fragments, format, |f| {
        let mut out = format!("SELECT   {}\nJOINS    {}", f.select, f.joins);
        if let Some(group_by) = &f.group_by {
            out.push_str(&format!("\nGROUP BY {}", group_by));
        }
        if let Some(order_by) = &f.order_by {
            out.push_str(&format!("\nORDER BY {}", order_by));
        }
        out
    })
}

fn print_value<T: Serialize>(value: &T, format: OutputFormat, text: impl Fn(&T) -> String) -> ExitCode {
    match format {
        OutputFormat::Text => {
            println!("{}", text(value));
            ExitCode::SUCCESS
        }
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Serialization error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
