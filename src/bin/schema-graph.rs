//! Schema Graph CLI
//!
//! Command-line interface for validating instances against JSON Schemas and
//! converting schemas between drafts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_graph::{
    is_url, load_document, Draft, LoaderOptions, LoadingReport, Schema, SchemaLoader, Severity,
    Validator, ValidatorOptions,
};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "schema-graph")]
#[command(about = "Validate JSON documents against JSON Schema drafts 3, 4 and 6")]
#[command(version)]
struct Cli {
    /// Log loading and validation steps to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate instance documents against a schema
    Validate {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Instance files to validate
        #[arg(required = true)]
        instances: Vec<PathBuf>,

        /// Output results as JSON lines (for automation)
        #[arg(long)]
        json: bool,

        /// Draft assumed when the schema has no $schema (3, 4 or 6)
        #[arg(long, value_parser = parse_draft)]
        draft: Option<Draft>,

        /// Treat schema keywords with the wrong JSON type as errors
        #[arg(long)]
        strict: bool,

        /// Do not check the format keyword
        #[arg(long)]
        no_formats: bool,
    },

    /// Rewrite a schema in the syntax of another draft
    Convert {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Target draft (3, 4 or 6)
        #[arg(long, value_parser = parse_draft)]
        draft: Draft,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Load a schema and print every loading issue
    Check {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Output the loading report as JSON
        #[arg(long)]
        json: bool,

        /// Draft assumed when the schema has no $schema (3, 4 or 6)
        #[arg(long, value_parser = parse_draft)]
        draft: Option<Draft>,

        /// Treat schema keywords with the wrong JSON type as errors
        #[arg(long)]
        strict: bool,
    },
}

fn parse_draft(s: &str) -> Result<Draft, String> {
    s.parse::<u8>()
        .ok()
        .and_then(Draft::from_number)
        .ok_or_else(|| format!("unsupported draft {:?}: expected 3, 4 or 6", s))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            schema,
            instances,
            json,
            draft,
            strict,
            no_formats,
        } => run_validate(ValidateArgs {
            schema,
            instances,
            json_output: json,
            options: loader_options(draft, strict),
            assert_formats: !no_formats,
        }),

        Commands::Convert {
            schema,
            draft,
            output,
            pretty,
        } => run_convert(&schema, draft, output, pretty),

        Commands::Check {
            schema,
            json,
            draft,
            strict,
        } => run_check(&schema, json, loader_options(draft, strict)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn loader_options(draft: Option<Draft>, strict: bool) -> LoaderOptions {
    let options = LoaderOptions::new().strict(strict);
    match draft {
        Some(draft) => options.default_draft(draft),
        None => options,
    }
}

/// Load a schema from a file path or URL.
///
/// Files are identified by their `file:` URI so violations point at them.
fn load_schema(loader: &mut SchemaLoader, source: &str, json_output: bool) -> Result<Schema, u8> {
    let loaded = if is_url(source) {
        let uri = Url::parse(source).map_err(|e| {
            report_error(json_output, &format!("invalid URL {}: {}", source, e));
            2u8
        })?;
        loader.load_uri(&uri)
    } else {
        let document = load_document(Path::new(source)).map_err(|e| {
            report_error(json_output, &format!("loading schema: {}", e));
            e.exit_code() as u8
        })?;
        let file_uri = std::fs::canonicalize(source)
            .ok()
            .and_then(|path| Url::from_file_path(path).ok());
        match file_uri {
            Some(uri) => loader.load_with_uri(&document, &uri),
            None => loader.load(&document),
        }
    };

    loaded.map_err(|e| {
        if json_output {
            let output = json!({
                "valid": false,
                "error": e.to_string(),
                "issues": e.report,
            });
            println!("{}", output);
        } else {
            eprintln!("Error: {}", e);
            print_report(&e.report);
        }
        e.exit_code() as u8
    })
}

struct ValidateArgs {
    schema: String,
    instances: Vec<PathBuf>,
    json_output: bool,
    options: LoaderOptions,
    assert_formats: bool,
}

fn run_validate(args: ValidateArgs) -> Result<(), u8> {
    let ValidateArgs {
        schema: schema_source,
        instances,
        json_output,
        options,
        assert_formats,
    } = args;

    let mut loader = SchemaLoader::with_options(options);
    let schema = load_schema(&mut loader, &schema_source, json_output)?;
    let validator_options = ValidatorOptions::new().assert_formats(assert_formats);
    let validator = Validator::with_options(&schema, &validator_options).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    let mut failed = false;
    for path in &instances {
        let instance = load_document(path).map_err(|e| {
            report_error(json_output, &format!("loading instance: {}", e));
            e.exit_code() as u8
        })?;
        debug!(instance = %path.display(), "validating");

        match validator.validate(&instance) {
            Ok(()) => {
                if json_output {
                    println!("{}", json!({ "instance": path, "valid": true }));
                } else {
                    println!("{}: valid", path.display());
                }
            }
            Err(error) => {
                failed = true;
                if json_output {
                    let errors: Vec<Value> = if error.is_leaf() {
                        vec![error.to_json()]
                    } else {
                        error.causes.iter().map(|e| e.to_json()).collect()
                    };
                    let output = json!({
                        "instance": path,
                        "valid": false,
                        "errors": errors,
                    });
                    println!("{}", output);
                } else {
                    eprintln!("{}: invalid", path.display());
                    for leaf in error.leaves() {
                        eprintln!("  {}", leaf);
                    }
                }
            }
        }
    }

    if failed {
        Err(1)
    } else {
        Ok(())
    }
}

fn run_convert(
    schema_source: &str,
    draft: Draft,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let mut loader = SchemaLoader::new();
    let schema = load_schema(&mut loader, schema_source, false)?;
    let view = schema.as_draft(draft);
    for keyword in view.unsupported() {
        eprintln!("Warning: {} cannot be expressed in {} and was dropped", keyword, draft);
    }

    let converted = view.to_json();
    let json_output = if pretty {
        serde_json::to_string_pretty(&converted)
    } else {
        serde_json::to_string(&converted)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_check(schema_source: &str, json_output: bool, options: LoaderOptions) -> Result<(), u8> {
    let mut loader = SchemaLoader::with_options(options);
    load_schema(&mut loader, schema_source, json_output)?;
    let report = loader.last_report();

    if json_output {
        println!("{}", json!({ "valid": true, "issues": report }));
    } else if report.is_empty() {
        println!("{}: no issues", schema_source);
    } else {
        print_report(report);
        let warnings = report
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count();
        println!("{}: loaded with {} warning(s)", schema_source, warnings);
    }
    Ok(())
}

fn print_report(report: &LoadingReport) {
    for line in report.to_string().lines() {
        eprintln!("  {}", line);
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
