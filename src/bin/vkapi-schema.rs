//! VK API Schema CLI
//!
//! Command-line interface for parsing, resolving and checking VK API schemas.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use url::Url;
use vkapi_schema::{
    check, parse_with_registry, resolve_corpus, Corpus, DocumentFetcher, FileStatus, ParseOptions,
    SchemaNode, SchemaRegistry, Severity,
};

#[derive(Parser)]
#[command(name = "vkapi-schema")]
#[command(about = "Parse VK API JSON schemas into a typed API model")]
#[command(version)]
struct Cli {
    /// Log resolution steps to stderr (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a schema corpus into the API model (categories, methods, errors)
    Parse {
        #[command(flatten)]
        corpus: CorpusArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Resolve every $ref and print the resolved documents
    Resolve {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Only print this document (path relative to the corpus root)
        #[arg(long)]
        document: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Check schema documents for errors (syntax, broken refs, duplicate properties)
    Check {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

#[derive(Args)]
struct CorpusArgs {
    /// Corpus directory (or a single schema file)
    path: PathBuf,

    /// Base URI the corpus is addressed under (default: its file:// URL)
    #[arg(long)]
    base_uri: Option<String>,

    /// Method catalog file name inside each category directory
    #[arg(long, default_value = vkapi_schema::DEFAULT_METHODS_FILE)]
    methods_file: String,

    /// Error catalog file name
    #[arg(long, default_value = vkapi_schema::DEFAULT_ERRORS_FILE)]
    errors_file: String,

    /// Additional file names to skip (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Fetch http(s) references outside the corpus
    #[arg(long)]
    remote: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Output file (stdout if not specified)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Parse { corpus, output } => run_parse(&corpus, &output),
        Commands::Resolve {
            corpus,
            document,
            output,
        } => run_resolve(&corpus, document.as_deref(), &output),
        Commands::Check {
            corpus,
            format,
            strict,
            quiet,
        } => run_check(&corpus, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

impl CorpusArgs {
    fn options(&self) -> Result<ParseOptions, u8> {
        let mut options = ParseOptions::new()
            .methods_file(&self.methods_file)
            .errors_file(&self.errors_file);
        for name in &self.exclude {
            options = options.exclude(name);
        }
        if let Some(base_uri) = &self.base_uri {
            let uri = Url::parse(base_uri).map_err(|e| {
                eprintln!("Error: invalid base URI \"{}\": {}", base_uri, e);
                2u8
            })?;
            options = options.base_uri(uri);
        }
        Ok(options)
    }

    fn registry(&self) -> SchemaRegistry {
        SchemaRegistry::with_fetch(DocumentFetcher::new().remote(self.remote))
    }

    fn load(&self, options: &ParseOptions) -> Result<Corpus, u8> {
        Corpus::from_dir(&self.path, options).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })
    }
}

fn run_parse(args: &CorpusArgs, output: &OutputArgs) -> Result<(), u8> {
    let options = args.options()?;
    let corpus = args.load(&options)?;

    let schema = parse_with_registry(&corpus, &options, args.registry()).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_json(&schema, output)
}

fn run_resolve(args: &CorpusArgs, document: Option<&str>, output: &OutputArgs) -> Result<(), u8> {
    let options = args.options()?;
    let corpus = args.load(&options)?;

    let resolved = resolve_corpus(&corpus, args.registry()).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    match document {
        Some(name) => {
            let node = resolved.get(name).ok_or_else(|| {
                eprintln!("Error: document not in corpus: {}", name);
                2u8
            })?;
            write_json(&encode(name, node)?, output)
        }
        None => {
            let mut documents = serde_json::Map::new();
            for (name, node) in &resolved {
                documents.insert(name.clone(), encode(name, node)?);
            }
            write_json(&documents, output)
        }
    }
}

fn encode(name: &str, node: &SchemaNode) -> Result<serde_json::Value, u8> {
    node.to_value().map_err(|e| {
        eprintln!("Error: cannot encode {}: {}", name, e);
        2u8
    })
}

fn write_json<T: Serialize + ?Sized>(value: &T, output: &OutputArgs) -> Result<(), u8> {
    let json_output = if output.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match &output.output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
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

fn run_check(args: &CorpusArgs, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    let options = args.options()?;
    let path: &Path = &args.path;

    let result = check(path, &options, args.registry(), strict).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if format == "json" {
        let json_output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", json_output);
    } else {
        if !quiet {
            println!("Checking {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file);
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.exit_code(strict) == 0 {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    match result.exit_code(strict) {
        0 => Ok(()),
        code => Err(code as u8),
    }
}
