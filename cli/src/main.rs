use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use output_guard_core::{
    generate, FaultKind, PipelineOptions, Schema, SchemaRegistry, ValidationPipeline,
};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;

/// Exit code for a run that completed but produced an invalid result.
const EXIT_INVALID: u8 = 2;

#[derive(Parser)]
#[command(name = "output-guard")]
#[command(about = "Validate, repair and recover structured JSON output produced by LLMs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a model response through repair, validation and recovery
    Validate {
        /// Response text file, or `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        #[command(flatten)]
        source: SchemaSource,

        /// Pipeline options file (JSON, kebab-case keys)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Reference date for past-or-present checks (YYYY-MM-DD, defaults to today)
        #[arg(long, value_name = "DATE")]
        today: Option<NaiveDate>,

        /// Report non-critical violations as errors instead of warnings
        #[arg(long)]
        no_partial_accept: bool,

        /// Output result file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Print a synthetic model response, optionally with one injected fault
    Mock {
        #[command(flatten)]
        source: SchemaSource,

        /// Fault to inject
        #[arg(long, value_enum)]
        fault: Option<FaultArg>,
    },

    /// Print a built-in schema definition, or list the built-in names
    Schema {
        /// Built-in schema name
        #[arg(long, value_name = "NAME")]
        builtin: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SchemaSource {
    /// Schema definition file (JSON)
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Built-in schema name
    #[arg(long, value_name = "NAME")]
    builtin: Option<String>,
}

impl SchemaSource {
    fn load(&self) -> Result<Schema> {
        if let Some(path) = &self.schema {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to open schema file: {}", path.display()))?;
            return Schema::from_json(&text)
                .with_context(|| format!("Failed to load schema from: {}", path.display()));
        }
        let name = self.builtin.as_deref().unwrap_or_default();
        let registry =
            SchemaRegistry::with_builtins().context("Failed to build built-in schemas")?;
        let schema = registry.get(name)?;
        Ok(schema.clone())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum FaultArg {
    MalformedJson,
    MissingRequiredField,
    WrongType,
    ExtraFields,
    InvalidValues,
}

impl From<FaultArg> for FaultKind {
    fn from(val: FaultArg) -> Self {
        match val {
            FaultArg::MalformedJson => FaultKind::MalformedJson,
            FaultArg::MissingRequiredField => FaultKind::MissingRequiredField,
            FaultArg::WrongType => FaultKind::WrongType,
            FaultArg::ExtraFields => FaultKind::ExtraFields,
            FaultArg::InvalidValues => FaultKind::InvalidValues,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<ExitCode> {
    // Exit code 2 is reserved for invalid results, so usage errors exit with 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            e.print().context("Failed to print usage error")?;
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => e.exit(),
    };

    // Logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            input,
            source,
            config,
            today,
            no_partial_accept,
            output,
            format,
        } => {
            let schema = source.load()?;
            let raw = read_input(&input)?;

            let mut options = match config {
                Some(path) => load_options(&path)?,
                None => PipelineOptions::default(),
            };
            if today.is_some() {
                options.today = today;
            }
            if no_partial_accept {
                options.recovery.partial_accept = false;
            }

            let result = ValidationPipeline::new(options).run(&raw, &schema);
            tracing::info!(
                schema = schema.name(),
                valid = result.valid,
                errors = result.errors.len(),
                "validation finished"
            );
            for warning in &result.warnings {
                eprintln!("Warning: {}: {}", warning.field, warning.message);
            }

            write_json(&result, output.as_ref(), format)?;
            if !result.valid {
                return Ok(ExitCode::from(EXIT_INVALID));
            }
        }
        Commands::Mock { source, fault } => {
            let schema = source.load()?;
            let payload = generate(&schema, fault.map(FaultKind::from))
                .context("Failed to generate mock payload")?;
            let mut out = io::stdout().lock();
            writeln!(out, "{}", payload).context("Failed to write payload")?;
        }
        Commands::Schema { builtin, format } => {
            let registry =
                SchemaRegistry::with_builtins().context("Failed to build built-in schemas")?;
            match builtin {
                Some(name) => write_json(registry.get(&name)?, None, format)?,
                None => {
                    let mut out = io::stdout().lock();
                    for name in registry.names() {
                        writeln!(out, "{}", name).context("Failed to write schema name")?;
                    }
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_input(path: &Path) -> Result<String> {
    let mut text = String::new();
    if path == Path::new("-") {
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read response from stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    }
    Ok(text)
}

fn load_options(path: &Path) -> Result<PipelineOptions> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to open config file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse options from: {}", path.display()))
}

fn write_json<T: serde::Serialize>(
    val: &T,
    path: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p)
            .with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    match format {
        OutputFormat::Pretty => {
            serde_json::to_writer_pretty(&mut writer, val).context("Failed to write JSON")?;
        }
        OutputFormat::Compact => {
            serde_json::to_writer(&mut writer, val).context("Failed to write JSON")?;
        }
    }

    writeln!(writer).context("Failed to write trailing newline")?;
    writer.flush().context("Failed to flush output")?;

    Ok(())
}
