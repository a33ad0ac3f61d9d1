//! confparse CLI - Command-line interface for the confparse configuration parser
//!
//! Usage:
//!   confparse parse config.yaml --schema schema.yaml
//!   confparse validate config.yaml staging.yaml --schema schema.yaml
//!   confparse get config.yaml database.host --env DB_HOST=localhost

use clap::{Parser, Subcommand};
use colored::Colorize;
use confparse_core::interpolation::is_valid_name;
use confparse_core::{
    loader, ConfigParser, Environment, Error, Format, ParserOptions, Schema, Value,
    DEFAULT_INCLUDE_KEY, DEFAULT_MAX_INCLUDE_DEPTH,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// confparse - YAML/JSON configuration with env expansion, includes and schemas
#[derive(Parser)]
#[command(name = "confparse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Set an environment variable for expansion (KEY=VALUE, repeatable)
    #[arg(short, long = "env", global = true, value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Don't read the process environment; only use --env values
    #[arg(long, global = true)]
    no_process_env: bool,

    /// Mapping key that marks an include directive
    #[arg(long, global = true, default_value = DEFAULT_INCLUDE_KEY)]
    include_key: String,

    /// Maximum include nesting depth
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_INCLUDE_DEPTH)]
    max_include_depth: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a configuration file and print the resolved tree
    Parse {
        /// Configuration file to parse
        file: PathBuf,

        /// Path to schema file
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration files against a schema
    Validate {
        /// Configuration file(s) to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Path to schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only output errors (quiet mode)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Get a specific value from the resolved configuration
    Get {
        /// Configuration file
        file: PathBuf,

        /// Path to the value (e.g., database.host)
        path: String,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Default value if key not found
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Quick syntax check without expansion or includes
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Schema-related utilities
    #[command(name = "schema")]
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Check that a schema file is well-formed
    Check {
        /// Schema file to check
        #[arg(required = true)]
        file: PathBuf,
    },
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let env = build_environment(&cli.env, cli.no_process_env);
    let options = ParserOptions {
        include_key: cli.include_key,
        max_include_depth: cli.max_include_depth,
    };

    match cli.command {
        Commands::Parse {
            file,
            schema,
            format,
            output,
        } => cmd_parse(&file, schema, &env, options, &format, output),

        Commands::Validate {
            files,
            schema,
            format,
            quiet,
        } => cmd_validate(files, schema, &env, options, &format, quiet),

        Commands::Get {
            file,
            path,
            format,
            default,
        } => cmd_get(&file, &path, &env, options, &format, default),

        Commands::Check { files } => cmd_check(files),

        Commands::Schema { command } => match command {
            SchemaCommands::Check { file } => cmd_schema_check(&file),
        },
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG takes precedence over -v
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

/// Parse a `KEY=VALUE` pair for `--env`
fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid KEY=VALUE pair: {}", s))?;
    if !is_valid_name(name) {
        return Err(format!(
            "Invalid variable name '{}': must match [A-Z_][A-Z0-9_]*",
            name
        ));
    }
    Ok((name.to_string(), value.to_string()))
}

fn build_environment(overrides: &[(String, String)], no_process_env: bool) -> Environment {
    let mut env = if no_process_env {
        Environment::new()
    } else {
        Environment::from_process()
    };
    for (name, value) in overrides {
        env = env.with_var(name.clone(), value.clone());
    }
    env
}

/// Exit status for a failed parse: 1 for schema violations, 2 for everything else
fn exit_status(err: &Error) -> u8 {
    if err.is_validation() {
        1
    } else {
        2
    }
}

fn load_schema(path: &Path) -> Result<Schema, String> {
    Schema::from_file(path).map_err(|e| format!("Failed to load schema {}: {}", path.display(), e))
}

fn render(value: &Value, format: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| format!("Failed to serialize JSON: {}", e)),
        "yaml" | "yml" => {
            serde_yaml::to_string(value).map_err(|e| format!("Failed to serialize YAML: {}", e))
        }
        _ => Err(format!("Unsupported format: {}. Use yaml or json.", format)),
    }
}

fn render_text(value: &Value) -> Result<String, String> {
    // For complex values, output as YAML
    if value.is_sequence() || value.is_mapping() {
        render(value, "yaml")
    } else {
        Ok(format!("{}\n", value))
    }
}

fn cmd_parse(
    file: &Path,
    schema_path: Option<PathBuf>,
    env: &Environment,
    options: ParserOptions,
    format: &str,
    output: Option<PathBuf>,
) -> ExitCode {
    let mut parser = ConfigParser::new().with_options(options);
    if let Some(path) = schema_path {
        match load_schema(&path) {
            Ok(schema) => parser = parser.with_schema(schema),
            Err(e) => {
                eprintln!("{}", e.red());
                return ExitCode::from(2);
            }
        }
    }

    let config = match parser.parse(file, env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}\n", "✗".red(), file.display());
            eprintln!("{}", e);
            return ExitCode::from(exit_status(&e));
        }
    };

    let content = match render(&config, format) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(2);
        }
    };

    if let Some(output_path) = output {
        if let Err(e) = std::fs::write(&output_path, &content) {
            eprintln!("{}: {}", "Error writing file".red(), e);
            return ExitCode::from(2);
        }
        eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
    } else {
        print!("{}", content);
    }
    ExitCode::SUCCESS
}

fn cmd_validate(
    files: Vec<PathBuf>,
    schema_path: PathBuf,
    env: &Environment,
    options: ParserOptions,
    format: &str,
    quiet: bool,
) -> ExitCode {
    let schema = match load_schema(&schema_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let parser = ConfigParser::new().with_options(options);
    let mut exit_code = 0u8;
    let mut reports = Vec::new();

    for file in &files {
        // Resolve first, then collect every validation error for the report
        let errors = match parser.resolve(file, env) {
            Ok(tree) => schema.validate_collect(&tree),
            Err(e) => vec![e],
        };

        if let Some(first) = errors.first() {
            exit_code = exit_code.max(exit_status(first));
        }

        if format == "json" {
            let error_list: Vec<_> = errors
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "path": e.path,
                        "error": e.kind.to_string(),
                        "message": e.to_string(),
                    })
                })
                .collect();
            reports.push(serde_json::json!({
                "file": file.display().to_string(),
                "valid": errors.is_empty(),
                "errors": error_list,
            }));
        } else if errors.is_empty() {
            if !quiet {
                println!("{} {} is valid", "✓".green(), file.display());
            }
        } else {
            eprintln!(
                "{} {}: {} error(s)\n",
                "✗".red(),
                file.display(),
                errors.len()
            );
            for e in &errors {
                eprintln!("{}\n", e);
            }
        }
    }

    if format == "json" && (!quiet || exit_code != 0) {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                return ExitCode::from(2);
            }
        }
    }

    ExitCode::from(exit_code)
}

fn cmd_get(
    file: &Path,
    path: &str,
    env: &Environment,
    options: ParserOptions,
    format: &str,
    default: Option<String>,
) -> ExitCode {
    let config = match ConfigParser::new().with_options(options).resolve(file, env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            return ExitCode::from(2);
        }
    };

    let value = match config.get_path(path) {
        Ok(v) => v,
        Err(_) => {
            if let Some(default_val) = default {
                println!("{}", default_val);
                return ExitCode::SUCCESS;
            }
            eprintln!("{}: Path '{}' not found", "Error".red(), path);
            return ExitCode::from(1);
        }
    };

    let rendered = match format {
        "text" => render_text(value),
        other => render(value, other),
    };

    match rendered {
        Ok(s) => {
            print!("{}", s);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(2)
        }
    }
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    if check_files(&files) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Syntax-check each file, returning whether all of them decoded
fn check_files(files: &[PathBuf]) -> bool {
    let mut all_valid = true;

    for file in files {
        match loader::load(file) {
            Ok(_) => {
                let format = Format::from_path(file)
                    .map(|f| f.to_string())
                    .unwrap_or_default();
                println!("{} {}: valid {}", "✓".green(), file.display(), format);
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    all_valid
}

fn cmd_schema_check(file: &Path) -> ExitCode {
    match Schema::from_file(file) {
        Ok(schema) => {
            println!(
                "{} {}: valid schema ({} top-level fields)",
                "✓".green(),
                file.display(),
                schema.len()
            );
            print!("{}", describe_schema(&schema, 1));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}: {}", "✗".red(), file.display(), e);
            ExitCode::from(1)
        }
    }
}

/// One line per field, nested schemas indented below their parent
fn describe_schema(schema: &Schema, depth: usize) -> String {
    let mut out = String::new();
    for (name, rule) in schema.fields() {
        let mut line = format!("{}{}", "  ".repeat(depth), name);
        if let Some(kind) = rule.kind() {
            line.push_str(&format!(": {}", kind));
        }
        if rule.is_required() {
            line.push_str(" (required)");
        }
        match rule.range() {
            (Some(min), Some(max)) => line.push_str(&format!(" [{}, {}]", min, max)),
            (Some(min), None) => line.push_str(&format!(" >= {}", min)),
            (None, Some(max)) => line.push_str(&format!(" <= {}", max)),
            (None, None) => {}
        }
        out.push_str(&line);
        out.push('\n');
        if let Some(nested) = rule.nested() {
            out.push_str(&describe_schema(nested, depth + 1));
        }
    }
    out
}
