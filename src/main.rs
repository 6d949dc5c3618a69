//! chtl-modsys - command line front end for the CHTL module system

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};

use chtl_modsys::{detect_kind, LoadOptions, LoadStrategy, LoaderConfig, ModuleLoader};

#[derive(Parser, Debug)]
#[command(name = "chtl-modsys", version)]
#[command(about = "Resolve, load and inspect CHTL modules")]
struct Cli {
    /// Log at debug level and enable per-step loader tracing
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load one or more modules and report the results
    Load {
        #[arg(required = true, value_name = "REF")]
        references: Vec<String>,

        /// Extra search directory (can be specified multiple times)
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = StrategyArg::Sync)]
        strategy: StrategyArg,

        /// Bypass the module cache
        #[arg(long)]
        no_cache: bool,

        /// Skip descriptor validation
        #[arg(long)]
        no_validate: bool,

        /// Do not load dependencies
        #[arg(long)]
        no_recursive: bool,

        /// Dependency depth limit (0 or negative for unbounded)
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        max_depth: Option<i32>,

        /// Fail a module when a required dependency cannot be loaded
        #[arg(long)]
        strict_deps: bool,

        #[arg(long, value_name = "N")]
        timeout_ms: Option<u64>,

        /// Dump the loader state after loading
        #[arg(long, value_enum)]
        format: Option<DumpFormat>,
    },
    /// List files in the search paths whose names match a pattern
    Find {
        pattern: String,

        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,
    },
    /// Print the kind detected for a module file
    Detect { file: PathBuf },
    /// Load a module and print its dependency load order
    Deps {
        reference: String,

        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Sync,
    Parallel,
    Lazy,
    Eager,
}

impl From<StrategyArg> for LoadStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sync => LoadStrategy::Sync,
            StrategyArg::Parallel => LoadStrategy::Parallel,
            StrategyArg::Lazy => LoadStrategy::Lazy,
            StrategyArg::Eager => LoadStrategy::Eager,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DumpFormat {
    Json,
    Yaml,
    Xml,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build a loader from `chtl-modsys.toml` in the working directory (if any)
/// plus the command's include directories and the per-user module directory.
fn build_loader(include: &[PathBuf], debug: bool) -> Result<ModuleLoader, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read working directory: {}", e))?;
    let mut config = match LoaderConfig::load(&cwd).map_err(|e| e.to_string())? {
        Some(config) => {
            info!(dir = %cwd.display(), "using chtl-modsys.toml");
            config
        }
        None => LoaderConfig::default(),
    };

    config.debug |= debug;
    for dir in include {
        config = config.with_search_path(dir);
    }
    if let Some(user_dir) = LoaderConfig::user_module_dir().filter(|d| d.is_dir()) {
        config = config.with_search_path(user_dir);
    }

    Ok(ModuleLoader::with_config(config))
}

#[allow(clippy::too_many_arguments)]
fn run_load(
    loader: &ModuleLoader,
    references: &[String],
    strategy: StrategyArg,
    no_cache: bool,
    no_validate: bool,
    no_recursive: bool,
    max_depth: Option<i32>,
    strict_deps: bool,
    timeout_ms: Option<u64>,
    format: Option<DumpFormat>,
) -> Result<bool, String> {
    let mut options = LoadOptions::default().with_strategy(strategy.into());
    options.use_cache = !no_cache;
    options.validate = !no_validate;
    options.recursive = !no_recursive;
    options.ignore_errors = !strict_deps;
    if let Some(depth) = max_depth {
        options.max_depth = depth;
    }
    if let Some(ms) = timeout_ms {
        options.timeout = Duration::from_millis(ms);
    }

    let results = loader.load_all(references, &options);
    let mut all_ok = true;

    for (reference, result) in references.iter().zip(&results) {
        match (&result.module, result.success) {
            (Some(module), true) => println!(
                "{} {}@{} ({}, {:.2}ms)",
                reference,
                module.name,
                module.version,
                module.kind,
                result.load_time.as_secs_f64() * 1000.0
            ),
            _ => {
                all_ok = false;
                println!("{} FAILED", reference);
                for line in result.error_lines() {
                    println!("  error: {}", line);
                }
            }
        }
        for warning in &result.warnings {
            warn!(reference = %reference, "{}", warning);
        }
    }

    if let Some(format) = format {
        let dump = match format {
            DumpFormat::Json => loader.to_json(),
            DumpFormat::Yaml => loader.to_yaml(),
            DumpFormat::Xml => loader.to_xml(),
        }
        .map_err(|e| e.to_string())?;
        println!("{}", dump);
    }

    Ok(all_ok)
}

fn run(cli: Cli) -> Result<bool, String> {
    match cli.command {
        Command::Load {
            references,
            include,
            strategy,
            no_cache,
            no_validate,
            no_recursive,
            max_depth,
            strict_deps,
            timeout_ms,
            format,
        } => {
            let loader = build_loader(&include, cli.debug)?;
            run_load(
                &loader,
                &references,
                strategy,
                no_cache,
                no_validate,
                no_recursive,
                max_depth,
                strict_deps,
                timeout_ms,
                format,
            )
        }
        Command::Find { pattern, include } => {
            let loader = build_loader(&include, cli.debug)?;
            for path in loader.find_modules(&pattern) {
                println!("{}", path.display());
            }
            Ok(true)
        }
        Command::Detect { file } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
            println!("{}", detect_kind(&text));
            Ok(true)
        }
        Command::Deps { reference, include } => {
            let loader = build_loader(&include, cli.debug)?;
            let result = loader.load(&reference, &LoadOptions::default());
            let module = match &result.module {
                Some(module) if result.success => Arc::clone(module),
                _ => return Err(result.error_lines().join("\n  ")),
            };
            let order = loader
                .resolve_dependencies_strict(&module.name)
                .map_err(|e| e.to_string())?;
            for name in order {
                println!("{}", name);
            }
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}
