//! Fleet Rollout - unattended binary replacement across service instances
//!
//! The main entry point for fleet-rollout, handling:
//! - Configuration bootstrap, display and validation
//! - Discovery of instances and staged files
//! - The rollout itself: backup, install, verify, restart, prune
//! - Embedded version inspection of single files

use clap::{Args, Parser, Subcommand, ValueEnum};
use fr_config::resolve::executable_dir;
use fr_config::{
    load_config, resolve_config_path, write_template, ConfigError, ConfigSnapshot, LoadedConfig,
};
use fr_core::discover::{discover_targets, resolve_sources, Discovery, SourceSet};
use fr_core::exit_codes::ExitCode;
use fr_core::install::{RunSummary, UpdateDriver};
use fr_core::log_event;
use fr_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage, LOG_DIR_NAME,
};
use fr_core::pe::{read_file_version, VersionError};
use fr_core::service::controller_for;
use std::path::{Path, PathBuf};

/// Fleet Rollout - replace service binaries across every instance on a host
#[derive(Parser)]
#[command(name = "fleet-rollout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (default: $FLEET_ROLLOUT_CONFIG, then <exe dir>/config/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for the command payload on stdout
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory for the per-day log file (default: <exe dir>/updateLog)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Do not write the per-day log file
    #[arg(long, global = true)]
    no_log_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Human,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update every discovered instance (default)
    Run(RunArgs),
    /// Show which instances and files a run would touch
    Plan,
    /// Print the embedded version of an executable
    Version {
        /// Executable to inspect
        file: PathBuf,
    },
    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Wait for Enter before exiting
    #[arg(long)]
    pause: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a commented config template if none exists
    Init,
    /// Show the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let cli_format = match cli.global.format {
        OutputFormat::Json => Some(LogFormat::Jsonl),
        OutputFormat::Human => None,
    };

    // Only the rollout itself leaves a day log behind.
    let writes_log = matches!(cli.command, None | Some(Commands::Run(_))) && !cli.global.no_log_file;
    let log_dir = writes_log.then(|| {
        cli.global
            .log_dir
            .clone()
            .unwrap_or_else(|| executable_dir().join(LOG_DIR_NAME))
    });

    let log_config = LogConfig::from_env(cli_level, cli_format).with_log_dir(log_dir);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("fleet-rollout: cannot open log directory: {}", e);
        return ExitCode::IoError.into();
    }

    let exit_code = match &cli.command {
        None => run_rollout(&cli.global, &RunArgs::default()),
        Some(Commands::Run(args)) => run_rollout(&cli.global, args),
        Some(Commands::Plan) => run_plan(&cli.global),
        Some(Commands::Version { file }) => run_version(&cli.global, file),
        Some(Commands::Config(args)) => run_config(&cli.global, args),
    };

    exit_code.into()
}

// ============================================================================
// Shared helpers
// ============================================================================

fn new_context() -> LogContext {
    LogContext::new(generate_run_id(), get_host_id())
}

fn config_exit_code(err: &ConfigError) -> ExitCode {
    match err {
        ConfigError::Io { .. } => ExitCode::IoError,
        _ => ExitCode::ArgsError,
    }
}

/// Report a failure on stdout (JSON) or stderr (human) and return its code.
fn output_error(global: &GlobalOpts, command: &str, message: &str, code: ExitCode) -> ExitCode {
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "command": command,
                "error": message,
                "exit_code": code.as_i32(),
                "code_name": code.code_name(),
            });
            println!("{}", response);
        }
        OutputFormat::Human => eprintln!("fleet-rollout {}: {}", command, message),
    }
    code
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{}", s);
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("fleet-rollout: cannot serialize output: {}", e);
            ExitCode::InternalError
        }
    }
}

fn load(global: &GlobalOpts, ctx: &LogContext, command: &str) -> Result<LoadedConfig, ExitCode> {
    let location = resolve_config_path(global.config.as_deref(), &executable_dir());
    match load_config(location) {
        Ok(loaded) => {
            let snapshot = ConfigSnapshot::capture(&loaded);
            log_event!(
                ctx,
                INFO,
                event_names::CONFIG_LOADED,
                Stage::Init,
                "Configuration loaded",
                path = display(&snapshot.path),
                source = display(&snapshot.source),
                hash = display(&snapshot.content_hash),
                exe_version = display(&snapshot.exe_version),
                retention = snapshot.backup_retention,
                stop_policy = display(&snapshot.stop_policy),
                manager = display(&snapshot.service_manager)
            );
            Ok(loaded)
        }
        Err(e) => {
            log_event!(
                ctx,
                ERROR,
                event_names::CONFIG_ERROR,
                Stage::Init,
                "Cannot load configuration",
                error = display(&e)
            );
            let message = match &e {
                ConfigError::NotFound { .. } => {
                    format!("{} (run `fleet-rollout config init` to create a template)", e)
                }
                _ => e.to_string(),
            };
            Err(output_error(global, command, &message, config_exit_code(&e)))
        }
    }
}

fn discover_and_resolve(
    global: &GlobalOpts,
    ctx: &LogContext,
    loaded: &LoadedConfig,
    command: &str,
) -> Result<(Discovery, SourceSet), ExitCode> {
    let config = &loaded.config;
    let discovery = discover_targets(
        &config.target_dir,
        &config.server_type,
        &config.excluded_ids,
        &config.server_prefix,
    )
    .map_err(|e| {
        log_event!(
            ctx,
            ERROR,
            event_names::RUN_ABORTED,
            Stage::Discover,
            "Discovery failed",
            error = display(&e)
        );
        output_error(global, command, &e.to_string(), ExitCode::IoError)
    })?;
    let sources = resolve_sources(&config.source_dir, &config.source_suffixes, true);
    Ok((discovery, sources))
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_rollout(global: &GlobalOpts, args: &RunArgs) -> ExitCode {
    let ctx = new_context();
    let code = rollout(global, &ctx);
    if args.pause {
        wait_for_enter();
    }
    code
}

fn rollout(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    let loaded = match load(global, ctx, "run") {
        Ok(l) => l,
        Err(code) => return code,
    };
    let config = &loaded.config;

    let controller = controller_for(&config.service);
    if let Err(e) = controller.check_available() {
        log_event!(
            ctx,
            ERROR,
            event_names::RUN_ABORTED,
            Stage::Init,
            "Service manager unavailable",
            manager = display(&config.service.manager),
            error = display(&e)
        );
        return output_error(global, "run", &e.to_string(), ExitCode::ServiceUnavailable);
    }

    let (discovery, sources) = match discover_and_resolve(global, ctx, &loaded, "run") {
        Ok(found) => found,
        Err(code) => return code,
    };

    let driver = UpdateDriver::new(config, controller.as_ref(), ctx.clone());
    let summary = driver.run(&discovery.instances, &sources);

    let printed = match global.format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Human => {
            print_human_summary(&summary);
            ExitCode::Clean
        }
    };
    if printed != ExitCode::Clean {
        return printed;
    }
    ExitCode::from_summary(&summary)
}

fn print_human_summary(summary: &RunSummary) {
    println!(
        "Rollout {}: success={} fail={} total={}",
        summary.run_id, summary.success, summary.fail, summary.total
    );
    if !summary.updated_services.is_empty() {
        println!("Updated services: {}", summary.updated_services.join(", "));
    }
    for outcome in summary.outcomes.iter().filter(|o| !o.succeeded) {
        match &outcome.failure {
            Some(reason) => println!(
                "  {} failed: {}",
                outcome.id,
                serde_json::to_string(reason).unwrap_or_default()
            ),
            None => println!("  {} failed", outcome.id),
        }
    }
    if let Some(reason) = &summary.aborted {
        println!("Aborted: {}", reason);
    }
    if !summary.not_attempted.is_empty() {
        println!("Not attempted: {}", summary.not_attempted.join(", "));
    }
}

fn wait_for_enter() {
    eprintln!("Press Enter to exit...");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
}

fn run_plan(global: &GlobalOpts) -> ExitCode {
    let ctx = new_context();
    let loaded = match load(global, &ctx, "plan") {
        Ok(l) => l,
        Err(code) => return code,
    };
    let config = &loaded.config;
    let (discovery, sources) = match discover_and_resolve(global, &ctx, &loaded, "plan") {
        Ok(found) => found,
        Err(code) => return code,
    };

    let instances: Vec<_> = discovery
        .instances
        .values()
        .map(|i| {
            serde_json::json!({
                "id": i.id,
                "service": config.service_name(&i.id),
                "base_path": i.base_path,
                "exe_path": i.exe_path,
            })
        })
        .collect();
    let files: Vec<_> = sources
        .iter()
        .map(|(name, path)| serde_json::json!({ "name": name, "path": path }))
        .collect();
    let has_main_exe = sources.get(&config.source_exe_name).is_some();

    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "run_id": ctx.run_id,
            "target_version": config.exe_version,
            "source_exe_name": config.source_exe_name,
            "source_exe_staged": has_main_exe,
            "instances": instances,
            "skipped": discovery.skipped,
            "sources": files,
        })),
        OutputFormat::Human => {
            println!(
                "Target version {} from {}",
                config.exe_version,
                config.source_dir.display()
            );
            if !has_main_exe {
                println!("WARNING: {} is not staged", config.source_exe_name);
            }
            println!("Files ({}):", sources.len());
            for (name, path) in sources.iter() {
                println!("  {:<24} {}", name, path.display());
            }
            println!("Instances ({}):", discovery.instances.len());
            for i in discovery.instances.values() {
                println!("  {:<8} {}", i.id, i.base_path.display());
            }
            if !discovery.skipped.is_empty() {
                println!("Skipped ({}):", discovery.skipped.len());
                for s in &discovery.skipped {
                    println!(
                        "  {:<8} {}",
                        s.id,
                        serde_json::to_string(&s.reason).unwrap_or_default()
                    );
                }
            }
            ExitCode::Clean
        }
    }
}

fn run_version(global: &GlobalOpts, file: &Path) -> ExitCode {
    match read_file_version(file) {
        Ok(version) => match global.format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "file": file,
                "version": version.to_string(),
                "words": version.words,
            })),
            OutputFormat::Human => {
                println!("{}", version);
                ExitCode::Clean
            }
        },
        Err(e) => {
            let code = match e {
                VersionError::Io(_) => ExitCode::IoError,
                _ => ExitCode::ArgsError,
            };
            let message = format!("{}: {}", file.display(), e);
            output_error(global, "version", &message, code)
        }
    }
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Init => run_config_init(global),
        ConfigCommands::Show => run_config_show(global),
        ConfigCommands::Validate => run_config_validate(global),
    }
}

fn run_config_init(global: &GlobalOpts) -> ExitCode {
    let location = resolve_config_path(global.config.as_deref(), &executable_dir());
    let status = match write_template(&location.path) {
        Ok(()) => "created",
        Err(ConfigError::AlreadyExists { .. }) => "exists",
        Err(e) => return output_error(global, "config init", &e.to_string(), config_exit_code(&e)),
    };
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": location.path,
            "source": location.source.to_string(),
            "status": status,
        })),
        OutputFormat::Human => {
            println!("{}: {}", location.path.display(), status);
            ExitCode::Clean
        }
    }
}

fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let ctx = new_context();
    let loaded = match load(global, &ctx, "config show") {
        Ok(l) => l,
        Err(code) => return code,
    };
    let snapshot = ConfigSnapshot::capture(&loaded);
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "snapshot": snapshot,
            "config": loaded.config,
            "notices": loaded.notices,
        })),
        OutputFormat::Human => match toml::to_string_pretty(&loaded.config) {
            Ok(rendered) => {
                println!("# {} ({})", snapshot.path, snapshot.source);
                println!("# sha256 {}", snapshot.content_hash);
                for notice in &loaded.notices {
                    println!("# warning: {}", notice);
                }
                print!("{}", rendered);
                ExitCode::Clean
            }
            Err(e) => output_error(global, "config show", &e.to_string(), ExitCode::InternalError),
        },
    }
}

fn run_config_validate(global: &GlobalOpts) -> ExitCode {
    let ctx = new_context();
    let loaded = match load(global, &ctx, "config validate") {
        Ok(l) => l,
        Err(code) => return code,
    };
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": loaded.location.path,
            "valid": true,
            "warnings": loaded.notices,
        })),
        OutputFormat::Human => {
            println!("{}: valid", loaded.location.path.display());
            for notice in &loaded.notices {
                println!("  warning: {}", notice);
            }
            ExitCode::Clean
        }
    }
}
