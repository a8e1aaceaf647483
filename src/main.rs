//! wasi-prep command line entry point

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

use wasi_prep::config::{
    self, EnvSource, FlagInputs, HostGenInputs, PatchInputs, ProcessEnv, ENV_LOG,
};
use wasi_prep::log_collector::{level_from_verbosity, parse_level};
use wasi_prep::models::{DependencyFamily, FetchOutcome, FlagField};
use wasi_prep::{orchestrator, system, toolchain, AppError, ConfigError, LogCollector};

#[derive(Debug, Parser)]
#[command(name = "wasi-prep")]
#[command(version, about = "Prepare vendored native dependencies for a wasm32-wasi build.", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Repository root (default: nearest ancestor containing patches/wasi-shim)
    #[arg(long, global = true)]
    repo_root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download and extract a toolchain archive, skipping work already done
    Fetch(FetchArgs),
    /// Print one WASI flag preset on stdout
    Flags(FlagsArgs),
    /// Patch a vendored dependency tree for WASI
    Patch(PatchArgs),
    /// Run a code generator with the host Lua and nlua
    HostLuaGen(HostLuaGenArgs),
}

#[derive(Debug, Args)]
struct FetchArgs {
    /// URL to download
    #[arg(long)]
    url: String,

    /// Local archive path
    #[arg(long)]
    archive: PathBuf,

    /// Directory to extract into
    #[arg(long)]
    dest: PathBuf,

    /// Path that exists once extraction has completed
    #[arg(long)]
    expected: PathBuf,
}

#[derive(Debug, Args)]
struct FlagsArgs {
    #[arg(long, value_enum)]
    field: FlagField,

    /// Patch directory (default: <repo-root>/patches)
    #[arg(long)]
    patch_dir: Option<PathBuf>,

    /// WASI sysroot (default: <repo-root>/.toolchains/wasi-sdk/share/wasi-sysroot)
    #[arg(long)]
    sysroot: Option<PathBuf>,

    /// Exception/unwind flags to prepend
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    eh: String,
}

#[derive(Debug, Args)]
struct PatchArgs {
    #[arg(value_enum)]
    family: DependencyFamily,

    /// Deps build root containing src/<family> (env: DEPS_BUILD_DIR)
    #[arg(long)]
    build_dir: Option<String>,

    /// Deps install prefix (env: DEPS_INSTALL_DIR)
    #[arg(long)]
    install_dir: Option<String>,

    /// Cross compiler path (env: LUA_WASM_CC)
    #[arg(long)]
    cc: Option<String>,

    /// Compile flags to apply (env: LUA_WASM_CFLAGS)
    #[arg(long, allow_hyphen_values = true)]
    cflags: Option<String>,

    /// Link flags to apply (env: LUA_WASM_LDFLAGS)
    #[arg(long, allow_hyphen_values = true)]
    ldflags: Option<String>,

    /// Source dir (default: <build-dir>/src/<family>)
    #[arg(long)]
    src: Option<PathBuf>,

    /// Ignore the applied-step ledger
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct HostLuaGenArgs {
    preload: String,
    srcdir: String,
    nlua_arg: String,
    gendir: String,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli, &ProcessEnv) {
        eprintln!("[Main] WARNING: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (code, message) = failure(&err);
            log::error!("{}", message);
            ExitCode::from(code)
        }
    }
}

/// Exit code and diagnostic for a failed run
fn failure(err: &anyhow::Error) -> (u8, String) {
    match err.downcast_ref::<AppError>() {
        Some(app) => (app.exit_code(), app.user_message()),
        None => (1, format!("{:#}", err)),
    }
}

fn init_logging(cli: &Cli, env: &dyn EnvSource) -> Result<(), String> {
    let level = if cli.verbose > 0 {
        level_from_verbosity(cli.verbose)
    } else {
        env.var(ENV_LOG)
            .and_then(|v| parse_level(&v))
            .unwrap_or_else(|| level_from_verbosity(0))
    };
    LogCollector::new(level, cli.log_file.as_deref())?.install()
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let env = ProcessEnv;

    match cli.cmd {
        Command::Fetch(args) => cmd_fetch(args)?,
        Command::Flags(args) => cmd_flags(args, cli.repo_root, &cwd)?,
        Command::Patch(args) => cmd_patch(args, &env)?,
        Command::HostLuaGen(args) => cmd_host_lua_gen(args, cli.repo_root, &cwd, &env)?,
    }
    Ok(())
}

fn cmd_fetch(args: FetchArgs) -> Result<(), AppError> {
    let settings = config::resolve_fetch(&args.url, args.archive, args.dest, args.expected)?;
    let job = &settings.job;
    let outcome = toolchain::fetch_and_extract(
        &job.url,
        &job.archive_path,
        &job.dest_dir,
        &job.expected_marker,
    )?;

    match outcome {
        FetchOutcome::AlreadyExtracted => {}
        FetchOutcome::Extracted { downloaded, format } => log::info!(
            "[Fetch] Extracted {} archive{}",
            format,
            downloaded
                .map(|n| format!(" ({} bytes downloaded)", n))
                .unwrap_or_default()
        ),
    }
    Ok(())
}

fn cmd_flags(args: FlagsArgs, repo_root: Option<PathBuf>, cwd: &Path) -> Result<(), AppError> {
    let repo = config::resolve_repo(repo_root, cwd);
    let settings = config::resolve_flags(
        FlagInputs {
            field: args.field,
            patch_dir: args.patch_dir,
            sysroot: args.sysroot,
            eh: args.eh,
        },
        &repo,
    );

    let patch_dir = std::fs::canonicalize(&settings.patch_dir)
        .or_else(|_| std::path::absolute(&settings.patch_dir))
        .map_err(ConfigError::IoError)?;
    let flags = toolchain::compose(&patch_dir, &settings.sysroot, &settings.eh);
    println!("{}", flags.get(settings.field));
    Ok(())
}

fn cmd_patch(args: PatchArgs, env: &dyn EnvSource) -> Result<(), AppError> {
    let inputs = PatchInputs {
        build_dir: args.build_dir,
        install_dir: args.install_dir,
        cc: args.cc,
        cflags: args.cflags,
        ldflags: args.ldflags,
        src: args.src,
        force: args.force,
    };
    let settings = config::resolve_patch(args.family, &inputs, env)?;
    orchestrator::patch_tree(
        &settings.tree_root,
        settings.family,
        &settings.ctx,
        settings.force,
    )?;
    Ok(())
}

fn cmd_host_lua_gen(
    args: HostLuaGenArgs,
    repo_root: Option<PathBuf>,
    cwd: &Path,
    env: &dyn EnvSource,
) -> Result<(), AppError> {
    let repo = config::resolve_repo(repo_root, cwd);
    let settings = config::resolve_host_gen(
        HostGenInputs {
            preload: args.preload,
            srcdir: args.srcdir,
            nlua_arg: args.nlua_arg,
            gendir: args.gendir,
            extra: args.extra,
        },
        &repo,
        env,
    );
    system::run_host_lua_gen(&settings)?;
    Ok(())
}
