//! # matterbuild
//!
//! Command-line front end for [`matterbuild_sdk`]: builds Matter example
//! apps for Android, Bouffalo Lab and NXP i.MX targets, and sends control
//! commands to the test accessory server.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `targets` | List boards and apps per target family |
//! | `android` | Build an Android app (JNI libraries + APK) |
//! | `bouffalolab` | Build Bouffalo Lab firmware |
//! | `imx` | Build an i.MX Linux example |
//! | `bridge` | Send one command to the accessory server |
//!
//! ## Quick Start
//!
//! ```bash
//! # Show what an Android build would run, without running it
//! matterbuild android --board arm64 --app chip-tool --dry-run
//!
//! # Build i.MX lighting app in release mode and collect the binaries
//! matterbuild imx --app light --release --copy-artifacts-to artifacts/
//!
//! # Start the accessory under test
//! matterbuild bridge start --param discriminator=3840 --param port=5540
//! ```
//!
//! ## CLI Flags
//!
//! Build commands share:
//!
//! - **`--root`** - Source checkout (default: config, then current directory)
//! - **`--output-prefix`** - Where output directories go (default: `<root>/out`)
//! - **`--dry-run`** - Print the commands as a shell script instead of running them
//! - **`--dry-run-output`** - Write the dry-run script to a file instead of stdout
//! - **`--skip-build`** - Only generate the build configuration
//! - **`--copy-artifacts-to`** - Copy build outputs into a directory
//!
//! Global flags:
//!
//! - **`--verbose` / `-v`** - Log every command line
//!
//! Environment variables may be kept in `<root>/.env.local`.
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `matterbuild.toml`

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use matterbuild_sdk::bridge::{
    AccessoryServerBridge, BridgeOperation, BridgeRequest, DEFAULT_HOST, DEFAULT_PORT,
    RequestValue,
};
use matterbuild_sdk::builders::android::{AndroidApp, AndroidBoard};
use matterbuild_sdk::builders::bouffalolab::{
    BouffalolabApp, BouffalolabBoard, BouffalolabOptions,
};
use matterbuild_sdk::builders::imx::ImxApp;
use matterbuild_sdk::builders::{AndroidBuilder, BouffalolabBuilder, Builder, ImxBuilder};
use matterbuild_sdk::runner::{PrintOnlyRunner, Runner, ShellRunner};
use matterbuild_sdk::BuildProfile;

pub mod config;

use config::ConfigResolver;

/// Builds Matter example apps and drives the test accessory server.
#[derive(Parser, Debug)]
#[command(name = "matterbuild", author, version, about = "Matter example app build driver", long_about = None)]
struct Cli {
    /// Log every command line and its output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List boards and apps for every target family.
    Targets,
    /// Build an Android app.
    Android {
        #[arg(long)]
        board: AndroidBoard,
        #[arg(long)]
        app: AndroidApp,
        #[arg(long, help = "Build with is_debug=false and strip shared libraries")]
        release: bool,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build Bouffalo Lab firmware.
    Bouffalolab {
        #[arg(long, default_value = "BL706-IoT-DVK")]
        board: BouffalolabBoard,
        #[arg(long, default_value = "light")]
        app: BouffalolabApp,
        #[arg(long, default_value = "BL706C-22", help = "Module type; BL70* selects the BL702 chip")]
        module_type: String,
        #[arg(long, default_value_t = 2_000_000)]
        baudrate: u32,
        #[arg(long, help = "Build with Pigweed RPC support")]
        enable_rpcs: bool,
        #[arg(long, help = "Build with the CHIP shell (ignored with --enable-rpcs)")]
        enable_shell: bool,
        #[arg(long, help = "Use the USB CDC console (BL702 only)")]
        enable_cdc: bool,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build an NXP i.MX Linux example against $IMX_SDK_ROOT.
    Imx {
        #[arg(long)]
        app: ImxApp,
        #[arg(long)]
        release: bool,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Send one command to the test accessory server.
    Bridge {
        /// start, stop, reboot, factory_reset, wait_for_message,
        /// create_ota_image or compare_files
        operation: BridgeOperation,
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<RequestValue>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Args, Debug, Clone)]
struct BuildArgs {
    #[arg(long, help = "Root of the source checkout")]
    root: Option<PathBuf>,
    #[arg(long, help = "Directory output directories are created in")]
    output_prefix: Option<PathBuf>,
    #[arg(long, help = "Print commands instead of running them")]
    dry_run: bool,
    #[arg(long, requires = "dry_run", help = "Write the dry-run script to this file")]
    dry_run_output: Option<PathBuf>,
    #[arg(long, help = "Only generate build configuration")]
    skip_build: bool,
    #[arg(long, help = "Copy build outputs into this directory")]
    copy_artifacts_to: Option<PathBuf>,
}

/// Build context resolved from CLI flags, config and environment.
struct BuildContext {
    root: PathBuf,
    output_prefix: Option<PathBuf>,
    runner: Arc<dyn Runner>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let resolver = ConfigResolver::new()?;

    match cli.command {
        Command::Targets => {
            print_targets();
            Ok(())
        }
        Command::Android {
            board,
            app,
            release,
            build,
        } => {
            let ctx = build_context(&resolver, &build)?;
            let profile = if release {
                BuildProfile::Release
            } else {
                BuildProfile::Debug
            };
            let mut builder = AndroidBuilder::new(&ctx.root, ctx.runner, board, app, profile);
            if let Some(prefix) = &ctx.output_prefix {
                builder = builder.output_prefix(prefix);
            }
            run_build(&builder, &build)
        }
        Command::Bouffalolab {
            board,
            app,
            module_type,
            baudrate,
            enable_rpcs,
            enable_shell,
            enable_cdc,
            build,
        } => {
            let ctx = build_context(&resolver, &build)?;
            let options = BouffalolabOptions {
                app,
                board,
                module_type,
                baudrate,
                enable_rpcs,
                enable_shell,
                enable_cdc,
            };
            let mut builder = BouffalolabBuilder::new(&ctx.root, ctx.runner, options)
                .context("configuring Bouffalo Lab build")?;
            if let Some(prefix) = &ctx.output_prefix {
                builder = builder.output_prefix(prefix);
            }
            run_build(&builder, &build)
        }
        Command::Imx {
            app,
            release,
            build,
        } => {
            let ctx = build_context(&resolver, &build)?;
            let mut builder = ImxBuilder::new(&ctx.root, ctx.runner, app, release);
            if let Some(prefix) = &ctx.output_prefix {
                builder = builder.output_prefix(prefix);
            }
            run_build(&builder, &build)
        }
        Command::Bridge {
            operation,
            params,
            host,
            port,
        } => run_bridge(&resolver, operation, params, host, port),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn build_context(resolver: &ConfigResolver, args: &BuildArgs) -> Result<BuildContext> {
    let root = resolver.root(args.root.clone())?;
    load_dotenv(&root);

    let runner: Arc<dyn Runner> = if args.dry_run {
        match &args.dry_run_output {
            Some(path) => {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("creating dry-run output {:?}", path))?;
                Arc::new(PrintOnlyRunner::with_output(file))
            }
            None => Arc::new(PrintOnlyRunner::with_output(std::io::stdout())),
        }
    } else {
        Arc::new(ShellRunner::new().current_dir(&root))
    };

    Ok(BuildContext {
        output_prefix: resolver.output_prefix(args.output_prefix.clone()),
        root,
        runner,
    })
}

fn load_dotenv(root: &Path) {
    let path = root.join(".env.local");
    if dotenvy::from_path(&path).is_ok() {
        tracing::debug!("Loaded environment from {}", path.display());
    }
}

fn run_build(builder: &dyn Builder, args: &BuildArgs) -> Result<()> {
    let id = builder.identifier().to_string();

    builder
        .generate()
        .with_context(|| format!("generating {}", id))?;

    if args.skip_build {
        tracing::info!("Skipping build of {} (--skip-build)", id);
        return Ok(());
    }

    builder.build().with_context(|| format!("building {}", id))?;

    let outputs = builder
        .build_outputs()
        .with_context(|| format!("listing outputs of {}", id))?;
    for (label, path) in &outputs {
        tracing::info!("{}: {}", label, path.display());
    }

    if let Some(dir) = &args.copy_artifacts_to {
        builder
            .copy_artifacts(dir)
            .with_context(|| format!("copying artifacts of {} to {:?}", id, dir))?;
    }
    Ok(())
}

fn run_bridge(
    resolver: &ConfigResolver,
    operation: BridgeOperation,
    params: Vec<RequestValue>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let bridge_config = resolver.bridge();
    let host = host
        .or(bridge_config.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = resolver.resolve(port, |c| c.bridge.port, DEFAULT_PORT);

    let mut request = BridgeRequest { values: params };
    if let Some(key) = bridge_config.register_key {
        if request.get("registerKey").is_none() {
            request = request.with("registerKey", key);
        }
    }

    let bridge = AccessoryServerBridge::new(&host, port);
    bridge
        .execute(operation, &request)
        .with_context(|| format!("{} on accessory server {}:{}", operation.as_str(), host, port))?;
    println!("{} ok", operation.as_str());
    Ok(())
}

fn print_targets() {
    println!("android");
    println!(
        "  boards: {}",
        join(AndroidBoard::ALL.iter().map(|b| b.as_str()))
    );
    println!(
        "  apps:   {}",
        join(AndroidApp::ALL.iter().map(|a| a.as_str()))
    );
    println!("bouffalolab");
    println!(
        "  boards: {}",
        join(BouffalolabBoard::ALL.iter().map(|b| b.gn_arg_name()))
    );
    println!(
        "  apps:   {}",
        join(BouffalolabApp::ALL.iter().map(|a| a.as_str()))
    );
    println!("imx");
    println!("  apps:   {}", join(ImxApp::ALL.iter().map(|a| a.as_str())));
    println!("bridge");
    println!(
        "  operations: {}",
        join(BridgeOperation::ALL.iter().map(|o| o.as_str()))
    );
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
