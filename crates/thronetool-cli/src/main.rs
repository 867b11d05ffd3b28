mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{Context, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;
use thronetool_core::{install_signal_handler, ReinstallOptions};
use thronetool_schema::{AppIdentity, Platform, ToolConfig};

/// Environment variable selecting the platform adapter (`system` or `mock`).
const ADAPTER_ENV: &str = "THRONETOOL_ADAPTER";
const SKIP_PREREQS_ENV: &str = "THRONETOOL_SKIP_PREREQS";

#[derive(Debug, Parser)]
#[command(
    name = "throne-tool",
    version,
    about = "Install, back up, restore and remove the Throne and NekoRay proxy clients"
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Platform adapter: `system` or `mock`.
    #[arg(long, global = true, hide = true)]
    adapter: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install the latest upstream release.
    Install {
        #[arg(long, default_value = "throne")]
        app: AppIdentity,
        /// Replace a broken installation.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Archive the app's configuration directory.
    Backup {
        #[arg(long)]
        app: AppIdentity,
        /// Archive file to create, or a directory to create it in.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the app's configuration with a backup archive.
    Restore {
        #[arg(long)]
        app: AppIdentity,
        /// Backup archive to restore from (the .tar.gz written by `backup`).
        #[arg(long = "zip", visible_alias = "archive")]
        archive: PathBuf,
    },
    /// Uninstall the app and its configuration.
    Remove {
        #[arg(long)]
        app: AppIdentity,
    },
    /// Remove and install again, optionally keeping the configuration.
    Reinstall {
        #[arg(long)]
        app: AppIdentity,
        /// Back up the configuration first and restore it afterwards.
        #[arg(long, default_value_t = false)]
        backup: bool,
        /// Where to write the backup archive.
        #[arg(long, requires = "backup")]
        output: Option<PathBuf>,
        /// Continue if the backup fails; replace a broken installation.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Show install state, paths and version.
    ///
    /// Exits 0 whether the app is installed, broken or absent. Fails only
    /// when this host's directories cannot be resolved (for example, Windows
    /// without APPDATA).
    Info {
        #[arg(long)]
        app: AppIdentity,
    },
    /// Share the proxy's tun interface over a Wi-Fi hotspot.
    Hotspot {
        #[command(subcommand)]
        action: HotspotAction,
    },
    /// Check platform prerequisites and show resolved paths.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages into a directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum HotspotAction {
    /// Start the hotspot and route its clients through the tun interface.
    Enable {
        /// Wi-Fi interface (detected when omitted).
        #[arg(long)]
        iface: Option<String>,
        /// Network name (default from config).
        #[arg(long)]
        ssid: Option<String>,
        /// WPA password, at least 8 characters (prompted when omitted).
        #[arg(long)]
        password: Option<String>,
        /// Print the commands instead of running them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Stop the hotspot and drop its NAT rules.
    Disable {
        /// Print the commands instead of running them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("THRONETOOL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let config = match ToolConfig::load_from(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    let adapter = cli
        .adapter
        .or_else(|| std::env::var(ADAPTER_ENV).ok().filter(|a| !a.is_empty()))
        .unwrap_or_else(|| "system".to_owned());
    let ctx = Context {
        config,
        adapter,
        json: cli.json,
    };

    let needs_native_tools = matches!(
        cli.command,
        Commands::Install { .. } | Commands::Remove { .. } | Commands::Reinstall { .. }
    );
    if needs_native_tools
        && ctx.adapter == "system"
        && std::env::var(SKIP_PREREQS_ENV).as_deref() != Ok("1")
    {
        if let Ok(platform) = Platform::current() {
            let missing = thronetool_runtime::check_install_prereqs(platform);
            if !missing.is_empty() {
                eprintln!("error: {}", thronetool_runtime::format_missing(&missing));
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    }

    let result = match cli.command {
        Commands::Install { app, force } => commands::install::run(&ctx, app, force),
        Commands::Backup { app, output } => commands::backup::run(&ctx, app, output.as_deref()),
        Commands::Restore { app, archive } => commands::restore::run(&ctx, app, &archive),
        Commands::Remove { app } => commands::remove::run(&ctx, app),
        Commands::Reinstall {
            app,
            backup,
            output,
            force,
        } => commands::reinstall::run(
            &ctx,
            app,
            &ReinstallOptions {
                backup,
                output,
                force,
            },
        ),
        Commands::Info { app } => commands::info::run(&ctx, app),
        Commands::Hotspot { action } => match action {
            HotspotAction::Enable {
                iface,
                ssid,
                password,
                dry_run,
            } => commands::hotspot::enable(
                &ctx,
                commands::hotspot::EnableArgs {
                    iface,
                    ssid,
                    password,
                    dry_run,
                },
            ),
            HotspotAction::Disable { dry_run } => commands::hotspot::disable(&ctx, dry_run),
        },
        Commands::Doctor => commands::doctor::run(&ctx),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
