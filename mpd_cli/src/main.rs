use clap::{Parser, Subcommand};
use colored::*;
use mpd_cli::config::{AppConfig, CliOverrides, ConfigManager, LogLevel, interactive_init};
use mpd_cli::error::{CliError, CliResult};
use mpd_cli::output::{OutputFormat, create_formatter};
use mpd_cli::password::PasswordSource;
use mpd_cli::session::{Session, WatchOptions, install_signal_handler};
use mpd_cli::{paths, terminal};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mpdinfo")]
#[command(author, version, about = "MPD now-playing monitor with cover art", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Log verbosity
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// MPD server IPv4 address
    #[arg(long, global = true)]
    host: Option<String>,

    /// MPD server port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Use this config file instead of the default one
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Hide the track title
    #[arg(long, global = true, visible_alias = "disable-show-title")]
    no_title: bool,

    /// Hide the artist
    #[arg(long, global = true, visible_alias = "disable-show-artist")]
    no_artist: bool,

    /// Hide the album
    #[arg(long, global = true, visible_alias = "disable-show-album")]
    no_album: bool,

    /// Hide the file path
    #[arg(long, global = true, visible_alias = "disable-show-filename")]
    no_filename: bool,

    /// Hide the progress bar and times
    #[arg(long, global = true, visible_alias = "disable-show-percentage")]
    no_progress: bool,

    /// Prompt for the password when the server asks for one
    #[arg(long, global = true)]
    pprompt: bool,

    /// Read the password from the first line of a file
    #[arg(long, global = true, value_name = "PATH")]
    pfile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the current track until interrupted
    Watch {
        /// Save cover art as <DIR>/cover.<ext> (default DIR: the data directory)
        #[arg(long, value_name = "DIR", num_args = 0..=1)]
        art_dir: Option<Option<PathBuf>>,

        /// Exit once the first track's art is saved or known missing
        #[arg(long)]
        once_art: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the current track once
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Give up if no status arrives within this many milliseconds
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a config file, prompting for the connection when interactive
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the config file location
    Path,

    /// Get a configuration value
    Get {
        /// Configuration key (e.g., connection.port)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., connection.port)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,
}

fn main() {
    let cli = Cli::parse();
    let debug = cli.debug;

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_user(debug));
        std::process::exit(e.exit_code().code());
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // A broken file must not lock out the commands that repair it
    let mut config = match (&cli.command, manager.load()) {
        (_, Ok(config)) => config,
        (Commands::Config { .. }, Err(_)) => AppConfig::default(),
        (_, Err(e)) => return Err(CliError::config(&format!("{e:#}"))),
    };

    config.apply_cli_overrides(&CliOverrides {
        host: cli.host.clone(),
        port: cli.port,
        log_level: cli.log_level,
        password_file: cli.pfile.clone(),
        no_color: cli.no_color,
        no_title: cli.no_title,
        no_artist: cli.no_artist,
        no_album: cli.no_album,
        no_filename: cli.no_filename,
        no_progress: cli.no_progress,
    });

    init_logging(config.log_level, cli.debug);
    log::debug!("Effective configuration: {config:?}");

    let use_color = terminal::should_use_color(config.display.color);
    if !use_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Watch {
            art_dir,
            once_art,
            format,
        } => {
            let mut session = open_session(&config, cli.pprompt)?;
            let options = WatchOptions {
                art_dir: art_dir.map(|dir| dir.unwrap_or_else(paths::get_art_dir)),
                once_art,
                update_interval: Duration::from_millis(config.display.update_interval_ms),
            };
            let formatter = create_formatter(format, use_color, &config.display);
            session.watch(formatter.as_ref(), &options, &mut io::stdout())
        }
        Commands::Status { format, timeout_ms } => {
            let mut session = open_session(&config, cli.pprompt)?;
            let view = session.poll_once(Duration::from_millis(timeout_ms))?;
            let formatter = create_formatter(format, use_color, &config.display);
            println!("{}", formatter.format(&view)?.trim_end());
            Ok(())
        }
        Commands::Config { command } => config_command(command, manager),
    }
}

/// Initialize logging; `RUST_LOG` takes precedence over the configured level
fn init_logging(level: LogLevel, debug: bool) {
    let level = if debug { LogLevel::Debug } else { level };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.filter()).format_timestamp_millis();
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();

    if debug {
        eprintln!("Debug logging enabled");
    }
}

fn open_session(config: &AppConfig, prompt: bool) -> CliResult<Session> {
    let password = PasswordSource::select(prompt, config.password_file.clone());
    let shutdown = install_signal_handler()?;
    Session::new(config.connection.clone(), password, shutdown)
}

fn config_command(command: ConfigCommand, mut manager: ConfigManager) -> CliResult<()> {
    let config_error = |e: anyhow::Error| CliError::config(&format!("{e:#}"));

    match command {
        ConfigCommand::Init { force } => {
            interactive_init(&manager, force).map_err(config_error)?;
        }
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
        ConfigCommand::Get { key } => {
            let value = manager.get(&key).map_err(config_error)?;
            println!("{value}");
        }
        ConfigCommand::Set { key, value } => {
            manager.set(&key, &value).map_err(config_error)?;
            eprintln!("{}", format!("Set {key} = {value}").green());
            eprintln!(
                "Configuration saved to: {}",
                manager.get_config_path().display()
            );
        }
        ConfigCommand::List => {
            let items = manager.list().map_err(config_error)?;
            eprintln!("Config file: {}", manager.get_config_path().display());

            // Group items by section; top-level keys go under [general]
            let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
            for (key, value) in items {
                let (section, name) = key
                    .split_once('.')
                    .map(|(s, n)| (s.to_string(), n.to_string()))
                    .unwrap_or_else(|| ("general".to_string(), key.clone()));
                sections.entry(section).or_default().push((name, value));
            }

            for (section, items) in sections {
                println!("[{}]", section.yellow());
                for (key, value) in items {
                    println!("  {} = {}", key.cyan(), value);
                }
                println!();
            }
        }
    }

    Ok(())
}
