use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use claudeman::common::config::{
    split_port_and_message, ListenerConfig, SenderConfig, Volume, DEFAULT_HOST, DEFAULT_MESSAGE,
    DEFAULT_PORT, SESSION_ENV,
};
use claudeman::common::cooldown::{run_gated, Gate, DEFAULT_COOLDOWN, DEFAULT_LOCK_TTL};
use claudeman::common::logging::{init_logging, is_debug_enabled};
use claudeman::common::persistence::{default_state_dir, FileTimestampStore};
use claudeman::daemon::notifier::{is_notification_available, DesktopSink, LogSink};
use claudeman::daemon::server::RelayServer;
use claudeman::ipc::client::send_with;
use claudeman::ipc::messages::{Event, EventType};
use colored::Colorize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "claudeman")]
#[command(about = "Relay coding-assistant events from a container to desktop notifications")]
struct Cli {
    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the notification listener on the host
    Listen(ListenArgs),
    /// Send one event to the listener
    Notify(NotifyArgs),
    /// Run a command unless the same lock key fired within the TTL
    Dedup(DedupArgs),
    /// Rate-limit notifications per terminal window
    Cooldown(CooldownArgs),
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Listener port
    #[arg(short, long, env = "CLAUDEMAN_PORT")]
    port: Option<u16>,

    /// Announcement volume 0-100, or "auto" to leave the system volume alone
    #[arg(short, long, env = "CLAUDEMAN_VOLUME", default_value = "auto")]
    volume: Volume,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Drop senders that go silent this many ms before closing their side
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Log notifications instead of rendering them
    #[arg(long)]
    dry_run: bool,

    /// Port, positional form kept for older launch scripts
    #[arg(value_name = "PORT", conflicts_with = "port")]
    legacy_port: Option<u16>,
}

#[derive(Args, Debug)]
struct NotifyArgs {
    /// Event type: complete, question, idle or info
    #[arg(short = 't', long = "type", default_value = "complete")]
    event_type: String,

    /// Message body
    #[arg(short, long)]
    message: Option<String>,

    /// Listener host
    #[arg(long, env = "CLAUDEMAN_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Listener port
    #[arg(short, long, env = "CLAUDEMAN_PORT")]
    port: Option<u16>,

    /// Terminal window id to focus
    #[arg(long, env = SESSION_ENV, default_value = "")]
    session: String,

    /// Give up after this many ms
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    /// Legacy form: [PORT] [MESSAGE...]
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    positional: Vec<String>,
}

#[derive(Args, Debug)]
struct DedupArgs {
    /// Lock name, e.g. "question-$WINID"
    key: String,

    /// Lock lifetime in ms
    #[arg(long, default_value_t = DEFAULT_LOCK_TTL.as_millis() as u64)]
    ttl_ms: u64,

    /// Directory holding lock files
    #[arg(long, env = "CLAUDEMAN_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Command to run, with or without a leading `--`
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Args, Debug)]
struct CooldownArgs {
    /// Gate key; defaults to the window id
    #[arg(env = SESSION_ENV, default_value = "default")]
    key: String,

    /// Minimum gap between allowed triggers in ms
    #[arg(long, default_value_t = DEFAULT_COOLDOWN.as_millis() as u64)]
    window_ms: u64,

    /// Directory holding cooldown state
    #[arg(long, env = "CLAUDEMAN_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Command to run when allowed; without one, exit 0 = allowed, 1 = suppressed
    #[arg(last = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let code = match cli.command {
        Commands::Listen(args) => listen(args)?,
        Commands::Notify(args) => notify(args)?,
        Commands::Dedup(args) => dedup(args)?,
        Commands::Cooldown(args) => cooldown(args)?,
    };
    std::process::exit(code);
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn listen(args: ListenArgs) -> Result<i32> {
    let config = ListenerConfig {
        bind: args.bind,
        port: args.port.or(args.legacy_port).unwrap_or(DEFAULT_PORT),
        volume: args.volume,
        read_timeout: args.read_timeout_ms.map(Duration::from_millis),
    };

    ctrlc::set_handler(|| {
        tracing::info!("stopping listener");
        std::process::exit(0);
    })
    .context("Error setting Ctrl-C handler")?;

    let rt = runtime()?;
    let result = if args.dry_run {
        rt.block_on(RelayServer::new(config, LogSink).run())
    } else {
        if !is_notification_available() {
            tracing::warn!("no desktop notifier found; events will be acknowledged but not shown");
        }
        rt.block_on(RelayServer::new(config, DesktopSink).run())
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            tracing::error!("{}", e);
            Ok(1)
        }
    }
}

fn notify(args: NotifyArgs) -> Result<i32> {
    let (legacy_port, legacy_message) = split_port_and_message(&args.positional);
    let config = SenderConfig {
        host: args.host,
        port: args.port.or(legacy_port).unwrap_or(DEFAULT_PORT),
        timeout: Duration::from_millis(args.timeout_ms),
    };
    let message = args
        .message
        .or(legacy_message)
        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
    let event = Event::new(EventType::parse(&args.event_type), args.session, message);

    println!(
        "Triggering listener at {}:{} with message: '{}'",
        config.host, config.port, event.message
    );
    if is_debug_enabled() {
        println!("Payload: {:?}", event.encode());
    }

    let rt = runtime()?;
    match rt.block_on(send_with(&config, &event)) {
        Ok(delivered) => {
            tracing::debug!(
                acknowledged = delivered.acknowledged,
                elapsed_ms = delivered.elapsed.as_millis() as u64,
                "delivered"
            );
            println!("{}", "✅ Successfully triggered listener!".green());
            Ok(0)
        }
        Err(e) => {
            eprintln!("{} {}", "❌ Failed to reach listener:".red(), e);
            Ok(1)
        }
    }
}

fn dedup(args: DedupArgs) -> Result<i32> {
    let dir = args.state_dir.unwrap_or_else(default_state_dir);
    let gate = Gate::new(FileTimestampStore::locks(dir));
    let (program, rest) = args
        .command
        .split_first()
        .context("No command given")?;

    run_gated(&gate, &args.key, Duration::from_millis(args.ttl_ms), program, rest)
        .with_context(|| format!("Failed to run {}", program))
}

fn cooldown(args: CooldownArgs) -> Result<i32> {
    let dir = args.state_dir.unwrap_or_else(default_state_dir);
    let gate = Gate::new(FileTimestampStore::cooldown(dir));
    let window = Duration::from_millis(args.window_ms);

    match args.command.split_first() {
        Some((program, rest)) => run_gated(&gate, &args.key, window, program, rest)
            .with_context(|| format!("Failed to run {}", program)),
        None => Ok(if gate.should_proceed(&args.key, window) { 0 } else { 1 }),
    }
}
