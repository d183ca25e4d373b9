use crate::config::{ControlPolicy, OutputLayout, SessionConfig, app_name, app_version};
use crate::display::{PresentationSink, SnapshotSink, StatsSink};
use crate::pipeline::MediaSession;
use crate::transport::StreamSource;
use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod decoder;
pub mod display;
pub mod pipeline;
pub mod protocol;
pub mod transport;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // exit immediately on SIGINT, SIGTERM or SIGHUP; the OS reclaims the session
    if let Err(e) = ctrlc::set_handler(move || {
        process::exit(130);
    }) {
        log::warn!("Failed to set Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(cli().get_matches()) {
        log::error!("{:#}", e);
        process::exit(1);
    }
}

fn cli() -> Command {
    Command::new(app_name())
        .version(app_version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("addr")
                .short('a')
                .long("addr")
                .value_name("HOST:PORT")
                .help("Media server to receive from.")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON session configuration.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("frames")
                .short('n')
                .long("frames")
                .value_name("COUNT")
                .help("Stop after presenting this many frames.")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("snapshot-dir")
                .long("snapshot-dir")
                .value_name("DIR")
                .help("Write presented frames as PPM images into DIR.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("snapshot-every")
                .long("snapshot-every")
                .value_name("N")
                .help("Only snapshot every Nth frame.")
                .value_parser(value_parser!(u64))
                .default_value("30"),
        )
        .arg(
            Arg::new("fatal-control")
                .long("fatal-control")
                .help("Stop the session on any control packet.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .help("Scale output frames to this width.")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .help("Scale output frames to this height.")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("rgb")
                .long("rgb")
                .help("Present RGB instead of BGR pixel order.")
                .action(ArgAction::SetTrue),
        )
}

fn session_config(matches: &ArgMatches) -> anyhow::Result<SessionConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };

    if matches.get_flag("fatal-control") {
        config.control_policy = ControlPolicy::Fatal;
    }
    if matches.get_flag("rgb") {
        config.output.layout = OutputLayout::Rgb24;
    }
    if let Some(width) = matches.get_one::<usize>("width") {
        config.output.width = Some(*width);
    }
    if let Some(height) = matches.get_one::<usize>("height") {
        config.output.height = Some(*height);
    }
    Ok(config)
}

fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let config = session_config(&matches)?;
    let addr = matches
        .get_one::<String>("addr")
        .context("missing --addr")?;
    let limit = matches.get_one::<u64>("frames").copied();

    let source = StreamSource::connect(addr.as_str())
        .with_context(|| format!("connecting to {}", addr))?;
    let stats = StatsSink::new(limit);

    match matches.get_one::<PathBuf>("snapshot-dir") {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating snapshot dir {}", dir.display()))?;
            let every = matches.get_one::<u64>("snapshot-every").copied().unwrap_or(30);
            let (result, snapshots) =
                run_session(config, source, SnapshotSink::new(stats, dir, every));
            log::info!("Wrote {} snapshots to {}", snapshots.written(), dir.display());
            log::info!("Presented {} frames", snapshots.into_inner().frames());
            result
        }
        None => {
            let (result, stats) = run_session(config, source, stats);
            log::info!("Presented {} frames", stats.frames());
            result
        }
    }
}

/// Run the session to completion and hand the sink back for reporting.
fn run_session<K: PresentationSink>(
    config: SessionConfig,
    source: StreamSource<std::net::TcpStream>,
    sink: K,
) -> (anyhow::Result<()>, K) {
    let mut session = MediaSession::new(config, source, sink);
    let result = session
        .run()
        .map(|_| ())
        .context("media session ended");

    let (source, sink) = session.into_parts();
    log::info!(
        "Transport: {} packets, {} bytes",
        source.packets(),
        source.bytes()
    );
    (result, sink)
}
