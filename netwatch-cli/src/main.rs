mod config;

use std::io::Read;
use std::process::ExitCode;

use clap::Parser;
use netwatch::capture::pcap::PcapFileSource;
use netwatch::capture::CaptureSource;
use netwatch::filter;
use netwatch::Session;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list_interfaces {
        // Live capture devices require the `sys` feature, which this build
        // does not enable (§1 Non-goals: OS-specific capture handshake).
        println!("live capture is not available in this build; pass -r to read a capture file");
        return ExitCode::SUCCESS;
    }

    let program = match &cli.filter_file {
        Some(path) => match load_filter(path) {
            Ok(program) => {
                if cli.dump_filter_c {
                    println!("{}", filter::dump_c(&program));
                    return ExitCode::SUCCESS;
                }
                if cli.dump_filter_flat {
                    println!("{}", filter::dump_flat(&program));
                    return ExitCode::SUCCESS;
                }
                Some(program)
            }
            Err(()) => return ExitCode::FAILURE,
        },
        None => None,
    };

    if cli.no_promiscuous {
        info!("promiscuous mode disabled");
    }
    if cli.no_geoip {
        info!("geolocation lookups disabled");
    }

    let source: Box<dyn CaptureSource> = match (&cli.read_file, &cli.interface) {
        (Some(path), _) => match PcapFileSource::open(path) {
            Ok(src) => Box::new(src),
            Err(e) => {
                tracing::error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        (None, Some(_dev)) => {
            tracing::error!("live capture is not implemented in this build; pass -r instead");
            return ExitCode::FAILURE;
        }
        (None, None) => {
            tracing::error!("one of -i or -r is required");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run_capture(source, program.as_deref()) {
        tracing::error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run_capture(
    mut source: Box<dyn CaptureSource>,
    program: Option<&[netwatch::filter::Instruction]>,
) -> netwatch::Result<()> {
    let mut session = Session::new();
    let mut accepted = 0u64;
    let mut dropped = 0u64;

    loop {
        let frame = match source.next_frame()? {
            Some(frame) => frame,
            None => break,
        };

        if let Some(program) = program {
            if filter::run(program, frame.data) == 0 {
                dropped += 1;
                continue;
            }
        }

        let packet = session.ingest(frame.ts_sec, frame.ts_usec, frame.orig_len, frame.data);
        if !packet.is_ok() {
            warn!(seq = packet.seq, "packet decode error: {:?}", packet.status);
        }
        accepted += 1;
    }

    info!(accepted, dropped, hosts = session.hosts.local_hosts().count() + session.hosts.remote_hosts().count(), flows = session.flow.sessions().count(), "capture finished");
    Ok(())
}

fn load_filter(path: &std::path::Path) -> Result<Vec<netwatch::filter::Instruction>, ()> {
    let mut source = String::new();
    match std::fs::File::open(path).and_then(|mut f| f.read_to_string(&mut source)) {
        Ok(_) => {}
        Err(e) => {
            tracing::error!("reading {}: {e}", path.display());
            return Err(());
        }
    }

    filter::assemble_or_log(&source, &path.display().to_string()).map_err(|_| ())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
