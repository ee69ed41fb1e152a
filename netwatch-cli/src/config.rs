//! Command-line surface: a single flat [`Cli`] parsed with `clap`'s derive
//! API, matching the capture-or-replay / filter / display flags a reader
//! would expect of a small traffic-monitor front end.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Live network traffic monitor")]
pub struct Cli {
    /// Capture device to listen on (mutually exclusive with `-r`).
    #[arg(short = 'i', long = "interface", value_name = "DEV")]
    pub interface: Option<String>,

    /// Read frames from a pcap capture file instead of a live device.
    #[arg(short = 'r', long = "read", value_name = "FILE")]
    pub read_file: Option<PathBuf>,

    /// Load a packet-filter program from this file and assemble it before
    /// the capture loop starts.
    #[arg(short = 'f', long = "filter", value_name = "FILE")]
    pub filter_file: Option<PathBuf>,

    /// Do not put the capture device into promiscuous mode.
    #[arg(short = 'p', long = "no-promisc")]
    pub no_promiscuous: bool,

    /// Start on the statistics view instead of the flow view.
    #[arg(short = 's', long = "stats")]
    pub start_on_stats: bool,

    /// Plain-text output; no interactive TUI.
    #[arg(short = 't', long = "text")]
    pub text_only: bool,

    /// List capture interfaces and exit.
    #[arg(short = 'l', long = "list-interfaces")]
    pub list_interfaces: bool,

    /// Disable host geolocation lookups.
    #[arg(short = 'G', long = "no-geoip")]
    pub no_geoip: bool,

    /// Increase log verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the compiled filter program as a C initializer and exit.
    #[arg(short = 'd', long = "dump-filter")]
    pub dump_filter_c: bool,

    /// Print the compiled filter program as flat integers and exit.
    #[arg(long = "dd")]
    pub dump_filter_flat: bool,
}

impl Cli {
    /// `true` once any of the "print X and exit" flags is present; these
    /// run before (and instead of) opening a capture source.
    pub fn wants_early_exit(&self) -> bool {
        self.list_interfaces || self.dump_filter_c || self.dump_filter_flat
    }
}
