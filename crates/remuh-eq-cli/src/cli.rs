//! Command-line argument parsing for the equalizer host.

use std::path::PathBuf;

use clap::{ Parser, ValueEnum };


/// Native equalizer model to simulate.
#[derive( ValueEnum, Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlatformArg {
    /// Session-bound effect with OS-defined bands (millibels)
    Fixed,
    /// In-process parametric node (decibels)
    Parametric,
}


/// remuh-eq - Serve equalizer method calls as line-delimited JSON.
///
/// Reads one `{"method": ..., "arguments": ...}` object per line on stdin and
/// writes one response per line on stdout.
#[derive( Parser, Debug )]
#[command( name = "remuh-eq" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Equalizer model to serve.
    #[arg( short, long, value_enum, default_value_t = PlatformArg::Fixed )]
    pub platform: PlatformArg,

    /// Config file to use instead of the default location.
    #[arg( short, long )]
    pub config: Option<PathBuf>,

    /// Number of simulated fixed-band bands.
    #[arg( short, long, default_value_t = 5 )]
    pub bands: usize,

    /// Refuse this many attach attempts before the simulated OS cooperates.
    #[arg( long, default_value_t = 0 )]
    pub fail_attempts: usize,

    /// Log at debug level.
    #[arg( short, long )]
    pub verbose: bool,
}
