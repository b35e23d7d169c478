//! REMUH Equalizer host - runs the equalizer bridge over stdin/stdout

mod cli;

use std::io::{ self, BufRead, Write };

use anyhow::{ Context, Result };
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{ Args, PlatformArg };

use remuh_eq_core::sim::{ SimulatedEngine, SimulatedUnit };
use remuh_eq_core::{ Adapter, BridgeConfig, EqualizerChannel, SessionController };


/// Installs the stderr log subscriber. Stdout carries responses only.
fn init_logging( verbose: bool ) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else( |_| EnvFilter::new( default_level ) );

    tracing_subscriber::fmt()
        .with_env_filter( filter )
        .with_writer( io::stderr )
        .init();
}


/// Builds the adapter for the selected platform over the simulated native layer.
fn build_adapter( args: &Args, config: &BridgeConfig ) -> Adapter {
    match args.platform {
        PlatformArg::Fixed => {
            let engine = SimulatedEngine::with_bands( args.bands )
                .fail_next_attempts( args.fail_attempts );
            Adapter::FixedBand( config.fixed_band_adapter( Box::new( engine ) ) )
        }
        PlatformArg::Parametric => {
            let unit = SimulatedUnit::new( config.parametric_bands );
            Adapter::Parametric( config.parametric_adapter( Box::new( unit ) ) )
        }
    }
}


fn main() -> Result<()> {
    let args = Args::parse();
    init_logging( args.verbose );

    let config = match args.config {
        Some( ref path ) => BridgeConfig::load_from( path )
            .with_context( || format!( "Failed to load config {:?}", path ) )?,
        None => BridgeConfig::load(),
    };

    let mut channel = EqualizerChannel::new( SessionController::new( build_adapter( &args, &config ) ) );
    tracing::info!( "Serving channel {}", channel.name() );

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context( "Failed to read request" )?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = channel.handle_json( line );
        writeln!( stdout, "{}", response )?;
        stdout.flush()?;
    }

    channel.detach();
    Ok(())
}
