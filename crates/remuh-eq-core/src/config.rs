//! Bridge configuration
//!
//! Attach-ladder priorities and parametric node defaults, loaded from a JSON
//! file in the user's config directory.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::fixed::{ AttachPolicy, FixedBandAdapter };
use crate::native::{ FixedBandEngine, ParametricUnit };
use crate::parametric::{ ParametricBandAdapter, DEFAULT_GAIN_RANGE_DB };
use crate::session::SessionId;


/// Errors that can occur loading or saving configuration.
#[derive( Debug, Error )]
pub enum ConfigError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Invalid configuration: {0}" )]
    Parse( #[from] serde_json::Error ),

    #[error( "No configuration directory available" )]
    NoConfigDir,
}


/// Equalizer bridge settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct BridgeConfig {
    /// Priority for the first attach attempt
    pub high_priority: i32,

    /// Priority for the fallback attempts
    pub default_priority: i32,

    /// Session bound when the requested one refuses
    pub global_output_session: i32,

    /// Band count of the parametric node
    pub parametric_bands: usize,

    /// Reported parametric gain limits `[min, max]` in dB
    pub parametric_gain_range_db: ( i32, i32 ),

    /// Clamp fixed-band levels to the effect's range
    pub clamp_levels: bool,
}


impl Default for BridgeConfig {
    fn default() -> Self {
        let policy = AttachPolicy::default();
        Self {
            high_priority: policy.high_priority,
            default_priority: policy.default_priority,
            global_output_session: policy.global_session.get(),
            parametric_bands: 10,
            parametric_gain_range_db: DEFAULT_GAIN_RANGE_DB,
            clamp_levels: true,
        }
    }
}


impl BridgeConfig {
    /// Returns the path to the default config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "remuh" ).join( "equalizer.json" ) )
    }


    /// Loads the default config file, or returns defaults if it is missing or invalid.
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some( p ) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from( &path ) {
            Ok( config ) => config,
            Err( e ) => {
                tracing::warn!( "Failed to read equalizer config {:?}: {}", path, e );
                Self::default()
            }
        }
    }


    /// Loads a config file, reporting any failure.
    pub fn load_from( path: &Path ) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string( path )?;
        Ok( serde_json::from_str( &contents )? )
    }


    /// Saves to the default config file.
    pub fn save( &self ) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or( ConfigError::NoConfigDir )?;
        self.save_to( &path )
    }


    /// Saves to `path`, creating parent directories as needed.
    pub fn save_to( &self, path: &Path ) -> Result<(), ConfigError> {
        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent )?;
        }
        fs::write( path, serde_json::to_string_pretty( self )? )?;
        Ok(())
    }


    /// Attach ladder described by this config.
    pub fn attach_policy( &self ) -> AttachPolicy {
        AttachPolicy {
            high_priority: self.high_priority,
            default_priority: self.default_priority,
            global_session: SessionId::new( self.global_output_session ),
        }
    }


    /// Builds a fixed-band adapter over `engine` with these settings.
    pub fn fixed_band_adapter( &self, engine: Box<dyn FixedBandEngine> ) -> FixedBandAdapter {
        FixedBandAdapter::new( engine )
            .with_policy( self.attach_policy() )
            .with_clamping( self.clamp_levels )
    }


    /// Builds a parametric adapter over `unit` with these settings.
    pub fn parametric_adapter( &self, unit: Box<dyn ParametricUnit> ) -> ParametricBandAdapter {
        let ( min_db, max_db ) = self.parametric_gain_range_db;
        ParametricBandAdapter::new( unit ).with_gain_range( min_db, max_db )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::sim::SimulatedEngine;


    #[test]
    fn test_missing_fields_use_defaults() {
        let config: BridgeConfig = serde_json::from_str( r#"{ "high_priority": 5 }"# ).unwrap();
        assert_eq!( config.high_priority, 5 );
        assert_eq!( config.default_priority, 0 );
        assert_eq!( config.parametric_bands, 10 );
        assert!( config.clamp_levels );
    }


    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join( format!( "remuh-eq-config-{}", std::process::id() ) )
            .join( "equalizer.json" );

        let config = BridgeConfig { parametric_bands: 5, clamp_levels: false, ..Default::default() };
        config.save_to( &path ).unwrap();
        assert_eq!( BridgeConfig::load_from( &path ).unwrap(), config );

        let _ = fs::remove_dir_all( path.parent().unwrap() );
    }


    #[test]
    fn test_load_from_invalid_json() {
        let path = std::env::temp_dir().join( format!( "remuh-eq-bad-{}.json", std::process::id() ) );
        fs::write( &path, "{ not json" ).unwrap();
        assert!( matches!( BridgeConfig::load_from( &path ), Err( ConfigError::Parse( _ ) ) ) );
        let _ = fs::remove_file( &path );
    }


    #[test]
    fn test_policy_from_config() {
        let config = BridgeConfig { high_priority: 3, global_output_session: 0, ..Default::default() };
        let adapter = config.fixed_band_adapter( Box::new( SimulatedEngine::new() ) );
        assert_eq!( adapter.policy().high_priority, 3 );
        assert_eq!( adapter.policy().global_session, SessionId::GLOBAL_OUTPUT );
    }
}
