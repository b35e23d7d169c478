//! Native equalizer layer
//!
//! The traits in this module are the seam between the bridge and the
//! platform's equalizer API. Platform glue implements them; everything
//! above this module only sees typed results.

use thiserror::Error;

use crate::band::ParametricBandParams;


/// Errors reported by the native equalizer layer.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum NativeError {
    /// The OS refused to create or bind the effect.
    #[error( "Effect unavailable: {0}" )]
    Unavailable( String ),

    /// The band index is not known to the native effect.
    #[error( "Invalid band: {0}" )]
    InvalidBand( usize ),

    /// Any other runtime fault raised by the native layer.
    #[error( "Native fault: {0}" )]
    Fault( String ),
}


/// Factory for fixed-band effects bound to an audio session.
pub trait FixedBandEngine {
    /// Creates an effect with the given priority on the given audio session.
    ///
    /// Each call is one synchronous native attach attempt.
    fn create( &mut self, priority: i32, session_id: i32 ) -> Result<Box<dyn FixedBandEffect>, NativeError>;
}


/// One live fixed-band effect handle.
///
/// Implementations must release the OS effect when dropped. Dropping is the
/// only way a handle is released, so a handle can never be used after release.
pub trait FixedBandEffect {
    /// Enables or disables the effect.
    fn set_enabled( &mut self, enabled: bool ) -> Result<(), NativeError>;

    /// Returns whether the effect is currently enabled.
    fn enabled( &self ) -> Result<bool, NativeError>;

    /// Number of bands exposed by the effect.
    fn number_of_bands( &self ) -> Result<u16, NativeError>;

    /// Gain range `(min, max)` in millibels, shared by all bands.
    fn band_level_range( &self ) -> Result<( i16, i16 ), NativeError>;

    /// Center frequency of a band in millihertz.
    fn center_freq( &self, band: u16 ) -> Result<i32, NativeError>;

    /// Current gain of a band in millibels.
    fn band_level( &self, band: u16 ) -> Result<i16, NativeError>;

    /// Sets the gain of a band in millibels.
    fn set_band_level( &mut self, band: u16, level: i16 ) -> Result<(), NativeError>;
}


/// In-process parametric equalizer node with a fixed number of bands.
pub trait ParametricUnit {
    /// Number of bands the node was built with.
    fn band_count( &self ) -> usize;

    /// Reads the current parameters of a band.
    fn band( &self, index: usize ) -> Result<ParametricBandParams, NativeError>;

    /// Writes all parameters of a band.
    fn apply_band( &mut self, index: usize, params: &ParametricBandParams ) -> Result<(), NativeError>;
}
