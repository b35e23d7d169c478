//! Parametric-band adapter
//!
//! Drives an in-process parametric equalizer node with a fixed number of
//! bands. There is no session to bind to: the node exists from construction
//! and the host wires it into the playback graph.

use crate::band::{ Band, FilterShape, GainUnit, ParametricBandParams };
use crate::native::{ NativeError, ParametricUnit };
use crate::session::EqError;


/// Default gain limits of a parametric node, in decibels.
pub const DEFAULT_GAIN_RANGE_DB: ( i32, i32 ) = ( -96, 24 );


/// Adapter for parametric equalizer nodes.
pub struct ParametricBandAdapter {
    unit: Box<dyn ParametricUnit>,
    gain_range_db: ( i32, i32 ),
}


impl ParametricBandAdapter {
    /// Wraps an already-built parametric node.
    pub fn new( unit: Box<dyn ParametricUnit> ) -> Self {
        Self {
            unit,
            gain_range_db: DEFAULT_GAIN_RANGE_DB,
        }
    }


    /// Overrides the reported gain range.
    pub fn with_gain_range( mut self, min_db: i32, max_db: i32 ) -> Self {
        self.gain_range_db = ( min_db, max_db );
        self
    }


    /// Number of bands, fixed when the node was built.
    pub fn band_count( &self ) -> usize {
        self.unit.band_count()
    }


    fn check_index( &self, index: usize ) -> Result<(), EqError> {
        let band_count = self.band_count();
        if index < band_count {
            Ok(())
        } else {
            Err( EqError::BandOutOfRange { index, band_count } )
        }
    }


    /// Reads every band's current parameters.
    pub fn bands( &self ) -> Result<Vec<Band>, NativeError> {
        let ( min_gain, max_gain ) = self.gain_range_db;

        ( 0..self.band_count() )
            .map( |index| -> Result<Band, NativeError> {
                let params = self.unit.band( index )?;
                Ok( Band {
                    index,
                    min_gain,
                    max_gain,
                    unit: GainUnit::Decibel,
                    center_hz: params.frequency_hz as f64,
                    parametric: Some( params ),
                })
            })
            .collect()
    }


    /// Configures a band as an active peak/notch filter.
    ///
    /// The bypass flag is cleared so the band is audible immediately.
    pub fn configure_band(
        &mut self,
        index: usize,
        frequency_hz: f32,
        gain_db: f32,
        bandwidth: f32,
    ) -> Result<(), EqError> {
        self.check_index( index )?;

        let params = ParametricBandParams {
            shape: FilterShape::Parametric,
            frequency_hz,
            gain_db,
            bandwidth,
            bypass: false,
        };
        self.unit.apply_band( index, &params )?;
        Ok(())
    }


    /// Updates only the gain of a band.
    pub fn set_gain( &mut self, index: usize, gain_db: f32 ) -> Result<(), EqError> {
        self.check_index( index )?;

        let mut params = self.unit.band( index )?;
        params.gain_db = gain_db;
        self.unit.apply_band( index, &params )?;
        Ok(())
    }


    /// Bypasses every band, leaving the node audibly flat.
    ///
    /// Other band parameters are kept.
    pub fn bypass_all( &mut self ) -> Result<(), NativeError> {
        for index in 0..self.band_count() {
            let mut params = self.unit.band( index )?;
            params.bypass = true;
            self.unit.apply_band( index, &params )?;
        }
        Ok(())
    }


    /// Reads one band's parameters.
    pub fn band( &self, index: usize ) -> Result<ParametricBandParams, EqError> {
        self.check_index( index )?;
        Ok( self.unit.band( index )? )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::sim::SimulatedUnit;


    fn adapter() -> ParametricBandAdapter {
        ParametricBandAdapter::new( Box::new( SimulatedUnit::new( 10 ) ) )
    }


    #[test]
    fn test_configure_band_clears_bypass() {
        let mut eq = adapter();
        eq.configure_band( 3, 440.0, 4.5, 0.8 ).unwrap();

        let band = eq.band( 3 ).unwrap();
        assert_eq!( band.shape, FilterShape::Parametric );
        assert_eq!( band.frequency_hz, 440.0 );
        assert_eq!( band.gain_db, 4.5 );
        assert_eq!( band.bandwidth, 0.8 );
        assert!( !band.bypass );
    }


    #[test]
    fn test_set_gain_keeps_other_params() {
        let mut eq = adapter();
        eq.configure_band( 0, 80.0, 2.0, 1.5 ).unwrap();
        eq.set_gain( 0, -6.0 ).unwrap();

        let band = eq.band( 0 ).unwrap();
        assert_eq!( band.gain_db, -6.0 );
        assert_eq!( band.frequency_hz, 80.0 );
        assert_eq!( band.bandwidth, 1.5 );
    }


    #[test]
    fn test_out_of_range_index_rejected() {
        let mut eq = adapter();
        assert!( matches!( eq.configure_band( 10, 100.0, 1.0, 1.0 ), Err( EqError::BandOutOfRange { .. } ) ) );
        assert!( matches!( eq.set_gain( 42, 1.0 ), Err( EqError::BandOutOfRange { .. } ) ) );

        for band in eq.bands().unwrap() {
            assert_eq!( band.parametric.unwrap().gain_db, 0.0 );
        }
    }


    #[test]
    fn test_bypass_all_keeps_params() {
        let mut eq = adapter();
        eq.configure_band( 1, 90.0, 5.0, 1.2 ).unwrap();
        eq.configure_band( 7, 4_500.0, -3.0, 0.4 ).unwrap();
        eq.bypass_all().unwrap();

        assert!( eq.bands().unwrap().iter().all( |b| b.parametric.unwrap().bypass ) );
        let band = eq.band( 7 ).unwrap();
        assert_eq!( band.frequency_hz, 4_500.0 );
        assert_eq!( band.gain_db, -3.0 );
    }


    #[test]
    fn test_bands_report_decibel_range() {
        let eq = adapter().with_gain_range( -12, 12 );
        let bands = eq.bands().unwrap();
        assert_eq!( bands.len(), 10 );
        assert_eq!( bands[ 0 ].min_gain, -12 );
        assert_eq!( bands[ 0 ].unit, GainUnit::Decibel );
        assert_eq!( bands[ 9 ].center_hz, 16_000.0 );
    }
}
