//! Simulated native layer
//!
//! In-process stand-ins for the platform equalizer APIs. Used by the CLI on
//! desktop hosts and as the fake native layer in tests. The fixed-band engine
//! tracks how many effect handles are alive so leaks and double releases are
//! observable through [`SimProbe`].

use std::cell::{ Cell, RefCell };
use std::rc::Rc;

use crate::band::{ ParametricBandParams, MILLIHERTZ_PER_HZ };
use crate::native::{ FixedBandEffect, FixedBandEngine, NativeError, ParametricUnit };


/// Center frequencies (Hz) of a typical five-band platform equalizer.
const FIVE_BAND_CENTERS_HZ: [i32; 5] = [ 60, 230, 910, 3_600, 14_000 ];

/// ISO octave centers used for the default parametric layout.
const OCTAVE_CENTERS_HZ: [f32; 10] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1_000.0, 2_000.0, 4_000.0, 8_000.0, 16_000.0,
];


/// Counters shared between a [`SimulatedEngine`], its effects, and probes.
#[derive( Debug, Default )]
struct SimCounters {
    live: Cell<usize>,
    peak_live: Cell<usize>,
    created: Cell<usize>,
    released: Cell<usize>,
    attempts: RefCell<Vec<( i32, i32 )>>,
}


/// Read-only view of a simulated engine's counters.
#[derive( Debug, Clone )]
pub struct SimProbe {
    counters: Rc<SimCounters>,
}


impl SimProbe {
    /// Effect handles currently alive.
    pub fn live_handles( &self ) -> usize {
        self.counters.live.get()
    }


    /// Highest number of simultaneously alive handles observed.
    pub fn peak_live_handles( &self ) -> usize {
        self.counters.peak_live.get()
    }


    /// Total `create` calls, successful or not.
    pub fn attach_calls( &self ) -> usize {
        self.counters.attempts.borrow().len()
    }


    /// Effects successfully created.
    pub fn created( &self ) -> usize {
        self.counters.created.get()
    }


    /// Effects released (dropped).
    pub fn released( &self ) -> usize {
        self.counters.released.get()
    }


    /// Every `(priority, session_id)` pair passed to `create`, in order.
    pub fn attempts( &self ) -> Vec<( i32, i32 )> {
        self.counters.attempts.borrow().clone()
    }
}


/// Simulated fixed-band effect factory.
#[derive( Debug )]
pub struct SimulatedEngine {
    centers_hz: Vec<i32>,
    range_mb: ( i16, i16 ),
    /// Number of upcoming `create` calls that fail.
    fail_next: usize,
    /// When set, created effects ignore requests to enable them.
    stuck_disabled: bool,
    /// When set, created effects fail range and frequency queries.
    faulty_queries: bool,
    counters: Rc<SimCounters>,
}


impl SimulatedEngine {
    /// Creates an engine exposing the standard five-band layout (±15 dB).
    pub fn new() -> Self {
        Self {
            centers_hz: FIVE_BAND_CENTERS_HZ.to_vec(),
            range_mb: ( -1500, 1500 ),
            fail_next: 0,
            stuck_disabled: false,
            faulty_queries: false,
            counters: Rc::new( SimCounters::default() ),
        }
    }


    /// Creates an engine with `bands` evenly spread octave bands starting at 60 Hz.
    pub fn with_bands( bands: usize ) -> Self {
        let mut engine = Self::new();
        engine.centers_hz = ( 0..bands )
            .map( |i| ( 60_i32 << i.min( 9 ) ).min( 20_000 ) )
            .collect();
        engine
    }


    /// Overrides the band centers (Hz).
    pub fn with_centers( mut self, centers_hz: &[i32] ) -> Self {
        self.centers_hz = centers_hz.to_vec();
        self
    }


    /// Makes the next `count` attach attempts fail.
    pub fn fail_next_attempts( mut self, count: usize ) -> Self {
        self.fail_next = count;
        self
    }


    /// Makes created effects refuse to become enabled.
    pub fn stuck_disabled( mut self ) -> Self {
        self.stuck_disabled = true;
        self
    }


    /// Makes created effects fail range and frequency queries.
    pub fn faulty_queries( mut self ) -> Self {
        self.faulty_queries = true;
        self
    }


    /// Returns a probe observing this engine's handles.
    pub fn probe( &self ) -> SimProbe {
        SimProbe { counters: Rc::clone( &self.counters ) }
    }
}


impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}


impl FixedBandEngine for SimulatedEngine {
    fn create( &mut self, priority: i32, session_id: i32 ) -> Result<Box<dyn FixedBandEffect>, NativeError> {
        self.counters.attempts.borrow_mut().push(( priority, session_id ));

        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err( NativeError::Unavailable(
                format!( "session {} not ready at priority {}", session_id, priority )
            ));
        }

        let live = self.counters.live.get() + 1;
        self.counters.live.set( live );
        self.counters.peak_live.set( self.counters.peak_live.get().max( live ) );
        self.counters.created.set( self.counters.created.get() + 1 );

        Ok( Box::new( SimulatedEffect {
            centers_mhz: self.centers_hz.iter().map( |hz| hz * MILLIHERTZ_PER_HZ ).collect(),
            levels: vec![ 0; self.centers_hz.len() ],
            range_mb: self.range_mb,
            enabled: false,
            stuck_disabled: self.stuck_disabled,
            faulty_queries: self.faulty_queries,
            counters: Rc::clone( &self.counters ),
        }))
    }
}


/// Effect handle produced by [`SimulatedEngine`].
#[derive( Debug )]
struct SimulatedEffect {
    centers_mhz: Vec<i32>,
    levels: Vec<i16>,
    range_mb: ( i16, i16 ),
    enabled: bool,
    stuck_disabled: bool,
    faulty_queries: bool,
    counters: Rc<SimCounters>,
}


impl SimulatedEffect {
    fn check_queries( &self ) -> Result<(), NativeError> {
        if self.faulty_queries {
            Err( NativeError::Fault( "effect control lost".into() ) )
        } else {
            Ok(())
        }
    }


    fn slot( &self, band: u16 ) -> Result<usize, NativeError> {
        let index = band as usize;
        if index < self.levels.len() {
            Ok( index )
        } else {
            Err( NativeError::InvalidBand( index ) )
        }
    }
}


impl FixedBandEffect for SimulatedEffect {
    fn set_enabled( &mut self, enabled: bool ) -> Result<(), NativeError> {
        if !self.stuck_disabled {
            self.enabled = enabled;
        }
        Ok(())
    }


    fn enabled( &self ) -> Result<bool, NativeError> {
        Ok( self.enabled )
    }


    fn number_of_bands( &self ) -> Result<u16, NativeError> {
        Ok( self.levels.len() as u16 )
    }


    fn band_level_range( &self ) -> Result<( i16, i16 ), NativeError> {
        self.check_queries()?;
        Ok( self.range_mb )
    }


    fn center_freq( &self, band: u16 ) -> Result<i32, NativeError> {
        self.check_queries()?;
        let index = self.slot( band )?;
        Ok( self.centers_mhz[ index ] )
    }


    fn band_level( &self, band: u16 ) -> Result<i16, NativeError> {
        let index = self.slot( band )?;
        Ok( self.levels[ index ] )
    }


    fn set_band_level( &mut self, band: u16, level: i16 ) -> Result<(), NativeError> {
        let index = self.slot( band )?;
        self.levels[ index ] = level;
        Ok(())
    }
}


impl Drop for SimulatedEffect {
    fn drop( &mut self ) {
        self.counters.live.set( self.counters.live.get().saturating_sub( 1 ) );
        self.counters.released.set( self.counters.released.get() + 1 );
    }
}


/// Simulated parametric node.
#[derive( Debug, Clone )]
pub struct SimulatedUnit {
    bands: Vec<ParametricBandParams>,
}


impl SimulatedUnit {
    /// Creates a node with `band_count` bypassed bands on octave centers.
    pub fn new( band_count: usize ) -> Self {
        let bands = ( 0..band_count )
            .map( |i| ParametricBandParams {
                frequency_hz: OCTAVE_CENTERS_HZ.get( i ).copied().unwrap_or( 16_000.0 ),
                ..Default::default()
            })
            .collect();
        Self { bands }
    }
}


impl ParametricUnit for SimulatedUnit {
    fn band_count( &self ) -> usize {
        self.bands.len()
    }


    fn band( &self, index: usize ) -> Result<ParametricBandParams, NativeError> {
        self.bands.get( index ).copied().ok_or( NativeError::InvalidBand( index ) )
    }


    fn apply_band( &mut self, index: usize, params: &ParametricBandParams ) -> Result<(), NativeError> {
        let band = self.bands.get_mut( index ).ok_or( NativeError::InvalidBand( index ) )?;
        *band = *params;
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_engine_counts_live_handles() {
        let mut engine = SimulatedEngine::new();
        let probe = engine.probe();

        let first = engine.create( 0, 7 ).unwrap();
        let second = engine.create( 0, 7 ).unwrap();
        assert_eq!( probe.live_handles(), 2 );

        drop( first );
        drop( second );
        assert_eq!( probe.live_handles(), 0 );
        assert_eq!( probe.peak_live_handles(), 2 );
        assert_eq!( probe.released(), 2 );
    }


    #[test]
    fn test_engine_scripted_failures() {
        let mut engine = SimulatedEngine::new().fail_next_attempts( 1 );
        assert!( engine.create( 1, 3 ).is_err() );
        assert!( engine.create( 0, 3 ).is_ok() );
        assert_eq!( engine.probe().attempts(), vec![ ( 1, 3 ), ( 0, 3 ) ] );
    }


    #[test]
    fn test_effect_reports_millihertz() {
        let mut engine = SimulatedEngine::new().with_centers( &[ 1000 ] );
        let effect = engine.create( 0, 1 ).unwrap();
        assert_eq!( effect.center_freq( 0 ).unwrap(), 1_000_000 );
        assert!( matches!( effect.center_freq( 1 ), Err( NativeError::InvalidBand( 1 ) ) ) );
    }


    #[test]
    fn test_unit_starts_bypassed() {
        let unit = SimulatedUnit::new( 10 );
        assert_eq!( unit.band_count(), 10 );
        let band = unit.band( 5 ).unwrap();
        assert!( band.bypass );
        assert_eq!( band.frequency_hz, 1_000.0 );
    }
}
