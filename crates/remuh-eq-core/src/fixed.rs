//! Fixed-band adapter
//!
//! Drives platform equalizers that bind to an existing audio session and
//! expose a small, OS-determined set of bands with fixed center frequencies.
//! Gains are in millibels and frequencies come back in millihertz.

use crate::band::{ millihertz_to_hz, Band, GainUnit };
use crate::native::{ FixedBandEffect, FixedBandEngine, NativeError };
use crate::session::{ EqError, SessionId };


/// One `(priority, session)` candidate tried while attaching.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct AttachAttempt {
    pub priority: i32,
    pub session_id: SessionId,
}


/// Priorities and fallback session used by the attach ladder.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct AttachPolicy {
    pub high_priority: i32,
    pub default_priority: i32,
    /// Session bound as a last resort; the device-wide output mix.
    pub global_session: SessionId,
}


impl Default for AttachPolicy {
    fn default() -> Self {
        Self {
            high_priority: 1,
            default_priority: 0,
            global_session: SessionId::GLOBAL_OUTPUT,
        }
    }
}


impl AttachPolicy {
    /// Builds the ordered candidate list for a requested session.
    ///
    /// Order: high priority on the requested session, default priority on the
    /// requested session, default priority on the global output mix.
    /// Consecutive duplicates are dropped, so requesting the global session
    /// itself does not retry the same pair twice.
    pub fn candidates( &self, requested: SessionId ) -> Vec<AttachAttempt> {
        let ladder = [
            AttachAttempt { priority: self.high_priority, session_id: requested },
            AttachAttempt { priority: self.default_priority, session_id: requested },
            AttachAttempt { priority: self.default_priority, session_id: self.global_session },
        ];

        let mut candidates: Vec<AttachAttempt> = Vec::with_capacity( ladder.len() );
        for attempt in ladder {
            if candidates.last() != Some( &attempt ) {
                candidates.push( attempt );
            }
        }
        candidates
    }
}


/// A freshly attached and enabled fixed-band effect.
pub struct FixedBandAttachment {
    /// Session actually bound, which may differ from the one requested.
    pub session_id: SessionId,
    pub band_count: usize,
    pub effect: Box<dyn FixedBandEffect>,
}


/// Adapter for session-bound, fixed-band platform equalizers.
pub struct FixedBandAdapter {
    engine: Box<dyn FixedBandEngine>,
    policy: AttachPolicy,
    clamp_levels: bool,
}


impl FixedBandAdapter {
    /// Creates an adapter over a native effect factory with the default policy.
    pub fn new( engine: Box<dyn FixedBandEngine> ) -> Self {
        Self {
            engine,
            policy: AttachPolicy::default(),
            clamp_levels: true,
        }
    }


    /// Replaces the attach policy.
    pub fn with_policy( mut self, policy: AttachPolicy ) -> Self {
        self.policy = policy;
        self
    }


    /// Sets whether levels outside the effect's range are clamped.
    pub fn with_clamping( mut self, clamp_levels: bool ) -> Self {
        self.clamp_levels = clamp_levels;
        self
    }


    /// Returns the attach policy in use.
    pub fn policy( &self ) -> &AttachPolicy {
        &self.policy
    }


    /// Attaches to `requested`, walking the candidate ladder.
    ///
    /// Stops at the first candidate that yields an enabled effect. A candidate
    /// whose effect cannot be enabled is released before the next one is
    /// tried, so at most one handle is alive at any point.
    pub fn attach( &mut self, requested: SessionId ) -> Result<FixedBandAttachment, EqError> {
        let candidates = self.policy.candidates( requested );
        let total = candidates.len();

        for ( n, attempt ) in candidates.into_iter().enumerate() {
            match self.try_candidate( attempt ) {
                Ok( attachment ) => {
                    tracing::info!(
                        "Equalizer attached to session {} at priority {} (attempt {}/{})",
                        attachment.session_id,
                        attempt.priority,
                        n + 1,
                        total
                    );
                    return Ok( attachment );
                }
                Err( e ) => {
                    tracing::warn!(
                        "Attach attempt {}/{} failed (session {}, priority {}): {}",
                        n + 1,
                        total,
                        attempt.session_id,
                        attempt.priority,
                        e
                    );
                }
            }
        }

        Err( EqError::AttachExhausted { requested, attempts: total } )
    }


    /// Creates, enables, and sizes one candidate effect.
    fn try_candidate( &mut self, attempt: AttachAttempt ) -> Result<FixedBandAttachment, EqError> {
        let mut effect = self.engine.create( attempt.priority, attempt.session_id.get() )?;

        // Some platforms create effects disabled
        effect.set_enabled( true )?;
        if !effect.enabled()? {
            return Err( EqError::EnableFailed( attempt.session_id ) );
        }

        let band_count = effect.number_of_bands()? as usize;

        Ok( FixedBandAttachment {
            session_id: attempt.session_id,
            band_count,
            effect,
        })
    }


    /// Reads band metadata from an attached effect.
    ///
    /// The gain range is read once and shared by every band.
    pub fn bands( &self, effect: &dyn FixedBandEffect ) -> Result<Vec<Band>, NativeError> {
        let count = effect.number_of_bands()?;
        let ( min_mb, max_mb ) = effect.band_level_range()?;

        ( 0..count )
            .map( |b| -> Result<Band, NativeError> {
                let center = effect.center_freq( b )?;
                Ok( Band {
                    index: b as usize,
                    min_gain: min_mb as i32,
                    max_gain: max_mb as i32,
                    unit: GainUnit::Millibel,
                    center_hz: millihertz_to_hz( center ) as f64,
                    parametric: None,
                })
            })
            .collect()
    }


    /// Sets one band's gain in millibels.
    ///
    /// Indices at or past `band_count` are rejected without touching the effect.
    pub fn set_band_level(
        &self,
        effect: &mut dyn FixedBandEffect,
        band_count: usize,
        index: usize,
        level_mb: f32,
    ) -> Result<(), EqError> {
        if index >= band_count {
            return Err( EqError::BandOutOfRange { index, band_count } );
        }

        let mut level = level_mb.round();
        if self.clamp_levels {
            let ( min_mb, max_mb ) = effect.band_level_range()?;
            level = level.max( min_mb as f32 ).min( max_mb as f32 );
        }
        let level = level.clamp( i16::MIN as f32, i16::MAX as f32 ) as i16;

        effect.set_band_level( index as u16, level )?;
        Ok(())
    }


    /// Reads one band's gain in millibels.
    pub fn band_level( &self, effect: &dyn FixedBandEffect, band_count: usize, index: usize ) -> Result<i32, EqError> {
        if index >= band_count {
            return Err( EqError::BandOutOfRange { index, band_count } );
        }
        Ok( effect.band_level( index as u16 )? as i32 )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::sim::SimulatedEngine;


    fn session( id: i32 ) -> SessionId {
        SessionId::new( id )
    }


    #[test]
    fn test_candidate_ladder_order() {
        let candidates = AttachPolicy::default().candidates( session( 42 ) );
        assert_eq!( candidates, vec![
            AttachAttempt { priority: 1, session_id: session( 42 ) },
            AttachAttempt { priority: 0, session_id: session( 42 ) },
            AttachAttempt { priority: 0, session_id: session( 0 ) },
        ]);
    }


    #[test]
    fn test_candidate_ladder_global_request_skips_duplicate() {
        let candidates = AttachPolicy::default().candidates( session( 0 ) );
        assert_eq!( candidates.len(), 2 );
        assert_eq!( candidates[ 1 ], AttachAttempt { priority: 0, session_id: session( 0 ) } );
    }


    #[test]
    fn test_attach_first_candidate() {
        let engine = SimulatedEngine::new();
        let probe = engine.probe();
        let mut adapter = FixedBandAdapter::new( Box::new( engine ) );

        let attachment = adapter.attach( session( 9 ) ).unwrap();
        assert_eq!( attachment.session_id, session( 9 ) );
        assert_eq!( attachment.band_count, 5 );
        assert!( attachment.effect.enabled().unwrap() );
        assert_eq!( probe.attempts(), vec![ ( 1, 9 ) ] );
    }


    #[test]
    fn test_attach_falls_back_to_global_session() {
        let engine = SimulatedEngine::new().fail_next_attempts( 2 );
        let probe = engine.probe();
        let mut adapter = FixedBandAdapter::new( Box::new( engine ) );

        let attachment = adapter.attach( session( 9 ) ).unwrap();
        assert_eq!( attachment.session_id, session( 0 ) );
        assert_eq!( probe.attempts(), vec![ ( 1, 9 ), ( 0, 9 ), ( 0, 0 ) ] );
    }


    #[test]
    fn test_attach_exhausted_holds_no_handle() {
        let engine = SimulatedEngine::new().fail_next_attempts( 3 );
        let probe = engine.probe();
        let mut adapter = FixedBandAdapter::new( Box::new( engine ) );

        let result = adapter.attach( session( 9 ) );
        assert!( matches!( result, Err( EqError::AttachExhausted { attempts: 3, .. } ) ) );
        assert_eq!( probe.live_handles(), 0 );
    }


    #[test]
    fn test_attach_rejects_disabled_effect() {
        let engine = SimulatedEngine::new().stuck_disabled();
        let probe = engine.probe();
        let mut adapter = FixedBandAdapter::new( Box::new( engine ) );

        assert!( adapter.attach( session( 9 ) ).is_err() );
        assert_eq!( probe.created(), 3 );
        assert_eq!( probe.peak_live_handles(), 1 );
        assert_eq!( probe.live_handles(), 0 );
    }


    #[test]
    fn test_bands_normalize_frequency() {
        let engine = SimulatedEngine::new().with_centers( &[ 60, 1000 ] );
        let mut adapter = FixedBandAdapter::new( Box::new( engine ) );
        let attachment = adapter.attach( session( 3 ) ).unwrap();

        let bands = adapter.bands( attachment.effect.as_ref() ).unwrap();
        assert_eq!( bands.len(), 2 );
        assert_eq!( bands[ 1 ].center_hz, 1000.0 );
        assert_eq!( bands[ 1 ].min_gain, -1500 );
        assert_eq!( bands[ 1 ].max_gain, 1500 );
        assert_eq!( bands[ 1 ].unit, GainUnit::Millibel );
    }


    #[test]
    fn test_set_band_level_clamps_to_range() {
        let mut adapter = FixedBandAdapter::new( Box::new( SimulatedEngine::new() ) );
        let mut attachment = adapter.attach( session( 3 ) ).unwrap();

        adapter.set_band_level( attachment.effect.as_mut(), attachment.band_count, 1, 4000.0 ).unwrap();
        assert_eq!( adapter.band_level( attachment.effect.as_ref(), attachment.band_count, 1 ).unwrap(), 1500 );
    }


    #[test]
    fn test_set_band_level_out_of_range_index() {
        let mut adapter = FixedBandAdapter::new( Box::new( SimulatedEngine::new() ) );
        let mut attachment = adapter.attach( session( 3 ) ).unwrap();

        let result = adapter.set_band_level( attachment.effect.as_mut(), attachment.band_count, 5, 300.0 );
        assert!( matches!( result, Err( EqError::BandOutOfRange { index: 5, band_count: 5 } ) ) );
    }
}
