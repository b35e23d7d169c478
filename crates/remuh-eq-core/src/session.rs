//! Session lifecycle
//!
//! The [`SessionController`] owns the process's single equalizer session and
//! the adapter selected for the running platform. It enforces ordering
//! (attach before configure), idempotent attach and release, and that at
//! most one native effect handle is alive at a time.
//!
//! Typed [`EqError`] outcomes are used internally; the public lifecycle
//! operations collapse them into the forgiving boolean / empty results the
//! caller contract expects.

use std::fmt;

use thiserror::Error;

use crate::band::{ Band, ParametricBandParams };
use crate::fixed::FixedBandAdapter;
use crate::native::{ FixedBandEffect, NativeError };
use crate::parametric::ParametricBandAdapter;


/// Errors raised while driving an equalizer session.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum EqError {
    #[error( "No attach candidate succeeded for session {requested} ({attempts} attempts)" )]
    AttachExhausted { requested: SessionId, attempts: usize },

    #[error( "Effect on session {0} could not be enabled" )]
    EnableFailed( SessionId ),

    #[error( "Band {index} out of range (band count {band_count})" )]
    BandOutOfRange { index: usize, band_count: usize },

    #[error( "No active equalizer session" )]
    NoActiveSession,

    #[error( "Operation not supported by the {0} adapter" )]
    Unsupported( Platform ),

    #[error( transparent )]
    Native( #[from] NativeError ),
}


/// Identifier of the audio output an effect binds to.
///
/// Zero is a real session: the device-wide output mix. It is never treated
/// as "no session"; the absence of a session is `Option::None`.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Default )]
pub struct SessionId( i32 );


impl SessionId {
    /// The device-wide output mix.
    pub const GLOBAL_OUTPUT: SessionId = SessionId( 0 );


    pub const fn new( id: i32 ) -> Self {
        Self( id )
    }


    pub const fn get( self ) -> i32 {
        self.0
    }
}


impl fmt::Display for SessionId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}", self.0 )
    }
}


/// Which native equalizer model the running platform provides.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Platform {
    FixedBand,
    Parametric,
}


impl Platform {
    /// Name of the request channel the host UI talks to.
    pub fn channel_name( &self ) -> &'static str {
        match self {
            Platform::FixedBand => "remuh/eq",
            Platform::Parametric => "remuh/eq_ios",
        }
    }
}


impl fmt::Display for Platform {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            Platform::FixedBand => write!( f, "fixed-band" ),
            Platform::Parametric => write!( f, "parametric" ),
        }
    }
}


/// Lifecycle state of the controller's session.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum SessionState {
    #[default]
    Uninitialized,
    Attached,
    Released,
}


/// The native adapter chosen once at startup.
pub enum Adapter {
    FixedBand( FixedBandAdapter ),
    Parametric( ParametricBandAdapter ),
}


impl Adapter {
    pub fn platform( &self ) -> Platform {
        match self {
            Adapter::FixedBand( _ ) => Platform::FixedBand,
            Adapter::Parametric( _ ) => Platform::Parametric,
        }
    }
}


/// Native resource held by an attached session.
enum EffectHandle {
    /// Released when dropped.
    FixedBand( Box<dyn FixedBandEffect> ),
    /// The node belongs to the adapter; the session only marks it active.
    Parametric,
}


impl fmt::Debug for EffectHandle {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            EffectHandle::FixedBand( _ ) => write!( f, "FixedBand(..)" ),
            EffectHandle::Parametric => write!( f, "Parametric" ),
        }
    }
}


/// One attached equalizer effect.
///
/// Owns its native handle exclusively; dropping the session releases it.
#[derive( Debug )]
pub struct EqualizerSession {
    session_id: SessionId,
    band_count: usize,
    effect: EffectHandle,
}


impl EqualizerSession {
    /// Session actually bound (may differ from the one requested).
    pub fn session_id( &self ) -> SessionId {
        self.session_id
    }


    pub fn band_count( &self ) -> usize {
        self.band_count
    }
}


/// Owner of the single active equalizer session.
pub struct SessionController {
    adapter: Adapter,
    session: Option<EqualizerSession>,
    state: SessionState,
}


impl SessionController {
    /// Creates an uninitialized controller over the platform's adapter.
    pub fn new( adapter: Adapter ) -> Self {
        Self {
            adapter,
            session: None,
            state: SessionState::Uninitialized,
        }
    }


    pub fn platform( &self ) -> Platform {
        self.adapter.platform()
    }


    /// The device-wide mix the adapter falls back to, which always re-attaches.
    fn global_session( &self ) -> SessionId {
        match self.adapter {
            Adapter::FixedBand( ref adapter ) => adapter.policy().global_session,
            Adapter::Parametric( _ ) => SessionId::GLOBAL_OUTPUT,
        }
    }


    pub fn state( &self ) -> SessionState {
        self.state
    }


    /// The attached session, if any.
    pub fn session( &self ) -> Option<&EqualizerSession> {
        self.session.as_ref()
    }


    /// Attaches an equalizer to `session_id`. Returns true on success.
    pub fn initialize( &mut self, session_id: SessionId ) -> bool {
        match self.try_initialize( session_id ) {
            Ok( _ ) => true,
            Err( e ) => {
                tracing::warn!( "Equalizer unavailable: {}", e );
                false
            }
        }
    }


    /// Attaches an equalizer to `requested`, returning the session actually bound.
    ///
    /// A repeated request for the session already attached is a no-op unless
    /// it is the global output mix. Any previous session is released before
    /// the new attach begins.
    pub fn try_initialize( &mut self, requested: SessionId ) -> Result<SessionId, EqError> {
        if let Some( ref session ) = self.session {
            if session.session_id == requested && requested != self.global_session() {
                tracing::debug!( "Equalizer already attached to session {}", requested );
                return Ok( requested );
            }
        }

        self.release_active();
        self.state = SessionState::Uninitialized;

        let session = match self.adapter {
            Adapter::FixedBand( ref mut adapter ) => {
                let attachment = adapter.attach( requested )?;
                EqualizerSession {
                    session_id: attachment.session_id,
                    band_count: attachment.band_count,
                    effect: EffectHandle::FixedBand( attachment.effect ),
                }
            }
            Adapter::Parametric( ref adapter ) => {
                tracing::info!( "Parametric equalizer active ({} bands)", adapter.band_count() );
                EqualizerSession {
                    session_id: SessionId::GLOBAL_OUTPUT,
                    band_count: adapter.band_count(),
                    effect: EffectHandle::Parametric,
                }
            }
        };

        let bound = session.session_id;
        self.session = Some( session );
        self.state = SessionState::Attached;
        Ok( bound )
    }


    /// Returns every band, or an empty list when no session is attached or the
    /// native layer fails.
    pub fn query_bands( &self ) -> Vec<Band> {
        match self.try_query_bands() {
            Ok( bands ) => bands,
            Err( EqError::NoActiveSession ) => {
                tracing::debug!( "Band query before attach" );
                Vec::new()
            }
            Err( e ) => {
                tracing::warn!( "Band query failed: {}", e );
                Vec::new()
            }
        }
    }


    /// Reads band metadata fresh from the native layer.
    pub fn try_query_bands( &self ) -> Result<Vec<Band>, EqError> {
        let session = self.session.as_ref().ok_or( EqError::NoActiveSession )?;

        let bands = match ( &self.adapter, &session.effect ) {
            ( Adapter::FixedBand( adapter ), EffectHandle::FixedBand( effect ) ) => adapter.bands( effect.as_ref() )?,
            ( Adapter::Parametric( adapter ), EffectHandle::Parametric ) => adapter.bands()?,
            _ => return Err( EqError::Unsupported( self.platform() ) ),
        };
        Ok( bands )
    }


    /// Sets one band's gain in the adapter's unit (millibels or decibels).
    ///
    /// Does nothing when no session is attached or the index is out of range.
    pub fn set_band_level( &mut self, index: usize, gain: f32 ) {
        if let Err( e ) = self.try_set_band_level( index, gain ) {
            log_ignored( "Band level", &e );
        }
    }


    pub fn try_set_band_level( &mut self, index: usize, gain: f32 ) -> Result<(), EqError> {
        let platform = self.adapter.platform();
        let session = self.session.as_mut().ok_or( EqError::NoActiveSession )?;
        let band_count = session.band_count;

        match ( &mut self.adapter, &mut session.effect ) {
            ( Adapter::FixedBand( adapter ), EffectHandle::FixedBand( effect ) ) => {
                adapter.set_band_level( effect.as_mut(), band_count, index, gain )
            }
            ( Adapter::Parametric( adapter ), EffectHandle::Parametric ) => adapter.set_gain( index, gain ),
            _ => Err( EqError::Unsupported( platform ) ),
        }
    }


    /// Configures a parametric band's frequency, gain, and bandwidth.
    ///
    /// Does nothing when no session is attached, the index is out of range,
    /// or the platform has fixed bands.
    pub fn configure_band( &mut self, index: usize, frequency_hz: f32, gain_db: f32, bandwidth: f32 ) {
        if let Err( e ) = self.try_configure_band( index, frequency_hz, gain_db, bandwidth ) {
            log_ignored( "Band configuration", &e );
        }
    }


    pub fn try_configure_band(
        &mut self,
        index: usize,
        frequency_hz: f32,
        gain_db: f32,
        bandwidth: f32,
    ) -> Result<(), EqError> {
        if self.session.is_none() {
            return Err( EqError::NoActiveSession );
        }

        match self.adapter {
            Adapter::Parametric( ref mut adapter ) => adapter.configure_band( index, frequency_hz, gain_db, bandwidth ),
            Adapter::FixedBand( _ ) => Err( EqError::Unsupported( Platform::FixedBand ) ),
        }
    }


    /// Reads back a fixed-band gain in millibels.
    pub fn band_level( &self, index: usize ) -> Option<i32> {
        let session = self.session.as_ref()?;
        match ( &self.adapter, &session.effect ) {
            ( Adapter::FixedBand( adapter ), EffectHandle::FixedBand( effect ) ) => {
                adapter.band_level( effect.as_ref(), session.band_count, index ).ok()
            }
            _ => None,
        }
    }


    /// Reads back a parametric band's parameters.
    pub fn parametric_band( &self, index: usize ) -> Option<ParametricBandParams> {
        match self.adapter {
            Adapter::Parametric( ref adapter ) if self.session.is_some() => adapter.band( index ).ok(),
            _ => None,
        }
    }


    /// Releases the active session. Safe to call repeatedly or before attach.
    pub fn release( &mut self ) {
        if self.release_active() {
            self.state = SessionState::Released;
        }
    }


    /// Drops the attached session, if any. Returns true if one was released.
    ///
    /// The session is detached from `self` before its handle is dropped, so no
    /// later operation can reach a released handle. A parametric node outlives
    /// its session, so its bands are bypassed instead.
    fn release_active( &mut self ) -> bool {
        match self.session.take() {
            Some( session ) => {
                let session_id = session.session_id;
                if let ( Adapter::Parametric( adapter ), EffectHandle::Parametric ) = ( &mut self.adapter, &session.effect ) {
                    if let Err( e ) = adapter.bypass_all() {
                        tracing::warn!( "Could not bypass parametric bands on release: {}", e );
                    }
                }
                drop( session );
                self.state = SessionState::Uninitialized;
                tracing::info!( "Equalizer released (session {})", session_id );
                true
            }
            None => false,
        }
    }
}


impl Drop for SessionController {
    fn drop( &mut self ) {
        self.release();
    }
}


fn log_ignored( operation: &str, error: &EqError ) {
    match error {
        EqError::NoActiveSession => tracing::debug!( "{} ignored: {}", operation, error ),
        _ => tracing::warn!( "{} ignored: {}", operation, error ),
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::fixed::AttachPolicy;
    use crate::sim::{ SimProbe, SimulatedEngine, SimulatedUnit };


    fn fixed( engine: SimulatedEngine ) -> ( SessionController, SimProbe ) {
        let probe = engine.probe();
        let controller = SessionController::new(
            Adapter::FixedBand( FixedBandAdapter::new( Box::new( engine ) ) )
        );
        ( controller, probe )
    }


    fn parametric() -> SessionController {
        SessionController::new(
            Adapter::Parametric( ParametricBandAdapter::new( Box::new( SimulatedUnit::new( 10 ) ) ) )
        )
    }


    #[test]
    fn test_initialize_attaches() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new() );
        assert_eq!( eq.state(), SessionState::Uninitialized );

        assert!( eq.initialize( SessionId::new( 12 ) ) );
        assert_eq!( eq.state(), SessionState::Attached );
        assert_eq!( eq.session().map( |s| s.session_id() ), Some( SessionId::new( 12 ) ) );
        assert_eq!( probe.live_handles(), 1 );
    }


    #[test]
    fn test_initialize_same_session_is_idempotent() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new() );

        assert!( eq.initialize( SessionId::new( 12 ) ) );
        assert!( eq.initialize( SessionId::new( 12 ) ) );
        assert_eq!( probe.attach_calls(), 1 );
        assert_eq!( probe.live_handles(), 1 );
    }


    #[test]
    fn test_initialize_global_session_always_reattaches() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new() );

        assert!( eq.initialize( SessionId::GLOBAL_OUTPUT ) );
        assert!( eq.initialize( SessionId::GLOBAL_OUTPUT ) );
        assert_eq!( probe.created(), 2 );
        assert_eq!( probe.released(), 1 );
        assert_eq!( probe.peak_live_handles(), 1 );
    }


    #[test]
    fn test_initialize_new_session_releases_old_first() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new() );

        for id in [ 1, 2, 3, 2, 1 ] {
            assert!( eq.initialize( SessionId::new( id ) ) );
            assert_eq!( probe.live_handles(), 1 );
        }
        assert_eq!( probe.peak_live_handles(), 1 );
        assert_eq!( probe.released(), 4 );
    }


    #[test]
    fn test_failed_initialize_leaves_uninitialized() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new().fail_next_attempts( 3 ) );

        assert!( !eq.initialize( SessionId::new( 5 ) ) );
        assert_eq!( eq.state(), SessionState::Uninitialized );
        assert!( eq.session().is_none() );
        assert_eq!( probe.attach_calls(), 3 );
        assert_eq!( probe.live_handles(), 0 );
    }


    #[test]
    fn test_disabled_effect_never_attaches() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new().stuck_disabled() );

        assert!( !eq.initialize( SessionId::new( 5 ) ) );
        assert_eq!( eq.state(), SessionState::Uninitialized );
        assert_eq!( probe.created(), 3 );
        assert_eq!( probe.live_handles(), 0 );
    }


    #[test]
    fn test_retry_reports_bound_session() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new().fail_next_attempts( 2 ) );

        assert!( eq.initialize( SessionId::new( 77 ) ) );
        assert_eq!( probe.attach_calls(), 3 );
        assert_eq!( eq.session().map( |s| s.session_id() ), Some( SessionId::GLOBAL_OUTPUT ) );
        assert_eq!( eq.query_bands().len(), 5 );
    }


    #[test]
    fn test_release_is_idempotent() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new() );

        eq.release();
        assert_eq!( eq.state(), SessionState::Uninitialized );

        assert!( eq.initialize( SessionId::new( 3 ) ) );
        eq.release();
        assert_eq!( eq.state(), SessionState::Released );
        eq.release();
        assert_eq!( eq.state(), SessionState::Released );
        assert!( eq.session().is_none() );
        assert_eq!( probe.released(), 1 );
        assert_eq!( probe.live_handles(), 0 );
    }


    #[test]
    fn test_query_bands_before_initialize_is_empty() {
        let ( eq, _probe ) = fixed( SimulatedEngine::new() );
        assert!( eq.query_bands().is_empty() );
        assert!( matches!( eq.try_query_bands(), Err( EqError::NoActiveSession ) ) );
    }


    #[test]
    fn test_query_bands_native_fault_is_empty() {
        let ( mut eq, _probe ) = fixed( SimulatedEngine::new().faulty_queries() );

        assert!( eq.initialize( SessionId::new( 4 ) ) );
        assert!( eq.query_bands().is_empty() );
        assert!( matches!( eq.try_query_bands(), Err( EqError::Native( _ ) ) ) );
    }


    #[test]
    fn test_set_band_level_before_initialize_is_noop() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new() );
        eq.set_band_level( 0, 500.0 );
        assert_eq!( probe.attach_calls(), 0 );
        assert_eq!( eq.band_level( 0 ), None );
    }


    #[test]
    fn test_set_band_level_out_of_range_touches_nothing() {
        let ( mut eq, _probe ) = fixed( SimulatedEngine::new() );
        assert!( eq.initialize( SessionId::new( 8 ) ) );

        eq.set_band_level( 1, 300.0 );
        eq.set_band_level( 5, 900.0 );
        eq.set_band_level( usize::MAX, 900.0 );

        let levels: Vec<_> = ( 0..5 ).filter_map( |i| eq.band_level( i ) ).collect();
        assert_eq!( levels, vec![ 0, 300, 0, 0, 0 ] );
    }


    #[test]
    fn test_configure_band_unsupported_on_fixed() {
        let ( mut eq, _probe ) = fixed( SimulatedEngine::new() );
        assert!( eq.initialize( SessionId::new( 8 ) ) );
        assert_eq!(
            eq.try_configure_band( 0, 100.0, 1.0, 1.0 ),
            Err( EqError::Unsupported( Platform::FixedBand ) )
        );
    }


    #[test]
    fn test_parametric_lifecycle() {
        let mut eq = parametric();
        assert!( eq.query_bands().is_empty() );

        assert!( eq.initialize( SessionId::new( 99 ) ) );
        assert_eq!( eq.session().map( |s| s.band_count() ), Some( 10 ) );

        eq.configure_band( 2, 120.0, 3.0, 0.7 );
        eq.set_band_level( 2, -2.5 );

        let band = eq.parametric_band( 2 ).unwrap();
        assert_eq!( band.gain_db, -2.5 );
        assert_eq!( band.frequency_hz, 120.0 );
        assert!( !band.bypass );

        eq.release();
        assert_eq!( eq.state(), SessionState::Released );
        assert!( eq.parametric_band( 2 ).is_none() );
    }


    #[test]
    fn test_configured_global_session_always_reattaches() {
        let engine = SimulatedEngine::new();
        let probe = engine.probe();
        let policy = AttachPolicy { global_session: SessionId::new( 7 ), ..AttachPolicy::default() };
        let mut eq = SessionController::new(
            Adapter::FixedBand( FixedBandAdapter::new( Box::new( engine ) ).with_policy( policy ) )
        );

        assert!( eq.initialize( SessionId::new( 7 ) ) );
        assert!( eq.initialize( SessionId::new( 7 ) ) );
        assert_eq!( probe.created(), 2 );

        assert!( eq.initialize( SessionId::GLOBAL_OUTPUT ) );
        assert!( eq.initialize( SessionId::GLOBAL_OUTPUT ) );
        assert_eq!( probe.created(), 3 );
        assert_eq!( probe.peak_live_handles(), 1 );
    }


    #[test]
    fn test_parametric_release_bypasses_bands() {
        let mut eq = parametric();
        assert!( eq.initialize( SessionId::GLOBAL_OUTPUT ) );
        eq.configure_band( 4, 500.0, 6.0, 0.5 );
        eq.configure_band( 8, 8_000.0, -4.0, 1.0 );

        eq.release();
        assert!( eq.initialize( SessionId::GLOBAL_OUTPUT ) );

        let bands = eq.query_bands();
        assert!( bands.iter().all( |b| b.parametric.map_or( false, |p| p.bypass ) ) );
        assert_eq!( eq.parametric_band( 4 ).map( |p| p.gain_db ), Some( 6.0 ) );
    }


    #[test]
    fn test_drop_releases_handle() {
        let ( mut eq, probe ) = fixed( SimulatedEngine::new() );
        assert!( eq.initialize( SessionId::new( 8 ) ) );
        drop( eq );
        assert_eq!( probe.live_handles(), 0 );
    }
}
