//! Request channel
//!
//! Decodes method calls from the host UI into typed requests, runs them
//! against the [`SessionController`], and encodes the responses. Method names
//! and payload keys match what the player UI sends on each platform.

use serde::{ Deserialize, Serialize };
use serde_json::{ json, Map, Value };
use thiserror::Error;

use crate::session::{ Platform, SessionController, SessionId };


/// Error code reported for missing or mistyped required arguments.
pub const INVALID_ARGS: &str = "INVALID_ARGS";

/// Error code reported when a call cannot be decoded at all.
pub const MALFORMED_CALL: &str = "MALFORMED_CALL";


/// Errors that can occur decoding a method call.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum ChannelError {
    #[error( "Not implemented: {0}" )]
    NotImplemented( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Malformed call: {0}" )]
    Malformed( String ),
}


impl ChannelError {
    /// Wire error code for this failure.
    pub fn code( &self ) -> &'static str {
        match self {
            ChannelError::MissingArgument( _ ) | ChannelError::InvalidArgument( _ ) => INVALID_ARGS,
            ChannelError::NotImplemented( _ ) | ChannelError::Malformed( _ ) => MALFORMED_CALL,
        }
    }
}


/// A method invocation as sent by the host.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct MethodCall {
    pub method: String,
    #[serde( default )]
    pub arguments: Value,
}


impl MethodCall {
    pub fn new( method: impl Into<String>, arguments: Value ) -> Self {
        Self { method: method.into(), arguments }
    }
}


/// Outcome of a method call.
#[derive( Debug, Clone, PartialEq )]
pub enum MethodResponse {
    Success( Value ),
    Error { code: String, message: Option<String> },
    NotImplemented,
}


impl MethodResponse {
    /// Encodes the response as `{"ok": ..}`, `{"error": ..}`, or `{"notImplemented": true}`.
    pub fn to_json( &self ) -> Value {
        match self {
            MethodResponse::Success( value ) => json!({ "ok": value }),
            MethodResponse::Error { code, message } => json!({
                "error": { "code": code, "message": message }
            }),
            MethodResponse::NotImplemented => json!({ "notImplemented": true }),
        }
    }
}


impl From<ChannelError> for MethodResponse {
    fn from( error: ChannelError ) -> Self {
        match error {
            ChannelError::NotImplemented( _ ) => MethodResponse::NotImplemented,
            other => MethodResponse::Error {
                code: other.code().to_string(),
                message: Some( other.to_string() ),
            },
        }
    }
}


/// Decoded request.
#[derive( Debug, Clone, PartialEq )]
pub enum Request {
    InitEq { session_id: SessionId },
    GetBands,
    /// Fixed-band gain in millibels.
    SetBandLevel { band: usize, level_mb: f32 },
    /// Parametric gain in decibels.
    SetGain { index: usize, gain_db: f32 },
    ConfigureBand { index: usize, frequency_hz: f32, gain_db: f32, bandwidth: f32 },
    Release,
}


impl Request {
    /// Decodes a call for the given platform.
    ///
    /// Methods the platform does not offer are reported as not implemented.
    /// `configureBand` and `setGain` require every argument; the remaining
    /// methods fall back to zero for absent fields.
    pub fn parse( call: &MethodCall, platform: Platform ) -> Result<Self, ChannelError> {
        let args = &call.arguments;

        let request = match ( call.method.as_str(), platform ) {
            ( "initEq", _ ) => Request::InitEq {
                session_id: SessionId::new( optional_i32( args, "sessionId" ) ),
            },
            ( "getBands", _ ) => Request::GetBands,
            ( "release", _ ) => Request::Release,
            ( "setBandLevel", Platform::FixedBand ) => Request::SetBandLevel {
                band: optional_index( args, "band" ),
                level_mb: optional_f64( args, "levelMb" ) as f32,
            },
            ( "setGain", Platform::Parametric ) => Request::SetGain {
                index: required_index( args, "index" )?,
                gain_db: required_number( args, "gainDb" )? as f32,
            },
            ( "configureBand", Platform::Parametric ) => Request::ConfigureBand {
                index: required_index( args, "index" )?,
                frequency_hz: required_number( args, "freq" )? as f32,
                gain_db: required_number( args, "gainDb" )? as f32,
                bandwidth: required_number( args, "bw" )? as f32,
            },
            ( other, _ ) => return Err( ChannelError::NotImplemented( other.to_string() ) ),
        };

        Ok( request )
    }
}


fn field<'a>( args: &'a Value, key: &str ) -> Option<&'a Value> {
    args.as_object()
        .and_then( |map: &Map<String, Value>| map.get( key ) )
        .filter( |v| !v.is_null() )
}


fn optional_i64( args: &Value, key: &str ) -> i64 {
    match field( args, key ) {
        Some( value ) => value.as_i64().unwrap_or_else( || {
            tracing::debug!( "Ignoring non-integer '{}': {}", key, value );
            0
        }),
        None => 0,
    }
}


fn optional_i32( args: &Value, key: &str ) -> i32 {
    i32::try_from( optional_i64( args, key ) ).unwrap_or( 0 )
}


fn optional_f64( args: &Value, key: &str ) -> f64 {
    field( args, key ).and_then( Value::as_f64 ).unwrap_or( 0.0 )
}


/// Absent indices default to zero. Negative or non-integer indices map to a
/// value no band can have, so they are rejected downstream.
fn optional_index( args: &Value, key: &str ) -> usize {
    let Some( value ) = field( args, key ) else {
        return 0;
    };
    match value.as_i64() {
        Some( raw ) => usize::try_from( raw ).unwrap_or( usize::MAX ),
        None => {
            tracing::debug!( "Non-integer '{}' matches no band: {}", key, value );
            usize::MAX
        }
    }
}


fn required_index( args: &Value, key: &str ) -> Result<usize, ChannelError> {
    let value = field( args, key )
        .ok_or_else( || ChannelError::MissingArgument( key.into() ) )?;
    value.as_u64()
        .and_then( |v| usize::try_from( v ).ok() )
        .ok_or_else( || ChannelError::InvalidArgument(
            format!( "'{}' must be a non-negative integer, got {}", key, value )
        ))
}


fn required_number( args: &Value, key: &str ) -> Result<f64, ChannelError> {
    let value = field( args, key )
        .ok_or_else( || ChannelError::MissingArgument( key.into() ) )?;
    value.as_f64()
        .ok_or_else( || ChannelError::InvalidArgument(
            format!( "'{}' must be a number, got {}", key, value )
        ))
}


/// Request channel bound to one platform's session controller.
pub struct EqualizerChannel {
    controller: SessionController,
}


impl EqualizerChannel {
    pub fn new( controller: SessionController ) -> Self {
        Self { controller }
    }


    /// Channel name for the controller's platform.
    pub fn name( &self ) -> &'static str {
        self.controller.platform().channel_name()
    }


    pub fn controller( &self ) -> &SessionController {
        &self.controller
    }


    /// Handles one method call.
    pub fn handle( &mut self, call: &MethodCall ) -> MethodResponse {
        let request = match Request::parse( call, self.controller.platform() ) {
            Ok( request ) => request,
            Err( e ) => {
                tracing::debug!( "Rejected '{}': {}", call.method, e );
                return e.into();
            }
        };

        self.execute( request )
    }


    /// Runs a decoded request.
    pub fn execute( &mut self, request: Request ) -> MethodResponse {
        match request {
            Request::InitEq { session_id } => {
                MethodResponse::Success( Value::Bool( self.controller.initialize( session_id ) ) )
            }
            Request::GetBands => {
                let bands = self.controller.query_bands()
                    .iter()
                    .map( |b| b.to_payload() )
                    .collect();
                MethodResponse::Success( Value::Array( bands ) )
            }
            Request::SetBandLevel { band, level_mb } => {
                self.controller.set_band_level( band, level_mb );
                MethodResponse::Success( Value::Null )
            }
            Request::SetGain { index, gain_db } => {
                self.controller.set_band_level( index, gain_db );
                MethodResponse::Success( Value::Null )
            }
            Request::ConfigureBand { index, frequency_hz, gain_db, bandwidth } => {
                self.controller.configure_band( index, frequency_hz, gain_db, bandwidth );
                MethodResponse::Success( Value::Null )
            }
            Request::Release => {
                self.controller.release();
                MethodResponse::Success( Value::Null )
            }
        }
    }


    /// Handles one JSON-encoded call and returns the JSON-encoded response.
    pub fn handle_json( &mut self, input: &str ) -> String {
        let response = match serde_json::from_str::<MethodCall>( input ) {
            Ok( call ) => self.handle( &call ),
            Err( e ) => ChannelError::Malformed( e.to_string() ).into(),
        };
        response.to_json().to_string()
    }


    /// Host is tearing the channel down; releases any active session.
    pub fn detach( &mut self ) {
        tracing::info!( "Channel {} detached", self.name() );
        self.controller.release();
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::fixed::FixedBandAdapter;
    use crate::parametric::ParametricBandAdapter;
    use crate::session::Adapter;
    use crate::sim::{ SimulatedEngine, SimulatedUnit };


    fn call( method: &str, arguments: Value ) -> MethodCall {
        MethodCall::new( method, arguments )
    }


    fn fixed_channel() -> EqualizerChannel {
        EqualizerChannel::new( SessionController::new(
            Adapter::FixedBand( FixedBandAdapter::new( Box::new( SimulatedEngine::new() ) ) )
        ))
    }


    fn parametric_channel() -> EqualizerChannel {
        EqualizerChannel::new( SessionController::new(
            Adapter::Parametric( ParametricBandAdapter::new( Box::new( SimulatedUnit::new( 10 ) ) ) )
        ))
    }


    #[test]
    fn test_parse_init_defaults_session_to_zero() {
        let request = Request::parse( &call( "initEq", Value::Null ), Platform::FixedBand ).unwrap();
        assert_eq!( request, Request::InitEq { session_id: SessionId::GLOBAL_OUTPUT } );
    }


    #[test]
    fn test_parse_set_band_level_defaults() {
        let request = Request::parse( &call( "setBandLevel", json!({ "band": 2 }) ), Platform::FixedBand ).unwrap();
        assert_eq!( request, Request::SetBandLevel { band: 2, level_mb: 0.0 } );

        let request = Request::parse( &call( "setBandLevel", json!({ "levelMb": 100 }) ), Platform::FixedBand ).unwrap();
        assert_eq!( request, Request::SetBandLevel { band: 0, level_mb: 100.0 } );
    }


    #[test]
    fn test_parse_set_band_level_non_integer_band() {
        for band in [ json!( 3.0 ), json!( "4" ), json!( -2 ), json!( true ) ] {
            let request = Request::parse(
                &call( "setBandLevel", json!({ "band": band, "levelMb": 900 }) ),
                Platform::FixedBand,
            ).unwrap();
            assert_eq!( request, Request::SetBandLevel { band: usize::MAX, level_mb: 900.0 } );
        }
    }


    #[test]
    fn test_parse_configure_band_missing_gain() {
        let result = Request::parse(
            &call( "configureBand", json!({ "index": 1, "freq": 100.0, "bw": 1.0 }) ),
            Platform::Parametric,
        );
        assert_eq!( result, Err( ChannelError::MissingArgument( "gainDb".into() ) ) );
    }


    #[test]
    fn test_parse_set_gain_rejects_wrong_type() {
        let result = Request::parse(
            &call( "setGain", json!({ "index": "two", "gainDb": 1.0 }) ),
            Platform::Parametric,
        );
        assert!( matches!( result, Err( ChannelError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_accepts_integer_numbers() {
        let request = Request::parse(
            &call( "configureBand", json!({ "index": 0, "freq": 1000, "gainDb": -3, "bw": 1 }) ),
            Platform::Parametric,
        ).unwrap();
        assert_eq!( request, Request::ConfigureBand { index: 0, frequency_hz: 1000.0, gain_db: -3.0, bandwidth: 1.0 } );
    }


    #[test]
    fn test_platform_specific_methods() {
        assert!( matches!(
            Request::parse( &call( "configureBand", json!({}) ), Platform::FixedBand ),
            Err( ChannelError::NotImplemented( _ ) )
        ));
        assert!( matches!(
            Request::parse( &call( "setBandLevel", json!({}) ), Platform::Parametric ),
            Err( ChannelError::NotImplemented( _ ) )
        ));
    }


    #[test]
    fn test_unknown_method_not_implemented() {
        let mut channel = fixed_channel();
        assert_eq!( channel.handle( &call( "setPreset", Value::Null ) ), MethodResponse::NotImplemented );
    }


    #[test]
    fn test_fixed_flow() {
        let mut channel = fixed_channel();
        assert_eq!( channel.name(), "remuh/eq" );

        assert_eq!( channel.handle( &call( "getBands", Value::Null ) ), MethodResponse::Success( json!( [] ) ) );
        assert_eq!(
            channel.handle( &call( "initEq", json!({ "sessionId": 31 }) ) ),
            MethodResponse::Success( json!( true ) )
        );

        let bands = match channel.handle( &call( "getBands", Value::Null ) ) {
            MethodResponse::Success( Value::Array( bands ) ) => bands,
            other => panic!( "unexpected response: {:?}", other ),
        };
        assert_eq!( bands.len(), 5 );
        assert_eq!( bands[ 2 ], json!({ "band": 2, "minMb": -1500, "maxMb": 1500, "centerHz": 910 }) );

        channel.handle( &call( "setBandLevel", json!({ "band": 2, "levelMb": 600 }) ) );
        assert_eq!( channel.controller().band_level( 2 ), Some( 600 ) );

        channel.handle( &call( "release", Value::Null ) );
        assert!( channel.controller().session().is_none() );
    }


    #[test]
    fn test_parametric_configure_invalid_args_response() {
        let mut channel = parametric_channel();
        assert_eq!( channel.name(), "remuh/eq_ios" );
        channel.handle( &call( "initEq", Value::Null ) );

        let response = channel.handle( &call( "configureBand", json!({ "index": 1, "freq": 100.0, "bw": 1.0 }) ) );
        assert!( matches!( response, MethodResponse::Error { ref code, .. } if code == INVALID_ARGS ) );
        assert!( channel.controller().parametric_band( 1 ).unwrap().bypass );
    }


    #[test]
    fn test_handle_json_round_trip() {
        let mut channel = parametric_channel();
        assert_eq!( channel.handle_json( r#"{"method":"initEq"}"# ), r#"{"ok":true}"# );
        assert_eq!(
            channel.handle_json( r#"{"method":"setGain","arguments":{"index":0,"gainDb":2.5}}"# ),
            r#"{"ok":null}"#
        );
        assert_eq!( channel.controller().parametric_band( 0 ).unwrap().gain_db, 2.5 );
        assert_eq!( channel.handle_json( r#"{"method":"nope"}"# ), r#"{"notImplemented":true}"# );
        assert!( channel.handle_json( "not json" ).contains( MALFORMED_CALL ) );
    }


    #[test]
    fn test_detach_releases_session() {
        let mut channel = fixed_channel();
        channel.handle( &call( "initEq", json!({ "sessionId": 4 }) ) );
        channel.detach();
        assert!( channel.controller().session().is_none() );
    }
}
