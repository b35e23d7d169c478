//! End-to-end checks of the request channel against the simulated native layer.

use remuh_eq_core::channel::INVALID_ARGS;
use remuh_eq_core::sim::{ SimProbe, SimulatedEngine, SimulatedUnit };
use remuh_eq_core::{ Adapter, BridgeConfig, EqualizerChannel, SessionController };
use serde_json::{ json, Value };


fn fixed_channel( engine: SimulatedEngine ) -> ( EqualizerChannel, SimProbe ) {
    let probe = engine.probe();
    let adapter = BridgeConfig::default().fixed_band_adapter( Box::new( engine ) );
    ( EqualizerChannel::new( SessionController::new( Adapter::FixedBand( adapter ) ) ), probe )
}


fn parametric_channel() -> EqualizerChannel {
    let config = BridgeConfig::default();
    let unit = SimulatedUnit::new( config.parametric_bands );
    let adapter = config.parametric_adapter( Box::new( unit ) );
    EqualizerChannel::new( SessionController::new( Adapter::Parametric( adapter ) ) )
}


fn send( channel: &mut EqualizerChannel, method: &str, arguments: Value ) -> Value {
    let line = json!({ "method": method, "arguments": arguments }).to_string();
    serde_json::from_str( &channel.handle_json( &line ) ).unwrap()
}


#[test]
fn test_mixed_sequence_never_holds_two_handles() {
    let ( mut channel, probe ) = fixed_channel( SimulatedEngine::new() );

    let script = [
        ( "initEq", json!({ "sessionId": 10 }) ),
        ( "setBandLevel", json!({ "band": 0, "levelMb": 200 }) ),
        ( "initEq", json!({ "sessionId": 11 }) ),
        ( "release", Value::Null ),
        ( "release", Value::Null ),
        ( "initEq", json!({}) ),
        ( "initEq", json!({}) ),
        ( "getBands", Value::Null ),
        ( "initEq", json!({ "sessionId": 12 }) ),
        ( "initEq", json!({ "sessionId": 12 }) ),
    ];

    for ( method, arguments ) in script {
        send( &mut channel, method, arguments );
        assert!( probe.live_handles() <= 1 );
    }

    assert_eq!( probe.peak_live_handles(), 1 );
    assert_eq!( probe.created(), probe.released() + 1 );

    channel.detach();
    assert_eq!( probe.live_handles(), 0 );
}


#[test]
fn test_retry_ladder_visible_through_channel() {
    let ( mut channel, probe ) = fixed_channel( SimulatedEngine::new().fail_next_attempts( 2 ) );

    assert_eq!( send( &mut channel, "initEq", json!({ "sessionId": 55 }) ), json!({ "ok": true }) );
    assert_eq!( probe.attempts(), vec![ ( 1, 55 ), ( 0, 55 ), ( 0, 0 ) ] );
    assert_eq!(
        channel.controller().session().map( |s| s.session_id().get() ),
        Some( 0 )
    );
}


#[test]
fn test_exhausted_attach_reports_false() {
    let ( mut channel, probe ) = fixed_channel( SimulatedEngine::new().fail_next_attempts( 3 ) );

    assert_eq!( send( &mut channel, "initEq", json!({ "sessionId": 55 }) ), json!({ "ok": false }) );
    assert_eq!( send( &mut channel, "getBands", Value::Null ), json!({ "ok": [] }) );
    assert_eq!( probe.live_handles(), 0 );
}


#[test]
fn test_frequency_normalized_to_hz() {
    let engine = SimulatedEngine::new().with_centers( &[ 1000 ] );
    let ( mut channel, _probe ) = fixed_channel( engine );

    send( &mut channel, "initEq", json!({ "sessionId": 1 }) );
    let response = send( &mut channel, "getBands", Value::Null );
    assert_eq!( response[ "ok" ][ 0 ][ "centerHz" ], 1000 );
}


#[test]
fn test_out_of_range_band_leaves_levels_alone() {
    let ( mut channel, _probe ) = fixed_channel( SimulatedEngine::new() );

    send( &mut channel, "initEq", json!({ "sessionId": 1 }) );
    send( &mut channel, "setBandLevel", json!({ "band": 3, "levelMb": -700 }) );
    send( &mut channel, "setBandLevel", json!({ "band": 9, "levelMb": 1200 }) );
    send( &mut channel, "setBandLevel", json!({ "band": -1, "levelMb": 1200 }) );

    let levels: Vec<_> = ( 0..5 ).map( |i| channel.controller().band_level( i ) ).collect();
    assert_eq!( levels, vec![ Some( 0 ), Some( 0 ), Some( 0 ), Some( -700 ), Some( 0 ) ] );
}


#[test]
fn test_non_integer_band_leaves_levels_alone() {
    let ( mut channel, _probe ) = fixed_channel( SimulatedEngine::new() );

    send( &mut channel, "initEq", json!({ "sessionId": 1 }) );
    assert_eq!( send( &mut channel, "setBandLevel", json!({ "band": 3.0, "levelMb": 900 }) ), json!({ "ok": null }) );
    assert_eq!( send( &mut channel, "setBandLevel", json!({ "band": "4", "levelMb": -700 }) ), json!({ "ok": null }) );

    let levels: Vec<_> = ( 0..5 ).map( |i| channel.controller().band_level( i ) ).collect();
    assert_eq!( levels, vec![ Some( 0 ); 5 ] );
}


#[test]
fn test_parametric_contract() {
    let mut channel = parametric_channel();

    assert_eq!( send( &mut channel, "initEq", json!({ "sessionId": 3 }) ), json!({ "ok": true }) );

    let missing_gain = send( &mut channel, "configureBand", json!({ "index": 4, "freq": 500.0, "bw": 0.5 }) );
    assert_eq!( missing_gain[ "error" ][ "code" ], INVALID_ARGS );

    let missing_index = send( &mut channel, "setGain", json!({ "gainDb": 1.0 }) );
    assert_eq!( missing_index[ "error" ][ "code" ], INVALID_ARGS );

    assert_eq!(
        send( &mut channel, "configureBand", json!({ "index": 4, "freq": 500.0, "gainDb": 6.0, "bw": 0.5 }) ),
        json!({ "ok": null })
    );
    send( &mut channel, "setGain", json!({ "index": 4, "gainDb": -1.5 }) );
    send( &mut channel, "setGain", json!({ "index": 10, "gainDb": 9.0 }) );

    let bands = send( &mut channel, "getBands", Value::Null );
    let band = &bands[ "ok" ][ 4 ];
    assert_eq!( band[ "freq" ], 500.0 );
    assert_eq!( band[ "bw" ], 0.5 );
    assert_eq!( band[ "bypass" ], false );
    assert_eq!( band[ "minGain" ], -96 );
    assert_eq!( band[ "maxGain" ], 24 );

    let params = channel.controller().parametric_band( 4 ).unwrap();
    assert_eq!( params.gain_db, -1.5 );
    assert_eq!( bands[ "ok" ].as_array().map( |b| b.len() ), Some( 10 ) );

    assert_eq!( send( &mut channel, "setBandLevel", json!({ "band": 0 }) ), json!({ "notImplemented": true }) );
}
