//! REMUH Equalizer Core - native equalizer session bridge
//!
//! This crate attaches native platform equalizers to the active audio output,
//! normalizes their band models, applies gain changes, and releases them
//! deterministically. The host UI talks to it through [`EqualizerChannel`].

pub mod band;
pub mod channel;
pub mod config;
pub mod fixed;
pub mod native;
pub mod parametric;
pub mod session;
pub mod sim;

pub use band::{ Band, FilterShape, GainUnit, ParametricBandParams };
pub use channel::{ ChannelError, EqualizerChannel, MethodCall, MethodResponse, Request };
pub use config::{ BridgeConfig, ConfigError };
pub use fixed::{ AttachAttempt, AttachPolicy, FixedBandAdapter };
pub use native::{ FixedBandEffect, FixedBandEngine, NativeError, ParametricUnit };
pub use parametric::ParametricBandAdapter;
pub use session::{ Adapter, EqError, EqualizerSession, Platform, SessionController, SessionId, SessionState };
