//! Band model
//!
//! Normalized description of equalizer bands shared by both adapters.

use serde::{ Deserialize, Serialize };
use serde_json::{ json, Value };


/// Millihertz per hertz, the fixed-band native frequency unit.
pub const MILLIHERTZ_PER_HZ: i32 = 1000;


/// Unit of a band's gain range.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum GainUnit {
    /// Hundredths of a decibel (fixed-band effects).
    Millibel,
    /// Decibels (parametric nodes).
    Decibel,
}


/// Filter shape of a parametric band.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "camelCase" )]
pub enum FilterShape {
    /// Peak/notch around the center frequency.
    #[default]
    Parametric,
}


/// Full parameter set of one parametric band.
#[derive( Debug, Clone, Copy, PartialEq, Serialize, Deserialize )]
pub struct ParametricBandParams {
    pub shape: FilterShape,
    pub frequency_hz: f32,
    pub gain_db: f32,
    /// Bandwidth in octaves.
    pub bandwidth: f32,
    pub bypass: bool,
}


impl Default for ParametricBandParams {
    fn default() -> Self {
        Self {
            shape: FilterShape::Parametric,
            frequency_hz: 1000.0,
            gain_db: 0.0,
            bandwidth: 0.5,
            bypass: true,
        }
    }
}


/// One adjustable frequency band as reported to the caller.
#[derive( Debug, Clone, PartialEq )]
pub struct Band {
    /// 0-based, dense index.
    pub index: usize,
    pub min_gain: i32,
    pub max_gain: i32,
    pub unit: GainUnit,
    pub center_hz: f64,
    /// Present only for parametric bands.
    pub parametric: Option<ParametricBandParams>,
}


impl Band {
    /// Encodes the band with the field names the calling platform expects.
    ///
    /// Fixed-band: `{band, minMb, maxMb, centerHz}`.
    /// Parametric: `{band, minGain, maxGain, freq, bw, shape, bypass}`.
    pub fn to_payload( &self ) -> Value {
        match self.unit {
            GainUnit::Millibel => json!({
                "band": self.index,
                "minMb": self.min_gain,
                "maxMb": self.max_gain,
                "centerHz": self.center_hz as i64,
            }),
            GainUnit::Decibel => {
                let mut payload = json!({
                    "band": self.index,
                    "minGain": self.min_gain,
                    "maxGain": self.max_gain,
                    "freq": self.center_hz,
                });
                if let ( Some( params ), Value::Object( map ) ) = ( &self.parametric, &mut payload ) {
                    map.insert( "bw".into(), json!( params.bandwidth ) );
                    map.insert( "shape".into(), json!( params.shape ) );
                    map.insert( "bypass".into(), json!( params.bypass ) );
                }
                payload
            }
        }
    }
}


/// Converts a native millihertz frequency to whole hertz (truncating).
pub fn millihertz_to_hz( millihertz: i32 ) -> i32 {
    millihertz / MILLIHERTZ_PER_HZ
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_millihertz_to_hz() {
        assert_eq!( millihertz_to_hz( 1_000_000 ), 1000 );
        assert_eq!( millihertz_to_hz( 60_000 ), 60 );
        assert_eq!( millihertz_to_hz( 14_000_999 ), 14_000 );
    }


    #[test]
    fn test_fixed_payload_field_names() {
        let band = Band {
            index: 2,
            min_gain: -1500,
            max_gain: 1500,
            unit: GainUnit::Millibel,
            center_hz: 910.0,
            parametric: None,
        };
        let payload = band.to_payload();
        assert_eq!( payload[ "band" ], 2 );
        assert_eq!( payload[ "minMb" ], -1500 );
        assert_eq!( payload[ "maxMb" ], 1500 );
        assert_eq!( payload[ "centerHz" ], 910 );
        assert!( payload.get( "freq" ).is_none() );
    }


    #[test]
    fn test_parametric_payload_includes_band_params() {
        let params = ParametricBandParams {
            frequency_hz: 250.0,
            gain_db: 3.0,
            bandwidth: 1.0,
            bypass: false,
            ..Default::default()
        };
        let band = Band {
            index: 0,
            min_gain: -96,
            max_gain: 24,
            unit: GainUnit::Decibel,
            center_hz: 250.0,
            parametric: Some( params ),
        };
        let payload = band.to_payload();
        assert_eq!( payload[ "freq" ], 250.0 );
        assert_eq!( payload[ "minGain" ], -96 );
        assert_eq!( payload[ "shape" ], "parametric" );
        assert_eq!( payload[ "bypass" ], false );
    }
}
