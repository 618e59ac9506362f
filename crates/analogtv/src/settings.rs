use std::{collections::HashMap, error::Error, fmt::Display, ops::RangeInclusive};

use log::warn;
pub use sval;
pub use sval_json;
use sval_json::{stream_to_fmt_write, stream_to_io_write};
use tinyjson::{InnerAsRef, JsonParseError, JsonValue};

use crate::codec::{ChannelFlags, DecodeSettings, Demodulation};
use crate::color::TransferCurve;
use crate::format::{FormatProfile, Standard};
use crate::{FromPrimitive, ToPrimitive};

/// Which decoded components end up in the output picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum OutputChannels {
    Yuv = 0,
    Y,
    U,
    V,
    Uv,
    Yu,
    Yv,
}

impl OutputChannels {
    pub fn flags(&self) -> ChannelFlags {
        match self {
            OutputChannels::Yuv => ChannelFlags::ALL,
            OutputChannels::Y => ChannelFlags::LUMA,
            OutputChannels::U => ChannelFlags::CHROMA1,
            OutputChannels::V => ChannelFlags::CHROMA2,
            OutputChannels::Uv => ChannelFlags::CHROMA1 | ChannelFlags::CHROMA2,
            OutputChannels::Yu => ChannelFlags::LUMA | ChannelFlags::CHROMA1,
            OutputChannels::Yv => ChannelFlags::LUMA | ChannelFlags::CHROMA2,
        }
    }
}

/// Everything needed to render the effect: which standard to simulate, how the signal is degraded on the way, and how
/// the receiver decodes it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogTvSettings {
    pub standard: Standard,
    pub interlaced: bool,
    pub bandwidth_scale: f64,
    pub noise: f64,
    pub phase_noise: f64,
    pub scanline_jitter: f64,
    pub crosstalk: f64,
    pub resonance: f64,
    pub phase_error: f64,
    pub distortion_ramp: f64,
    pub output_channels: OutputChannels,
    pub demodulation: Demodulation,
    /// NTSC only. PAL and SECAM use their fixed transfer curves.
    pub source_gamma: f64,
    pub monitor_gamma: f64,
}

impl Default for AnalogTvSettings {
    fn default() -> Self {
        Self {
            standard: Standard::Ntsc,
            interlaced: true,
            bandwidth_scale: 1.0,
            noise: 0.0,
            phase_noise: 0.0,
            scanline_jitter: 0.0,
            crosstalk: 0.0,
            resonance: 5.0,
            phase_error: 0.0,
            distortion_ramp: 0.0,
            output_channels: OutputChannels::Yuv,
            demodulation: Demodulation::Fir,
            source_gamma: 2.2,
            monitor_gamma: 2.2,
        }
    }
}

impl AnalogTvSettings {
    /// The format profile these settings describe.
    pub fn profile(&self) -> FormatProfile {
        let profile = FormatProfile::new(self.standard, self.interlaced);
        match self.standard {
            Standard::Ntsc => profile.with_transfer(TransferCurve::Power {
                source: self.source_gamma,
                monitor: self.monitor_gamma,
            }),
            Standard::Pal | Standard::Secam => profile,
        }
    }

    pub fn decode_settings(&self) -> DecodeSettings {
        DecodeSettings {
            bandwidth_scale: self.bandwidth_scale,
            crosstalk: self.crosstalk,
            resonance: self.resonance,
            phase_error: self.phase_error,
            phase_noise: self.phase_noise,
            scanline_jitter: self.scanline_jitter,
            channels: self.output_channels.flags(),
            demodulation: self.demodulation,
        }
    }

    pub fn get_field(&self, id: SettingId) -> SettingValue {
        match id {
            SettingId::Standard => SettingValue::Enumeration(self.standard.to_u32().unwrap_or(0)),
            SettingId::Interlaced => SettingValue::Boolean(self.interlaced),
            SettingId::BandwidthScale => SettingValue::Float(self.bandwidth_scale),
            SettingId::Noise => SettingValue::Float(self.noise),
            SettingId::PhaseNoise => SettingValue::Float(self.phase_noise),
            SettingId::ScanlineJitter => SettingValue::Float(self.scanline_jitter),
            SettingId::Crosstalk => SettingValue::Float(self.crosstalk),
            SettingId::Resonance => SettingValue::Float(self.resonance),
            SettingId::PhaseError => SettingValue::Float(self.phase_error),
            SettingId::DistortionRamp => SettingValue::Float(self.distortion_ramp),
            SettingId::OutputChannels => {
                SettingValue::Enumeration(self.output_channels.to_u32().unwrap_or(0))
            }
            SettingId::Demodulation => {
                SettingValue::Enumeration(self.demodulation.to_u32().unwrap_or(0))
            }
            SettingId::SourceGamma => SettingValue::Float(self.source_gamma),
            SettingId::MonitorGamma => SettingValue::Float(self.monitor_gamma),
        }
    }

    /// Set a field. Floats are clamped into the setting's range; the value must be of the setting's type.
    pub fn set_field(&mut self, id: SettingId, value: SettingValue) -> Result<(), SetFieldError> {
        let descriptor = id.descriptor();
        let value = match (&descriptor.kind, value) {
            (SettingKind::FloatRange { .. }, value @ SettingValue::Float(n)) if n.is_nan() => {
                return Err(SetFieldError::WrongType {
                    key: id.name(),
                    value,
                });
            }
            (SettingKind::FloatRange { range }, SettingValue::Float(n)) => {
                let clamped = n.clamp(*range.start(), *range.end());
                if clamped != n {
                    warn!("{} value {n} is out of range; clamped to {clamped}", id.name());
                }
                SettingValue::Float(clamped)
            }
            (SettingKind::Enumeration { .. }, value @ SettingValue::Enumeration(_))
            | (SettingKind::Boolean, value @ SettingValue::Boolean(_)) => value,
            (_, value) => {
                return Err(SetFieldError::WrongType {
                    key: id.name(),
                    value,
                });
            }
        };

        let invalid_enum = |n: u32| SetFieldError::InvalidEnumValue {
            key: id.name(),
            value: n,
        };
        match (id, value) {
            (SettingId::Standard, SettingValue::Enumeration(n)) => {
                self.standard = Standard::from_u32(n).ok_or_else(|| invalid_enum(n))?;
            }
            (SettingId::OutputChannels, SettingValue::Enumeration(n)) => {
                self.output_channels = OutputChannels::from_u32(n).ok_or_else(|| invalid_enum(n))?;
            }
            (SettingId::Demodulation, SettingValue::Enumeration(n)) => {
                self.demodulation = Demodulation::from_u32(n).ok_or_else(|| invalid_enum(n))?;
            }
            (SettingId::Interlaced, SettingValue::Boolean(b)) => self.interlaced = b,
            (SettingId::BandwidthScale, SettingValue::Float(n)) => self.bandwidth_scale = n,
            (SettingId::Noise, SettingValue::Float(n)) => self.noise = n,
            (SettingId::PhaseNoise, SettingValue::Float(n)) => self.phase_noise = n,
            (SettingId::ScanlineJitter, SettingValue::Float(n)) => self.scanline_jitter = n,
            (SettingId::Crosstalk, SettingValue::Float(n)) => self.crosstalk = n,
            (SettingId::Resonance, SettingValue::Float(n)) => self.resonance = n,
            (SettingId::PhaseError, SettingValue::Float(n)) => self.phase_error = n,
            (SettingId::DistortionRamp, SettingValue::Float(n)) => self.distortion_ramp = n,
            (SettingId::SourceGamma, SettingValue::Float(n)) => self.source_gamma = n,
            (SettingId::MonitorGamma, SettingValue::Float(n)) => self.monitor_gamma = n,
            (_, value) => {
                return Err(SetFieldError::WrongType {
                    key: id.name(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Convert these settings to JSON.
    pub fn to_json(&self) -> impl sval::Value + '_ {
        SettingsJson(self)
    }

    pub fn write_json_to_fmt(&self, dest: impl std::fmt::Write) -> Result<(), sval_json::Error> {
        stream_to_fmt_write(dest, self.to_json())
    }

    pub fn write_json_to_io(&self, dest: impl std::io::Write) -> Result<(), sval_json::Error> {
        stream_to_io_write(dest, self.to_json())
    }

    pub fn to_json_string(&self) -> Result<String, sval_json::Error> {
        let mut s = String::new();
        self.write_json_to_fmt(&mut s)?;
        Ok(s)
    }

    /// Parse a preset. Keys that are missing keep their default values, and unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, ParseSettingsError> {
        let parsed = json.parse::<JsonValue>()?;

        let parsed_map = parsed.get::<HashMap<_, _>>().ok_or_else(|| {
            ParseSettingsError::InvalidSettingType {
                key: "<root>".to_string(),
                expected: "object",
            }
        })?;

        let version = parsed_map
            .get_and_expect::<f64>("version")?
            .ok_or(ParseSettingsError::MissingField { field: "version" })?;
        if version != 1.0 {
            return Err(ParseSettingsError::UnsupportedVersion { version });
        }

        let mut settings = Self::default();
        for descriptor in setting_descriptors().iter() {
            let key = descriptor.id.name();
            let value = match descriptor.kind {
                SettingKind::Enumeration { .. } => parsed_map
                    .get_and_expect::<f64>(key)?
                    .map(|n| SettingValue::Enumeration(n as u32)),
                SettingKind::FloatRange { .. } => {
                    parsed_map.get_and_expect::<f64>(key)?.map(SettingValue::Float)
                }
                SettingKind::Boolean => {
                    parsed_map.get_and_expect::<bool>(key)?.map(SettingValue::Boolean)
                }
            };
            if let Some(value) = value {
                settings.set_field(descriptor.id, value)?;
            }
        }

        Ok(settings)
    }
}

struct SettingsJson<'a>(&'a AnalogTvSettings);

fn stream_key<'sval, S: sval::Stream<'sval> + ?Sized>(stream: &mut S, key: &'static str) -> sval::Result {
    stream.map_key_begin()?;
    stream.text_begin(Some(key.len()))?;
    stream.text_fragment(key)?;
    stream.text_end()?;
    stream.map_key_end()
}

impl sval::Value for SettingsJson<'_> {
    fn stream<'sval, S: sval::Stream<'sval> + ?Sized>(&'sval self, stream: &mut S) -> sval::Result {
        stream.map_begin(None)?;

        for descriptor in setting_descriptors().iter() {
            stream_key(stream, descriptor.id.name())?;
            stream.map_value_begin()?;
            match self.0.get_field(descriptor.id) {
                SettingValue::Enumeration(n) => stream.u32(n)?,
                SettingValue::Float(n) => stream.f64(n)?,
                SettingValue::Boolean(b) => stream.bool(b)?,
            }
            stream.map_value_end()?;
        }

        stream_key(stream, "version")?;
        stream.map_value_begin()?;
        stream.u32(1)?;
        stream.map_value_end()?;

        stream.map_end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    Standard,
    Interlaced,
    BandwidthScale,
    Noise,
    PhaseNoise,
    ScanlineJitter,
    Crosstalk,
    Resonance,
    PhaseError,
    DistortionRamp,
    OutputChannels,
    Demodulation,
    SourceGamma,
    MonitorGamma,
}

impl SettingId {
    /// Key used in JSON presets.
    pub fn name(&self) -> &'static str {
        match self {
            SettingId::Standard => "standard",
            SettingId::Interlaced => "interlaced",
            SettingId::BandwidthScale => "bandwidth_scale",
            SettingId::Noise => "noise",
            SettingId::PhaseNoise => "phase_noise",
            SettingId::ScanlineJitter => "scanline_jitter",
            SettingId::Crosstalk => "crosstalk",
            SettingId::Resonance => "resonance",
            SettingId::PhaseError => "phase_error",
            SettingId::DistortionRamp => "distortion_ramp",
            SettingId::OutputChannels => "output_channels",
            SettingId::Demodulation => "demodulation",
            SettingId::SourceGamma => "source_gamma",
            SettingId::MonitorGamma => "monitor_gamma",
        }
    }

    pub fn descriptor(&self) -> &'static SettingDescriptor {
        &SETTING_DESCRIPTORS[*self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Enumeration(u32),
    Float(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub label: &'static str,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingKind {
    Enumeration { options: &'static [MenuItem] },
    FloatRange { range: RangeInclusive<f64> },
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingDescriptor {
    pub label: &'static str,
    pub description: Option<&'static str>,
    pub kind: SettingKind,
    pub id: SettingId,
}

const SETTING_DESCRIPTORS: &[SettingDescriptor] = &[
    SettingDescriptor {
        label: "Standard",
        description: Some("Broadcast standard to simulate."),
        kind: SettingKind::Enumeration {
            options: &[
                MenuItem {
                    label: "NTSC",
                    index: Standard::Ntsc as u32,
                },
                MenuItem {
                    label: "PAL",
                    index: Standard::Pal as u32,
                },
                MenuItem {
                    label: "SECAM",
                    index: Standard::Secam as u32,
                },
            ],
        },
        id: SettingId::Standard,
    },
    SettingDescriptor {
        label: "Interlaced",
        description: Some("Send even rows as one field and odd rows as the next."),
        kind: SettingKind::Boolean,
        id: SettingId::Interlaced,
    },
    SettingDescriptor {
        label: "Bandwidth",
        description: Some("Multiplier on every filter bandwidth. Lower values blur more."),
        kind: SettingKind::FloatRange { range: 0.5..=1.0 },
        id: SettingId::BandwidthScale,
    },
    SettingDescriptor {
        label: "Noise",
        description: Some("Amplitude of uniform noise added to the composite signal."),
        kind: SettingKind::FloatRange { range: 0.0..=1.0 },
        id: SettingId::Noise,
    },
    SettingDescriptor {
        label: "Phase noise",
        description: Some("Maximum random hue rotation per scanline, in degrees."),
        kind: SettingKind::FloatRange { range: 0.0..=180.0 },
        id: SettingId::PhaseNoise,
    },
    SettingDescriptor {
        label: "Scanline jitter",
        description: Some("Maximum random horizontal displacement per scanline, as a fraction of its width."),
        kind: SettingKind::FloatRange { range: 0.0..=0.005 },
        id: SettingId::ScanlineJitter,
    },
    SettingDescriptor {
        label: "Crosstalk",
        description: Some("How much luma and chroma leak into each other."),
        kind: SettingKind::FloatRange { range: 0.0..=1.0 },
        id: SettingId::Crosstalk,
    },
    SettingDescriptor {
        label: "Resonance",
        description: Some("Filter sharpness. Higher values ring more around edges."),
        kind: SettingKind::FloatRange { range: 1.0..=20.0 },
        id: SettingId::Resonance,
    },
    SettingDescriptor {
        label: "Phase error",
        description: Some("Static hue rotation, in degrees."),
        kind: SettingKind::FloatRange {
            range: -180.0..=180.0,
        },
        id: SettingId::PhaseError,
    },
    SettingDescriptor {
        label: "Distortion ramp",
        description: Some("Steepness of the soft clip applied to the signal. 0 disables it."),
        kind: SettingKind::FloatRange { range: 0.0..=10.0 },
        id: SettingId::DistortionRamp,
    },
    SettingDescriptor {
        label: "Output channels",
        description: Some("Decoded components to show."),
        kind: SettingKind::Enumeration {
            options: &[
                MenuItem {
                    label: "YUV",
                    index: OutputChannels::Yuv as u32,
                },
                MenuItem {
                    label: "Y",
                    index: OutputChannels::Y as u32,
                },
                MenuItem {
                    label: "U",
                    index: OutputChannels::U as u32,
                },
                MenuItem {
                    label: "V",
                    index: OutputChannels::V as u32,
                },
                MenuItem {
                    label: "UV",
                    index: OutputChannels::Uv as u32,
                },
                MenuItem {
                    label: "YU",
                    index: OutputChannels::Yu as u32,
                },
                MenuItem {
                    label: "YV",
                    index: OutputChannels::Yv as u32,
                },
            ],
        },
        id: SettingId::OutputChannels,
    },
    SettingDescriptor {
        label: "Demodulation",
        description: Some("Chroma demodulator. The spectral one is only available for NTSC."),
        kind: SettingKind::Enumeration {
            options: &[
                MenuItem {
                    label: "FIR",
                    index: Demodulation::Fir as u32,
                },
                MenuItem {
                    label: "Spectral",
                    index: Demodulation::Spectral as u32,
                },
            ],
        },
        id: SettingId::Demodulation,
    },
    SettingDescriptor {
        label: "Source gamma",
        description: Some("NTSC camera gamma."),
        kind: SettingKind::FloatRange { range: 1.0..=3.0 },
        id: SettingId::SourceGamma,
    },
    SettingDescriptor {
        label: "Monitor gamma",
        description: Some("NTSC receiver gamma."),
        kind: SettingKind::FloatRange { range: 1.0..=3.0 },
        id: SettingId::MonitorGamma,
    },
];

/// Every setting, in the order presets list them. Indexed by `SettingId`.
pub fn setting_descriptors() -> &'static [SettingDescriptor] {
    SETTING_DESCRIPTORS
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetFieldError {
    WrongType { key: &'static str, value: SettingValue },
    InvalidEnumValue { key: &'static str, value: u32 },
}

impl Display for SetFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetFieldError::WrongType { key, value } => {
                write!(f, "Setting {} cannot hold {:?}", key, value)
            }
            SetFieldError::InvalidEnumValue { key, value } => {
                write!(f, "{} is not a valid option for {}", value, key)
            }
        }
    }
}

impl Error for SetFieldError {}

#[derive(Debug)]
pub enum ParseSettingsError {
    InvalidJSON(JsonParseError),
    MissingField { field: &'static str },
    UnsupportedVersion { version: f64 },
    InvalidSettingType { key: String, expected: &'static str },
    SetField(SetFieldError),
}

impl Display for ParseSettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseSettingsError::InvalidJSON(e) => e.fmt(f),
            ParseSettingsError::MissingField { field } => {
                write!(f, "Missing field: {}", field)
            }
            ParseSettingsError::UnsupportedVersion { version } => {
                write!(f, "Unsupported version: {}", version)
            }
            ParseSettingsError::InvalidSettingType { key, expected } => {
                write!(f, "Setting {} is not a(n) {}", key, expected)
            }
            ParseSettingsError::SetField(e) => e.fmt(f),
        }
    }
}

impl Error for ParseSettingsError {}

impl From<JsonParseError> for ParseSettingsError {
    fn from(err: JsonParseError) -> Self {
        Self::InvalidJSON(err)
    }
}

impl From<SetFieldError> for ParseSettingsError {
    fn from(err: SetFieldError) -> Self {
        Self::SetField(err)
    }
}

/// Convenience trait for asserting the "shape" of the JSON we're parsing is what we expect.
trait GetAndExpect {
    fn get_and_expect<T: InnerAsRef + Clone>(&self, key: &str) -> Result<Option<T>, ParseSettingsError>;
}

impl GetAndExpect for HashMap<String, JsonValue> {
    fn get_and_expect<T: InnerAsRef + Clone>(&self, key: &str) -> Result<Option<T>, ParseSettingsError> {
        self.get(key)
            .map(|v| {
                v.get::<T>()
                    .cloned()
                    .ok_or_else(|| ParseSettingsError::InvalidSettingType {
                        key: key.to_owned(),
                        expected: std::any::type_name::<T>(),
                    })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = AnalogTvSettings::default();
        assert_eq!(settings.standard, Standard::Ntsc);
        assert!(settings.interlaced);
        assert_eq!(settings.resonance, 5.0);
        assert_eq!(settings.decode_settings().channels, ChannelFlags::ALL);
    }

    #[test]
    fn json_round_trip() {
        let settings = AnalogTvSettings {
            standard: Standard::Secam,
            interlaced: false,
            noise: 0.25,
            phase_error: -45.0,
            output_channels: OutputChannels::Yv,
            ..Default::default()
        };
        let json = settings.to_json_string().unwrap();
        assert!(json.contains("\"version\":1"));
        let parsed = AnalogTvSettings::from_json(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn parsing_clamps_and_ignores_unknown_keys() {
        let parsed = AnalogTvSettings::from_json(
            r#"{"version": 1, "resonance": 100, "crosstalk": -3, "standard": 1, "mystery": "x"}"#,
        )
        .unwrap();
        assert_eq!(parsed.resonance, 20.0);
        assert_eq!(parsed.crosstalk, 0.0);
        assert_eq!(parsed.standard, Standard::Pal);
        assert_eq!(parsed.bandwidth_scale, 1.0);
    }

    #[test]
    fn parsing_rejects_bad_presets() {
        assert!(matches!(
            AnalogTvSettings::from_json("{}"),
            Err(ParseSettingsError::MissingField { field: "version" })
        ));
        assert!(matches!(
            AnalogTvSettings::from_json(r#"{"version": 2}"#),
            Err(ParseSettingsError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            AnalogTvSettings::from_json(r#"{"version": 1, "noise": "loud"}"#),
            Err(ParseSettingsError::InvalidSettingType { .. })
        ));
        assert!(matches!(
            AnalogTvSettings::from_json(r#"{"version": 1, "standard": 7}"#),
            Err(ParseSettingsError::SetField(SetFieldError::InvalidEnumValue { .. }))
        ));
        assert!(matches!(
            AnalogTvSettings::from_json("[1, 2"),
            Err(ParseSettingsError::InvalidJSON(_))
        ));
    }

    #[test]
    fn output_channels_map_to_flags() {
        assert_eq!(OutputChannels::Y.flags(), ChannelFlags::LUMA);
        assert_eq!(
            OutputChannels::Uv.flags(),
            ChannelFlags::from_bits(0x2 | 0x4)
        );
        assert_eq!(OutputChannels::Yu.flags().bits(), 0x3);
    }

    #[test]
    fn set_field_checks_types() {
        let mut settings = AnalogTvSettings::default();
        assert!(settings.set_field(SettingId::Noise, SettingValue::Boolean(true)).is_err());
        assert!(settings.set_field(SettingId::Noise, SettingValue::Float(f64::NAN)).is_err());
        settings.set_field(SettingId::ScanlineJitter, SettingValue::Float(1.0)).unwrap();
        assert_eq!(settings.scanline_jitter, 0.005);
        assert_eq!(settings.get_field(SettingId::Demodulation), SettingValue::Enumeration(0));
    }

    #[test]
    fn descriptors_are_indexed_by_id() {
        for (index, descriptor) in setting_descriptors().iter().enumerate() {
            assert_eq!(descriptor.id as usize, index);
            assert_eq!(descriptor.id.descriptor(), descriptor);
        }
    }

    #[test]
    fn ntsc_profile_uses_configured_gamma() {
        let settings = AnalogTvSettings {
            source_gamma: 2.5,
            ..Default::default()
        };
        assert_eq!(
            settings.profile().transfer(),
            TransferCurve::Power {
                source: 2.5,
                monitor: 2.2
            }
        );
    }
}
