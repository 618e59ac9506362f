use std::f64::consts::PI;

use glam::DMat3;

use crate::color::TransferCurve;
use crate::error::{CodecError, ensure_positive};

/// The three supported broadcast standards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Standard {
    Ntsc = 0,
    Pal,
    Secam,
}

impl Standard {
    pub fn constants(&self) -> &'static FormatConstants {
        match self {
            Standard::Ntsc => &NTSC,
            Standard::Pal => &PAL,
            Standard::Secam => &SECAM,
        }
    }

    /// Number of samples each active line is resampled to before encoding.
    pub fn working_width(&self) -> usize {
        match self {
            Standard::Ntsc => 1280,
            Standard::Pal | Standard::Secam => 1536,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Standard::Ntsc => "NTSC",
            Standard::Pal => "PAL",
            Standard::Secam => "SECAM",
        }
    }
}

/// Per-standard broadcast constants. Frequencies are in Hz and times in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatConstants {
    /// Red, green, and blue weights of luma.
    pub luma_coefficients: [f64; 3],
    /// Scale of the two chroma axes (U/V for NTSC and PAL, Db/Dr for SECAM).
    pub chroma_max: [f64; 2],
    /// Rotation of the chroma axes, in radians.
    pub chroma_phase: f64,
    pub main_bandwidth: f64,
    pub side_bandwidth: f64,
    pub chroma_bandwidth_lower: f64,
    pub chroma_bandwidth_upper: f64,
    pub subcarrier_frequency: f64,
    pub scanlines: usize,
    pub video_scanlines: usize,
    /// Field rate for interlaced standards.
    pub frame_rate: f64,
    pub active_time: f64,
}

const REC601_LUMA: [f64; 3] = [0.299, 0.587, 0.114];

pub const NTSC: FormatConstants = FormatConstants {
    luma_coefficients: REC601_LUMA,
    chroma_max: [0.436, 0.615],
    chroma_phase: 33.0 * (PI / 180.0),
    main_bandwidth: 4.2e6,
    side_bandwidth: 1.0e6,
    chroma_bandwidth_lower: 1.3e6,
    chroma_bandwidth_upper: 0.62e6,
    subcarrier_frequency: 3_579_545.0,
    scanlines: 525,
    video_scanlines: 480,
    frame_rate: 60.0 / 1.001,
    active_time: 52.6555e-6,
};

pub const PAL: FormatConstants = FormatConstants {
    luma_coefficients: REC601_LUMA,
    chroma_max: [0.436, 0.615],
    chroma_phase: 0.0,
    main_bandwidth: 5.0e6,
    side_bandwidth: 0.75e6,
    chroma_bandwidth_lower: 1.3e6,
    chroma_bandwidth_upper: 0.57e6,
    subcarrier_frequency: 4_433_618.75,
    scanlines: 625,
    video_scanlines: 576,
    frame_rate: 50.0,
    active_time: 51.95e-6,
};

pub const SECAM: FormatConstants = FormatConstants {
    luma_coefficients: REC601_LUMA,
    chroma_max: [1.333, -1.333],
    chroma_phase: 0.0,
    main_bandwidth: 5.0e6,
    side_bandwidth: 0.75e6,
    chroma_bandwidth_lower: 1.3e6,
    chroma_bandwidth_upper: 0.57e6,
    subcarrier_frequency: 4_328_125.0,
    scanlines: 625,
    video_scanlines: 576,
    frame_rate: 50.0,
    active_time: 51.95e-6,
};

/// Build a matrix from row-major entries.
fn from_rows(m: [f64; 9]) -> DMat3 {
    DMat3::from_cols_array(&m).transpose()
}

/// RGB to (luma, chroma1, chroma2), with the chroma axes rotated by `phase`.
fn rgb_to_chroma_matrix(constants: &FormatConstants) -> DMat3 {
    let [kr, kg, kb] = constants.luma_coefficients;
    let [umax, vmax] = constants.chroma_max;
    let (s, c) = constants.chroma_phase.sin_cos();
    from_rows([
        kr,
        kg,
        kb,
        -(umax * c * kr / (1.0 - kb)) + s * vmax,
        -(umax * c * kg / (1.0 - kb)) - (vmax * s * kg / (1.0 - kr)),
        umax * c - (vmax * s * kb / (1.0 - kr)),
        vmax * c + (umax * s * kr / (1.0 - kb)),
        -(vmax * c * kg / (1.0 - kr)) + (umax * s * kg / (1.0 - kb)),
        -(vmax * c * kb / (1.0 - kr)) - umax * s,
    ])
}

/// Closed-form inverse of [`rgb_to_chroma_matrix`].
fn chroma_to_rgb_matrix(constants: &FormatConstants) -> DMat3 {
    let [kr, kg, kb] = constants.luma_coefficients;
    let [umax, vmax] = constants.chroma_max;
    let (s, c) = constants.chroma_phase.sin_cos();
    from_rows([
        1.0,
        s * (1.0 - kr) / vmax,
        c * (1.0 - kr) / vmax,
        1.0,
        -(kb * c * (1.0 - kb) / (umax * kg)) - (kr * s * (1.0 - kr) / (vmax * kg)),
        -(kr * c * (1.0 - kr) / (vmax * kg)) + (kb * s * (1.0 - kb) / (umax * kg)),
        1.0,
        c * (1.0 - kb) / umax,
        -(s * (1.0 - kb) / umax),
    ])
}

/// A broadcast standard's constants together with everything derived from them: the color matrices and the scanline
/// timing. Only the interlacing mode can change after construction, and changing it recomputes the timing.
#[derive(Debug, Clone)]
pub struct FormatProfile {
    standard: Standard,
    constants: FormatConstants,
    interlaced: bool,
    transfer: TransferCurve,
    rgb_to_chroma: DMat3,
    chroma_to_rgb: DMat3,
    carrier_ang_freq: f64,
    frame_time: f64,
    scanline_time: f64,
    real_active_time: f64,
}

impl FormatProfile {
    /// Profile for one of the built-in standards.
    pub fn new(standard: Standard, interlaced: bool) -> Self {
        Self::build(standard, standard.constants().clone(), interlaced)
    }

    /// Profile with custom constants, which are checked before use.
    pub fn with_constants(
        standard: Standard,
        constants: FormatConstants,
        interlaced: bool,
    ) -> Result<Self, CodecError> {
        ensure_positive("main bandwidth", constants.main_bandwidth)?;
        ensure_positive("side bandwidth", constants.side_bandwidth)?;
        ensure_positive("lower chroma bandwidth", constants.chroma_bandwidth_lower)?;
        ensure_positive("upper chroma bandwidth", constants.chroma_bandwidth_upper)?;
        ensure_positive("subcarrier frequency", constants.subcarrier_frequency)?;
        ensure_positive("frame rate", constants.frame_rate)?;
        ensure_positive("active time", constants.active_time)?;
        if constants.scanlines == 0 {
            return Err(CodecError::InvalidCount {
                parameter: "scanline count",
                value: constants.scanlines,
            });
        }
        if constants.video_scanlines == 0 || constants.video_scanlines > constants.scanlines {
            return Err(CodecError::InvalidCount {
                parameter: "video scanline count",
                value: constants.video_scanlines,
            });
        }
        // Every SECAM line borrows one chroma component from a neighbor.
        if standard == Standard::Secam && constants.video_scanlines < 2 {
            return Err(CodecError::InvalidCount {
                parameter: "SECAM video scanline count",
                value: constants.video_scanlines,
            });
        }
        let [kr, kg, kb] = constants.luma_coefficients;
        ensure_positive("green luma coefficient", kg)?;
        ensure_positive("red chroma denominator", 1.0 - kr)?;
        ensure_positive("blue chroma denominator", 1.0 - kb)?;
        for max in constants.chroma_max {
            if max == 0.0 || !max.is_finite() {
                return Err(CodecError::NonPositive {
                    parameter: "chroma axis maximum",
                    value: max,
                });
            }
        }

        let profile = Self::build(standard, constants, interlaced);
        if profile.real_active_time > profile.scanline_time {
            return Err(CodecError::OutOfRange {
                parameter: "active time",
                value: profile.constants.active_time,
                min: 0.0,
                max: profile.scanline_time,
            });
        }
        Ok(profile)
    }

    fn build(standard: Standard, constants: FormatConstants, interlaced: bool) -> Self {
        let transfer = match standard {
            Standard::Ntsc => TransferCurve::Power {
                source: 2.2,
                monitor: 2.2,
            },
            Standard::Pal => TransferCurve::SrgbPower { gamma: 2.8 },
            Standard::Secam => TransferCurve::Power {
                source: 2.8,
                monitor: 2.8,
            },
        };
        let mut profile = FormatProfile {
            standard,
            rgb_to_chroma: rgb_to_chroma_matrix(&constants),
            chroma_to_rgb: chroma_to_rgb_matrix(&constants),
            carrier_ang_freq: 2.0 * PI * constants.subcarrier_frequency,
            constants,
            interlaced,
            transfer,
            frame_time: 0.0,
            scanline_time: 0.0,
            real_active_time: 0.0,
        };
        profile.recompute_timing();
        profile
    }

    /// Replace the transfer curve. Only NTSC exposes source and monitor gamma as settings.
    pub fn with_transfer(mut self, transfer: TransferCurve) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn set_interlaced(&mut self, interlaced: bool) {
        self.interlaced = interlaced;
        self.recompute_timing();
    }

    fn recompute_timing(&mut self) {
        let fields = if self.interlaced { 2.0 } else { 1.0 };
        let frame_rate = self.constants.frame_rate;
        self.frame_time = fields / frame_rate;
        self.scanline_time = fields / (self.constants.scanlines as f64 * frame_rate);
        // Progressive scan draws every line in one pass at the field rate, so each line's active window is half as long.
        self.real_active_time = if self.interlaced {
            self.constants.active_time
        } else {
            self.constants.active_time / 2.0
        };
    }

    pub fn standard(&self) -> Standard {
        self.standard
    }

    pub fn constants(&self) -> &FormatConstants {
        &self.constants
    }

    pub fn is_interlaced(&self) -> bool {
        self.interlaced
    }

    pub fn transfer(&self) -> TransferCurve {
        self.transfer
    }

    /// Full pictures per second: half the field rate when interlaced.
    pub fn frame_rate(&self) -> f64 {
        if self.interlaced {
            self.constants.frame_rate / 2.0
        } else {
            self.constants.frame_rate
        }
    }

    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn scanline_time(&self) -> f64 {
        self.scanline_time
    }

    pub fn real_active_time(&self) -> f64 {
        self.real_active_time
    }

    pub fn carrier_ang_freq(&self) -> f64 {
        self.carrier_ang_freq
    }

    pub fn video_scanlines(&self) -> usize {
        self.constants.video_scanlines
    }

    pub fn rgb_to_chroma(&self) -> &DMat3 {
        &self.rgb_to_chroma
    }

    pub fn chroma_to_rgb(&self) -> &DMat3 {
        &self.chroma_to_rgb
    }

    /// Length of the encoded signal for an image `width` samples wide.
    pub fn signal_len(&self, width: usize) -> usize {
        let samples = (width * self.constants.video_scanlines) as f64 * self.scanline_time
            / self.real_active_time;
        samples.floor() as usize
    }

    /// Duration of one sample when the active window holds `width` samples.
    pub fn sample_time(&self, width: usize) -> f64 {
        self.real_active_time / width as f64
    }

    /// Sample rate implied by a signal of `signal_len` samples holding only the active lines of one frame.
    pub fn effective_sample_rate(&self, signal_len: usize) -> f64 {
        let constants = &self.constants;
        signal_len as f64 * (constants.scanlines as f64 / constants.video_scanlines as f64)
            / self.frame_time
    }

    /// Blanking on either side of the active window, in units of the active window.
    pub(crate) fn porch_fraction(&self) -> f64 {
        (self.scanline_time - self.real_active_time) / (2.0 * self.real_active_time)
    }
}
