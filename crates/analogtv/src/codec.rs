use std::ops::BitOr;

use glam::DVec3;
use image::{Rgba, RgbaImage};
use log::debug;
use rand::Rng;

use crate::error::{CodecError, ensure_positive, ensure_range};
use crate::format::{FormatProfile, Standard};
use crate::scanline::{ScanlineLayout, boundary_points, sample_at};
use crate::{ntsc, pal, secam};

/// Composite baseband samples for one frame, plus where each scanline begins. Only active lines are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub samples: Vec<f64>,
    /// `video_scanlines + 1` strictly increasing indices, from 0 to `samples.len()`.
    pub boundary_points: Vec<usize>,
}

impl Signal {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn validate(&self, video_scanlines: usize) -> Result<(), CodecError> {
        let points = &self.boundary_points;
        let consistent = points.len() == video_scanlines + 1
            && points.first() == Some(&0)
            && points.last() == Some(&self.samples.len())
            && points.windows(2).all(|pair| pair[0] < pair[1]);
        if consistent {
            Ok(())
        } else {
            Err(CodecError::InvalidBoundaries {
                expected_lines: video_scanlines,
                signal_len: self.samples.len(),
            })
        }
    }
}

/// Which decoded components make it into the output picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelFlags(u8);

impl ChannelFlags {
    pub const NONE: ChannelFlags = ChannelFlags(0);
    pub const LUMA: ChannelFlags = ChannelFlags(0x1);
    pub const CHROMA1: ChannelFlags = ChannelFlags(0x2);
    pub const CHROMA2: ChannelFlags = ChannelFlags(0x4);
    pub const ALL: ChannelFlags = ChannelFlags(0x7);

    /// Flags from raw bits. Bits past the three defined channels are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        ChannelFlags(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: ChannelFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Blank out disabled components. Luma falls back to mid-gray so chroma-only views stay visible.
    pub fn apply(self, ycc: DVec3) -> DVec3 {
        DVec3::new(
            if self.contains(Self::LUMA) { ycc.x } else { 0.5 },
            if self.contains(Self::CHROMA1) { ycc.y } else { 0.0 },
            if self.contains(Self::CHROMA2) { ycc.z } else { 0.0 },
        )
    }
}

impl BitOr for ChannelFlags {
    type Output = ChannelFlags;

    fn bitor(self, rhs: Self) -> Self {
        ChannelFlags(self.0 | rhs.0)
    }
}

/// How the decoder separates and demodulates chroma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Demodulation {
    /// Time-domain FIR filters and carrier multiplication (or the phase-locked loop, for SECAM).
    Fir = 0,
    /// Whole-signal DFT masking and spectral shifting. NTSC only.
    Spectral,
}

/// Receiver-side knobs for [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeSettings {
    /// Multiplier on every filter bandwidth, from 0.5 to 1. Lower values blur more.
    pub bandwidth_scale: f64,
    /// How much luma and chroma bleed into each other, from 0 to 1.
    pub crosstalk: f64,
    /// Filter sharpness, from 1 to 20. Higher values ring more around edges.
    pub resonance: f64,
    /// Static hue rotation, in degrees, within ±180.
    pub phase_error: f64,
    /// Maximum random per-line hue rotation, up to 180 degrees.
    pub phase_noise: f64,
    /// Maximum random horizontal line displacement, as a fraction of the active width (at most 0.005).
    pub scanline_jitter: f64,
    pub channels: ChannelFlags,
    pub demodulation: Demodulation,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            bandwidth_scale: 1.0,
            crosstalk: 0.0,
            resonance: 1.0,
            phase_error: 0.0,
            phase_noise: 0.0,
            scanline_jitter: 0.0,
            channels: ChannelFlags::ALL,
            demodulation: Demodulation::Fir,
        }
    }
}

impl DecodeSettings {
    pub fn validate(&self) -> Result<(), CodecError> {
        ensure_positive("bandwidth scale", self.bandwidth_scale)?;
        ensure_positive("resonance", self.resonance)?;
        ensure_range("bandwidth scale", self.bandwidth_scale, 0.5, 1.0)?;
        ensure_range("resonance", self.resonance, 1.0, 20.0)?;
        ensure_range("crosstalk", self.crosstalk, 0.0, 1.0)?;
        ensure_range("phase error", self.phase_error, -180.0, 180.0)?;
        ensure_range("phase noise", self.phase_noise, 0.0, 180.0)?;
        ensure_range("scanline jitter", self.scanline_jitter, 0.0, 0.005)?;
        Ok(())
    }
}

/// Encode an image into a composite signal. The image must already be `video_scanlines` rows tall; any width works,
/// though the standard's [`Standard::working_width`] is what the filters are tuned for.
pub fn encode(profile: &FormatProfile, image: &RgbaImage) -> Result<Signal, CodecError> {
    let expected = profile.video_scanlines();
    if image.height() as usize != expected {
        return Err(CodecError::ImageHeightMismatch {
            expected,
            actual: image.height() as usize,
        });
    }
    if image.width() == 0 {
        return Err(CodecError::InvalidCount {
            parameter: "image width",
            value: 0,
        });
    }

    let signal = match profile.standard() {
        Standard::Ntsc => ntsc::encode(profile, image),
        Standard::Pal => pal::encode(profile, image),
        Standard::Secam => secam::encode(profile, image),
    };
    debug!(
        "Encoded {}x{} {} image into {} samples",
        image.width(),
        image.height(),
        profile.standard().name(),
        signal.len()
    );
    Ok(signal)
}

/// Decode a signal produced by [`encode`] into an image `active_width` samples wide. All randomness (phase noise and
/// scanline jitter) is drawn from `rng`.
pub fn decode<R: Rng + ?Sized>(
    profile: &FormatProfile,
    signal: &Signal,
    active_width: usize,
    settings: &DecodeSettings,
    rng: &mut R,
) -> Result<RgbaImage, CodecError> {
    settings.validate()?;
    if active_width == 0 {
        return Err(CodecError::InvalidCount {
            parameter: "active width",
            value: 0,
        });
    }
    signal.validate(profile.video_scanlines())?;
    if settings.demodulation == Demodulation::Spectral && profile.standard() != Standard::Ntsc {
        return Err(CodecError::UnsupportedDemodulation(profile.standard()));
    }

    debug!(
        "Decoding {} samples as {} at {:.0} Hz into {} columns",
        signal.len(),
        profile.standard().name(),
        profile.effective_sample_rate(signal.len()),
        active_width
    );
    let image = match profile.standard() {
        Standard::Ntsc => ntsc::decode(profile, signal, active_width, settings, rng),
        Standard::Pal => pal::decode(profile, signal, active_width, settings, rng),
        Standard::Secam => secam::decode(profile, signal, active_width, settings, rng),
    };
    Ok(image)
}

/// Per-standard hooks for [`encode_lines`].
pub(crate) trait LineModulator {
    /// Called before the first sample of each logical line.
    fn begin_line(&mut self, _line: usize) {}

    /// Sample emitted between the start of a line's segment and its active window.
    fn porch_sample(&mut self, _offset: usize, _time: f64) -> f64 {
        0.0
    }

    /// Composite sample for one pixel. `rgb` is in 0..1, before gamma.
    fn active_sample(&mut self, rgb: DVec3, time: f64) -> f64;
}

/// Walk every scanline of `image` and let `modulator` produce the samples. Anything past the active window stays 0.
pub(crate) fn encode_lines<M: LineModulator>(
    profile: &FormatProfile,
    image: &RgbaImage,
    modulator: &mut M,
) -> Signal {
    let width = image.width() as usize;
    let lines = profile.video_scanlines();
    let signal_len = profile.signal_len(width);
    let boundaries = boundary_points(signal_len, lines);
    let layout = ScanlineLayout::new(profile, &boundaries, width);
    let sample_time = profile.sample_time(width);
    let mut samples = vec![0.0; signal_len];

    for line in 0..lines {
        let segment = layout.segment(line);
        let active_start = layout.active_start(line).min(segment.end);
        let active_end = (active_start + width).min(segment.end);
        let row = layout.physical_line(line) as u32;

        modulator.begin_line(line);
        for position in segment.start..active_start {
            samples[position] =
                modulator.porch_sample(position - segment.start, position as f64 * sample_time);
        }
        for (column, position) in (active_start..active_end).enumerate() {
            let rgb = pixel_to_rgb(image.get_pixel(column as u32, row));
            samples[position] = modulator.active_sample(rgb, position as f64 * sample_time);
        }
    }

    Signal {
        samples,
        boundary_points: boundaries,
    }
}

/// Per-line receiver phase offset in radians: the static error plus uniform noise.
pub(crate) fn line_phase_offsets<R: Rng + ?Sized>(
    lines: usize,
    settings: &DecodeSettings,
    rng: &mut R,
) -> Vec<f64> {
    (0..lines)
        .map(|_| {
            let noise = 2.0 * (rng.random::<f64>() - 0.5) * settings.phase_noise;
            (noise + settings.phase_error).to_radians()
        })
        .collect()
}

/// Multiply band-passed chroma by sine and cosine references. The factor of 2 undoes the halving from the product's
/// difference-frequency term; the double-frequency term is left for the caller's lowpass.
pub(crate) fn quadrature_demodulate(
    sin_chroma: &[f64],
    cos_chroma: &[f64],
    layout: &ScanlineLayout,
    sample_time: f64,
    carrier_ang_freq: f64,
    chroma_phase: f64,
    line_offsets: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let mut sin_out = vec![0.0; sin_chroma.len()];
    let mut cos_out = vec![0.0; cos_chroma.len()];
    for (line, offset) in line_offsets.iter().enumerate() {
        for position in layout.segment(line) {
            let (sin, cos) =
                (carrier_ang_freq * position as f64 * sample_time + chroma_phase + offset).sin_cos();
            sin_out[position] = 2.0 * sin_chroma[position] * sin;
            cos_out[position] = 2.0 * cos_chroma[position] * cos;
        }
    }
    (sin_out, cos_out)
}

/// Build the output picture. `sample` returns (luma, chroma1, chroma2) for a logical line at a column offset from that
/// line's active start; jitter is already folded into the offset.
pub(crate) fn rasterize<R, F>(
    profile: &FormatProfile,
    layout: &ScanlineLayout,
    active_width: usize,
    settings: &DecodeSettings,
    rng: &mut R,
    mut sample: F,
) -> RgbaImage
where
    R: Rng + ?Sized,
    F: FnMut(usize, isize) -> DVec3,
{
    let lines = layout.video_scanlines();
    let mut image = RgbaImage::new(active_width as u32, lines as u32);
    let matrix = *profile.chroma_to_rgb();
    let transfer = profile.transfer();

    for line in 0..lines {
        let jitter = (settings.scanline_jitter * 2.0 * (rng.random::<f64>() - 0.5)
            * active_width as f64) as isize;
        let row = layout.physical_line(line) as u32;
        for column in 0..active_width {
            let ycc = settings.channels.apply(sample(line, column as isize + jitter));
            let rgb = transfer.decode_rgb(matrix * ycc);
            image.put_pixel(column as u32, row, rgb_to_pixel(rgb));
        }
    }

    image
}

/// Read a plane at a line's active start plus `offset`.
pub(crate) fn plane_at(plane: &[f64], layout: &ScanlineLayout, line: usize, offset: isize) -> f64 {
    sample_at(plane, layout.active_start(line) as isize + offset)
}

fn pixel_to_rgb(pixel: &Rgba<u8>) -> DVec3 {
    let [r, g, b, _] = pixel.0;
    DVec3::new(r as f64, g as f64, b as f64) / 255.0
}

fn rgb_to_pixel(rgb: DVec3) -> Rgba<u8> {
    let quantize = |value: f64| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([quantize(rgb.x), quantize(rgb.y), quantize(rgb.z), 255])
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn encode_rejects_wrong_height() {
        let profile = FormatProfile::new(Standard::Ntsc, true);
        let result = encode(&profile, &solid(16, 479, [0, 0, 0]));
        assert_eq!(
            result,
            Err(CodecError::ImageHeightMismatch {
                expected: 480,
                actual: 479
            })
        );
    }

    #[test]
    fn boundary_points_cover_the_signal() {
        for standard in [Standard::Ntsc, Standard::Pal, Standard::Secam] {
            let profile = FormatProfile::new(standard, true);
            let image = solid(32, profile.video_scanlines() as u32, [90, 120, 200]);
            let signal = encode(&profile, &image).unwrap();
            let points = &signal.boundary_points;
            assert_eq!(points.len(), profile.video_scanlines() + 1);
            assert_eq!(points[0], 0);
            assert_eq!(*points.last().unwrap(), signal.samples.len());
            assert!(points.windows(2).all(|pair| pair[0] < pair[1]));
            assert_eq!(signal.len(), profile.signal_len(32));
        }
    }

    #[test]
    fn decode_rejects_bad_parameters() {
        let profile = FormatProfile::new(Standard::Pal, true);
        let image = solid(16, 576, [128, 128, 128]);
        let signal = encode(&profile, &image).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);

        let bad = [
            DecodeSettings {
                resonance: 0.0,
                ..Default::default()
            },
            DecodeSettings {
                bandwidth_scale: -1.0,
                ..Default::default()
            },
            DecodeSettings {
                crosstalk: 1.5,
                ..Default::default()
            },
            DecodeSettings {
                resonance: f64::NAN,
                ..Default::default()
            },
            DecodeSettings {
                resonance: 0.5,
                ..Default::default()
            },
            DecodeSettings {
                resonance: 25.0,
                ..Default::default()
            },
            DecodeSettings {
                bandwidth_scale: 0.25,
                ..Default::default()
            },
            DecodeSettings {
                bandwidth_scale: 1.5,
                ..Default::default()
            },
            DecodeSettings {
                phase_error: 270.0,
                ..Default::default()
            },
            DecodeSettings {
                phase_noise: 200.0,
                ..Default::default()
            },
            DecodeSettings {
                scanline_jitter: 0.01,
                ..Default::default()
            },
        ];
        for settings in bad {
            assert!(decode(&profile, &signal, 16, &settings, &mut rng).is_err());
        }

        assert!(matches!(
            decode(&profile, &signal, 0, &DecodeSettings::default(), &mut rng),
            Err(CodecError::InvalidCount { .. })
        ));

        let spectral = DecodeSettings {
            demodulation: Demodulation::Spectral,
            ..Default::default()
        };
        assert!(matches!(
            decode(&profile, &signal, 16, &spectral, &mut rng),
            Err(CodecError::UnsupportedDemodulation(Standard::Pal))
        ));

        let mut truncated = signal.clone();
        truncated.samples.pop();
        assert!(matches!(
            decode(&profile, &truncated, 16, &DecodeSettings::default(), &mut rng),
            Err(CodecError::InvalidBoundaries { .. })
        ));
    }

    #[test]
    fn channel_flags_blank_components() {
        let ycc = DVec3::new(0.8, 0.3, -0.2);
        assert_eq!(ChannelFlags::ALL.apply(ycc), ycc);
        assert_eq!(ChannelFlags::LUMA.apply(ycc), DVec3::new(0.8, 0.0, 0.0));
        assert_eq!(
            (ChannelFlags::CHROMA1 | ChannelFlags::CHROMA2).apply(ycc),
            DVec3::new(0.5, 0.3, -0.2)
        );
        assert_eq!(ChannelFlags::from_bits(0xff), ChannelFlags::ALL);
        assert!(!ChannelFlags::LUMA.contains(ChannelFlags::CHROMA1));
    }

    #[test]
    fn narrow_images_still_decode() {
        // Four samples per line is far below the subcarrier, so only the shape of the output is meaningful here.
        for standard in [Standard::Ntsc, Standard::Pal, Standard::Secam] {
            let profile = FormatProfile::new(standard, false);
            let image = solid(4, profile.video_scanlines() as u32, [200, 40, 40]);
            let signal = encode(&profile, &image).unwrap();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
            let decoded = decode(&profile, &signal, 4, &DecodeSettings::default(), &mut rng).unwrap();
            assert_eq!(decoded.dimensions(), (4, profile.video_scanlines() as u32));
            assert!(decoded.pixels().all(|pixel| pixel.0[3] == 255));
        }
    }
}
