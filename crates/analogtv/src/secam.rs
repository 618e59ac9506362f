//! SECAM: one chroma component per line, frequency-modulated onto its own subcarrier. Even lines carry Db and odd
//! lines carry Dr; the receiver borrows the missing component from the neighboring line.

use std::f64::consts::{PI, TAU};

use glam::DVec3;
use image::RgbaImage;
use log::debug;
use rand::Rng;

use crate::codec::{DecodeSettings, LineModulator, Signal, encode_lines, plane_at, rasterize};
use crate::filter::{band_edges, fir_filter, make_fir_filter};
use crate::format::FormatProfile;
use crate::scanline::ScanlineLayout;

const MAIN_HALF_WIDTH: usize = 80;
const CHROMA_HALF_WIDTH: usize = 128;

/// Peak amplitude of the FM chroma carrier.
const FM_AMPLITUDE: f64 = 0.115;
/// The chroma carrier starts this long into each line, ahead of the active window, so the receiver can lock on.
const PRECHARGE_START: f64 = 0.4e-6;
/// Phase-locked loop feedback constants.
const LOOP_GAIN: f64 = 0.115;
const FREQUENCY_GAIN: f64 = 35.0;

/// Carrier and deviation for one of the two chroma components. All values in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromaCarrier {
    pub frequency: f64,
    /// Frequency shift per unit of chroma.
    pub deviation: f64,
    /// Extent of the receiver's band-pass below and above `frequency`.
    pub band_below: f64,
    pub band_above: f64,
}

impl ChromaCarrier {
    pub fn ang_freq(&self) -> f64 {
        2.0 * PI * self.frequency
    }

    pub fn ang_deviation(&self) -> f64 {
        2.0 * PI * self.deviation
    }
}

pub const DB_CARRIER: ChromaCarrier = ChromaCarrier {
    frequency: 4_250_000.0,
    deviation: 230_000.0,
    band_below: 2.0 * 506_000.0,
    band_above: 2.0 * 350_000.0,
};

pub const DR_CARRIER: ChromaCarrier = ChromaCarrier {
    frequency: 4_406_250.0,
    deviation: 280_000.0,
    band_below: 2.0 * 350_000.0,
    band_above: 2.0 * 506_000.0,
};

/// Lines whose Db and Dr values are shown on logical line `line`. Even lines carry Db and pair with the next line's
/// Dr; odd lines carry Dr and pair with the previous line's Db. A final even line with no successor borrows Dr from
/// the line before it instead.
pub fn component_sources(line: usize, video_scanlines: usize) -> (usize, usize) {
    if line % 2 == 0 {
        let dr_line = if line + 1 < video_scanlines {
            line + 1
        } else {
            line.saturating_sub(1)
        };
        (line, dr_line)
    } else {
        (line - 1, line)
    }
}

struct SecamModulator<'a> {
    profile: &'a FormatProfile,
    sample_time: f64,
    precharge_start: usize,
    carrier: ChromaCarrier,
    carries_db: bool,
    phase: f64,
}

impl LineModulator for SecamModulator<'_> {
    fn begin_line(&mut self, line: usize) {
        self.carries_db = line % 2 == 0;
        self.carrier = if self.carries_db { DB_CARRIER } else { DR_CARRIER };
        self.phase = 0.0;
    }

    fn porch_sample(&mut self, offset: usize, _time: f64) -> f64 {
        if offset < self.precharge_start {
            return 0.0;
        }
        self.phase = (self.phase + self.sample_time * self.carrier.ang_freq()) % TAU;
        FM_AMPLITUDE * self.phase.cos()
    }

    fn active_sample(&mut self, rgb: DVec3, _time: f64) -> f64 {
        let ycc = *self.profile.rgb_to_chroma() * self.profile.transfer().encode_rgb(rgb);
        let chroma = if self.carries_db { ycc.y } else { ycc.z };
        let ang_freq = self.carrier.ang_freq() + self.carrier.ang_deviation() * chroma;
        self.phase = (self.phase + self.sample_time * ang_freq) % TAU;
        ycc.x + FM_AMPLITUDE * self.phase.cos()
    }
}

pub(crate) fn encode(profile: &FormatProfile, image: &RgbaImage) -> Signal {
    let width = image.width() as usize;
    let precharge_start = (PRECHARGE_START / profile.real_active_time() * width as f64) as usize;
    encode_lines(
        profile,
        image,
        &mut SecamModulator {
            profile,
            sample_time: profile.sample_time(width),
            precharge_start,
            carrier: DB_CARRIER,
            carries_db: true,
            phase: 0.0,
        },
    )
}

/// Digital phase-locked loop that tracks an FM carrier and reports how far its frequency is from the center, in units
/// of the deviation.
#[derive(Debug, Clone)]
pub struct FmDemodulator {
    center: f64,
    deviation: f64,
    phase: f64,
    ang_freq: f64,
    last_sample: f64,
    last_correction: f64,
}

impl FmDemodulator {
    pub fn new(carrier: &ChromaCarrier) -> Self {
        FmDemodulator {
            center: carrier.ang_freq(),
            deviation: carrier.ang_deviation(),
            phase: 0.0,
            ang_freq: carrier.ang_freq(),
            last_sample: 0.0,
            last_correction: 0.0,
        }
    }

    /// Feed one band-passed sample; returns the deviation estimate from before this sample was taken into account.
    pub fn step(&mut self, sample: f64, sample_time: f64) -> f64 {
        let derivative = sample - self.last_sample;
        self.last_sample = sample;
        let deviation = (self.ang_freq - self.center) / self.deviation;

        let (sin, cos) = self.phase.sin_cos();
        let correction = -(LOOP_GAIN * cos * derivative) - (LOOP_GAIN * self.ang_freq * sin * sample);
        self.ang_freq += FREQUENCY_GAIN * (correction - self.last_correction);
        self.phase = (self.phase + sample_time * self.ang_freq) % TAU;
        self.last_correction = correction;

        deviation
    }

    pub fn demodulate(mut self, samples: &[f64], sample_time: f64) -> Vec<f64> {
        samples
            .iter()
            .map(|&sample| self.step(sample, sample_time))
            .collect()
    }
}

pub(crate) fn decode<R: Rng + ?Sized>(
    profile: &FormatProfile,
    signal: &Signal,
    active_width: usize,
    settings: &DecodeSettings,
    rng: &mut R,
) -> RgbaImage {
    let samples = &signal.samples;
    let layout = ScanlineLayout::new(profile, &signal.boundary_points, active_width);
    let sample_rate = profile.effective_sample_rate(samples.len());
    let sample_time = profile.sample_time(active_width);
    let constants = profile.constants();
    let scale = settings.bandwidth_scale;
    let resonance = settings.resonance;
    let crosstalk = settings.crosstalk;

    let (main_lower, main_upper) = band_edges(
        (constants.main_bandwidth - constants.side_bandwidth) * 0.5,
        constants.main_bandwidth + constants.side_bandwidth,
        scale,
    );
    let main = make_fir_filter(sample_rate, MAIN_HALF_WIDTH, main_lower, main_upper, resonance);
    let component_band = |carrier: &ChromaCarrier| {
        make_fir_filter(
            sample_rate,
            CHROMA_HALF_WIDTH,
            carrier.frequency - carrier.band_below * scale,
            carrier.frequency + carrier.band_above * scale,
            resonance,
        )
    };
    let db_band = component_band(&DB_CARRIER);
    let dr_band = component_band(&DR_CARRIER);
    let notch = make_fir_filter(
        sample_rate,
        CHROMA_HALF_WIDTH,
        constants.subcarrier_frequency - constants.chroma_bandwidth_lower * scale,
        constants.subcarrier_frequency + constants.chroma_bandwidth_upper * scale,
        resonance,
    )
    .notch(1.0 - crosstalk);
    let deviation_lowpass = make_fir_filter(
        sample_rate,
        CHROMA_HALF_WIDTH,
        0.0,
        constants.chroma_bandwidth_lower * scale,
        resonance,
    );
    debug!("SECAM decode at {sample_rate:.0} Hz");

    let band_limited = fir_filter(samples, &main);
    // Crosstalk only reaches SECAM through the shallower notch. Luma shifted into the FM bands would sit on the
    // limiter-free PLL input and pull its frequency off the carrier.
    let db_chroma = fir_filter(&band_limited, &db_band);
    let dr_chroma = fir_filter(&band_limited, &dr_band);
    let luma = fir_filter(&band_limited, &notch);

    let db = fir_filter(
        &FmDemodulator::new(&DB_CARRIER).demodulate(&db_chroma, sample_time),
        &deviation_lowpass,
    );
    let dr = fir_filter(
        &FmDemodulator::new(&DR_CARRIER).demodulate(&dr_chroma, sample_time),
        &deviation_lowpass,
    );

    let lines = layout.video_scanlines();
    rasterize(profile, &layout, active_width, settings, rng, |line, offset| {
        let (db_line, dr_line) = component_sources(line, lines);
        DVec3::new(
            plane_at(&luma, &layout, line, offset),
            plane_at(&db, &layout, db_line, offset),
            plane_at(&dr, &layout, dr_line, offset),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_line_reads_one_component_from_a_neighbor() {
        for lines in [576, 7] {
            for line in 0..lines {
                let (db_line, dr_line) = component_sources(line, lines);
                assert_ne!(db_line, dr_line, "line {line} of {lines}");
                assert!(db_line == line || dr_line == line);
                assert!(db_line.abs_diff(line) <= 1 && dr_line.abs_diff(line) <= 1);
                // Db only ever comes from even lines and Dr from odd ones.
                assert_eq!(db_line % 2, 0);
                assert_eq!(dr_line % 2, 1);
            }
        }
    }

    #[test]
    fn pll_tracks_a_steady_tone() {
        let sample_rate: f64 = 30e6;
        let sample_time = sample_rate.recip();
        let offset = 0.5;
        let freq = DB_CARRIER.ang_freq() + DB_CARRIER.ang_deviation() * offset;
        let tone: Vec<f64> = (0..6000)
            .map(|n| FM_AMPLITUDE * (freq * n as f64 * sample_time).cos())
            .collect();
        let demodulated = FmDemodulator::new(&DB_CARRIER).demodulate(&tone, sample_time);
        let settled = &demodulated[3000..];
        let mean = settled.iter().sum::<f64>() / settled.len() as f64;
        assert!((mean - offset).abs() < 0.02, "mean deviation {mean}");
    }

    #[test]
    fn silence_reads_as_center_frequency() {
        let demodulated = FmDemodulator::new(&DR_CARRIER).demodulate(&[0.0; 100], 1e-7);
        assert!(demodulated.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn precharge_runs_before_active_video() {
        let profile = FormatProfile::new(crate::format::Standard::Secam, true);
        let image = RgbaImage::from_pixel(768, 576, image::Rgba([128, 128, 128, 255]));
        let signal = encode(&profile, &image);
        let layout = ScanlineLayout::new(&profile, &signal.boundary_points, 768);
        let segment = layout.segment(3);
        assert_eq!(signal.samples[segment.start], 0.0);
        let porch = &signal.samples[segment.start + 20..layout.active_start(3)];
        let peak = porch.iter().fold(0.0f64, |peak, sample| peak.max(sample.abs()));
        assert!(peak > 0.1 && peak <= FM_AMPLITUDE);
        // Back porch after the active window stays silent.
        assert_eq!(signal.samples[segment.end - 1], 0.0);
    }
}
