//! PAL: quadrature-modulated chroma whose second component flips sign every line, decoded through a one-line delay
//! line that cancels hue errors between neighboring lines.

use glam::DVec3;
use image::RgbaImage;
use log::debug;
use rand::Rng;

use crate::codec::{
    DecodeSettings, LineModulator, Signal, encode_lines, line_phase_offsets, plane_at, quadrature_demodulate,
    rasterize,
};
use crate::filter::{band_edges, fir_filter, fir_filter_crosstalk_shift, make_fir_filter};
use crate::format::FormatProfile;
use crate::scanline::ScanlineLayout;

const TAP_HALF_WIDTH: usize = 256;

/// Sign of the second chroma component on a logical line.
fn line_alternation(line: usize) -> f64 {
    if line % 2 == 0 { 1.0 } else { -1.0 }
}

struct PalModulator<'a> {
    profile: &'a FormatProfile,
    alternation: f64,
}

impl LineModulator for PalModulator<'_> {
    fn begin_line(&mut self, line: usize) {
        self.alternation = line_alternation(line);
    }

    fn active_sample(&mut self, rgb: DVec3, time: f64) -> f64 {
        let profile = self.profile;
        let ycc = *profile.rgb_to_chroma() * profile.transfer().encode_rgb(rgb);
        let (sin, cos) =
            (profile.carrier_ang_freq() * time + profile.constants().chroma_phase).sin_cos();
        ycc.x + ycc.y * sin + self.alternation * ycc.z * cos
    }
}

pub(crate) fn encode(profile: &FormatProfile, image: &RgbaImage) -> Signal {
    encode_lines(
        profile,
        image,
        &mut PalModulator {
            profile,
            alternation: 1.0,
        },
    )
}

/// Average each line's demodulated chroma with the line before it. The first component is a plain average; the second
/// takes half the difference, since its sign alternates, and is then flipped back to the sign it was encoded with.
///
/// `starts[i]` is where line `i`'s active window begins, and a line for which `field_start` is true has no predecessor
/// in its field and keeps half its own value. Only the `width` samples of each active window are combed; everything
/// else is left at zero.
pub(crate) fn delay_line_comb(
    first_raw: &[f64],
    second_raw: &[f64],
    starts: &[usize],
    width: usize,
    field_start: impl Fn(usize) -> bool,
) -> (Vec<f64>, Vec<f64>) {
    let len = first_raw.len();
    let mut first = vec![0.0; len];
    let mut second = vec![0.0; second_raw.len()];

    for (line, &start) in starts.iter().enumerate() {
        let end = (start + width).min(len);
        if line == 0 || field_start(line) {
            for position in start..end {
                first[position] = first_raw[position] / 2.0;
                second[position] = second_raw[position] / 2.0;
            }
            continue;
        }

        let delayed_start = starts[line - 1];
        let sign = -line_alternation(line);
        for (position, delayed) in (start..end).zip(delayed_start..) {
            if delayed >= len {
                break;
            }
            first[position] = (first_raw[delayed] + first_raw[position]) / 2.0;
            second[position] = sign * (second_raw[delayed] - second_raw[position]) / 2.0;
        }
    }

    (first, second)
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
    let lines = layout.video_scanlines();
    let sample_rate = profile.effective_sample_rate(samples.len());
    let sample_time = profile.sample_time(active_width);
    let carrier = profile.carrier_ang_freq();
    let constants = profile.constants();
    let scale = settings.bandwidth_scale;
    let resonance = settings.resonance;
    let crosstalk = settings.crosstalk;

    let (main_lower, main_upper) = band_edges(
        (constants.main_bandwidth - constants.side_bandwidth) * 0.5,
        constants.main_bandwidth + constants.side_bandwidth,
        scale,
    );
    let main = make_fir_filter(sample_rate, TAP_HALF_WIDTH, main_lower, main_upper, resonance);
    let chroma_band = make_fir_filter(
        sample_rate,
        TAP_HALF_WIDTH,
        constants.subcarrier_frequency - constants.chroma_bandwidth_lower * scale,
        constants.subcarrier_frequency + constants.chroma_bandwidth_upper * scale,
        resonance,
    );
    let chroma_lowpass = make_fir_filter(
        sample_rate,
        TAP_HALF_WIDTH,
        0.0,
        constants.chroma_bandwidth_lower * scale,
        resonance,
    );
    let notch = chroma_band.notch(1.0 - crosstalk);
    debug!("PAL decode at {sample_rate:.0} Hz over {lines} lines");

    let band_limited = fir_filter(samples, &main);
    let chroma = fir_filter_crosstalk_shift(&band_limited, &chroma_band, crosstalk, sample_time, carrier);
    let luma = fir_filter(&band_limited, &notch);

    let line_offsets = line_phase_offsets(lines, settings, rng);
    let (first_raw, second_raw) = quadrature_demodulate(
        &chroma,
        &chroma,
        &layout,
        sample_time,
        carrier,
        constants.chroma_phase,
        &line_offsets,
    );
    let first_raw = fir_filter(&first_raw, &chroma_lowpass);
    let second_raw = fir_filter(&second_raw, &chroma_lowpass);

    let starts: Vec<usize> = (0..lines).map(|line| layout.active_start(line)).collect();
    let second_field = if profile.is_interlaced() { lines / 2 } else { 0 };
    let (first, second) = delay_line_comb(&first_raw, &second_raw, &starts, active_width, |line| {
        line == second_field
    });

    rasterize(profile, &layout, active_width, settings, rng, |line, offset| {
        DVec3::new(
            plane_at(&luma, &layout, line, offset),
            plane_at(&first, &layout, line, offset),
            plane_at(&second, &layout, line, offset),
        )
    })
}
