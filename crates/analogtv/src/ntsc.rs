//! NTSC: two chroma components quadrature-modulated onto a 3.58 MHz subcarrier, with a narrow band for the first
//! component and a wider, asymmetric one for the second.

use glam::DVec3;
use image::RgbaImage;
use log::debug;
use rand::Rng;
use rustfft::num_complex::Complex64;

use crate::codec::{
    DecodeSettings, Demodulation, LineModulator, Signal, encode_lines, line_phase_offsets, plane_at,
    quadrature_demodulate, rasterize,
};
use crate::filter::{band_edges, fir_filter, fir_filter_crosstalk_shift, make_fir_filter};
use crate::format::FormatProfile;
use crate::scanline::ScanlineLayout;
use crate::spectrum::{
    band_pass_filter, fourier_transform, inverse_fourier_transform, notch_filter, one_sided,
    shift_spectrum,
};

const TAP_HALF_WIDTH: usize = 256;

struct NtscModulator<'a> {
    profile: &'a FormatProfile,
}

impl LineModulator for NtscModulator<'_> {
    fn active_sample(&mut self, rgb: DVec3, time: f64) -> f64 {
        let profile = self.profile;
        let ycc = *profile.rgb_to_chroma() * profile.transfer().encode_rgb(rgb);
        let (sin, cos) =
            (profile.carrier_ang_freq() * time + profile.constants().chroma_phase).sin_cos();
        ycc.x + ycc.y * sin + ycc.z * cos
    }
}

pub(crate) fn encode(profile: &FormatProfile, image: &RgbaImage) -> Signal {
    encode_lines(profile, image, &mut NtscModulator { profile })
}

/// Passbands, in Hz, after scaling by the bandwidth multiplier.
struct Bands {
    main: (f64, f64),
    /// Band carrying the sine-modulated component.
    narrow: (f64, f64),
    /// Band carrying the cosine-modulated component.
    wide: (f64, f64),
}

impl Bands {
    fn new(profile: &FormatProfile, scale: f64) -> Self {
        let constants = profile.constants();
        let carrier = constants.subcarrier_frequency;
        let lower = constants.chroma_bandwidth_lower * scale;
        let upper = constants.chroma_bandwidth_upper * scale;
        Bands {
            main: band_edges(
                (constants.main_bandwidth - constants.side_bandwidth) * 0.5,
                constants.main_bandwidth + constants.side_bandwidth,
                scale,
            ),
            narrow: (carrier - upper, carrier + upper),
            wide: (carrier - lower, carrier + upper),
        }
    }
}

/// Demodulated luma and the two chroma components, each aligned sample-for-sample with the signal.
struct Planes {
    luma: Vec<f64>,
    chroma1: Vec<f64>,
    chroma2: Vec<f64>,
}

fn demodulate_fir(
    profile: &FormatProfile,
    samples: &[f64],
    layout: &ScanlineLayout,
    sample_time: f64,
    settings: &DecodeSettings,
    line_offsets: &[f64],
) -> Planes {
    let sample_rate = profile.effective_sample_rate(samples.len());
    let carrier = profile.carrier_ang_freq();
    let scale = settings.bandwidth_scale;
    let resonance = settings.resonance;
    let constants = profile.constants();
    let bands = Bands::new(profile, scale);

    let main = make_fir_filter(sample_rate, TAP_HALF_WIDTH, bands.main.0, bands.main.1, resonance);
    let narrow = make_fir_filter(sample_rate, TAP_HALF_WIDTH, bands.narrow.0, bands.narrow.1, resonance);
    let wide = make_fir_filter(sample_rate, TAP_HALF_WIDTH, bands.wide.0, bands.wide.1, resonance);
    let narrow_lowpass = make_fir_filter(
        sample_rate,
        TAP_HALF_WIDTH,
        0.0,
        constants.chroma_bandwidth_upper * scale,
        resonance,
    );
    let wide_lowpass = make_fir_filter(
        sample_rate,
        TAP_HALF_WIDTH,
        0.0,
        constants.chroma_bandwidth_lower * scale,
        resonance,
    );
    let crosstalk = settings.crosstalk;
    let notch = wide.notch(1.0 - crosstalk);
    debug!(
        "NTSC FIR decode at {sample_rate:.0} Hz with {} taps per kernel",
        main.len()
    );

    let band_limited = fir_filter(samples, &main);
    let narrow_chroma = fir_filter_crosstalk_shift(&band_limited, &narrow, crosstalk, sample_time, carrier);
    let wide_chroma = fir_filter_crosstalk_shift(&band_limited, &wide, crosstalk, sample_time, carrier);
    let luma = fir_filter(&band_limited, &notch);

    let (chroma1, chroma2) = quadrature_demodulate(
        &narrow_chroma,
        &wide_chroma,
        layout,
        sample_time,
        carrier,
        constants.chroma_phase,
        line_offsets,
    );

    Planes {
        luma,
        chroma1: fir_filter(&chroma1, &narrow_lowpass),
        chroma2: fir_filter(&chroma2, &wide_lowpass),
    }
}

/// Same separation as [`demodulate_fir`], done on the spectrum of the whole frame. The masks' order is the resonance,
/// so low resonances give very gentle band edges.
fn demodulate_spectral(
    profile: &FormatProfile,
    samples: &[f64],
    layout: &ScanlineLayout,
    sample_time: f64,
    settings: &DecodeSettings,
    line_offsets: &[f64],
) -> Planes {
    let len = samples.len();
    let sample_rate = profile.effective_sample_rate(len);
    let order = settings.resonance;
    let chroma_strength = 1.0 - settings.crosstalk;
    let bands = Bands::new(profile, settings.bandwidth_scale);

    let mut spectrum = fourier_transform(samples);
    band_pass_filter(&mut spectrum, sample_rate, bands.main.0, bands.main.1, order, 1.0);

    let mut narrow = spectrum.clone();
    band_pass_filter(&mut narrow, sample_rate, bands.narrow.0, bands.narrow.1, order, chroma_strength);
    one_sided(&mut narrow);
    let mut wide = spectrum.clone();
    band_pass_filter(&mut wide, sample_rate, bands.wide.0, bands.wide.1, order, chroma_strength);
    one_sided(&mut wide);

    let mut luma_spectrum = spectrum;
    notch_filter(&mut luma_spectrum, sample_rate, bands.wide.0, bands.wide.1, order, chroma_strength);
    let luma: Vec<f64> = inverse_fourier_transform(&luma_spectrum)
        .iter()
        .map(|value| value.re)
        .collect();

    // Whole bins move the subcarrier to DC; whatever is left over is removed by the reference oscillator below.
    let duration = len as f64 * sample_time;
    let carrier_bins = (profile.constants().subcarrier_frequency * duration).round();
    let residual = profile.carrier_ang_freq() - 2.0 * std::f64::consts::PI * carrier_bins / duration;
    debug!("NTSC spectral decode: {len} bins, subcarrier at bin {carrier_bins}");

    let narrow = inverse_fourier_transform(&shift_spectrum(&narrow, -carrier_bins));
    let wide = inverse_fourier_transform(&shift_spectrum(&wide, -carrier_bins));

    let mut chroma1 = vec![0.0; len];
    let mut chroma2 = vec![0.0; len];
    let chroma_phase = profile.constants().chroma_phase;
    for (line, offset) in line_offsets.iter().enumerate() {
        for position in layout.segment(line) {
            let reference = Complex64::from_polar(
                1.0,
                -(residual * position as f64 * sample_time + chroma_phase + offset),
            );
            chroma1[position] = -(narrow[position] * reference).im;
            chroma2[position] = (wide[position] * reference).re;
        }
    }

    Planes {
        luma,
        chroma1,
        chroma2,
    }
}

pub(crate) fn decode<R: Rng + ?Sized>(
    profile: &FormatProfile,
    signal: &Signal,
    active_width: usize,
    settings: &DecodeSettings,
    rng: &mut R,
) -> RgbaImage {
    let layout = ScanlineLayout::new(profile, &signal.boundary_points, active_width);
    let sample_time = profile.sample_time(active_width);
    let line_offsets = line_phase_offsets(layout.video_scanlines(), settings, rng);

    let planes = match settings.demodulation {
        Demodulation::Fir => demodulate_fir(profile, &signal.samples, &layout, sample_time, settings, &line_offsets),
        Demodulation::Spectral => {
            demodulate_spectral(profile, &signal.samples, &layout, sample_time, settings, &line_offsets)
        }
    };

    rasterize(profile, &layout, active_width, settings, rng, |line, offset| {
        DVec3::new(
            plane_at(&planes.luma, &layout, line, offset),
            plane_at(&planes.chroma1, &layout, line, offset),
            plane_at(&planes.chroma2, &layout, line, offset),
        )
    })
}

#[cfg(test)]
mod tests {
    use image::Rgba;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;
    use crate::format::Standard;

    #[test]
    fn gray_carries_no_chroma() {
        let profile = FormatProfile::new(Standard::Ntsc, true);
        let image = RgbaImage::from_pixel(64, 480, Rgba([128, 128, 128, 255]));
        let signal = encode(&profile, &image);
        let expected = (128.0f64 / 255.0).powf(2.2);
        let layout = ScanlineLayout::new(&profile, &signal.boundary_points, 64);
        let start = layout.active_start(10);
        for sample in &signal.samples[start..start + 64] {
            assert!((sample - expected).abs() < 1e-12);
        }
        // Blanking between active windows stays at zero.
        assert_eq!(signal.samples[layout.segment(10).start], 0.0);
    }

    #[test]
    fn bands_follow_the_multiplier() {
        let profile = FormatProfile::new(Standard::Ntsc, true);
        let full = Bands::new(&profile, 1.0);
        assert_eq!(full.main, (-1.0e6, 4.2e6));
        assert!((full.narrow.1 - full.narrow.0 - 1.24e6).abs() < 1e-3);
        assert!((full.wide.0 - (3_579_545.0 - 1.3e6)).abs() < 1e-3);

        let half = Bands::new(&profile, 0.5);
        assert_eq!(half.main, (-0.5e6, 2.1e6));
        assert!((half.narrow.1 - half.narrow.0 - 0.62e6).abs() < 1e-3);
    }

    #[test]
    fn phase_error_rotates_hue() {
        let profile = FormatProfile::new(Standard::Ntsc, true);
        let image = RgbaImage::from_pixel(640, 480, Rgba([160, 48, 48, 255]));
        let signal = crate::codec::encode(&profile, &image).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let settings = DecodeSettings {
            phase_error: 180.0,
            ..Default::default()
        };
        let decoded = crate::codec::decode(&profile, &signal, 640, &settings, &mut rng).unwrap();
        // Inverting both chroma axes turns red towards cyan.
        let pixel = decoded.get_pixel(320, 240);
        assert!(pixel.0[0] < pixel.0[1], "{pixel:?}");
        assert!(pixel.0[0] < pixel.0[2], "{pixel:?}");
    }
}
