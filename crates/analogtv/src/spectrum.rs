//! Frequency-domain counterparts of the FIR filter bank, used by the spectral NTSC demodulator.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use crate::shift::shift_row_wrapping;

/// Forward DFT of a real signal.
pub fn fourier_transform(signal: &[f64]) -> Vec<Complex64> {
    let mut buffer: Vec<Complex64> = signal.iter().map(|&s| Complex64::new(s, 0.0)).collect();
    if buffer.is_empty() {
        return buffer;
    }
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(buffer.len()).process(&mut buffer);
    buffer
}

/// Inverse DFT, normalized so that `inverse_fourier_transform(&fourier_transform(x))` gives back `x`.
pub fn inverse_fourier_transform(spectrum: &[Complex64]) -> Vec<Complex64> {
    let mut buffer = spectrum.to_vec();
    if buffer.is_empty() {
        return buffer;
    }
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_inverse(buffer.len()).process(&mut buffer);
    let scale = (buffer.len() as f64).recip();
    buffer.iter_mut().for_each(|bin| *bin *= scale);
    buffer
}

/// Signed frequency of a DFT bin. Bins past the midpoint hold negative frequencies.
pub fn bin_frequency(bin: usize, len: usize, sample_rate: f64) -> f64 {
    let signed = if bin <= len / 2 {
        bin as f64
    } else {
        bin as f64 - len as f64
    };
    signed * sample_rate / len as f64
}

/// Butterworth-style magnitude for the band `lower..upper`, evaluated on `|freq|`. A band starting at or below 0 is
/// a lowpass; `order` steepens the rolloff the same way resonance sharpens the FIR kernels.
fn band_mask(freq: f64, lower: f64, upper: f64, order: f64) -> f64 {
    let freq = freq.abs();
    let distance = if lower <= 0.0 {
        freq / upper
    } else {
        let half_width = (upper - lower) * 0.5;
        (freq - (lower + upper) * 0.5) / half_width
    };
    (1.0 + (distance * distance).powf(order)).sqrt().recip()
}

/// Attenuate everything outside `lower..upper`. `strength` = 0 leaves the spectrum alone and 1 applies the full mask.
pub fn band_pass_filter(
    spectrum: &mut [Complex64],
    sample_rate: f64,
    lower: f64,
    upper: f64,
    order: f64,
    strength: f64,
) {
    let len = spectrum.len();
    for (bin, value) in spectrum.iter_mut().enumerate() {
        let mask = band_mask(bin_frequency(bin, len, sample_rate), lower, upper, order);
        *value *= 1.0 - strength * (1.0 - mask);
    }
}

/// Attenuate everything inside `lower..upper`.
pub fn notch_filter(
    spectrum: &mut [Complex64],
    sample_rate: f64,
    lower: f64,
    upper: f64,
    order: f64,
    strength: f64,
) {
    let len = spectrum.len();
    for (bin, value) in spectrum.iter_mut().enumerate() {
        let mask = band_mask(bin_frequency(bin, len, sample_rate), lower, upper, order);
        *value *= 1.0 - strength * mask;
    }
}

/// Turn the spectrum of a real signal into that of its analytic signal: negative frequencies are dropped and positive
/// ones doubled, so the inverse transform carries amplitude and phase together.
pub fn one_sided(spectrum: &mut [Complex64]) {
    let len = spectrum.len();
    for (bin, value) in spectrum.iter_mut().enumerate().skip(1) {
        if bin * 2 < len {
            *value *= 2.0;
        } else if bin * 2 > len {
            *value = Complex64::new(0.0, 0.0);
        }
    }
}

/// Move every bin by `bins` (positive moves content up in frequency), wrapping around the ends. Fractional amounts
/// interpolate between neighboring bins.
pub fn shift_spectrum(spectrum: &[Complex64], bins: f64) -> Vec<Complex64> {
    let mut shifted = vec![Complex64::new(0.0, 0.0); spectrum.len()];
    shift_row_wrapping(spectrum, &mut shifted, bins);
    shifted
}
