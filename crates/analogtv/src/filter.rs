use std::f64::consts::PI;
use std::ops::Index;

use log::trace;

/// A two-sided FIR kernel. Tap 0 is the sample being filtered; negative taps reach back into the signal's history and
/// positive taps reach forwards. Applying a symmetric kernel this way doesn't delay the signal, which matters because
/// any delay would show up as the decoded picture sliding sideways.
#[derive(Debug, Clone, PartialEq)]
pub struct FirKernel {
    taps: Vec<f64>,
    backward: usize,
    forward: usize,
}

impl FirKernel {
    /// An all-zero kernel spanning `-backward..=forward`.
    pub fn new(backward: usize, forward: usize) -> Self {
        FirKernel {
            taps: vec![0.0; backward + forward + 1],
            backward,
            forward,
        }
    }

    /// The pass-through kernel.
    pub fn identity() -> Self {
        let mut kernel = Self::new(0, 0);
        kernel.taps[0] = 1.0;
        kernel
    }

    pub fn backward(&self) -> usize {
        self.backward
    }

    pub fn forward(&self) -> usize {
        self.forward
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// All taps, from the furthest-back one to the furthest-forward one.
    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    /// Tap at a signed offset, or 0 if the kernel doesn't reach that far.
    pub fn get(&self, offset: isize) -> f64 {
        let index = offset + self.backward as isize;
        if index < 0 {
            return 0.0;
        }
        self.taps.get(index as usize).copied().unwrap_or(0.0)
    }

    /// Mutable tap at a signed offset.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside `-backward..=forward`. Use [`FirKernel::get`] for a read that treats missing taps
    /// as zero.
    pub fn tap_mut(&mut self, offset: isize) -> &mut f64 {
        let index = (offset + self.backward as isize) as usize;
        &mut self.taps[index]
    }

    /// The complementary kernel: an impulse minus `depth` times this kernel. With `depth` = 1, a band-pass turns into
    /// a notch over the same band; shallower depths let `1 - depth` of the band through.
    pub fn notch(&self, depth: f64) -> FirKernel {
        let mut notch = FirKernel {
            taps: self.taps.iter().map(|tap| -tap * depth).collect(),
            backward: self.backward,
            forward: self.forward,
        };
        *notch.tap_mut(0) += 1.0;
        notch
    }

    /// Multiply every tap by a cosine at `ang_freq`. This splits the kernel's response in two, one copy moved up by the
    /// carrier frequency and one moved down, each at half strength.
    pub fn modulated(&self, ang_freq: f64, sample_time: f64) -> FirKernel {
        let mut shifted = self.clone();
        for offset in -(self.backward as isize)..=(self.forward as isize) {
            *shifted.tap_mut(offset) *= (ang_freq * sample_time * offset as f64).cos();
        }
        shifted
    }

    /// Magnitude of the kernel's frequency response at `freq`.
    pub fn response(&self, freq: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq / sample_rate;
        let (re, im) = (-(self.backward as isize)..=(self.forward as isize)).fold(
            (0.0, 0.0),
            |(re, im), offset| {
                let tap = self.get(offset);
                let arg = omega * offset as f64;
                (re + tap * arg.cos(), im + tap * arg.sin())
            },
        );
        re.hypot(im)
    }
}

/// Indexing by signed offset panics outside `-backward..=forward`, like [`FirKernel::tap_mut`].
impl Index<isize> for FirKernel {
    type Output = f64;

    fn index(&self, offset: isize) -> &f64 {
        &self.taps[(offset + self.backward as isize) as usize]
    }
}

/// Lower and upper edges of a band given by its center and total width, both scaled by `scale`.
pub fn band_edges(center: f64, width: f64, scale: f64) -> (f64, f64) {
    ((center - width * 0.5) * scale, (center + width * 0.5) * scale)
}

/// Design a windowed-sinc band-pass kernel passing `lower..upper` Hz.
///
/// A `lower` edge at or below 0 makes this a lowpass, and edges beyond the Nyquist frequency are pulled back to it; a
/// band that lies entirely above Nyquist produces an all-zero kernel. `resonance` flattens the Hann window: at 1 the
/// window is plain Hann with almost no ringing, and as it grows the window approaches a rectangle, trading a sharper
/// cutoff for Gibbs ringing around edges. The kernel is normalized to unity gain at DC (lowpass) or at the band center.
pub fn make_fir_filter(
    sample_rate: f64,
    half_width: usize,
    lower: f64,
    upper: f64,
    resonance: f64,
) -> FirKernel {
    let nyquist = sample_rate * 0.5;
    let lower = lower.max(0.0);
    let upper = upper.min(nyquist);
    let mut kernel = FirKernel::new(half_width, half_width);
    if upper <= lower {
        trace!("FIR band {lower}..{upper} Hz is empty at {sample_rate} Hz; returning a zero kernel");
        return kernel;
    }

    let lower_norm = lower / sample_rate;
    let upper_norm = upper / sample_rate;
    let window_exponent = resonance.recip();
    let window_span = (half_width + 1) as f64;

    for offset in -(half_width as isize)..=(half_width as isize) {
        let k = offset as f64;
        let ideal = if offset == 0 {
            2.0 * (upper_norm - lower_norm)
        } else {
            ((2.0 * PI * upper_norm * k).sin() - (2.0 * PI * lower_norm * k).sin()) / (PI * k)
        };
        let window = (0.5 + 0.5 * (PI * k / window_span).cos()).powf(window_exponent);
        *kernel.tap_mut(offset) = ideal * window;
    }

    let reference = if lower == 0.0 {
        0.0
    } else {
        0.5 * (lower + upper)
    };
    let gain = kernel.response(reference, sample_rate);
    if gain > f64::EPSILON {
        kernel.taps.iter_mut().for_each(|tap| *tap /= gain);
    }

    trace!(
        "FIR band {lower}..{upper} Hz at {sample_rate} Hz: {} taps, gain correction {gain}",
        kernel.len()
    );
    kernel
}

/// Convolve `signal` with `kernel`, keeping the signal's length. Taps that fall off either end of the signal see zeros.
pub fn fir_filter(signal: &[f64], kernel: &FirKernel) -> Vec<f64> {
    let len = signal.len();
    let mut out = vec![0.0; len];
    if len == 0 {
        return out;
    }

    for (n, dst) in out.iter_mut().enumerate() {
        let history = kernel.backward.min(n);
        let last = (n + kernel.forward).min(len - 1);
        let taps = &kernel.taps[kernel.backward - history..=kernel.backward + (last - n)];
        let window = &signal[n - history..=last];
        *dst = window.iter().zip(taps).map(|(sample, tap)| sample * tap).sum();
    }

    out
}

/// Filter `signal` with `kernel`, then add `crosstalk` worth of the same signal filtered by the kernel moved by the
/// carrier frequency. A chroma band-pass moved down by the subcarrier passes luma, so this lets luma leak into chroma
/// while the band itself keeps its full gain. The opposite direction is a shallower notch; see [`FirKernel::notch`].
pub fn fir_filter_crosstalk_shift(
    signal: &[f64],
    kernel: &FirKernel,
    crosstalk: f64,
    sample_time: f64,
    carrier_ang_freq: f64,
) -> Vec<f64> {
    let mut out = fir_filter(signal, kernel);
    if crosstalk > 0.0 {
        let shifted = kernel.modulated(carrier_ang_freq, sample_time);
        let leaked = fir_filter(signal, &shifted);
        out.iter_mut().zip(leaked).for_each(|(filtered, leaked)| {
            *filtered += leaked * crosstalk;
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f64 = 12_000_000.0;

    fn tone(freq: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| (2.0 * PI * freq * n as f64 / RATE).cos())
            .collect()
    }

    fn rms(samples: &[f64]) -> f64 {
        (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
    }

    #[test]
    fn identity_kernel_passes_signal() {
        let signal = vec![0.25, -1.0, 3.5, 0.0, 2.0];
        assert_eq!(fir_filter(&signal, &FirKernel::identity()), signal);
    }

    #[test]
    fn taps_outside_the_buffer_read_zero() {
        let mut kernel = FirKernel::new(1, 1);
        *kernel.tap_mut(-1) = 1.0;
        *kernel.tap_mut(0) = 1.0;
        *kernel.tap_mut(1) = 1.0;
        let out = fir_filter(&[1.0, 1.0, 1.0], &kernel);
        assert_eq!(out, vec![2.0, 3.0, 2.0]);
    }

    #[test]
    fn asymmetric_kernel_looks_forward_and_back() {
        let mut kernel = FirKernel::new(2, 0);
        *kernel.tap_mut(-2) = 1.0;
        let out = fir_filter(&[1.0, 2.0, 3.0, 4.0], &kernel);
        assert_eq!(out, vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(kernel[-2], 1.0);
        assert_eq!(kernel.get(5), 0.0);
    }

    #[test]
    fn lowpass_has_unity_dc_gain() {
        let kernel = make_fir_filter(RATE, 128, -1_000_000.0, 2_000_000.0, 1.0);
        let out = fir_filter(&vec![0.75; 2000], &kernel);
        assert!((out[1000] - 0.75).abs() < 1e-9);
        assert!((kernel.response(0.0, RATE) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bandpass_keeps_center_and_rejects_dc() {
        let kernel = make_fir_filter(RATE, 256, 2_500_000.0, 4_500_000.0, 1.0);
        assert!((kernel.response(3_500_000.0, RATE) - 1.0).abs() < 1e-9);
        assert!(kernel.response(0.0, RATE) < 1e-4);
        assert!(kernel.response(1_000_000.0, RATE) < 1e-3);

        let out = fir_filter(&tone(3_500_000.0, 4000), &kernel);
        let middle = &out[1000..3000];
        assert!((rms(middle) - 0.5f64.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn band_above_nyquist_is_silent() {
        let kernel = make_fir_filter(RATE, 32, 7_000_000.0, 9_000_000.0, 1.0);
        assert!(kernel.taps().iter().all(|tap| *tap == 0.0));
    }

    #[test]
    fn notch_removes_the_band_and_keeps_dc() {
        let band = make_fir_filter(RATE, 256, 2_500_000.0, 4_500_000.0, 1.0);
        let notch = band.notch(1.0);
        assert!((notch.response(0.0, RATE) - 1.0).abs() < 1e-4);
        assert!(notch.response(3_500_000.0, RATE) < 1e-6);

        let half = band.notch(0.5);
        assert!((half.response(3_500_000.0, RATE) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn higher_resonance_rings_more() {
        let overshoot = |resonance: f64| {
            let kernel = make_fir_filter(RATE, 128, 0.0, 1_000_000.0, resonance);
            let step: Vec<f64> = (0..1000).map(|n| if n >= 500 { 1.0 } else { 0.0 }).collect();
            let out = fir_filter(&step, &kernel);
            out.iter().cloned().fold(f64::MIN, f64::max) - 1.0
        };
        let calm = overshoot(1.0);
        let ringing = overshoot(20.0);
        assert!(calm < 0.01, "Hann window overshoot was {calm}");
        assert!(ringing > 0.05, "flattened window overshoot was {ringing}");
    }

    #[test]
    fn crosstalk_adds_the_shifted_band() {
        let sample_time = RATE.recip();
        let carrier = 2.0 * PI * 3_500_000.0;
        let band = make_fir_filter(RATE, 128, 2_500_000.0, 4_500_000.0, 1.0);
        let dc = vec![1.0; 1000];

        let clean = fir_filter_crosstalk_shift(&dc, &band, 0.0, sample_time, carrier);
        assert_eq!(clean, fir_filter(&dc, &band));
        assert!(clean[500].abs() < 1e-4);

        // Moving the band down by the carrier centers it on DC, so luma leaks straight through.
        let leaky = fir_filter_crosstalk_shift(&dc, &band, 1.0, sample_time, carrier);
        assert!((leaky[500] - 1.0).abs() < 1e-3);
        let partial = fir_filter_crosstalk_shift(&dc, &band, 0.25, sample_time, carrier);
        assert!((partial[500] - 0.25).abs() < 1e-3);

        // The carrier itself still comes through at full strength.
        let carrier_tone = tone(3_500_000.0, 2000);
        let clean = fir_filter_crosstalk_shift(&carrier_tone, &band, 0.0, sample_time, carrier);
        let leaky = fir_filter_crosstalk_shift(&carrier_tone, &band, 1.0, sample_time, carrier);
        let middle = 500..1500;
        assert!((rms(&leaky[middle.clone()]) - rms(&clean[middle])).abs() < 0.02);
    }

    #[test]
    fn band_edges_scale_both_ends() {
        assert_eq!(band_edges(1.6e6, 5.2e6, 1.0), (-1.0e6, 4.2e6));
        assert_eq!(band_edges(2.0, 2.0, 0.5), (0.5, 1.5));
    }
}
