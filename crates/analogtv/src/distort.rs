//! Channel impairments applied to the composite signal between encoding and decoding.

use rand::Rng;

/// Soft-clip curve: a tanh through (0.5, 0.5) scaled so that 0 and 1 still map to 0 and 1.
fn ramp_curve(sample: f64, ramp: f64) -> f64 {
    0.5 + (ramp * (sample - 0.5)).tanh() / (2.0 * (ramp / 2.0).tanh())
}

/// Add uniform noise of amplitude `noise` to every sample, then soft-clip by `ramp` (0 disables the clip).
pub fn distort_signal<R: Rng + ?Sized>(samples: &mut [f64], noise: f64, ramp: f64, rng: &mut R) {
    if noise > 0.0 {
        for sample in samples.iter_mut() {
            *sample += (2.0 * rng.random::<f64>() - 1.0) * noise;
        }
    }
    if ramp != 0.0 {
        for sample in samples.iter_mut() {
            *sample = ramp_curve(*sample, ramp);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;

    #[test]
    fn neutral_settings_leave_signal_alone() {
        let mut samples = vec![0.1, 0.5, 0.9];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        distort_signal(&mut samples, 0.0, 0.0, &mut rng);
        assert_eq!(samples, vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn noise_is_bounded_and_reproducible() {
        let mut a = vec![0.5; 1000];
        let mut b = vec![0.5; 1000];
        distort_signal(&mut a, 0.1, 0.0, &mut Xoshiro256PlusPlus::seed_from_u64(5));
        distort_signal(&mut b, 0.1, 0.0, &mut Xoshiro256PlusPlus::seed_from_u64(5));
        assert_eq!(a, b);
        assert!(a.iter().all(|s| (s - 0.5).abs() <= 0.1));
        assert!(a.iter().any(|s| (s - 0.5).abs() > 0.05));
    }

    #[test]
    fn ramp_keeps_endpoints_and_steepens_midtones() {
        for ramp in [0.5, 3.0, 10.0] {
            assert!((ramp_curve(0.0, ramp)).abs() < 1e-12);
            assert!((ramp_curve(1.0, ramp) - 1.0).abs() < 1e-12);
            assert!((ramp_curve(0.5, ramp) - 0.5).abs() < 1e-12);
        }
        assert!(ramp_curve(0.6, 5.0) > 0.6);
        assert!(ramp_curve(0.4, 5.0) < 0.4);
    }
}
