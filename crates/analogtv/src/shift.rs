use std::ops::{Add, Mul};

/// Shift a periodic row by a non-integer amount using linear interpolation, wrapping around the ends the way DFT bins
/// do. A positive shift moves the contents towards higher indices.
pub fn shift_row_wrapping<T>(src: &[T], dst: &mut [T], shift: f64)
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    if src.is_empty() {
        return;
    }

    let width = src.len() as i64;
    let at = |index: i64| src[index.rem_euclid(width) as usize];
    // Split into a whole part rounded down and a fraction in [0, 1).
    let shift_int = shift.floor() as i64;
    let shift_frac = shift - shift.floor();

    for (i, dst) in dst.iter_mut().enumerate().take(src.len()) {
        let source = i as i64 - shift_int;
        *dst = at(source) * (1.0 - shift_frac) + at(source - 1) * shift_frac;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_shift_wraps_around() {
        let src = [1.0, 2.0, 3.0, 4.0];
        let mut dst = [0.0; 4];
        shift_row_wrapping(&src, &mut dst, 1.0);
        assert_eq!(dst, [4.0, 1.0, 2.0, 3.0]);
        shift_row_wrapping(&src, &mut dst, -1.0);
        assert_eq!(dst, [2.0, 3.0, 4.0, 1.0]);
        shift_row_wrapping(&src, &mut dst, 5.0);
        assert_eq!(dst, [4.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn fractional_shift_interpolates() {
        let src = [0.0, 10.0, 20.0, 30.0];
        let mut dst = [0.0; 4];
        shift_row_wrapping(&src, &mut dst, 0.5);
        assert_eq!(dst, [15.0, 5.0, 15.0, 25.0]);
        // -0.25 splits into -1 and 0.75: three quarters of each sample plus a quarter of its successor.
        shift_row_wrapping(&src, &mut dst, -0.25);
        assert_eq!(dst, [2.5, 12.5, 22.5, 22.5]);
    }
}
