//! Wet-bus summing and equal-power panning.

/*
Summing and Panning
===================

The wet bus SUMS band outputs without weighting, which is exactly why the
safety chain sits after it. The final dry/wet combine is not a unit-sum
crossfade: the dry branch carries its own level and pan gains, so the matrix
mixes `dry * dry_gain + wet * wet_mix` inline.

Panning uses the equal-power law rather than linear weights. With linear
weights a center pan plays both channels at 0.5 and the source audibly dips;
power, not amplitude, is what the ear tracks. Mapping pan in [-1, +1] onto a
quarter circle,

    angle = (pan + 1) * 0.25 * pi        (0 at hard left, pi/2 at hard right)
    left  = cos(angle)
    right = sin(angle)

keeps left^2 + right^2 == 1 everywhere, so perceived loudness is constant
across the sweep and the center sits at 0.7071 per channel.
*/

use std::f32::consts::PI;

/// Add signal B into signal A in place (unweighted wet-bus summing).
///
/// The sum can exceed [-1.0, +1.0]; the caller is expected to limit after.
#[inline]
pub fn sum_in_place(a: &mut [f32], b: &[f32]) {
    debug_assert_eq!(a.len(), b.len());

    for (sa, &sb) in a.iter_mut().zip(b.iter()) {
        *sa += sb;
    }
}

/// Equal-power stereo pan gains for `pan` in [-1.0, +1.0].
///
/// Returns `(left_gain, right_gain)` with constant combined power.
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    let angle = (pan + 1.0) * 0.25 * PI;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_can_exceed_one() {
        let mut a = [1.0, 0.5];
        let b = [1.0, 0.8];

        sum_in_place(&mut a, &b);

        assert_eq!(a[0], 2.0); // Exceeds 1.0, the limiter handles it
        assert_eq!(a[1], 1.3);
    }

    #[test]
    fn test_pan_extremes() {
        let (l, r) = equal_power_pan(-1.0);
        assert!((l - 1.0).abs() < 1e-6);
        assert!(r.abs() < 1e-6);

        let (l, r) = equal_power_pan(1.0);
        assert!(l.abs() < 1e-6);
        assert!((r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pan_center_is_minus_3db() {
        let (l, r) = equal_power_pan(0.0);
        assert!((l - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((r - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_pan_power_is_constant() {
        for i in 0..=20 {
            let pan = -1.0 + i as f32 * 0.1;
            let (l, r) = equal_power_pan(pan);
            assert!((l * l + r * r - 1.0).abs() < 1e-5, "pan {} broke power", pan);
        }
    }

    #[test]
    fn test_pan_out_of_range_clamps() {
        assert_eq!(equal_power_pan(-5.0), equal_power_pan(-1.0));
        assert_eq!(equal_power_pan(5.0), equal_power_pan(1.0));
    }
}
