use glam::DVec3;

/// The nonlinear transfer applied to RGB before modulation and undone after demodulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferCurve {
    /// Plain power law. Encoding raises to `source`, decoding to `1 / monitor`.
    Power { source: f64, monitor: f64 },
    /// sRGB linearization followed by a `1 / gamma` power law; decoding reverses both steps.
    SrgbPower { gamma: f64 },
}

impl TransferCurve {
    pub fn encode(&self, value: f64) -> f64 {
        match self {
            TransferCurve::Power { source, .. } => value.max(0.0).powf(*source),
            TransferCurve::SrgbPower { gamma } => srgb_to_linear(value).max(0.0).powf(gamma.recip()),
        }
    }

    pub fn decode(&self, value: f64) -> f64 {
        match self {
            TransferCurve::Power { monitor, .. } => value.max(0.0).powf(monitor.recip()),
            TransferCurve::SrgbPower { gamma } => linear_to_srgb(value.max(0.0).powf(*gamma)),
        }
    }

    pub fn encode_rgb(&self, rgb: DVec3) -> DVec3 {
        DVec3::new(self.encode(rgb.x), self.encode(rgb.y), self.encode(rgb.z))
    }

    pub fn decode_rgb(&self, rgb: DVec3) -> DVec3 {
        DVec3::new(self.decode(rgb.x), self.decode(rgb.y), self.decode(rgb.z))
    }
}

pub fn srgb_to_linear(value: f64) -> f64 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(value: f64) -> f64 {
    if value <= 0.0031308 {
        value * 12.92
    } else {
        1.055 * value.powf(2.4f64.recip()) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_invert() {
        let curves = [
            TransferCurve::Power {
                source: 2.2,
                monitor: 2.2,
            },
            TransferCurve::SrgbPower { gamma: 2.8 },
        ];
        for curve in curves {
            for value in [0.0, 0.002, 0.2, 0.5, 0.9, 1.0] {
                let back = curve.decode(curve.encode(value));
                assert!((back - value).abs() < 1e-9, "{curve:?} at {value}: {back}");
            }
        }
    }

    #[test]
    fn negative_inputs_do_not_produce_nan() {
        let curve = TransferCurve::Power {
            source: 2.2,
            monitor: 2.2,
        };
        assert_eq!(curve.decode(-0.1), 0.0);
        assert_eq!(TransferCurve::SrgbPower { gamma: 2.8 }.decode(-0.5), 0.0);
    }

    #[test]
    fn srgb_segments_meet() {
        assert!((srgb_to_linear(0.04045) - 0.0031308).abs() < 1e-6);
        assert!((linear_to_srgb(srgb_to_linear(0.73)) - 0.73).abs() < 1e-12);
    }
}
