//! Fixed color ramps for index rendering.
//!
//! Each ramp is a table of interpolation stops over [0, 1]. The anchor
//! colors follow the ColorBrewer RdYlGn table (vegetation) and the
//! Moreland cool-warm table (built-up), so renders match the usual look
//! of these indices while staying byte-reproducible.

/// A piecewise-linear color ramp.
#[derive(Debug, Clone, Copy)]
pub struct ColorRamp {
    name: &'static str,
    stops: &'static [(f32, [u8; 3])],
}

/// Red through yellow to green; used for NDVI.
pub const RED_YELLOW_GREEN: ColorRamp = ColorRamp {
    name: "red-yellow-green",
    stops: &[
        (0.0, [165, 0, 38]),
        (0.25, [244, 109, 67]),
        (0.5, [255, 255, 191]),
        (0.75, [102, 189, 99]),
        (1.0, [0, 104, 55]),
    ],
};

/// Diverging blue to red through neutral gray; used for NDBI.
pub const BLUE_RED_DIVERGING: ColorRamp = ColorRamp {
    name: "blue-red-diverging",
    stops: &[
        (0.0, [59, 76, 192]),
        (0.25, [124, 159, 249]),
        (0.5, [221, 221, 221]),
        (0.75, [229, 118, 90]),
        (1.0, [180, 4, 38]),
    ],
};

impl ColorRamp {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Sample the ramp at `t`, clamped to [0, 1]. NaN maps to the low
    /// end; callers are expected to mask nodata before sampling.
    pub fn sample(&self, t: f32) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let mut lower = self.stops[0];
        for &upper in &self.stops[1..] {
            if t <= upper.0 {
                let span = upper.0 - lower.0;
                let frac = if span > 0.0 { (t - lower.0) / span } else { 0.0 };
                let mut rgb = [0u8; 3];
                for c in 0..3 {
                    let a = lower.1[c] as f32;
                    let b = upper.1[c] as f32;
                    rgb[c] = (a + (b - a) * frac).round() as u8;
                }
                return rgb;
            }
            lower = upper;
        }
        self.stops[self.stops.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_names_are_stable() {
        // The names appear in render logs; keep them fixed.
        assert_eq!(RED_YELLOW_GREEN.name(), "red-yellow-green");
        assert_eq!(BLUE_RED_DIVERGING.name(), "blue-red-diverging");
    }

    #[test]
    fn test_ramp_endpoints_are_exact() {
        assert_eq!(RED_YELLOW_GREEN.sample(0.0), [165, 0, 38]);
        assert_eq!(RED_YELLOW_GREEN.sample(1.0), [0, 104, 55]);
        assert_eq!(BLUE_RED_DIVERGING.sample(0.0), [59, 76, 192]);
        assert_eq!(BLUE_RED_DIVERGING.sample(1.0), [180, 4, 38]);
    }

    #[test]
    fn test_midpoints_hit_center_stops() {
        assert_eq!(RED_YELLOW_GREEN.sample(0.5), [255, 255, 191]);
        assert_eq!(BLUE_RED_DIVERGING.sample(0.5), [221, 221, 221]);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        assert_eq!(RED_YELLOW_GREEN.sample(-3.0), RED_YELLOW_GREEN.sample(0.0));
        assert_eq!(RED_YELLOW_GREEN.sample(7.5), RED_YELLOW_GREEN.sample(1.0));
        assert_eq!(
            BLUE_RED_DIVERGING.sample(f32::NAN),
            BLUE_RED_DIVERGING.sample(0.0)
        );
    }

    #[test]
    fn test_interpolation_is_between_stops() {
        // Halfway between (0.5, 221) and (0.75, 229) red channel.
        let [r, _, _] = BLUE_RED_DIVERGING.sample(0.625);
        assert_eq!(r, 225);
    }
}
