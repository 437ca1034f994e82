//! Color provider: mean color, perceptual and Euclidean color distances,
//! and the label palette used for visualization.
//!
//! Two interchangeable scalar distances are exposed, both normalized by a
//! known range so the merging engine sees values in [0, 1]:
//!
//! | Distance | Space | Range constant |
//! |----------|-------|----------------|
//! | [`rgb_euclidean`] | RGB | [`RGB_RANGE`] (black to white) |
//! | [`lab_ciede2000`] | CIELAB | [`LAB_RANGE`] (nominal ΔE00 scale) |
//!
//! The CIEDE2000 implementation follows Sharma, Wu & Dalal (2005), "The
//! CIEDE2000 color-difference formula: implementation notes".

use crate::cloud::ColoredPoint;

/// Euclidean length of the RGB cube diagonal, the maximum possible
/// [`rgb_euclidean`] value.
pub const RGB_RANGE: f32 = 441.672_96;

/// Nominal scale of the CIEDE2000 distance. ΔE00 between in-gamut sRGB
/// colors stays near 100; normalized values are clamped to [0, 1].
pub const LAB_RANGE: f32 = 100.0;

/// An RGB color, channels in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
}

impl Rgb {
    /// Create a color from channel values in 0..=255.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array, in RGB order.
    pub fn channels(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Mean color over a set of points.
///
/// Returns black for an empty slice; callers keep regions non-empty.
pub fn mean_color(points: &[ColoredPoint]) -> Rgb {
    if points.is_empty() {
        return Rgb::default();
    }
    let n = points.len() as f64;
    let (mut r, mut g, mut b) = (0.0f64, 0.0f64, 0.0f64);
    for p in points {
        r += p.color.r as f64;
        g += p.color.g as f64;
        b += p.color.b as f64;
    }
    Rgb::new((r / n) as f32, (g / n) as f32, (b / n) as f32)
}

/// Plain Euclidean distance in RGB space (unnormalized).
pub fn rgb_euclidean(c1: &Rgb, c2: &Rgb) -> f32 {
    let dr = (c1.r - c2.r) as f64;
    let dg = (c1.g - c2.g) as f64;
    let db = (c1.b - c2.b) as f64;
    (dr * dr + dg * dg + db * db).sqrt() as f32
}

/// CIEDE2000 distance between two RGB colors (unnormalized).
///
/// Colors are converted through sRGB → XYZ (D65) → CIELAB first.
pub fn lab_ciede2000(c1: &Rgb, c2: &Rgb) -> f32 {
    let lab1 = rgb_to_lab(c1);
    let lab2 = rgb_to_lab(c2);
    ciede2000(lab1, lab2) as f32
}

/// Convert an sRGB color (channels 0..=255) to CIELAB under D65.
pub fn rgb_to_lab(c: &Rgb) -> [f64; 3] {
    // sRGB gamma expansion
    fn linearize(u: f64) -> f64 {
        if u > 0.04045 {
            ((u + 0.055) / 1.055).powf(2.4)
        } else {
            u / 12.92
        }
    }
    let r = linearize(c.r as f64 / 255.0);
    let g = linearize(c.g as f64 / 255.0);
    let b = linearize(c.b as f64 / 255.0);

    // sRGB D65 matrix
    let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;

    // D65 reference white
    let (xn, yn, zn) = (0.95047, 1.0, 1.08883);

    fn f(t: f64) -> f64 {
        const DELTA: f64 = 6.0 / 29.0;
        if t > DELTA * DELTA * DELTA {
            t.cbrt()
        } else {
            t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
        }
    }

    let (fx, fy, fz) = (f(x / xn), f(y / yn), f(z / zn));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIEDE2000 over CIELAB triples.
fn ciede2000(lab1: [f64; 3], lab2: [f64; 3]) -> f64 {
    let (l1, a1, b1) = (lab1[0], lab1[1], lab1[2]);
    let (l2, a2, b2) = (lab2[0], lab2[1], lab2[2]);

    let c1 = (a1 * a1 + b1 * b1).sqrt();
    let c2 = (a2 * a2 + b2 * b2).sqrt();
    let c_bar = 0.5 * (c1 + c2);

    let c_bar7 = c_bar.powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + 25.0f64.powi(7))).sqrt());

    let a1p = (1.0 + g) * a1;
    let a2p = (1.0 + g) * a2;
    let c1p = (a1p * a1p + b1 * b1).sqrt();
    let c2p = (a2p * a2p + b2 * b2).sqrt();

    let h1p = hue_deg(b1, a1p);
    let h2p = hue_deg(b2, a2p);

    let dl = l2 - l1;
    let dc = c2p - c1p;

    let dh = if c1p * c2p == 0.0 {
        0.0
    } else {
        let d = h2p - h1p;
        if d.abs() <= 180.0 {
            d
        } else if d > 180.0 {
            d - 360.0
        } else {
            d + 360.0
        }
    };
    let dh_big = 2.0 * (c1p * c2p).sqrt() * (dh.to_radians() / 2.0).sin();

    let l_bar = 0.5 * (l1 + l2);
    let cp_bar = 0.5 * (c1p + c2p);

    let h_bar = if c1p * c2p == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        0.5 * (h1p + h2p)
    } else if h1p + h2p < 360.0 {
        0.5 * (h1p + h2p + 360.0)
    } else {
        0.5 * (h1p + h2p - 360.0)
    };

    let t = 1.0 - 0.17 * (h_bar - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar).to_radians().cos()
        + 0.32 * (3.0 * h_bar + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar - 63.0).to_radians().cos();

    let d_theta = 30.0 * (-((h_bar - 275.0) / 25.0).powi(2)).exp();
    let cp_bar7 = cp_bar.powi(7);
    let rc = 2.0 * (cp_bar7 / (cp_bar7 + 25.0f64.powi(7))).sqrt();
    let rt = -(2.0 * d_theta.to_radians()).sin() * rc;

    let lb2 = (l_bar - 50.0) * (l_bar - 50.0);
    let sl = 1.0 + 0.015 * lb2 / (20.0 + lb2).sqrt();
    let sc = 1.0 + 0.045 * cp_bar;
    let sh = 1.0 + 0.015 * cp_bar * t;

    let (vl, vc, vh) = (dl / sl, dc / sc, dh_big / sh);
    (vl * vl + vc * vc + vh * vh + rt * vc * vh).sqrt()
}

fn hue_deg(b: f64, ap: f64) -> f64 {
    if b == 0.0 && ap == 0.0 {
        return 0.0;
    }
    let h = b.atan2(ap).to_degrees();
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}

/// Deterministic label palette: golden-angle hue stepping in HSV.
///
/// Adjacent labels land on well-separated hues, which is what the colored
/// cloud projection needs; no lookup table required.
pub fn label_color(label: u32) -> Rgb {
    const GOLDEN_ANGLE: f32 = 137.507_77;
    let h = (label as f32 * GOLDEN_ANGLE) % 360.0;
    let (s, v) = (0.85f32, 0.95f32);

    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Rgb::new((r + m) * 255.0, (g + m) * 255.0, (b + m) * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ColoredPoint;
    use approx::assert_relative_eq;

    #[test]
    fn test_rgb_euclidean_extremes() {
        let black = Rgb::new(0.0, 0.0, 0.0);
        let white = Rgb::new(255.0, 255.0, 255.0);
        assert_relative_eq!(rgb_euclidean(&black, &white), RGB_RANGE, epsilon = 1e-2);
        assert_eq!(rgb_euclidean(&black, &black), 0.0);
    }

    #[test]
    fn test_ciede2000_identity_and_symmetry() {
        let a = Rgb::new(120.0, 30.0, 200.0);
        let b = Rgb::new(40.0, 180.0, 90.0);
        assert!(lab_ciede2000(&a, &a).abs() < 1e-6);
        assert_relative_eq!(
            lab_ciede2000(&a, &b),
            lab_ciede2000(&b, &a),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_ciede2000_sharma_reference_pair() {
        // Pair 1 from the Sharma et al. (2005) test data.
        let lab1 = [50.0, 2.6772, -79.7751];
        let lab2 = [50.0, 0.0, -82.7485];
        assert_relative_eq!(ciede2000(lab1, lab2), 2.0425, epsilon = 1e-4);
    }

    #[test]
    fn test_ciede2000_within_nominal_range() {
        let black = Rgb::new(0.0, 0.0, 0.0);
        let white = Rgb::new(255.0, 255.0, 255.0);
        let d = lab_ciede2000(&black, &white);
        assert!(d > 0.0 && d <= LAB_RANGE);
    }

    #[test]
    fn test_mean_color() {
        let pts = vec![
            ColoredPoint::new(0.0, 0.0, 0.0, Rgb::new(0.0, 100.0, 200.0)),
            ColoredPoint::new(1.0, 0.0, 0.0, Rgb::new(100.0, 200.0, 0.0)),
        ];
        let m = mean_color(&pts);
        assert_relative_eq!(m.r, 50.0);
        assert_relative_eq!(m.g, 150.0);
        assert_relative_eq!(m.b, 100.0);
    }

    #[test]
    fn test_label_palette_is_deterministic_and_spread() {
        assert_eq!(label_color(3), label_color(3));
        let d = rgb_euclidean(&label_color(0), &label_color(1));
        assert!(d > 50.0);
    }
}
