//! RGBA colour values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A floating point RGBA colour, each channel nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Colour {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel
    pub a: f32,
}

impl Colour {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Creates a colour from its four channels.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque colour.
    #[must_use]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Linear interpolation towards `other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    /// Picks a colour between `start` and `end`, drawing an independent
    /// random factor for every channel.
    #[must_use]
    pub fn random_between(start: Self, end: Self, rng: &mut fastrand::Rng) -> Self {
        if start == end {
            return start;
        }
        Self::new(
            start.r + rng.f32() * (end.r - start.r),
            start.g + rng.f32() * (end.g - start.g),
            start.b + rng.f32() * (end.b - start.b),
            start.a + rng.f32() * (end.a - start.a),
        )
    }

    /// Clamps every channel to `[0, 1]`.
    #[must_use]
    pub fn saturated(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    /// Returns the channels as an array.
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Colour {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.r, self.g, self.b, self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_midpoint() {
        let c = Colour::BLACK.lerp(Colour::WHITE, 0.5);
        assert!((c.r - 0.5).abs() < f32::EPSILON);
        assert!((c.a - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_random_between_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        let start = Colour::new(0.2, 0.0, 0.5, 1.0);
        let end = Colour::new(0.4, 1.0, 0.5, 0.0);
        for _ in 0..100 {
            let c = Colour::random_between(start, end, &mut rng);
            assert!((0.2..=0.4).contains(&c.r));
            assert!((0.0..=1.0).contains(&c.g));
            assert!((c.b - 0.5).abs() < f32::EPSILON);
            assert!((0.0..=1.0).contains(&c.a));
        }
    }

    #[test]
    fn test_equal_range_is_constant() {
        let mut rng = fastrand::Rng::with_seed(1);
        let c = Colour::rgb(0.3, 0.6, 0.9);
        assert_eq!(Colour::random_between(c, c, &mut rng), c);
    }

    #[test]
    fn test_saturated() {
        let c = Colour::new(1.5, -0.2, 0.5, 2.0).saturated();
        assert_eq!(c, Colour::new(1.0, 0.0, 0.5, 1.0));
    }
}
