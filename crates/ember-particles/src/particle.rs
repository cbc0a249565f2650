//! Particle records stored in a system's pool.

use ember_common::Colour;
use glam::Vec3;

/// What a pooled particle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParticleKind {
    /// An ordinary visual particle.
    #[default]
    Visual,
    /// An emitter instance living as a particle.
    Emitter,
}

/// A single particle.
///
/// Particles are plain values; the owning system keeps them in an arena and
/// recycles slots between its free and active lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position in world space (or system space when kept local)
    pub position: Vec3,
    /// Direction and speed, in units per second
    pub direction: Vec3,
    /// Seconds left to live
    pub time_to_live: f32,
    /// Lifetime the particle was born with
    pub total_time_to_live: f32,
    /// Current colour
    pub colour: Colour,
    /// Rotation in radians
    pub rotation: f32,
    /// Rotation speed in radians per second
    pub rotation_speed: f32,
    width: f32,
    height: f32,
    own_dimensions: bool,
    kind: ParticleKind,
}

impl Default for Particle {
    fn default() -> Self {
        Self::new(ParticleKind::Visual)
    }
}

impl Particle {
    /// Creates a blank particle of the given kind.
    #[must_use]
    pub const fn new(kind: ParticleKind) -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::ZERO,
            time_to_live: 10.0,
            total_time_to_live: 10.0,
            colour: Colour::WHITE,
            rotation: 0.0,
            rotation_speed: 0.0,
            width: 0.0,
            height: 0.0,
            own_dimensions: false,
            kind,
        }
    }

    /// Returns what this particle represents.
    #[must_use]
    pub const fn kind(&self) -> ParticleKind {
        self.kind
    }

    /// Whether this particle is an emitted emitter.
    #[must_use]
    pub const fn is_emitter(&self) -> bool {
        matches!(self.kind, ParticleKind::Emitter)
    }

    /// Gives the particle its own size instead of the system default.
    pub fn set_dimensions(&mut self, width: f32, height: f32) {
        self.own_dimensions = true;
        self.width = width;
        self.height = height;
    }

    /// Falls back to the system's default dimensions.
    pub fn reset_dimensions(&mut self) {
        self.own_dimensions = false;
    }

    /// Whether the particle overrides the default dimensions.
    #[must_use]
    pub const fn has_own_dimensions(&self) -> bool {
        self.own_dimensions
    }

    /// The particle's own `(width, height)`, if it has any.
    #[must_use]
    pub const fn own_dimensions(&self) -> Option<(f32, f32)> {
        if self.own_dimensions {
            Some((self.width, self.height))
        } else {
            None
        }
    }

    /// Resolves the particle size against the system defaults.
    #[must_use]
    pub fn dimensions_or(&self, default_width: f32, default_height: f32) -> (f32, f32) {
        self.own_dimensions()
            .unwrap_or((default_width, default_height))
    }

    /// Fraction of the lifetime already used, in `[0, 1]`.
    #[must_use]
    pub fn age_fraction(&self) -> f32 {
        if self.total_time_to_live <= 0.0 {
            return 1.0;
        }
        (1.0 - self.time_to_live / self.total_time_to_live).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_particle_uses_default_dimensions() {
        let p = Particle::new(ParticleKind::Visual);
        assert!(!p.has_own_dimensions());
        assert_eq!(p.dimensions_or(100.0, 50.0), (100.0, 50.0));
        assert!(!p.is_emitter());
    }

    #[test]
    fn test_own_dimensions() {
        let mut p = Particle::new(ParticleKind::Emitter);
        p.set_dimensions(4.0, 2.0);
        assert_eq!(p.own_dimensions(), Some((4.0, 2.0)));
        assert_eq!(p.dimensions_or(100.0, 100.0), (4.0, 2.0));
        p.reset_dimensions();
        assert_eq!(p.own_dimensions(), None);
        assert!(p.is_emitter());
    }

    #[test]
    fn test_age_fraction() {
        let mut p = Particle::default();
        p.total_time_to_live = 4.0;
        p.time_to_live = 1.0;
        assert!((p.age_fraction() - 0.75).abs() < f32::EPSILON);
    }
}
