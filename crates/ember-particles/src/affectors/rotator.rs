//! Spins particles.

use crate::affector::ParticleAffector;
use crate::params::{self, ParamDef, ParamKind};
use crate::particle::Particle;
use crate::pool::ActiveParticles;
use ember_common::convert::parse_real;
use ember_common::ParamError;

/// Gives each new particle a random rotation and rotation speed, then turns
/// it by its speed every tick.
///
/// Ranges are held in radians and exposed to parameters in degrees.
#[derive(Debug, Clone)]
pub struct RotatorAffector {
    rotation_start: f32,
    rotation_end: f32,
    speed_start: f32,
    speed_end: f32,
    rng: fastrand::Rng,
}

impl Default for RotatorAffector {
    fn default() -> Self {
        Self::new()
    }
}

impl RotatorAffector {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "Rotator";

    /// Creates a rotator with every range at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rotation_start: 0.0,
            rotation_end: 0.0,
            speed_start: 0.0,
            speed_end: 0.0,
            rng: fastrand::Rng::new(),
        }
    }

    /// Initial rotation range, in radians.
    #[must_use]
    pub const fn with_rotation_range(mut self, start: f32, end: f32) -> Self {
        self.rotation_start = start;
        self.rotation_end = end;
        self
    }

    /// Rotation speed range, in radians per second.
    #[must_use]
    pub const fn with_speed_range(mut self, start: f32, end: f32) -> Self {
        self.speed_start = start;
        self.speed_end = end;
        self
    }

    /// Uses a fixed random stream.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    fn range_random(&mut self, start: f32, end: f32) -> f32 {
        if start == end {
            start
        } else {
            start + self.rng.f32() * (end - start)
        }
    }
}

macro_rules! degrees_param {
    ($field:ident, $name:literal, $desc:literal) => {
        ParamDef {
            name: $name,
            description: $desc,
            kind: ParamKind::Real,
            get: |a| a.$field.to_degrees().to_string(),
            set: |a, v| {
                a.$field = parse_real($name, v)?.to_radians();
                Ok(())
            },
        }
    };
}

static ROTATOR_PARAMS: &[ParamDef<RotatorAffector>] = &[
    degrees_param!(speed_start, "rotation_speed_range_start", "The start of a range of rotation speeds to be assigned to emitted particles, in degrees per second."),
    degrees_param!(speed_end, "rotation_speed_range_end", "The end of a range of rotation speeds to be assigned to emitted particles, in degrees per second."),
    degrees_param!(rotation_start, "rotation_range_start", "The start of a range of rotation angles to be assigned to emitted particles, in degrees."),
    degrees_param!(rotation_end, "rotation_range_end", "The end of a range of rotation angles to be assigned to emitted particles, in degrees."),
];

impl ParticleAffector for RotatorAffector {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn init_particle(&mut self, particle: &mut Particle) {
        particle.rotation = self.range_random(self.rotation_start, self.rotation_end);
        particle.rotation_speed = self.range_random(self.speed_start, self.speed_end);
    }

    fn affect_particles(&mut self, particles: &mut ActiveParticles<'_>, dt: f32) {
        particles.for_each_mut(|p| p.rotation += p.rotation_speed * dt);
    }

    fn clone_affector(&self) -> Box<dyn ParticleAffector> {
        // Fresh stream so copies do not spin in lockstep
        Box::new(Self {
            rng: fastrand::Rng::new(),
            ..self.clone()
        })
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        params::set_in(ROTATOR_PARAMS, self, name, value)
            .unwrap_or_else(|| Err(params::unknown(Self::TYPE_NAME, name)))
    }

    fn parameter(&self, name: &str) -> Option<String> {
        params::get_in(ROTATOR_PARAMS, self, name)
    }

    fn parameter_names(&self) -> Vec<&'static str> {
        params::names_of(ROTATOR_PARAMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ParticleRef;
    use std::f32::consts::PI;

    #[test]
    fn test_init_draws_within_ranges() {
        let mut rotator = RotatorAffector::new()
            .with_rotation_range(0.0, PI)
            .with_speed_range(-1.0, 1.0)
            .with_seed(3);
        for _ in 0..50 {
            let mut p = Particle::default();
            rotator.init_particle(&mut p);
            assert!((0.0..=PI).contains(&p.rotation));
            assert!((-1.0..=1.0).contains(&p.rotation_speed));
        }
    }

    #[test]
    fn test_spins_by_speed() {
        let mut rotator = RotatorAffector::new().with_speed_range(2.0, 2.0);
        let handles = [ParticleRef::Visual(0)];
        let mut pool = [Particle::default()];
        rotator.init_particle(&mut pool[0]);
        assert_eq!(pool[0].rotation, 0.0);
        assert_eq!(pool[0].rotation_speed, 2.0);

        let mut view = ActiveParticles::new(&handles, &mut pool, &mut [], (1.0, 1.0));
        rotator.affect_particles(&mut view, 0.5);
        rotator.affect_particles(&mut view, 0.25);
        assert_eq!(pool[0].rotation, 1.5);
    }

    #[test]
    fn test_parameters_in_degrees() {
        let mut rotator = RotatorAffector::new();
        rotator.set_parameter("rotation_speed_range_start", "180").unwrap();
        rotator.set_parameter("rotation_speed_range_end", "180").unwrap();
        let mut p = Particle::default();
        rotator.init_particle(&mut p);
        assert!((p.rotation_speed - PI).abs() < 1e-6);

        assert_eq!(rotator.parameter_names().len(), 4);
        assert!(rotator.parameter("rotation_range_start").is_some());
        assert!(rotator.set_parameter("rotation_speed_range_start", "fast").is_err());
        assert!(rotator.set_parameter("spin", "1").is_err());
    }
}
