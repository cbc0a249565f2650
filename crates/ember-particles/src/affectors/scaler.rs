//! Grows or shrinks particles over time.

use crate::affector::ParticleAffector;
use crate::params::{self, ParamDef, ParamKind};
use crate::pool::ActiveParticles;
use ember_common::convert::parse_real;
use ember_common::ParamError;

/// Adds `rate` units per second to particle width and height.
///
/// Particles still using the system default size get their own dimensions
/// on the first tick. Sizes never go below zero.
#[derive(Debug, Clone, Default)]
pub struct ScalerAffector {
    rate: f32,
}

impl ScalerAffector {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "Scaler";

    /// Creates a scaler with the given rate in units per second.
    #[must_use]
    pub const fn new(rate: f32) -> Self {
        Self { rate }
    }

    /// Units per second added to each dimension.
    #[must_use]
    pub const fn rate(&self) -> f32 {
        self.rate
    }
}

static SCALER_PARAMS: &[ParamDef<ScalerAffector>] = &[ParamDef {
    name: "rate",
    description: "The amount by which to adjust the x and y scale components of particles \
                  per second.",
    kind: ParamKind::Real,
    get: |a| a.rate.to_string(),
    set: |a, v| {
        a.rate = parse_real("rate", v)?;
        Ok(())
    },
}];

impl ParticleAffector for ScalerAffector {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn affect_particles(&mut self, particles: &mut ActiveParticles<'_>, dt: f32) {
        let ds = self.rate * dt;
        let (default_width, default_height) = particles.default_dimensions();
        particles.for_each_mut(|p| {
            let (width, height) = p.dimensions_or(default_width, default_height);
            p.set_dimensions((width + ds).max(0.0), (height + ds).max(0.0));
        });
    }

    fn clone_affector(&self) -> Box<dyn ParticleAffector> {
        Box::new(self.clone())
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        params::set_in(SCALER_PARAMS, self, name, value)
            .unwrap_or_else(|| Err(params::unknown(Self::TYPE_NAME, name)))
    }

    fn parameter(&self, name: &str) -> Option<String> {
        params::get_in(SCALER_PARAMS, self, name)
    }

    fn parameter_names(&self) -> Vec<&'static str> {
        params::names_of(SCALER_PARAMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use crate::pool::ParticleRef;

    #[test]
    fn test_scales_from_defaults_then_own_size() {
        let mut scaler = ScalerAffector::new(10.0);
        let handles = [ParticleRef::Visual(0), ParticleRef::Visual(1)];
        let mut pool = [Particle::default(), Particle::default()];
        pool[1].set_dimensions(1.0, 2.0);

        let mut view = ActiveParticles::new(&handles, &mut pool, &mut [], (100.0, 50.0));
        scaler.affect_particles(&mut view, 0.5);

        assert_eq!(pool[0].own_dimensions(), Some((105.0, 55.0)));
        assert_eq!(pool[1].own_dimensions(), Some((6.0, 7.0)));
    }

    #[test]
    fn test_shrinking_clamps_at_zero() {
        let mut scaler = ScalerAffector::default();
        scaler.set_parameter("rate", "-4").unwrap();
        let handles = [ParticleRef::Visual(0)];
        let mut pool = [Particle::default()];
        pool[0].set_dimensions(1.0, 3.0);

        let mut view = ActiveParticles::new(&handles, &mut pool, &mut [], (1.0, 1.0));
        scaler.affect_particles(&mut view, 0.5);
        assert_eq!(pool[0].own_dimensions(), Some((0.0, 1.0)));
    }
}
