//! Emitter that releases every particle from a single point.

use crate::emitter::{EmitterCore, ParticleEmitter};
use crate::particle::Particle;

/// Emits particles from the emitter position.
#[derive(Debug, Clone, Default)]
pub struct PointEmitter {
    core: EmitterCore,
}

impl PointEmitter {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "Point";

    /// Creates a point emitter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParticleEmitter for PointEmitter {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn core(&self) -> &EmitterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EmitterCore {
        &mut self.core
    }

    fn init_particle(&mut self, particle: &mut Particle) {
        let position = self.core.position();
        self.core.init_particle_at(particle, position);
    }

    fn clone_emitter(&self) -> Box<dyn ParticleEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::ParamError;
    use glam::Vec3;

    #[test]
    fn test_particles_start_at_emitter() {
        let mut emitter = PointEmitter::new();
        emitter.set_parameter("position", "1 2 3").unwrap();
        let mut p = Particle::default();
        emitter.init_particle(&mut p);
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.direction, Vec3::X);
    }

    #[test]
    fn test_unknown_parameter_names_type() {
        let mut emitter = PointEmitter::new();
        let err = emitter.set_parameter("width", "3").unwrap_err();
        assert_eq!(
            err,
            ParamError::UnknownParameter {
                owner: "Point".into(),
                name: "width".into(),
            }
        );
    }

    #[test]
    fn test_clone_copies_parameters() {
        let mut emitter = PointEmitter::new();
        emitter.set_parameter("emission_rate", "42").unwrap();
        emitter.set_parameter("name", "spark").unwrap();
        let copy = emitter.clone_emitter();
        assert_eq!(copy.type_name(), "Point");
        assert_eq!(copy.core().emission_rate(), 42.0);
        assert_eq!(copy.parameter("name").as_deref(), Some("spark"));
    }
}
