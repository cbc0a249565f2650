//! Constant force applied to every particle.

use crate::affector::ParticleAffector;
use crate::params::{self, ParamDef, ParamKind};
use crate::pool::ActiveParticles;
use ember_common::convert::{format_vec3, parse_vec3};
use ember_common::ParamError;
use glam::Vec3;

/// How the force combines with a particle's direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForceApplication {
    /// Adds `force * dt` to the direction.
    #[default]
    Add,
    /// Replaces the direction with its average with the force.
    Average,
}

impl ForceApplication {
    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Average => "average",
        }
    }
}

/// Applies a force vector (gravity, wind) to all particles.
#[derive(Debug, Clone)]
pub struct LinearForceAffector {
    force: Vec3,
    application: ForceApplication,
}

impl Default for LinearForceAffector {
    fn default() -> Self {
        Self {
            force: Vec3::new(0.0, -100.0, 0.0),
            application: ForceApplication::Add,
        }
    }
}

impl LinearForceAffector {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "LinearForce";

    /// Creates the affector with a downward force of 100 units.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the force vector.
    #[must_use]
    pub const fn with_force(mut self, force: Vec3) -> Self {
        self.force = force;
        self
    }

    /// Sets how the force is applied.
    #[must_use]
    pub const fn with_application(mut self, application: ForceApplication) -> Self {
        self.application = application;
        self
    }

    /// The force vector.
    #[must_use]
    pub const fn force(&self) -> Vec3 {
        self.force
    }

    /// How the force is applied.
    #[must_use]
    pub const fn application(&self) -> ForceApplication {
        self.application
    }
}

static LINEAR_FORCE_PARAMS: &[ParamDef<LinearForceAffector>] = &[
    ParamDef {
        name: "force_vector",
        description: "The vector representing the force to apply.",
        kind: ParamKind::Vector3,
        get: |a| format_vec3(a.force),
        set: |a, v| {
            a.force = parse_vec3("force_vector", v)?;
            Ok(())
        },
    },
    ParamDef {
        name: "force_application",
        description: "How to apply the force vector to particles: 'add' or 'average'.",
        kind: ParamKind::String,
        get: |a| a.application.as_str().to_string(),
        set: |a, v| {
            a.application = match v.trim() {
                "add" => ForceApplication::Add,
                "average" => ForceApplication::Average,
                _ => {
                    return Err(ParamError::InvalidValue {
                        name: "force_application".into(),
                        value: v.to_string(),
                        expected: "'add' or 'average'",
                    })
                },
            };
            Ok(())
        },
    },
];

impl ParticleAffector for LinearForceAffector {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn affect_particles(&mut self, particles: &mut ActiveParticles<'_>, dt: f32) {
        match self.application {
            ForceApplication::Add => {
                let scaled = self.force * dt;
                particles.for_each_mut(|p| p.direction += scaled);
            },
            ForceApplication::Average => {
                let force = self.force;
                particles.for_each_mut(|p| p.direction = (p.direction + force) * 0.5);
            },
        }
    }

    fn clone_affector(&self) -> Box<dyn ParticleAffector> {
        Box::new(self.clone())
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        params::set_in(LINEAR_FORCE_PARAMS, self, name, value)
            .unwrap_or_else(|| Err(params::unknown(Self::TYPE_NAME, name)))
    }

    fn parameter(&self, name: &str) -> Option<String> {
        params::get_in(LINEAR_FORCE_PARAMS, self, name)
    }

    fn parameter_names(&self) -> Vec<&'static str> {
        params::names_of(LINEAR_FORCE_PARAMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use crate::pool::ParticleRef;

    fn run(affector: &mut LinearForceAffector, direction: Vec3, dt: f32) -> Vec3 {
        let handles = [ParticleRef::Visual(0)];
        let mut pool = [Particle::default()];
        pool[0].direction = direction;
        let mut view = ActiveParticles::new(&handles, &mut pool, &mut [], (1.0, 1.0));
        affector.affect_particles(&mut view, dt);
        pool[0].direction
    }

    #[test]
    fn test_add_scales_by_time() {
        let mut affector = LinearForceAffector::new().with_force(Vec3::new(0.0, -10.0, 0.0));
        let dir = run(&mut affector, Vec3::X, 0.5);
        assert_eq!(dir, Vec3::new(1.0, -5.0, 0.0));
    }

    #[test]
    fn test_average() {
        let mut affector = LinearForceAffector::new()
            .with_force(Vec3::new(0.0, 2.0, 0.0))
            .with_application(ForceApplication::Average);
        let dir = run(&mut affector, Vec3::new(2.0, 0.0, 0.0), 0.1);
        assert_eq!(dir, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_parameters() {
        let mut affector = LinearForceAffector::new();
        affector.set_parameter("force_vector", "1 2 3").unwrap();
        affector.set_parameter("force_application", "average").unwrap();
        assert_eq!(affector.force(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(affector.application(), ForceApplication::Average);
        assert_eq!(affector.parameter("force_application").as_deref(), Some("average"));
        assert!(affector.set_parameter("force_application", "multiply").is_err());
        assert!(affector.set_parameter("gravity", "1").is_err());
    }
}
