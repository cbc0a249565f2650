//! Particle affectors.
//!
//! Affectors run once per tick, in registration order, over every active
//! particle. They may also stamp values on particles as they are born.

use crate::params;
use crate::particle::Particle;
use crate::pool::ActiveParticles;
use ember_common::ParamError;
use std::fmt;

/// A particle affector kind.
pub trait ParticleAffector: fmt::Debug + Send {
    /// Registered type name, e.g. `"LinearForce"`.
    fn type_name(&self) -> &str;

    /// Called once for every newly emitted particle, after the emitter has
    /// initialised it.
    fn init_particle(&mut self, _particle: &mut Particle) {}

    /// Mutates the live particles for a tick of `dt` seconds.
    fn affect_particles(&mut self, particles: &mut ActiveParticles<'_>, dt: f32);

    /// Deep copy of the affector and all its parameters.
    fn clone_affector(&self) -> Box<dyn ParticleAffector>;

    /// Sets a named parameter from its text form.
    fn set_parameter(&mut self, name: &str, _value: &str) -> Result<(), ParamError> {
        Err(params::unknown(self.type_name(), name))
    }

    /// Reads a named parameter as text.
    fn parameter(&self, _name: &str) -> Option<String> {
        None
    }

    /// Every parameter name this affector accepts.
    fn parameter_names(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
