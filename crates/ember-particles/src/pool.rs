//! Pool handles and views over a system's live particles.

use crate::emitter::ParticleEmitter;
use crate::particle::Particle;

/// Index of a live particle in one of the system's arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleRef {
    /// Slot in the visual particle pool
    Visual(usize),
    /// Slot in the emitted emitter arena
    Emitter(usize),
}

/// An emitter instance that lives as a particle.
#[derive(Debug)]
pub struct EmittedEmitter {
    /// The emitter, cloned from the named template
    pub emitter: Box<dyn ParticleEmitter>,
    /// Its particle state while active
    pub particle: Particle,
}

impl EmittedEmitter {
    /// Registered name shared by every instance cloned from one template.
    #[must_use]
    pub fn name(&self) -> &str {
        self.emitter.core().name()
    }
}

/// Read-only view over the active particles, in active-list order.
#[derive(Debug, Clone, Copy)]
pub struct Particles<'a> {
    handles: &'a [ParticleRef],
    pool: &'a [Particle],
    emitters: &'a [EmittedEmitter],
}

impl<'a> Particles<'a> {
    pub(crate) fn new(
        handles: &'a [ParticleRef],
        pool: &'a [Particle],
        emitters: &'a [EmittedEmitter],
    ) -> Self {
        Self {
            handles,
            pool,
            emitters,
        }
    }

    /// Number of active particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no particles are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Pool handles in active-list order.
    #[must_use]
    pub const fn handles(&self) -> &'a [ParticleRef] {
        self.handles
    }

    /// The particle at position `index` of the active list.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&'a Particle> {
        self.handles.get(index).and_then(|h| self.resolve(*h))
    }

    /// Resolves a handle.
    #[must_use]
    pub fn resolve(&self, handle: ParticleRef) -> Option<&'a Particle> {
        match handle {
            ParticleRef::Visual(i) => self.pool.get(i),
            ParticleRef::Emitter(i) => self.emitters.get(i).map(|e| &e.particle),
        }
    }

    /// Iterates the active particles.
    pub fn iter(&self) -> impl Iterator<Item = &'a Particle> + 'a {
        let view = *self;
        view.handles.iter().filter_map(move |h| view.resolve(*h))
    }
}

/// Mutable view handed to affectors.
#[derive(Debug)]
pub struct ActiveParticles<'a> {
    handles: &'a [ParticleRef],
    pool: &'a mut [Particle],
    emitters: &'a mut [EmittedEmitter],
    default_width: f32,
    default_height: f32,
}

impl<'a> ActiveParticles<'a> {
    pub(crate) fn new(
        handles: &'a [ParticleRef],
        pool: &'a mut [Particle],
        emitters: &'a mut [EmittedEmitter],
        default_dimensions: (f32, f32),
    ) -> Self {
        Self {
            handles,
            pool,
            emitters,
            default_width: default_dimensions.0,
            default_height: default_dimensions.1,
        }
    }

    /// Number of active particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no particles are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// The owning system's default `(width, height)`.
    #[must_use]
    pub const fn default_dimensions(&self) -> (f32, f32) {
        (self.default_width, self.default_height)
    }

    /// The particle at position `index` of the active list.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        match *self.handles.get(index)? {
            ParticleRef::Visual(i) => self.pool.get_mut(i),
            ParticleRef::Emitter(i) => self.emitters.get_mut(i).map(|e| &mut e.particle),
        }
    }

    /// Calls `f` on every active particle in active-list order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Particle)) {
        for handle in self.handles {
            let particle = match *handle {
                ParticleRef::Visual(i) => self.pool.get_mut(i),
                ParticleRef::Emitter(i) => self.emitters.get_mut(i).map(|e| &mut e.particle),
            };
            if let Some(particle) = particle {
                f(particle);
            }
        }
    }
}
