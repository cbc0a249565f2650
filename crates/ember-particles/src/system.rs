//! Particle systems.
//!
//! A [`ParticleSystem`] owns a quota-bounded pool of particles, an ordered
//! list of emitters and affectors, and the pools of emitted emitters. Each
//! [`update`](ParticleSystem::update) runs expire, affect, move and emit, in
//! that order, optionally in fixed sub-steps.
//!
//! Pool slots are recycled by index between the free and active lists and
//! are never released. When the emitters ask for more particles than there
//! are free slots, every request is scaled down by the same ratio.

use crate::affector::ParticleAffector;
use crate::emitter::ParticleEmitter;
use crate::params::{self, ParamDef, ParamKind};
use crate::particle::{Particle, ParticleKind};
use crate::pool::{ActiveParticles, EmittedEmitter, ParticleRef, Particles};
use crate::renderer::{CameraView, NullRenderer, ParticleSystemRenderer, SortMode};
use crate::settings::ParticleSettings;
use ember_common::convert::{format_bool, parse_bool, parse_real, parse_uint};
use ember_common::{Aabb, NodeTransform, ParamError};
use glam::Vec3;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use tracing::{debug, trace};

/// Which emitter drives an emission.
#[derive(Debug, Clone, Copy)]
enum EmitterSource {
    /// A registered emitter, by index
    Registered(usize),
    /// An active emitted emitter, by arena slot
    Emitted(usize),
}

/// Moves a world-space position into system space for emitter placement.
fn to_system_space(position: Vec3, local_space: bool, node: Option<NodeTransform>) -> Vec3 {
    match node {
        Some(node) if !local_space => node.to_local_position(position),
        _ => position,
    }
}

/// A pooled particle system.
pub struct ParticleSystem {
    name: String,

    // === Particle pool ===
    pool: Vec<Particle>,
    free_particles: VecDeque<usize>,
    active: Vec<ParticleRef>,
    pool_size: usize,

    // === Emitted emitters ===
    emitted_emitters: Vec<EmittedEmitter>,
    emitted_emitter_pool: BTreeMap<String, Vec<usize>>,
    free_emitted_emitters: BTreeMap<String, VecDeque<usize>>,
    active_emitted_emitters: Vec<usize>,
    emitted_emitter_pool_size: usize,
    emitted_emitter_pool_initialised: bool,

    // === Components ===
    emitters: Vec<Box<dyn ParticleEmitter>>,
    affectors: Vec<Box<dyn ParticleAffector>>,
    renderer: Option<Box<dyn ParticleSystemRenderer>>,
    renderer_configured: bool,

    // === Appearance ===
    default_width: f32,
    default_height: f32,
    material: String,
    cull_individually: bool,
    sorted: bool,
    local_space: bool,
    visible: bool,

    // === Timing ===
    speed_factor: f32,
    emitting: bool,
    iteration_interval: Option<f32>,
    nonvisible_timeout: Option<f32>,
    default_iteration_interval: f32,
    default_nonvisible_timeout: f32,
    update_remain_time: f32,
    frame_number: u64,
    last_visible_frame: u64,
    time_since_last_visible: f32,

    // === Bounds ===
    bounds: Aabb,
    world_bounds: Aabb,
    bounding_radius: f32,
    bounds_auto_update: bool,
    bounds_update_time: f32,

    node: Option<NodeTransform>,
    rng: fastrand::Rng,

    // Per-tick scratch space
    emit_requests: Vec<usize>,
    emitted_requests: Vec<usize>,
}

impl ParticleSystem {
    /// Creates a system with the standard defaults: a quota of 10 particles
    /// and 3 emitted emitters, 100x100 particles, the `BaseWhite` material
    /// and a [`NullRenderer`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, &ParticleSettings::default())
    }

    /// Creates a system using `settings` for its defaults.
    #[must_use]
    pub fn with_settings(name: impl Into<String>, settings: &ParticleSettings) -> Self {
        let rng = settings
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Self {
            name: name.into(),
            pool: Vec::new(),
            free_particles: VecDeque::new(),
            active: Vec::new(),
            pool_size: settings.default_quota,
            emitted_emitters: Vec::new(),
            emitted_emitter_pool: BTreeMap::new(),
            free_emitted_emitters: BTreeMap::new(),
            active_emitted_emitters: Vec::new(),
            emitted_emitter_pool_size: settings.default_emitted_emitter_quota,
            emitted_emitter_pool_initialised: false,
            emitters: Vec::new(),
            affectors: Vec::new(),
            renderer: Some(Box::new(NullRenderer::new())),
            renderer_configured: false,
            default_width: settings.default_width,
            default_height: settings.default_height,
            material: settings.default_material.clone(),
            cull_individually: false,
            sorted: false,
            local_space: false,
            visible: true,
            speed_factor: 1.0,
            emitting: true,
            iteration_interval: None,
            nonvisible_timeout: None,
            default_iteration_interval: settings.default_iteration_interval,
            default_nonvisible_timeout: settings.default_nonvisible_timeout,
            update_remain_time: 0.0,
            frame_number: 0,
            last_visible_frame: 0,
            time_since_last_visible: 0.0,
            bounds: Aabb::Null,
            world_bounds: Aabb::Null,
            bounding_radius: 1.0,
            bounds_auto_update: true,
            bounds_update_time: 10.0,
            node: None,
            rng,
            emit_requests: Vec::new(),
            emitted_requests: Vec::new(),
        }
    }

    /// System name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // Emitters and affectors
    // ------------------------------------------------------------------

    /// Appends an emitter and returns its index.
    ///
    /// The emitter's random stream is reseeded from the system's, and the
    /// emitted emitter pools are rebuilt on the next update.
    pub fn add_emitter(&mut self, mut emitter: Box<dyn ParticleEmitter>) -> usize {
        emitter.core_mut().reseed(self.rng.u64(..));
        self.emitters.push(emitter);
        self.reorganise_emitted_emitters();
        self.emitters.len() - 1
    }

    /// The emitter at `index`.
    #[must_use]
    pub fn emitter(&self, index: usize) -> Option<&dyn ParticleEmitter> {
        self.emitters.get(index).map(AsRef::as_ref)
    }

    /// The emitter at `index`, mutably.
    ///
    /// Call [`reorganise_emitted_emitters`](Self::reorganise_emitted_emitters)
    /// after changing an emitter's name or emitted emitter through this.
    pub fn emitter_mut(&mut self, index: usize) -> Option<&mut dyn ParticleEmitter> {
        match self.emitters.get_mut(index) {
            Some(emitter) => Some(emitter.as_mut()),
            None => None,
        }
    }

    /// Number of registered emitters.
    #[must_use]
    pub fn num_emitters(&self) -> usize {
        self.emitters.len()
    }

    /// Removes and returns the emitter at `index`.
    pub fn remove_emitter(&mut self, index: usize) -> Option<Box<dyn ParticleEmitter>> {
        debug_assert!(index < self.emitters.len(), "emitter index out of bounds");
        if index >= self.emitters.len() {
            return None;
        }
        let emitter = self.emitters.remove(index);
        self.reorganise_emitted_emitters();
        Some(emitter)
    }

    /// Removes every emitter, including all emitted emitter instances.
    pub fn remove_all_emitters(&mut self) {
        self.emitters.clear();
        self.reorganise_emitted_emitters();
    }

    /// Sets a parameter on the emitter at `index`.
    ///
    /// Renaming an emitter or changing what it emits rebuilds the emitted
    /// emitter pools.
    pub fn set_emitter_parameter(
        &mut self,
        index: usize,
        name: &str,
        value: &str,
    ) -> Result<(), ParamError> {
        let Some(emitter) = self.emitters.get_mut(index) else {
            return Err(params::unknown(&format!("emitter #{index}"), name));
        };
        emitter.set_parameter(name, value)?;
        if matches!(name, "name" | "emit_emitter") {
            self.reorganise_emitted_emitters();
        }
        Ok(())
    }

    /// Appends an affector and returns its index.
    pub fn add_affector(&mut self, affector: Box<dyn ParticleAffector>) -> usize {
        self.affectors.push(affector);
        self.affectors.len() - 1
    }

    /// The affector at `index`.
    #[must_use]
    pub fn affector(&self, index: usize) -> Option<&dyn ParticleAffector> {
        self.affectors.get(index).map(AsRef::as_ref)
    }

    /// The affector at `index`, mutably.
    pub fn affector_mut(&mut self, index: usize) -> Option<&mut dyn ParticleAffector> {
        match self.affectors.get_mut(index) {
            Some(affector) => Some(affector.as_mut()),
            None => None,
        }
    }

    /// Number of registered affectors.
    #[must_use]
    pub fn num_affectors(&self) -> usize {
        self.affectors.len()
    }

    /// Removes and returns the affector at `index`.
    pub fn remove_affector(&mut self, index: usize) -> Option<Box<dyn ParticleAffector>> {
        debug_assert!(index < self.affectors.len(), "affector index out of bounds");
        if index >= self.affectors.len() {
            return None;
        }
        Some(self.affectors.remove(index))
    }

    /// Removes every affector.
    pub fn remove_all_affectors(&mut self) {
        self.affectors.clear();
    }

    /// Sets a parameter on the affector at `index`.
    pub fn set_affector_parameter(
        &mut self,
        index: usize,
        name: &str,
        value: &str,
    ) -> Result<(), ParamError> {
        match self.affectors.get_mut(index) {
            Some(affector) => affector.set_parameter(name, value),
            None => Err(params::unknown(&format!("affector #{index}"), name)),
        }
    }

    // ------------------------------------------------------------------
    // Renderer
    // ------------------------------------------------------------------

    /// Replaces the renderer. The new one is configured on the next update.
    pub fn set_renderer(&mut self, renderer: Option<Box<dyn ParticleSystemRenderer>>) {
        self.renderer = renderer;
        self.renderer_configured = false;
    }

    /// The renderer, if any.
    #[must_use]
    pub fn renderer(&self) -> Option<&dyn ParticleSystemRenderer> {
        self.renderer.as_deref()
    }

    /// The renderer, mutably.
    pub fn renderer_mut(&mut self) -> Option<&mut dyn ParticleSystemRenderer> {
        match self.renderer.as_mut() {
            Some(renderer) => Some(renderer.as_mut()),
            None => None,
        }
    }

    /// Type name of the renderer, empty without one.
    #[must_use]
    pub fn renderer_name(&self) -> &str {
        self.renderer.as_ref().map_or("", |r| r.type_name())
    }

    /// Whether the renderer has been told about the pool and settings.
    #[must_use]
    pub const fn is_renderer_configured(&self) -> bool {
        self.renderer_configured
    }

    /// Grows the pool to the quota and brings the renderer up to date.
    pub fn configure_renderer(&mut self) {
        let current = self.pool.len();
        if current < self.pool_size {
            self.increase_pool(self.pool_size);
            if self.renderer_configured {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.notify_particle_quota(self.pool_size);
                }
            }
        }

        if self.renderer_configured {
            return;
        }
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.notify_particle_quota(self.pool.len());
            renderer.notify_attached(self.node.is_some());
            renderer.notify_default_dimensions(self.default_width, self.default_height);
            renderer.set_material(&self.material);
            renderer.set_keep_particles_in_local_space(self.local_space);
            self.renderer_configured = true;
            debug!(
                system = %self.name,
                renderer = renderer.type_name(),
                quota = self.pool.len(),
                "Configured particle renderer"
            );
        }
    }

    fn increase_pool(&mut self, size: usize) {
        let old_size = self.pool.len();
        self.pool.resize(size, Particle::new(ParticleKind::Visual));
        self.free_particles.extend(old_size..size);
        debug!(system = %self.name, from = old_size, to = size, "Grew particle pool");
    }

    // ------------------------------------------------------------------
    // Quotas and pool state
    // ------------------------------------------------------------------

    /// Target number of pooled visual particles.
    #[must_use]
    pub const fn particle_quota(&self) -> usize {
        self.pool_size
    }

    /// Raises the particle quota. Requests below the allocated pool size are
    /// ignored; slots are allocated on the next update.
    pub fn set_particle_quota(&mut self, size: usize) {
        if self.pool.len() < size {
            self.pool_size = size;
        }
    }

    /// Target number of pooled emitted emitters, across all names.
    #[must_use]
    pub const fn emitted_emitter_quota(&self) -> usize {
        self.emitted_emitter_pool_size
    }

    /// Raises the emitted emitter quota. Requests below the number of
    /// emitted emitters already allocated are ignored.
    pub fn set_emitted_emitter_quota(&mut self, size: usize) {
        let current: usize = self.emitted_emitter_pool.values().map(Vec::len).sum();
        if current < size {
            self.emitted_emitter_pool_size = size;
        }
    }

    /// Number of active particles, emitted emitters included.
    #[must_use]
    pub fn num_particles(&self) -> usize {
        self.active.len()
    }

    /// Number of free visual particle slots.
    #[must_use]
    pub fn free_particle_count(&self) -> usize {
        self.free_particles.len()
    }

    /// Number of allocated visual particle slots.
    #[must_use]
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Number of active visual particles.
    #[must_use]
    pub fn active_visual_count(&self) -> usize {
        self.active
            .iter()
            .filter(|h| matches!(h, ParticleRef::Visual(_)))
            .count()
    }

    /// The active particle at position `index` of the active list.
    #[must_use]
    pub fn particle(&self, index: usize) -> Option<&Particle> {
        self.particles().get(index)
    }

    /// View over the active particles.
    #[must_use]
    pub fn particles(&self) -> Particles<'_> {
        Particles::new(&self.active, &self.pool, &self.emitted_emitters)
    }

    /// Names that have an emitted emitter pool.
    pub fn emitted_emitter_names(&self) -> impl Iterator<Item = &str> {
        self.emitted_emitter_pool.keys().map(String::as_str)
    }

    /// Number of emitter instances pooled for `name`, free or active.
    #[must_use]
    pub fn emitted_emitter_pool_len(&self, name: &str) -> usize {
        self.emitted_emitter_pool.get(name).map_or(0, Vec::len)
    }

    /// Number of idle emitter instances for `name`.
    #[must_use]
    pub fn free_emitted_emitter_count(&self, name: &str) -> usize {
        self.free_emitted_emitters.get(name).map_or(0, VecDeque::len)
    }

    /// Number of emitted emitters currently live as particles.
    #[must_use]
    pub fn active_emitted_emitter_count(&self) -> usize {
        self.active_emitted_emitters.len()
    }

    /// Number of live emitted emitters cloned from the emitter named `name`.
    #[must_use]
    pub fn active_emitted_emitter_count_for(&self, name: &str) -> usize {
        self.active_emitted_emitters
            .iter()
            .filter(|&&slot| self.emitted_emitters.get(slot).is_some_and(|e| e.name() == name))
            .count()
    }

    /// Whether the emitted emitter pools have been set up.
    #[must_use]
    pub const fn is_emitted_emitter_pool_initialised(&self) -> bool {
        self.emitted_emitter_pool_initialised
    }

    fn create_particle(&mut self) -> Option<ParticleRef> {
        let slot = self.free_particles.pop_front()?;
        let handle = ParticleRef::Visual(slot);
        self.active.push(handle);
        Some(handle)
    }

    fn create_emitter_particle(&mut self, name: &str) -> Option<ParticleRef> {
        let slot = self.free_emitted_emitters.get_mut(name)?.pop_front()?;
        let handle = ParticleRef::Emitter(slot);
        self.active.push(handle);
        self.active_emitted_emitters.push(slot);
        Some(handle)
    }

    // ------------------------------------------------------------------
    // Emitted emitter pools
    // ------------------------------------------------------------------

    /// Sets up the emitted emitter pools (once) and grows them to the quota.
    pub fn initialise_emitted_emitters(&mut self) {
        let mut current = 0;
        if self.emitted_emitter_pool.is_empty() {
            if self.emitted_emitter_pool_initialised {
                // Initialised before, but nothing emits emitters
                return;
            }
            self.initialise_emitted_emitter_pool();
        } else {
            current = self.emitted_emitter_pool.values().map(Vec::len).sum();
        }

        if current < self.emitted_emitter_pool_size && !self.emitted_emitter_pool.is_empty() {
            self.increase_emitted_emitter_pool(self.emitted_emitter_pool_size);
        }
    }

    fn initialise_emitted_emitter_pool(&mut self) {
        if self.emitted_emitter_pool_initialised {
            return;
        }

        for emitter in &self.emitters {
            let target = emitter.core().emitted_emitter();
            if !target.is_empty() {
                self.emitted_emitter_pool.entry(target.to_string()).or_default();
            }
        }
        // Emitters used as templates are only ever instantiated by cloning
        for emitter in &mut self.emitters {
            let name = emitter.core().name();
            let emitted = !name.is_empty() && self.emitted_emitter_pool.contains_key(name);
            emitter.core_mut().set_emitted(emitted);
        }

        self.emitted_emitter_pool_initialised = true;
        debug!(
            system = %self.name,
            names = self.emitted_emitter_pool.len(),
            "Initialised emitted emitter pool"
        );
    }

    /// Clones template emitters until every emitted emitter name has
    /// `size / names` instances. New instances are added to the free lists.
    pub fn increase_emitted_emitter_pool(&mut self, size: usize) {
        if self.emitted_emitter_pool.is_empty() {
            return;
        }
        let per_name = size / self.emitted_emitter_pool.len();

        for (name, instances) in &mut self.emitted_emitter_pool {
            let free = self.free_emitted_emitters.entry(name.clone()).or_default();
            let Some(template) = self.emitters.iter().find(|e| e.core().name() == name) else {
                continue;
            };

            let old_size = instances.len();
            for _ in old_size..per_name {
                let mut clone = template.clone_emitter();
                let core = clone.core_mut();
                core.set_emitted(template.core().is_emitted());
                core.reseed(self.rng.u64(..));
                // Wait to be released rather than firing immediately
                if core.min_duration() > 0.0
                    && (core.min_repeat_delay() > 0.0 || core.max_repeat_delay() > 0.0)
                {
                    core.set_enabled(false);
                }

                let slot = self.emitted_emitters.len();
                self.emitted_emitters.push(EmittedEmitter {
                    emitter: clone,
                    particle: Particle::new(ParticleKind::Emitter),
                });
                instances.push(slot);
                free.push_back(slot);
            }

            if instances.len() > old_size {
                debug!(
                    system = %self.name,
                    emitter = %name,
                    from = old_size,
                    to = instances.len(),
                    "Grew emitted emitter pool"
                );
            }
        }
    }

    /// Drops every emitted emitter instance so the pools are rebuilt from the
    /// current emitters on the next update.
    ///
    /// Live emitted emitters are retired through the renderer first.
    pub fn reorganise_emitted_emitters(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            for handle in &self.active {
                if let ParticleRef::Emitter(slot) = *handle {
                    renderer.particle_expired(&self.emitted_emitters[slot].particle);
                }
            }
        }
        self.active.retain(|h| matches!(h, ParticleRef::Visual(_)));
        self.emitted_emitters.clear();
        self.emitted_emitter_pool.clear();
        self.free_emitted_emitters.clear();
        self.active_emitted_emitters.clear();
        self.emitted_emitter_pool_initialised = false;
        debug!(system = %self.name, "Reorganising emitted emitters");
    }

    // ------------------------------------------------------------------
    // Update pipeline
    // ------------------------------------------------------------------

    /// Advances the simulation by `dt` seconds.
    ///
    /// Does nothing while detached, or once the system has been off screen
    /// for longer than the non-visible update timeout.
    pub fn update(&mut self, dt: f32) {
        if self.node.is_none() {
            return;
        }
        self.frame_number += 1;

        let timeout = self.nonvisible_update_timeout();
        if timeout > 0.0 {
            // Camera notifications trail updates by one frame
            let frames_since_visible = self.frame_number.saturating_sub(self.last_visible_frame);
            if frames_since_visible > 1 {
                self.time_since_last_visible += dt;
                if self.time_since_last_visible >= timeout {
                    return;
                }
            }
        }

        let dt = dt * self.speed_factor;

        self.configure_renderer();
        self.initialise_emitted_emitters();

        let interval = self.iteration_interval();
        if interval > 0.0 {
            self.update_remain_time += dt;
            while self.update_remain_time >= interval {
                self.step(interval);
                self.update_remain_time -= interval;
            }
        } else {
            self.step(dt);
        }

        if !self.bounds_auto_update && self.bounds_update_time > 0.0 {
            self.bounds_update_time -= dt;
        }
        self.update_bounds();

        trace!(
            system = %self.name,
            active = self.active.len(),
            free = self.free_particles.len(),
            "Particle system updated"
        );
    }

    fn step(&mut self, dt: f32) {
        self.expire(dt);
        self.trigger_affectors(dt);
        self.apply_motion(dt);
        if self.emitting {
            self.trigger_emitters(dt);
        }
    }

    /// Calls [`update`](Self::update) in steps of `interval` until `time`
    /// seconds have been simulated.
    pub fn fast_forward(&mut self, time: f32, interval: f32) {
        if interval <= 0.0 {
            return;
        }
        let mut elapsed = 0.0;
        while elapsed < time {
            self.update(interval);
            elapsed += interval;
        }
    }

    /// Ages every active particle and retires those whose remaining life is
    /// now below `dt`.
    ///
    /// Retired visual particles return to the free list; retired emitted
    /// emitters return to the free list for their name. The active list is
    /// compacted with swap-remove, so its order is not preserved.
    pub fn expire(&mut self, dt: f32) {
        let mut i = 0;
        while i < self.active.len() {
            let handle = self.active[i];
            let particle = match handle {
                ParticleRef::Visual(slot) => &mut self.pool[slot],
                ParticleRef::Emitter(slot) => &mut self.emitted_emitters[slot].particle,
            };
            particle.time_to_live -= dt;
            if particle.time_to_live >= dt {
                i += 1;
                continue;
            }

            let retired = *particle;
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.particle_expired(&retired);
            }
            self.active.swap_remove(i);

            match handle {
                ParticleRef::Visual(slot) => self.free_particles.push_back(slot),
                ParticleRef::Emitter(slot) => {
                    let name = self.emitted_emitters[slot].name().to_string();
                    self.free_emitted_emitters
                        .entry(name)
                        .or_default()
                        .push_back(slot);
                    if let Some(pos) = self.active_emitted_emitters.iter().position(|&s| s == slot)
                    {
                        self.active_emitted_emitters.remove(pos);
                    }
                },
            }
        }
    }

    /// Runs every affector over the active particles, in registration order.
    pub fn trigger_affectors(&mut self, dt: f32) {
        let mut view = ActiveParticles::new(
            &self.active,
            &mut self.pool,
            &mut self.emitted_emitters,
            (self.default_width, self.default_height),
        );
        for affector in &mut self.affectors {
            affector.affect_particles(&mut view, dt);
        }
    }

    /// Moves every active particle along its direction. Emitted emitters
    /// follow their particle.
    pub fn apply_motion(&mut self, dt: f32) {
        for handle in &self.active {
            match *handle {
                ParticleRef::Visual(slot) => {
                    let p = &mut self.pool[slot];
                    p.position += p.direction * dt;
                },
                ParticleRef::Emitter(slot) => {
                    let e = &mut self.emitted_emitters[slot];
                    e.particle.position += e.particle.direction * dt;
                    let position = to_system_space(e.particle.position, self.local_space, self.node);
                    e.emitter.core_mut().set_position(position);
                },
            }
        }

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.particles_moved(&Particles::new(
                &self.active,
                &self.pool,
                &self.emitted_emitters,
            ));
        }
    }

    /// Collects emission requests and creates the particles.
    ///
    /// Registered emitters that are not emitted-emitter templates, and every
    /// active emitted emitter, are asked once for their demand. When the
    /// total exceeds the free visual slots, each request is cut to
    /// `request * free / total`. Emitters then create their particles in
    /// registration order, followed by the emitted emitters.
    pub fn trigger_emitters(&mut self, dt: f32) {
        let allowed = self.free_particles.len();
        let mut total = 0usize;

        self.emit_requests.clear();
        for emitter in &mut self.emitters {
            let requested = if emitter.core().is_emitted() {
                0
            } else {
                emitter.emission_count(dt)
            };
            total = total.saturating_add(requested);
            self.emit_requests.push(requested);
        }

        self.emitted_requests.clear();
        for &slot in &self.active_emitted_emitters {
            let requested = self.emitted_emitters[slot].emitter.emission_count(dt);
            total = total.saturating_add(requested);
            self.emitted_requests.push(requested);
        }

        if total > allowed {
            for requested in self
                .emit_requests
                .iter_mut()
                .chain(self.emitted_requests.iter_mut())
            {
                *requested = (*requested as u128 * allowed as u128 / total as u128) as usize;
            }
        }

        for index in 0..self.emitters.len() {
            if self.emitters[index].core().is_emitted() {
                continue;
            }
            let requested = self.emit_requests[index];
            self.execute_trigger_emitter(EmitterSource::Registered(index), requested, dt);
        }

        // Instances activated during this pass start emitting next tick
        for k in 0..self.emitted_requests.len() {
            let slot = self.active_emitted_emitters[k];
            let requested = self.emitted_requests[k];
            self.execute_trigger_emitter(EmitterSource::Emitted(slot), requested, dt);
        }
    }

    fn source_emitter(&mut self, source: EmitterSource) -> &mut dyn ParticleEmitter {
        match source {
            EmitterSource::Registered(index) => self.emitters[index].as_mut(),
            EmitterSource::Emitted(slot) => self.emitted_emitters[slot].emitter.as_mut(),
        }
    }

    fn execute_trigger_emitter(&mut self, source: EmitterSource, requested: usize, dt: f32) {
        if requested == 0 {
            return;
        }
        let target = self.source_emitter(source).core().emitted_emitter().to_string();
        let time_inc = dt / requested as f32;
        let mut time_point = 0.0;

        for _ in 0..requested {
            let handle = if target.is_empty() {
                self.create_particle()
            } else {
                self.create_emitter_particle(&target)
            };
            // Pool exhausted
            let Some(handle) = handle else {
                break;
            };

            let kind = match handle {
                ParticleRef::Visual(_) => ParticleKind::Visual,
                ParticleRef::Emitter(_) => ParticleKind::Emitter,
            };
            let mut particle = Particle::new(kind);
            self.source_emitter(source).init_particle(&mut particle);

            if !self.local_space {
                if let Some(node) = self.node {
                    particle.position = node.to_world_position(particle.position);
                    particle.direction = node.to_world_direction(particle.direction);
                }
            }

            // Born part way through the tick
            particle.position += particle.direction * time_point;

            for affector in &mut self.affectors {
                affector.init_particle(&mut particle);
            }
            time_point += time_inc;

            match handle {
                ParticleRef::Visual(slot) => self.pool[slot] = particle,
                ParticleRef::Emitter(slot) => {
                    let position = to_system_space(particle.position, self.local_space, self.node);
                    let instance = &mut self.emitted_emitters[slot];
                    instance.particle = particle;
                    instance.emitter.core_mut().set_position(position);
                },
            }

            if let Some(renderer) = self.renderer.as_mut() {
                renderer.particle_emitted(&particle);
            }
        }
    }

    /// Returns every active particle to its free list and resets the
    /// sub-step accumulator.
    pub fn clear(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.particles_cleared(&Particles::new(
                &self.active,
                &self.pool,
                &self.emitted_emitters,
            ));
        }

        for handle in self.active.drain(..) {
            match handle {
                ParticleRef::Visual(slot) => self.free_particles.push_back(slot),
                ParticleRef::Emitter(slot) => {
                    let name = self.emitted_emitters[slot].name().to_string();
                    self.free_emitted_emitters
                        .entry(name)
                        .or_default()
                        .push_back(slot);
                },
            }
        }
        self.active_emitted_emitters.clear();
        self.update_remain_time = 0.0;
    }

    // ------------------------------------------------------------------
    // Scene attachment and visibility
    // ------------------------------------------------------------------

    /// Attaches the system to a scene node. Updates only run while attached.
    pub fn attach(&mut self, node: NodeTransform) {
        let was_attached = self.node.is_some();
        self.node = Some(node);
        if self.renderer_configured {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.notify_attached(true);
            }
        }
        if !was_attached {
            // Assume visible
            self.time_since_last_visible = 0.0;
            self.last_visible_frame = self.frame_number;
        }
    }

    /// Moves the node the system is attached to. Ignored while detached.
    pub fn set_node_transform(&mut self, node: NodeTransform) {
        if self.node.is_some() {
            self.node = Some(node);
        }
    }

    /// Detaches the system from its scene node.
    pub fn detach(&mut self) {
        self.node = None;
        if self.renderer_configured {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.notify_attached(false);
            }
        }
    }

    /// Whether the system is attached to a scene node.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.node.is_some()
    }

    /// Transform of the attached node.
    #[must_use]
    pub const fn node_transform(&self) -> Option<NodeTransform> {
        self.node
    }

    /// Whether the system may be drawn.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Shows or hides the system. Hidden systems ignore camera notifications.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Records that a camera is about to draw the system.
    pub fn notify_current_camera(&mut self, camera: &CameraView) {
        if !self.visible {
            return;
        }
        self.last_visible_frame = self.frame_number;
        self.time_since_last_visible = 0.0;

        if self.sorted {
            self.sort_particles(camera);
        }
        if self.renderer.is_some() {
            if !self.renderer_configured {
                self.configure_renderer();
            }
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.notify_current_camera(camera);
            }
        }
    }

    /// Seconds the system has spent off screen.
    #[must_use]
    pub const fn time_since_last_visible(&self) -> f32 {
        self.time_since_last_visible
    }

    fn sort_particles(&mut self, camera: &CameraView) {
        let Some(mode) = self.renderer.as_ref().map(|r| r.sort_mode()) else {
            return;
        };
        let node = if self.local_space { self.node } else { None };
        let pool = &self.pool;
        let emitters = &self.emitted_emitters;
        let position_of = |handle: &ParticleRef| match *handle {
            ParticleRef::Visual(slot) => pool[slot].position,
            ParticleRef::Emitter(slot) => emitters[slot].particle.position,
        };

        match mode {
            SortMode::None => {},
            SortMode::Direction => {
                let direction = node.map_or(camera.direction, |n| n.to_local_direction(camera.direction));
                let axis = -direction;
                self.active.sort_by(|a, b| {
                    axis.dot(position_of(a)).total_cmp(&axis.dot(position_of(b)))
                });
            },
            SortMode::Distance => {
                let eye = node.map_or(camera.position, |n| n.to_local_position(camera.position));
                // Furthest first
                self.active.sort_by(|a, b| {
                    let da = (eye - position_of(a)).length_squared();
                    let db = (eye - position_of(b)).length_squared();
                    db.total_cmp(&da)
                });
            },
        }
    }

    // ------------------------------------------------------------------
    // Bounds
    // ------------------------------------------------------------------

    /// Local bounding box.
    #[must_use]
    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// World space box around the particles from the last bounds update.
    #[must_use]
    pub const fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }

    /// Radius of a sphere around the system origin enclosing the bounds.
    #[must_use]
    pub const fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    /// Sets the local bounding box explicitly.
    pub fn set_bounds(&mut self, bounds: Aabb) {
        self.bounds = bounds;
        self.bounding_radius = bounds.radius_from_origin();
    }

    /// Rebuild the bounds from the particles every frame (`auto`), or grow
    /// them for `stop_in` seconds and then freeze.
    pub fn set_bounds_auto_updated(&mut self, auto: bool, stop_in: f32) {
        self.bounds_auto_update = auto;
        self.bounds_update_time = stop_in;
    }

    /// Whether bounds are rebuilt every frame.
    #[must_use]
    pub const fn bounds_auto_updated(&self) -> bool {
        self.bounds_auto_update
    }

    fn update_bounds(&mut self) {
        let Some(node) = self.node else {
            return;
        };
        if !(self.bounds_auto_update || self.bounds_update_time > 0.0) {
            return;
        }

        if self.active.is_empty() {
            if self.bounds_auto_update {
                self.world_bounds = Aabb::Null;
            }
        } else {
            // A frozen box only ever grows, so it keeps the worst case
            let mut world = if !self.bounds_auto_update && self.world_bounds.is_finite() {
                self.world_bounds
            } else {
                Aabb::Null
            };
            let default_padding = Vec3::splat(0.5 * self.default_width.max(self.default_height));
            for particle in self.particles().iter() {
                let padding = particle
                    .own_dimensions()
                    .map_or(default_padding, |(w, h)| Vec3::splat(0.5 * w.max(h)));
                world.merge(&Aabb::new(
                    particle.position - padding,
                    particle.position + padding,
                ));
            }
            self.world_bounds = world;
        }

        let local = if self.local_space {
            self.world_bounds
        } else {
            self.world_bounds.transformed(&node.inverse_matrix())
        };
        // Merged so that a box set by the user is preserved
        self.bounds.merge(&local);
        self.bounding_radius = self.bounds.radius_from_origin().max(self.bounding_radius);

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.notify_bounding_box(&self.bounds);
        }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Default particle width.
    #[must_use]
    pub const fn default_width(&self) -> f32 {
        self.default_width
    }

    /// Default particle height.
    #[must_use]
    pub const fn default_height(&self) -> f32 {
        self.default_height
    }

    /// Sets the size of particles without their own dimensions.
    pub fn set_default_dimensions(&mut self, width: f32, height: f32) {
        self.default_width = width;
        self.default_height = height;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.notify_default_dimensions(width, height);
        }
    }

    /// Sets the default particle width.
    pub fn set_default_width(&mut self, width: f32) {
        self.set_default_dimensions(width, self.default_height);
    }

    /// Sets the default particle height.
    pub fn set_default_height(&mut self, height: f32) {
        self.set_default_dimensions(self.default_width, height);
    }

    /// Material name.
    #[must_use]
    pub fn material_name(&self) -> &str {
        &self.material
    }

    /// Sets the material name.
    pub fn set_material_name(&mut self, material: impl Into<String>) {
        self.material = material.into();
        if self.renderer_configured {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.set_material(&self.material);
            }
        }
    }

    /// Whether particles are culled one by one rather than as a whole.
    #[must_use]
    pub const fn cull_individually(&self) -> bool {
        self.cull_individually
    }

    /// Sets per-particle culling.
    pub fn set_cull_individually(&mut self, cull: bool) {
        self.cull_individually = cull;
    }

    /// Whether particles are sorted on camera notification.
    #[must_use]
    pub const fn sorted(&self) -> bool {
        self.sorted
    }

    /// Enables sorting by the renderer's sort mode.
    pub fn set_sorted(&mut self, sorted: bool) {
        self.sorted = sorted;
    }

    /// Whether particles stay in system space instead of world space.
    #[must_use]
    pub const fn keep_particles_in_local_space(&self) -> bool {
        self.local_space
    }

    /// Keeps particles in system space, so they move with the node.
    pub fn set_keep_particles_in_local_space(&mut self, local: bool) {
        self.local_space = local;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_keep_particles_in_local_space(local);
        }
    }

    /// Multiplier applied to every update's elapsed time.
    #[must_use]
    pub const fn speed_factor(&self) -> f32 {
        self.speed_factor
    }

    /// Sets the elapsed time multiplier.
    pub fn set_speed_factor(&mut self, factor: f32) {
        self.speed_factor = factor;
    }

    /// Whether emitters run.
    #[must_use]
    pub const fn emitting(&self) -> bool {
        self.emitting
    }

    /// Pauses or resumes emission. Live particles keep updating.
    pub fn set_emitting(&mut self, emitting: bool) {
        self.emitting = emitting;
    }

    /// Effective fixed update step (0 = variable).
    #[must_use]
    pub fn iteration_interval(&self) -> f32 {
        self.iteration_interval
            .unwrap_or(self.default_iteration_interval)
    }

    /// Sets a fixed update step for this system.
    pub fn set_iteration_interval(&mut self, interval: f32) {
        self.iteration_interval = Some(interval);
    }

    /// Effective non-visible update timeout (0 = never stop).
    #[must_use]
    pub fn nonvisible_update_timeout(&self) -> f32 {
        self.nonvisible_timeout
            .unwrap_or(self.default_nonvisible_timeout)
    }

    /// Stops updates after the system has been off screen this long.
    pub fn set_nonvisible_update_timeout(&mut self, timeout: f32) {
        self.nonvisible_timeout = Some(timeout);
    }

    /// Makes this system a structural copy of `other`: emitters, affectors,
    /// quotas, appearance, timing settings and renderer settings.
    ///
    /// Live particles are kept; visibility tracking starts fresh.
    pub fn assign_from(&mut self, other: &Self) {
        self.remove_all_emitters();
        self.remove_all_affectors();

        for emitter in &other.emitters {
            let mut copy = emitter.clone_emitter();
            copy.core_mut().set_emitted(false);
            self.add_emitter(copy);
        }
        for affector in &other.affectors {
            self.add_affector(affector.clone_affector());
        }

        self.set_particle_quota(other.particle_quota());
        self.set_emitted_emitter_quota(other.emitted_emitter_quota());
        self.set_material_name(other.material.clone());
        self.set_default_dimensions(other.default_width, other.default_height);
        self.cull_individually = other.cull_individually;
        self.sorted = other.sorted;
        self.local_space = other.local_space;
        self.speed_factor = other.speed_factor;
        self.iteration_interval = other.iteration_interval;
        self.nonvisible_timeout = other.nonvisible_timeout;

        self.set_renderer(other.renderer.as_ref().map(|r| r.clone_renderer()));
    }

    /// Sets a system parameter from its text form.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        params::set_in(SYSTEM_PARAMS, self, name, value)
            .unwrap_or_else(|| Err(params::unknown("ParticleSystem", name)))
    }

    /// Reads a system parameter as text.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        params::get_in(SYSTEM_PARAMS, self, name)
    }

    /// Every system parameter name.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&'static str> {
        params::names_of(SYSTEM_PARAMS)
    }
}

impl fmt::Debug for ParticleSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("name", &self.name)
            .field("quota", &self.pool_size)
            .field("pool", &self.pool.len())
            .field("active", &self.active.len())
            .field("free", &self.free_particles.len())
            .field("emitters", &self.emitters.len())
            .field("affectors", &self.affectors.len())
            .field("emitted_emitters", &self.emitted_emitters.len())
            .field("renderer", &self.renderer_name())
            .finish_non_exhaustive()
    }
}

static SYSTEM_PARAMS: &[ParamDef<ParticleSystem>] = &[
    ParamDef {
        name: "quota",
        description: "The maximum number of particles allowed at once in this system.",
        kind: ParamKind::UnsignedInt,
        get: |s| s.pool_size.to_string(),
        set: |s, v| {
            s.set_particle_quota(parse_uint("quota", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "emit_emitter_quota",
        description: "The maximum number of emitters to be emitted at once in this system.",
        kind: ParamKind::UnsignedInt,
        get: |s| s.emitted_emitter_pool_size.to_string(),
        set: |s, v| {
            s.set_emitted_emitter_quota(parse_uint("emit_emitter_quota", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "material",
        description: "The name of the material to be used to render all particles in this system.",
        kind: ParamKind::String,
        get: |s| s.material.clone(),
        set: |s, v| {
            s.set_material_name(v.trim());
            Ok(())
        },
    },
    ParamDef {
        name: "particle_width",
        description: "The width of particles in world units.",
        kind: ParamKind::Real,
        get: |s| s.default_width.to_string(),
        set: |s, v| {
            s.set_default_width(parse_real("particle_width", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "particle_height",
        description: "The height of particles in world units.",
        kind: ParamKind::Real,
        get: |s| s.default_height.to_string(),
        set: |s, v| {
            s.set_default_height(parse_real("particle_height", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "cull_each",
        description: "If true, each particle is culled in it's own right. If false, the entire \
                      system is culled as a whole.",
        kind: ParamKind::Bool,
        get: |s| format_bool(s.cull_individually),
        set: |s, v| {
            s.set_cull_individually(parse_bool("cull_each", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "sorted",
        description: "Sets whether particles should be sorted relative to the camera.",
        kind: ParamKind::Bool,
        get: |s| format_bool(s.sorted),
        set: |s, v| {
            s.set_sorted(parse_bool("sorted", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "local_space",
        description: "Sets whether particles should be kept in local space rather than \
                      emitted into world space.",
        kind: ParamKind::Bool,
        get: |s| format_bool(s.local_space),
        set: |s, v| {
            s.set_keep_particles_in_local_space(parse_bool("local_space", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "iteration_interval",
        description: "Sets a fixed update interval for the system, or 0 for the frame rate.",
        kind: ParamKind::Real,
        get: |s| s.iteration_interval().to_string(),
        set: |s, v| {
            s.set_iteration_interval(parse_real("iteration_interval", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "nonvisible_update_timeout",
        description: "Sets a timeout on updates to the system if the system is not visible \
                      for the given number of seconds (0 to always update).",
        kind: ParamKind::Real,
        get: |s| s.nonvisible_update_timeout().to_string(),
        set: |s, v| {
            s.set_nonvisible_update_timeout(parse_real("nonvisible_update_timeout", v)?);
            Ok(())
        },
    },
    ParamDef {
        name: "speed_factor",
        description: "Multiplier applied to the elapsed time of every update.",
        kind: ParamKind::Real,
        get: |s| s.speed_factor.to_string(),
        set: |s, v| {
            s.set_speed_factor(parse_real("speed_factor", v)?);
            Ok(())
        },
    },
];
