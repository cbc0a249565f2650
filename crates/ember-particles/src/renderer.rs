//! Renderer notifications.
//!
//! A particle system never reads geometry back from its renderer; it only
//! tells the renderer what happened. [`NullRenderer`] records those
//! notifications and is the headless default.

use crate::params::{self, ParamDef, ParamKind};
use crate::particle::Particle;
use crate::pool::Particles;
use ember_common::{Aabb, ParamError};
use glam::Vec3;
use std::fmt;

/// How a renderer wants active particles ordered before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortMode {
    /// Leave the active order alone.
    #[default]
    None,
    /// Order along the camera view direction.
    Direction,
    /// Furthest from the camera first.
    Distance,
}

impl SortMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Direction => "direction",
            Self::Distance => "distance",
        }
    }
}

/// World-space camera placement passed to visibility notifications.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// Camera position
    pub position: Vec3,
    /// Unit view direction
    pub direction: Vec3,
}

impl CameraView {
    /// Creates a camera view.
    #[must_use]
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
        }
    }
}

/// Receives particle lifecycle notifications from a system.
///
/// Every notification has an empty default so renderers only implement what
/// they care about.
pub trait ParticleSystemRenderer: fmt::Debug + Send {
    /// Registered type name, e.g. `"null"`.
    fn type_name(&self) -> &str;

    /// The pool has been sized to `quota` particles.
    fn notify_particle_quota(&mut self, _quota: usize) {}

    /// The system default particle size changed.
    fn notify_default_dimensions(&mut self, _width: f32, _height: f32) {}

    /// The system was attached to (`true`) or detached from a scene node.
    fn notify_attached(&mut self, _attached: bool) {}

    /// A camera is about to render the system.
    fn notify_current_camera(&mut self, _camera: &CameraView) {}

    /// New local bounding box of the system.
    fn notify_bounding_box(&mut self, _bounds: &Aabb) {}

    /// Material to draw with.
    fn set_material(&mut self, _material: &str) {}

    /// Whether particles are in system space rather than world space.
    fn set_keep_particles_in_local_space(&mut self, _local: bool) {}

    /// A particle was born.
    fn particle_emitted(&mut self, _particle: &Particle) {}

    /// A particle is about to be retired.
    fn particle_expired(&mut self, _particle: &Particle) {}

    /// Every active particle has moved.
    fn particles_moved(&mut self, _particles: &Particles<'_>) {}

    /// Every active particle is about to be cleared.
    fn particles_cleared(&mut self, _particles: &Particles<'_>) {}

    /// Requested ordering of active particles.
    fn sort_mode(&self) -> SortMode {
        SortMode::None
    }

    /// Deep copy of the renderer settings.
    fn clone_renderer(&self) -> Box<dyn ParticleSystemRenderer>;

    /// Sets a named parameter from its text form.
    fn set_parameter(&mut self, name: &str, _value: &str) -> Result<(), ParamError> {
        Err(params::unknown(self.type_name(), name))
    }

    /// Reads a named parameter as text.
    fn parameter(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Headless renderer that counts what it is told.
#[derive(Debug, Clone, Default)]
pub struct NullRenderer {
    /// Last notified pool size
    pub quota: usize,
    /// Last notified default dimensions
    pub default_dimensions: (f32, f32),
    /// Whether the system is attached
    pub attached: bool,
    /// Last notified bounding box
    pub bounds: Aabb,
    /// Material name
    pub material: String,
    /// Whether particles are kept in local space
    pub local_space: bool,
    /// Particles emitted so far
    pub emitted: usize,
    /// Particles expired so far
    pub expired: usize,
    /// Particles dropped by clears so far
    pub cleared: usize,
    /// Motion notifications received
    pub moves: usize,
    /// Camera notifications received
    pub camera_notifications: usize,
    /// Ordering requested from the system
    pub sort: SortMode,
}

impl NullRenderer {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "null";

    /// Creates a renderer with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests an ordering of active particles.
    #[must_use]
    pub const fn with_sort_mode(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    /// Particles that are live according to the notifications received.
    #[must_use]
    pub const fn live(&self) -> usize {
        self.emitted
            .saturating_sub(self.expired)
            .saturating_sub(self.cleared)
    }
}

static NULL_RENDERER_PARAMS: &[ParamDef<NullRenderer>] = &[ParamDef {
    name: "sort_mode",
    description: "How particles are ordered before drawing: none, direction or distance.",
    kind: ParamKind::String,
    get: |r| r.sort.as_str().to_string(),
    set: |r, v| {
        r.sort = match v.trim() {
            "none" => SortMode::None,
            "direction" => SortMode::Direction,
            "distance" => SortMode::Distance,
            _ => {
                return Err(ParamError::InvalidValue {
                    name: "sort_mode".into(),
                    value: v.to_string(),
                    expected: "none, direction or distance",
                })
            },
        };
        Ok(())
    },
}];

impl ParticleSystemRenderer for NullRenderer {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn notify_particle_quota(&mut self, quota: usize) {
        self.quota = quota;
    }

    fn notify_default_dimensions(&mut self, width: f32, height: f32) {
        self.default_dimensions = (width, height);
    }

    fn notify_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    fn notify_current_camera(&mut self, _camera: &CameraView) {
        self.camera_notifications += 1;
    }

    fn notify_bounding_box(&mut self, bounds: &Aabb) {
        self.bounds = *bounds;
    }

    fn set_material(&mut self, material: &str) {
        self.material = material.to_string();
    }

    fn set_keep_particles_in_local_space(&mut self, local: bool) {
        self.local_space = local;
    }

    fn particle_emitted(&mut self, _particle: &Particle) {
        self.emitted += 1;
    }

    fn particle_expired(&mut self, _particle: &Particle) {
        self.expired += 1;
    }

    fn particles_moved(&mut self, _particles: &Particles<'_>) {
        self.moves += 1;
    }

    fn particles_cleared(&mut self, particles: &Particles<'_>) {
        self.cleared += particles.len();
    }

    fn sort_mode(&self) -> SortMode {
        self.sort
    }

    fn clone_renderer(&self) -> Box<dyn ParticleSystemRenderer> {
        // Settings only; counters start fresh.
        Box::new(Self::new().with_sort_mode(self.sort))
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        params::set_in(NULL_RENDERER_PARAMS, self, name, value)
            .unwrap_or_else(|| Err(params::unknown(Self::TYPE_NAME, name)))
    }

    fn parameter(&self, name: &str) -> Option<String> {
        params::get_in(NULL_RENDERER_PARAMS, self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut renderer = NullRenderer::new();
        let p = Particle::default();
        renderer.particle_emitted(&p);
        renderer.particle_emitted(&p);
        renderer.particle_expired(&p);
        assert_eq!(renderer.live(), 1);

        let pool = [p];
        let handles = [crate::pool::ParticleRef::Visual(0)];
        renderer.particles_cleared(&Particles::new(&handles, &pool, &[]));
        assert_eq!(renderer.live(), 0);
    }

    #[test]
    fn test_clone_keeps_settings_only() {
        let mut renderer = NullRenderer::new().with_sort_mode(SortMode::Distance);
        renderer.particle_emitted(&Particle::default());
        let copy = renderer.clone_renderer();
        assert_eq!(copy.sort_mode(), SortMode::Distance);
        assert_eq!(copy.type_name(), "null");
    }

    #[test]
    fn test_sort_mode_parameter() {
        let mut renderer = NullRenderer::new();
        renderer.set_parameter("sort_mode", "direction").unwrap();
        assert_eq!(renderer.sort_mode(), SortMode::Direction);
        assert_eq!(renderer.parameter("sort_mode").as_deref(), Some("direction"));
        assert!(renderer.set_parameter("sort_mode", "random").is_err());
        assert!(renderer.set_parameter("billboard_type", "point").is_err());
    }
}
