//! Factories and templates.
//!
//! [`ParticleSystemManager`] maps type names to emitter, affector and
//! renderer factories and keeps named template systems. Systems are created
//! from templates by structural copy, so a template can be tuned once and
//! instantiated many times.

use crate::affector::ParticleAffector;
use crate::affectors::{
    ColourFaderAffector, LinearForceAffector, RotatorAffector, ScalerAffector,
};
use crate::definition::{DefinitionFile, LoadMode};
use crate::emitter::ParticleEmitter;
use crate::emitters::{AreaEmitter, AreaShape, PointEmitter};
use crate::renderer::{NullRenderer, ParticleSystemRenderer};
use crate::settings::ParticleSettings;
use crate::system::ParticleSystem;
use ahash::AHashMap;
use ember_common::{EmberResult, RegistryError};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Creates a new emitter with default parameters.
pub type EmitterFactory = Box<dyn Fn() -> Box<dyn ParticleEmitter> + Send + Sync>;

/// Creates a new affector with default parameters.
pub type AffectorFactory = Box<dyn Fn() -> Box<dyn ParticleAffector> + Send + Sync>;

/// Creates a new renderer with default parameters.
pub type RendererFactory = Box<dyn Fn() -> Box<dyn ParticleSystemRenderer> + Send + Sync>;

/// Registry of component factories and template systems.
pub struct ParticleSystemManager {
    /// Defaults for new systems
    settings: ParticleSettings,
    /// Emitter factories by type name
    emitter_factories: AHashMap<String, EmitterFactory>,
    /// Affector factories by type name
    affector_factories: AHashMap<String, AffectorFactory>,
    /// Renderer factories by type name
    renderer_factories: AHashMap<String, RendererFactory>,
    /// Template systems by name
    templates: BTreeMap<String, ParticleSystem>,
}

impl Default for ParticleSystemManager {
    fn default() -> Self {
        Self::new(ParticleSettings::default())
    }
}

impl ParticleSystemManager {
    /// Creates an empty manager. No component types are registered.
    #[must_use]
    pub fn new(settings: ParticleSettings) -> Self {
        Self {
            settings,
            emitter_factories: AHashMap::new(),
            affector_factories: AHashMap::new(),
            renderer_factories: AHashMap::new(),
            templates: BTreeMap::new(),
        }
    }

    /// Creates a manager with default settings and the built-in types.
    #[must_use]
    pub fn with_builtin_factories() -> Self {
        let mut manager = Self::default();
        manager.register_builtin_factories();
        manager
    }

    /// Registers `Point`, `Box`, `Ellipsoid`, `LinearForce`, `ColourFader`,
    /// `Scaler`, `Rotator` and the `null` renderer.
    pub fn register_builtin_factories(&mut self) {
        self.add_emitter_factory(PointEmitter::TYPE_NAME, || Box::new(PointEmitter::new()));
        self.add_emitter_factory(AreaShape::Box.type_name(), || Box::new(AreaEmitter::cuboid()));
        self.add_emitter_factory(AreaShape::Ellipsoid.type_name(), || {
            Box::new(AreaEmitter::ellipsoid())
        });

        self.add_affector_factory(LinearForceAffector::TYPE_NAME, || {
            Box::new(LinearForceAffector::new())
        });
        self.add_affector_factory(ColourFaderAffector::TYPE_NAME, || {
            Box::new(ColourFaderAffector::default())
        });
        self.add_affector_factory(ScalerAffector::TYPE_NAME, || {
            Box::new(ScalerAffector::default())
        });
        self.add_affector_factory(RotatorAffector::TYPE_NAME, || {
            Box::new(RotatorAffector::new())
        });

        self.add_renderer_factory(NullRenderer::TYPE_NAME, || Box::new(NullRenderer::new()));
        debug!("Registered built-in particle factories");
    }

    /// Defaults applied to new systems.
    #[must_use]
    pub const fn settings(&self) -> &ParticleSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    /// Registers an emitter type, replacing any factory with the same name.
    pub fn add_emitter_factory<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ParticleEmitter> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self
            .emitter_factories
            .insert(type_name.clone(), Box::new(factory))
            .is_some()
        {
            warn!("Replaced emitter factory '{type_name}'");
        }
    }

    /// Registers an affector type, replacing any factory with the same name.
    pub fn add_affector_factory<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ParticleAffector> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self
            .affector_factories
            .insert(type_name.clone(), Box::new(factory))
            .is_some()
        {
            warn!("Replaced affector factory '{type_name}'");
        }
    }

    /// Registers a renderer type, replacing any factory with the same name.
    pub fn add_renderer_factory<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ParticleSystemRenderer> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self
            .renderer_factories
            .insert(type_name.clone(), Box::new(factory))
            .is_some()
        {
            warn!("Replaced renderer factory '{type_name}'");
        }
    }

    /// Creates an emitter of a registered type.
    pub fn create_emitter(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ParticleEmitter>, RegistryError> {
        self.emitter_factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::UnknownEmitterType(type_name.to_string()))
    }

    /// Creates an affector of a registered type.
    pub fn create_affector(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ParticleAffector>, RegistryError> {
        self.affector_factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::UnknownAffectorType(type_name.to_string()))
    }

    /// Creates a renderer of a registered type.
    pub fn create_renderer(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ParticleSystemRenderer>, RegistryError> {
        self.renderer_factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::UnknownRendererType(type_name.to_string()))
    }

    /// Registered emitter type names, sorted.
    #[must_use]
    pub fn emitter_types(&self) -> Vec<&str> {
        sorted_keys(&self.emitter_factories)
    }

    /// Registered affector type names, sorted.
    #[must_use]
    pub fn affector_types(&self) -> Vec<&str> {
        sorted_keys(&self.affector_factories)
    }

    /// Registered renderer type names, sorted.
    #[must_use]
    pub fn renderer_types(&self) -> Vec<&str> {
        sorted_keys(&self.renderer_factories)
    }

    /// Creates an emitter of `type_name` and adds it to `system`.
    pub fn add_emitter(
        &self,
        system: &mut ParticleSystem,
        type_name: &str,
    ) -> Result<usize, RegistryError> {
        Ok(system.add_emitter(self.create_emitter(type_name)?))
    }

    /// Creates an affector of `type_name` and adds it to `system`.
    pub fn add_affector(
        &self,
        system: &mut ParticleSystem,
        type_name: &str,
    ) -> Result<usize, RegistryError> {
        Ok(system.add_affector(self.create_affector(type_name)?))
    }

    /// Creates a renderer of `type_name` and installs it on `system`.
    pub fn set_renderer(
        &self,
        system: &mut ParticleSystem,
        type_name: &str,
    ) -> Result<(), RegistryError> {
        system.set_renderer(Some(self.create_renderer(type_name)?));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Systems and templates
    // ------------------------------------------------------------------

    /// A blank system using the settings defaults and default renderer.
    pub(crate) fn new_system(&self, name: &str) -> ParticleSystem {
        let mut system = ParticleSystem::with_settings(name, &self.settings);
        let renderer = &self.settings.default_renderer;
        if renderer != NullRenderer::TYPE_NAME {
            match self.create_renderer(renderer) {
                Ok(r) => system.set_renderer(Some(r)),
                Err(e) => warn!("Keeping null renderer for '{name}': {e}"),
            }
        }
        system
    }

    /// Registers `system` as a template under its own name.
    pub fn add_template(&mut self, system: ParticleSystem) -> Result<(), RegistryError> {
        let name = system.name().to_string();
        if self.templates.contains_key(&name) {
            return Err(RegistryError::DuplicateTemplate(name));
        }
        info!("Added particle system template '{name}'");
        self.templates.insert(name, system);
        Ok(())
    }

    /// Creates an empty template and returns it for configuration.
    pub fn create_template(&mut self, name: &str) -> Result<&mut ParticleSystem, RegistryError> {
        if self.templates.contains_key(name) {
            return Err(RegistryError::DuplicateTemplate(name.to_string()));
        }
        let system = self.new_system(name);
        info!("Created particle system template '{name}'");
        Ok(self.templates.entry(name.to_string()).or_insert(system))
    }

    /// The template named `name`.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&ParticleSystem> {
        self.templates.get(name)
    }

    /// The template named `name`, mutably.
    pub fn template_mut(&mut self, name: &str) -> Option<&mut ParticleSystem> {
        self.templates.get_mut(name)
    }

    /// Removes and returns a template.
    pub fn remove_template(&mut self, name: &str) -> Result<ParticleSystem, RegistryError> {
        let system = self
            .templates
            .remove(name)
            .ok_or_else(|| RegistryError::TemplateNotFound(name.to_string()))?;
        info!("Removed particle system template '{name}'");
        Ok(system)
    }

    /// Removes every template.
    pub fn remove_all_templates(&mut self) {
        let count = self.templates.len();
        self.templates.clear();
        info!("Removed {count} particle system templates");
    }

    /// Template names, sorted.
    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Number of templates.
    #[must_use]
    pub fn num_templates(&self) -> usize {
        self.templates.len()
    }

    /// Creates a system named `name` as a copy of the template `template`.
    pub fn create_system(
        &self,
        name: &str,
        template: &str,
    ) -> Result<ParticleSystem, RegistryError> {
        let source = self
            .templates
            .get(template)
            .ok_or_else(|| RegistryError::TemplateNotFound(template.to_string()))?;
        let mut system = self.new_system(name);
        system.assign_from(source);
        debug!(system = name, template, "Created particle system from template");
        Ok(system)
    }

    /// Creates an empty system with a quota and renderer type.
    pub fn create_system_with_quota(
        &self,
        name: &str,
        quota: usize,
        renderer: &str,
    ) -> Result<ParticleSystem, RegistryError> {
        let mut system = ParticleSystem::with_settings(name, &self.settings);
        system.set_renderer(Some(self.create_renderer(renderer)?));
        system.set_particle_quota(quota);
        Ok(system)
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Registers every system in a TOML definition document as a template
    /// and returns how many were added.
    ///
    /// In [`LoadMode::Strict`] any problem fails the whole document and no
    /// template is registered. In [`LoadMode::Lenient`] rejected parameters,
    /// unknown component types and duplicate names are logged and skipped.
    pub fn load_definitions_str(&mut self, text: &str, mode: LoadMode) -> EmberResult<usize> {
        let file = DefinitionFile::parse(text)?;

        let mut built = Vec::with_capacity(file.system.len());
        for definition in &file.system {
            let duplicate = self.templates.contains_key(&definition.name)
                || built
                    .iter()
                    .any(|s: &ParticleSystem| s.name() == definition.name);
            if duplicate {
                let err = RegistryError::DuplicateTemplate(definition.name.clone());
                if mode == LoadMode::Strict {
                    return Err(err.into());
                }
                warn!("Skipping definition: {err}");
                continue;
            }
            built.push(definition.build(self, mode)?);
        }

        let count = built.len();
        for system in built {
            self.templates.insert(system.name().to_string(), system);
        }
        info!("Registered {count} particle system templates from definitions");
        Ok(count)
    }

    /// Reads a definition file and registers its systems as templates.
    pub fn load_definitions_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        mode: LoadMode,
    ) -> EmberResult<usize> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let count = self.load_definitions_str(&text, mode)?;
        info!("Loaded particle definitions from {}", path.display());
        Ok(count)
    }
}

fn sorted_keys<V>(map: &AHashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

impl fmt::Debug for ParticleSystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystemManager")
            .field("settings", &self.settings)
            .field("emitter_types", &self.emitter_types())
            .field("affector_types", &self.affector_types())
            .field("renderer_types", &self.renderer_types())
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::{EmberError, NodeTransform};
    use std::io::Write;

    const DEFINITIONS: &str = r#"
[[system]]
name = "Smoke"
params = { quota = 40, material = "SmokeMat", particle_width = 2, particle_height = 2 }

[[system.emitters]]
type = "Ellipsoid"
params = { emission_rate = 10, time_to_live = 3, width = 1, height = 1, depth = 1 }

[[system.affectors]]
type = "ColourFader"
params = { alpha = -0.3 }

[[system]]
name = "Sparks"
params = { quota = 100 }

[[system.emitters]]
type = "Point"
params = { emission_rate = 100, time_to_live = 1 }
"#;

    #[test]
    fn test_builtin_types() {
        let manager = ParticleSystemManager::with_builtin_factories();
        assert_eq!(manager.emitter_types(), vec!["Box", "Ellipsoid", "Point"]);
        assert_eq!(
            manager.affector_types(),
            vec!["ColourFader", "LinearForce", "Rotator", "Scaler"]
        );
        assert_eq!(manager.renderer_types(), vec!["null"]);

        assert_eq!(manager.create_emitter("Box").unwrap().type_name(), "Box");
        assert_eq!(manager.create_affector("Scaler").unwrap().type_name(), "Scaler");
        assert!(matches!(
            manager.create_emitter("Ring"),
            Err(RegistryError::UnknownEmitterType(name)) if name == "Ring"
        ));
        assert!(matches!(
            manager.create_affector("Vortex"),
            Err(RegistryError::UnknownAffectorType(_))
        ));
        assert!(matches!(
            manager.create_renderer("billboard"),
            Err(RegistryError::UnknownRendererType(_))
        ));
    }

    #[test]
    fn test_custom_factory_replaces() {
        let mut manager = ParticleSystemManager::default();
        assert!(manager.emitter_types().is_empty());
        manager.add_emitter_factory("Point", || Box::new(PointEmitter::new()));
        manager.add_emitter_factory("Point", || {
            let mut emitter = PointEmitter::new();
            emitter.core_mut().set_emission_rate(42.0);
            Box::new(emitter)
        });
        let emitter = manager.create_emitter("Point").unwrap();
        assert_eq!(emitter.core().emission_rate(), 42.0);
    }

    #[test]
    fn test_template_lifecycle() {
        let mut manager = ParticleSystemManager::with_builtin_factories();
        let template = manager.create_template("Fire").unwrap();
        template.set_particle_quota(25);
        assert!(matches!(
            manager.create_template("Fire"),
            Err(RegistryError::DuplicateTemplate(_))
        ));
        assert!(matches!(
            manager.add_template(ParticleSystem::new("Fire")),
            Err(RegistryError::DuplicateTemplate(_))
        ));

        manager.add_template(ParticleSystem::new("Water")).unwrap();
        assert_eq!(manager.template_names().collect::<Vec<_>>(), vec!["Fire", "Water"]);
        assert_eq!(manager.template("Fire").map(ParticleSystem::particle_quota), Some(25));

        let removed = manager.remove_template("Water").unwrap();
        assert_eq!(removed.name(), "Water");
        assert!(matches!(
            manager.remove_template("Water"),
            Err(RegistryError::TemplateNotFound(_))
        ));

        manager.remove_all_templates();
        assert_eq!(manager.num_templates(), 0);
    }

    #[test]
    fn test_create_system_from_template() {
        let mut manager = ParticleSystemManager::with_builtin_factories();
        let mut jet = ParticleSystem::new("Jet");
        manager.add_emitter(&mut jet, "Point").unwrap();
        manager.add_affector(&mut jet, "LinearForce").unwrap();
        jet.set_particle_quota(30);
        jet.set_material_name("JetMat");
        manager.add_template(jet).unwrap();

        let mut system = manager.create_system("jet-1", "Jet").unwrap();
        assert_eq!(system.name(), "jet-1");
        assert_eq!(system.particle_quota(), 30);
        assert_eq!(system.material_name(), "JetMat");
        assert_eq!(system.num_emitters(), 1);
        assert_eq!(system.num_affectors(), 1);

        system.attach(NodeTransform::IDENTITY);
        system.update(1.0);
        assert_eq!(system.num_particles(), 10);
        // The template itself never simulates
        assert_eq!(manager.template("Jet").unwrap().num_particles(), 0);

        assert!(matches!(
            manager.create_system("x", "Nope"),
            Err(RegistryError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_create_system_with_quota() {
        let manager = ParticleSystemManager::with_builtin_factories();
        let system = manager.create_system_with_quota("q", 500, "null").unwrap();
        assert_eq!(system.particle_quota(), 500);
        assert_eq!(system.num_emitters(), 0);
        assert!(manager.create_system_with_quota("q", 5, "ribbon").is_err());
    }

    #[test]
    fn test_set_renderer_by_name() {
        let manager = ParticleSystemManager::with_builtin_factories();
        let mut system = ParticleSystem::new("s");
        system.set_renderer(None);
        assert_eq!(system.renderer_name(), "");
        manager.set_renderer(&mut system, "null").unwrap();
        assert_eq!(system.renderer_name(), "null");
        assert!(manager.add_emitter(&mut system, "Ring").is_err());
    }

    #[test]
    fn test_load_definitions() {
        let mut manager = ParticleSystemManager::with_builtin_factories();
        let count = manager
            .load_definitions_str(DEFINITIONS, LoadMode::Strict)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(manager.template_names().collect::<Vec<_>>(), vec!["Smoke", "Sparks"]);

        let smoke = manager.template("Smoke").unwrap();
        assert_eq!(smoke.particle_quota(), 40);
        assert_eq!(smoke.default_width(), 2.0);
        assert_eq!(smoke.emitter(0).unwrap().type_name(), "Ellipsoid");
        assert_eq!(smoke.affector(0).unwrap().parameter("alpha").as_deref(), Some("-0.3"));

        let mut sparks = manager.create_system("sparks-1", "Sparks").unwrap();
        sparks.attach(NodeTransform::IDENTITY);
        sparks.update(0.5);
        assert_eq!(sparks.num_particles(), 50);
    }

    #[test]
    fn test_strict_load_is_all_or_nothing() {
        let mut manager = ParticleSystemManager::with_builtin_factories();
        manager.add_template(ParticleSystem::new("Sparks")).unwrap();

        let result = manager.load_definitions_str(DEFINITIONS, LoadMode::Strict);
        assert!(matches!(
            result,
            Err(EmberError::Registry(RegistryError::DuplicateTemplate(_)))
        ));
        assert_eq!(manager.num_templates(), 1);

        let count = manager
            .load_definitions_str(DEFINITIONS, LoadMode::Lenient)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(manager.num_templates(), 2);
    }

    #[test]
    fn test_load_definitions_file() {
        let mut manager = ParticleSystemManager::with_builtin_factories();
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(DEFINITIONS.as_bytes()).expect("write");

        assert_eq!(
            manager
                .load_definitions_file(file.path(), LoadMode::Strict)
                .unwrap(),
            2
        );
        assert!(matches!(
            manager.load_definitions_file("/nonexistent/ember.toml", LoadMode::Strict),
            Err(EmberError::Io(_))
        ));
    }

    #[test]
    fn test_demo_definitions_load_and_run() {
        let mut manager = ParticleSystemManager::with_builtin_factories();
        let text = include_str!("../../../demos/fireworks.toml");
        assert_eq!(manager.load_definitions_str(text, LoadMode::Strict).unwrap(), 3);

        let mut fireworks = manager.create_system("show", "Fireworks").unwrap();
        fireworks.attach(NodeTransform::IDENTITY);
        for _ in 0..60 {
            fireworks.update(1.0 / 60.0);
        }
        assert!(fireworks.active_emitted_emitter_count() >= 1);
        assert!(fireworks.num_particles() > fireworks.active_emitted_emitter_count());
        assert!(fireworks.emitter(1).unwrap().core().is_emitted());
    }

    #[test]
    fn test_unknown_default_renderer_falls_back() {
        let settings = ParticleSettings {
            default_renderer: "billboard".into(),
            ..Default::default()
        };
        let mut manager = ParticleSystemManager::new(settings);
        manager.register_builtin_factories();
        let template = manager.create_template("t").unwrap();
        assert_eq!(template.renderer_name(), "null");
    }
}
