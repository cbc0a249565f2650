//! Loads definitions and drives systems frame by frame.

use crate::cli::Cli;
use anyhow::{bail, Context, Result};
use ember_common::NodeTransform;
use ember_particles::{
    CameraView, LoadMode, ParticleSettings, ParticleSystem, ParticleSystemManager,
};
use glam::Vec3;
use tracing::{debug, info};

/// How one system is driven.
#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    /// Frames to run
    pub frames: u32,
    /// Seconds per frame
    pub dt: f32,
    /// Notify a camera every frame
    pub visible: bool,
    /// Statistics line every N frames (0 = never)
    pub report_every: u32,
}

impl From<&Cli> for SimOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            frames: cli.frames,
            dt: cli.dt,
            visible: !cli.hidden,
            report_every: cli.report_every,
        }
    }
}

/// What a run ended with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Frames simulated
    pub frames: u32,
    /// Most particles active at once
    pub peak_particles: usize,
    /// Particles active after the last frame
    pub final_particles: usize,
    /// Free visual slots after the last frame
    pub free_particles: usize,
    /// Allocated visual slots
    pub pool_len: usize,
    /// Emitted emitters active after the last frame
    pub active_emitted_emitters: usize,
    /// Bounding radius after the last frame
    pub bounding_radius: f32,
}

/// Runs `system` at the origin for `options.frames` frames.
pub fn simulate(system: &mut ParticleSystem, options: &SimOptions) -> RunSummary {
    let camera = CameraView::new(Vec3::new(0.0, 0.0, 100.0), Vec3::NEG_Z);
    if !system.is_attached() {
        system.attach(NodeTransform::IDENTITY);
    }

    let mut peak = 0;
    for frame in 1..=options.frames {
        system.update(options.dt);
        if options.visible {
            system.notify_current_camera(&camera);
        }
        peak = peak.max(system.num_particles());

        if options.report_every > 0 && frame % options.report_every == 0 {
            debug!(
                system = system.name(),
                frame,
                active = system.num_particles(),
                free = system.free_particle_count(),
                "Frame"
            );
        }
    }

    RunSummary {
        frames: options.frames,
        peak_particles: peak,
        final_particles: system.num_particles(),
        free_particles: system.free_particle_count(),
        pool_len: system.pool_len(),
        active_emitted_emitters: system.active_emitted_emitter_count(),
        bounding_radius: system.bounding_radius(),
    }
}

/// Loads the definitions named on the command line and simulates the
/// selected templates.
pub fn run(cli: &Cli) -> Result<Vec<(String, RunSummary)>> {
    let settings = ParticleSettings::load_from(&cli.settings);
    let mut manager = ParticleSystemManager::new(settings);
    manager.register_builtin_factories();

    let mode = if cli.lenient {
        LoadMode::Lenient
    } else {
        LoadMode::Strict
    };
    let count = manager
        .load_definitions_file(&cli.definitions, mode)
        .with_context(|| format!("Failed to load {}", cli.definitions.display()))?;
    if count == 0 {
        bail!("{} defines no particle systems", cli.definitions.display());
    }

    let templates: Vec<String> = match &cli.template {
        Some(name) => vec![name.clone()],
        None => manager.template_names().map(str::to_string).collect(),
    };

    let options = SimOptions::from(cli);
    let mut summaries = Vec::with_capacity(templates.len());
    for template in templates {
        let mut system = manager
            .create_system(&format!("{template}#sim"), &template)
            .with_context(|| format!("Cannot instantiate '{template}'"))?;
        let summary = simulate(&mut system, &options);
        info!(
            template = %template,
            frames = summary.frames,
            peak = summary.peak_particles,
            active = summary.final_particles,
            free = summary.free_particles,
            pool = summary.pool_len,
            emitted_emitters = summary.active_emitted_emitters,
            radius = summary.bounding_radius,
            "Simulation finished"
        );
        summaries.push((template, summary));
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ember_particles::{ParticleEmitter, PointEmitter};
    use std::fs;

    const DEFINITIONS: &str = r#"
[[system]]
name = "Steady"
params = { quota = 100 }

[[system.emitters]]
type = "Point"
params = { emission_rate = 5, time_to_live = 2 }

[[system]]
name = "Hidden"
params = { quota = 100, nonvisible_update_timeout = 1 }

[[system.emitters]]
type = "Point"
params = { emission_rate = 1, time_to_live = 100 }
"#;

    fn cli(dir: &tempfile::TempDir, extra: &[&str]) -> Cli {
        let definitions = dir.path().join("fx.toml");
        fs::write(&definitions, DEFINITIONS).expect("write definitions");
        let settings = dir.path().join("ember.toml");
        let mut args = vec![
            "ember-sim".to_string(),
            definitions.display().to_string(),
            "--settings".to_string(),
            settings.display().to_string(),
        ];
        args.extend(extra.iter().map(|s| (*s).to_string()));
        Cli::try_parse_from(args).expect("arguments")
    }

    #[test]
    fn test_simulate_steady_state() {
        let mut system = ParticleSystem::new("s");
        system.set_particle_quota(100);
        let mut emitter = PointEmitter::new();
        emitter.core_mut().set_emission_rate(5.0);
        emitter.core_mut().set_time_to_live(2.0);
        system.add_emitter(Box::new(emitter));

        let options = SimOptions {
            frames: 6,
            dt: 1.0,
            visible: true,
            report_every: 2,
        };
        let summary = simulate(&mut system, &options);
        assert_eq!(summary.peak_particles, 10);
        assert_eq!(summary.final_particles, 10);
        assert_eq!(summary.pool_len, 100);
        assert_eq!(summary.free_particles, 90);
    }

    #[test]
    fn test_run_all_templates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cli = cli(&dir, &["--frames", "4", "--dt", "1"]);
        let summaries = run(&cli).unwrap();
        let names: Vec<&str> = summaries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Hidden", "Steady"]);
        assert_eq!(summaries[1].1.final_particles, 10);
        // Visible every frame, so the timeout never applies
        assert_eq!(summaries[0].1.final_particles, 4);
    }

    #[test]
    fn test_hidden_systems_stop_updating() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cli = cli(&dir, &["--template", "Hidden", "--frames", "10", "--dt", "1", "--hidden"]);
        let summaries = run(&cli).unwrap();
        assert_eq!(summaries.len(), 1);
        // Frame 1 runs, frame 2 reaches the 1 s timeout
        assert_eq!(summaries[0].1.final_particles, 1);
    }

    #[test]
    fn test_missing_template_and_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cli_missing = cli(&dir, &["--template", "Nope"]);
        assert!(run(&cli_missing).is_err());

        let cli_no_file = Cli::try_parse_from(["ember-sim", "/nonexistent/fx.toml"]).unwrap();
        assert!(run(&cli_no_file).is_err());
    }
}
