use anyhow::{Context, Result};
use kestrel_blocks::cli::CliOverrides;
use kestrel_blocks::config::RuntimeConfig;
use kestrel_blocks::{Runtime, SceneDescription};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/runtime.json";
const DEFAULT_FRAMES: usize = 120;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(&cli) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: &CliOverrides) -> Result<()> {
    let config_path = cli.config().cloned().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = RuntimeConfig::load_or_default(&config_path);
    let overrides = cli.to_config_overrides();
    if !overrides.is_empty() {
        log::info!("CLI overrides applied: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }
    let scene_path = cli.scene().context("--scene <path> is required")?;
    let frames = cli.frames().unwrap_or(DEFAULT_FRAMES);

    let scene = SceneDescription::load_from_path(scene_path)?;
    let mut runtime = Runtime::new(config);
    runtime.load_scene(&scene)?;
    runtime.start();
    for frame in 0..frames {
        runtime.update();
        if let Some(name) = runtime.take_pending_scene_switch() {
            let next = sibling_scene(scene_path, &name);
            let scene = SceneDescription::load_from_path(&next)
                .with_context(|| format!("frame {frame}: switching to scene '{name}'"))?;
            runtime.load_scene(&scene)?;
            runtime.start();
        }
        if !runtime.is_running() {
            log::info!("runtime stopped after {} frames", frame + 1);
            break;
        }
    }

    for entry in runtime.log_entries() {
        println!("{entry}");
    }
    for snapshot in runtime.snapshots() {
        println!("{}", serde_json::to_string(&snapshot)?);
    }
    runtime.cleanup();
    Ok(())
}

/// Scenes are looked up next to the starting scene as `<name>.json`.
fn sibling_scene(current: &Path, name: &str) -> PathBuf {
    let file = format!("{name}.json");
    match current.parent() {
        Some(parent) => parent.join(file),
        None => PathBuf::from(file),
    }
}
