use crate::config::RuntimeConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOverrides {
    scene: Option<PathBuf>,
    config: Option<PathBuf>,
    frames: Option<usize>,
    width: Option<f32>,
    height: Option<f32>,
    clone_limit: Option<usize>,
    seed: Option<u64>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name <value>.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "scene" => overrides.scene = Some(PathBuf::from(value)),
                "config" => overrides.config = Some(PathBuf::from(value)),
                "frames" => {
                    overrides.frames =
                        Some(value.parse::<usize>().with_context(|| format!("Invalid frame count '{value}'"))?);
                }
                "width" => {
                    overrides.width = Some(parse_dimension("width", &value)?);
                }
                "height" => {
                    overrides.height = Some(parse_dimension("height", &value)?);
                }
                "clone-limit" => {
                    overrides.clone_limit =
                        Some(value.parse::<usize>().with_context(|| format!("Invalid clone limit '{value}'"))?);
                }
                "seed" => {
                    overrides.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --scene, --config, --frames, --width, --height, \
                     --clone-limit, --seed."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn scene(&self) -> Option<&PathBuf> {
        self.scene.as_ref()
    }

    pub fn config(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn frames(&self) -> Option<usize> {
        self.frames
    }

    pub fn to_config_overrides(&self) -> RuntimeConfigOverrides {
        RuntimeConfigOverrides {
            width: self.width,
            height: self.height,
            clone_limit: self.clone_limit,
            seed: self.seed,
        }
    }
}

fn parse_dimension(flag: &str, value: &str) -> Result<f32> {
    let parsed = value.parse::<f32>().with_context(|| format!("Invalid {flag} '{value}'"))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        bail!("Invalid {flag} '{value}'. Canvas dimensions must be positive.");
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scene_frames_and_canvas() {
        let args = ["app", "--scene", "demo.json", "--frames", "120", "--width", "640", "--height", "480"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.scene(), Some(&PathBuf::from("demo.json")));
        assert_eq!(overrides.frames(), Some(120));
        let cfg = overrides.to_config_overrides();
        assert_eq!((cfg.width, cfg.height), (Some(640.0), Some(480.0)));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["app", "--clone-limit", "10", "--clone-limit", "20"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.to_config_overrides().clone_limit, Some(20));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["app", "--frames"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_bad_dimensions() {
        let err = CliOverrides::parse(["app", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        let err = CliOverrides::parse(["app", "--width", "-4"]).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }
}
