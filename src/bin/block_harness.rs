//! Runs a block fixture headlessly and prints, saves or checks what it produced.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use kestrel_blocks::harness::{load_fixture, run_fixture, HarnessOutput};

#[derive(Debug, Default)]
struct HarnessArgs {
    fixture: PathBuf,
    steps: Option<usize>,
    seed: Option<u64>,
    summary: bool,
    write_output: Option<PathBuf>,
    golden: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = match HarnessArgs::parse(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => return,
        Err(err) => {
            eprintln!("[block-harness] {err:#}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(&args) {
        eprintln!("[block-harness] {err:#}");
        std::process::exit(1);
    }
}

fn run(args: &HarnessArgs) -> Result<()> {
    let mut fixture = load_fixture(&args.fixture)?;
    if let Some(steps) = args.steps {
        fixture.steps = steps;
    }
    if let Some(seed) = args.seed {
        fixture.seed = seed;
    }
    let output = run_fixture(&fixture)?;

    if let Some(path) = &args.write_output {
        output.write_to(path)?;
        println!("[block-harness] wrote {}", path.display());
    }
    if let Some(path) = &args.golden {
        let expected = HarnessOutput::load(path)?;
        if let Some(difference) = output.first_difference(&expected) {
            bail!("{} differs from golden {}: {difference}", args.fixture.display(), path.display());
        }
        println!("[block-harness] matched golden {}", path.display());
    }

    if args.summary {
        for line in output.summary() {
            println!("{line}");
        }
    } else if args.write_output.is_none() && args.golden.is_none() {
        println!("{}", serde_json::to_string_pretty(&output).context("serializing harness output")?);
    }
    let errors: usize = output.results.iter().map(|result| result.errors).sum();
    if errors > 0 {
        log::warn!("[block-harness] {errors} error entries across {} steps", output.steps);
    }
    Ok(())
}

impl HarnessArgs {
    /// `Ok(None)` means help was printed.
    fn parse<I>(args: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = HarnessArgs::default();
        let mut fixture = None;
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| iter.next().ok_or_else(|| anyhow!("{flag} requires a value"));
            match arg.as_str() {
                "--fixture" | "-f" => fixture = Some(PathBuf::from(value("--fixture")?)),
                "--steps" => {
                    let raw = value("--steps")?;
                    parsed.steps = Some(raw.parse().with_context(|| format!("invalid step count '{raw}'"))?);
                }
                "--seed" => {
                    let raw = value("--seed")?;
                    parsed.seed = Some(raw.parse().with_context(|| format!("invalid seed '{raw}'"))?);
                }
                "--summary" | "-s" => parsed.summary = true,
                "--write-output" | "-o" => parsed.write_output = Some(PathBuf::from(value("--write-output")?)),
                "--golden" | "-g" => parsed.golden = Some(PathBuf::from(value("--golden")?)),
                "--help" | "-h" => {
                    print_help();
                    return Ok(None);
                }
                other => bail!("unknown argument '{other}'"),
            }
        }
        parsed.fixture = fixture.ok_or_else(|| anyhow!("--fixture <path> is required"))?;
        Ok(Some(parsed))
    }
}

fn print_help() {
    println!("Usage: block_harness --fixture <path> [options]");
    println!("  -f, --fixture <path>        Fixture JSON (scene or scene_path, steps, inputs)");
    println!("      --steps <n>             Override the fixture's step count");
    println!("      --seed <n>              Override the fixture's random seed");
    println!("  -s, --summary               Print per-step counts and final entities instead of JSON");
    println!("  -o, --write-output <path>   Save the output JSON (refreshes a golden file)");
    println!("  -g, --golden <path>         Fail on the first step that differs from this output");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_overrides() {
        let parsed = HarnessArgs::parse(args(&["-f", "walk.json", "--steps", "10", "--seed", "7", "-s"]))
            .expect("parse")
            .expect("not help");
        assert_eq!(parsed.fixture, PathBuf::from("walk.json"));
        assert_eq!(parsed.steps, Some(10));
        assert_eq!(parsed.seed, Some(7));
        assert!(parsed.summary);
    }

    #[test]
    fn fixture_is_required_and_values_are_checked() {
        assert!(HarnessArgs::parse(args(&["--steps", "3"])).is_err());
        assert!(HarnessArgs::parse(args(&["-f", "a.json", "--steps", "many"])).is_err());
        assert!(HarnessArgs::parse(args(&["-f"])).is_err());
    }
}
