use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::{error, warn};

use mirror_room::{
    init_image_loader, run_headless, run_interactive, AssetLoader, BuiltinAssets,
    DirectoryAssets, ViewerConfig, WindowInitError,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        error!("{err:#}");
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let config = options.config()?;
    init_image_loader();

    let directory = DirectoryAssets::new(&config.assets);
    let assets: &dyn AssetLoader = if config.assets.is_dir() {
        &directory
    } else {
        warn!(
            "asset directory {} not found, using built-in stand-ins",
            config.assets.display()
        );
        &BuiltinAssets
    };

    if options.headless {
        return headless(&config, assets);
    }
    match run_interactive(&config, assets) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                headless(&config, assets)
            } else {
                Err(err)
            }
        }
    }
}

fn headless(config: &ViewerConfig, assets: &dyn AssetLoader) -> Result<()> {
    let report = run_headless(config, assets)?;
    println!("{report}");
    Ok(())
}

#[derive(Debug, Default)]
struct CliOptions {
    assets: Option<PathBuf>,
    config: Option<PathBuf>,
    headless: bool,
    frames: Option<u32>,
    seed: Option<u64>,
}

const USAGE: &str =
    "Usage: mirror-room [--assets DIR] [--config FILE] [--headless] [--frames N] [--seed N]";

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--assets" => options.assets = Some(PathBuf::from(value("--assets")?)),
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--headless" => options.headless = true,
                "--frames" => {
                    let frames = value("--frames")?;
                    options.frames = Some(
                        frames
                            .parse()
                            .with_context(|| format!("invalid --frames value '{frames}'"))?,
                    );
                }
                "--seed" => {
                    let seed = value("--seed")?;
                    options.seed = Some(
                        seed.parse()
                            .with_context(|| format!("invalid --seed value '{seed}'"))?,
                    );
                }
                "--help" | "-h" => return Err(anyhow!(USAGE)),
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }

    /// Defaults, then the config file, then flags.
    fn config(&self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let xml = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                ViewerConfig::from_xml(&xml)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => ViewerConfig::default(),
        };
        if let Some(assets) = &self.assets {
            config.assets = assets.clone();
        }
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn flags_override_defaults() {
        let options = CliOptions::parse(args(&[
            "--headless",
            "--frames",
            "5",
            "--seed",
            "9",
            "--assets",
            "room",
        ]))
        .unwrap();
        assert!(options.headless);
        let config = options.config().unwrap();
        assert_eq!(config.frames, 5);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.assets, PathBuf::from("room"));
        assert_eq!(config.width, 800);
    }

    #[test]
    fn rejects_unknown_and_incomplete_flags() {
        assert!(CliOptions::parse(args(&["--fast"])).is_err());
        assert!(CliOptions::parse(args(&["--frames"])).is_err());
        assert!(CliOptions::parse(args(&["--frames", "many"])).is_err());
    }
}
