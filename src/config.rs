use std::path::PathBuf;

use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Viewer settings. Built from defaults, then an optional XML file, then
/// command line flags, each overriding the previous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_assets")]
    pub assets: PathBuf,
    #[serde(default = "default_mirror_size")]
    pub mirror_size: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Seed for the cube scrambler; taken from the clock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Frames rendered by a headless run.
    #[serde(default = "default_frames")]
    pub frames: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            assets: default_assets(),
            mirror_size: default_mirror_size(),
            fps: default_fps(),
            seed: None,
            frames: default_frames(),
        }
    }
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_assets() -> PathBuf {
    PathBuf::from("Data")
}

fn default_mirror_size() -> u32 {
    300
}

fn default_fps() -> u32 {
    30
}

fn default_frames() -> u32 {
    3
}

impl ViewerConfig {
    /// Parses a `<viewer>` document. Every child element is optional and
    /// falls back to the default.
    ///
    /// ```xml
    /// <viewer>
    ///   <width>1024</width>
    ///   <assets>Data</assets>
    ///   <seed>7</seed>
    /// </viewer>
    /// ```
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml)
            .map_err(|err| Error::InvalidConfig(format!("invalid viewer XML: {err}")))?;
        let root = document.root_element();
        if !root.has_tag_name("viewer") {
            return Err(Error::InvalidConfig(format!(
                "expected <viewer> root, found <{}>",
                root.tag_name().name()
            )));
        }

        let mut config = Self::default();
        config.width = parse_u32(&root, "width", config.width)?;
        config.height = parse_u32(&root, "height", config.height)?;
        if let Some(assets) = optional_text(&root, "assets") {
            config.assets = PathBuf::from(assets);
        }
        config.mirror_size = parse_u32(&root, "mirror_size", config.mirror_size)?;
        config.fps = parse_u32(&root, "fps", config.fps)?;
        config.frames = parse_u32(&root, "frames", config.frames)?;
        if let Some(seed) = optional_text(&root, "seed") {
            config.seed = Some(parse_number(&seed, "seed")?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (tag, value) in [
            ("width", self.width),
            ("height", self.height),
            ("mirror_size", self.mirror_size),
            ("fps", self.fps),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("<{tag}> must be positive")));
            }
        }
        Ok(())
    }

    /// Fixed update step in seconds.
    pub fn frame_delta(&self) -> f32 {
        1.0 / self.fps.max(1) as f32
    }
}

fn parse_u32(node: &Node<'_, '_>, tag: &str, default: u32) -> Result<u32> {
    match optional_text(node, tag) {
        Some(value) => parse_number(&value, tag),
        None => Ok(default),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, tag: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| Error::InvalidConfig(format!("<{tag}> '{value}': {err}")))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ViewerConfig::from_xml("<viewer/>").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.width, 800);
        assert_eq!(config.mirror_size, 300);
        assert!((config.frame_delta() - 1.0 / 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn fields_override_defaults() {
        let config = ViewerConfig::from_xml(
            r#"
            <viewer>
                <width>1024</width>
                <height> 768 </height>
                <assets>/opt/room</assets>
                <seed>42</seed>
                <frames>10</frames>
            </viewer>
            "#,
        )
        .unwrap();
        assert_eq!((config.width, config.height), (1024, 768));
        assert_eq!(config.assets, PathBuf::from("/opt/room"));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.frames, 10);
        assert_eq!(config.fps, 30);
    }

    #[test]
    fn rejects_bad_numbers_and_roots() {
        let err = ViewerConfig::from_xml("<viewer><fps>fast</fps></viewer>").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("<fps>")));
        assert!(ViewerConfig::from_xml("<scene/>").is_err());
        assert!(ViewerConfig::from_xml("<viewer><fps>0</fps></viewer>").is_err());
        assert!(ViewerConfig::from_xml("<viewer>").is_err());
    }
}
