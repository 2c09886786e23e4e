//! Geometry and image sources for scene construction.
//!
//! The scene asks an [`AssetLoader`] for assets by base name (`"Chair"`,
//! `"Birchwood"`). [`DirectoryAssets`] resolves them against a data
//! directory; [`BuiltinAssets`] synthesizes stand-ins so the viewer runs
//! without any asset files.

pub mod image_loader;
pub mod obj;
pub mod primitives;

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};

pub use image_loader::{init_image_loader, load_image};
pub use obj::parse_obj;

/// Triangle soup ready for upload: one entry per triangle corner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub texels: Vec<f32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// Decoded image with rows stored bottom-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Image {
    /// Reverses the row order in place.
    pub fn flip_vertically(&mut self) {
        let stride = self.width as usize * self.format.channels();
        if stride == 0 {
            return;
        }
        let rows = self.pixels.len() / stride;
        for row in 0..rows / 2 {
            let (top, bottom) = self.pixels.split_at_mut((rows - 1 - row) * stride);
            top[row * stride..(row + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }

    /// Two-color checkerboard with square cells of `cell` pixels.
    pub fn checkerboard(size: u32, cell: u32, even: [u8; 3], odd: [u8; 3]) -> Self {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity((size * size * 3) as usize);
        for y in 0..size {
            for x in 0..size {
                let color = if (x / cell + y / cell) % 2 == 0 { even } else { odd };
                pixels.extend_from_slice(&color);
            }
        }
        Self {
            width: size,
            height: size,
            format: PixelFormat::Rgb8,
            pixels,
        }
    }
}

/// Source of named meshes and images.
pub trait AssetLoader {
    fn load_geometry(&self, name: &str) -> Result<Geometry>;
    fn load_image(&self, name: &str) -> Result<Image>;
}

/// Loads `<root>/<name>.obj` and `<root>/<name>.png`.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetLoader for DirectoryAssets {
    fn load_geometry(&self, name: &str) -> Result<Geometry> {
        let path = self.root.join(format!("{name}.obj"));
        let text = std::fs::read_to_string(&path).map_err(|err| Error::asset(&path, err))?;
        let geometry = parse_obj(&text).map_err(|err| Error::asset(&path, format!("{err:#}")))?;
        debug!(
            "loaded {} ({} vertices)",
            path.display(),
            geometry.vertex_count()
        );
        Ok(geometry)
    }

    fn load_image(&self, name: &str) -> Result<Image> {
        load_image(self.root.join(format!("{name}.png")))
    }
}

/// Procedural stand-ins: `Cube`, `Wall` and `Sphere` map to matching
/// primitives, any other mesh to the unit cube. Images are checkerboards
/// tinted by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinAssets;

impl AssetLoader for BuiltinAssets {
    fn load_geometry(&self, name: &str) -> Result<Geometry> {
        Ok(match name {
            "Wall" => primitives::plane(),
            "Sphere" => primitives::uv_sphere(24, 16),
            _ => primitives::cube(),
        })
    }

    fn load_image(&self, name: &str) -> Result<Image> {
        let seed = name
            .bytes()
            .fold(0u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as u32));
        let tint = [
            96 + (seed % 128) as u8,
            96 + (seed / 128 % 128) as u8,
            96 + (seed / 16_384 % 128) as u8,
        ];
        Ok(Image::checkerboard(64, 8, tint, [32, 32, 32]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_swaps_rows() {
        let mut image = Image {
            width: 1,
            height: 3,
            format: PixelFormat::Rgb8,
            pixels: vec![1, 1, 1, 2, 2, 2, 3, 3, 3],
        };
        image.flip_vertically();
        assert_eq!(image.pixels, vec![3, 3, 3, 2, 2, 2, 1, 1, 1]);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let image = Image::checkerboard(4, 2, [255, 0, 0], [0, 0, 255]);
        assert_eq!(image.pixels.len(), 4 * 4 * 3);
        assert_eq!(&image.pixels[0..3], &[255, 0, 0]);
        assert_eq!(&image.pixels[6..9], &[0, 0, 255]);
    }

    #[test]
    fn builtin_assets_cover_scene_names() {
        let assets = BuiltinAssets;
        assert_eq!(assets.load_geometry("Wall").unwrap(), primitives::plane());
        assert_eq!(assets.load_geometry("Chair").unwrap().vertex_count(), 36);
        let image = assets.load_image("Birchwood").unwrap();
        assert_eq!((image.width, image.height), (64, 64));
    }

    #[test]
    fn missing_obj_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let assets = DirectoryAssets::new(dir.path());
        match assets.load_geometry("Nope") {
            Err(Error::AssetLoad { path, .. }) => assert!(path.ends_with("Nope.obj")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn directory_assets_parse_obj_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Tri.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();
        let geometry = DirectoryAssets::new(dir.path()).load_geometry("Tri").unwrap();
        assert_eq!(geometry.vertex_count(), 3);
    }
}
