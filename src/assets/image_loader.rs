use std::path::Path;

use image::DynamicImage;
use log::info;
use once_cell::sync::OnceCell;

use crate::assets::{Image, PixelFormat};
use crate::error::{Error, Result};

static LOADER: OnceCell<ImageLoader> = OnceCell::new();

/// Process-wide decoding settings fixed by [`init_image_loader`].
#[derive(Debug)]
struct ImageLoader {
    /// Textures address rows from the bottom, decoders from the top.
    flip_vertically: bool,
}

/// Initializes the shared image loader. Later calls are no-ops.
pub fn init_image_loader() {
    LOADER.get_or_init(|| {
        info!("image loader initialized");
        ImageLoader {
            flip_vertically: true,
        }
    });
}

/// Decodes an RGB8 or RGBA8 image with its origin at the lower-left corner.
pub fn load_image(path: impl AsRef<Path>) -> Result<Image> {
    load_with(&LOADER, path.as_ref())
}

fn load_with(loader: &OnceCell<ImageLoader>, path: &Path) -> Result<Image> {
    let loader = loader.get().ok_or(Error::LoaderNotInitialized)?;
    let decoded = image::open(path).map_err(|err| Error::asset(path, err))?;
    let mut image = match decoded {
        DynamicImage::ImageRgb8(buffer) => Image {
            width: buffer.width(),
            height: buffer.height(),
            format: PixelFormat::Rgb8,
            pixels: buffer.into_raw(),
        },
        DynamicImage::ImageRgba8(buffer) => Image {
            width: buffer.width(),
            height: buffer.height(),
            format: PixelFormat::Rgba8,
            pixels: buffer.into_raw(),
        },
        other => {
            return Err(Error::UnsupportedPixelFormat {
                path: path.to_path_buf(),
                format: format!("{:?}", other.color()),
            })
        }
    };
    if loader.flip_vertically {
        image.flip_vertically();
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, image: DynamicImage) -> std::path::PathBuf {
        let path = dir.join(name);
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn loading_before_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(
            dir.path(),
            "a.png",
            DynamicImage::ImageRgb8(image::RgbImage::new(2, 2)),
        );
        let uninitialized = OnceCell::new();
        assert!(matches!(
            load_with(&uninitialized, &path),
            Err(Error::LoaderNotInitialized)
        ));
    }

    #[test]
    fn rows_are_flipped_to_lower_left_origin() {
        init_image_loader();
        let dir = tempfile::tempdir().unwrap();
        let mut source = image::RgbaImage::new(1, 2);
        source.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        source.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        let path = write_png(dir.path(), "b.png", DynamicImage::ImageRgba8(source));

        let image = load_image(&path).unwrap();
        assert_eq!(image.format, PixelFormat::Rgba8);
        assert_eq!(&image.pixels[0..4], &[0, 0, 255, 255]);
        assert_eq!(&image.pixels[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn grayscale_is_unsupported() {
        init_image_loader();
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(
            dir.path(),
            "c.png",
            DynamicImage::ImageLuma8(image::GrayImage::new(2, 2)),
        );
        assert!(matches!(
            load_image(&path),
            Err(Error::UnsupportedPixelFormat { .. })
        ));
    }
}
