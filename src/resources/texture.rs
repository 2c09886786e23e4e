use log::debug;

use crate::assets::{Image, PixelFormat};
use crate::error::{Error, Result};
use crate::gpu::{FilterMode, Gpu, GpuHandle, TextureFormat, TextureImage, WrapMode};

/// Owning handle of a 2D texture.
///
/// Sampling state changes apply immediately. [`Texture::bind`] makes the
/// texture visible to draws on unit 0 until [`Texture::unbind`].
pub struct Texture {
    gpu: Gpu,
    texture: GpuHandle,
}

impl Texture {
    /// Creates a texture name with no storage.
    pub fn empty(gpu: Gpu) -> Result<Self> {
        let texture = gpu.create_texture();
        if texture.is_empty() {
            return Err(Error::ResourceCreation {
                resource: "texture",
            });
        }
        Ok(Self { gpu, texture })
    }

    /// Uploads `image` once; sampling defaults to bilinear with repeat.
    pub fn from_image(gpu: Gpu, image: &Image) -> Result<Self> {
        let texture = Self::empty(gpu)?;
        let format = match image.format {
            PixelFormat::Rgb8 => TextureFormat::Rgb8,
            PixelFormat::Rgba8 => TextureFormat::Rgba8,
        };
        texture.gpu.texture_image(
            texture.texture,
            &TextureImage {
                width: image.width,
                height: image.height,
                format,
                pixels: Some(&image.pixels),
            },
        );
        texture.set_bilinear_filter();
        texture.set_wrap_repeat();
        debug!(
            "uploaded {}x{} texture {}",
            image.width,
            image.height,
            texture.texture.raw()
        );
        Ok(texture)
    }

    /// Allocates uninitialized storage to render into.
    pub fn render_target(gpu: Gpu, width: u32, height: u32, format: TextureFormat) -> Result<Self> {
        let texture = Self::empty(gpu)?;
        texture.gpu.texture_image(
            texture.texture,
            &TextureImage {
                width,
                height,
                format,
                pixels: None,
            },
        );
        Ok(texture)
    }

    pub fn handle(&self) -> GpuHandle {
        self.texture
    }

    pub fn is_empty(&self) -> bool {
        self.texture.is_empty()
    }

    pub fn bind(&self) {
        self.gpu.bind_texture(0, self.texture);
    }

    pub fn unbind(&self) {
        self.gpu.bind_texture(0, GpuHandle::EMPTY);
    }

    pub fn set_bilinear_filter(&self) {
        self.gpu.texture_filter(self.texture, FilterMode::Linear);
    }

    pub fn set_nearest_filter(&self) {
        self.gpu.texture_filter(self.texture, FilterMode::Nearest);
    }

    pub fn set_wrap_repeat(&self) {
        self.gpu.texture_wrap(self.texture, WrapMode::Repeat);
    }

    pub fn set_wrap_clamp_to_edge(&self) {
        self.gpu.texture_wrap(self.texture, WrapMode::ClampToEdge);
    }

    /// Moves the texture out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        Self {
            gpu: self.gpu.clone(),
            texture: self.texture.take(),
        }
    }

    /// Deletes the texture; calling it again does nothing.
    pub fn release(&mut self) {
        let texture = self.texture.take();
        if !texture.is_empty() {
            self.gpu.delete_texture(texture);
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("texture", &self.texture)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::{HeadlessDevice, ObjectKind};

    fn device() -> (Arc<HeadlessDevice>, Gpu) {
        let device = Arc::new(HeadlessDevice::new());
        let gpu: Gpu = device.clone();
        (device, gpu)
    }

    #[test]
    fn image_upload_defaults_to_bilinear_repeat() {
        let (device, gpu) = device();
        let image = Image::checkerboard(4, 1, [255; 3], [0; 3]);
        let texture = Texture::from_image(gpu, &image).unwrap();
        assert_eq!(device.texture_size(texture.handle()), Some((4, 4)));
        assert_eq!(
            device.texture_sampling(texture.handle()),
            Some((FilterMode::Linear, WrapMode::Repeat))
        );
    }

    #[test]
    fn creation_failure_is_reported() {
        let (device, gpu) = device();
        device.fail_creation_of(ObjectKind::Texture);
        assert!(matches!(
            Texture::empty(gpu),
            Err(Error::ResourceCreation { resource: "texture" })
        ));
    }

    #[test]
    fn moved_from_texture_drops_silently() {
        let (device, gpu) = device();
        let mut source = Texture::empty(gpu).unwrap();
        let moved = source.take();
        assert!(source.is_empty());

        device.clear_calls();
        drop(source);
        assert!(device.calls().is_empty());

        drop(moved);
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let (device, gpu) = device();
        let mut texture = Texture::empty(gpu).unwrap();
        texture.release();
        device.clear_calls();
        texture.release();
        drop(texture);
        assert!(device.calls().is_empty());
    }
}
