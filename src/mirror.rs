//! Planar mirror rendered through an off-screen target.
//!
//! The reflected scene is drawn into the mirror's framebuffer with a camera
//! whose eye is mirrored across the mirror plane; the mirror surface then
//! samples the color attachment during the regular pass.

use glam::Vec3;
use log::{debug, info};

use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::gpu::{ClearMask, FramebufferStatus, Gpu, GpuHandle, TextureFormat};
use crate::resources::Texture;

pub struct Mirror {
    gpu: Gpu,
    width: u32,
    height: u32,
    framebuffer: GpuHandle,
    color: Texture,
    depth: Texture,
}

impl Mirror {
    /// Creates the framebuffer with an RGBA8 color and a depth/stencil
    /// attachment of `width`×`height`.
    pub fn new(gpu: Gpu, width: u32, height: u32) -> Result<Self> {
        let color = Texture::render_target(gpu.clone(), width, height, TextureFormat::Rgba8)?;
        color.set_wrap_clamp_to_edge();
        color.set_bilinear_filter();
        let depth =
            Texture::render_target(gpu.clone(), width, height, TextureFormat::Depth24Stencil8)?;

        let framebuffer = gpu.create_framebuffer();
        if framebuffer.is_empty() {
            return Err(Error::ResourceCreation {
                resource: "framebuffer",
            });
        }
        let mirror = Self {
            gpu,
            width,
            height,
            framebuffer,
            color,
            depth,
        };

        let status = mirror.gpu.framebuffer_attachments(
            mirror.framebuffer,
            mirror.color.handle(),
            mirror.depth.handle(),
        );
        if let FramebufferStatus::Incomplete(reason) = status {
            return Err(Error::IncompleteRenderTarget {
                width,
                height,
                reason,
            });
        }
        info!(
            "created {}x{} mirror target (framebuffer {})",
            width,
            height,
            mirror.framebuffer.raw()
        );
        Ok(mirror)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn framebuffer(&self) -> GpuHandle {
        self.framebuffer
    }

    pub fn color_texture(&self) -> &Texture {
        &self.color
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffer.is_empty()
    }

    /// Redirects draws into the mirror and clears color and depth.
    pub fn set_active(&self) {
        self.gpu.bind_framebuffer(self.framebuffer);
        self.gpu.clear(ClearMask::COLOR_DEPTH);
    }

    /// Restores the default render target.
    pub fn set_inactive(&self) {
        self.gpu.bind_framebuffer(GpuHandle::EMPTY);
    }

    /// Copy of `camera` whose eye is multiplied component-wise by `mask`.
    pub fn reflected_camera(&self, camera: &Camera, mask: Vec3) -> Camera {
        let mut reflected = camera.clone();
        reflected.set_eye_position_manual(camera.eye_position() * mask);
        reflected
    }

    pub fn bind_as_texture(&self) {
        self.color.bind();
    }

    pub fn unbind_as_texture(&self) {
        self.color.unbind();
    }

    /// Moves the mirror out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        Self {
            gpu: self.gpu.clone(),
            width: self.width,
            height: self.height,
            framebuffer: self.framebuffer.take(),
            color: self.color.take(),
            depth: self.depth.take(),
        }
    }
}

impl Drop for Mirror {
    fn drop(&mut self) {
        let framebuffer = self.framebuffer.take();
        if !framebuffer.is_empty() {
            debug!("releasing mirror framebuffer {}", framebuffer.raw());
            self.gpu.delete_framebuffer(framebuffer);
        }
    }
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("framebuffer", &self.framebuffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::{DeviceCall, HeadlessDevice, ObjectKind};

    fn device() -> (Arc<HeadlessDevice>, Gpu) {
        let device = Arc::new(HeadlessDevice::new());
        let gpu: Gpu = device.clone();
        (device, gpu)
    }

    #[test]
    fn attachments_match_requested_size() {
        let (device, gpu) = device();
        let mirror = Mirror::new(gpu, 300, 300).unwrap();
        assert_eq!(
            device.texture_size(mirror.color_texture().handle()),
            Some((300, 300))
        );
        assert_eq!(
            device.texture_sampling(mirror.color_texture().handle()),
            Some((crate::gpu::FilterMode::Linear, crate::gpu::WrapMode::ClampToEdge))
        );
    }

    #[test]
    fn incomplete_target_releases_everything() {
        let (device, gpu) = device();
        device.force_incomplete_framebuffers();
        let err = Mirror::new(gpu, 300, 300).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteRenderTarget {
                width: 300,
                height: 300,
                ..
            }
        ));
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn texture_failure_leaves_nothing_behind() {
        let (device, gpu) = device();
        device.fail_creation_of(ObjectKind::Texture);
        assert!(Mirror::new(gpu, 16, 16).is_err());
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn set_active_binds_and_clears() {
        let (device, gpu) = device();
        let mirror = Mirror::new(gpu, 8, 8).unwrap();
        device.clear_calls();
        mirror.set_active();
        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::BindFramebuffer(mirror.framebuffer()),
                DeviceCall::Clear(ClearMask::COLOR_DEPTH),
            ]
        );
        mirror.set_inactive();
        assert!(device.current_framebuffer().is_empty());
    }

    #[test]
    fn reflected_camera_leaves_input_untouched() {
        let (_device, gpu) = device();
        let mirror = Mirror::new(gpu, 8, 8).unwrap();
        let mut camera = Camera::new(800.0, 600.0);
        camera.rotate(40.0, 5.0);
        let before = camera.clone();
        let mask = Vec3::new(1.0, 1.0, -1.0);
        let reflected = mirror.reflected_camera(&camera, mask);
        assert_eq!(reflected.eye_position(), camera.eye_position() * mask);
        assert_eq!(camera, before);
    }

    #[test]
    fn moved_from_mirror_drops_silently() {
        let (device, gpu) = device();
        let mut mirror = Mirror::new(gpu, 8, 8).unwrap();
        let moved = mirror.take();
        device.clear_calls();
        drop(mirror);
        assert!(device.calls().is_empty());
        drop(moved);
        assert_eq!(device.live_objects(), 0);
    }
}
