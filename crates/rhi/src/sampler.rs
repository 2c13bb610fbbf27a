//! Texture samplers.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Anisotropy requested before clamping to the device limit.
pub const PREFERRED_ANISOTROPY: f32 = 16.0;

/// Linear-filtering, repeat-addressing sampler with anisotropic filtering.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let anisotropy = clamp_anisotropy(device.physical_info().max_sampler_anisotropy());
        let info = sampler_create_info(anisotropy);

        let sampler = unsafe { device.handle().create_sampler(&info, None)? };
        debug!("Created sampler (anisotropy {})", anisotropy);

        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

/// Clamps [`PREFERRED_ANISOTROPY`] to what the device supports.
pub fn clamp_anisotropy(device_max: f32) -> f32 {
    PREFERRED_ANISOTROPY.min(device_max).max(1.0)
}

fn sampler_create_info(max_anisotropy: f32) -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_anisotropy() {
        assert_eq!(clamp_anisotropy(16.0), 16.0);
        assert_eq!(clamp_anisotropy(8.0), 8.0);
        assert_eq!(clamp_anisotropy(64.0), 16.0);
        assert_eq!(clamp_anisotropy(0.0), 1.0);
    }

    #[test]
    fn test_sampler_create_info() {
        let info = sampler_create_info(4.0);
        assert_eq!(info.mag_filter, vk::Filter::LINEAR);
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.address_mode_w, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 4.0);
        assert_eq!(info.border_color, vk::BorderColor::INT_OPAQUE_BLACK);
        assert_eq!(info.compare_enable, vk::FALSE);
        assert_eq!(info.max_lod, 0.0);
    }
}
