//! Staged transfers against a real device.
//!
//! Runs headless (no surface). Skips when no Vulkan driver or suitable GPU
//! is present, which is the normal case on CI.

use std::sync::Arc;

use flightdeck_rhi::buffer::BufferUsage;
use flightdeck_rhi::device::Device;
use flightdeck_rhi::image::{DEPTH_FORMAT_CANDIDATES, Image, ImageDesc, find_depth_format};
use flightdeck_rhi::instance::Instance;
use flightdeck_rhi::physical_device::select_physical_device;
use flightdeck_rhi::transfer::TransferContext;
use flightdeck_rhi::vk;

// The instance must outlive the device
fn headless() -> Option<(Instance, Arc<Device>)> {
    let instance = match Instance::new(false, &[], &[]) {
        Ok(instance) => instance,
        Err(e) => {
            println!("Skipping test: no Vulkan instance ({e})");
            return None;
        }
    };
    let info = match select_physical_device(instance.handle(), None) {
        Ok(info) => info,
        Err(e) => {
            println!("Skipping test: no suitable GPU ({e})");
            return None;
        }
    };
    let device = Device::new(&instance, &info).ok()?;
    Some((instance, device))
}

#[test]
fn test_upload_then_read_back_reproduces_bytes() {
    let Some((_instance, device)) = headless() else {
        return;
    };
    let transfer = TransferContext::new(device.clone()).unwrap();

    let data: Vec<u8> = (0..1024u32).map(|i| (i * 7 % 251) as u8).collect();
    let buffer = transfer.upload_buffer(BufferUsage::Vertex, &data).unwrap();
    assert_eq!(buffer.size(), data.len() as u64);

    let back = transfer.read_back(&buffer, data.len()).unwrap();
    assert_eq!(back, data);
}

#[test]
fn test_write_buffer_overwrites_in_place() {
    let Some((_instance, device)) = headless() else {
        return;
    };
    let transfer = TransferContext::new(device.clone()).unwrap();

    let buffer = transfer
        .upload_buffer(BufferUsage::Index, &[0u8; 64])
        .unwrap();
    let patch = [0xAB_u8; 16];
    transfer.write_buffer(&buffer, 16, &patch).unwrap();

    let back = transfer.read_back(&buffer, 64).unwrap();
    assert!(back[..16].iter().all(|&b| b == 0));
    assert_eq!(&back[16..32], &patch);
    assert!(back[32..].iter().all(|&b| b == 0));
}

#[test]
fn test_write_buffer_rejects_overflow() {
    let Some((_instance, device)) = headless() else {
        return;
    };
    let transfer = TransferContext::new(device.clone()).unwrap();

    let buffer = transfer
        .upload_buffer(BufferUsage::Vertex, &[1u8; 32])
        .unwrap();
    assert!(transfer.write_buffer(&buffer, 16, &[0u8; 32]).is_err());
}

#[test]
fn test_texture_upload_and_depth_transition() {
    let Some((_instance, device)) = headless() else {
        return;
    };
    let transfer = TransferContext::new(device.clone()).unwrap();

    let extent = vk::Extent2D {
        width: 2,
        height: 2,
    };
    let pixels = [255u8; 16];
    let texture = transfer
        .upload_texture(extent, vk::Format::R8G8B8A8_SRGB, &pixels)
        .unwrap();
    assert_eq!(texture.extent(), extent);

    let depth_format = find_depth_format(&device).unwrap();
    assert!(DEPTH_FORMAT_CANDIDATES.contains(&depth_format));
    let depth = Image::new(device.clone(), &ImageDesc::depth(extent, depth_format)).unwrap();
    transfer
        .transition_image_layout(
            depth.handle(),
            depth_format,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
}
