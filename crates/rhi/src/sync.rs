//! Semaphores and fences.
//!
//! Semaphores order GPU work between acquire, submit and present. Fences let
//! the host block until a submission has retired.

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use crate::device::Device;
use crate::error::RhiResult;

/// Timeout meaning "wait as long as it takes".
pub const WAIT_FOREVER: u64 = u64::MAX;

/// Binary semaphore, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Host-waitable fence.
///
/// A fence that a pending submission will signal must not be reset.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// A fence whose first wait returns immediately.
    pub fn signaled(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        trace!("Fence created signaled");
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled.
    pub fn wait(&self) -> RhiResult<()> {
        wait_for_fences(&self.device, &[self.fence], WAIT_FOREVER)
    }

    /// Back to unsignaled, ready to be handed to the next submission.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Waits until every fence in `fences` is signaled, or `timeout` ns pass.
///
/// Used for fences owned elsewhere, such as the frame slot that last
/// rendered to a swapchain image.
pub fn wait_for_fences(device: &Device, fences: &[vk::Fence], timeout: u64) -> RhiResult<()> {
    if fences.is_empty() {
        return Ok(());
    }
    unsafe { device.handle().wait_for_fences(fences, true, timeout)? };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
    }
}
