//! Frame slots, swapchain image ownership and the per-frame control flow.
//!
//! The scheduler keeps [`MAX_FRAMES_IN_FLIGHT`] slots, each with the
//! synchronization objects for one frame in flight. [`FrameLoop::draw`] runs
//! one frame against a [`FrameBackend`]:
//!
//! ```text
//! 1. Rebuild first if an earlier rebuild was deferred
//! 2. Wait on the slot's in_flight fence
//! 3. Acquire swapchain image (signals image_available)
//!    - out of date: rebuild, the slot is not advanced
//! 4. Wait on whichever slot still owns that image, then take ownership
//! 5. Submit:
//!    - Wait on image_available at COLOR_ATTACHMENT_OUTPUT
//!    - Signal render_finished
//!    - Signal in_flight
//! 6. Present (waits on render_finished)
//! 7. Advance to the next slot
//! 8. Rebuild if acquire or present reported a stale swapchain, or the
//!    window was resized
//! ```
//!
//! Slots are created once and live until shutdown. The image ownership map
//! is reset whenever the swapchain is rebuilt.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use flightdeck_rhi::RhiResult;
use flightdeck_rhi::device::Device;
use flightdeck_rhi::sync::{Fence, Semaphore};

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Synchronization objects for one frame in flight.
pub struct FrameSlot {
    /// Signaled when the acquired swapchain image is ready to be drawn.
    image_available: Semaphore,
    /// Signaled when rendering is complete and the image may be presented.
    render_finished: Semaphore,
    /// Signaled when the GPU has finished this slot's submission.
    in_flight: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        // The first wait on a fresh slot must not block
        let in_flight = Fence::signaled(device)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }
}

/// Round-robin index over a fixed number of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCycle {
    current: usize,
    count: usize,
}

impl SlotCycle {
    /// Starts at slot 0. A zero count is treated as one slot.
    pub fn new(count: usize) -> Self {
        Self {
            current: 0,
            count: count.max(1),
        }
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Moves to the next slot, wrapping around, and returns it.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.count;
        self.current
    }
}

/// Owns the frame slots.
pub struct FrameScheduler {
    slots: Vec<FrameSlot>,
}

impl FrameScheduler {
    /// Creates [`MAX_FRAMES_IN_FLIGHT`] slots.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for i in 0..MAX_FRAMES_IN_FLIGHT {
            slots.push(FrameSlot::new(device.clone())?);
            debug!("Created frame slot {}", i);
        }

        info!(
            "Frame scheduler created with {} frames in flight",
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self { slots })
    }

    /// Slot `index`, wrapped into range.
    #[inline]
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index % self.slots.len()]
    }
}

/// Maps each swapchain image to the frame slot that last targeted it.
///
/// Two slots can acquire the same image (e.g. with MAILBOX and few images),
/// so the slot fence alone does not protect the per-image uniform buffer and
/// command buffer. Before reusing an image the loop waits on the fence of
/// the slot recorded here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagesInFlight {
    owners: Vec<Option<usize>>,
}

impl ImagesInFlight {
    /// Creates the map with no owner for each of `image_count` images.
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// Forgets all owners and resizes to the new image count.
    pub fn reset(&mut self, image_count: usize) {
        self.owners.clear();
        self.owners.resize(image_count, None);
    }

    /// Number of tracked images.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Slot currently responsible for `image`, if any.
    pub fn owner(&self, image: usize) -> Option<usize> {
        self.owners.get(image).copied().flatten()
    }

    /// Records `slot` as the owner of `image` and returns the previous owner.
    ///
    /// The caller must wait on the returned slot's fence before touching the
    /// image's resources. Out-of-range images are ignored.
    pub fn claim(&mut self, image: usize, slot: usize) -> Option<usize> {
        self.owners
            .get_mut(image)
            .and_then(|owner| owner.replace(slot))
    }
}


/// What a call to [`FrameLoop::draw`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and presented.
    Presented,
    /// The swapchain was rebuilt; a frame may or may not have been presented.
    Recreated,
    /// The window has no drawable area; nothing was drawn.
    ///
    /// Stands in for blocking until the window is restored: the rebuild stays
    /// pending and is retried by the next call, so the event loop keeps
    /// running while minimized.
    Deferred,
}

/// GPU side of one frame, driven in order by [`FrameLoop::draw`].
///
/// `acquire` and `present` return the raw swapchain status so the loop can
/// tell a stale swapchain (`ERROR_OUT_OF_DATE_KHR`, suboptimal) from a
/// failure.
pub trait FrameBackend {
    type Error: From<vk::Result>;

    /// Current drawable size in pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Tears down and recreates everything tied to the swapchain and
    /// returns the new image count.
    fn rebuild(&mut self) -> Result<usize, Self::Error>;

    /// Blocks until the last submission that signaled `slot`'s fence retired.
    fn wait_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Acquires the next image, signaling `slot`'s image-available semaphore.
    /// `Ok((index, suboptimal))` on success.
    fn acquire(&mut self, slot: usize) -> Result<(u32, bool), vk::Result>;

    /// Records and submits the draw into `image`, resetting and then
    /// signaling `slot`'s fence.
    fn submit(&mut self, slot: usize, image: usize) -> Result<(), Self::Error>;

    /// Queues `image` for presentation. `Ok(suboptimal)` on success.
    fn present(&mut self, slot: usize, image: u32) -> Result<bool, vk::Result>;
}

/// Decides after present whether the swapchain has to be rebuilt.
///
/// Out of date or suboptimal at either end, or a recorded resize, all ask for
/// a rebuild. Any other present error is passed through.
pub fn after_present(
    acquire_suboptimal: bool,
    present: Result<bool, vk::Result>,
    resized: bool,
) -> Result<bool, vk::Result> {
    let stale = match present {
        Ok(suboptimal) => suboptimal,
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
        Err(e) => return Err(e),
    };
    Ok(stale || acquire_suboptimal || resized)
}

/// Swapchain rebuild requests, from resizes and from frames that found the
/// framebuffer at 0x0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildState {
    resized: bool,
    pending: bool,
}

impl RebuildState {
    /// A resize arrived; rebuild after the next present.
    pub fn request(&mut self) {
        self.resized = true;
    }

    #[inline]
    pub fn resized(&self) -> bool {
        self.resized
    }

    /// A rebuild was attempted at 0x0 and has to be retried.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn defer(&mut self) {
        self.pending = true;
    }

    fn complete(&mut self) {
        self.resized = false;
        self.pending = false;
    }
}

/// Slot rotation, image ownership and rebuild bookkeeping for the draw loop.
#[derive(Debug, Clone)]
pub struct FrameLoop {
    cycle: SlotCycle,
    images: ImagesInFlight,
    rebuild: RebuildState,
}

impl FrameLoop {
    pub fn new(image_count: usize) -> Self {
        Self {
            cycle: SlotCycle::new(MAX_FRAMES_IN_FLIGHT),
            images: ImagesInFlight::new(image_count),
            rebuild: RebuildState::default(),
        }
    }

    /// Rebuild after the next present.
    pub fn request_rebuild(&mut self) {
        self.rebuild.request();
    }

    /// Runs one frame against `backend`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error for any failure other than an out-of-date
    /// or suboptimal swapchain, which are handled by rebuilding.
    pub fn draw<B: FrameBackend>(&mut self, backend: &mut B) -> Result<FrameOutcome, B::Error> {
        if self.rebuild.is_pending() && !self.try_rebuild(backend)? {
            return Ok(FrameOutcome::Deferred);
        }

        let slot = self.cycle.current();
        backend.wait_slot(slot)?;

        let (image_index, acquire_suboptimal) = match backend.acquire(slot) {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date at acquire (slot {})", slot);
                return self.rebuild_outcome(backend);
            }
            Err(e) => return Err(e.into()),
        };
        if acquire_suboptimal {
            debug!("Swapchain suboptimal at acquire, rebuilding after present");
        }

        let image = image_index as usize;
        if let Some(previous) = self.images.claim(image, slot)
            && previous != slot
        {
            backend.wait_slot(previous)?;
        }

        backend.submit(slot, image)?;
        let presented = backend.present(slot, image_index);
        self.cycle.advance();

        if after_present(acquire_suboptimal, presented, self.rebuild.resized())? {
            debug!(
                "Rebuilding after present of image {} (resized: {})",
                image_index,
                self.rebuild.resized()
            );
            return self.rebuild_outcome(backend);
        }

        Ok(FrameOutcome::Presented)
    }

    fn rebuild_outcome<B: FrameBackend>(
        &mut self,
        backend: &mut B,
    ) -> Result<FrameOutcome, B::Error> {
        if self.try_rebuild(backend)? {
            Ok(FrameOutcome::Recreated)
        } else {
            Ok(FrameOutcome::Deferred)
        }
    }

    /// Rebuilds unless the framebuffer is 0x0, in which case the rebuild is
    /// left pending for the next frame.
    fn try_rebuild<B: FrameBackend>(&mut self, backend: &mut B) -> Result<bool, B::Error> {
        let (width, height) = backend.framebuffer_size();
        if width == 0 || height == 0 {
            if !self.rebuild.is_pending() {
                debug!("Framebuffer is 0x0, deferring swapchain rebuild");
            }
            self.rebuild.defer();
            return Ok(false);
        }

        let image_count = backend.rebuild()?;
        self.images.reset(image_count);
        self.rebuild.complete();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_cycle_wraps() {
        let mut cycle = SlotCycle::new(MAX_FRAMES_IN_FLIGHT);
        assert_eq!(cycle.current(), 0);
        assert_eq!(cycle.advance(), 1);
        assert_eq!(cycle.advance(), 0);
        assert_eq!(cycle.advance(), 1);
    }

    #[test]
    fn test_slot_cycle_zero_count() {
        let mut cycle = SlotCycle::new(0);
        assert_eq!(cycle.count, 1);
        assert_eq!(cycle.advance(), 0);
    }

    #[test]
    fn test_images_start_unowned() {
        let images = ImagesInFlight::new(3);
        assert_eq!(images.len(), 3);
        assert!((0..3).all(|i| images.owner(i).is_none()));
    }

    #[test]
    fn test_claim_returns_previous_owner() {
        let mut images = ImagesInFlight::new(3);
        assert_eq!(images.claim(1, 0), None);
        assert_eq!(images.owner(1), Some(0));
        assert_eq!(images.claim(1, 1), Some(0));
        assert_eq!(images.owner(1), Some(1));
        assert_eq!(images.owner(0), None);
    }

    #[test]
    fn test_reset_clears_and_resizes() {
        let mut images = ImagesInFlight::new(3);
        images.claim(0, 0);
        images.claim(2, 1);

        images.reset(4);
        assert_eq!(images.len(), 4);
        assert!((0..4).all(|i| images.owner(i).is_none()));
    }

    #[test]
    fn test_claim_out_of_range_is_ignored() {
        let mut images = ImagesInFlight::new(2);
        assert_eq!(images.claim(5, 1), None);
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn test_after_present_decisions() {
        const OUT_OF_DATE: vk::Result = vk::Result::ERROR_OUT_OF_DATE_KHR;

        assert_eq!(after_present(false, Ok(false), false), Ok(false));
        assert_eq!(after_present(true, Ok(false), false), Ok(true));
        assert_eq!(after_present(false, Ok(true), false), Ok(true));
        assert_eq!(after_present(false, Err(OUT_OF_DATE), false), Ok(true));
        assert_eq!(after_present(false, Ok(false), true), Ok(true));
        assert_eq!(
            after_present(true, Err(vk::Result::ERROR_DEVICE_LOST), true),
            Err(vk::Result::ERROR_DEVICE_LOST)
        );
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Submit(usize, usize),
        Present(usize, u32),
        Rebuild,
    }

    /// Backend whose GPU finishes a submission only when the host waits on
    /// its slot fence.
    struct FakeGpu {
        size: (u32, u32),
        image_count: usize,
        next_image: u32,
        acquire_results: Vec<Result<(u32, bool), vk::Result>>,
        present_results: Vec<Result<bool, vk::Result>>,
        /// `pending[slot]` is true while the slot's submission is unfinished.
        pending: [bool; MAX_FRAMES_IN_FLIGHT],
        max_outstanding: usize,
        calls: Vec<Call>,
    }

    impl FakeGpu {
        fn new(image_count: usize) -> Self {
            Self {
                size: (800, 600),
                image_count,
                next_image: 0,
                acquire_results: Vec::new(),
                present_results: Vec::new(),
                pending: [false; MAX_FRAMES_IN_FLIGHT],
                max_outstanding: 0,
                calls: Vec::new(),
            }
        }

        fn rebuilds(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Rebuild).count()
        }

        fn submits(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Submit(..)))
                .count()
        }
    }

    impl FrameBackend for FakeGpu {
        type Error = vk::Result;

        fn framebuffer_size(&self) -> (u32, u32) {
            self.size
        }

        fn rebuild(&mut self) -> Result<usize, vk::Result> {
            self.calls.push(Call::Rebuild);
            self.pending = [false; MAX_FRAMES_IN_FLIGHT];
            Ok(self.image_count)
        }

        fn wait_slot(&mut self, slot: usize) -> Result<(), vk::Result> {
            self.calls.push(Call::Wait(slot));
            self.pending[slot] = false;
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> Result<(u32, bool), vk::Result> {
            self.calls.push(Call::Acquire(slot));
            if !self.acquire_results.is_empty() {
                return self.acquire_results.remove(0);
            }
            let image = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count as u32;
            Ok((image, false))
        }

        fn submit(&mut self, slot: usize, image: usize) -> Result<(), vk::Result> {
            assert!(!self.pending[slot], "fence of slot {slot} reset while in use");
            self.calls.push(Call::Submit(slot, image));
            self.pending[slot] = true;
            let outstanding = self.pending.iter().filter(|p| **p).count();
            self.max_outstanding = self.max_outstanding.max(outstanding);
            Ok(())
        }

        fn present(&mut self, slot: usize, image: u32) -> Result<bool, vk::Result> {
            self.calls.push(Call::Present(slot, image));
            if self.present_results.is_empty() {
                Ok(false)
            } else {
                self.present_results.remove(0)
            }
        }
    }

    #[test]
    fn test_frame_presents_and_advances() {
        let mut gpu = FakeGpu::new(3);
        let mut frames = FrameLoop::new(3);

        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Presented));
        assert_eq!(
            gpu.calls,
            [Call::Wait(0), Call::Acquire(0), Call::Submit(0, 0), Call::Present(0, 0)]
        );
        assert_eq!(frames.cycle.current(), 1);
        assert_eq!(frames.images.owner(0), Some(0));
    }

    #[test]
    fn test_out_of_date_at_acquire_keeps_slot() {
        let mut gpu = FakeGpu::new(3);
        gpu.acquire_results.push(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        let mut frames = FrameLoop::new(3);

        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Recreated));
        assert_eq!(gpu.calls, [Call::Wait(0), Call::Acquire(0), Call::Rebuild]);
        assert_eq!(frames.cycle.current(), 0);
        assert_eq!(gpu.submits(), 0);
    }

    #[test]
    fn test_suboptimal_acquire_presents_then_rebuilds() {
        let mut gpu = FakeGpu::new(3);
        gpu.acquire_results.push(Ok((2, true)));
        let mut frames = FrameLoop::new(3);

        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Recreated));
        assert_eq!(
            &gpu.calls[2..],
            [Call::Submit(0, 2), Call::Present(0, 2), Call::Rebuild]
        );
        assert_eq!(frames.cycle.current(), 1);
    }

    #[test]
    fn test_stale_present_rebuilds() {
        for present in [Ok(true), Err(vk::Result::ERROR_OUT_OF_DATE_KHR)] {
            let mut gpu = FakeGpu::new(3);
            gpu.present_results.push(present);
            let mut frames = FrameLoop::new(3);

            assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Recreated));
            assert_eq!(gpu.rebuilds(), 1);
            assert_eq!(frames.cycle.current(), 1);
        }
    }

    #[test]
    fn test_present_failure_is_returned() {
        let mut gpu = FakeGpu::new(3);
        gpu.present_results.push(Err(vk::Result::ERROR_DEVICE_LOST));
        let mut frames = FrameLoop::new(3);

        assert_eq!(frames.draw(&mut gpu), Err(vk::Result::ERROR_DEVICE_LOST));
        assert_eq!(gpu.rebuilds(), 0);
    }

    #[test]
    fn test_resize_rebuilds_once_and_clears_flag() {
        let mut gpu = FakeGpu::new(3);
        let mut frames = FrameLoop::new(3);
        frames.request_rebuild();
        assert!(frames.rebuild.resized());

        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Recreated));
        assert!(!frames.rebuild.resized());
        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Presented));
        assert_eq!(gpu.rebuilds(), 1);
    }

    #[test]
    fn test_zero_size_defers_and_retries() {
        let mut gpu = FakeGpu::new(3);
        let mut frames = FrameLoop::new(3);
        frames.request_rebuild();
        gpu.size = (0, 0);

        // The frame in flight is still presented; only the rebuild waits.
        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Deferred));
        assert!(frames.rebuild.is_pending());
        assert_eq!(gpu.rebuilds(), 0);

        let calls = gpu.calls.len();
        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Deferred));
        assert_eq!(gpu.calls.len(), calls);

        gpu.size = (1024, 768);
        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Presented));
        assert_eq!(gpu.rebuilds(), 1);
        assert_eq!(gpu.calls[calls], Call::Rebuild);
        assert_eq!(frames.rebuild, RebuildState::default());
    }

    #[test]
    fn test_rebuild_resets_image_owners() {
        let mut gpu = FakeGpu::new(3);
        let mut frames = FrameLoop::new(3);
        frames.draw(&mut gpu).unwrap();
        frames.draw(&mut gpu).unwrap();
        assert_eq!(frames.images.owner(1), Some(1));

        gpu.image_count = 4;
        gpu.acquire_results.push(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Recreated));
        assert_eq!(frames.images.len(), 4);
        assert!((0..4).all(|i| frames.images.owner(i).is_none()));
    }

    #[test]
    fn test_image_owned_by_other_slot_is_waited_on() {
        let mut gpu = FakeGpu::new(3);
        gpu.acquire_results.push(Ok((1, false)));
        gpu.acquire_results.push(Ok((1, false)));
        let mut frames = FrameLoop::new(3);

        frames.draw(&mut gpu).unwrap();
        gpu.calls.clear();
        frames.draw(&mut gpu).unwrap();
        assert_eq!(
            gpu.calls,
            [
                Call::Wait(1),
                Call::Acquire(1),
                Call::Wait(0),
                Call::Submit(1, 1),
                Call::Present(1, 1)
            ]
        );
    }

    /// The number of submissions the fake GPU holds at once never exceeds
    /// the slot count, whatever order the images come back in.
    #[test]
    fn test_outstanding_submissions_bounded() {
        let image_count = 3;
        let mut gpu = FakeGpu::new(image_count);
        let mut frames = FrameLoop::new(image_count);

        for frame in 0..1000u32 {
            let image = (frame * 7 + frame / 3) % image_count as u32;
            gpu.acquire_results.push(Ok((image, false)));
            assert_eq!(frames.draw(&mut gpu), Ok(FrameOutcome::Presented));
        }

        assert_eq!(gpu.submits(), 1000);
        assert_eq!(gpu.max_outstanding, MAX_FRAMES_IN_FLIGHT);
    }
}
