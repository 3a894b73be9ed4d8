//! Per-frame resource slots
//!
//! Each frame in flight owns one [`FrameSlot`]: a command pool and primary
//! command buffer (one pool per slot so each can reset independently), a
//! persistently mapped uniform block, a descriptor set written once against
//! that block, and the slot's synchronization objects. The
//! [`FrameSlotSet`] builds all N slots in dependency order and tears them
//! down in reverse-dependency order.

use ash::vk;

use crate::device::{DeviceContext, MappedBuffer};
use crate::error::{InitStage, RenderError, RenderResult};
use crate::view::FrameTransforms;

/// Shader binding index of the per-frame transform block
pub const TRANSFORMS_BINDING: u32 = 0;

/// Resources owned exclusively by one frame slot
pub struct FrameSlot {
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    uniform: MappedBuffer,
    descriptor_set: vk::DescriptorSet,
    image_acquired: vk::Semaphore,
    render_finished: vk::Semaphore,
    submission_fence: vk::Fence,
}

impl FrameSlot {
    /// The slot's command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// The slot's mapped uniform block
    pub fn uniform(&self) -> &MappedBuffer {
        &self.uniform
    }

    /// The slot's descriptor set, bound once at creation
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Semaphore signaled when the slot's acquired image becomes available
    pub fn image_acquired(&self) -> vk::Semaphore {
        self.image_acquired
    }

    /// Semaphore signaled when the slot's rendering completes
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished
    }

    /// Fence signaled when the slot's submission is fully consumed
    ///
    /// Must be observed signaled before the slot's command buffer is
    /// re-recorded.
    pub fn submission_fence(&self) -> vk::Fence {
        self.submission_fence
    }
}

/// The N frame slots plus their shared descriptor pool
pub struct FrameSlotSet {
    slots: Vec<FrameSlot>,
    descriptor_pool: Option<vk::DescriptorPool>,
}

/// Resources accumulated while the set is being built; released wholesale
/// if any stage fails
#[derive(Default)]
struct PartialSlots {
    command_pools: Vec<vk::CommandPool>,
    command_buffers: Vec<vk::CommandBuffer>,
    uniforms: Vec<MappedBuffer>,
    descriptor_pool: Option<vk::DescriptorPool>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    image_acquired: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
    fences: Vec<vk::Fence>,
}

impl PartialSlots {
    /// Release everything created so far, in reverse-dependency order.
    /// Command buffers and descriptor sets are freed with their pools.
    fn release<D: DeviceContext>(&mut self, device: &D) {
        if let Some(pool) = self.descriptor_pool.take() {
            device.destroy_descriptor_pool(pool);
        }
        for uniform in self.uniforms.drain(..) {
            device.destroy_uniform_buffer(&uniform);
        }
        for pool in self.command_pools.drain(..) {
            device.destroy_command_pool(pool);
        }
        for semaphore in self.image_acquired.drain(..) {
            device.destroy_semaphore(semaphore);
        }
        for semaphore in self.render_finished.drain(..) {
            device.destroy_semaphore(semaphore);
        }
        for fence in self.fences.drain(..) {
            device.destroy_fence(fence);
        }
        self.command_buffers.clear();
        self.descriptor_sets.clear();
    }

    fn assemble(mut self) -> FrameSlotSet {
        let mut slots = Vec::with_capacity(self.command_pools.len());
        for index in 0..self.command_pools.len() {
            slots.push(FrameSlot {
                command_pool: self.command_pools[index],
                command_buffer: self.command_buffers[index],
                uniform: self.uniforms[index],
                descriptor_set: self.descriptor_sets[index],
                image_acquired: self.image_acquired[index],
                render_finished: self.render_finished[index],
                submission_fence: self.fences[index],
            });
        }
        FrameSlotSet {
            slots,
            descriptor_pool: self.descriptor_pool.take(),
        }
    }
}

impl FrameSlotSet {
    /// Build all per-frame resources for `frames_in_flight` slots
    ///
    /// Any sub-allocation failure releases everything this call created and
    /// surfaces as a stage-tagged initialization failure.
    pub fn create<D: DeviceContext>(
        device: &D,
        set_layout: vk::DescriptorSetLayout,
        frames_in_flight: usize,
    ) -> RenderResult<Self> {
        let mut partial = PartialSlots::default();
        match Self::populate(device, set_layout, frames_in_flight, &mut partial) {
            Ok(()) => {
                log::debug!("Created {frames_in_flight} frame slots");
                Ok(partial.assemble())
            }
            Err(error) => {
                partial.release(device);
                Err(error)
            }
        }
    }

    fn populate<D: DeviceContext>(
        device: &D,
        set_layout: vk::DescriptorSetLayout,
        frames_in_flight: usize,
        partial: &mut PartialSlots,
    ) -> RenderResult<()> {
        let uniform_size = std::mem::size_of::<FrameTransforms>() as vk::DeviceSize;

        for _ in 0..frames_in_flight {
            let pool = device
                .create_command_pool()
                .map_err(RenderError::at_stage(InitStage::CommandPools))?;
            partial.command_pools.push(pool);
        }

        for index in 0..frames_in_flight {
            let buffer = device
                .allocate_command_buffer(partial.command_pools[index])
                .map_err(RenderError::at_stage(InitStage::CommandBuffers))?;
            partial.command_buffers.push(buffer);
        }

        for _ in 0..frames_in_flight {
            let uniform = device
                .create_uniform_buffer(uniform_size)
                .map_err(RenderError::at_stage(InitStage::UniformBuffers))?;
            partial.uniforms.push(uniform);
        }

        let descriptor_pool = device
            .create_descriptor_pool(frames_in_flight as u32)
            .map_err(RenderError::at_stage(InitStage::DescriptorPool))?;
        partial.descriptor_pool = Some(descriptor_pool);

        partial.descriptor_sets = device
            .allocate_descriptor_sets(descriptor_pool, set_layout, frames_in_flight)
            .map_err(RenderError::at_stage(InitStage::DescriptorSets))?;

        // Buffer identity is stable for the slot's lifetime, so each set is
        // written exactly once.
        for index in 0..frames_in_flight {
            device.bind_uniform_descriptor(
                partial.descriptor_sets[index],
                TRANSFORMS_BINDING,
                partial.uniforms[index].buffer(),
                uniform_size,
            );
        }

        for _ in 0..frames_in_flight {
            let image_acquired = device
                .create_semaphore()
                .map_err(RenderError::at_stage(InitStage::SyncObjects))?;
            partial.image_acquired.push(image_acquired);

            let render_finished = device
                .create_semaphore()
                .map_err(RenderError::at_stage(InitStage::SyncObjects))?;
            partial.render_finished.push(render_finished);

            // Created signaled so the first wait on the slot does not block
            let fence = device
                .create_fence(true)
                .map_err(RenderError::at_stage(InitStage::SyncObjects))?;
            partial.fences.push(fence);
        }

        Ok(())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the set holds no slots (true only after `destroy`)
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at `index`
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    /// Release every per-frame resource in reverse-dependency order
    ///
    /// Descriptor sets are returned with their pool and command buffers with
    /// theirs; synchronization objects go last among the per-frame
    /// resources. Idempotent: a second call finds nothing to release.
    pub fn destroy<D: DeviceContext>(&mut self, device: &D) {
        if let Some(pool) = self.descriptor_pool.take() {
            device.destroy_descriptor_pool(pool);
        }
        for slot in &self.slots {
            device.destroy_uniform_buffer(&slot.uniform);
        }
        for slot in &self.slots {
            device.destroy_command_pool(slot.command_pool);
        }
        for slot in self.slots.drain(..) {
            device.destroy_semaphore(slot.image_acquired);
            device.destroy_semaphore(slot.render_finished);
            device.destroy_fence(slot.submission_fence);
        }
    }
}
