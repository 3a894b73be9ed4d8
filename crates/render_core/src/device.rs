//! Device context contract and its Vulkan implementation
//!
//! The renderer consumes the GPU through the [`DeviceContext`] trait: the
//! logical device's typed object operations, the memory-type resolver, and
//! the device-idle wait. Instance and device bootstrap live outside this
//! crate; [`VulkanDeviceContext`] wraps the handles that bootstrap hands
//! over. Keeping every GPU call behind the trait also lets the frame
//! lifecycle be exercised by the test suite without a device present.

use ash::vk;

use crate::config::{ContextConfig, DebugSeverity};
use crate::error::{RenderError, RenderResult};
use crate::pipeline::PipelineBuildRequest;

/// Shader entry point shared by both stages
const SHADER_ENTRY_POINT: &std::ffi::CStr =
    unsafe { std::ffi::CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// A host-visible, persistently mapped uniform allocation
///
/// The mapping is established once at creation and stays valid until the
/// buffer is destroyed through the device context that created it; the
/// buffer identity is stable for the lifetime of its frame slot, so the
/// descriptor written against it never needs a rewrite.
#[derive(Debug, Clone, Copy)]
pub struct MappedBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    size: usize,
}

impl MappedBuffer {
    /// Assemble from raw parts; used by device-context implementations
    pub fn from_parts(
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        mapped: *mut u8,
        size: usize,
    ) -> Self {
        Self {
            buffer,
            memory,
            mapped,
            size,
        }
    }

    /// The buffer handle
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    /// The backing memory handle
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Size of the allocation in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy one value into the mapped region
    ///
    /// The memory is host-coherent, so no flush is required.
    pub fn write<T: bytemuck::Pod>(&self, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        assert!(
            bytes.len() <= self.size,
            "uniform write of {} bytes exceeds block of {} bytes",
            bytes.len(),
            self.size
        );
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped, bytes.len());
        }
    }
}

/// One frame's graphics-queue submission
///
/// The submission waits on the image-acquired semaphore at the
/// color-attachment-output stage, and signals the render-finished semaphore
/// together with the slot's fence when the GPU finishes consuming the
/// recording.
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmission {
    /// The recorded command buffer
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore signaled by the presentation layer when the image is ready
    pub wait_image_acquired: vk::Semaphore,
    /// Semaphore to signal when rendering completes
    pub signal_render_finished: vk::Semaphore,
    /// Fence to signal when the submission is fully consumed
    pub fence: vk::Fence,
}

/// The device contract consumed by the rendering core
///
/// Implementations provide memory-type resolution, the device-idle wait,
/// and the typed GPU object operations the frame lifecycle performs.
/// Destruction methods are infallible by design: Vulkan object destruction
/// does not report errors, and teardown paths must not be interruptible.
pub trait DeviceContext {
    /// Resolve a memory type index from a type-filter bitmask and the
    /// required property flags
    fn memory_type_index(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<u32>;

    /// Block until the device has finished all submitted work
    fn wait_idle(&self) -> RenderResult<()>;

    // --- synchronization primitives ---

    /// Create a binary semaphore
    fn create_semaphore(&self) -> RenderResult<vk::Semaphore>;

    /// Destroy a semaphore created by this context
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> RenderResult<vk::Fence>;

    /// Destroy a fence created by this context
    fn destroy_fence(&self, fence: vk::Fence);

    /// Block until the fence is signaled (unbounded wait)
    fn wait_for_fence(&self, fence: vk::Fence) -> RenderResult<()>;

    /// Return the fence to the unsignaled state
    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()>;

    // --- command recording ---

    /// Create a command pool on the graphics queue family with per-buffer
    /// reset enabled
    fn create_command_pool(&self) -> RenderResult<vk::CommandPool>;

    /// Destroy a command pool and every buffer allocated from it
    fn destroy_command_pool(&self, pool: vk::CommandPool);

    /// Allocate one primary command buffer from the pool
    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RenderResult<vk::CommandBuffer>;

    /// Reset a command buffer for re-recording
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()>;

    /// Open a new recording on the command buffer
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()>;

    /// Close the recording
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()>;

    /// Record the render pass opening against a framebuffer with one clear value
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    );

    /// Record the render pass close
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    /// Record a graphics pipeline bind
    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);

    /// Record a descriptor set bind at set index 0
    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        descriptor_set: vk::DescriptorSet,
    );

    /// Submit one frame's recording to the graphics queue
    fn submit_frame(&self, submission: &FrameSubmission) -> RenderResult<()>;

    // --- buffers ---

    /// Create a host-visible, host-coherent uniform buffer and map it
    /// persistently
    fn create_uniform_buffer(&self, size: vk::DeviceSize) -> RenderResult<MappedBuffer>;

    /// Unmap and destroy a uniform buffer created by this context
    fn destroy_uniform_buffer(&self, buffer: &MappedBuffer);

    // --- descriptors ---

    /// Create a descriptor set layout with a single uniform-buffer binding
    fn create_descriptor_set_layout(
        &self,
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> RenderResult<vk::DescriptorSetLayout>;

    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Create a descriptor pool sized for `max_sets` uniform-buffer sets
    fn create_descriptor_pool(&self, max_sets: u32) -> RenderResult<vk::DescriptorPool>;

    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Allocate `count` descriptor sets of the same layout from the pool
    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> RenderResult<Vec<vk::DescriptorSet>>;

    /// Point a descriptor set's uniform binding at a buffer range
    fn bind_uniform_descriptor(
        &self,
        descriptor_set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    );

    // --- pipeline objects ---

    /// Create the forward render pass described by `description`
    fn create_render_pass(
        &self,
        description: &crate::pipeline::RenderPassDescription,
    ) -> RenderResult<vk::RenderPass>;

    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// Create a framebuffer over one presentable image view
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer>;

    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> RenderResult<vk::ShaderModule>;

    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Create a pipeline layout with one set layout and a vertex-stage
    /// push-constant range of `push_constant_size` bytes
    fn create_pipeline_layout(
        &self,
        set_layout: vk::DescriptorSetLayout,
        push_constant_size: u32,
    ) -> RenderResult<vk::PipelineLayout>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Assemble one graphics pipeline object
    fn create_graphics_pipeline(
        &self,
        request: &PipelineBuildRequest<'_>,
    ) -> RenderResult<vk::Pipeline>;

    /// Destroy a graphics pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);
}

/// [`DeviceContext`] implementation over an externally bootstrapped device
///
/// Owns none of the handles it is given: instance and device teardown stay
/// with the bootstrap layer. Queues may come from the same family or from
/// different ones; submission always targets the graphics queue.
pub struct VulkanDeviceContext {
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    graphics_queue_family: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    config: ContextConfig,
}

impl VulkanDeviceContext {
    /// Wrap the handles produced by device bootstrap
    pub fn from_parts(
        device: ash::Device,
        graphics_queue: vk::Queue,
        present_queue: vk::Queue,
        graphics_queue_family: u32,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        config: ContextConfig,
    ) -> Self {
        log::debug!(
            "Device context created (graphics family {graphics_queue_family}, validation: {})",
            config.enable_validation
        );
        Self {
            device,
            graphics_queue,
            present_queue,
            memory_properties,
            config,
            graphics_queue_family,
        }
    }

    /// The raw logical device, for collaborators that record their own work
    pub fn raw_device(&self) -> &ash::Device {
        &self.device
    }

    /// The presentation queue, consumed by the presentation surface
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// The context configuration this device was constructed with
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Route one validation-layer message to the configured reporter
    ///
    /// Called by the bootstrap layer's debug messenger callback.
    pub fn report_validation(&self, severity: DebugSeverity, message: &str) {
        if self.config.enable_validation {
            self.config.debug_reporter.report(severity, message);
        }
    }
}

impl DeviceContext for VulkanDeviceContext {
    fn memory_type_index(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<u32> {
        let count = self.memory_properties.memory_type_count as usize;
        for (index, memory_type) in self.memory_properties.memory_types[..count]
            .iter()
            .enumerate()
        {
            if (type_filter & (1 << index)) != 0
                && memory_type.property_flags.contains(properties)
            {
                return Ok(index as u32);
            }
        }
        Err(RenderError::NoSuitableMemoryType { type_filter })
    }

    fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle().map_err(RenderError::Api) }
    }

    fn create_semaphore(&self) -> RenderResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        unsafe {
            self.device
                .create_semaphore(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> RenderResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe {
            self.device
                .create_fence(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[fence], true, u64::MAX)
                .map_err(RenderError::Api)
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        unsafe { self.device.reset_fences(&[fence]).map_err(RenderError::Api) }
    }

    fn create_command_pool(&self) -> RenderResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(self.graphics_queue_family);
        unsafe {
            self.device
                .create_command_pool(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) };
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RenderResult<vk::CommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&allocate_info)
                .map_err(RenderError::Api)?
        };
        Ok(buffers[0])
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(RenderError::Api)
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RenderError::Api)
        }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(RenderError::Api)
        }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .clear_values(&clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(command_buffer) };
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        descriptor_set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[descriptor_set],
                &[],
            );
        }
    }

    fn submit_frame(&self, submission: &FrameSubmission) -> RenderResult<()> {
        let wait_semaphores = [submission.wait_image_acquired];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [submission.command_buffer];
        let signal_semaphores = [submission.signal_render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], submission.fence)
                .map_err(RenderError::Api)
        }
    }

    fn create_uniform_buffer(&self, size: vk::DeviceSize) -> RenderResult<MappedBuffer> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe {
            self.device
                .create_buffer(&buffer_info, None)
                .map_err(RenderError::Api)?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory_type = match self.memory_type_index(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(index) => index,
            Err(error) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(error);
            }
        };

        let allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = match unsafe { self.device.allocate_memory(&allocate_info, None) } {
            Ok(memory) => memory,
            Err(result) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(RenderError::Api(result));
            }
        };

        let bind_and_map = unsafe {
            self.device
                .bind_buffer_memory(buffer, memory, 0)
                .and_then(|()| {
                    self.device
                        .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                })
        };
        match bind_and_map {
            Ok(mapped) => Ok(MappedBuffer::from_parts(
                buffer,
                memory,
                mapped.cast(),
                size as usize,
            )),
            Err(result) => {
                unsafe {
                    self.device.destroy_buffer(buffer, None);
                    self.device.free_memory(memory, None);
                }
                Err(RenderError::Api(result))
            }
        }
    }

    fn destroy_uniform_buffer(&self, buffer: &MappedBuffer) {
        unsafe {
            self.device.unmap_memory(buffer.memory());
            self.device.destroy_buffer(buffer.buffer(), None);
            self.device.free_memory(buffer.memory(), None);
        }
    }

    fn create_descriptor_set_layout(
        &self,
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> RenderResult<vk::DescriptorSetLayout> {
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(stages)
            .build()];
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        unsafe {
            self.device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
    }

    fn create_descriptor_pool(&self, max_sets: u32) -> RenderResult<vk::DescriptorPool> {
        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(max_sets)
            .build()];
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(max_sets);
        unsafe {
            self.device
                .create_descriptor_pool(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) };
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> RenderResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; count];
        let allocate_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        unsafe {
            self.device
                .allocate_descriptor_sets(&allocate_info)
                .map_err(RenderError::Api)
        }
    }

    fn bind_uniform_descriptor(
        &self,
        descriptor_set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) {
        let buffer_info = [vk::DescriptorBufferInfo::builder()
            .buffer(buffer)
            .offset(0)
            .range(range)
            .build()];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(descriptor_set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info)
            .build();
        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
    }

    fn create_render_pass(
        &self,
        description: &crate::pipeline::RenderPassDescription,
    ) -> RenderResult<vk::RenderPass> {
        let attachments = [vk::AttachmentDescription::builder()
            .format(description.color_format())
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build()];

        let color_refs = [vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build()];
        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .build()];

        // Explicit dependencies bracketing the external stages; without them
        // the implicit transitions can race image acquisition.
        let dependencies = [
            vk::SubpassDependency::builder()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(vk::PipelineStageFlags::TOP_OF_PIPE)
                .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .build(),
            vk::SubpassDependency::builder()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .dst_access_mask(vk::AccessFlags::empty())
                .build(),
        ];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        unsafe {
            self.device
                .create_render_pass(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        let attachments = [attachment];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        unsafe {
            self.device
                .create_framebuffer(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_shader_module(&self, code: &[u32]) -> RenderResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe {
            self.device
                .create_shader_module(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) };
    }

    fn create_pipeline_layout(
        &self,
        set_layout: vk::DescriptorSetLayout,
        push_constant_size: u32,
    ) -> RenderResult<vk::PipelineLayout> {
        let set_layouts = [set_layout];
        let push_constant_ranges = [vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(push_constant_size)
            .build()];
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        unsafe {
            self.device
                .create_pipeline_layout(&create_info, None)
                .map_err(RenderError::Api)
        }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) };
    }

    fn create_graphics_pipeline(
        &self,
        request: &PipelineBuildRequest<'_>,
    ) -> RenderResult<vk::Pipeline> {
        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(request.vertex_module)
                .name(SHADER_ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(request.fragment_module)
                .name(SHADER_ENTRY_POINT)
                .build(),
        ];

        let bindings = [request.vertex_layout.binding_description()];
        let attributes = request.vertex_layout.attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: request.extent.width as f32,
            height: request.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: request.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(request.raster.polygon_mode)
            .line_width(1.0)
            .cull_mode(request.raster.cull_mode)
            .front_face(request.raster.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(request.layout)
            .render_pass(request.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
                .map_err(|(_, result)| RenderError::Api(result))?
        };
        Ok(pipelines[0])
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }
}
