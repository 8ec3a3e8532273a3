//! Vulkan implementation of [`GraphicsBackend`] on top of `ash`, using dynamic
//! rendering and synchronization2 (Vulkan 1.3).

mod context;
mod debug;
mod format;
mod pipeline;
mod swapchain;

use crate::backend::features::EngineCreateInfo;
use crate::backend::{
    BackendKind, ClearDepthStencilFlags, DrawAttribs, GraphicsBackend, GraphicsPipelineDesc,
    PipelineHandle, ShaderHandle, SwapchainDesc, TextureFormat, TransitionMode,
};
use crate::error::{EngineError, EngineResult, VkResultExt};
use crate::shader::{self, ShaderCreateInfo, ShaderType};
use crate::window::NativeWindow;
use ash::{vk, Device};
use context::{Queues, VkContext};
use pipeline::PipelineBuilder;
use std::ffi::CString;
use swapchain::Swapchain;

const FRAME_OVERLAP: u32 = 2;
const ONE_SECOND: u64 = 1_000_000_000;

struct VkShader {
    module: vk::ShaderModule,
    shader_type: ShaderType,
    entry_point: CString,
}

struct VkPipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

/// The frame currently being recorded, between `set_render_targets` and `present`.
#[derive(Copy, Clone)]
struct ActiveFrame {
    frame: FrameData,
    image_index: usize,
    rendering: bool,
}

pub struct VulkanBackend {
    frame_number: u64,
    context: VkContext,

    swapchain: Swapchain,
    depth_format_requested: TextureFormat,
    /// Size requested while the window had no area. Frames are not recorded until
    /// a real size arrives.
    deferred_size: Option<[u32; 2]>,
    skipping_frame: bool,

    frames: Vec<FrameData>,
    active: Option<ActiveFrame>,
    bound_pipeline: Option<PipelineHandle>,

    shaders: Vec<VkShader>,
    pipelines: Vec<VkPipeline>,
    queues: Queues,
}

impl VulkanBackend {
    pub fn initialize(
        window: &NativeWindow,
        info: &EngineCreateInfo,
        desc: SwapchainDesc,
    ) -> EngineResult<Self> {
        let (context, queues) = VkContext::initialize(window, info)?;

        let swapchain = Swapchain::create(
            &context,
            &queues,
            [desc.width, desc.height],
            desc.depth_format,
        )?;

        let frames = Self::create_framedata(&context, &queues)?;
        log::info!(
            "Vulkan device ready, enabled features: {:?}",
            context.features.enabled_names()
        );

        Ok(Self {
            frame_number: 0,
            context,
            swapchain,
            depth_format_requested: desc.depth_format,
            deferred_size: None,
            skipping_frame: false,
            frames,
            active: None,
            bound_pipeline: None,
            shaders: Vec::new(),
            pipelines: Vec::new(),
            queues,
        })
    }

    fn create_framedata(context: &VkContext, queues: &Queues) -> EngineResult<Vec<FrameData>> {
        let commandpool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queues.graphics.family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        let mut frames = Vec::with_capacity(FRAME_OVERLAP as usize);
        let device = &context.device;

        for _ in 0..FRAME_OVERLAP {
            let pool = unsafe { device.create_command_pool(&commandpool_info, None) }
                .vk_op("vkCreateCommandPool")?;

            let commandbuffer_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .command_buffer_count(1)
                .level(vk::CommandBufferLevel::PRIMARY);

            let buffer = unsafe { device.allocate_command_buffers(&commandbuffer_info) }
                .vk_op("vkAllocateCommandBuffers")?[0];

            let swapchain_semaphore = unsafe { device.create_semaphore(&semaphore_info, None) }
                .vk_op("vkCreateSemaphore")?;
            let render_semaphore = unsafe { device.create_semaphore(&semaphore_info, None) }
                .vk_op("vkCreateSemaphore")?;
            let render_fence =
                unsafe { device.create_fence(&fence_info, None) }.vk_op("vkCreateFence")?;

            frames.push(FrameData {
                command_pool: pool,
                main_command_buffer: buffer,
                swapchain_semaphore,
                render_semaphore,
                render_fence,
            });
        }
        Ok(frames)
    }

    /// Returns `false` when the surface has no area; the recreation is then
    /// deferred and retried on the next frame.
    fn recreate_swapchain(&mut self, dimensions: [u32; 2]) -> EngineResult<bool> {
        if self.active.is_some() {
            return Err(EngineError::InvalidCallOrder(
                "swapchain resize while a frame is being recorded",
            ));
        }
        if Swapchain::surface_extent(&self.context, dimensions)?.is_none() {
            log::debug!("Surface has no area, deferring swapchain recreation");
            self.deferred_size = Some(dimensions);
            return Ok(false);
        }
        self.wait_gpu_idle()?;

        unsafe { self.swapchain.destroy(&self.context.device) };
        self.swapchain = Swapchain::create(
            &self.context,
            &self.queues,
            dimensions,
            self.depth_format_requested,
        )?;
        self.deferred_size = None;
        Ok(true)
    }

    fn current_dimensions(&self) -> [u32; 2] {
        let extent = self.swapchain.extent();
        [extent.width, extent.height]
    }

    /// Waits for the frame slot, acquires a swapchain image and begins recording.
    /// `None` if the swapchain went out of date and can't be recreated yet.
    fn begin_frame(&mut self) -> EngineResult<Option<ActiveFrame>> {
        if let Some(active) = self.active {
            return Ok(Some(active));
        }

        let frame = self.frames[(self.frame_number % FRAME_OVERLAP as u64) as usize];
        let gpu = &self.context.device;

        // wait for the GPU to have finished the last rendering of this frame.
        unsafe { gpu.wait_for_fences(&[frame.render_fence], true, ONE_SECOND) }
            .vk_op("render fence")?;

        let image_index = match self.acquire_image(&frame)? {
            Some(image_index) => image_index,
            None => {
                let dimensions = self.current_dimensions();
                if !self.recreate_swapchain(dimensions)? {
                    return Ok(None);
                }
                self.acquire_image(&frame)?.ok_or(EngineError::Vulkan {
                    operation: "vkAcquireNextImageKHR",
                    result: vk::Result::ERROR_OUT_OF_DATE_KHR,
                })?
            }
        };

        let gpu = &self.context.device;
        unsafe { gpu.reset_fences(&[frame.render_fence]) }.vk_op("vkResetFences")?;

        let cmd = frame.main_command_buffer;
        unsafe { gpu.reset_command_buffer(cmd, vk::CommandBufferResetFlags::default()) }
            .vk_op("vkResetCommandBuffer")?;

        let cmd_begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { gpu.begin_command_buffer(cmd, &cmd_begin_info) }
            .vk_op("vkBeginCommandBuffer")?;

        let active = ActiveFrame {
            frame,
            image_index,
            rendering: false,
        };
        self.active = Some(active);
        Ok(Some(active))
    }

    /// `None` when the swapchain is out of date and has to be recreated.
    fn acquire_image(&self, frame: &FrameData) -> EngineResult<Option<usize>> {
        let res = unsafe {
            self.swapchain.swapchain_fn.acquire_next_image(
                self.swapchain.swapchain,
                ONE_SECOND,
                frame.swapchain_semaphore,
                vk::Fence::null(),
            )
        };

        match res {
            Ok((image_index, _suboptimal)) => Ok(Some(image_index as usize)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(err) => Err(err).vk_op("vkAcquireNextImageKHR"),
        }
    }

    fn recording(&self, operation: &'static str) -> EngineResult<ActiveFrame> {
        match self.active {
            Some(active) if active.rendering => Ok(active),
            _ => Err(EngineError::InvalidCallOrder(operation)),
        }
    }

    /// Brings both attachments into their attachment layouts. Barriers can't be
    /// recorded inside a rendering scope, so an active one is ended first.
    fn prepare_attachments(&mut self, mode: TransitionMode) -> EngineResult<()> {
        let Some(mut active) = self.active else {
            return Err(EngineError::InvalidCallOrder("no frame is being recorded"));
        };
        let color_target = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
        let depth_target = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        let color_layout = self.swapchain.image_layouts[active.image_index];
        let depth_layout = self.swapchain.depth.layout;

        match mode {
            TransitionMode::None => (),
            TransitionMode::Verify => {
                verify_layout("back buffer", color_layout, color_target)?;
                verify_layout("depth buffer", depth_layout, depth_target)?;
            }
            TransitionMode::Transition => {
                let gpu = &self.context.device;
                let cmd = active.frame.main_command_buffer;
                if active.rendering {
                    unsafe { gpu.cmd_end_rendering(cmd) };
                    active.rendering = false;
                }

                transition_image(
                    gpu,
                    cmd,
                    self.swapchain.images[active.image_index],
                    vk::ImageAspectFlags::COLOR,
                    color_layout,
                    color_target,
                );
                // previous contents are cleared anyway
                transition_image(
                    gpu,
                    cmd,
                    self.swapchain.depth.image,
                    format::aspect_mask(self.swapchain.depth.format),
                    vk::ImageLayout::UNDEFINED,
                    depth_target,
                );
                self.swapchain.image_layouts[active.image_index] = color_target;
                self.swapchain.depth.layout = depth_target;
            }
        }

        if !active.rendering {
            self.begin_rendering(&active);
            active.rendering = true;
        }
        self.active = Some(active);
        Ok(())
    }

    fn begin_rendering(&self, active: &ActiveFrame) {
        let extent = self.swapchain.extent();
        let depth = &self.swapchain.depth;

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_views[active.image_index])
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
        let color_attachments = [color_attachment];

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(depth.view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);
        if format::from_vk(depth.format).has_stencil() {
            rendering_info = rendering_info.stencil_attachment(&depth_attachment);
        }

        unsafe {
            self.context
                .device
                .cmd_begin_rendering(active.frame.main_command_buffer, &rendering_info)
        }
    }

    fn full_clear_rect(&self) -> vk::ClearRect {
        vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.swapchain.extent(),
            },
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    fn shader(&self, handle: ShaderHandle) -> EngineResult<&VkShader> {
        self.shaders
            .get(handle.index() as usize)
            .ok_or(EngineError::InvalidHandle {
                kind: "shader",
                index: handle.index(),
            })
    }

    pub fn wait_gpu_idle(&self) -> EngineResult<()> {
        unsafe { self.context.device.device_wait_idle() }.vk_op("vkDeviceWaitIdle")
    }
}

impl GraphicsBackend for VulkanBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vulkan
    }

    fn swapchain_desc(&self) -> SwapchainDesc {
        let extent = self.swapchain.extent();
        SwapchainDesc {
            width: extent.width,
            height: extent.height,
            color_format: format::from_vk(self.swapchain.properties.format.format),
            depth_format: format::from_vk(self.swapchain.depth.format),
        }
    }

    fn create_shader(&mut self, info: &ShaderCreateInfo) -> EngineResult<ShaderHandle> {
        let code = shader::compile_spirv(info)?;
        let entry_point = CString::new(info.entry_point.as_str()).map_err(|err| {
            EngineError::ShaderCompilation {
                name: info.name.clone(),
                message: err.to_string(),
            }
        })?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { self.context.device.create_shader_module(&create_info, None) }
            .vk_op("vkCreateShaderModule")?;

        self.shaders.push(VkShader {
            module,
            shader_type: info.shader_type,
            entry_point,
        });
        Ok(ShaderHandle::new(self.shaders.len() as u32 - 1))
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> EngineResult<PipelineHandle> {
        log::debug!("Creating graphics pipeline '{}'", desc.name);
        let vertex = self.shader(desc.vertex_shader)?;
        let pixel = self.shader(desc.pixel_shader)?;
        if vertex.shader_type != ShaderType::Vertex || pixel.shader_type != ShaderType::Pixel {
            return Err(EngineError::InvalidCallOrder(
                "pipeline shaders bound to the wrong stages",
            ));
        }

        let color_formats = desc
            .render_target_formats
            .iter()
            .map(|texture_format| match format::to_vk(*texture_format) {
                vk::Format::UNDEFINED => Err(EngineError::UnsupportedFormat(format!(
                    "{texture_format:?}"
                ))),
                vk_format => Ok(vk_format),
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let device = &self.context.device;
        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .vk_op("vkCreatePipelineLayout")?;

        let mut builder = PipelineBuilder::init();
        builder.set_layout(layout);
        builder.set_shaders(
            vertex.module,
            &vertex.entry_point,
            pixel.module,
            &pixel.entry_point,
        );
        builder.set_input_topology(format::topology(desc.topology));
        builder.set_polygon_mode(vk::PolygonMode::FILL);
        builder.set_cull_mode(format::cull_mode(desc.cull_mode), vk::FrontFace::CLOCKWISE);
        builder.set_multisampling_none();
        builder.disable_blending();
        builder.set_color_attachment_formats(&color_formats);
        builder.set_depth_format(format::to_vk(desc.depth_format), desc.depth_format.has_stencil());
        if desc.depth_enable {
            builder.enable_depth_test();
        } else {
            builder.disable_depth_test();
        }

        let pipeline = match builder.build(device) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(err);
            }
        };

        self.pipelines.push(VkPipeline { pipeline, layout });
        Ok(PipelineHandle::new(self.pipelines.len() as u32 - 1))
    }

    fn resize_swapchain(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            log::debug!("Deferring swapchain resize to {width}x{height}");
            self.deferred_size = Some([width, height]);
            return Ok(());
        }
        self.recreate_swapchain([width, height]).map(|_| ())
    }

    fn set_render_targets(&mut self, mode: TransitionMode) -> EngineResult<()> {
        if let Some(pending) = self.deferred_size {
            if pending.contains(&0) || !self.recreate_swapchain(pending)? {
                self.skipping_frame = true;
                return Ok(());
            }
        }
        if self.begin_frame()?.is_none() {
            self.skipping_frame = true;
            return Ok(());
        }
        self.prepare_attachments(mode)
    }

    fn clear_render_target(&mut self, color: [f32; 4], mode: TransitionMode) -> EngineResult<()> {
        if self.skipping_frame {
            return Ok(());
        }
        let active = self.recording("clear_render_target before set_render_targets")?;
        let color_target = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
        let color_layout = self.swapchain.image_layouts[active.image_index];
        match mode {
            TransitionMode::Transition if color_layout != color_target => {
                self.prepare_attachments(mode)?
            }
            TransitionMode::Verify => verify_layout("back buffer", color_layout, color_target)?,
            _ => (),
        }

        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
        };
        unsafe {
            self.context.device.cmd_clear_attachments(
                active.frame.main_command_buffer,
                &[attachment],
                &[self.full_clear_rect()],
            )
        }
        Ok(())
    }

    fn clear_depth_stencil(
        &mut self,
        flags: ClearDepthStencilFlags,
        depth: f32,
        stencil: u8,
        mode: TransitionMode,
    ) -> EngineResult<()> {
        if self.skipping_frame {
            return Ok(());
        }
        let active = self.recording("clear_depth_stencil before set_render_targets")?;
        let depth_target = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        match mode {
            TransitionMode::Transition if self.swapchain.depth.layout != depth_target => {
                self.prepare_attachments(mode)?
            }
            TransitionMode::Verify => {
                verify_layout("depth buffer", self.swapchain.depth.layout, depth_target)?
            }
            _ => (),
        }

        let has_stencil = format::from_vk(self.swapchain.depth.format).has_stencil();
        let mut aspect_mask = vk::ImageAspectFlags::empty();
        if flags.depth {
            aspect_mask |= vk::ImageAspectFlags::DEPTH;
        }
        if flags.stencil && has_stencil {
            aspect_mask |= vk::ImageAspectFlags::STENCIL;
        }
        if aspect_mask.is_empty() {
            return Ok(());
        }

        let attachment = vk::ClearAttachment {
            aspect_mask,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth,
                    stencil: u32::from(stencil),
                },
            },
        };
        unsafe {
            self.context.device.cmd_clear_attachments(
                active.frame.main_command_buffer,
                &[attachment],
                &[self.full_clear_rect()],
            )
        }
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineHandle) -> EngineResult<()> {
        if self.skipping_frame {
            return Ok(());
        }
        let active = self.recording("set_pipeline_state before set_render_targets")?;
        let vk_pipeline = self
            .pipelines
            .get(pipeline.index() as usize)
            .ok_or(EngineError::InvalidHandle {
                kind: "pipeline",
                index: pipeline.index(),
            })?;

        let cmd = active.frame.main_command_buffer;
        let extent = self.swapchain.extent();
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };

        let gpu = &self.context.device;
        unsafe {
            gpu.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, vk_pipeline.pipeline);
            gpu.cmd_set_viewport(cmd, 0, &[viewport]);
            gpu.cmd_set_scissor(cmd, 0, &[scissor]);
        }
        self.bound_pipeline = Some(pipeline);
        Ok(())
    }

    fn draw(&mut self, attribs: DrawAttribs) -> EngineResult<()> {
        if self.skipping_frame {
            return Ok(());
        }
        let active = self.recording("draw before set_render_targets")?;
        if self.bound_pipeline.is_none() {
            return Err(EngineError::InvalidCallOrder("draw without a pipeline"));
        }

        unsafe {
            self.context.device.cmd_draw(
                active.frame.main_command_buffer,
                attribs.num_vertices,
                attribs.num_instances,
                attribs.start_vertex,
                0,
            )
        }
        Ok(())
    }

    fn present(&mut self) -> EngineResult<bool> {
        if std::mem::take(&mut self.skipping_frame) {
            return Ok(false);
        }
        let Some(active) = self.active.take() else {
            return Err(EngineError::InvalidCallOrder(
                "present before set_render_targets",
            ));
        };
        self.bound_pipeline = None;

        let frame = active.frame;
        let cmd = frame.main_command_buffer;
        let gpu = &self.context.device;

        if active.rendering {
            unsafe { gpu.cmd_end_rendering(cmd) };
        }

        // make swapchain image presentable
        transition_image(
            gpu,
            cmd,
            self.swapchain.images[active.image_index],
            vk::ImageAspectFlags::COLOR,
            self.swapchain.image_layouts[active.image_index],
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        self.swapchain.image_layouts[active.image_index] = vk::ImageLayout::PRESENT_SRC_KHR;

        // finalize command buffer
        unsafe { gpu.end_command_buffer(cmd) }.vk_op("vkEndCommandBuffer")?;

        // we want to wait on the swapchain_semaphore, as that is signaled when the swapchain is ready,
        // we will signal render_semaphore, to signal rendering has finished
        let cmd_info = vk::CommandBufferSubmitInfo::default()
            .command_buffer(cmd)
            .device_mask(0);
        let cmd_infos = &[cmd_info];

        let wait_info = vk::SemaphoreSubmitInfo::default()
            .semaphore(frame.swapchain_semaphore)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .device_index(0)
            .value(1);
        let wait_infos = &[wait_info];

        let signal_info = vk::SemaphoreSubmitInfo::default()
            .semaphore(frame.render_semaphore)
            .stage_mask(vk::PipelineStageFlags2::ALL_GRAPHICS)
            .device_index(0)
            .value(1);
        let signal_infos = &[signal_info];

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(wait_infos)
            .signal_semaphore_infos(signal_infos)
            .command_buffer_infos(cmd_infos);

        // render_fence will now block until the graphic commands finish execution
        unsafe { gpu.queue_submit2(self.queues.graphics.queue, &[submit_info], frame.render_fence) }
            .vk_op("vkQueueSubmit2")?;

        // wait on render_semaphore, drawing commands have to be finished before presenting
        let swapchains = &[self.swapchain.swapchain];
        let wait_semaphores = &[frame.render_semaphore];
        let image_indices = &[active.image_index as u32];

        let present_info = vk::PresentInfoKHR::default()
            .swapchains(swapchains)
            .wait_semaphores(wait_semaphores)
            .image_indices(image_indices);

        let result = unsafe {
            self.swapchain
                .swapchain_fn
                .queue_present(self.queues.present.queue, &present_info)
        };

        // increase the number of frames drawn
        self.frame_number += 1;

        match result {
            Ok(false) => Ok(true),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date after present, recreating");
                if self.deferred_size.is_none() {
                    let dimensions = self.current_dimensions();
                    self.recreate_swapchain(dimensions)?;
                }
                // the frame was submitted either way
                Ok(true)
            }
            Err(err) => Err(err).vk_op("vkQueuePresentKHR"),
        }
    }

    fn wait_idle(&mut self) -> EngineResult<()> {
        self.wait_gpu_idle()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        log::debug!("Start: Dropping renderer");
        if let Err(err) = self.wait_gpu_idle() {
            log::error!("Failed to wait for the GPU before teardown: {err}");
        }
        let device = &self.context.device;
        self.frames.iter_mut().for_each(|frame| frame.destroy(device));

        unsafe {
            self.swapchain.destroy(device);
            for pipeline in self.pipelines.drain(..) {
                device.destroy_pipeline(pipeline.pipeline, None);
                device.destroy_pipeline_layout(pipeline.layout, None);
            }
            for shader in self.shaders.drain(..) {
                device.destroy_shader_module(shader.module, None);
            }
        }
        log::debug!("End: Dropping renderer");
    }
}

fn verify_layout(
    resource: &'static str,
    actual: vk::ImageLayout,
    expected: vk::ImageLayout,
) -> EngineResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(EngineError::StateVerification {
            resource,
            actual: format!("{actual:?}"),
            expected: format!("{expected:?}"),
        })
    }
}

fn transition_image(
    device: &Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    current_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let subresource_range = vk::ImageSubresourceRange::default()
        .aspect_mask(aspect_mask)
        .base_mip_level(0)
        .level_count(vk::REMAINING_MIP_LEVELS)
        .base_array_layer(0)
        .layer_count(vk::REMAINING_ARRAY_LAYERS);

    let image_barrier = vk::ImageMemoryBarrier2::default()
        // Using ALL_COMMANDS is inefficient as it will stop gpu commands completely when it arrives at the barrier
        // for more complex applications use correct stage masks
        .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
        .old_layout(current_layout)
        .new_layout(new_layout)
        .subresource_range(subresource_range)
        .image(image);

    let barriers = [image_barrier];

    let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);

    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency_info) }
}

#[derive(Copy, Clone)]
struct FrameData {
    command_pool: vk::CommandPool,
    main_command_buffer: vk::CommandBuffer,
    swapchain_semaphore: vk::Semaphore,
    render_semaphore: vk::Semaphore,
    render_fence: vk::Fence,
}

impl FrameData {
    fn destroy(&mut self, device: &Device) {
        unsafe {
            device.destroy_command_pool(self.command_pool, None);
            device.destroy_semaphore(self.swapchain_semaphore, None);
            device.destroy_semaphore(self.render_semaphore, None);
            device.destroy_fence(self.render_fence, None);
        }
    }
}
