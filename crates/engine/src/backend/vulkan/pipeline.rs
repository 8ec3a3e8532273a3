use crate::error::{EngineError, EngineResult};
use ash::vk;
use ash::vk::Bool32;
use std::ffi::CStr;

const VK_FALSE: Bool32 = 0u32;
const VK_TRUE: Bool32 = 1u32;

/// Collects the fixed-function state of a graphics pipeline for dynamic rendering.
/// Viewport and scissor are always dynamic.
pub(crate) struct PipelineBuilder<'a> {
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    shader_stages: Vec<vk::PipelineShaderStageCreateInfo<'a>>,
    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'a>,
    rasterizer: vk::PipelineRasterizationStateCreateInfo<'a>,
    multisampling: vk::PipelineMultisampleStateCreateInfo<'a>,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'a>,
    pipeline_layout: vk::PipelineLayout,
    color_attachment_formats: Vec<vk::Format>,
    depth_attachment_format: vk::Format,
    stencil_attachment_format: vk::Format,
}

impl<'a> PipelineBuilder<'a> {
    pub(crate) fn init() -> Self {
        Self {
            color_blend_attachment: vk::PipelineColorBlendAttachmentState::default(),
            shader_stages: Vec::new(),
            input_assembly: vk::PipelineInputAssemblyStateCreateInfo::default(),
            rasterizer: vk::PipelineRasterizationStateCreateInfo::default(),
            multisampling: vk::PipelineMultisampleStateCreateInfo::default(),
            depth_stencil: vk::PipelineDepthStencilStateCreateInfo::default(),
            pipeline_layout: vk::PipelineLayout::null(),
            color_attachment_formats: Vec::new(),
            depth_attachment_format: vk::Format::UNDEFINED,
            stencil_attachment_format: vk::Format::UNDEFINED,
        }
    }

    pub(crate) fn build(&self, device: &ash::Device) -> EngineResult<vk::Pipeline> {
        // Only a single viewport and scissor is supported
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .scissor_count(1)
            .viewport_count(1);

        // One blend state per color attachment, functionally 'no-blend'.
        let blend_attachments =
            vec![self.color_blend_attachment; self.color_attachment_formats.len()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&blend_attachments);

        // vertices are generated in the vertex shader
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();

        let states = &[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(states);

        let mut render_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&self.color_attachment_formats)
            .depth_attachment_format(self.depth_attachment_format)
            .stencil_attachment_format(self.stencil_attachment_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .push_next(&mut render_info)
            .stages(&self.shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterizer)
            .multisample_state(&self.multisampling)
            .color_blend_state(&color_blending)
            .depth_stencil_state(&self.depth_stencil)
            .layout(self.pipeline_layout)
            .dynamic_state(&dynamic_info);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, result)| EngineError::Vulkan {
            operation: "vkCreateGraphicsPipelines",
            result,
        })?;
        Ok(pipelines[0])
    }

    pub(crate) fn set_layout(&mut self, layout: vk::PipelineLayout) {
        self.pipeline_layout = layout;
    }

    pub(crate) fn set_shaders(
        &mut self,
        vertex_shader: vk::ShaderModule,
        vertex_entry: &'a CStr,
        fragment_shader: vk::ShaderModule,
        fragment_entry: &'a CStr,
    ) {
        self.shader_stages.clear();
        let vertex_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader)
            .name(vertex_entry);

        let fragment_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_shader)
            .name(fragment_entry);
        self.shader_stages.push(vertex_info);
        self.shader_stages.push(fragment_info);
    }

    pub(crate) fn set_input_topology(&mut self, topology: vk::PrimitiveTopology) {
        self.input_assembly.topology = topology;
        self.input_assembly.primitive_restart_enable = VK_FALSE;
    }

    pub(crate) fn set_polygon_mode(&mut self, mode: vk::PolygonMode) {
        self.rasterizer.polygon_mode = mode;
        self.rasterizer.line_width = 1.0;
    }

    pub(crate) fn set_cull_mode(&mut self, mode: vk::CullModeFlags, front_face: vk::FrontFace) {
        self.rasterizer.cull_mode = mode;
        self.rasterizer.front_face = front_face;
    }

    pub(crate) fn set_multisampling_none(&mut self) {
        self.multisampling.sample_shading_enable = VK_FALSE;
        // default to no MSAA (1 sample per pixel)
        self.multisampling.rasterization_samples = vk::SampleCountFlags::TYPE_1;
        self.multisampling.min_sample_shading = 1.0;
        self.multisampling.p_sample_mask = std::ptr::null();
        // no alpha to coverage either
        self.multisampling.alpha_to_coverage_enable = VK_FALSE;
        self.multisampling.alpha_to_one_enable = VK_FALSE;
    }

    pub(crate) fn disable_blending(&mut self) {
        // default write mask
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        // no blending
        self.color_blend_attachment.blend_enable = VK_FALSE;
    }

    pub(crate) fn set_color_attachment_formats(&mut self, formats: &[vk::Format]) {
        self.color_attachment_formats = formats.to_vec();
    }

    pub(crate) fn set_depth_format(&mut self, format: vk::Format, has_stencil: bool) {
        self.depth_attachment_format = format;
        self.stencil_attachment_format = if has_stencil {
            format
        } else {
            vk::Format::UNDEFINED
        };
    }

    pub(crate) fn disable_depth_test(&mut self) {
        self.depth_stencil.depth_test_enable = VK_FALSE;
        self.depth_stencil.depth_write_enable = VK_FALSE;
        self.depth_stencil.depth_compare_op = vk::CompareOp::NEVER;
        self.depth_stencil.depth_bounds_test_enable = VK_FALSE;
        self.depth_stencil.stencil_test_enable = VK_FALSE;
        self.depth_stencil.front = vk::StencilOpState::default();
        self.depth_stencil.back = vk::StencilOpState::default();
        self.depth_stencil.min_depth_bounds = 0.0;
        self.depth_stencil.max_depth_bounds = 1.0;
    }

    /// Depth is cleared to 0.0, so nearer fragments have greater depth.
    pub(crate) fn enable_depth_test(&mut self) {
        self.disable_depth_test();
        self.depth_stencil.depth_test_enable = VK_TRUE;
        self.depth_stencil.depth_write_enable = VK_TRUE;
        self.depth_stencil.depth_compare_op = vk::CompareOp::GREATER_OR_EQUAL;
    }
}
