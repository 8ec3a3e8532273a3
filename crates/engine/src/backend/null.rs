//! Backend without a GPU. Shaders are still compiled and validated, per-frame calls
//! are checked for ordering and counted, and present paces itself like a vsynced
//! swapchain would.
//!
//! Attachment state is tracked per frame: targets start out presentable, a
//! `Transition` makes them render targets again and `present` hands them back.
//! `Verify` fails while they are still presentable.

use crate::backend::{
    BackendKind, ClearDepthStencilFlags, DrawAttribs, GraphicsBackend, GraphicsPipelineDesc,
    PipelineHandle, ShaderHandle, SwapchainDesc, TransitionMode,
};
use crate::error::{EngineError, EngineResult};
use crate::shader::{self, ShaderCreateInfo, ShaderType};
use std::time::Duration;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NullStats {
    pub frames_presented: u64,
    /// Frames dropped while a zero-sized resize was pending.
    pub frames_skipped: u64,
    pub draw_calls: u64,
    pub vertices_drawn: u64,
    pub resizes: u64,
}

#[derive(Default)]
struct NullFrame {
    skipped: bool,
    targets_bound: bool,
    attachments_writable: bool,
    pipeline: Option<PipelineHandle>,
}

pub struct NullBackend {
    desc: SwapchainDesc,
    deferred_size: Option<(u32, u32)>,
    frame_interval: Duration,
    shaders: Vec<ShaderType>,
    pipelines: Vec<String>,
    frame: NullFrame,
    stats: NullStats,
}

impl NullBackend {
    pub fn new(desc: SwapchainDesc) -> Self {
        Self {
            desc,
            deferred_size: None,
            frame_interval: Duration::ZERO,
            shaders: Vec::new(),
            pipelines: Vec::new(),
            frame: NullFrame::default(),
            stats: NullStats::default(),
        }
    }

    /// Makes `present` sleep for `interval`, so a loop driven by this backend doesn't spin.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn stats(&self) -> NullStats {
        self.stats
    }

    fn shader(&self, handle: ShaderHandle) -> EngineResult<ShaderType> {
        self.shaders
            .get(handle.index() as usize)
            .copied()
            .ok_or(EngineError::InvalidHandle {
                kind: "shader",
                index: handle.index(),
            })
    }

    fn require_targets(&self, operation: &'static str) -> EngineResult<()> {
        if self.frame.targets_bound {
            Ok(())
        } else {
            Err(EngineError::InvalidCallOrder(operation))
        }
    }

    fn apply_transition(&mut self, mode: TransitionMode, resource: &'static str) -> EngineResult<()> {
        match mode {
            TransitionMode::Transition => self.frame.attachments_writable = true,
            TransitionMode::Verify if !self.frame.attachments_writable => {
                return Err(EngineError::StateVerification {
                    resource,
                    actual: "present source".to_owned(),
                    expected: "render target".to_owned(),
                })
            }
            _ => (),
        }
        Ok(())
    }
}

impl GraphicsBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn swapchain_desc(&self) -> SwapchainDesc {
        self.desc
    }

    fn create_shader(&mut self, info: &ShaderCreateInfo) -> EngineResult<ShaderHandle> {
        shader::compile_spirv(info)?;
        self.shaders.push(info.shader_type);
        Ok(ShaderHandle::new(self.shaders.len() as u32 - 1))
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> EngineResult<PipelineHandle> {
        if self.shader(desc.vertex_shader)? != ShaderType::Vertex
            || self.shader(desc.pixel_shader)? != ShaderType::Pixel
        {
            return Err(EngineError::InvalidCallOrder(
                "pipeline shaders bound to the wrong stages",
            ));
        }
        self.pipelines.push(desc.name.clone());
        Ok(PipelineHandle::new(self.pipelines.len() as u32 - 1))
    }

    fn resize_swapchain(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            log::debug!("Deferring resize to {width}x{height}");
            self.deferred_size = Some((width, height));
            return Ok(());
        }
        self.deferred_size = None;
        self.desc.width = width;
        self.desc.height = height;
        self.stats.resizes += 1;
        Ok(())
    }

    fn set_render_targets(&mut self, mode: TransitionMode) -> EngineResult<()> {
        if self.deferred_size.is_some() {
            self.frame.skipped = true;
            return Ok(());
        }
        self.apply_transition(mode, "render targets")?;
        self.frame.targets_bound = true;
        Ok(())
    }

    fn clear_render_target(&mut self, _color: [f32; 4], mode: TransitionMode) -> EngineResult<()> {
        if self.frame.skipped {
            return Ok(());
        }
        self.require_targets("clear_render_target before set_render_targets")?;
        self.apply_transition(mode, "back buffer")
    }

    fn clear_depth_stencil(
        &mut self,
        _flags: ClearDepthStencilFlags,
        _depth: f32,
        _stencil: u8,
        mode: TransitionMode,
    ) -> EngineResult<()> {
        if self.frame.skipped {
            return Ok(());
        }
        self.require_targets("clear_depth_stencil before set_render_targets")?;
        self.apply_transition(mode, "depth buffer")
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineHandle) -> EngineResult<()> {
        if pipeline.index() as usize >= self.pipelines.len() {
            return Err(EngineError::InvalidHandle {
                kind: "pipeline",
                index: pipeline.index(),
            });
        }
        self.frame.pipeline = Some(pipeline);
        Ok(())
    }

    fn draw(&mut self, attribs: DrawAttribs) -> EngineResult<()> {
        if self.frame.skipped {
            return Ok(());
        }
        self.require_targets("draw before set_render_targets")?;
        if self.frame.pipeline.is_none() {
            return Err(EngineError::InvalidCallOrder("draw without a pipeline"));
        }
        self.stats.draw_calls += 1;
        self.stats.vertices_drawn += u64::from(attribs.num_vertices) * u64::from(attribs.num_instances);
        Ok(())
    }

    fn present(&mut self) -> EngineResult<bool> {
        if self.frame.skipped {
            self.frame = NullFrame::default();
            self.stats.frames_skipped += 1;
            return Ok(false);
        }
        self.require_targets("present before set_render_targets")?;
        self.frame = NullFrame::default();
        self.stats.frames_presented += 1;
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        Ok(true)
    }

    fn wait_idle(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CullMode, PrimitiveTopology, TextureFormat};
    use crate::shader::{TRIANGLE_PS, TRIANGLE_VS};

    fn backend_with_pipeline() -> (NullBackend, PipelineHandle) {
        let mut backend = NullBackend::new(SwapchainDesc::with_size(640, 480));
        let vs = backend
            .create_shader(&ShaderCreateInfo::glsl("vs", ShaderType::Vertex, TRIANGLE_VS))
            .unwrap();
        let ps = backend
            .create_shader(&ShaderCreateInfo::glsl("ps", ShaderType::Pixel, TRIANGLE_PS))
            .unwrap();
        let pipeline = backend
            .create_graphics_pipeline(&GraphicsPipelineDesc {
                name: "default".to_owned(),
                vertex_shader: vs,
                pixel_shader: ps,
                render_target_formats: vec![TextureFormat::Bgra8Unorm],
                depth_format: TextureFormat::D24UnormS8Uint,
                topology: PrimitiveTopology::TriangleList,
                cull_mode: CullMode::None,
                depth_enable: false,
            })
            .unwrap();
        (backend, pipeline)
    }

    #[test]
    fn full_frame_is_counted() {
        let (mut backend, pipeline) = backend_with_pipeline();

        backend.set_render_targets(TransitionMode::Transition).unwrap();
        backend
            .clear_render_target([0.0, 0.0, 0.0, 1.0], TransitionMode::Transition)
            .unwrap();
        backend
            .clear_depth_stencil(ClearDepthStencilFlags::ALL, 0.0, 0, TransitionMode::Transition)
            .unwrap();
        backend.set_pipeline_state(pipeline).unwrap();
        backend.draw(DrawAttribs::vertices(3)).unwrap();
        assert!(backend.present().unwrap());

        let stats = backend.stats();
        assert_eq!(stats.frames_presented, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.vertices_drawn, 3);
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let (mut backend, pipeline) = backend_with_pipeline();

        assert!(matches!(
            backend.present(),
            Err(EngineError::InvalidCallOrder(_))
        ));

        backend.set_render_targets(TransitionMode::Transition).unwrap();
        assert!(matches!(
            backend.draw(DrawAttribs::vertices(3)),
            Err(EngineError::InvalidCallOrder("draw without a pipeline"))
        ));

        backend.set_pipeline_state(pipeline).unwrap();
        backend.draw(DrawAttribs::vertices(3)).unwrap();
        backend.present().unwrap();

        // a presented frame unbinds everything
        assert!(backend.draw(DrawAttribs::vertices(3)).is_err());
    }

    #[test]
    fn zero_sized_resize_is_deferred() {
        let (mut backend, _) = backend_with_pipeline();

        backend.resize_swapchain(0, 0).unwrap();
        assert_eq!(backend.swapchain_desc().width, 640);

        backend.resize_swapchain(800, 600).unwrap();
        let desc = backend.swapchain_desc();
        assert_eq!((desc.width, desc.height), (800, 600));
        assert_eq!(backend.stats().resizes, 1);
    }

    fn record_frame(backend: &mut NullBackend, pipeline: PipelineHandle) -> EngineResult<bool> {
        backend.set_render_targets(TransitionMode::Transition)?;
        backend.clear_render_target([0.0, 0.0, 0.0, 1.0], TransitionMode::Transition)?;
        backend.clear_depth_stencil(ClearDepthStencilFlags::ALL, 0.0, 0, TransitionMode::Transition)?;
        backend.set_pipeline_state(pipeline)?;
        backend.draw(DrawAttribs::vertices(3))?;
        backend.present()
    }

    #[test]
    fn frames_are_dropped_while_minimized() {
        let (mut backend, pipeline) = backend_with_pipeline();

        backend.resize_swapchain(1280, 0).unwrap();
        assert!(!record_frame(&mut backend, pipeline).unwrap());
        assert!(!record_frame(&mut backend, pipeline).unwrap());

        let stats = backend.stats();
        assert_eq!(stats.frames_presented, 0);
        assert_eq!(stats.frames_skipped, 2);
        assert_eq!(stats.draw_calls, 0);

        backend.resize_swapchain(1280, 720).unwrap();
        assert!(record_frame(&mut backend, pipeline).unwrap());
        assert_eq!(backend.stats().frames_presented, 1);
    }

    #[test]
    fn verify_requires_a_prior_transition() {
        let (mut backend, _) = backend_with_pipeline();

        assert!(matches!(
            backend.set_render_targets(TransitionMode::Verify),
            Err(EngineError::StateVerification { resource: "render targets", .. })
        ));

        backend.set_render_targets(TransitionMode::None).unwrap();
        assert!(matches!(
            backend.clear_render_target([0.0; 4], TransitionMode::Verify),
            Err(EngineError::StateVerification { resource: "back buffer", .. })
        ));

        backend
            .clear_render_target([0.0; 4], TransitionMode::Transition)
            .unwrap();
        backend
            .clear_depth_stencil(ClearDepthStencilFlags::DEPTH, 0.0, 0, TransitionMode::Verify)
            .unwrap();

        // presenting hands the targets back to the swapchain
        backend.present().unwrap();
        backend.set_render_targets(TransitionMode::None).unwrap();
        assert!(backend
            .clear_depth_stencil(ClearDepthStencilFlags::ALL, 0.0, 0, TransitionMode::Verify)
            .is_err());
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let (mut backend, _) = backend_with_pipeline();
        assert!(matches!(
            backend.set_pipeline_state(PipelineHandle::new(7)),
            Err(EngineError::InvalidHandle { kind: "pipeline", index: 7 })
        ));
    }
}
