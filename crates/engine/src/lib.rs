use crate::backend::features::EngineCreateInfo;
use crate::backend::{
    BackendKind, CullMode, GraphicsBackend, GraphicsPipelineDesc, PrimitiveTopology,
};
use crate::error::EngineResult;
use crate::event::EventQueue;
use crate::frame_loop::{FrameLoop, TickReport};
use crate::shader::{ShaderCreateInfo, ShaderType, TRIANGLE_PS, TRIANGLE_VS};
use crate::window::WindowHost;

pub mod backend;
pub mod error;
pub mod event;
pub mod frame_loop;
pub mod shader;
pub mod window;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct Engine<W: WindowHost> {
    backend: Box<dyn GraphicsBackend>,
    // window needs to be dropped after the backend as the surface references it
    window: W,
    events: EventQueue,
    frame_loop: FrameLoop,
}

impl<W: WindowHost> Engine<W> {
    pub fn initialize(window: W, kind: BackendKind, info: &EngineCreateInfo) -> EngineResult<Self> {
        let backend = backend::create_backend(kind, &window, info)?;
        Self::with_backend(window, backend)
    }

    /// Compiles the triangle shaders and builds the pipeline on an existing backend.
    pub fn with_backend(window: W, mut backend: Box<dyn GraphicsBackend>) -> EngineResult<Self> {
        let vertex_shader = backend.create_shader(&ShaderCreateInfo::glsl(
            "vertex shader",
            ShaderType::Vertex,
            TRIANGLE_VS,
        ))?;
        let pixel_shader = backend.create_shader(&ShaderCreateInfo::glsl(
            "pixel shader",
            ShaderType::Pixel,
            TRIANGLE_PS,
        ))?;

        let swapchain = backend.swapchain_desc();
        let pipeline = backend.create_graphics_pipeline(&GraphicsPipelineDesc {
            name: "default".to_owned(),
            vertex_shader,
            pixel_shader,
            render_target_formats: vec![swapchain.color_format],
            depth_format: swapchain.depth_format,
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_enable: false,
        })?;
        log::info!("Engine initialized with the {} backend", backend.kind());

        Ok(Self {
            backend,
            window,
            events: EventQueue::new(),
            frame_loop: FrameLoop::new(pipeline),
        })
    }

    pub fn tick(&mut self) -> EngineResult<TickReport> {
        self.frame_loop
            .tick(&mut self.window, self.backend.as_mut(), &mut self.events)
    }

    /// Ticks until shutdown is requested and returns the number of presented frames.
    pub fn run(&mut self) -> EngineResult<u64> {
        while self.is_running() {
            self.tick()?;
        }
        Ok(self.frame_loop.frames_presented())
    }

    pub fn is_running(&self) -> bool {
        self.frame_loop.state().is_running()
    }

    pub fn backend(&self) -> &dyn GraphicsBackend {
        self.backend.as_ref()
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn stop(&mut self) -> EngineResult<()> {
        self.backend.wait_idle()
    }
}
