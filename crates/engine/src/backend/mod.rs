//! Capability interface every graphics backend implements, plus the
//! descriptors passed through it.
//!
//! A backend owns a device, an immediate context and a swapchain bound to one
//! window. Setup calls (`create_shader`, `create_graphics_pipeline`) happen once
//! before the frame loop; everything else is issued per tick.

pub mod features;
pub mod null;
pub mod vulkan;

use crate::error::{EngineError, EngineResult};
use crate::shader::ShaderCreateInfo;
use crate::window::WindowHost;
use features::EngineCreateInfo;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a backend brings a resource into the state a command needs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TransitionMode {
    /// No barrier is issued; the caller is responsible for the resource state.
    None,
    /// The backend transitions the resource to the required state.
    #[default]
    Transition,
    /// No barrier is issued, but the tracked state must already match.
    Verify,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClearDepthStencilFlags {
    pub depth: bool,
    pub stencil: bool,
}

impl ClearDepthStencilFlags {
    pub const DEPTH: Self = Self {
        depth: true,
        stencil: false,
    };
    pub const STENCIL: Self = Self {
        depth: false,
        stencil: true,
    };
    pub const ALL: Self = Self {
        depth: true,
        stencil: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.depth && !self.stencil
    }
}

/// Non-indexed draw parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawAttribs {
    pub num_vertices: u32,
    pub num_instances: u32,
    pub start_vertex: u32,
}

impl DrawAttribs {
    pub fn vertices(num_vertices: u32) -> Self {
        Self {
            num_vertices,
            ..Self::default()
        }
    }
}

impl Default for DrawAttribs {
    fn default() -> Self {
        Self {
            num_vertices: 0,
            num_instances: 1,
            start_vertex: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Unknown,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    D16Unorm,
    D32Float,
    D16UnormS8Uint,
    D24UnormS8Uint,
    D32FloatS8Uint,
}

impl TextureFormat {
    pub fn has_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16Unorm
                | TextureFormat::D32Float
                | TextureFormat::D16UnormS8Uint
                | TextureFormat::D24UnormS8Uint
                | TextureFormat::D32FloatS8Uint
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16UnormS8Uint
                | TextureFormat::D24UnormS8Uint
                | TextureFormat::D32FloatS8Uint
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
}

impl SwapchainDesc {
    /// Swapchain request for a window of the given size, with the default depth buffer.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color_format: TextureFormat::Bgra8Unorm,
            depth_format: TextureFormat::D24UnormS8Uint,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsPipelineDesc {
    pub name: String,
    pub vertex_shader: ShaderHandle,
    pub pixel_shader: ShaderHandle,
    /// One entry per render target.
    pub render_target_formats: Vec<TextureFormat>,
    pub depth_format: TextureFormat,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub depth_enable: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderHandle(u32);

impl ShaderHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineHandle(u32);

impl PipelineHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

pub trait GraphicsBackend {
    fn kind(&self) -> BackendKind;

    /// Current swapchain dimensions and the formats actually in use.
    fn swapchain_desc(&self) -> SwapchainDesc;

    fn create_shader(&mut self, info: &ShaderCreateInfo) -> EngineResult<ShaderHandle>;

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> EngineResult<PipelineHandle>;

    fn resize_swapchain(&mut self, width: u32, height: u32) -> EngineResult<()>;

    /// Binds the current back buffer and the depth buffer as render targets.
    fn set_render_targets(&mut self, mode: TransitionMode) -> EngineResult<()>;

    fn clear_render_target(&mut self, color: [f32; 4], mode: TransitionMode) -> EngineResult<()>;

    fn clear_depth_stencil(
        &mut self,
        flags: ClearDepthStencilFlags,
        depth: f32,
        stencil: u8,
        mode: TransitionMode,
    ) -> EngineResult<()>;

    fn set_pipeline_state(&mut self, pipeline: PipelineHandle) -> EngineResult<()>;

    fn draw(&mut self, attribs: DrawAttribs) -> EngineResult<()>;

    /// Submits the recorded frame and presents the back buffer.
    ///
    /// Returns `false` if nothing was submitted because a resize to a zero-sized
    /// surface is pending; the per-frame calls before it were accepted and dropped.
    fn present(&mut self) -> EngineResult<bool>;

    fn wait_idle(&mut self) -> EngineResult<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Vulkan,
    Null,
}

impl BackendKind {
    /// Environment variable that overrides [`BackendKind::detect`].
    pub const ENV_VAR: &'static str = "SCHENGINE_BACKEND";

    pub fn detect() -> Self {
        if cfg!(any(
            target_os = "windows",
            target_os = "linux",
            target_os = "macos",
            target_os = "android"
        )) {
            BackendKind::Vulkan
        } else {
            BackendKind::Null
        }
    }
}

impl FromStr for BackendKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vulkan" | "vk" => Ok(BackendKind::Vulkan),
            "null" | "none" => Ok(BackendKind::Null),
            other => Err(EngineError::UnknownBackend(other.to_owned())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Vulkan => write!(f, "vulkan"),
            BackendKind::Null => write!(f, "null"),
        }
    }
}

/// Creates the device, immediate context and swapchain for `window`.
pub fn create_backend(
    kind: BackendKind,
    window: &dyn WindowHost,
    info: &EngineCreateInfo,
) -> EngineResult<Box<dyn GraphicsBackend>> {
    let (width, height) = window.window_size();
    let desc = SwapchainDesc::with_size(width, height);
    log::info!("Initializing {kind} backend ({width}x{height})");

    let backend: Box<dyn GraphicsBackend> = match kind {
        BackendKind::Vulkan => Box::new(vulkan::VulkanBackend::initialize(
            &window.native_handle()?,
            info,
            desc,
        )?),
        BackendKind::Null => Box::new(
            null::NullBackend::new(desc).with_frame_interval(Duration::from_millis(1000 / 60)),
        ),
    };
    Ok(backend)
}
