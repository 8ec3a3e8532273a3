//! Error types for the engine

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Window handle unavailable: {0}")]
    Handle(#[from] winit::raw_window_handle::HandleError),

    #[error("Unable to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("{operation} failed: {result}")]
    Vulkan {
        operation: &'static str,
        result: vk::Result,
    },

    #[error("No suitable physical device found among {0} devices")]
    NoSuitableDevice(usize),

    #[error("Required device feature '{0}' is not supported")]
    UnsupportedFeature(&'static str),

    #[error("Unsupported texture format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to compile shader '{name}': {message}")]
    ShaderCompilation { name: String, message: String },

    #[error("Unknown {kind} handle {index}")]
    InvalidHandle { kind: &'static str, index: u32 },

    #[error("Invalid call order: {0}")]
    InvalidCallOrder(&'static str),

    #[error("Resource state verification failed: {resource} is in {actual}, expected {expected}")]
    StateVerification {
        resource: &'static str,
        actual: String,
        expected: String,
    },

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Unknown graphics backend '{0}'")]
    UnknownBackend(String),
}

/// Convenience type alias for Results with [`EngineError`]
pub type EngineResult<T> = Result<T, EngineError>;

/// Attaches the failing operation's name to a raw Vulkan result.
pub(crate) trait VkResultExt<T> {
    fn vk_op(self, operation: &'static str) -> EngineResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn vk_op(self, operation: &'static str) -> EngineResult<T> {
        self.map_err(|result| match result {
            vk::Result::TIMEOUT => EngineError::Timeout(operation),
            result => EngineError::Vulkan { operation, result },
        })
    }
}
