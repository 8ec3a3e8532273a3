use crate::backend::{
    ClearDepthStencilFlags, DrawAttribs, GraphicsBackend, PipelineHandle, TransitionMode,
};
use crate::error::EngineResult;
use crate::event::{Event, EventQueue, Key};
use crate::window::WindowHost;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const CLEAR_DEPTH: f32 = 0.0;
const CLEAR_STENCIL: u8 = 0;
const TRIANGLE_VERTICES: u32 = 3;

/// `running` only ever goes from true to false. `should_render` is reset at the
/// start of every tick and never carried over.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoopState {
    running: bool,
    should_render: bool,
}

impl LoopState {
    pub fn new() -> Self {
        Self {
            running: true,
            should_render: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn should_render(&self) -> bool {
        self.running && self.should_render
    }

    fn begin_tick(&mut self) {
        self.should_render = true;
    }

    fn skip_frame(&mut self) {
        self.should_render = false;
    }

    fn terminate(&mut self) {
        self.should_render = false;
        self.running = false;
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single tick did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub running: bool,
    /// A frame was presented.
    pub rendered: bool,
    pub events: usize,
    /// Dimensions of the last swapchain resize requested during the tick.
    pub resized_to: Option<(u32, u32)>,
}

pub struct FrameLoop {
    state: LoopState,
    pipeline: PipelineHandle,
    frames_presented: u64,
}

impl FrameLoop {
    pub fn new(pipeline: PipelineHandle) -> Self {
        Self {
            state: LoopState::new(),
            pipeline,
            frames_presented: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn tick(
        &mut self,
        window: &mut dyn WindowHost,
        backend: &mut dyn GraphicsBackend,
        events: &mut EventQueue,
    ) -> EngineResult<TickReport> {
        window.update(events);
        self.state.begin_tick();

        let mut report = TickReport::default();
        while let Some(event) = events.pop() {
            report.events += 1;
            self.handle_event(event, window, backend, &mut report)?;
        }

        if self.state.should_render() && render_frame(backend, self.pipeline)? {
            self.frames_presented += 1;
            report.rendered = true;
        }

        report.running = self.state.is_running();
        Ok(report)
    }

    fn handle_event(
        &mut self,
        event: Event,
        window: &mut dyn WindowHost,
        backend: &mut dyn GraphicsBackend,
        report: &mut TickReport,
    ) -> EngineResult<()> {
        match event {
            Event::Keyboard {
                key: Key::Escape, ..
            }
            | Event::Close => {
                log::info!("Shutdown requested ({event:?})");
                window.close();
                self.state.terminate();
            }
            Event::Dpi { scale } => {
                let (width, height) = window.window_size();
                log::debug!("Scale factor changed to {scale}, resizing to {width}x{height}");
                backend.resize_swapchain(width, height)?;
                report.resized_to = Some((width, height));
                self.state.skip_frame();
            }
            Event::Resize { width, height } => {
                log::debug!("Resizing swapchain to {width}x{height}");
                backend.resize_swapchain(width, height)?;
                report.resized_to = Some((width, height));
                self.state.skip_frame();
            }
            _ => (),
        }
        Ok(())
    }
}

/// Clears the back buffer and depth buffer, draws the triangle and presents.
/// `false` if the backend dropped the frame instead of presenting it.
pub fn render_frame(
    backend: &mut dyn GraphicsBackend,
    pipeline: PipelineHandle,
) -> EngineResult<bool> {
    backend.set_render_targets(TransitionMode::Transition)?;
    backend.clear_render_target(CLEAR_COLOR, TransitionMode::Transition)?;
    backend.clear_depth_stencil(
        ClearDepthStencilFlags::ALL,
        CLEAR_DEPTH,
        CLEAR_STENCIL,
        TransitionMode::Transition,
    )?;

    backend.set_pipeline_state(pipeline)?;
    backend.draw(DrawAttribs::vertices(TRIANGLE_VERTICES))?;

    backend.present()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_is_permanent() {
        let mut state = LoopState::new();
        assert!(state.is_running() && state.should_render());

        state.terminate();
        state.begin_tick();
        assert!(!state.is_running());
        assert!(!state.should_render());
    }

    #[test]
    fn skipped_frame_only_lasts_one_tick() {
        let mut state = LoopState::new();
        state.skip_frame();
        assert!(!state.should_render());

        state.begin_tick();
        assert!(state.should_render());
        assert!(state.is_running());
    }
}
