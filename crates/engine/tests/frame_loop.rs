use schengine::backend::null::NullBackend;
use schengine::backend::{
    BackendKind, ClearDepthStencilFlags, DrawAttribs, GraphicsBackend, GraphicsPipelineDesc,
    PipelineHandle, ShaderHandle, SwapchainDesc, TransitionMode,
};
use schengine::error::{EngineError, EngineResult};
use schengine::event::{ButtonState, Event, EventQueue, Key};
use schengine::frame_loop::{FrameLoop, TickReport};
use schengine::shader::ShaderCreateInfo;
use schengine::window::{NativeWindow, WindowHost};
use schengine::Engine;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem::{discriminant, Discriminant};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Resize(u32, u32),
    SetRenderTargets(TransitionMode),
    ClearRenderTarget([f32; 4]),
    ClearDepthStencil(ClearDepthStencilFlags, f32, u8),
    SetPipeline(PipelineHandle),
    Draw(DrawAttribs),
    Present,
}

#[derive(Default)]
struct WindowState {
    batches: VecDeque<Vec<Event>>,
    size: (u32, u32),
    close_calls: usize,
    updates: usize,
}

/// Hands out one scripted batch of events per `update`.
#[derive(Clone, Default)]
struct ScriptedWindow(Rc<RefCell<WindowState>>);

impl ScriptedWindow {
    fn new(size: (u32, u32)) -> Self {
        let window = Self::default();
        window.0.borrow_mut().size = size;
        window
    }

    fn script(&self, batch: impl IntoIterator<Item = Event>) {
        self.0.borrow_mut().batches.push_back(batch.into_iter().collect());
    }

    fn idle(&self) {
        self.0.borrow_mut().batches.push_back(Vec::new());
    }

    fn set_size(&self, size: (u32, u32)) {
        self.0.borrow_mut().size = size;
    }

    fn close_calls(&self) -> usize {
        self.0.borrow().close_calls
    }
}

impl WindowHost for ScriptedWindow {
    fn update(&mut self, queue: &mut EventQueue) {
        let mut state = self.0.borrow_mut();
        state.updates += 1;
        if let Some(batch) = state.batches.pop_front() {
            queue.extend(batch);
        }
    }

    fn window_size(&self) -> (u32, u32) {
        self.0.borrow().size
    }

    fn close(&mut self) {
        self.0.borrow_mut().close_calls += 1;
    }

    fn native_handle(&self) -> EngineResult<NativeWindow> {
        Err(EngineError::WindowCreation("scripted window".to_owned()))
    }
}

#[derive(Clone, Default)]
struct RecordingBackend {
    calls: Rc<RefCell<Vec<Call>>>,
    failing: Option<Discriminant<Call>>,
}

impl RecordingBackend {
    /// Records every call, but fails each call of the same kind as `call`.
    fn failing_on(call: Call) -> Self {
        Self {
            failing: Some(discriminant(&call)),
            ..Self::default()
        }
    }

    fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    fn record(&self, call: Call) -> EngineResult<()> {
        let fails = self.failing == Some(discriminant(&call));
        self.calls.borrow_mut().push(call);
        if fails {
            return Err(EngineError::Timeout("recorded call"));
        }
        Ok(())
    }
}

impl GraphicsBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn swapchain_desc(&self) -> SwapchainDesc {
        SwapchainDesc::with_size(1280, 720)
    }

    fn create_shader(&mut self, _info: &ShaderCreateInfo) -> EngineResult<ShaderHandle> {
        Ok(ShaderHandle::new(0))
    }

    fn create_graphics_pipeline(
        &mut self,
        _desc: &GraphicsPipelineDesc,
    ) -> EngineResult<PipelineHandle> {
        Ok(PipelineHandle::new(0))
    }

    fn resize_swapchain(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.record(Call::Resize(width, height))
    }

    fn set_render_targets(&mut self, mode: TransitionMode) -> EngineResult<()> {
        self.record(Call::SetRenderTargets(mode))
    }

    fn clear_render_target(&mut self, color: [f32; 4], _mode: TransitionMode) -> EngineResult<()> {
        self.record(Call::ClearRenderTarget(color))
    }

    fn clear_depth_stencil(
        &mut self,
        flags: ClearDepthStencilFlags,
        depth: f32,
        stencil: u8,
        _mode: TransitionMode,
    ) -> EngineResult<()> {
        self.record(Call::ClearDepthStencil(flags, depth, stencil))
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineHandle) -> EngineResult<()> {
        self.record(Call::SetPipeline(pipeline))
    }

    fn draw(&mut self, attribs: DrawAttribs) -> EngineResult<()> {
        self.record(Call::Draw(attribs))
    }

    fn present(&mut self) -> EngineResult<bool> {
        self.record(Call::Present)?;
        Ok(true)
    }

    fn wait_idle(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

struct Harness {
    window: ScriptedWindow,
    backend: RecordingBackend,
    events: EventQueue,
    frame_loop: FrameLoop,
}

impl Harness {
    fn new() -> Self {
        Self::with_backend(RecordingBackend::default())
    }

    fn with_backend(backend: RecordingBackend) -> Self {
        Self {
            window: ScriptedWindow::new((1280, 720)),
            backend,
            events: EventQueue::new(),
            frame_loop: FrameLoop::new(PipelineHandle::new(0)),
        }
    }

    fn try_tick(&mut self) -> EngineResult<TickReport> {
        let mut window = self.window.clone();
        let mut backend = self.backend.clone();
        self.frame_loop
            .tick(&mut window, &mut backend, &mut self.events)
    }

    fn tick(&mut self) -> TickReport {
        self.try_tick().unwrap()
    }
}

fn render_sequence() -> Vec<Call> {
    vec![
        Call::SetRenderTargets(TransitionMode::Transition),
        Call::ClearRenderTarget([0.0, 0.0, 0.0, 1.0]),
        Call::ClearDepthStencil(ClearDepthStencilFlags::ALL, 0.0, 0),
        Call::SetPipeline(PipelineHandle::new(0)),
        Call::Draw(DrawAttribs::vertices(3)),
        Call::Present,
    ]
}

#[test]
fn empty_tick_renders_one_frame() {
    let mut harness = Harness::new();

    let report = harness.tick();

    assert!(report.running);
    assert!(report.rendered);
    assert_eq!(report.events, 0);
    assert_eq!(harness.backend.take_calls(), render_sequence());
    assert_eq!(harness.frame_loop.frames_presented(), 1);
}

#[test]
fn resize_skips_the_frame() {
    let mut harness = Harness::new();
    harness.window.script([Event::resize(800, 600)]);

    let report = harness.tick();

    assert!(report.running);
    assert!(!report.rendered);
    assert_eq!(report.resized_to, Some((800, 600)));
    assert_eq!(harness.backend.take_calls(), vec![Call::Resize(800, 600)]);

    // next tick renders again
    harness.tick();
    assert_eq!(harness.backend.take_calls(), render_sequence());
}

#[test]
fn escape_terminates_without_rendering() {
    let mut harness = Harness::new();
    harness.window.script([Event::key_pressed(Key::Escape)]);

    let report = harness.tick();

    assert!(!report.running);
    assert!(!report.rendered);
    assert_eq!(harness.window.close_calls(), 1);
    assert!(harness.backend.take_calls().is_empty());
    assert!(!harness.frame_loop.state().is_running());
}

#[test]
fn other_keys_before_close_have_no_effect() {
    let mut harness = Harness::new();
    harness
        .window
        .script([Event::key_pressed(Key::Char('A')), Event::Close]);

    let report = harness.tick();

    assert_eq!(report.events, 2);
    assert!(!report.running);
    assert!(!report.rendered);
    assert_eq!(harness.window.close_calls(), 1);
    assert!(harness.backend.take_calls().is_empty());
}

#[test]
fn every_resize_of_a_tick_is_applied_in_order() {
    let mut harness = Harness::new();
    harness
        .window
        .script([Event::resize(800, 600), Event::resize(1024, 768)]);

    let report = harness.tick();

    assert_eq!(report.resized_to, Some((1024, 768)));
    assert_eq!(
        harness.backend.take_calls(),
        vec![Call::Resize(800, 600), Call::Resize(1024, 768)]
    );
}

#[test]
fn dpi_change_resizes_to_the_queried_window_size() {
    let mut harness = Harness::new();
    harness.window.set_size((2560, 1440));
    harness.window.script([Event::Dpi { scale: 2.0 }]);

    let report = harness.tick();

    assert!(!report.rendered);
    assert_eq!(report.resized_to, Some((2560, 1440)));
    assert_eq!(harness.backend.take_calls(), vec![Call::Resize(2560, 1440)]);
}

#[test]
fn input_events_still_render() {
    let mut harness = Harness::new();
    harness.window.script([
        Event::Keyboard {
            key: Key::Space,
            state: ButtonState::Released,
        },
        Event::Focus(true),
        Event::Paint,
        Event::MouseMove { x: 10.0, y: 20.0 },
        Event::MouseWheel { delta: 1.0 },
    ]);

    let report = harness.tick();

    assert_eq!(report.events, 5);
    assert!(report.running);
    assert!(report.rendered);
    assert_eq!(harness.backend.take_calls(), render_sequence());
}

#[test]
fn close_wins_over_a_resize_in_the_same_tick() {
    let mut harness = Harness::new();
    harness.window.script([Event::resize(640, 480), Event::Close]);

    let report = harness.tick();

    assert!(!report.running);
    assert!(!report.rendered);
    assert_eq!(harness.backend.take_calls(), vec![Call::Resize(640, 480)]);
}

#[test]
fn terminated_loop_never_renders_again() {
    let mut harness = Harness::new();
    harness.window.script([Event::Close]);
    harness.tick();
    harness.backend.take_calls();

    let report = harness.tick();

    assert!(!report.running);
    assert!(!report.rendered);
    assert!(harness.backend.take_calls().is_empty());
    assert_eq!(harness.frame_loop.frames_presented(), 0);
}

#[test]
fn engine_runs_until_the_window_closes() {
    let window = ScriptedWindow::new((640, 480));
    window.idle();
    window.script([Event::resize(320, 240)]);
    window.idle();
    window.script([Event::key_pressed(Key::Escape)]);

    let backend = NullBackend::new(SwapchainDesc::with_size(640, 480));
    let mut engine = Engine::with_backend(window.clone(), Box::new(backend)).unwrap();

    let frames = engine.run().unwrap();
    engine.stop().unwrap();

    assert_eq!(frames, 2);
    assert!(!engine.is_running());
    assert_eq!(window.close_calls(), 1);
    assert_eq!(window.0.borrow().updates, 4);

    let desc = engine.backend().swapchain_desc();
    assert_eq!((desc.width, desc.height), (320, 240));
}

#[test]
fn present_failure_is_returned_from_the_tick() {
    let mut harness = Harness::with_backend(RecordingBackend::failing_on(Call::Present));

    let result = harness.try_tick();

    assert!(matches!(result, Err(EngineError::Timeout(_))));
    assert_eq!(harness.backend.take_calls(), render_sequence());
    assert_eq!(harness.frame_loop.frames_presented(), 0);
}

#[test]
fn resize_failure_is_returned_before_rendering() {
    let mut harness = Harness::with_backend(RecordingBackend::failing_on(Call::Resize(0, 0)));
    harness.window.script([Event::resize(800, 600), Event::Close]);

    let result = harness.try_tick();

    assert!(matches!(result, Err(EngineError::Timeout(_))));
    // the close after the failing resize is never dispatched
    assert_eq!(harness.window.close_calls(), 0);
    assert_eq!(harness.backend.take_calls(), vec![Call::Resize(800, 600)]);
    assert_eq!(harness.frame_loop.frames_presented(), 0);
}

#[test]
fn engine_run_stops_on_backend_failure() {
    let window = ScriptedWindow::new((640, 480));
    let backend = RecordingBackend::failing_on(Call::Draw(DrawAttribs::vertices(3)));
    let mut engine = Engine::with_backend(window.clone(), Box::new(backend.clone())).unwrap();

    assert!(engine.run().is_err());
    assert!(engine.is_running());
    assert_eq!(window.0.borrow().updates, 1);
    assert_eq!(backend.take_calls().last(), Some(&Call::Draw(DrawAttribs::vertices(3))));
}

#[test]
fn minimized_window_presents_nothing() {
    let window = ScriptedWindow::new((640, 480));
    window.script([Event::resize(0, 0)]);
    window.idle();
    window.idle();
    window.script([Event::resize(640, 480)]);
    window.idle();
    window.script([Event::Close]);

    let backend = NullBackend::new(SwapchainDesc::with_size(640, 480));
    let mut engine = Engine::with_backend(window.clone(), Box::new(backend)).unwrap();

    let resized = engine.tick().unwrap();
    assert_eq!(resized.resized_to, Some((0, 0)));
    assert!(!resized.rendered);

    for _ in 0..2 {
        let idle = engine.tick().unwrap();
        assert!(idle.running);
        assert!(!idle.rendered);
    }

    assert!(!engine.tick().unwrap().rendered);
    assert!(engine.tick().unwrap().rendered);

    let frames = engine.run().unwrap();
    assert_eq!(frames, 1);
}
