//! # Event Loop Driver
//!
//! Owns the window and the session and turns winit events into module
//! calls.
//!
//! ```text
//! winit event ──> keys::* ──> Session::deliver ──> request_redraw
//! RedrawRequested ──> begin_frame ──> Session::run_cycle ──> end_frame
//!                     (skipped) ──> Session::run_unpresented_cycle
//! AboutToWait ──> ControlFlow::WaitUntil(next wake) | Wait
//! ResumeTimeReached ──> Session::fire_due ──> request_redraw
//! ```
//!
//! The deferred wake is winit's own `WaitUntil`, so there is no timer
//! thread: a cancelled wake is simply not re-armed.

use std::sync::Arc;
use std::time::Instant;

use glasswing_core::diagnostics::{self, DEFAULT_CAPACITY};
use glasswing_core::input::to_backing_pixels;
use glasswing_core::{
    BridgeError, BridgeResult, Diagnostic, DiagnosticReceiver, DiagnosticSender, FrameDirective,
    InputEvent, Modifiers, RequestOutcome, Session, WakeOutcome,
};
use glasswing_render::{GpuContext, GpuOptions, Renderer};
use tracing::{debug, error, info, trace, warn};
use wasmtime::Engine;
use winit::dpi::{LogicalPosition, LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Event, Ime, StartCause, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::window::{Window, WindowBuilder};

use crate::config::{ConfigError, HostConfig, PowerPreference, RendererConfig};
use crate::error::{HostError, HostResult};
use crate::keys;
use crate::logging::GUEST_TARGET;
use crate::wasm::WasmGuest;

/// Runs the configured module until its window closes or it fails.
///
/// # Errors
///
/// Setup failures, and the first fatal error the module run hits.
pub fn run(config: &HostConfig) -> HostResult<()> {
    let path = config
        .module
        .path
        .as_deref()
        .ok_or(ConfigError::MissingModule)?;
    let wasm = std::fs::read(path).map_err(|source| HostError::ReadModule {
        path: path.to_path_buf(),
        source,
    })?;
    info!(module = %path.display(), bytes = wasm.len(), "module loaded");

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window.title.as_str())
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)?,
    );
    window.set_ime_allowed(config.input.ime);

    let size = window.inner_size();
    let gpu = GpuContext::new(
        Arc::clone(&window),
        size.width,
        size.height,
        &gpu_options(&config.renderer),
    )?;
    info!(adapter = gpu.adapter_name(), format = ?gpu.format(), "gpu ready");

    let (reporter, diagnostics) = diagnostics::channel(DEFAULT_CAPACITY);
    let renderer = Renderer::new(gpu, logical_size(&window), reporter.clone())?;

    let engine = Engine::default();
    let guest = WasmGuest::instantiate(&engine, &wasm, renderer)?;
    let mut session = Session::new(guest);
    session.start()?;
    window.request_redraw();

    let mut driver = Driver {
        window,
        session,
        diagnostics,
        reporter,
        modifiers: Modifiers::default(),
        wheel_line_pixels: config.input.wheel_line_pixels,
        ime: config.input.ime,
        failure: None,
    };
    event_loop.run(|event, target| driver.handle(event, target))?;

    match driver.failure.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn gpu_options(config: &RendererConfig) -> GpuOptions {
    GpuOptions {
        vsync: config.vsync,
        power_preference: match config.power_preference {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        },
    }
}

fn logical_size(window: &Window) -> (f32, f32) {
    let size: LogicalSize<f32> = window.inner_size().to_logical(window.scale_factor());
    (size.width, size.height)
}

struct Driver {
    window: Arc<Window>,
    session: Session<WasmGuest<Renderer>>,
    diagnostics: DiagnosticReceiver,
    reporter: DiagnosticSender,
    modifiers: Modifiers,
    wheel_line_pixels: f32,
    ime: bool,
    failure: Option<BridgeError>,
}

impl Driver {
    fn handle(&mut self, event: Event<()>, target: &EventLoopWindowTarget<()>) {
        if self.failure.is_some() {
            return;
        }
        if let Err(err) = self.dispatch(event, target) {
            error!(%err, "module run stopped");
            self.failure = Some(err);
            target.exit();
        }
    }

    fn dispatch(&mut self, event: Event<()>, target: &EventLoopWindowTarget<()>) -> BridgeResult<()> {
        match event {
            Event::NewEvents(StartCause::ResumeTimeReached { .. }) => self.wake(),
            Event::WindowEvent { window_id, event } if window_id == self.window.id() => {
                self.window_event(event, target)?;
            }
            Event::AboutToWait => {
                self.log_diagnostics();
                let flow = match self.session.scheduler().next_wake() {
                    Some(at) => ControlFlow::WaitUntil(at),
                    None => ControlFlow::Wait,
                };
                target.set_control_flow(flow);
            }
            Event::LoopExiting => self.log_summary(),
            _ => {}
        }
        Ok(())
    }

    fn window_event(&mut self, event: WindowEvent, target: &EventLoopWindowTarget<()>) -> BridgeResult<()> {
        match event {
            WindowEvent::CloseRequested => {
                info!("window closed");
                target.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                let outcome = self.session.request_frame();
                self.follow(outcome);
            }
            WindowEvent::RedrawRequested => self.redraw()?,
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = self.backing_position(position);
                self.deliver(&InputEvent::PointerMove { x, y })?;
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.deliver(&keys::button_event(state, button))?;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = keys::scroll_delta(delta, self.wheel_line_pixels);
                self.deliver(&InputEvent::Scroll { delta_y })?;
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = keys::modifiers(modifiers.state());
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.deliver(&keys::key_event(&event, self.modifiers))?;
                if event.state == ElementState::Pressed && !self.ime {
                    if let Some(text) = event.text.as_deref().and_then(keys::printable_text) {
                        self.deliver(&InputEvent::TextInput { text })?;
                    }
                }
            }
            WindowEvent::Ime(Ime::Commit(text)) => {
                if let Some(text) = keys::printable_text(&text) {
                    self.deliver(&InputEvent::TextInput { text })?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn deliver(&mut self, event: &InputEvent) -> BridgeResult<()> {
        if let Some(outcome) = self.session.deliver(event)? {
            self.follow(outcome);
        }
        Ok(())
    }

    fn follow(&self, outcome: RequestOutcome) {
        if outcome.queued_refresh {
            self.window.request_redraw();
        }
    }

    fn wake(&mut self) {
        match self.session.fire_due(Instant::now()) {
            WakeOutcome::Fired(outcome) => self.follow(outcome),
            WakeOutcome::NotDue(at) => trace!(?at, "early wake-up"),
            WakeOutcome::Stale => {
                self.reporter.report(Diagnostic::StaleTimer);
            }
        }
    }

    fn redraw(&mut self) -> BridgeResult<()> {
        let size = self.window.inner_size();
        let logical = logical_size(&self.window);
        let renderer = self.session.guest_mut().state_mut().target_mut();
        renderer.resize((size.width, size.height), logical);
        let presented = renderer.begin_frame()?;

        let directive = if presented {
            self.session.run_cycle(Instant::now())
        } else {
            debug!("drawing into a skipped frame");
            self.session.run_unpresented_cycle(Instant::now())
        };
        let stats = self.session.guest_mut().state_mut().target_mut().end_frame();
        if !stats.is_idle() {
            trace!(?stats, "frame done");
        }

        if directive? == FrameDirective::Continue {
            self.window.request_redraw();
        }
        Ok(())
    }

    fn backing_position(&self, position: PhysicalPosition<f64>) -> (f32, f32) {
        let logical: LogicalPosition<f32> = position.to_logical(self.window.scale_factor());
        let backing = self.session.guest().state().target().pixel_size();
        to_backing_pixels((logical.x, logical.y), logical_size(&self.window), backing)
    }

    fn log_diagnostics(&self) {
        for diagnostic in self.diagnostics.drain() {
            warn!(%diagnostic, "diagnostic");
        }
    }

    fn log_summary(&self) {
        let unflushed = self.session.guest().state().pending_log();
        if !unflushed.is_empty() {
            info!(target: GUEST_TARGET, "{unflushed}");
        }
        let scheduler = self.session.scheduler().stats();
        let input = self.session.translator_stats();
        info!(
            cycles = scheduler.cycles,
            coalesced = scheduler.requests_coalesced,
            timers_armed = scheduler.timers_armed,
            timers_cancelled = scheduler.timers_cancelled,
            events = input.total(),
            payload_bytes = input.payload_bytes,
            "session ended"
        );
    }
}
