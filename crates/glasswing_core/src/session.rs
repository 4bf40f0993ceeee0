//! # Session
//!
//! The single owning context for one running module: the module itself,
//! the frame scheduler and the input translator. Nothing here is global;
//! the host driver owns a `Session` and passes every trigger through it.
//!
//! ```text
//! host input ──> deliver() ──> add_event ──> request_frame()
//! resize     ──────────────────────────────> request_frame()
//! refresh    ──> run_cycle() ──> app_update ──> finish_frame(wait)
//! no surface ──> run_unpresented_cycle() ──────> request_frame()
//! wake due   ──> fire_due() ──────────────────> request_frame()
//! ```

use std::time::Instant;

use tracing::{debug, info};

use crate::error::BridgeResult;
use crate::guest::GuestModule;
use crate::input::InputEvent;
use crate::scheduler::{FrameDirective, FrameScheduler, RequestOutcome, WakeOutcome};
use crate::translator::{InputTranslator, TranslatorStats};

/// One module plus its scheduling state.
pub struct Session<G> {
    guest: G,
    scheduler: FrameScheduler,
    translator: InputTranslator,
}

impl<G: GuestModule> Session<G> {
    /// Wraps an instantiated module. Nothing is called yet.
    pub fn new(guest: G) -> Self {
        Self {
            guest,
            scheduler: FrameScheduler::new(),
            translator: InputTranslator::new(),
        }
    }

    /// Calls the module's init entry point and queues the first frame.
    ///
    /// # Errors
    ///
    /// Whatever the module's init raised.
    pub fn start(&mut self) -> BridgeResult<RequestOutcome> {
        self.guest.init()?;
        info!("module initialised");
        Ok(self.scheduler.request_frame())
    }

    /// Delivers one input event and asks for a frame.
    ///
    /// Empty text input is dropped and requests nothing.
    ///
    /// # Errors
    ///
    /// Traps and memory violations during delivery.
    pub fn deliver(&mut self, event: &InputEvent) -> BridgeResult<Option<RequestOutcome>> {
        match self.translator.deliver(&mut self.guest, event)? {
            Some(_) => Ok(Some(self.scheduler.request_frame())),
            None => Ok(None),
        }
    }

    /// Asks for a frame without an event (resize, scale change, expose).
    pub fn request_frame(&mut self) -> RequestOutcome {
        self.scheduler.request_frame()
    }

    /// Runs one update cycle for a display refresh.
    ///
    /// # Errors
    ///
    /// Whatever the module's update raised; the scheduler is left idle.
    pub fn run_cycle(&mut self, now: Instant) -> BridgeResult<FrameDirective> {
        let solicited = self.scheduler.begin_refresh();
        if !solicited {
            debug!("unsolicited refresh");
        }
        match self.guest.update() {
            Ok(wait_ms) => Ok(self.scheduler.finish_frame(wait_ms, now)),
            Err(err) => {
                self.scheduler.abort_frame();
                Err(err)
            }
        }
    }

    /// Runs one update cycle whose drawing never reaches the screen.
    ///
    /// The module's wait value is not honoured: a refresh is queued so the
    /// next presentable frame shows the current state.
    ///
    /// # Errors
    ///
    /// Whatever the module's update raised; the scheduler is left idle.
    pub fn run_unpresented_cycle(&mut self, now: Instant) -> BridgeResult<FrameDirective> {
        self.run_cycle(now)?;
        self.scheduler.request_frame();
        debug!("frame not presented; refresh queued");
        Ok(FrameDirective::Continue)
    }

    /// Fires the deferred wake if it is due.
    pub fn fire_due(&mut self, now: Instant) -> WakeOutcome {
        self.scheduler.fire_due(now)
    }

    /// The module.
    pub fn guest(&self) -> &G {
        &self.guest
    }

    /// The module, mutably (for host state living alongside it).
    pub fn guest_mut(&mut self) -> &mut G {
        &mut self.guest
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Input delivery counters.
    pub fn translator_stats(&self) -> TranslatorStats {
        self.translator.stats()
    }
}
