//! # Diagnostics Channel
//!
//! Recoverable anomalies that should be visible but must not stop the
//! session. Producers (renderer, resource table, module binding) hold a
//! [`DiagnosticSender`]; the driver drains a [`DiagnosticReceiver`] once per
//! frame and logs what it finds.
//!
//! ```text
//! ┌──────────┐                    ┌──────────┐
//! │ Renderer │──┐                 │          │
//! └──────────┘  │   bounded chan  │  Driver  │──> tracing::warn!
//! ┌──────────┐  ├────────────────>│ (drain)  │
//! │ Bindings │──┘                 │          │
//! └──────────┘                    └──────────┘
//! ```

use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Default number of diagnostics buffered between drains.
pub const DEFAULT_CAPACITY: usize = 256;

/// A recoverable anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A draw named a texture that is not alive; drawn untextured instead.
    UnknownTextureOnDraw {
        /// The raw handle the module passed.
        handle: u32,
    },
    /// A destroy named a texture that is not alive; ignored.
    UnknownTextureOnDestroy {
        /// The raw handle the module passed.
        handle: u32,
    },
    /// A deferred wake fired after it had been replaced or cancelled.
    StaleTimer,
    /// No surface texture could be had this frame; the frame was dropped.
    FrameSkipped {
        /// Why the frame was dropped.
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTextureOnDraw { handle } => {
                write!(f, "draw referenced unknown texture {handle}; drawn untextured")
            }
            Self::UnknownTextureOnDestroy { handle } => {
                write!(f, "destroy of unknown texture {handle} ignored")
            }
            Self::StaleTimer => f.write_str("stale deferred wake ignored"),
            Self::FrameSkipped { reason } => write!(f, "frame skipped: {reason}"),
        }
    }
}

/// Creates a connected sender/receiver pair.
#[must_use]
pub fn channel(capacity: usize) -> (DiagnosticSender, DiagnosticReceiver) {
    let (sender, receiver) = bounded(capacity);
    (DiagnosticSender { sender }, DiagnosticReceiver { receiver })
}

/// Producer handle.
#[derive(Debug, Clone)]
pub struct DiagnosticSender {
    sender: Sender<Diagnostic>,
}

impl DiagnosticSender {
    /// Reports a diagnostic without blocking.
    ///
    /// Returns `false` when the buffer is full or nobody is listening; the
    /// diagnostic is dropped in that case.
    #[inline]
    pub fn report(&self, diagnostic: Diagnostic) -> bool {
        match self.sender.try_send(diagnostic) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer handle.
#[derive(Debug, Clone)]
pub struct DiagnosticReceiver {
    receiver: Receiver<Diagnostic>,
}

impl DiagnosticReceiver {
    /// Takes every pending diagnostic.
    #[must_use]
    pub fn drain(&self) -> Vec<Diagnostic> {
        self.receiver.try_iter().collect()
    }
}
