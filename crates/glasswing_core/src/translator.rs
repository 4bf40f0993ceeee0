//! # Input Translator
//!
//! Delivers one [`InputEvent`] into the module:
//!
//! ```text
//! InputEvent ──> payload? ──yes──> arena_u8(len) ──> memory (re-derived) ──> copy bytes
//!                   │                                                          │
//!                   no                                                         │
//!                   └──────────────> encode slots <─────────────────────────────┘
//!                                        │
//!                                   add_event(...)
//! ```
//!
//! Scheduling the frame that consumes the event is the caller's job
//! ([`crate::session::Session::deliver`] does both).

use tracing::trace;

use crate::error::BridgeResult;
use crate::guest::GuestModule;
use crate::input::{EventKind, InputEvent, RawEvent};
use crate::memory::{self, Region};

/// Per-kind delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslatorStats {
    /// Events delivered, indexed by kind code minus one.
    pub delivered: [u64; 7],
    /// Bytes copied into module memory for payloads.
    pub payload_bytes: u64,
    /// Text events dropped because the text was empty.
    pub empty_text_dropped: u64,
}

impl TranslatorStats {
    /// Events delivered of `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> u64 {
        self.delivered[kind as usize - 1]
    }

    /// Events delivered in total.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.delivered.iter().sum()
    }
}

/// Turns host input into `add_event` calls.
#[derive(Debug, Default)]
pub struct InputTranslator {
    stats: TranslatorStats,
}

impl InputTranslator {
    /// Creates a translator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the event's payload (if any) into module memory and pushes
    /// the event.
    ///
    /// Returns the record that was pushed, or `None` for text input with
    /// empty text, which is never delivered.
    ///
    /// # Errors
    ///
    /// Traps inside the module and out-of-bounds allocations are fatal.
    pub fn deliver<G: GuestModule + ?Sized>(
        &mut self,
        guest: &mut G,
        event: &InputEvent,
    ) -> BridgeResult<Option<RawEvent>> {
        if matches!(event, InputEvent::TextInput { text } if text.is_empty()) {
            self.stats.empty_text_dropped += 1;
            return Ok(None);
        }

        let region = match event.payload() {
            Some(text) => self.write_payload(guest, text.as_bytes())?,
            None => Region::new(0, 0),
        };

        let raw = event.encode(region);
        trace!(kind = raw.kind, int1 = raw.int1, int2 = raw.int2, "push event");
        guest.push_event(raw)?;
        self.stats.delivered[event.kind() as usize - 1] += 1;
        Ok(Some(raw))
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> TranslatorStats {
        self.stats
    }

    fn write_payload<G: GuestModule + ?Sized>(
        &mut self,
        guest: &mut G,
        bytes: &[u8],
    ) -> BridgeResult<Region> {
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        let addr = guest.allocate_bytes(len)?;
        // Allocation may have grown memory; only now take the slice.
        memory::write_bytes(guest.memory_mut()?, addr, bytes)?;
        self.stats.payload_bytes += u64::from(len);
        Ok(Region::new(addr, len))
    }
}
