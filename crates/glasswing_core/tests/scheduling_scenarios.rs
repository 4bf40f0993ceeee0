//! Integration tests for frame scheduling and event delivery, driven
//! through a scripted in-memory module.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use glasswing_core::memory::{self, Region};
use glasswing_core::{
    BridgeError, BridgeResult, EventKind, FrameDirective, GuestModule, InputEvent, Modifiers,
    RawEvent, ScheduleState, Session, WakeOutcome,
};

/// What the mock module saw, in order.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Init,
    Event { kind: u32, payload: Option<String> },
    Update,
}

/// A module that bump-allocates payloads, records every call and returns
/// scripted wait values from `app_update` (0 once the script runs out).
struct MockGuest {
    memory: Vec<u8>,
    next_alloc: u32,
    grow_on_alloc: bool,
    script: VecDeque<i64>,
    fail_update: bool,
    calls: Vec<Call>,
}

impl MockGuest {
    fn new(script: &[i64]) -> Self {
        Self {
            memory: vec![0; 1024],
            next_alloc: 256,
            grow_on_alloc: false,
            script: script.iter().copied().collect(),
            fail_update: false,
            calls: Vec::new(),
        }
    }

    fn updates(&self) -> usize {
        self.calls.iter().filter(|c| **c == Call::Update).count()
    }

    fn event_kinds(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Event { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

impl GuestModule for MockGuest {
    fn init(&mut self) -> BridgeResult<()> {
        self.calls.push(Call::Init);
        Ok(())
    }

    fn update(&mut self) -> BridgeResult<i64> {
        self.calls.push(Call::Update);
        if self.fail_update {
            return Err(BridgeError::ModulePanic("scripted failure".into()));
        }
        Ok(self.script.pop_front().unwrap_or(0))
    }

    fn push_event(&mut self, event: RawEvent) -> BridgeResult<()> {
        let payload = match EventKind::from_code(event.kind) {
            Some(EventKind::KeyDown | EventKind::KeyUp | EventKind::TextInput) => Some(
                memory::read_utf8(&self.memory, Region::new(event.int1, event.int2))?,
            ),
            _ => None,
        };
        self.calls.push(Call::Event {
            kind: event.kind,
            payload,
        });
        Ok(())
    }

    fn allocate_bytes(&mut self, len: u32) -> BridgeResult<u32> {
        if self.grow_on_alloc {
            // Growth hands back a different buffer, as a real grow may.
            let mut grown = vec![0; self.memory.len() * 2];
            grown[..self.memory.len()].copy_from_slice(&self.memory);
            self.memory = grown;
        }
        let addr = self.next_alloc;
        self.next_alloc += len.max(1);
        Ok(addr)
    }

    fn memory_mut(&mut self) -> BridgeResult<&mut [u8]> {
        Ok(&mut self.memory)
    }
}

fn started(script: &[i64]) -> Session<MockGuest> {
    let mut session = Session::new(MockGuest::new(script));
    session.start().unwrap();
    session
}

/// Runs the refresh callback if (and only if) one is queued.
fn display_refresh(session: &mut Session<MockGuest>, now: Instant) -> Option<FrameDirective> {
    if session.scheduler().refresh_pending() {
        Some(session.run_cycle(now).unwrap())
    } else {
        None
    }
}

fn pointer_move(x: f32, y: f32) -> InputEvent {
    InputEvent::PointerMove { x, y }
}

#[test]
fn test_start_calls_init_and_queues_first_frame() {
    let session = started(&[]);
    assert_eq!(session.guest().calls, vec![Call::Init]);
    assert_eq!(session.scheduler().state(), ScheduleState::Requested);
}

#[test]
fn test_burst_of_requests_runs_one_cycle() {
    let mut session = started(&[-1]);
    for i in 0..10 {
        session.deliver(&pointer_move(i as f32, 0.0)).unwrap();
        session.request_frame();
    }

    let now = Instant::now();
    assert_eq!(display_refresh(&mut session, now), Some(FrameDirective::Stop));
    assert_eq!(display_refresh(&mut session, now), None);
    assert_eq!(session.guest().updates(), 1);
    assert!(session.scheduler().stats().requests_coalesced >= 19);
}

#[test]
fn test_resize_then_two_moves_gives_one_update_after_events() {
    let mut session = started(&[-1]);

    // Resize carries no event record; it only asks for a frame.
    session.request_frame();
    session.deliver(&pointer_move(1.0, 2.0)).unwrap();
    session.deliver(&pointer_move(3.0, 4.0)).unwrap();
    display_refresh(&mut session, Instant::now());

    assert_eq!(
        session.guest().calls[1..],
        [
            Call::Event { kind: 1, payload: None },
            Call::Event { kind: 1, payload: None },
            Call::Update,
        ]
    );
}

#[test]
fn test_three_pushes_in_one_interval_precede_single_update() {
    let mut session = started(&[-1]);
    session.deliver(&InputEvent::PointerDown { button: 0 }).unwrap();
    session.deliver(&pointer_move(5.0, 5.0)).unwrap();
    session.deliver(&pointer_move(6.0, 5.0)).unwrap();
    display_refresh(&mut session, Instant::now());

    assert_eq!(session.guest().event_kinds(), vec![2, 1, 1]);
    assert_eq!(session.guest().calls.last(), Some(&Call::Update));
    assert_eq!(session.guest().updates(), 1);
}

#[test]
fn test_zero_wait_three_times_never_arms_timer() {
    let mut session = started(&[0, 0, 0, -1]);
    let now = Instant::now();

    for _ in 0..3 {
        assert_eq!(display_refresh(&mut session, now), Some(FrameDirective::Continue));
        assert!(!session.scheduler().timer_pending());
    }
    assert_eq!(session.guest().updates(), 3);
    assert_eq!(session.scheduler().stats().timers_armed, 0);
    assert_eq!(display_refresh(&mut session, now), Some(FrameDirective::Stop));
}

#[test]
fn test_pointer_down_cancels_pending_wake() {
    let mut session = started(&[16, -1]);
    let now = Instant::now();

    let directive = display_refresh(&mut session, now).unwrap();
    assert_eq!(directive, FrameDirective::WakeAt(now + Duration::from_millis(16)));
    assert!(session.scheduler().timer_pending());

    let outcome = session
        .deliver(&InputEvent::PointerDown { button: 0 })
        .unwrap()
        .unwrap();
    assert!(outcome.cancelled_timer.is_some());
    assert!(outcome.queued_refresh);
    assert!(!session.scheduler().timer_pending());
    assert!(session.scheduler().refresh_pending());

    // The cancelled wake's deadline passing changes nothing.
    assert_eq!(
        session.fire_due(now + Duration::from_millis(20)),
        WakeOutcome::Stale
    );
    display_refresh(&mut session, now);
    assert_eq!(session.guest().updates(), 2);
}

#[test]
fn test_wake_fires_into_refresh() {
    let mut session = started(&[30, -1]);
    let now = Instant::now();
    display_refresh(&mut session, now);

    let deadline = now + Duration::from_millis(30);
    assert_eq!(
        session.fire_due(now + Duration::from_millis(29)),
        WakeOutcome::NotDue(deadline)
    );
    assert_eq!(display_refresh(&mut session, now), None);

    let WakeOutcome::Fired(outcome) = session.fire_due(deadline) else {
        panic!("expected the wake to fire");
    };
    assert!(outcome.queued_refresh);
    display_refresh(&mut session, now);
    assert_eq!(session.guest().updates(), 2);
}

#[test]
fn test_negative_wait_stops_until_next_input() {
    let mut session = started(&[-1, -1]);
    let now = Instant::now();
    assert_eq!(display_refresh(&mut session, now), Some(FrameDirective::Stop));

    for _ in 0..5 {
        assert_eq!(display_refresh(&mut session, now), None);
        assert_eq!(
            session.fire_due(now + Duration::from_secs(60)),
            WakeOutcome::Stale
        );
    }
    assert_eq!(session.scheduler().state(), ScheduleState::Idle);
    assert_eq!(session.guest().updates(), 1);

    session.deliver(&InputEvent::Scroll { delta_y: 100.0 }).unwrap();
    display_refresh(&mut session, now);
    assert_eq!(session.guest().updates(), 2);
}

#[test]
fn test_unpresented_cycle_queues_another_refresh() {
    let mut session = started(&[-1, 40]);
    let now = Instant::now();

    // The module asks to stop, but its frame was never shown.
    let directive = session.run_unpresented_cycle(now).unwrap();
    assert_eq!(directive, FrameDirective::Continue);
    assert_eq!(session.scheduler().state(), ScheduleState::Requested);
    assert_eq!(session.guest().updates(), 1);

    // A presented cycle honours the wait value again.
    assert_eq!(
        display_refresh(&mut session, now),
        Some(FrameDirective::WakeAt(now + Duration::from_millis(40)))
    );
    assert_eq!(session.guest().updates(), 2);
}

#[test]
fn test_failed_unpresented_cycle_leaves_scheduler_idle() {
    let mut session = started(&[]);
    session.guest_mut().fail_update = true;
    assert!(session.run_unpresented_cycle(Instant::now()).is_err());
    assert_eq!(session.scheduler().state(), ScheduleState::Idle);
}

#[test]
fn test_failed_update_leaves_scheduler_idle() {
    let mut session = started(&[]);
    session.guest_mut().fail_update = true;
    let err = session.run_cycle(Instant::now()).unwrap_err();
    assert!(matches!(err, BridgeError::ModulePanic(_)));
    assert_eq!(session.scheduler().state(), ScheduleState::Idle);
}

#[test]
fn test_events_arrive_in_generation_order_across_kinds() {
    let mut session = started(&[]);
    let events = [
        pointer_move(1.0, 1.0),
        InputEvent::KeyDown {
            code: "KeyA".into(),
            repeat: false,
            modifiers: Modifiers::default(),
        },
        InputEvent::TextInput { text: "a".into() },
        InputEvent::PointerDown { button: 2 },
        InputEvent::KeyUp {
            code: "KeyA".into(),
            modifiers: Modifiers::default(),
        },
        InputEvent::Scroll { delta_y: -3.0 },
        InputEvent::PointerUp { button: 2 },
    ];
    for event in &events {
        session.deliver(event).unwrap();
    }

    assert_eq!(session.guest().event_kinds(), vec![1, 5, 7, 2, 6, 4, 3]);
    let payloads: Vec<_> = session
        .guest()
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::Event { payload: Some(p), .. } => Some(p.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(payloads, vec!["KeyA", "a", "KeyA"]);
    assert_eq!(session.translator_stats().total(), 7);
}

#[test]
fn test_payload_written_after_memory_growth() {
    let mut session = started(&[]);
    session.guest_mut().grow_on_alloc = true;
    session
        .deliver(&InputEvent::TextInput {
            text: "héllo".into(),
        })
        .unwrap();

    let guest = session.guest();
    assert_eq!(guest.memory.len(), 2048);
    assert_eq!(
        guest.calls.last(),
        Some(&Call::Event {
            kind: 7,
            payload: Some("héllo".into())
        })
    );
}

#[test]
fn test_empty_text_is_not_delivered() {
    let mut session = started(&[-1]);
    display_refresh(&mut session, Instant::now());

    let outcome = session
        .deliver(&InputEvent::TextInput { text: String::new() })
        .unwrap();
    assert!(outcome.is_none());
    assert!(session.guest().event_kinds().is_empty());
    assert_eq!(session.scheduler().state(), ScheduleState::Idle);
}

#[test]
fn test_allocation_outside_memory_is_fatal() {
    let mut session = started(&[]);
    session.guest_mut().next_alloc = 1022;
    let err = session
        .deliver(&InputEvent::KeyDown {
            code: "Enter".into(),
            repeat: false,
            modifiers: Modifiers::default(),
        })
        .unwrap_err();
    assert!(matches!(err, BridgeError::OutOfBounds { addr: 1022, len: 5, .. }));
    assert!(session.guest().event_kinds().is_empty());
}
