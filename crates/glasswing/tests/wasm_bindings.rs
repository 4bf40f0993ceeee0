//! Runs small WAT modules through the real wasmtime binding with a
//! recording draw target in place of the GPU.

use std::time::{Duration, Instant};

use glasswing::{HostError, WasmGuest};
use glasswing_core::batch::{ClipRect, ClipState, DrawBatch, RawGeometry, ScissorRect};
use glasswing_core::diagnostics;
use glasswing_core::memory::{self, Region};
use glasswing_core::mipmap;
use glasswing_core::{
    resolve_texture, BridgeError, BridgeResult, Diagnostic, DiagnosticReceiver, DiagnosticSender,
    DrawTarget, FrameDirective, GuestModule, InputEvent, Modifiers, ResourceTable, ScheduleState,
    Session, TextureHandle,
};
use wasmtime::Engine;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Clip(ClipRect),
    Clear(Option<ScissorRect>),
    Draw {
        texture: Option<TextureHandle>,
        indices: Vec<u32>,
        vertices: u32,
        scissor: Option<ScissorRect>,
    },
    Destroy(u32),
}

/// Draw target that records what a GPU backend would be asked to do,
/// using the same clip and texture resolution as the real renderer.
struct Recorder {
    calls: Vec<Call>,
    textures: ResourceTable<(u32, u32)>,
    clip: ClipState,
    reporter: DiagnosticSender,
    diagnostics: DiagnosticReceiver,
}

impl Recorder {
    fn new() -> Self {
        let (reporter, diagnostics) = diagnostics::channel(16);
        Self {
            calls: Vec::new(),
            textures: ResourceTable::new(),
            clip: ClipState::new(800, 600),
            reporter,
            diagnostics,
        }
    }
}

impl DrawTarget for Recorder {
    fn pixel_size(&self) -> (u32, u32) {
        (800, 600)
    }

    fn logical_size(&self) -> (f32, f32) {
        (400.0, 300.0)
    }

    fn set_clip(&mut self, clip: ClipRect) {
        self.clip.set(clip);
        self.calls.push(Call::Clip(clip));
    }

    fn clear(&mut self) -> BridgeResult<()> {
        self.calls.push(Call::Clear(self.clip.clear_scissor(800, 600)));
        Ok(())
    }

    fn render(&mut self, memory: &[u8], raw: &RawGeometry) -> BridgeResult<()> {
        let batch = DrawBatch::decode(memory, raw)?;
        self.calls.push(Call::Draw {
            texture: resolve_texture(&self.textures, batch.texture, &self.reporter),
            indices: batch.indices.to_vec(),
            vertices: batch.vertex_count(),
            scissor: self.clip.batch_scissor(batch.clip, 800, 600),
        });
        Ok(())
    }

    fn create_texture(
        &mut self,
        memory: &[u8],
        pixels_addr: u32,
        width: u32,
        height: u32,
    ) -> BridgeResult<TextureHandle> {
        let len = mipmap::texture_byte_len(width, height, 8192)?;
        memory::view_bytes(memory, Region::new(pixels_addr, len))?;
        self.textures
            .insert((width, height))
            .ok_or(BridgeError::HandlesExhausted)
    }

    fn destroy_texture(&mut self, raw: u32) {
        if let Some(handle) = TextureHandle::from_raw(raw) {
            self.textures.remove(handle);
        }
        self.calls.push(Call::Destroy(raw));
    }
}

/// Module with the standard exports: a bump allocator from 1024 and an
/// `add_event` that stores its last arguments at 256 and counts calls at 276.
fn module(imports: &str, init: &str, update: &str) -> String {
    format!(
        r#"(module
  {imports}
  (memory (export "memory") 1)
  (data (i32.const 16) "hello")
  (data (i32.const 32) "boom")
  (global $bump (mut i32) (i32.const 1024))
  (func (export "arena_u8") (param $len i32) (result i32)
    (local $addr i32)
    (local.set $addr (global.get $bump))
    (global.set $bump (i32.add (global.get $bump) (local.get $len)))
    (local.get $addr))
  (func (export "add_event") (param i32 i32 i32 f32 f32)
    (i32.store (i32.const 256) (local.get 0))
    (i32.store (i32.const 260) (local.get 1))
    (i32.store (i32.const 264) (local.get 2))
    (f32.store (i32.const 268) (local.get 3))
    (f32.store (i32.const 272) (local.get 4))
    (i32.store (i32.const 276) (i32.add (i32.load (i32.const 276)) (i32.const 1))))
  (func (export "app_init") {init})
  (func (export "app_update") (result i32) {update}))"#
    )
}

fn load(wat: &str) -> WasmGuest<Recorder> {
    WasmGuest::instantiate(&Engine::default(), wat.as_bytes(), Recorder::new())
        .expect("module instantiates")
}

fn read_u32(guest: &mut WasmGuest<Recorder>, addr: usize) -> u32 {
    let memory = guest.memory_mut().unwrap();
    u32::from_le_bytes(memory[addr..addr + 4].try_into().unwrap())
}

fn read_f32(guest: &mut WasmGuest<Recorder>, addr: usize) -> f32 {
    f32::from_bits(read_u32(guest, addr))
}

#[test]
fn test_log_lines_buffer_until_flush() {
    let wat = module(
        r#"(import "env" "wasm_log_write" (func $write (param i32 i32)))
           (import "env" "wasm_log_flush" (func $flush))"#,
        "(call $write (i32.const 16) (i32.const 5))",
        "(call $flush) (i32.const -1)",
    );
    let mut session = Session::new(load(&wat));
    session.start().unwrap();
    assert_eq!(session.guest().state().pending_log(), "hello");

    let directive = session.run_cycle(Instant::now()).unwrap();
    assert_eq!(directive, FrameDirective::Stop);
    assert_eq!(session.guest().state().pending_log(), "");
}

#[test]
fn test_panic_import_is_fatal_with_message() {
    let wat = module(
        r#"(import "env" "wasm_panic" (func $panic (param i32 i32)))"#,
        "",
        "(call $panic (i32.const 32) (i32.const 4)) (i32.const 0)",
    );
    let mut session = Session::new(load(&wat));
    session.start().unwrap();

    let err = session.run_cycle(Instant::now()).unwrap_err();
    assert_eq!(err, BridgeError::ModulePanic("boom".to_owned()));
    assert_eq!(session.scheduler().state(), ScheduleState::Idle);
}

#[test]
fn test_trap_names_the_export() {
    let wat = module("", "", "unreachable");
    let mut guest = load(&wat);
    match guest.update() {
        Err(BridgeError::Trap { export, .. }) => assert_eq!(export, "app_update"),
        other => panic!("expected a trap, got {other:?}"),
    }
}

#[test]
fn test_positive_wait_arms_a_wake() {
    let wat = module("", "", "(i32.const 250)");
    let mut session = Session::new(load(&wat));
    session.start().unwrap();

    let now = Instant::now();
    let directive = session.run_cycle(now).unwrap();
    assert_eq!(directive, FrameDirective::WakeAt(now + Duration::from_millis(250)));
    assert!(session.scheduler().timer_pending());
}

#[test]
fn test_i64_update_result_is_accepted() {
    let wat = r#"(module
  (memory (export "memory") 1)
  (func (export "arena_u8") (param i32) (result i32) (i32.const 1024))
  (func (export "add_event") (param i32 i32 i32 f32 f32))
  (func (export "app_init"))
  (func (export "app_update") (result i64) (i64.const 0)))"#;
    let mut guest = load(wat);
    assert_eq!(guest.update().unwrap(), 0);
}

#[test]
fn test_key_event_payload_lands_in_module_memory() {
    let wat = module("", "", "(i32.const 0)");
    let mut session = Session::new(load(&wat));
    session.start().unwrap();

    let event = InputEvent::KeyDown {
        code: "KeyA".to_owned(),
        repeat: true,
        modifiers: Modifiers {
            shift: true,
            alt: true,
            ..Modifiers::default()
        },
    };
    session.deliver(&event).unwrap();

    let guest = session.guest_mut();
    assert_eq!(read_u32(guest, 256), 5);
    let addr = read_u32(guest, 260) as usize;
    let len = read_u32(guest, 264) as usize;
    assert_eq!(addr, 1024);
    assert_eq!(len, 4);
    assert_eq!(read_f32(guest, 268), 1.0);
    assert_eq!(read_f32(guest, 272), 5.0);
    assert_eq!(&guest.memory_mut().unwrap()[addr..addr + len], b"KeyA");
}

#[test]
fn test_pointer_events_carry_floats() {
    let wat = module("", "", "(i32.const 0)");
    let mut session = Session::new(load(&wat));
    session.start().unwrap();

    session
        .deliver(&InputEvent::PointerMove { x: 12.5, y: 40.0 })
        .unwrap();
    let guest = session.guest_mut();
    assert_eq!(read_u32(guest, 256), 1);
    assert_eq!(read_f32(guest, 268), 12.5);
    assert_eq!(read_f32(guest, 272), 40.0);

    session.deliver(&InputEvent::PointerDown { button: 2 }).unwrap();
    let guest = session.guest_mut();
    assert_eq!(read_u32(guest, 256), 2);
    assert_eq!(read_u32(guest, 260), 2);

    session
        .deliver(&InputEvent::Scroll { delta_y: -120.0 })
        .unwrap();
    let guest = session.guest_mut();
    assert_eq!(read_u32(guest, 276), 3);
    assert_eq!(read_u32(guest, 256), 4);
    assert_eq!(read_f32(guest, 268), -120.0);
}

#[test]
fn test_canvas_queries_reach_the_target() {
    let wat = module(
        r#"(import "env" "wasm_pixel_width" (func $pw (result f32)))
           (import "env" "wasm_pixel_height" (func $ph (result f32)))
           (import "env" "wasm_canvas_width" (func $cw (result f32)))
           (import "env" "wasm_canvas_height" (func $ch (result f32)))"#,
        "",
        "(f32.store (i32.const 320) (call $pw))
         (f32.store (i32.const 324) (call $ph))
         (f32.store (i32.const 328) (call $cw))
         (f32.store (i32.const 332) (call $ch))
         (i32.const -1)",
    );
    let mut guest = load(&wat);
    guest.update().unwrap();
    assert_eq!(read_f32(&mut guest, 320), 800.0);
    assert_eq!(read_f32(&mut guest, 324), 600.0);
    assert_eq!(read_f32(&mut guest, 328), 400.0);
    assert_eq!(read_f32(&mut guest, 332), 300.0);
}

#[test]
fn test_scissor_and_clear_in_call_order() {
    let wat = module(
        r#"(import "env" "wasm_scissor" (func $scissor (param i32 i32 i32 i32)))
           (import "env" "wasm_clear" (func $clear))"#,
        "",
        "(call $scissor (i32.const 1) (i32.const 2) (i32.const 3) (i32.const 4))
         (call $clear)
         (i32.const -1)",
    );
    let mut guest = load(&wat);
    guest.update().unwrap();
    let clip = ClipRect::new(1, 2, 3, 4);
    assert_eq!(
        guest.state().target().calls,
        vec![Call::Clip(clip), Call::Clear(clip.to_scissor(800, 600))]
    );
}

const RENDER_IMPORT: &str = r#"(import "env" "wasm_renderGeometry"
    (func $render (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32 i32 i32 i32)))"#;

#[test]
fn test_render_geometry_decodes_module_buffers() {
    // Three u32 indices at 512, three 20-byte vertices at 600.
    let init = "(i32.store (i32.const 516) (i32.const 1))
                (i32.store (i32.const 520) (i32.const 2))";
    let update = "(call $render
                    (i32.const 0)
                    (i32.const 512) (i32.const 12)
                    (i32.const 600) (i32.const 60)
                    (i32.const 20) (i32.const 0) (i32.const 8) (i32.const 12)
                    (i32.const 0) (i32.const 0) (i32.const 800) (i32.const 600))
                  (i32.const -1)";
    let mut session = Session::new(load(&module(RENDER_IMPORT, init, update)));
    session.start().unwrap();
    session.run_cycle(Instant::now()).unwrap();

    assert_eq!(
        session.guest().state().target().calls,
        vec![Call::Draw {
            texture: None,
            indices: vec![0, 1, 2],
            vertices: 3,
            scissor: Some(ScissorRect {
                x: 0,
                y: 0,
                width: 800,
                height: 600,
            }),
        }]
    );
}

#[test]
fn test_batch_clip_does_not_change_clear_clip() {
    let imports = format!(
        r#"(import "env" "wasm_scissor" (func $scissor (param i32 i32 i32 i32)))
           (import "env" "wasm_clear" (func $clear))
           {RENDER_IMPORT}"#
    );
    let update = "(call $scissor (i32.const 0) (i32.const 0) (i32.const 100) (i32.const 100))
                  (call $render
                    (i32.const 0)
                    (i32.const 512) (i32.const 12)
                    (i32.const 600) (i32.const 60)
                    (i32.const 20) (i32.const 0) (i32.const 8) (i32.const 12)
                    (i32.const 400) (i32.const 300) (i32.const 50) (i32.const 50))
                  (call $clear)
                  (i32.const -1)";
    let mut guest = load(&module(&imports, "", update));
    guest.update().unwrap();

    let kept = ClipRect::new(0, 0, 100, 100);
    let batch = ClipRect::new(400, 300, 50, 50);
    let calls = &guest.state().target().calls;
    assert_eq!(calls.len(), 3);
    assert!(matches!(
        &calls[1],
        Call::Draw { scissor, .. } if *scissor == batch.to_scissor(800, 600)
    ));
    assert_eq!(calls[2], Call::Clear(kept.to_scissor(800, 600)));
    assert_ne!(kept.to_scissor(800, 600), batch.to_scissor(800, 600));
}

#[test]
fn test_draw_with_unknown_texture_falls_back_untextured() {
    let imports = format!(
        r#"(import "env" "wasm_textureCreate" (func $create (param i32 i32 i32) (result i32)))
           (import "env" "wasm_textureDestroy" (func $destroy (param i32)))
           {RENDER_IMPORT}"#
    );
    let draw = |texture: &str| {
        format!(
            "(call $render
               {texture}
               (i32.const 512) (i32.const 12)
               (i32.const 600) (i32.const 60)
               (i32.const 20) (i32.const 0) (i32.const 8) (i32.const 12)
               (i32.const 0) (i32.const 0) (i32.const 800) (i32.const 600))"
        )
    };
    // Texture 1 is live, texture 2 is destroyed, texture 9 never existed.
    let init = "(drop (call $create (i32.const 2048) (i32.const 1) (i32.const 1)))
                (call $destroy (call $create (i32.const 2048) (i32.const 1) (i32.const 1)))";
    let update = format!(
        "{} {} {} (i32.const -1)",
        draw("(i32.const 1)"),
        draw("(i32.const 2)"),
        draw("(i32.const 9)")
    );
    let mut session = Session::new(load(&module(&imports, init, &update)));
    session.start().unwrap();
    session.run_cycle(Instant::now()).unwrap();

    let target = session.guest().state().target();
    let textures: Vec<Option<u32>> = target
        .calls
        .iter()
        .filter_map(|call| match call {
            Call::Draw { texture, .. } => Some(texture.map(TextureHandle::raw)),
            _ => None,
        })
        .collect();
    assert_eq!(textures, vec![Some(1), None, None]);
    assert_eq!(
        target.diagnostics.drain(),
        vec![
            Diagnostic::UnknownTextureOnDraw { handle: 2 },
            Diagnostic::UnknownTextureOnDraw { handle: 9 },
        ]
    );
}

#[test]
fn test_render_outside_memory_is_fatal() {
    let update = "(call $render
                    (i32.const 0)
                    (i32.const 65532) (i32.const 12)
                    (i32.const 600) (i32.const 60)
                    (i32.const 20) (i32.const 0) (i32.const 8) (i32.const 12)
                    (i32.const 0) (i32.const 0) (i32.const 800) (i32.const 600))
                  (i32.const 0)";
    let mut session = Session::new(load(&module(RENDER_IMPORT, "", update)));
    session.start().unwrap();

    let err = session.run_cycle(Instant::now()).unwrap_err();
    assert!(matches!(err, BridgeError::OutOfBounds { addr: 65532, len: 12, .. }));
    assert!(session.guest().state().target().calls.is_empty());
}

#[test]
fn test_texture_create_and_destroy_round_trip_handles() {
    let wat = module(
        r#"(import "env" "wasm_textureCreate" (func $create (param i32 i32 i32) (result i32)))
           (import "env" "wasm_textureDestroy" (func $destroy (param i32)))"#,
        "(i32.store (i32.const 300) (call $create (i32.const 2048) (i32.const 2) (i32.const 2)))",
        "(call $destroy (i32.load (i32.const 300)))
         (call $destroy (i32.const 77))
         (i32.const -1)",
    );
    let mut session = Session::new(load(&wat));
    session.start().unwrap();
    assert_eq!(read_u32(session.guest_mut(), 300), 1);
    assert_eq!(session.guest().state().target().textures.len(), 1);

    session.run_cycle(Instant::now()).unwrap();
    let target = session.guest().state().target();
    assert!(target.textures.is_empty());
    assert_eq!(target.calls, vec![Call::Destroy(1), Call::Destroy(77)]);
}

#[test]
fn test_zero_sized_texture_is_fatal() {
    let wat = module(
        r#"(import "env" "wasm_textureCreate" (func $create (param i32 i32 i32) (result i32)))"#,
        "(drop (call $create (i32.const 0) (i32.const 0) (i32.const 4)))",
        "(i32.const 0)",
    );
    let mut session = Session::new(load(&wat));
    assert!(matches!(
        session.start(),
        Err(BridgeError::InvalidTexture { width: 0, height: 4, .. })
    ));
}

#[test]
fn test_undeclared_import_only_traps_when_called() {
    let wat = module(
        r#"(import "env" "wasm_mystery" (func $mystery))"#,
        "",
        "(i32.const 0)",
    );
    let mut guest = load(&wat);
    assert_eq!(guest.update().unwrap(), 0);
}

#[test]
fn test_missing_export_is_reported_by_name() {
    let wat = r#"(module
  (memory (export "memory") 1)
  (func (export "add_event") (param i32 i32 i32 f32 f32))
  (func (export "app_init"))
  (func (export "app_update") (result i32) (i32.const 0)))"#;
    let err = WasmGuest::instantiate(&Engine::default(), wat.as_bytes(), Recorder::new())
        .err()
        .expect("instantiation fails");
    assert!(matches!(
        err,
        HostError::Bridge(BridgeError::MissingExport("arena_u8"))
    ));
}

#[test]
fn test_garbage_bytes_do_not_load() {
    let err = WasmGuest::instantiate(&Engine::default(), b"not a module", Recorder::new())
        .err()
        .expect("compilation fails");
    assert!(matches!(err, HostError::Module(_)));
}
