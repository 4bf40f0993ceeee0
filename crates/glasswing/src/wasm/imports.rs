//! The `env.*` functions a module imports.
//!
//! Memory is looked up again inside every import: the module may have grown
//! it since the last call.

use anyhow::Result;
use glasswing_core::batch::{ClipRect, RawGeometry, VertexLayout};
use glasswing_core::guest::abi;
use glasswing_core::memory::{self, Region};
use glasswing_core::{BridgeError, DrawTarget};
use tracing::{error, trace};
use wasmtime::{Caller, Extern, Linker, Memory};

use super::HostState;

/// Registers every host import on `linker`.
///
/// # Errors
///
/// A name is registered twice.
pub fn register<T: DrawTarget + 'static>(linker: &mut Linker<HostState<T>>) -> Result<()> {
    register_runtime(linker)?;
    register_canvas(linker)?;
    register_textures(linker)?;
    register_geometry(linker)?;
    Ok(())
}

fn register_runtime<T: DrawTarget + 'static>(linker: &mut Linker<HostState<T>>) -> Result<()> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::PANIC,
        |mut caller: Caller<'_, HostState<T>>, addr: u32, len: u32| -> Result<()> {
            let message = read_text(&mut caller, addr, len)?;
            error!(%message, "module panic");
            Err(caller.data_mut().fail(BridgeError::ModulePanic(message)))
        },
    )?;

    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::LOG_WRITE,
        |mut caller: Caller<'_, HostState<T>>, addr: u32, len: u32| -> Result<()> {
            let text = read_text(&mut caller, addr, len)?;
            caller.data_mut().log_line.push_str(&text);
            Ok(())
        },
    )?;

    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::LOG_FLUSH,
        |mut caller: Caller<'_, HostState<T>>| {
            caller.data_mut().flush_log();
        },
    )?;

    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::NOW,
        |caller: Caller<'_, HostState<T>>| -> f64 { caller.data().elapsed_ms() },
    )?;

    // Modules call this from idle loops that only make sense on a blocking
    // host; the scheduler already covers waiting.
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::SLEEP,
        |_caller: Caller<'_, HostState<T>>, ms: u32| {
            trace!(ms, "sleep ignored");
        },
    )?;

    Ok(())
}

fn register_canvas<T: DrawTarget + 'static>(linker: &mut Linker<HostState<T>>) -> Result<()> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::PIXEL_WIDTH,
        |caller: Caller<'_, HostState<T>>| -> f32 { caller.data().target.pixel_size().0 as f32 },
    )?;
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::PIXEL_HEIGHT,
        |caller: Caller<'_, HostState<T>>| -> f32 { caller.data().target.pixel_size().1 as f32 },
    )?;
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::CANVAS_WIDTH,
        |caller: Caller<'_, HostState<T>>| -> f32 { caller.data().target.logical_size().0 },
    )?;
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::CANVAS_HEIGHT,
        |caller: Caller<'_, HostState<T>>| -> f32 { caller.data().target.logical_size().1 },
    )?;

    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::SCISSOR,
        |mut caller: Caller<'_, HostState<T>>, x: i32, y: i32, w: i32, h: i32| {
            caller.data_mut().target.set_clip(ClipRect::new(x, y, w, h));
        },
    )?;

    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::CLEAR,
        |mut caller: Caller<'_, HostState<T>>| -> Result<()> {
            let state = caller.data_mut();
            state.target.clear().map_err(|err| state.fail(err))
        },
    )?;

    Ok(())
}

fn register_textures<T: DrawTarget + 'static>(linker: &mut Linker<HostState<T>>) -> Result<()> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::TEXTURE_CREATE,
        |mut caller: Caller<'_, HostState<T>>, addr: u32, width: u32, height: u32| -> Result<u32> {
            let memory = module_memory(&mut caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            match state.target.create_texture(data, addr, width, height) {
                Ok(handle) => Ok(handle.raw()),
                Err(err) => Err(state.fail(err)),
            }
        },
    )?;

    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::TEXTURE_DESTROY,
        |mut caller: Caller<'_, HostState<T>>, handle: u32| {
            caller.data_mut().target.destroy_texture(handle);
        },
    )?;

    Ok(())
}

fn register_geometry<T: DrawTarget + 'static>(linker: &mut Linker<HostState<T>>) -> Result<()> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::RENDER_GEOMETRY,
        |mut caller: Caller<'_, HostState<T>>,
         texture: u32,
         index_addr: u32,
         index_len: u32,
         vertex_addr: u32,
         vertex_len: u32,
         stride: u32,
         pos: u32,
         col: u32,
         uv: u32,
         x: i32,
         y: i32,
         w: i32,
         h: i32|
         -> Result<()> {
            let raw = RawGeometry {
                texture,
                index_addr,
                index_len,
                vertex_addr,
                vertex_len,
                layout: VertexLayout {
                    stride,
                    pos,
                    col,
                    uv,
                },
                clip: ClipRect::new(x, y, w, h),
            };
            let memory = module_memory(&mut caller)?;
            let (data, state) = memory.data_and_store_mut(&mut caller);
            state.target.render(data, &raw).map_err(|err| state.fail(err))
        },
    )?;

    Ok(())
}

fn module_memory<T>(caller: &mut Caller<'_, HostState<T>>) -> Result<Memory> {
    match caller.get_export(abi::MEMORY) {
        Some(Extern::Memory(memory)) => Ok(memory),
        _ => Err(caller
            .data_mut()
            .fail(BridgeError::MissingExport(abi::MEMORY))),
    }
}

fn read_text<T>(caller: &mut Caller<'_, HostState<T>>, addr: u32, len: u32) -> Result<String> {
    let memory = module_memory(caller)?;
    let (data, state) = memory.data_and_store_mut(caller);
    memory::read_utf8(data, Region::new(addr, len)).map_err(|err| state.fail(err))
}
