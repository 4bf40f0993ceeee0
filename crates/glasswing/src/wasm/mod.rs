//! # wasmtime Binding
//!
//! [`WasmGuest`] runs a compiled module and implements
//! [`GuestModule`] for the session. The module's drawing imports land on a
//! [`DrawTarget`] owned by the store, so they run synchronously inside the
//! module's own calls.
//!
//! ## Fatal errors inside imports
//!
//! An import that hits a [`BridgeError`] records it in [`HostState`] and
//! traps. When the module call returns, the recorded error wins over the
//! trap message, so the driver sees the real cause.

mod imports;

use std::time::Instant;

use glasswing_core::guest::abi;
use glasswing_core::{BridgeError, BridgeResult, DrawTarget, GuestModule, RawEvent};
use tracing::{debug, info, warn};
use wasmtime::{Engine, Func, Linker, Memory, Module, Store, TypedFunc, Val};

use crate::error::{HostError, HostResult};
use crate::logging::GUEST_TARGET;

/// Per-store state visible to every import.
pub struct HostState<T> {
    target: T,
    log_line: String,
    fatal: Option<BridgeError>,
    started: Instant,
}

impl<T> HostState<T> {
    /// Wraps the draw target.
    pub fn new(target: T) -> Self {
        Self {
            target,
            log_line: String::new(),
            fatal: None,
            started: Instant::now(),
        }
    }

    /// The draw target.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The draw target, mutably.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Text written by the module and not yet flushed.
    pub fn pending_log(&self) -> &str {
        &self.log_line
    }

    /// Records a fatal error (the first one sticks) and returns the trap
    /// the import should raise.
    fn fail(&mut self, err: BridgeError) -> anyhow::Error {
        let trap = anyhow::Error::new(err.clone());
        self.fatal.get_or_insert(err);
        trap
    }

    fn take_fatal(&mut self) -> Option<BridgeError> {
        self.fatal.take()
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn flush_log(&mut self) {
        if !self.log_line.is_empty() {
            info!(target: GUEST_TARGET, "{}", self.log_line);
            self.log_line.clear();
        }
    }
}

/// A module instance.
pub struct WasmGuest<T: 'static> {
    store: Store<HostState<T>>,
    memory: Memory,
    init: Func,
    update: Func,
    add_event: Func,
    alloc_bytes: TypedFunc<u32, u32>,
}

impl<T: DrawTarget + 'static> WasmGuest<T> {
    /// Compiles, links and instantiates `wasm`.
    ///
    /// Imports outside the host's set are linked as traps, so a module that
    /// declares but never calls them still runs.
    ///
    /// # Errors
    ///
    /// [`HostError::Module`] for compile, link and start failures;
    /// [`BridgeError::MissingExport`] for a missing required export.
    pub fn instantiate(engine: &Engine, wasm: &[u8], target: T) -> HostResult<Self> {
        let module = Module::new(engine, wasm).map_err(|err| HostError::Module(format!("{err:#}")))?;

        for import in module.imports() {
            if import.module() != abi::IMPORT_MODULE || !abi::IMPORTS.contains(&import.name()) {
                warn!(
                    module = import.module(),
                    name = import.name(),
                    "import not provided by the host; calling it traps"
                );
            }
        }

        let mut linker = Linker::new(engine);
        imports::register(&mut linker)
            .and_then(|()| linker.define_unknown_imports_as_traps(&module))
            .map_err(|err| HostError::Module(format!("{err:#}")))?;

        let mut store = Store::new(engine, HostState::new(target));
        let instance = match linker.instantiate(&mut store, &module) {
            Ok(instance) => instance,
            Err(err) => {
                return Err(match store.data_mut().take_fatal() {
                    Some(fatal) => HostError::Bridge(fatal),
                    None => HostError::Module(format!("{err:#}")),
                });
            }
        };

        let memory = instance
            .get_memory(&mut store, abi::MEMORY)
            .ok_or(BridgeError::MissingExport(abi::MEMORY))?;
        let mut export = |name: &'static str| {
            instance
                .get_func(&mut store, name)
                .ok_or(BridgeError::MissingExport(name))
        };
        let init = export(abi::INIT)?;
        let update = export(abi::UPDATE)?;
        let add_event = export(abi::ADD_EVENT)?;
        let alloc_bytes = instance
            .get_typed_func::<u32, u32>(&mut store, abi::ALLOC_BYTES)
            .map_err(|_| BridgeError::MissingExport(abi::ALLOC_BYTES))?;

        debug!(
            memory_bytes = memory.data_size(&store),
            "module instantiated"
        );
        Ok(Self {
            store,
            memory,
            init,
            update,
            add_event,
            alloc_bytes,
        })
    }

    /// Host state of the store.
    pub fn state(&self) -> &HostState<T> {
        self.store.data()
    }

    /// Host state of the store, mutably.
    pub fn state_mut(&mut self) -> &mut HostState<T> {
        self.store.data_mut()
    }

    /// Calls an untyped export, sizing the result buffer from its type.
    fn call(&mut self, export: &'static str, func: Func, params: &[Val]) -> BridgeResult<Vec<Val>> {
        let mut results = vec![Val::I32(0); func.ty(&self.store).results().len()];
        match func.call(&mut self.store, params, &mut results) {
            Ok(()) => Ok(results),
            Err(err) => Err(self.fault(export, &err)),
        }
    }

    fn fault(&mut self, export: &'static str, err: &anyhow::Error) -> BridgeError {
        if let Some(fatal) = self.store.data_mut().take_fatal() {
            return fatal;
        }
        if let Some(bridge) = err.downcast_ref::<BridgeError>() {
            return bridge.clone();
        }
        BridgeError::Trap {
            export,
            message: format!("{err:#}"),
        }
    }
}

impl<T: DrawTarget + 'static> GuestModule for WasmGuest<T> {
    fn init(&mut self) -> BridgeResult<()> {
        self.call(abi::INIT, self.init, &[])?;
        Ok(())
    }

    fn update(&mut self) -> BridgeResult<i64> {
        let results = self.call(abi::UPDATE, self.update, &[])?;
        wait_value(results.first())
    }

    fn push_event(&mut self, event: RawEvent) -> BridgeResult<()> {
        let params = [
            Val::I32(event.kind as i32),
            Val::I32(event.int1 as i32),
            Val::I32(event.int2 as i32),
            Val::from(event.float1),
            Val::from(event.float2),
        ];
        self.call(abi::ADD_EVENT, self.add_event, &params)?;
        Ok(())
    }

    fn allocate_bytes(&mut self, len: u32) -> BridgeResult<u32> {
        match self.alloc_bytes.call(&mut self.store, len) {
            Ok(addr) => Ok(addr),
            Err(err) => Err(self.fault(abi::ALLOC_BYTES, &err)),
        }
    }

    fn memory_mut(&mut self) -> BridgeResult<&mut [u8]> {
        Ok(self.memory.data_mut(&mut self.store))
    }
}

/// Reads the update result as a wait value.
///
/// No result means stop. Float results are rounded away from zero, so any
/// positive wait stays a deferral; NaN stops.
fn wait_value(result: Option<&Val>) -> BridgeResult<i64> {
    match result {
        None => Ok(-1),
        Some(Val::I32(value)) => Ok(i64::from(*value)),
        Some(Val::I64(value)) => Ok(*value),
        Some(Val::F32(bits)) => Ok(float_wait(f64::from(f32::from_bits(*bits)))),
        Some(Val::F64(bits)) => Ok(float_wait(f64::from_bits(*bits))),
        Some(_) => Err(BridgeError::Trap {
            export: abi::UPDATE,
            message: "update returned a non-numeric value".to_owned(),
        }),
    }
}

fn float_wait(value: f64) -> i64 {
    if value == 0.0 {
        0
    } else if value > 0.0 {
        value.ceil() as i64
    } else {
        -1
    }
}
