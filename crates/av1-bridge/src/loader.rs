//! Module loading and instantiation.
//!
//! Turns a configured byte source into a linked, instantiated guest module
//! with the stub environment and guest memory wired in as imports. Any
//! compilation or link failure propagates to the caller; there is no retry.

use wasmtime::{
    Config, Engine, Global, GlobalType, Instance, Linker, Module, Mutability, OptLevel, Store,
    Val, ValType,
};

use crate::config::{BridgeConfig, ModuleSource};
use crate::error::{BridgeError, Result};
use crate::memory::GuestMemory;
use crate::stubs;

/// Host state carried by the store.
#[derive(Debug, Default)]
pub struct HostState {
    /// Number of times the guest invoked any threading stub. Expected to
    /// stay 0 for a correctly built single-threaded guest.
    pub(crate) thread_stub_calls: u64,
}

/// A fully linked guest module, ready to be driven by a decoder session.
pub(crate) struct LoadedGuest {
    pub store: Store<HostState>,
    pub instance: Instance,
    pub memory: GuestMemory,
}

/// Compile, link and instantiate the configured guest module.
pub(crate) fn instantiate(config: &BridgeConfig) -> Result<LoadedGuest> {
    config.layout.validate()?;
    let source = config.source()?;

    let engine = build_engine(config)?;

    let module = match &source {
        ModuleSource::Bytes(bytes) => Module::new(&engine, bytes),
        // from_file maps the artifact instead of buffering it first
        ModuleSource::Path(path) => Module::from_file(&engine, path),
    }
    .map_err(|e| BridgeError::Instantiate(format!("module compilation failed: {e}")))?;

    let mut store = Store::new(&engine, HostState::default());
    let memory = GuestMemory::new(&mut store, &config.layout)?;

    let mut linker: Linker<HostState> = Linker::new(&engine);
    linker
        .define(&store, "env", "memory", memory.memory())
        .map_err(|e| BridgeError::Instantiate(format!("failed to define memory: {e}")))?;
    linker
        .define(&store, "env", "table", memory.table())
        .map_err(|e| BridgeError::Instantiate(format!("failed to define table: {e}")))?;

    let globals = [
        ("__memory_base", config.layout.memory_base),
        ("__table_base", config.layout.table_base),
        ("DYNAMICTOP_PTR", config.layout.dynamic_top_ptr),
    ];
    for (name, value) in globals {
        let global = Global::new(
            &mut store,
            GlobalType::new(ValType::I32, Mutability::Const),
            Val::I32(value as i32),
        )
        .map_err(|e| BridgeError::Instantiate(format!("failed to create {name}: {e}")))?;
        linker
            .define(&store, "env", name, global)
            .map_err(|e| BridgeError::Instantiate(format!("failed to define {name}: {e}")))?;
    }

    stubs::register(&mut linker, memory.memory(), &config.layout)?;

    let instance = linker
        .instantiate(&mut store, &module)
        .map_err(|e| BridgeError::Instantiate(format!("instantiation failed: {e}")))?;

    tracing::debug!(
        memory_pages = config.layout.memory_pages(),
        table_size = config.layout.table_size,
        "guest module instantiated"
    );

    Ok(LoadedGuest {
        store,
        instance,
        memory,
    })
}

fn build_engine(config: &BridgeConfig) -> Result<Engine> {
    let mut engine_config = Config::new();
    engine_config.cranelift_opt_level(match config.optimization_level {
        0 => OptLevel::None,
        _ => OptLevel::Speed,
    });

    Engine::new(&engine_config)
        .map_err(|e| BridgeError::Instantiate(format!("engine creation failed: {e}")))
}
