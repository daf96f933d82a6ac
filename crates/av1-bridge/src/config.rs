//! Configuration for the guest module bridge.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{BridgeError, Result};

/// WASM page size in bytes.
pub const PAGE_SIZE: u32 = 64 * 1024;

/// Export symbol names of the guest codec ABI.
///
/// The defaults match the emscripten build of the codec; a rebuilt module
/// with different mangling only needs a different symbol set, not a
/// different bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestSymbols {
    /// `init() -> handle|0`
    pub init: String,

    /// `alloc_input(len) -> offset|0`
    pub alloc_input: String,

    /// `decode(handle, input, len, format) -> descriptor|0`
    pub decode: String,

    /// `release_frame(descriptor)`
    pub release_frame: String,
}

impl Default for GuestSymbols {
    fn default() -> Self {
        Self {
            init: "_djs_init".to_string(),
            alloc_input: "_djs_alloc_obu".to_string(),
            decode: "_djs_decode_obu".to_string(),
            release_frame: "_djs_free_frame".to_string(),
        }
    }
}

/// Build-specific constants of one compiled guest module.
///
/// Every value here must be in sync with the exact binary being loaded:
/// the memory and table sizes are baked in at the guest's compile time and
/// a mismatch fails at link time, while the base offsets silently corrupt
/// the guest heap if wrong. Profiles are serde-compatible so they can ship
/// as a JSON sidecar next to the `.wasm` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestLayout {
    /// Total linear memory in bytes (min == max, growth is refused)
    pub total_memory: u32,

    /// Funcref table size (min == max, matches the guest's indirect-call
    /// table exactly)
    pub table_size: u32,

    /// Offset of the word holding the guest allocator's dynamic top
    pub dynamic_top_ptr: u32,

    /// Initial dynamic top value, placed above the toolchain's static data
    pub dynamic_base: u32,

    /// Value of the `__memory_base` import global
    pub memory_base: u32,

    /// Value of the `__table_base` import global
    pub table_base: u32,

    /// Offset of the guest's errno storage, target of the `___setErrNo` stub
    pub errno_ptr: u32,

    /// Export symbol names of the decode ABI
    pub symbols: GuestSymbols,
}

impl Default for GuestLayout {
    fn default() -> Self {
        Self::av1_single_frame()
    }
}

impl GuestLayout {
    /// Layout of the single-frame AV1 video build.
    pub fn av1_single_frame() -> Self {
        Self {
            total_memory: 64 * 1024 * 1024,
            table_size: 414,
            dynamic_top_ptr: 385392,
            dynamic_base: 5628304,
            memory_base: 1024,
            table_base: 0,
            errno_ptr: 385408,
            symbols: GuestSymbols::default(),
        }
    }

    /// Layout of the AVIF still-image build, which links a few more
    /// function pointers and places its static data slightly higher.
    pub fn avif_still() -> Self {
        Self {
            total_memory: 64 * 1024 * 1024,
            table_size: 436,
            dynamic_top_ptr: 386256,
            dynamic_base: 5631168,
            memory_base: 1024,
            table_base: 0,
            errno_ptr: 386272,
            symbols: GuestSymbols::default(),
        }
    }

    /// Linear memory size in WASM pages.
    pub fn memory_pages(&self) -> u32 {
        self.total_memory / PAGE_SIZE
    }

    /// Check internal consistency before any guest interaction.
    pub fn validate(&self) -> Result<()> {
        if self.total_memory == 0 || self.total_memory % PAGE_SIZE != 0 {
            return Err(BridgeError::Config(format!(
                "total_memory {} is not a multiple of the page size",
                self.total_memory
            )));
        }
        if self.dynamic_top_ptr.saturating_add(4) > self.total_memory {
            return Err(BridgeError::Config(format!(
                "dynamic_top_ptr {} lies outside linear memory",
                self.dynamic_top_ptr
            )));
        }
        if self.errno_ptr.saturating_add(4) > self.total_memory {
            return Err(BridgeError::Config(format!(
                "errno_ptr {} lies outside linear memory",
                self.errno_ptr
            )));
        }
        if self.dynamic_base <= self.memory_base {
            return Err(BridgeError::Config(
                "dynamic_base overlaps the static data region".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the guest module bytes come from.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// Raw module bytes already in memory
    Bytes(Vec<u8>),

    /// Filesystem path to a `.wasm` artifact
    Path(PathBuf),
}

/// Configuration for creating a [`Decoder`](crate::Decoder).
///
/// Exactly one module source must be set; anything else is rejected before
/// any guest interaction.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Raw module bytes, mutually exclusive with `module_path`
    pub module_bytes: Option<Vec<u8>>,

    /// Module file path, mutually exclusive with `module_bytes`
    pub module_path: Option<PathBuf>,

    /// Build constants of the exact guest binary
    pub layout: GuestLayout,

    /// Cranelift optimization level (0-2)
    pub optimization_level: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module_bytes: None,
            module_path: None,
            layout: GuestLayout::default(),
            optimization_level: 1,
        }
    }
}

impl BridgeConfig {
    /// Config with in-memory module bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            module_bytes: Some(bytes.into()),
            ..Default::default()
        }
    }

    /// Config with a module file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Builder: set the guest layout profile.
    pub fn layout(mut self, layout: GuestLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Builder: set the optimization level.
    pub fn optimize(mut self, level: u8) -> Self {
        self.optimization_level = level.min(2);
        self
    }

    /// Resolve the module source, rejecting a missing or ambiguous one.
    pub(crate) fn source(&self) -> Result<ModuleSource> {
        match (&self.module_bytes, &self.module_path) {
            (Some(bytes), None) => Ok(ModuleSource::Bytes(bytes.clone())),
            (None, Some(path)) => Ok(ModuleSource::Path(path.clone())),
            (None, None) => Err(BridgeError::Config(
                "either module_bytes or module_path must be provided".to_string(),
            )),
            (Some(_), Some(_)) => Err(BridgeError::Config(
                "module_bytes and module_path are mutually exclusive".to_string(),
            )),
        }
    }
}
