//! # av1-bridge
//!
//! Host-side runtime bridge for an emscripten-built AV1 codec module
//! running under wasmtime.
//!
//! The codec itself is opaque: this crate loads the precompiled `.wasm`
//! artifact, supplies the minimal `env` import surface the build links
//! against (bulk memory copy, refused memory growth, threading no-ops,
//! syscall traps, errno sink), and exposes a typed decode API over the
//! shared linear memory.
//!
//! ## Security Model
//!
//! - **Fixed address space**: linear memory and the funcref table are sized
//!   to the exact guest binary at construction time; growth is refused
//! - **Single-threaded**: every threading import is a counted no-op, the
//!   bridge never runs guest code in parallel
//! - **No real syscalls**: syscall imports trap with a named diagnostic
//!
//! ## Usage
//!
//! ```rust,ignore
//! use av1_bridge::{BridgeConfig, Decoder};
//!
//! let mut decoder = Decoder::create(BridgeConfig::from_path("codec.wasm"))?;
//!
//! // Copying decode: owned pixels, guest buffer released immediately
//! let frame = decoder.decode_as_bitmap(&coded_unit)?;
//! println!("{}x{}, {} bytes", frame.width, frame.height, frame.data.len());
//!
//! // Zero-copy decode: borrow of guest memory, released explicitly
//! let view = decoder.decode_as_planar_ref(&coded_unit)?;
//! consume(view.data);
//! decoder.release_zero_copy_frame()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod memory;

mod loader;
mod stubs;

pub use config::{BridgeConfig, GuestLayout, GuestSymbols, ModuleSource};
pub use decoder::Decoder;
pub use error::{BridgeError, Result};
pub use frame::{DecodedFrame, FrameRef, OutputFormat};
pub use memory::GuestOffset;

#[cfg(test)]
mod tests;
