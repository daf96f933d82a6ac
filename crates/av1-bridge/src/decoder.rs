//! Decoder session: the stateful façade over one instantiated guest module.
//!
//! A session owns the guest's store, memory and decoder handle, and tracks
//! at most one outstanding zero-copy frame. All guest calls are synchronous;
//! a failed call is fatal for that call and nothing is retried.

use tracing::{debug, trace};
use wasmtime::{Instance, Store, TypedFunc, WasmParams, WasmResults};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::frame::{DecodedFrame, FrameDescriptor, FrameRef, OutputFormat};
use crate::loader::{self, HostState, LoadedGuest};
use crate::memory::{GuestMemory, GuestOffset};
use crate::stubs::Unsupported;

/// A decode session bound to one instantiated guest codec module.
///
/// Create with [`Decoder::create`]; there is no explicit shutdown, dropping
/// the session discards the guest instance and everything it holds.
pub struct Decoder {
    store: Store<HostState>,
    memory: GuestMemory,
    alloc_input: TypedFunc<u32, u32>,
    decode: TypedFunc<(u32, u32, u32, u32), u32>,
    release_frame: TypedFunc<u32, ()>,
    handle: GuestOffset,
    errno_ptr: u32,
    outstanding: Option<GuestOffset>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("handle", &self.handle)
            .field("errno_ptr", &self.errno_ptr)
            .field("outstanding", &self.outstanding)
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Compile and instantiate the configured module, then initialize the
    /// guest decoder state.
    ///
    /// Configuration problems (missing or ambiguous module source, bad
    /// layout) are rejected before any guest interaction; a guest init
    /// returning the zero sentinel is [`BridgeError::Init`].
    pub fn create(config: BridgeConfig) -> Result<Self> {
        let LoadedGuest {
            mut store,
            instance,
            memory,
        } = loader::instantiate(&config)?;

        let symbols = &config.layout.symbols;
        let init: TypedFunc<(), u32> = typed_export(&instance, &mut store, &symbols.init)?;
        let alloc_input = typed_export(&instance, &mut store, &symbols.alloc_input)?;
        let decode = typed_export(&instance, &mut store, &symbols.decode)?;
        let release_frame = typed_export(&instance, &mut store, &symbols.release_frame)?;

        let raw = init
            .call(&mut store, ())
            .map_err(|e| map_guest_err("init", e))?;
        let handle = GuestOffset::new(raw).ok_or(BridgeError::Init)?;
        debug!(handle = handle.get(), "guest decoder initialized");

        Ok(Self {
            store,
            memory,
            alloc_input,
            decode,
            release_frame,
            handle,
            errno_ptr: config.layout.errno_ptr,
            outstanding: None,
        })
    }

    /// Decode one coded unit to raw planar I420, copying the payload out of
    /// guest memory and releasing the guest-side frame immediately.
    pub fn decode_as_planar(&mut self, unit: impl AsRef<[u8]>) -> Result<DecodedFrame> {
        self.decode_copied(unit.as_ref(), OutputFormat::Planar)
    }

    /// Decode one coded unit to a BMP-wrapped RGB24 buffer, copying the
    /// payload out and releasing the guest-side frame immediately.
    pub fn decode_as_bitmap(&mut self, unit: impl AsRef<[u8]>) -> Result<DecodedFrame> {
        self.decode_copied(unit.as_ref(), OutputFormat::Bitmap)
    }

    /// Zero-copy planar decode: the returned view aliases guest memory and
    /// borrows the session. An outstanding frame from a previous zero-copy
    /// decode is released first.
    pub fn decode_as_planar_ref(&mut self, unit: impl AsRef<[u8]>) -> Result<FrameRef<'_>> {
        self.decode_borrowed(unit.as_ref(), OutputFormat::Planar)
    }

    /// Zero-copy bitmap decode; see [`Decoder::decode_as_planar_ref`].
    pub fn decode_as_bitmap_ref(&mut self, unit: impl AsRef<[u8]>) -> Result<FrameRef<'_>> {
        self.decode_borrowed(unit.as_ref(), OutputFormat::Bitmap)
    }

    /// Release the outstanding zero-copy frame, if any. Safe to call
    /// redundantly; a no-op when nothing is outstanding.
    pub fn release_zero_copy_frame(&mut self) -> Result<()> {
        if let Some(at) = self.outstanding.take() {
            self.release_frame
                .call(&mut self.store, at.get())
                .map_err(|e| map_guest_err("release_frame", e))?;
            trace!(frame = at.get(), "released zero-copy frame");
        }
        Ok(())
    }

    /// Current value of the guest's errno slot, last written via the
    /// `___setErrNo` stub.
    pub fn guest_errno(&self) -> Result<u32> {
        self.memory.read_u32(&self.store, self.errno_ptr)
    }

    /// Number of threading-stub invocations the guest has made. Stays 0
    /// for a correctly built single-threaded guest.
    pub fn thread_stub_calls(&self) -> u64 {
        self.store.data().thread_stub_calls
    }

    fn decode_copied(&mut self, unit: &[u8], format: OutputFormat) -> Result<DecodedFrame> {
        let d = self.run_decode(unit, format)?;
        let data = self.memory.read(&self.store, d.data, d.size)?;
        self.release_frame
            .call(&mut self.store, d.at.get())
            .map_err(|e| map_guest_err("release_frame", e))?;
        Ok(DecodedFrame {
            width: d.width,
            height: d.height,
            data,
        })
    }

    fn decode_borrowed(&mut self, unit: &[u8], format: OutputFormat) -> Result<FrameRef<'_>> {
        // Supersede policy: a new zero-copy decode cleanly replaces the
        // previous outstanding frame.
        self.release_zero_copy_frame()?;
        let d = self.run_decode(unit, format)?;
        self.outstanding = Some(d.at);
        let data = self.memory.slice(&self.store, d.data, d.size)?;
        Ok(FrameRef {
            width: d.width,
            height: d.height,
            data,
        })
    }

    /// The shared decode flow: guest-allocate an input buffer, copy the
    /// unit in, invoke the decode entry point, marshal the descriptor.
    fn run_decode(&mut self, unit: &[u8], format: OutputFormat) -> Result<FrameDescriptor> {
        let len =
            u32::try_from(unit.len()).map_err(|_| BridgeError::UnitTooLarge(unit.len()))?;

        let raw = self
            .alloc_input
            .call(&mut self.store, len)
            .map_err(|e| map_guest_err("alloc_input", e))?;
        let input = GuestOffset::new(raw).ok_or(BridgeError::GuestAlloc("input buffer"))?;

        self.memory.write(&mut self.store, input, unit)?;

        let raw = self
            .decode
            .call(
                &mut self.store,
                (self.handle.get(), input.get(), len, format.tag()),
            )
            .map_err(|e| map_guest_err("decode", e))?;
        let desc = GuestOffset::new(raw).ok_or(BridgeError::Decode)?;

        let d = FrameDescriptor::read(&self.memory, &self.store, desc)?;
        trace!(
            width = d.width,
            height = d.height,
            size = d.size,
            format = format.tag(),
            "decoded frame"
        );
        Ok(d)
    }
}

fn typed_export<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &str,
) -> Result<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    instance.get_typed_func::<P, R>(&mut *store, name).map_err(|e| {
        BridgeError::Instantiate(format!("guest export '{name}' missing or mistyped: {e}"))
    })
}

/// Classify a trapped guest call: refused-capability traps raised by the
/// stub environment are recovered by downcast, everything else is an
/// opaque guest failure.
fn map_guest_err(stage: &'static str, err: wasmtime::Error) -> BridgeError {
    match err.downcast::<Unsupported>() {
        Ok(u) => BridgeError::Unsupported(u.0),
        Err(e) => BridgeError::GuestCall(format!("{stage}: {e}")),
    }
}
