//! Decoded frame types and guest result marshaling.

use wasmtime::AsContext;

use crate::error::{BridgeError, Result};
use crate::memory::{GuestMemory, GuestOffset};

/// Pixel layout the guest is asked to produce.
///
/// The guest performs the conversion; the bridge only forwards the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Raw planar I420: Y plane followed by half-resolution U and V planes
    Planar,
    /// RGB24 pixels wrapped in a minimal 54-byte BMP container
    Bitmap,
}

impl OutputFormat {
    /// Wire tag of the format in the guest ABI.
    pub(crate) fn tag(self) -> u32 {
        match self {
            OutputFormat::Planar => 0,
            OutputFormat::Bitmap => 1,
        }
    }
}

/// A decoded frame copied out of guest memory. The guest-side buffer is
/// released before this is returned.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Payload bytes in the requested [`OutputFormat`]
    pub data: Vec<u8>,
}

/// A zero-copy view of a decoded frame, aliasing live guest memory.
///
/// The borrow ties the view to the session, so no further guest call can
/// happen while it is held. The backing guest buffer stays allocated until
/// [`Decoder::release_zero_copy_frame`](crate::Decoder::release_zero_copy_frame)
/// or the next zero-copy decode.
#[derive(Debug)]
pub struct FrameRef<'a> {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Payload bytes, valid only while the session is borrowed
    pub data: &'a [u8],
}

/// The guest's frame result record: four consecutive little-endian u32
/// fields at the returned offset — width, height, payload length, payload
/// offset. Ephemeral; only the payload location survives interpretation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameDescriptor {
    /// Offset of the descriptor itself, doubles as the release handle
    pub at: GuestOffset,
    pub width: u32,
    pub height: u32,
    pub size: u32,
    pub data: GuestOffset,
}

impl FrameDescriptor {
    /// Interpret the 16 bytes at `at` as a frame descriptor.
    pub(crate) fn read(
        memory: &GuestMemory,
        store: impl AsContext,
        at: GuestOffset,
    ) -> Result<Self> {
        let base = at.get();
        let width = memory.read_u32(&store, base)?;
        let height = memory.read_u32(&store, base + 4)?;
        let size = memory.read_u32(&store, base + 8)?;
        let data = memory.read_u32(&store, base + 12)?;
        // A null payload offset means the guest handed back a frame it
        // never filled in; treat like a failed decode.
        let data = GuestOffset::new(data).ok_or(BridgeError::Decode)?;
        Ok(Self {
            at,
            width,
            height,
            size,
            data,
        })
    }
}
