//! Capture-driver boundary. The decoder chain never sees which
//! [`CaptureSource`] fed it bytes -- `pcap.rs` supplies the always-available
//! file reader, and a `sys`-gated live-socket reader would sit behind the
//! same trait without the decode path changing at all.

pub mod pcap;

/// One captured frame, borrowed from whatever buffer the source owns it
/// in (the capture-session arena, for `PcapFileSource`).
pub struct RawFrame<'a> {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub orig_len: usize,
    pub data: &'a [u8],
}

/// A source of captured frames. The capture loop polls this; it does not
/// know or care whether the frames come from a file or a live socket.
pub trait CaptureSource {
    /// Pull the next frame, or `None` at end of input (a file source
    /// reaches EOF; a live source never does). Decode and I/O errors are
    /// distinct: decode failures are handled by the packet's own status,
    /// while an `Err` here is a capture-path failure.
    fn next_frame(&mut self) -> crate::error::Result<Option<RawFrame<'_>>>;
}

/// A `sys`-gated live capture source would implement [`CaptureSource`] on
/// top of a promiscuous-mode raw socket (`AF_PACKET` on Linux, BPF device
/// on BSD). That OS-specific handshake is explicitly out of scope here
/// (§1 Non-goals); this stub documents the shape the real implementation
/// would take without performing it.
#[cfg(feature = "sys")]
pub struct LiveSource {
    _private: (),
}

#[cfg(feature = "sys")]
impl CaptureSource for LiveSource {
    fn next_frame(&mut self) -> crate::error::Result<Option<RawFrame<'_>>> {
        Err(crate::error::Error::CaptureDevice("live capture is not implemented in this build"))
    }
}
