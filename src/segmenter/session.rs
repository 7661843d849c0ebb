use crate::media::Packet;

use super::native::{MuxerSession, NativeStatus, SegmentMuxer, SessionParams};

/// Exclusive owner of one open muxer session.
///
/// Construction is the only way to open a session. `release` finalizes and
/// drops it at most once; `Drop` releases a handle nobody released.
pub struct SessionHandle {
    session: Option<Box<dyn MuxerSession>>,
    muxer: String,
}

impl SessionHandle {
    pub fn open(muxer: &dyn SegmentMuxer, params: &SessionParams) -> Result<Self, NativeStatus> {
        let session = muxer.open(params)?;
        Ok(Self {
            session: Some(session),
            muxer: muxer.name().to_string(),
        })
    }

    pub fn muxer_name(&self) -> &str {
        &self.muxer
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn write(&mut self, packet: &Packet<'_>) -> Result<(), NativeStatus> {
        match self.session.as_mut() {
            Some(session) => session.write_packet(packet),
            None => Err(NativeStatus::ERROR),
        }
    }

    /// Finalizes and drops the session. Returns `None` if it was already
    /// released; the session is gone afterwards even when finalize fails.
    pub fn release(&mut self) -> Option<Result<(), NativeStatus>> {
        let mut session = self.session.take()?;
        Some(session.finalize())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
