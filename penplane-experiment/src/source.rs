use crossbeam_channel::{Receiver, RecvTimeoutError};
use penplane_core::{MarkerFrame, MarkerSource, SourceError};
use std::time::Duration;

/// Marker frames pushed by an in-process producer. The stream disconnects
/// when every sender is dropped.
pub struct ChannelSource {
    rx: Receiver<MarkerFrame>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<MarkerFrame>) -> Self {
        Self { rx }
    }
}

impl MarkerSource for ChannelSource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<MarkerFrame>, SourceError> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Disconnected),
        }
    }
}
