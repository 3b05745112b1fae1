//! CamLog - ring of cam transition angles decoded by the host

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ChannelId, ContractError, LinkMessage, LinkTarget};
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use tracing::{debug, instrument};

struct CamLogInner {
    angles: HeapRb<u32>,
    resets: u64,
}

/// Shared cam transition log.
///
/// Clones share one buffer. The oldest entry is overwritten once the log is full.
#[derive(Clone)]
pub struct CamLog {
    inner: Arc<Mutex<CamLogInner>>,
}

impl CamLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CamLogInner {
                angles: HeapRb::new(capacity.max(1)),
                resets: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CamLogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the crank angle of one cam transition
    pub fn record(&self, angle: u32) {
        self.lock().angles.push_overwrite(angle);
    }

    /// Angles recorded since the last reset, oldest first
    pub fn entries(&self) -> Vec<u32> {
        self.lock().angles.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().angles.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().angles.is_empty()
    }

    /// Rewind the write index
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.angles.clear();
        inner.resets += 1;
    }

    pub fn reset_count(&self) -> u64 {
        self.lock().resets
    }
}

/// Link target of the cam channel: rewinds the log on `ResetLog`
pub struct CamLogTarget {
    name: String,
    channel: ChannelId,
    log: CamLog,
}

impl CamLogTarget {
    pub fn new(name: impl Into<String>, channel: ChannelId, log: CamLog) -> Self {
        Self {
            name: name.into(),
            channel,
            log,
        }
    }
}

impl LinkTarget for CamLogTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel(&self) -> ChannelId {
        self.channel
    }

    #[instrument(
        name = "cam_log_on_link",
        skip(self),
        fields(channel = %self.channel, message = message.as_str())
    )]
    async fn on_link(&mut self, message: LinkMessage) -> Result<(), ContractError> {
        match message {
            LinkMessage::ResetLog => {
                debug!(entries = self.log.len(), "cam log reset");
                self.log.reset();
            }
            LinkMessage::Reinitialize => debug!("ignored by the cam log"),
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
