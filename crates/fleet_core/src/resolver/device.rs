//! Device geolocation boundary.
//!
//! A [`DeviceLocator`] may block for as long as the platform likes; callers go
//! through [`InFlightLocate`], which stops waiting once the configured timeout
//! has passed and keeps at most one request running.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::error::ResolverError;
use crate::geo::Coordinate;

/// Request options for a position fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Accept a cached fix no older than this.
    pub max_cache_age: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("timed out")]
    Timeout,
    #[error("unsupported")]
    Unsupported,
}

impl From<DeviceError> for ResolverError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::PermissionDenied => ResolverError::PermissionDenied,
            DeviceError::Timeout => ResolverError::Timeout,
            DeviceError::Unsupported => ResolverError::Unsupported,
        }
    }
}

/// Source of the device's own position.
pub trait DeviceLocator: Send + Sync + 'static {
    fn current_position(&self, options: &PositionOptions) -> Result<Coordinate, DeviceError>;
}

/// Always reports the same position. Useful for demos and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator(pub Coordinate);

impl DeviceLocator for FixedLocator {
    fn current_position(&self, _options: &PositionOptions) -> Result<Coordinate, DeviceError> {
        Ok(self.0)
    }
}

/// Always fails with the given error.
#[derive(Debug, Clone, Copy)]
pub struct FailingLocator(pub DeviceError);

impl DeviceLocator for FailingLocator {
    fn current_position(&self, _options: &PositionOptions) -> Result<Coordinate, DeviceError> {
        Err(self.0)
    }
}

type PositionReply = Result<Coordinate, DeviceError>;

/// Runs the locator on a helper thread and gives up after `options.timeout`.
///
/// A request that times out stays in flight. The next [`locate`](Self::locate)
/// waits on that same request rather than starting another thread, so a hung
/// locator pins at most one helper thread.
#[derive(Debug, Default)]
pub struct InFlightLocate {
    pending: Mutex<Option<Receiver<PositionReply>>>,
    started: AtomicUsize,
}

impl InFlightLocate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Helper threads started so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn locate(
        &self,
        locator: &Arc<dyn DeviceLocator>,
        options: PositionOptions,
    ) -> Result<Coordinate, ResolverError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let rx = match pending.take() {
            Some(rx) => {
                debug!("waiting on the device request already in flight");
                rx
            }
            None => self.spawn(Arc::clone(locator), options),
        };

        match rx.recv_timeout(options.timeout) {
            Ok(result) => result.map_err(ResolverError::from),
            Err(RecvTimeoutError::Timeout) => {
                debug!(timeout_ms = options.timeout.as_millis() as u64, "device locator timed out");
                *pending = Some(rx);
                Err(ResolverError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(ResolverError::Unsupported),
        }
    }

    fn spawn(
        &self,
        locator: Arc<dyn DeviceLocator>,
        options: PositionOptions,
    ) -> Receiver<PositionReply> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(locator.current_position(&options));
        });
        rx
    }
}
