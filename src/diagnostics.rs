//! Health reporting for map loaders.
//!
//! Loaders publish their condition through a [`StatusBoard`]: a small shared
//! status value (level + message) that external monitoring can poll or
//! subscribe to via a [`DiagnosticsSink`]. The feasibility guard writes here,
//! and so does backend initialization.
//!
//! Debug point-cloud output goes through the separate [`CloudSink`] trait.
//! Both sinks are observation-only: an implementation that drops data or
//! fails internally must never affect query answers, so the traits are
//! infallible and implementations swallow their own errors.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::PointCloud3;

/// Severity of a diagnostic status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Operating normally.
    #[default]
    Ok,
    /// Degraded but answering queries.
    Warn,
    /// A condition that needs operator attention.
    Error,
}

/// A point-in-time health report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticStatus {
    /// Severity level.
    pub level: DiagnosticLevel,
    /// Human-readable description.
    pub message: String,
}

/// Receives every status update published to a [`StatusBoard`].
pub trait DiagnosticsSink: Send + Sync {
    /// Called with the new status after each update.
    fn publish(&self, status: &DiagnosticStatus);
}

/// Shared health status with optional sink notification.
///
/// Cloning the board clones the handle; all clones view the same status.
#[derive(Clone)]
pub struct StatusBoard {
    status: Arc<Mutex<DiagnosticStatus>>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
}

impl StatusBoard {
    /// Create a board with default (OK, empty message) status and no sink.
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(DiagnosticStatus::default())),
            sink: None,
        }
    }

    /// Create a board that forwards every update to `sink`.
    pub fn with_sink(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            status: Arc::new(Mutex::new(DiagnosticStatus::default())),
            sink: Some(sink),
        }
    }

    /// Publish a new status.
    pub fn set(&self, level: DiagnosticLevel, message: impl Into<String>) {
        let status = DiagnosticStatus {
            level,
            message: message.into(),
        };
        *self.status.lock() = status.clone();
        if let Some(sink) = &self.sink {
            sink.publish(&status);
        }
    }

    /// Read the current status.
    pub fn get(&self) -> DiagnosticStatus {
        self.status.lock().clone()
    }

    /// True when the current level is [`DiagnosticLevel::Ok`].
    pub fn is_ok(&self) -> bool {
        self.status.lock().level == DiagnosticLevel::Ok
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBoard")
            .field("status", &*self.status.lock())
            .finish()
    }
}

/// Receives debug point clouds (downsampled map republish).
pub trait CloudSink: Send + Sync {
    /// Called with the cloud to publish.
    fn publish(&self, cloud: &PointCloud3);
}

/// A [`CloudSink`] that discards everything.
pub struct NullCloudSink;

impl CloudSink for NullCloudSink {
    fn publish(&self, _cloud: &PointCloud3) {}
}
