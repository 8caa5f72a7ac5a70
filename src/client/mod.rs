//! Data-source abstraction for the dashboard.
//!
//! This module defines the `QueueSource` trait that allows the TUI to work
//! with any queue server through a unified interface: `BeanstalkClient` in
//! production, mocks in tests. The trait is object-safe and designed to be
//! used as `Box<dyn QueueSource>`.

mod beanstalk;

pub use beanstalk::BeanstalkClient;

use std::collections::BTreeMap;

/// Stats payload: key/value pairs exactly as reported by the server.
pub type StatsMap = BTreeMap<String, String>;

/// Job states a maintenance action can address through peek.
///
/// `Reserved` jobs are reachable only through `reserve_job`, so they are not
/// listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Ready,
    Delayed,
    Buried,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Ready => "ready",
            JobState::Delayed => "delayed",
            JobState::Buried => "buried",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types that can occur while talking to a queue data source.
#[derive(Debug)]
pub enum SourceError {
    /// I/O error on the server connection.
    Io(std::io::Error),
    /// Malformed or unexpected protocol reply.
    Protocol(String),
    /// Error status reported by the server.
    Server(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(err) => write!(f, "I/O error: {}", err),
            SourceError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            SourceError::Server(msg) => write!(f, "server error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err)
    }
}

/// Abstraction over the queue server consumed by the dashboard and poller.
///
/// Stats calls return maps keyed by the server's own stat names; the grids
/// select the keys they display. Peek and reserve return `Ok(None)` when no
/// matching job exists, keeping "drained" distinct from a real failure.
pub trait QueueSource: Send {
    /// Server-wide statistics.
    fn server_stats(&mut self) -> Result<StatsMap, SourceError>;

    /// Names of all tubes currently known to the server.
    fn list_queues(&mut self) -> Result<Vec<String>, SourceError>;

    /// Statistics for one tube.
    fn queue_stats(&mut self, name: &str) -> Result<StatsMap, SourceError>;

    /// Id of the next job in `state` on `queue`, without removing it.
    fn peek_job(&mut self, queue: &str, state: JobState) -> Result<Option<u64>, SourceError>;

    /// Deletes a job by id.
    fn delete_job(&mut self, id: u64) -> Result<(), SourceError>;

    /// Buries a job at the given priority. The job must be reserved by this
    /// connection.
    fn bury_job(&mut self, id: u64, priority: u32) -> Result<(), SourceError>;

    /// Kicks up to `bound` buried (or delayed) jobs on `queue` back to
    /// ready; returns the count the server reports.
    fn kick_jobs(&mut self, queue: &str, bound: u64) -> Result<u64, SourceError>;

    /// Reserves the next ready job on `queue`, with a short timeout.
    /// `Ok(None)` when the reserve timed out.
    fn reserve_job(&mut self, queue: &str) -> Result<Option<u64>, SourceError>;

    /// Statistics for one job (notably its `pri`).
    fn job_stats(&mut self, id: u64) -> Result<StatsMap, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_display_matches_protocol_words() {
        assert_eq!(JobState::Ready.to_string(), "ready");
        assert_eq!(JobState::Delayed.to_string(), "delayed");
        assert_eq!(JobState::Buried.to_string(), "buried");
    }

    #[test]
    fn source_error_display_includes_detail() {
        let err = SourceError::Server("OUT_OF_MEMORY".to_string());
        assert_eq!(err.to_string(), "server error: OUT_OF_MEMORY");

        let err = SourceError::Protocol("short reply".to_string());
        assert!(err.to_string().contains("short reply"));
    }
}
