//! Request state machine and the notifications it produces.

use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

/// Lifecycle of one commit.
///
/// `Created -> Admitting -> {Cancelled, SatisfiedFromCache, Failed}` when a gate
/// short-circuits, otherwise `Admitting -> Submitted -> Running -> {Completed,
/// Failed, Cancelled}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestState {
    Created = 0,
    Admitting = 1,
    Cancelled = 2,
    SatisfiedFromCache = 3,
    Submitted = 4,
    Running = 5,
    Completed = 6,
    Failed = 7,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Cancelled
                | RequestState::SatisfiedFromCache
                | RequestState::Completed
                | RequestState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Created => "created",
            RequestState::Admitting => "admitting",
            RequestState::Cancelled => "cancelled",
            RequestState::SatisfiedFromCache => "satisfied_from_cache",
            RequestState::Submitted => "submitted",
            RequestState::Running => "running",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestState::Created,
            1 => RequestState::Admitting,
            2 => RequestState::Cancelled,
            3 => RequestState::SatisfiedFromCache,
            4 => RequestState::Submitted,
            5 => RequestState::Running,
            6 => RequestState::Completed,
            _ => RequestState::Failed,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free holder for a [`RequestState`], shared between the admission
/// thread and execution callbacks.
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(state: RequestState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> RequestState {
        RequestState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`; fails if the current state is not `from`.
    pub fn advance(&self, from: RequestState, to: RequestState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to the terminal state `to` unless a terminal state was already
    /// reached. Exactly one caller wins.
    pub fn finish(&self, to: RequestState) -> bool {
        debug_assert!(to.is_terminal());
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if RequestState::from_u8(current).is_terminal() {
                return false;
            }
            match self
                .0
                .compare_exchange(current, to as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Where a completed image came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFrom {
    MemoryCache,
    DiskCache,
    Network,
    Local,
}

/// Why a request failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailCause {
    UriEmpty,
    UriUnsupported,
    Download(String),
    Decode(String),
    Execution(String),
}

impl fmt::Display for FailCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailCause::UriEmpty => f.write_str("uri is empty"),
            FailCause::UriUnsupported => f.write_str("uri scheme is not supported"),
            FailCause::Download(msg) => write!(f, "download failed: {msg}"),
            FailCause::Decode(msg) => write!(f, "decode failed: {msg}"),
            FailCause::Execution(msg) => write!(f, "execution failed: {msg}"),
        }
    }
}

/// Why a request was cancelled. Cancellation is not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CancelCause {
    /// `cancel()` was called by the owner of the handle.
    Explicit,
    /// A newer request with a different cache key took over the target.
    Superseded,
    PauseLoad,
    LevelMemory,
    PauseDownload,
    LevelLocal,
}

impl CancelCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelCause::Explicit => "explicit",
            CancelCause::Superseded => "superseded",
            CancelCause::PauseLoad => "pause load",
            CancelCause::LevelMemory => "requestLevel is memory",
            CancelCause::PauseDownload => "pause download",
            CancelCause::LevelLocal => "requestLevel is local",
        }
    }
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RequestState::Cancelled.is_terminal());
        assert!(RequestState::SatisfiedFromCache.is_terminal());
        assert!(RequestState::Completed.is_terminal());
        assert!(RequestState::Failed.is_terminal());
        assert!(!RequestState::Submitted.is_terminal());
        assert!(!RequestState::Running.is_terminal());
    }

    #[test]
    fn test_advance_requires_expected_state() {
        let state = AtomicState::new(RequestState::Submitted);
        assert!(!state.advance(RequestState::Created, RequestState::Admitting));
        assert!(state.advance(RequestState::Submitted, RequestState::Running));
        assert_eq!(state.load(), RequestState::Running);
    }

    #[test]
    fn test_finish_only_once() {
        let state = AtomicState::new(RequestState::Running);
        assert!(state.finish(RequestState::Cancelled));
        assert!(!state.finish(RequestState::Completed));
        assert!(!state.finish(RequestState::Cancelled));
        assert_eq!(state.load(), RequestState::Cancelled);
    }
}
