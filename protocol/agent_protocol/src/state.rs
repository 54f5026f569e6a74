use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw `(state, reason)` pair exactly as the agent reports it for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStateReport {
    pub state: i32,
    #[serde(default)]
    pub reason: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    NoState,
    Running,
    Blocked,
    Paused,
    Shutdown,
    Shutoff,
    Crashed,
    PMSuspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateReason {
    Unknown,
    Booted,
    Migrated,
    Restored,
    FromSnapshot,
    Unpaused,
    MigrationCanceled,
    SaveCanceled,
    Wakeup,
    Crashed,
    Postcopy,
    User,
    Migration,
    Save,
    Dump,
    IOError,
    Watchdog,
    ShuttingDown,
    Snapshot,
    StartingUp,
    PostcopyFailed,
    Shutdown,
    Destroyed,
    Saved,
    Failed,
    Daemon,
    Panicked,
}

/// Decoded domain lifecycle state. The raw codes are kept so operators can
/// still see what the remote side sent when the pair was not recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainState {
    pub state: PowerState,
    pub reason: StateReason,
    pub raw: DomainStateReport,
}

impl PowerState {
    fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::NoState,
            1 => Self::Running,
            2 => Self::Blocked,
            3 => Self::Paused,
            4 => Self::Shutdown,
            5 => Self::Shutoff,
            6 => Self::Crashed,
            7 => Self::PMSuspended,
            _ => return None,
        })
    }
}

impl StateReason {
    fn decode(state: PowerState, code: i32) -> Self {
        use StateReason::*;
        let reasons: &[StateReason] = match state {
            PowerState::NoState => &[Unknown],
            PowerState::Running => &[
                Unknown,
                Booted,
                Migrated,
                Restored,
                FromSnapshot,
                Unpaused,
                MigrationCanceled,
                SaveCanceled,
                Wakeup,
                Crashed,
                Postcopy,
            ],
            PowerState::Blocked => &[Unknown],
            PowerState::Paused => &[
                Unknown,
                User,
                Migration,
                Save,
                Dump,
                IOError,
                Watchdog,
                FromSnapshot,
                ShuttingDown,
                Snapshot,
                Crashed,
                StartingUp,
                Postcopy,
                PostcopyFailed,
            ],
            PowerState::Shutdown => &[Unknown, User],
            PowerState::Shutoff => &[
                Unknown,
                Shutdown,
                Destroyed,
                Crashed,
                Migrated,
                Saved,
                Failed,
                FromSnapshot,
                Daemon,
            ],
            PowerState::Crashed => &[Unknown, Panicked],
            PowerState::PMSuspended => &[Unknown],
        };
        usize::try_from(code)
            .ok()
            .and_then(|index| reasons.get(index))
            .copied()
            .unwrap_or(Unknown)
    }
}

impl DomainState {
    /// Unrecognized state codes decode as `NoState`, unrecognized reasons as
    /// `Unknown`. Decoding never fails.
    pub fn decode(report: DomainStateReport) -> Self {
        match PowerState::from_code(report.state) {
            Some(state) => Self {
                state,
                reason: StateReason::decode(state, report.reason),
                raw: report,
            },
            None => Self {
                state: PowerState::NoState,
                reason: StateReason::Unknown,
                raw: report,
            },
        }
    }
}

impl From<DomainStateReport> for DomainState {
    fn from(report: DomainStateReport) -> Self {
        Self::decode(report)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for StateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.state, self.reason)
    }
}
