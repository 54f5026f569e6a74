use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Power operation forwarded to the agent. Which transitions are legal is
/// decided by the remote hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAction {
    Start,
    Reboot,
    Poweroff,
    Stop,
    Reset,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown power action: {0}")]
pub struct ParseActionError(pub String);

impl StateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Reboot => "reboot",
            Self::Poweroff => "poweroff",
            Self::Stop => "stop",
            Self::Reset => "reset",
        }
    }
}

impl FromStr for StateAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "reboot" => Ok(Self::Reboot),
            "poweroff" => Ok(Self::Poweroff),
            "stop" => Ok(Self::Stop),
            "reset" => Ok(Self::Reset),
            other => Err(ParseActionError(other.to_string())),
        }
    }
}

impl fmt::Display for StateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /libvirt/domains/{id}/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStateRequest {
    pub state: StateAction,
}
