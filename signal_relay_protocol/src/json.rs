use crate::{ClientRequest, ServerEvent};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Client request with an untyped JSON payload
pub type JsonClientRequest = ClientRequest<Value>;

/// Server event with an untyped JSON payload
pub type JsonServerEvent = ServerEvent<Value>;

impl fmt::Display for JsonClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string(self).map_err(|_| fmt::Error)?
        )
    }
}

impl FromStr for JsonClientRequest {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

impl fmt::Display for JsonServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string(self).map_err(|_| fmt::Error)?
        )
    }
}

impl FromStr for JsonServerEvent {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
