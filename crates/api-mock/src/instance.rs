use std::fmt::Display;

use crate::error::{RegistrarError, RegistrarResult};

/// Identifier of the simulated server, served verbatim by the metadata
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(value: impl Into<String>) -> RegistrarResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(RegistrarError::EmptyInstanceId);
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
