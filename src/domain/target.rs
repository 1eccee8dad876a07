//! Target type definitions

use serde::{Deserialize, Serialize};

/// The process (and optionally one of its windows) that receives delivered text.
///
/// Owned by the caller; the communicator only borrows it for each delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Process name as understood by the delivery program (e.g. "Claude")
    pub name: String,

    /// Window title to pick when the process owns several windows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            window_title: None,
        }
    }

    /// Select a specific window of the target process.
    pub fn with_window(mut self, title: impl Into<String>) -> Self {
        self.window_title = Some(title.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.window_title {
            Some(title) => write!(f, "{} ({})", self.name, title),
            None => write!(f, "{}", self.name),
        }
    }
}
