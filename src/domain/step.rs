use serde::{Deserialize, Serialize};

/// How the delivery program should interpret a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMode {
    /// Typed into the target as-is
    #[default]
    Literal,
    /// Keystroke control sequence (e.g. `+{ENTER}`)
    Control,
}

impl PayloadMode {
    pub fn is_control(&self) -> bool {
        matches!(self, PayloadMode::Control)
    }
}

/// One ordered step of a multi-step delivery exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStep {
    pub payload: String,
    pub mode: PayloadMode,
}

impl DeliveryStep {
    pub fn literal(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            mode: PayloadMode::Literal,
        }
    }

    pub fn control(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            mode: PayloadMode::Control,
        }
    }
}
