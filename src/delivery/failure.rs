//! Delivery failure reasons and their recovery from program diagnostics.

use once_cell::sync::Lazy;
use regex::Regex;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"handle\s*=\s*([0-9A-Fa-f]+)").expect("handle pattern is valid"));

const WINDOW_INVALID_MARKER: &str = "Window handle is invalid.";
const WINDOW_MINIMIZED_MESSAGE: &str = "Target window is minimized.";

/// Coarse classification of a failed delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The target process is not running. Retrying blindly will not help.
    TargetNotFound,
    /// The target window exists but cannot receive input (e.g. minimized).
    WindowNotAddressable,
    /// Anything else the delivery program reported
    Unstructured,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::TargetNotFound => "target-not-found",
            FailureReason::WindowNotAddressable => "window-not-addressable",
            FailureReason::Unstructured => "unstructured",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a delivery did not reach the target
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailure {
    #[error("{message}")]
    TargetNotFound { message: String },

    #[error("{message}")]
    WindowNotAddressable {
        message: String,
        /// Window handles recovered from the diagnostic output
        handles: Vec<String>,
    },

    #[error("{diagnostic}")]
    Unstructured { diagnostic: String },
}

impl DeliveryFailure {
    pub fn unstructured(diagnostic: impl Into<String>) -> Self {
        DeliveryFailure::Unstructured {
            diagnostic: diagnostic.into(),
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            DeliveryFailure::TargetNotFound { .. } => FailureReason::TargetNotFound,
            DeliveryFailure::WindowNotAddressable { .. } => FailureReason::WindowNotAddressable,
            DeliveryFailure::Unstructured { .. } => FailureReason::Unstructured,
        }
    }

    /// Human-readable diagnostic
    pub fn message(&self) -> &str {
        match self {
            DeliveryFailure::TargetNotFound { message }
            | DeliveryFailure::WindowNotAddressable { message, .. } => message,
            DeliveryFailure::Unstructured { diagnostic } => diagnostic,
        }
    }

    /// Whether the caller may retry after fixing the target's window.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryFailure::WindowNotAddressable { .. })
    }

    /// Recover a structured reason from the delivery program's output.
    ///
    /// Text that matches no known diagnostic is kept verbatim.
    pub fn from_diagnostic(output: &str, target_name: &str) -> Self {
        let not_found = format!("Process '{}' was not found.", target_name);
        if output.contains(&not_found) {
            return DeliveryFailure::TargetNotFound { message: not_found };
        }

        if output.contains(WINDOW_INVALID_MARKER) {
            let handles: Vec<String> = HANDLE_RE
                .captures_iter(output)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect();

            let mut message = WINDOW_MINIMIZED_MESSAGE.to_string();
            if !handles.is_empty() {
                message.push_str("\nfound window handles:");
                for handle in &handles {
                    message.push_str(&format!("\n  handle = {}", handle));
                }
            }
            return DeliveryFailure::WindowNotAddressable { message, handles };
        }

        DeliveryFailure::unstructured(output)
    }
}
