//! Reply stream policy: which fragments end a reply and which mark paragraphs.

use serde::{Deserialize, Serialize};

/// Default end-of-reply marker.
pub const DEFAULT_SENTINEL: &str = "<exit>";

/// Default paragraph-break marker.
pub const DEFAULT_PARAGRAPH_BREAK: &str = "</>";

/// One unit of reply text delivered over the datagram channel.
pub type Fragment = String;

/// Decides how a drained fragment is treated.
///
/// Injected into both mailbox variants so the sentinel check lives in one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPolicy {
    /// Fragment that terminates a reply. Consumed, never yielded.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Fragment the caller renders as a paragraph break. Passed through.
    #[serde(default = "default_paragraph_break")]
    pub paragraph_break: String,
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

fn default_paragraph_break() -> String {
    DEFAULT_PARAGRAPH_BREAK.to_string()
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            paragraph_break: default_paragraph_break(),
        }
    }
}

impl ReplyPolicy {
    pub fn new(sentinel: impl Into<String>, paragraph_break: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            paragraph_break: paragraph_break.into(),
        }
    }

    /// True when the fragment, ignoring surrounding whitespace, is the sentinel.
    pub fn is_sentinel(&self, fragment: &str) -> bool {
        fragment.trim() == self.sentinel
    }

    /// True when the fragment, ignoring surrounding whitespace, is a paragraph break.
    pub fn is_paragraph_break(&self, fragment: &str) -> bool {
        fragment.trim() == self.paragraph_break
    }

    /// Admit a fragment into a reply stream.
    ///
    /// Returns `None` when the fragment ends the stream.
    pub fn admit(&self, fragment: Fragment) -> Option<Fragment> {
        if self.is_sentinel(&fragment) {
            None
        } else {
            Some(fragment)
        }
    }
}
