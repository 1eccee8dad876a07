//! Turning one outgoing message into an ordered list of delivery steps.

use serde::{Deserialize, Serialize};

use crate::domain::{DeliveryStep, ReplyPolicy};

/// Default reply-formatting instruction.
///
/// `{paragraph_break}` and `{sentinel}` are replaced with the reply markers.
pub const DEFAULT_INSTRUCTION: &str = "Write your reply with the Sink tool, calling it once per sentence. \
At each paragraph break, write only \"{paragraph_break}\" with the Sink tool. \
When the whole reply has been written, finally write only {sentinel} with the Sink tool.";

/// Builds the delivery steps for one message.
///
/// Injected into the communicators' send path. Closures work too.
pub trait ExchangeBuilder: Send + Sync {
    fn build(&self, message: &str) -> Vec<DeliveryStep>;
}

impl<F> ExchangeBuilder for F
where
    F: Fn(&str) -> Vec<DeliveryStep> + Send + Sync,
{
    fn build(&self, message: &str) -> Vec<DeliveryStep> {
        self(message)
    }
}

/// Shape of the steps wrapped around a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePolicy {
    /// Control sequence typed between message lines (a soft line break)
    #[serde(default = "default_line_break")]
    pub line_break: String,

    /// Control sequence typed before the instruction
    #[serde(default = "default_instruction_prefix")]
    pub instruction_prefix: String,

    /// Reply-formatting instruction template
    #[serde(default = "default_instruction")]
    pub instruction: String,

    /// Control sequence that submits the input
    #[serde(default = "default_submit")]
    pub submit: String,

    /// Send the instruction as its own literal step instead of inside the
    /// trailing control step
    #[serde(default)]
    pub separate_instruction: bool,
}

fn default_line_break() -> String {
    "+{ENTER}".to_string()
}

fn default_instruction_prefix() -> String {
    "+{ENTER}+{ENTER}".to_string()
}

fn default_instruction() -> String {
    DEFAULT_INSTRUCTION.to_string()
}

fn default_submit() -> String {
    "{ENTER}".to_string()
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self {
            line_break: default_line_break(),
            instruction_prefix: default_instruction_prefix(),
            instruction: default_instruction(),
            submit: default_submit(),
            separate_instruction: false,
        }
    }
}

impl ExchangePolicy {
    /// Instruction text with the reply markers filled in
    pub fn render_instruction(&self, reply: &ReplyPolicy) -> String {
        self.instruction
            .replace("{paragraph_break}", &reply.paragraph_break)
            .replace("{sentinel}", &reply.sentinel)
    }
}

/// The standard exchange: message lines, soft breaks, then the instruction.
#[derive(Debug, Clone)]
pub struct StandardExchange {
    policy: ExchangePolicy,
    instruction: String,
}

impl StandardExchange {
    pub fn new(policy: ExchangePolicy, reply: &ReplyPolicy) -> Self {
        let instruction = policy.render_instruction(reply);
        Self {
            policy,
            instruction,
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

impl Default for StandardExchange {
    fn default() -> Self {
        Self::new(ExchangePolicy::default(), &ReplyPolicy::default())
    }
}

impl ExchangeBuilder for StandardExchange {
    fn build(&self, message: &str) -> Vec<DeliveryStep> {
        let lines: Vec<&str> = message.lines().collect();
        let mut steps = Vec::with_capacity(lines.len() * 2 + 3);

        for (i, line) in lines.iter().enumerate() {
            let line = line.trim();
            if !line.is_empty() {
                steps.push(DeliveryStep::literal(line));
            }
            if i + 1 < lines.len() {
                steps.push(DeliveryStep::control(&self.policy.line_break));
            }
        }

        if self.policy.separate_instruction {
            steps.push(DeliveryStep::control(&self.policy.instruction_prefix));
            steps.push(DeliveryStep::literal(&self.instruction));
            steps.push(DeliveryStep::control(&self.policy.submit));
        } else {
            steps.push(DeliveryStep::control(format!(
                "{}{}{}",
                self.policy.instruction_prefix, self.instruction, self.policy.submit
            )));
        }

        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PayloadMode;

    #[test]
    fn test_instruction_mentions_markers() {
        let exchange = StandardExchange::new(
            ExchangePolicy::default(),
            &ReplyPolicy::new("[end]", "--"),
        );
        assert!(exchange.instruction().contains("\"--\""));
        assert!(exchange.instruction().contains("[end]"));
        assert!(!exchange.instruction().contains("{sentinel}"));
    }

    #[test]
    fn test_multiline_message_is_interleaved_with_breaks() {
        let exchange = StandardExchange::default();
        let steps = exchange.build("  first line \nsecond line");

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], DeliveryStep::literal("first line"));
        assert_eq!(steps[1], DeliveryStep::control("+{ENTER}"));
        assert_eq!(steps[2], DeliveryStep::literal("second line"));
        assert_eq!(steps[3].mode, PayloadMode::Control);
        assert!(steps[3].payload.starts_with("+{ENTER}+{ENTER}Write your reply"));
        assert!(steps[3].payload.ends_with("{ENTER}"));
    }

    #[test]
    fn test_blank_lines_keep_their_breaks() {
        let exchange = StandardExchange::default();
        let steps = exchange.build("a\n\nb");
        let modes: Vec<_> = steps.iter().map(|s| s.mode).collect();
        assert_eq!(
            modes,
            vec![
                PayloadMode::Literal,
                PayloadMode::Control,
                PayloadMode::Control,
                PayloadMode::Literal,
                PayloadMode::Control,
            ]
        );
    }

    #[test]
    fn test_separate_instruction_step() {
        let policy = ExchangePolicy {
            separate_instruction: true,
            ..ExchangePolicy::default()
        };
        let exchange = StandardExchange::new(policy, &ReplyPolicy::default());
        let steps = exchange.build("hi");

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[1], DeliveryStep::control("+{ENTER}+{ENTER}"));
        assert_eq!(steps[2].mode, PayloadMode::Literal);
        assert_eq!(steps[2].payload, exchange.instruction());
        assert_eq!(steps[3], DeliveryStep::control("{ENTER}"));
    }

    #[test]
    fn test_closure_builder() {
        let builder = |message: &str| vec![DeliveryStep::literal(message.to_uppercase())];
        assert_eq!(builder.build("hi"), vec![DeliveryStep::literal("HI")]);
    }
}
