//! Delivery agent backed by an external program.
//!
//! The program is invoked as
//!
//! ```text
//! <program> <target> [--window <title>] [--raw] <payload> [[--raw] <payload> ...]
//! ```
//!
//! where `--raw` marks the following payload as a keystroke control sequence.
//! Exit status 0 means every payload was delivered. On failure the program's
//! output is searched for known diagnostics (see [`DeliveryFailure::from_diagnostic`]).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tracing::{debug, warn};

use super::{AsyncDeliveryAgent, DeliveryAgent, DeliveryFailure};
use crate::config::DeliverySettings;
use crate::domain::{DeliveryStep, PayloadMode, Target};

const RAW_FLAG: &str = "--raw";
const WINDOW_FLAG: &str = "--window";

/// Runs the delivery program once per delivery request.
#[derive(Debug, Clone)]
pub struct ExternalSender {
    program: PathBuf,
    batch: bool,
    clear_sequence: Option<String>,
}

impl ExternalSender {
    /// Create a sender for `program`.
    ///
    /// A missing program is only warned about; the failure surfaces on the
    /// first delivery.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        debug!("[talkback:delivery] program={}", program.display());
        if !program.exists() {
            warn!(
                "[talkback:delivery] {} does not exist; delivery may not work",
                program.display()
            );
        }
        Self {
            program,
            batch: true,
            clear_sequence: None,
        }
    }

    pub fn from_settings(settings: &DeliverySettings) -> anyhow::Result<Self> {
        let Some(program) = &settings.program else {
            anyhow::bail!(
                "No delivery program configured (set delivery.program or {})",
                crate::config::ENV_SENDER_PATH
            );
        };
        let clear = Some(settings.clear_sequence.clone()).filter(|s| !s.trim().is_empty());
        Ok(Self::new(program)
            .with_batch(settings.batch)
            .with_clear_sequence(clear))
    }

    /// Submit all steps of an exchange in one invocation (default) or one by one.
    pub fn with_batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Control sequence used by `clear`. `None` makes `clear` a no-op.
    pub fn with_clear_sequence(mut self, sequence: Option<String>) -> Self {
        self.clear_sequence = sequence;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one invocation (program name excluded).
    pub fn build_args(target: &Target, steps: &[DeliveryStep]) -> Vec<String> {
        let mut args = Vec::with_capacity(steps.len() * 2 + 3);
        args.push(target.name.clone());
        if let Some(title) = &target.window_title {
            args.push(WINDOW_FLAG.to_string());
            args.push(title.clone());
        }
        for step in steps {
            if step.mode.is_control() {
                args.push(RAW_FLAG.to_string());
            }
            args.push(step.payload.clone());
        }
        args
    }

    fn interpret(&self, target: &Target, output: &Output) -> Result<(), DeliveryFailure> {
        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("[talkback:delivery] stdout: {}", stdout);
        debug!("[talkback:delivery] stderr: {}", stderr);

        let diagnostic = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
            (false, true) => stdout.into_owned(),
            (true, false) => stderr.into_owned(),
            (false, false) => format!("{}\n{}", stdout, stderr),
            (true, true) => format!(
                "{} exited with {}",
                self.program.display(),
                output.status
            ),
        };
        Err(DeliveryFailure::from_diagnostic(&diagnostic, &target.name))
    }

    fn launch_failure(&self, e: std::io::Error) -> DeliveryFailure {
        DeliveryFailure::unstructured(format!(
            "Failed to run delivery program {}: {}",
            self.program.display(),
            e
        ))
    }

    fn run(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        if steps.is_empty() {
            return Ok(());
        }
        debug!(
            "[talkback:delivery] send: target={} steps={}",
            target,
            steps.len()
        );
        let output = std::process::Command::new(&self.program)
            .args(Self::build_args(target, steps))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.launch_failure(e))?;
        self.interpret(target, &output)
    }

    async fn run_async(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        if steps.is_empty() {
            return Ok(());
        }
        debug!(
            "[talkback:delivery] asend: target={} steps={}",
            target,
            steps.len()
        );
        let output = tokio::process::Command::new(&self.program)
            .args(Self::build_args(target, steps))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.launch_failure(e))?;
        self.interpret(target, &output)
    }
}

impl DeliveryAgent for ExternalSender {
    fn deliver(&self, target: &Target, payload: &str, mode: PayloadMode) -> Result<(), DeliveryFailure> {
        let step = DeliveryStep {
            payload: payload.to_string(),
            mode,
        };
        self.run(target, std::slice::from_ref(&step))
    }

    fn deliver_steps(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        if self.batch {
            return self.run(target, steps);
        }
        for step in steps {
            self.run(target, std::slice::from_ref(step))?;
        }
        Ok(())
    }

    fn clear(&self, target: &Target) -> Result<(), DeliveryFailure> {
        match &self.clear_sequence {
            Some(sequence) => DeliveryAgent::deliver(self, target, sequence, PayloadMode::Control),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AsyncDeliveryAgent for ExternalSender {
    async fn deliver(&self, target: &Target, payload: &str, mode: PayloadMode) -> Result<(), DeliveryFailure> {
        let step = DeliveryStep {
            payload: payload.to_string(),
            mode,
        };
        self.run_async(target, std::slice::from_ref(&step)).await
    }

    async fn deliver_steps(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        if self.batch {
            return self.run_async(target, steps).await;
        }
        for step in steps {
            self.run_async(target, std::slice::from_ref(step)).await?;
        }
        Ok(())
    }

    async fn clear(&self, target: &Target) -> Result<(), DeliveryFailure> {
        match &self.clear_sequence {
            Some(sequence) => AsyncDeliveryAgent::deliver(self, target, sequence, PayloadMode::Control).await,
            None => Ok(()),
        }
    }
}
