//! Shared test utilities for talkback integration tests

#![allow(dead_code)]

use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use talkback::Config;
use talkback::delivery::{DeliveryAgent, DeliveryFailure};
use talkback::{DeliveryStep, PayloadMode, Target};

/// Config that binds the listener to an OS-assigned loopback port.
pub fn loopback_config() -> Config {
    let mut config = Config::default();
    config.listener.address = "127.0.0.1".to_string();
    config.listener.port = 0;
    config
}

/// Delivery agent that records steps and optionally fails on one of them.
#[derive(Default)]
pub struct ScriptedAgent {
    pub delivered: Mutex<Vec<DeliveryStep>>,
    pub fail_at: Option<(usize, DeliveryFailure)>,
    /// Fragments sent to `reply_to` once a whole exchange was delivered
    pub reply: Mutex<Option<(SocketAddr, Vec<String>)>>,
}

impl ScriptedAgent {
    pub fn failing_at(step: usize, failure: DeliveryFailure) -> Self {
        Self {
            fail_at: Some((step, failure)),
            ..Self::default()
        }
    }

    pub fn replying(&self, to: SocketAddr, fragments: &[&str]) {
        *self.reply.lock().unwrap() =
            Some((to, fragments.iter().map(|f| f.to_string()).collect()));
    }

    pub fn delivered(&self) -> Vec<DeliveryStep> {
        self.delivered.lock().unwrap().clone()
    }
}

impl DeliveryAgent for ScriptedAgent {
    fn deliver(&self, _target: &Target, payload: &str, mode: PayloadMode) -> Result<(), DeliveryFailure> {
        let mut delivered = self.delivered.lock().unwrap();
        if let Some((step, failure)) = &self.fail_at {
            if delivered.len() == *step {
                return Err(failure.clone());
            }
        }
        delivered.push(DeliveryStep {
            payload: payload.to_string(),
            mode,
        });
        Ok(())
    }

    fn deliver_steps(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        for step in steps {
            self.deliver(target, &step.payload, step.mode)?;
        }
        if let Some((to, fragments)) = self.reply.lock().unwrap().take() {
            send_datagrams(to, &fragments);
        }
        Ok(())
    }
}

/// Send each fragment as one datagram from an ephemeral socket.
pub fn send_datagrams<S: AsRef<str>>(to: SocketAddr, fragments: &[S]) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind sender socket");
    for fragment in fragments {
        socket
            .send_to(fragment.as_ref().as_bytes(), to)
            .expect("Failed to send datagram");
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Write an executable shell script standing in for the delivery program.
#[cfg(unix)]
pub fn fake_program(body: &str) -> (TempDir, PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("send-keys");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    let mut perms = std::fs::metadata(&path)
        .expect("Failed to stat script")
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("Failed to chmod script");
    (dir, path)
}
