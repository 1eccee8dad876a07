//! Listen command implementation

use anyhow::{Context, Result};
use std::sync::Arc;

use talkback::config::ListenerSettings;
use talkback::listener::{Datagram, DatagramListener};

/// Print every received datagram until Ctrl+C.
pub async fn listen_command(settings: ListenerSettings) -> Result<()> {
    let listener = DatagramListener::new(settings);
    listener.register(Arc::new(|datagram: &Datagram| -> anyhow::Result<()> {
        println!(
            "[{}] {}: {}",
            datagram.received_at.format("%H:%M:%S%.3f"),
            datagram.origin,
            datagram.text
        );
        Ok(())
    }));

    let scope = listener.scoped().context("Failed to start the listener")?;
    if let Some(addr) = scope.local_addr() {
        println!("Listening on udp://{} (Ctrl+C to stop)", addr);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl+C")?;
    Ok(())
}
