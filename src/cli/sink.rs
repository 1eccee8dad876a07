//! Sink command implementation

use anyhow::{Context, Result};

use talkback::Config;
use talkback::sink::Sink;

/// Send each fragment as one datagram, optionally followed by the sentinel.
pub fn sink_command(config: &Config, fragments: &[String], finish: bool) -> Result<()> {
    let sink = Sink::connect(&config.listener)
        .with_context(|| format!("Failed to reach udp://{}", config.listener.endpoint()))?;

    for fragment in fragments {
        sink.send(fragment)
            .with_context(|| format!("Failed to send {:?}", fragment))?;
    }
    if finish {
        sink.finish(&config.reply).context("Failed to send the sentinel")?;
    }
    Ok(())
}
