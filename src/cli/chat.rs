//! Chat command implementation

use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use talkback::{AsyncCommunicator, Config, ReplyPolicy};

const CLEAR_COMMAND: &str = "/clear";
const QUIT_COMMAND: &str = "/quit";

/// Interactive loop: read a line, send it, print the reply.
///
/// `/clear` empties the target's input, `/quit` or Ctrl+C leaves.
pub async fn chat_command(config: Config) -> Result<()> {
    let comm = AsyncCommunicator::from_config(&config)?;
    let session = comm
        .listen()
        .context("Failed to start the reply listener")?;

    println!(
        "Talking to {} (replies on udp://{}). {} to quit.",
        session.target(),
        session
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| config.listener.endpoint()),
        QUIT_COMMAND
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let message = line.trim();

        match message {
            "" => continue,
            QUIT_COMMAND => break,
            CLEAR_COMMAND => {
                if let Err(e) = session.clear().await {
                    eprintln!("{}: {}", e.reason(), e.message());
                }
                continue;
            }
            _ => {}
        }

        let reply = match session.communicate(message).await {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("{}: {}", e.reason(), e.message());
                if e.is_retryable() {
                    eprintln!("Restore the target window and try again.");
                }
                continue;
            }
        };

        tokio::select! {
            result = print_reply(reply, session.mailbox().policy()) => result?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    println!("Bye.");
    Ok(())
}

async fn print_reply<S>(reply: S, policy: &ReplyPolicy) -> Result<()>
where
    S: futures::Stream<Item = Result<String, talkback::RecvError>>,
{
    futures::pin_mut!(reply);
    let mut stdout = std::io::stdout();
    while let Some(fragment) = reply.next().await {
        let fragment = fragment?;
        if policy.is_paragraph_break(&fragment) {
            writeln!(stdout)?;
        } else {
            write!(stdout, "{} ", fragment)?;
        }
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
