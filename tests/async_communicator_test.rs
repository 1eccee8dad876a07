//! Integration tests for AsyncCommunicator

mod common;

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use talkback::delivery::{DeliveryFailure, FailureReason, Offloaded};
use talkback::{AsyncCommunicator, DeliveryStep, Target};

use common::{ScriptedAgent, loopback_config, send_datagrams};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_reply_round_trip() {
    let config = loopback_config();
    let agent = Offloaded::new(ScriptedAgent::default());
    let scripted = Arc::clone(&agent.0);
    let comm = AsyncCommunicator::new(Target::new("Claude"), Arc::new(agent), &config);
    let session = comm.listen().unwrap();

    scripted.replying(
        session.local_addr().unwrap(),
        &["Hello", "</>", "World", "<exit>"],
    );
    let reply: Vec<String> = session
        .communicate("Hi")
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(reply, vec!["Hello", "</>", "World"]);
    assert_eq!(scripted.delivered()[0], DeliveryStep::literal("Hi"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_failed_send_keeps_reason() {
    let config = loopback_config();
    let agent = Offloaded::new(ScriptedAgent::failing_at(
        0,
        DeliveryFailure::from_diagnostic("Process 'Claude' was not found.", "Claude"),
    ));
    let comm = AsyncCommunicator::new(Target::new("Claude"), Arc::new(agent), &config);
    let _session = comm.listen().unwrap();

    let err = comm.send("Hi").await.unwrap_err();
    assert_eq!(err.reason(), FailureReason::TargetNotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_backpressure_keeps_every_fragment() {
    let mut config = loopback_config();
    config.mailbox.capacity = 1;
    let comm = AsyncCommunicator::new(
        Target::new("Claude"),
        Arc::new(Offloaded::new(ScriptedAgent::default())),
        &config,
    );
    let session = comm.listen().unwrap();
    let addr = session.local_addr().unwrap();

    let fragments: Vec<String> = (0..10).map(|i| format!("f{}", i)).collect();
    let mut datagrams = fragments.clone();
    datagrams.push("<exit>".to_string());
    let sender = tokio::task::spawn_blocking(move || {
        for datagram in &datagrams {
            send_datagrams(addr, &[datagram]);
            std::thread::sleep(Duration::from_millis(2));
        }
    });

    let reply: Vec<String> = tokio::time::timeout(
        Duration::from_secs(5),
        session.receive().map(Result::unwrap).collect::<Vec<_>>(),
    )
    .await
    .unwrap();
    sender.await.unwrap();
    assert_eq!(reply, fragments);
}
