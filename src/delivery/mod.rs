//! Out-of-band delivery of outgoing text to the target process.
//!
//! The actual side channel is an external program (see [`ExternalSender`]).
//! The communicators only see the [`DeliveryAgent`] / [`AsyncDeliveryAgent`]
//! traits, so tests and alternative mechanisms can be swapped in.
//!
//! An exchange is an ordered list of [`DeliveryStep`]s produced by an
//! [`ExchangeBuilder`]. The first failing step aborts the exchange and later
//! steps are never attempted.

mod exchange;
mod external;
mod failure;

pub use exchange::{DEFAULT_INSTRUCTION, ExchangeBuilder, ExchangePolicy, StandardExchange};
pub use external::ExternalSender;
pub use failure::{DeliveryFailure, FailureReason};

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{DeliveryStep, PayloadMode, Target};

/// Blocking delivery mechanism
pub trait DeliveryAgent: Send + Sync {
    /// Deliver one payload to the target.
    fn deliver(&self, target: &Target, payload: &str, mode: PayloadMode) -> Result<(), DeliveryFailure>;

    /// Deliver an ordered exchange, stopping at the first failure.
    ///
    /// Agents that can submit several payloads atomically should override this.
    fn deliver_steps(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        for step in steps {
            self.deliver(target, &step.payload, step.mode)?;
        }
        Ok(())
    }

    /// Empty the target's pending input. No-op unless the agent supports it.
    fn clear(&self, _target: &Target) -> Result<(), DeliveryFailure> {
        Ok(())
    }
}

/// Async delivery mechanism, same contract as [`DeliveryAgent`]
#[async_trait]
pub trait AsyncDeliveryAgent: Send + Sync {
    async fn deliver(&self, target: &Target, payload: &str, mode: PayloadMode) -> Result<(), DeliveryFailure>;

    async fn deliver_steps(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        for step in steps {
            self.deliver(target, &step.payload, step.mode).await?;
        }
        Ok(())
    }

    async fn clear(&self, _target: &Target) -> Result<(), DeliveryFailure> {
        Ok(())
    }
}

/// Runs a blocking [`DeliveryAgent`] on tokio's blocking pool.
#[derive(Debug)]
pub struct Offloaded<A>(pub Arc<A>);

impl<A> Clone for Offloaded<A> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A: DeliveryAgent + 'static> Offloaded<A> {
    pub fn new(agent: A) -> Self {
        Self(Arc::new(agent))
    }

    async fn offload<T, F>(&self, f: F) -> Result<T, DeliveryFailure>
    where
        T: Send + 'static,
        F: FnOnce(&A) -> Result<T, DeliveryFailure> + Send + 'static,
    {
        let agent = Arc::clone(&self.0);
        tokio::task::spawn_blocking(move || f(agent.as_ref()))
            .await
            .map_err(|e| DeliveryFailure::unstructured(format!("Delivery task failed: {}", e)))?
    }
}

#[async_trait]
impl<A: DeliveryAgent + 'static> AsyncDeliveryAgent for Offloaded<A> {
    async fn deliver(&self, target: &Target, payload: &str, mode: PayloadMode) -> Result<(), DeliveryFailure> {
        let target = target.clone();
        let payload = payload.to_string();
        self.offload(move |agent| DeliveryAgent::deliver(agent, &target, &payload, mode)).await
    }

    async fn deliver_steps(&self, target: &Target, steps: &[DeliveryStep]) -> Result<(), DeliveryFailure> {
        let target = target.clone();
        let steps = steps.to_vec();
        self.offload(move |agent| DeliveryAgent::deliver_steps(agent, &target, &steps)).await
    }

    async fn clear(&self, target: &Target) -> Result<(), DeliveryFailure> {
        let target = target.clone();
        self.offload(move |agent| DeliveryAgent::clear(agent, &target)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Relies on the default `deliver_steps`; fails on one payload.
    struct FailsOn {
        payload: &'static str,
        attempted: Mutex<Vec<String>>,
    }

    impl FailsOn {
        fn new(payload: &'static str) -> Self {
            Self {
                payload,
                attempted: Mutex::new(Vec::new()),
            }
        }

        fn attempt(&self, payload: &str) -> Result<(), DeliveryFailure> {
            self.attempted.lock().unwrap().push(payload.to_string());
            if payload == self.payload {
                return Err(DeliveryFailure::unstructured(format!("cannot type {}", payload)));
            }
            Ok(())
        }

        fn attempted(&self) -> Vec<String> {
            self.attempted.lock().unwrap().clone()
        }
    }

    impl DeliveryAgent for FailsOn {
        fn deliver(&self, _target: &Target, payload: &str, _mode: PayloadMode) -> Result<(), DeliveryFailure> {
            self.attempt(payload)
        }
    }

    #[async_trait]
    impl AsyncDeliveryAgent for FailsOn {
        async fn deliver(&self, _target: &Target, payload: &str, _mode: PayloadMode) -> Result<(), DeliveryFailure> {
            self.attempt(payload)
        }
    }

    fn three_steps() -> Vec<DeliveryStep> {
        vec![
            DeliveryStep::literal("one"),
            DeliveryStep::control("two"),
            DeliveryStep::literal("three"),
        ]
    }

    #[test]
    fn test_default_deliver_steps_stops_at_first_failure() {
        let agent = FailsOn::new("two");
        let err = DeliveryAgent::deliver_steps(&agent, &Target::new("Claude"), &three_steps()).unwrap_err();

        assert_eq!(err.message(), "cannot type two");
        assert_eq!(agent.attempted(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_async_default_deliver_steps_stops_at_first_failure() {
        let agent = FailsOn::new("two");
        let err = AsyncDeliveryAgent::deliver_steps(&agent, &Target::new("Claude"), &three_steps())
            .await
            .unwrap_err();

        assert_eq!(err.message(), "cannot type two");
        assert_eq!(agent.attempted(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_offloaded_keeps_abort_semantics() {
        let agent = Offloaded::new(FailsOn::new("two"));
        let err = AsyncDeliveryAgent::deliver_steps(&agent, &Target::new("Claude"), &three_steps())
            .await
            .unwrap_err();

        assert_eq!(err.message(), "cannot type two");
        assert_eq!(agent.0.attempted(), vec!["one", "two"]);
    }

    #[test]
    fn test_default_clear_is_noop() {
        let agent = FailsOn::new("never");
        assert!(DeliveryAgent::clear(&agent, &Target::new("Claude")).is_ok());
        assert!(agent.attempted().is_empty());
    }
}
