//! Status recorder.
//!
//! Wraps every reconciliation pass and mirrors its outcome into
//! `status.failureMessage`: the error text on failure, empty on success. The
//! status is written only when the message changes.

use crate::reconciler::PassOutcome;
use crate::store::ClusterConfigStore;
use crds::{AKSClusterConfig, ClusterPhase};
use kube::ResourceExt;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct StatusRecorder {
    configs: Arc<dyn ClusterConfigStore>,
}

impl StatusRecorder {
    pub fn new(configs: Arc<dyn ClusterConfigStore>) -> Self {
        Self { configs }
    }

    /// Run `pass` on `config` and record its error, if any.
    ///
    /// A failure on an `active` record also moves it to `updating` so the
    /// next pass goes back through convergence.
    pub async fn record<F, Fut>(&self, config: AKSClusterConfig, pass: F) -> PassOutcome
    where
        F: FnOnce(AKSClusterConfig) -> Fut,
        Fut: Future<Output = PassOutcome>,
    {
        let PassOutcome { config, result } = pass(config).await;
        // Deleting; nothing to persist
        let Some(config) = config else {
            return PassOutcome { config: None, result };
        };

        let message = match &result {
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        };
        if config.failure_message() == message {
            return PassOutcome {
                config: Some(config),
                result,
            };
        }

        let mut updated = config.clone();
        if !message.is_empty() && updated.phase() == Ok(ClusterPhase::Active) {
            updated.set_phase(ClusterPhase::Updating);
        }
        updated.set_failure_message(message);

        match self.configs.update_status(&updated).await {
            Ok(stored) => PassOutcome {
                config: Some(stored),
                result,
            },
            Err(e) => {
                error!("Error recording AKSClusterConfig [{}] failure message: {}", config.name_any(), e);
                PassOutcome {
                    config: Some(config),
                    result,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::reconciler::Requeue;
    use crate::test_utils::{test_config, valid_spec, Harness};

    fn failing(message: &'static str) -> impl FnOnce(AKSClusterConfig) -> std::future::Ready<PassOutcome> {
        move |config| {
            std::future::ready(PassOutcome {
                config: Some(config),
                result: Err(ControllerError::ClusterFailed(message.to_string())),
            })
        }
    }

    fn succeeding(config: AKSClusterConfig) -> std::future::Ready<PassOutcome> {
        std::future::ready(PassOutcome {
            config: Some(config),
            result: Ok(Requeue::AwaitChange),
        })
    }

    #[tokio::test]
    async fn test_same_error_twice_writes_once() {
        let harness = Harness::new();
        let recorder = harness.recorder();
        let mut config = test_config("prod", valid_spec());
        config.set_phase(ClusterPhase::Creating);

        let first = recorder.record(config, failing("boom")).await;
        assert!(first.result.is_err());
        let stored = first.config.unwrap();
        assert_eq!(stored.failure_message(), "boom");

        let second = recorder.record(stored, failing("boom")).await;
        assert!(second.result.is_err());
        assert_eq!(harness.configs.writes(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_active_moves_to_updating() {
        let harness = Harness::new();
        let mut config = test_config("prod", valid_spec());
        config.set_phase(ClusterPhase::Active);

        let outcome = harness.recorder().record(config, failing("throttled")).await;
        let stored = outcome.config.unwrap();
        assert_eq!(stored.phase(), Ok(ClusterPhase::Updating));
        assert_eq!(stored.failure_message(), "throttled");
    }

    #[tokio::test]
    async fn test_success_clears_message_once() {
        let harness = Harness::new();
        let recorder = harness.recorder();
        let mut config = test_config("prod", valid_spec());
        config.set_phase(ClusterPhase::Active);
        config.set_failure_message("old failure");

        let outcome = recorder.record(config, succeeding).await;
        let stored = outcome.config.unwrap();
        assert_eq!(stored.failure_message(), "");
        assert_eq!(stored.phase(), Ok(ClusterPhase::Active));

        recorder.record(stored, succeeding).await;
        assert_eq!(harness.configs.writes(), 1);
    }

    #[tokio::test]
    async fn test_deleting_record_is_not_persisted() {
        let harness = Harness::new();
        let outcome = harness
            .recorder()
            .record(test_config("prod", valid_spec()), |_| {
                std::future::ready(PassOutcome {
                    config: None,
                    result: Err(ControllerError::ClusterFailed("gone".to_string())),
                })
            })
            .await;
        assert!(outcome.config.is_none());
        assert!(outcome.result.is_err());
        assert_eq!(harness.configs.writes(), 0);
    }
}
