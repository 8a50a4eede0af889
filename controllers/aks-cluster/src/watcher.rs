//! AKSClusterConfig watcher.
//!
//! Runs a `kube_runtime::Controller` over AKSClusterConfigs. A finalizer
//! routes deletions to the removal workflow and every other change through
//! the status recorder into the phase state machine.

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::{Reconciler, Requeue};
use crate::recorder::StatusRecorder;
use crate::store::namespace_of;
use crds::AKSClusterConfig;
use futures::StreamExt;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::finalizer::{finalizer, Event};
use kube_runtime::{watcher, Controller};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Finalizer holding AKSClusterConfigs until their cluster is removed
pub const FINALIZER: &str = "aks.microscaler.io/cluster-cleanup";

/// Debounce window applied to watch events before reconciling
const DEBOUNCE: Duration = Duration::from_secs(5);

/// Turns pass results into controller actions.
///
/// Tracks a Fibonacci backoff per record (namespace/name) for transient
/// errors; a successful pass resets it.
#[derive(Debug)]
pub struct RequeuePolicy {
    resync_interval: Duration,
    backoff_min_minutes: u64,
    backoff_max_minutes: u64,
    backoff_states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl RequeuePolicy {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            resync_interval: config.resync_interval,
            backoff_min_minutes: config.backoff_min_minutes,
            backoff_max_minutes: config.backoff_max_minutes,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Action for a successful pass
    pub fn action(&self, requeue: Requeue) -> Action {
        match requeue {
            Requeue::Now => Action::requeue(Duration::ZERO),
            Requeue::After(delay) => Action::requeue(delay),
            // Converged; come back at the resync interval to catch drift made outside the controller
            Requeue::AwaitChange => Action::requeue(self.resync_interval),
        }
    }

    /// Restart the backoff sequence for `key` after a successful pass
    pub fn reset(&self, key: &str) {
        let mut states = self.backoff_states.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(backoff) = states.get_mut(key) {
            backoff.reset();
        }
    }

    /// Next backoff delay for `key`
    pub fn next_backoff(&self, key: &str) -> Duration {
        let mut states = self.backoff_states.lock().unwrap_or_else(|e| e.into_inner());
        states
            .entry(key.to_string())
            .or_insert_with(|| FibonacciBackoff::new(self.backoff_min_minutes, self.backoff_max_minutes))
            .next_backoff()
    }

    /// Action for a failed pass
    pub fn on_error(&self, key: &str, error: &ControllerError) -> Action {
        if error.is_terminal() {
            warn!("Reconciliation of [{}] failed, waiting for a spec change: {}", key, error);
            return Action::await_change();
        }
        let delay = self.next_backoff(key);
        error!(
            "Reconciliation of [{}] failed, retrying in {}s: {}",
            key,
            delay.as_secs(),
            error
        );
        Action::requeue(delay)
    }
}

/// Shared state handed to every reconcile call
pub struct Context {
    client: Client,
    reconciler: Reconciler,
    recorder: StatusRecorder,
    policy: RequeuePolicy,
}

impl Context {
    pub fn new(client: Client, reconciler: Reconciler, recorder: StatusRecorder, policy: RequeuePolicy) -> Self {
        Self {
            client,
            reconciler,
            recorder,
            policy,
        }
    }

    async fn apply(&self, config: &AKSClusterConfig) -> Result<Action, ControllerError> {
        let outcome = self
            .recorder
            .record(config.clone(), |config| self.reconciler.on_change(config))
            .await;
        outcome.result.map(|requeue| self.policy.action(requeue))
    }

    async fn cleanup(&self, config: &AKSClusterConfig) -> Result<Action, ControllerError> {
        self.reconciler.on_remove(config).await?;
        Ok(Action::await_change())
    }
}

fn resource_key(config: &AKSClusterConfig) -> String {
    format!("{}/{}", namespace_of(config), config.name_any())
}

async fn reconcile(config: Arc<AKSClusterConfig>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = resource_key(&config);
    debug!("Reconciling AKSClusterConfig [{}]", key);

    let api: Api<AKSClusterConfig> = Api::namespaced(ctx.client.clone(), &namespace_of(config.as_ref()));
    let handler = Arc::clone(&ctx);
    let action = finalizer(&api, FINALIZER, config, |event| async move {
        match event {
            Event::Apply(config) => handler.apply(&config).await,
            Event::Cleanup(config) => handler.cleanup(&config).await,
        }
    })
    .await
    .map_err(|e| ControllerError::Finalizer(Box::new(e)))?;

    ctx.policy.reset(&key);
    Ok(action)
}

fn error_policy(config: Arc<AKSClusterConfig>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    ctx.policy.on_error(&resource_key(&config), error)
}

/// Watch AKSClusterConfigs until the watch stream ends
pub async fn watch_cluster_configs(
    api: Api<AKSClusterConfig>,
    ctx: Arc<Context>,
    concurrency: u16,
) -> Result<(), ControllerError> {
    info!("Starting AKSClusterConfig watcher");

    let runtime_config = RuntimeConfig::default().debounce(DEBOUNCE).concurrency(concurrency);
    Controller::new(api, watcher::Config::default())
        .with_config(runtime_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((object, _)) => debug!("Reconciled AKSClusterConfig [{}]", object.name),
                Err(e) => error!("Controller error for AKSClusterConfig: {}", e),
            }
        })
        .await;

    Ok(())
}
