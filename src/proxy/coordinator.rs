//! Concurrent probing of a whole proxy list

use crate::error::Error;
use crate::proxy::checker::ProbeClassifier;
use crate::proxy::models::{Proxy, ProxyVerdict, RunEvent, RunReport, RunSummary};
use futures::stream::{Stream, StreamExt};
use reqwest::Url;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// Default number of trials per proxy
pub const DEFAULT_TRIALS: u32 = 3;

/// Default number of concurrently tested proxies
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Configuration for a probe run
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Trials run against every proxy, one after another
    pub trials: u32,
    /// Successful trials needed for a proxy to count as working
    pub required_successes: u32,
    /// Proxies tested at the same time; 0 lets every proxy start at once
    pub max_workers: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            required_successes: DEFAULT_TRIALS,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trial count; the success threshold follows it
    pub fn with_trials(mut self, trials: u32) -> Self {
        self.trials = trials;
        self.required_successes = trials;
        self
    }

    pub fn with_required_successes(mut self, required: u32) -> Self {
        self.required_successes = required;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Reject trial settings under which no verdict makes sense
    pub fn validate(&self) -> Result<(), Error> {
        if self.trials == 0 {
            return Err(Error::InvalidConfig("trials must be at least 1".into()));
        }
        if self.required_successes == 0 || self.required_successes > self.trials {
            return Err(Error::InvalidConfig(format!(
                "required successes must be between 1 and {} (got {})",
                self.trials, self.required_successes
            )));
        }
        Ok(())
    }
}

/// Fans a proxy list out to one worker per proxy and collects verdicts
#[derive(Debug, Clone)]
pub struct ProbeCoordinator {
    classifier: Arc<ProbeClassifier>,
    config: CoordinatorConfig,
}

impl ProbeCoordinator {
    pub fn new(classifier: ProbeClassifier, config: CoordinatorConfig) -> Self {
        Self {
            classifier: Arc::new(classifier),
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Start testing `proxies` against `target`.
    ///
    /// Returns immediately with a [`ProbeRun`] that yields result lines as
    /// trials complete. Fails before spawning anything when `proxies` is
    /// empty, `target` is not an absolute URL, or the trial settings are
    /// invalid.
    pub fn start(&self, proxies: Vec<Proxy>, target: &str) -> Result<ProbeRun, Error> {
        self.config.validate()?;

        if proxies.is_empty() {
            return Err(Error::EmptyInput);
        }

        let target = Url::parse(target).map_err(|e| Error::InvalidTarget {
            url: target.to_string(),
            reason: e.to_string(),
        })?;

        let total = proxies.len();
        let trials = self.config.trials;
        // Room for every trial line plus one verdict line per proxy
        let capacity = total * (trials as usize + 1);
        let (tx, rx) = mpsc::channel(capacity);

        info!(
            proxies = total,
            trials,
            max_workers = self.config.max_workers,
            url = %target,
            "starting probe run"
        );

        let driver = tokio::spawn(drive(
            proxies,
            Arc::new(target),
            Arc::clone(&self.classifier),
            self.config.clone(),
            tx,
        ));

        Ok(ProbeRun {
            events: rx,
            driver,
            total,
            trials,
        })
    }

    /// Test `proxies` and block until every proxy has a verdict.
    ///
    /// `on_event` sees every result line in arrival order.
    pub async fn run<F>(
        &self,
        proxies: Vec<Proxy>,
        target: &str,
        mut on_event: F,
    ) -> Result<RunReport, Error>
    where
        F: FnMut(&RunEvent),
    {
        let mut run = self.start(proxies, target)?;
        while let Some(event) = run.next().await {
            on_event(&event);
        }
        run.finish().await
    }
}

/// Spawns workers behind the admission gate and gathers their verdicts
async fn drive(
    proxies: Vec<Proxy>,
    target: Arc<Url>,
    classifier: Arc<ProbeClassifier>,
    config: CoordinatorConfig,
    tx: mpsc::Sender<RunEvent>,
) -> Result<Vec<ProxyVerdict>, Error> {
    let gate = (config.max_workers > 0).then(|| Arc::new(Semaphore::new(config.max_workers)));
    let mut workers = JoinSet::new();

    for proxy in proxies {
        let permit = match &gate {
            Some(gate) => Some(
                Arc::clone(gate)
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Worker(e.to_string()))?,
            ),
            None => None,
        };

        let classifier = Arc::clone(&classifier);
        let target = Arc::clone(&target);
        let tx = tx.clone();
        let config = config.clone();

        workers.spawn(async move {
            let verdict = test_proxy(proxy, &target, &classifier, &config, &tx).await;
            drop(permit);
            verdict
        });
    }

    // Workers hold the remaining senders; the stream ends when the last one finishes
    drop(tx);

    let mut verdicts = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(verdict) => verdicts.push(verdict),
            Err(e) => {
                error!(error = %e, "proxy worker did not finish");
                return Err(Error::Worker(e.to_string()));
            }
        }
    }

    Ok(verdicts)
}

/// Run every trial for one proxy in order and report its verdict
async fn test_proxy(
    proxy: Proxy,
    target: &Url,
    classifier: &ProbeClassifier,
    config: &CoordinatorConfig,
    tx: &mpsc::Sender<RunEvent>,
) -> ProxyVerdict {
    let mut successes = 0;

    for trial in 1..=config.trials {
        let result = classifier.probe(&proxy, target, trial).await;
        debug!(
            proxy = %proxy,
            trial,
            success = result.is_success(),
            elapsed_ms = result.elapsed_ms() as u64,
            "trial finished"
        );
        if result.is_success() {
            successes += 1;
        }
        // The receiver only disappears if the caller dropped the run
        let _ = tx.send(RunEvent::Trial(result)).await;
    }

    let verdict = ProxyVerdict::new(proxy, successes, config.trials, config.required_successes);
    let _ = tx.send(RunEvent::Verdict(verdict.clone())).await;
    verdict
}

/// A run in progress.
///
/// Implements [`Stream`] over result lines; the stream ends once every
/// worker has finished. Call [`ProbeRun::finish`] for the verdicts and
/// summary.
pub struct ProbeRun {
    events: mpsc::Receiver<RunEvent>,
    driver: JoinHandle<Result<Vec<ProxyVerdict>, Error>>,
    total: usize,
    trials: u32,
}

impl ProbeRun {
    /// Number of proxies in this run
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn trials(&self) -> u32 {
        self.trials
    }

    /// Drain any remaining lines, wait for all workers, and summarize
    pub async fn finish(mut self) -> Result<RunReport, Error> {
        while self.events.recv().await.is_some() {}

        let verdicts = self
            .driver
            .await
            .map_err(|e| Error::Worker(e.to_string()))??;

        let working: Vec<Proxy> = verdicts
            .iter()
            .filter(|v| v.working)
            .map(|v| v.proxy.clone())
            .collect();
        let summary = RunSummary::new(self.total, working.len())?;

        info!(
            total = summary.total,
            working = summary.working,
            rate = summary.rate,
            "probe run finished"
        );

        Ok(RunReport {
            verdicts,
            working,
            summary,
        })
    }
}

impl Stream for ProbeRun {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_coordinator_config_default() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.trials, DEFAULT_TRIALS);
        assert_eq!(config.required_successes, DEFAULT_TRIALS);
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
    }

    #[test]
    fn test_coordinator_config_builder() {
        let config = CoordinatorConfig::new().with_trials(5).with_max_workers(0);
        assert_eq!(config.trials, 5);
        assert_eq!(config.required_successes, 5);
        assert_eq!(config.max_workers, 0);

        let config = config.with_required_successes(4);
        assert_eq!(config.required_successes, 4);
    }

    #[test]
    fn test_coordinator_config_validate() {
        assert!(CoordinatorConfig::default().validate().is_ok());
        assert!(CoordinatorConfig::new()
            .with_required_successes(1)
            .validate()
            .is_ok());

        for config in [
            CoordinatorConfig::new().with_trials(0),
            CoordinatorConfig::new().with_required_successes(0),
            CoordinatorConfig::new().with_trials(2).with_required_successes(3),
        ] {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }

    #[tokio::test]
    async fn test_invalid_trial_settings_are_rejected() {
        let proxies = vec![Proxy::new("127.0.0.1:8080")];

        let zero = ProbeCoordinator::new(
            ProbeClassifier::default(),
            CoordinatorConfig::new().with_trials(0),
        );
        assert!(matches!(
            zero.start(proxies.clone(), "http://www.example.com"),
            Err(Error::InvalidConfig(_))
        ));

        let unreachable = ProbeCoordinator::new(
            ProbeClassifier::default(),
            CoordinatorConfig::new().with_required_successes(4),
        );
        assert!(matches!(
            unreachable.start(proxies, "http://www.example.com"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let coordinator = ProbeCoordinator::new(ProbeClassifier::default(), CoordinatorConfig::default());
        let result = coordinator.start(Vec::new(), "http://www.example.com");
        assert!(matches!(result, Err(Error::EmptyInput)));
    }

    #[tokio::test]
    async fn test_relative_target_is_rejected() {
        let coordinator = ProbeCoordinator::new(ProbeClassifier::default(), CoordinatorConfig::default());
        let result = coordinator.start(vec![Proxy::new("127.0.0.1:8080")], "example.com");
        assert!(matches!(result, Err(Error::InvalidTarget { .. })));
    }

    #[tokio::test]
    async fn test_malformed_proxies_never_pass() {
        let classifier = ProbeClassifier::new(Duration::from_millis(200));
        let coordinator = ProbeCoordinator::new(classifier, CoordinatorConfig::new().with_max_workers(1));
        let proxies = vec![Proxy::new("[::1"), Proxy::new("127.0.0.1:99999")];

        let mut lines = Vec::new();
        let report = coordinator
            .run(proxies, "http://www.example.com", |event| lines.push(event.to_string()))
            .await
            .unwrap();

        assert_eq!(lines.len(), 8);
        assert_eq!(report.verdicts.len(), 2);
        assert!(report.working.is_empty());
        assert_eq!(report.summary, RunSummary::new(2, 0).unwrap());
        assert!(lines
            .iter()
            .any(|l| l == "✗ [::1 failed (0/3 successful)"));
    }
}
