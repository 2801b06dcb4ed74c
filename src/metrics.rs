//! singleton のメトリクス。

use prometrics::metrics::{Counter, Gauge, Histogram, HistogramBuilder, MetricBuilder};

use crate::{Error, Result};

/// `singleton` 全体に関するメトリクス。
#[derive(Clone)]
pub struct SingletonMetrics {
    pub(crate) coordinator: CoordinatorMetrics,
}
impl SingletonMetrics {
    pub(crate) fn new(builder: &MetricBuilder) -> Result<Self> {
        let coordinator = track!(CoordinatorMetrics::new(builder))?;
        Ok(Self { coordinator })
    }

    /// コーディネータに関するメトリクスを返す。
    pub fn coordinator(&self) -> &CoordinatorMetrics {
        &self.coordinator
    }
}

/// コーディネータの状態遷移とコマンド送受信に関するメトリクス。
#[derive(Clone)]
pub struct CoordinatorMetrics {
    pub(crate) elections_total: Counter,
    pub(crate) epoch: Gauge,
    pub(crate) no_quorum_total: Counter,
    pub(crate) transit_to_primary_total: Counter,
    pub(crate) transit_to_backup_total: Counter,
    pub(crate) transit_to_inactive_total: Counter,
    pub(crate) commands_sent_total: Counter,
    pub(crate) commands_deferred_total: Counter,
    pub(crate) stale_commands_total: Counter,
    pub(crate) listener_failures_total: Counter,
    pub(crate) service_failures_total: Counter,
    pub(crate) activation_duration_seconds: Histogram,
}
impl CoordinatorMetrics {
    pub(crate) fn new(builder: &MetricBuilder) -> Result<Self> {
        let mut builder: MetricBuilder = builder.clone();
        builder.subsystem("coordinator");
        let elections_total = track!(builder
            .counter("elections_total")
            .help("Number of committed election changes")
            .finish())?;
        let epoch = track!(builder
            .gauge("epoch")
            .help("Current election epoch")
            .finish())?;
        let no_quorum_total = track!(builder
            .counter("no_quorum_total")
            .help("Number of elections rejected by the quorum")
            .finish())?;
        let transit_to_primary_total = track!(builder
            .counter("transit_to_primary_total")
            .help("Number of transitions to primary role")
            .finish())?;
        let transit_to_backup_total = track!(builder
            .counter("transit_to_backup_total")
            .help("Number of transitions to backup role")
            .finish())?;
        let transit_to_inactive_total = track!(builder
            .counter("transit_to_inactive_total")
            .help("Number of transitions to inactive role")
            .finish())?;
        let commands_sent_total = track!(builder
            .counter("commands_sent_total")
            .help("Number of activation commands delivered")
            .finish())?;
        let commands_deferred_total = track!(builder
            .counter("commands_deferred_total")
            .help("Number of activation commands given up after retries")
            .finish())?;
        let stale_commands_total = track!(builder
            .counter("stale_commands_total")
            .help("Number of discarded incoming commands")
            .finish())?;
        let listener_failures_total = track!(builder
            .counter("listener_failures_total")
            .help("Number of election listener failures")
            .finish())?;
        let service_failures_total = track!(builder
            .counter("service_failures_total")
            .help("Number of managed service start/stop failures")
            .finish())?;
        let activation_duration_seconds = track!(make_activation_histogram(
            builder
                .histogram("activation_duration_seconds")
                .help("Elapsed time starting a managed service")
        ))?;
        Ok(Self {
            elections_total,
            epoch,
            no_quorum_total,
            transit_to_primary_total,
            transit_to_backup_total,
            transit_to_inactive_total,
            commands_sent_total,
            commands_deferred_total,
            stale_commands_total,
            listener_failures_total,
            service_failures_total,
            activation_duration_seconds,
        })
    }

    /// 確定した選出結果の変化の数を返す。
    pub fn elections_total(&self) -> u64 {
        self.elections_total.value() as u64
    }

    /// 破棄された受信コマンドの数を返す。
    pub fn stale_commands_total(&self) -> u64 {
        self.stale_commands_total.value() as u64
    }

    /// 再送を諦めたコマンドの数を返す。
    pub fn commands_deferred_total(&self) -> u64 {
        self.commands_deferred_total.value() as u64
    }

    /// リスナーの失敗数を返す。
    pub fn listener_failures_total(&self) -> u64 {
        self.listener_failures_total.value() as u64
    }
}

fn make_activation_histogram(builder: &mut HistogramBuilder) -> Result<Histogram> {
    builder
        .bucket(0.001)
        .bucket(0.005)
        .bucket(0.01)
        .bucket(0.05)
        .bucket(0.1)
        .bucket(0.5)
        .bucket(1.0)
        .bucket(5.0)
        .bucket(10.0)
        .bucket(30.0)
        .bucket(60.0)
        .finish()
        .map_err(|e| track!(Error::from(e)))
}
