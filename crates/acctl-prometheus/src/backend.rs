use acctl_core::{Event, EventKind, Subscribe};
use acctl_model::MetricsSnapshot;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

/// Prometheus collectors for one controller, held in a private [`Registry`].
///
/// Cloning is cheap; clones share the same collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,

    admissions: IntCounterVec,
    releases: IntCounterVec,
    stale_releases: IntCounter,
    cancellations: IntCounter,
    cooldowns: IntCounter,
    suspensions: IntCounter,

    accounts_tracked: IntGauge,
    accounts_running: IntGauge,
    accounts_waiting: IntGauge,
    tasks_queued_waiting: IntGauge,
    accounts_cooldown: IntGauge,
    accounts_suspended: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register all collectors in `registry`.
    ///
    /// Fails if a collector with the same name is already registered there.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let admissions = IntCounterVec::new(
            Opts::new("acctl_admissions_total", "Admission decisions by outcome"),
            &["outcome"],
        )?;
        let releases = IntCounterVec::new(
            Opts::new("acctl_releases_total", "Accepted releases by outcome"),
            &["outcome"],
        )?;
        let stale_releases = IntCounter::new(
            "acctl_stale_releases_total",
            "Releases rejected for an unknown account or mismatching task",
        )?;
        let cancellations =
            IntCounter::new("acctl_cancellations_total", "Waiting tasks cancelled")?;
        let cooldowns = IntCounter::new("acctl_cooldowns_total", "Cooldowns set on accounts")?;
        let suspensions = IntCounter::new("acctl_suspensions_total", "Accounts suspended")?;

        let accounts_tracked =
            IntGauge::new("acctl_accounts_tracked", "Accounts known to the controller")?;
        let accounts_running =
            IntGauge::new("acctl_accounts_running", "Accounts currently running a task")?;
        let accounts_waiting =
            IntGauge::new("acctl_accounts_waiting", "Accounts with a non-empty waiting queue")?;
        let tasks_queued_waiting = IntGauge::new(
            "acctl_tasks_queued_waiting",
            "Tasks waiting across all accounts",
        )?;
        let accounts_cooldown =
            IntGauge::new("acctl_accounts_cooldown", "Accounts in cooldown")?;
        let accounts_suspended =
            IntGauge::new("acctl_accounts_suspended", "Accounts suspended")?;

        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(releases.clone()))?;
        registry.register(Box::new(stale_releases.clone()))?;
        registry.register(Box::new(cancellations.clone()))?;
        registry.register(Box::new(cooldowns.clone()))?;
        registry.register(Box::new(suspensions.clone()))?;
        registry.register(Box::new(accounts_tracked.clone()))?;
        registry.register(Box::new(accounts_running.clone()))?;
        registry.register(Box::new(accounts_waiting.clone()))?;
        registry.register(Box::new(tasks_queued_waiting.clone()))?;
        registry.register(Box::new(accounts_cooldown.clone()))?;
        registry.register(Box::new(accounts_suspended.clone()))?;

        Ok(Self {
            registry,
            admissions,
            releases,
            stale_releases,
            cancellations,
            cooldowns,
            suspensions,
            accounts_tracked,
            accounts_running,
            accounts_waiting,
            tasks_queued_waiting,
            accounts_cooldown,
            accounts_suspended,
        })
    }

    /// Copy a controller snapshot into the gauges.
    pub fn observe(&self, snapshot: &MetricsSnapshot) {
        self.accounts_tracked.set(as_gauge(snapshot.total_accounts_tracked));
        self.accounts_running.set(as_gauge(snapshot.accounts_running));
        self.accounts_waiting.set(as_gauge(snapshot.accounts_waiting));
        self.tasks_queued_waiting.set(as_gauge(snapshot.total_tasks_queued_waiting));
        self.accounts_cooldown.set(as_gauge(snapshot.accounts_cooldown));
        self.accounts_suspended.set(as_gauge(snapshot.accounts_suspended));
    }

    fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready to serve on `/metrics`.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Subscribe for PrometheusMetrics {
    fn on_event(&self, event: &Event) {
        match event.kind {
            EventKind::Admitted => self.admissions.with_label_values(&["admitted"]).inc(),
            EventKind::Queued => self.admissions.with_label_values(&["queued"]).inc(),
            EventKind::Promoted => self.admissions.with_label_values(&["promoted"]).inc(),
            EventKind::Released => {
                let outcome = event.reason.as_deref().unwrap_or("unknown");
                self.releases.with_label_values(&[outcome]).inc();
            }
            EventKind::StaleRelease => self.stale_releases.inc(),
            EventKind::Cancelled => self.cancellations.inc(),
            EventKind::CooldownSet => self.cooldowns.inc(),
            EventKind::Suspended => self.suspensions.inc(),
            EventKind::CooldownCleared | EventKind::Resumed => {}
        }
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}

fn as_gauge(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
