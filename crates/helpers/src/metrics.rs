//! Provides access to the metrics sytem.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::net::ToSocketAddrs;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use cadence::{Metric, MetricBuilder, StatsdClient, UdpMetricSink};

use crate::config::Metrics;

static METRICS_CLIENT: OnceLock<Arc<MetricsClient>> = OnceLock::new();

thread_local! {
    static CURRENT_CLIENT: RefCell<Option<Arc<MetricsClient>>> =
        RefCell::new(METRICS_CLIENT.get().cloned());
}

/// The metrics prelude that is necessary to use the client.
pub mod prelude {
    pub use cadence::prelude::*;
}

#[derive(Debug)]
pub struct MetricsClient {
    /// The raw statsd client.
    pub statsd_client: StatsdClient,

    /// A collection of tags and values that will be sent with every metric.
    tags: BTreeMap<String, String>,
}

impl MetricsClient {
    #[inline(always)]
    pub fn send_metric<'a, T>(&'a self, mut metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        for (tag, value) in self.tags.iter() {
            metric = metric.with_tag(tag, value);
        }
        metric.send()
    }
}

impl Deref for MetricsClient {
    type Target = StatsdClient;

    fn deref(&self) -> &Self::Target {
        &self.statsd_client
    }
}

/// Tell the metrics system to report to statsd.
///
/// Fails if the host cannot be resolved, or if metrics were already configured.
///
/// Every thread keeps its own handle to the client. A thread that emitted metrics before this
/// was called picks up the client with its next metric, the metrics emitted before are lost.
pub fn configure_statsd<A: ToSocketAddrs>(
    prefix: &str,
    host: A,
    tags: BTreeMap<String, String>,
) -> Result<()> {
    let addrs: Vec<_> = host
        .to_socket_addrs()
        .context("failed to resolve statsd host")?
        .collect();
    if !addrs.is_empty() {
        tracing::info!("Reporting metrics to statsd at {}", addrs[0]);
    }
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").context("failed to bind metrics socket")?;
    socket.set_nonblocking(true)?;
    let sink = UdpMetricSink::from(&addrs[..], socket).context("failed to create statsd sink")?;
    let statsd_client = StatsdClient::from_sink(prefix, sink);

    METRICS_CLIENT
        .set(Arc::new(MetricsClient {
            statsd_client,
            tags,
        }))
        .map_err(|_| anyhow::anyhow!("metrics are already configured"))
}

/// Configures statsd reporting from the `metrics` config section.
///
/// Does nothing if no statsd host is configured.
pub fn init_metrics(config: &Metrics) -> Result<()> {
    match config.statsd {
        Some(ref statsd) => configure_statsd(&config.prefix, statsd, config.custom_tags.clone()),
        None => Ok(()),
    }
}

/// Invoke a callback with the current statsd client.
///
/// If statsd is not configured the callback is not invoked. For the most part
/// the [`metric!`](crate::metric) macro should be used instead.
#[inline(always)]
pub fn with_client<F, R>(f: F) -> R
where
    F: FnOnce(&MetricsClient) -> R,
    R: Default,
{
    let client = CURRENT_CLIENT.with(|current| {
        let mut current = current.borrow_mut();
        if current.is_none() {
            *current = METRICS_CLIENT.get().cloned();
        }
        current.clone()
    });

    match client {
        Some(client) => f(&client),
        None => Default::default(),
    }
}

/// Metrics emitted on the current thread while this guard is alive, see [`capture`].
#[cfg(test)]
pub(crate) struct Captured {
    lines: Arc<std::sync::Mutex<Vec<String>>>,
    previous: Option<Arc<MetricsClient>>,
}

#[cfg(test)]
impl Captured {
    /// The captured statsd lines for metric `name`, without the `test.` prefix.
    pub(crate) fn lines(&self, name: &str) -> Vec<String> {
        let prefix = format!("test.{name}:");
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
impl Drop for Captured {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_CLIENT.with(|current| *current.borrow_mut() = previous);
    }
}

/// Routes all metrics of the current thread into memory until the returned guard is dropped.
#[cfg(test)]
pub(crate) fn capture() -> Captured {
    struct CaptureSink(Arc<std::sync::Mutex<Vec<String>>>);

    impl cadence::MetricSink for CaptureSink {
        fn emit(&self, metric: &str) -> std::io::Result<usize> {
            self.0.lock().unwrap().push(metric.to_owned());
            Ok(metric.len())
        }
    }

    let lines = Arc::default();
    let client = MetricsClient {
        statsd_client: StatsdClient::from_sink("test", CaptureSink(Arc::clone(&lines))),
        tags: BTreeMap::new(),
    };
    let previous = CURRENT_CLIENT.with(|current| current.borrow_mut().replace(Arc::new(client)));

    Captured { lines, previous }
}

/// Emits a metric.
#[macro_export]
macro_rules! metric {
    // counters
    (counter($id:expr) += $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.count_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    // gauges
    (gauge($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.gauge_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    // timers
    (timer($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.time_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};
}
