//! Traffic snapshots and the background task that samples them

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use switchyard_connection::ConnectionSink;
use switchyard_node_id::ServiceId;
use tokio::sync::{RwLock, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::RouterConfig;
use crate::router::SocketRouter;

/// Throughput of one service kind over a sampling window
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlowInfo {
    /// Service kind
    pub service_id: ServiceId,
    /// Inbound KB/s, counted against the sending kind
    pub flow_in: u64,
    /// Outbound KB/s, counted against the receiving kind
    pub flow_out: u64,
}

/// Background task state
struct ReporterState {
    task: Option<JoinHandle<()>>,
    shutdown_signal: Option<oneshot::Sender<()>>,
}

/// Samples a shared router's flow counters on a fixed cadence.
///
/// Snapshots are logged and published on a watch channel; the latest one is
/// always available through [`FlowReporter::subscribe`]. Sample times are
/// seconds since the reporter was created, so they keep increasing across
/// `shutdown` and `start`.
pub struct FlowReporter<C>
where
    C: ConnectionSink,
{
    router: Arc<Mutex<SocketRouter<C>>>,
    interval: Duration,
    origin: Instant,
    snapshots: watch::Sender<Vec<FlowInfo>>,
    state: RwLock<ReporterState>,
}

impl<C> FlowReporter<C>
where
    C: ConnectionSink,
{
    /// Create a reporter sampling `router` every `config.flow_interval`
    #[must_use]
    pub fn new(router: Arc<Mutex<SocketRouter<C>>>, config: &RouterConfig) -> Self {
        let (snapshots, _) = watch::channel(Vec::new());

        Self {
            router,
            interval: config.flow_interval,
            origin: Instant::now(),
            snapshots,
            state: RwLock::new(ReporterState {
                task: None,
                shutdown_signal: None,
            }),
        }
    }

    /// Sampling period
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Receiver of the most recent snapshot list
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<FlowInfo>> {
        self.snapshots.subscribe()
    }

    /// Start sampling. Calling it on a running reporter does nothing.
    pub async fn start(&self) {
        let mut state = self.state.write().await;
        if state.task.is_some() {
            warn!("flow reporter already running");
            return;
        }

        info!("starting flow reporter every {:?}", self.interval);

        let router = Arc::clone(&self.router);
        let snapshots = self.snapshots.clone();
        let period = self.interval;
        let origin = self.origin;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now_s = origin.elapsed().as_secs();
                        let flows = router.lock().clac_flow_info(now_s);
                        for flow in &flows {
                            info!(
                                "flow service={} in={}KB/s out={}KB/s",
                                flow.service_id, flow.flow_in, flow.flow_out
                            );
                        }
                        snapshots.send_replace(flows);
                    }
                    _ = &mut shutdown_rx => {
                        debug!("flow reporter received shutdown signal");
                        break;
                    }
                }
            }
        });

        state.task = Some(task);
        state.shutdown_signal = Some(shutdown_tx);
    }

    /// Stop sampling and wait for the task to exit
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;

        if let Some(shutdown_signal) = state.shutdown_signal.take() {
            let _ = shutdown_signal.send(());
        }

        if let Some(task) = state.task.take() {
            match tokio::time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => debug!("flow reporter shut down cleanly"),
                Ok(Err(e)) => error!("flow reporter task panicked: {}", e),
                Err(_) => error!("flow reporter did not shut down within timeout"),
            }
        }
    }

    /// Whether the sampling task is running
    pub async fn is_running(&self) -> bool {
        self.state
            .read()
            .await
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ROUTER_HEAD_SIZE, RouterHeader, RpcType};
    use switchyard_connection_memory::MemoryConnections;
    use switchyard_node_id::NodeId;

    fn lobby() -> NodeId {
        NodeId::build(0, 3, 1)
    }

    fn shared_router() -> Arc<Mutex<SocketRouter<MemoryConnections>>> {
        let mut router = SocketRouter::new(&RouterConfig::default(), MemoryConnections::new());
        router.map_token(lobby(), 9, 0);
        Arc::new(Mutex::new(router))
    }

    fn send_to_lobby(router: &Mutex<SocketRouter<MemoryConnections>>, frame_len: usize) {
        let body = vec![0u8; frame_len - ROUTER_HEAD_SIZE];
        let mut header = RouterHeader {
            msg_id: RpcType::ForwardTarget.into(),
            target_sid: lobby().raw(),
            ..RouterHeader::default()
        };
        router.lock().forward_target(&mut header, &body).unwrap();
    }

    fn config(flow_interval: Duration) -> RouterConfig {
        RouterConfig {
            flow_interval,
            ..RouterConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_publishes_snapshots() {
        let router = shared_router();
        let reporter = FlowReporter::new(Arc::clone(&router), &config(Duration::from_secs(2)));
        let mut rx = reporter.subscribe();
        reporter.start().await;
        assert!(reporter.is_running().await);

        // 4096 bytes over a 2 second window is 2 KB/s
        send_to_lobby(&router, 4096);

        rx.changed().await.unwrap();
        assert_eq!(
            *rx.borrow_and_update(),
            vec![FlowInfo {
                service_id: 3,
                flow_in: 0,
                flow_out: 2,
            }]
        );

        reporter.shutdown().await;
        assert!(!reporter.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_interval_drives_ticks() {
        let config: RouterConfig =
            serde_json::from_str(r#"{ "flow_interval": { "secs": 1, "nanos": 0 } }"#).unwrap();
        let router = shared_router();
        let reporter = FlowReporter::new(Arc::clone(&router), &config);
        assert_eq!(reporter.interval(), Duration::from_secs(1));

        let mut rx = reporter.subscribe();
        reporter.start().await;
        send_to_lobby(&router, 2048);

        let started = Instant::now();
        rx.changed().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(
            *rx.borrow_and_update(),
            vec![FlowInfo {
                service_id: 3,
                flow_in: 0,
                flow_out: 2,
            }]
        );

        reporter.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_time_base() {
        let router = shared_router();
        let reporter = FlowReporter::new(Arc::clone(&router), &config(Duration::from_secs(2)));
        let mut rx = reporter.subscribe();

        // last sample lands at 20s
        reporter.start().await;
        tokio::time::sleep(Duration::from_secs(21)).await;
        reporter.shutdown().await;

        reporter.start().await;
        rx.borrow_and_update();
        // the next sample at 23s covers 3 seconds
        send_to_lobby(&router, 3 * 4096);

        rx.changed().await.unwrap();
        assert_eq!(
            *rx.borrow_and_update(),
            vec![FlowInfo {
                service_id: 3,
                flow_in: 0,
                flow_out: 4,
            }]
        );

        reporter.shutdown().await;
    }
}
