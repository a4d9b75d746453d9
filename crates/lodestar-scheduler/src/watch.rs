use crate::actor::{SchedulerHandle, WorkItem};
use crate::config::SchedulerConfig;
use futures_util::StreamExt;
use lodestar_client::{selectors, ClusterApi, WatchStream};
use lodestar_core::{Pod, PodExt, WatchEvent, WatchEventType};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Connection state of the pod watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Connecting,
    Streaming,
    ReconnectWait,
    Done,
}

/// Forwards newly added, claimed, unscheduled pods to the scheduling actor
pub struct WatchDispatcher {
    api: Arc<dyn ClusterApi>,
    handle: SchedulerHandle,
    scheduler_name: String,
    reconnect_backoff: Duration,
    state: WatchState,
}

impl WatchDispatcher {
    pub fn new(api: Arc<dyn ClusterApi>, handle: SchedulerHandle, config: &SchedulerConfig) -> Self {
        Self {
            api,
            handle,
            scheduler_name: config.scheduler_name.clone(),
            reconnect_backoff: config.reconnect_backoff,
            state: WatchState::Connecting,
        }
    }

    /// Watch until the token fires. The stream is dropped as soon as the
    /// dispatcher leaves `Streaming`, which closes the connection.
    pub async fn run(mut self, token: CancellationToken) {
        info!("Starting watch dispatcher");

        let mut stream: Option<WatchStream<Pod>> = None;

        loop {
            let next = match self.state {
                WatchState::Connecting => {
                    let (next, opened) = self.connect(&token).await;
                    stream = opened;
                    next
                }
                WatchState::Streaming => match stream.as_mut() {
                    Some(s) => self.read_next(s, &token).await,
                    None => WatchState::ReconnectWait,
                },
                WatchState::ReconnectWait => {
                    tokio::select! {
                        _ = token.cancelled() => WatchState::Done,
                        _ = tokio::time::sleep(self.reconnect_backoff) => WatchState::Connecting,
                    }
                }
                WatchState::Done => break,
            };

            if next != WatchState::Streaming {
                stream = None;
            }
            self.transition(next);
        }

        info!("Watch dispatcher stopped");
    }

    fn transition(&mut self, next: WatchState) {
        if self.state != next {
            debug!("Watch state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    async fn connect(&self, token: &CancellationToken) -> (WatchState, Option<WatchStream<Pod>>) {
        tokio::select! {
            biased;
            _ = token.cancelled() => (WatchState::Done, None),
            result = self.api.watch_pods(selectors::UNSCHEDULED) => match result {
                Ok(stream) => {
                    info!("Watching unscheduled pods");
                    (WatchState::Streaming, Some(stream))
                }
                Err(e) => {
                    warn!(
                        "Failed to open pod watch, retrying in {:?}: {}",
                        self.reconnect_backoff, e
                    );
                    (WatchState::ReconnectWait, None)
                }
            },
        }
    }

    async fn read_next(
        &self,
        stream: &mut WatchStream<Pod>,
        token: &CancellationToken,
    ) -> WatchState {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return WatchState::Done,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => self.dispatch(event, token).await,
            Some(Err(e)) => {
                warn!(
                    "Pod watch failed, reconnecting in {:?}: {}",
                    self.reconnect_backoff, e
                );
                WatchState::ReconnectWait
            }
            None => {
                info!(
                    "Pod watch closed by server, reconnecting in {:?}",
                    self.reconnect_backoff
                );
                WatchState::ReconnectWait
            }
        }
    }

    async fn dispatch(&self, event: WatchEvent<Pod>, token: &CancellationToken) -> WatchState {
        let pod = event.object;

        if event.event_type != WatchEventType::Added {
            debug!("Ignoring {:?} event for pod {}", event.event_type, pod.pod_key());
            return WatchState::Streaming;
        }
        if !pod.is_claimed_by(&self.scheduler_name) || !pod.is_unscheduled() {
            debug!("Ignoring pod {} not claimed by {}", pod.pod_key(), self.scheduler_name);
            return WatchState::Streaming;
        }

        info!("Pod {} added, queueing for scheduling", pod.pod_key());
        let item = WorkItem::Schedule {
            pod: Box::new(pod),
            settle: true,
        };

        if self.handle.submit(item, token).await {
            WatchState::Streaming
        } else {
            WatchState::Done
        }
    }
}
