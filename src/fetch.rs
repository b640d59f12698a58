//! Runs page requests issued by [`RunHistory`](crate::history::RunHistory) as
//! tokio tasks and posts their results back to the event loop.

use crate::events::AppEvent;
use crate::history::PageRequest;
use crate::traits::RunSource;
use color_eyre::eyre::eyre;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

struct InFlight {
    seq: u64,
    task: JoinHandle<()>,
    fetch: AbortHandle,
}

pub struct FetchTasks {
    source: Arc<dyn RunSource>,
    tx: mpsc::UnboundedSender<AppEvent>,
    in_flight: Vec<InFlight>,
}

impl FetchTasks {
    pub fn new(source: Arc<dyn RunSource>, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            source,
            tx,
            in_flight: Vec::new(),
        }
    }

    /// Starts `request` if the controller issued one.
    pub fn dispatch(&mut self, request: Option<PageRequest>) {
        if let Some(request) = request {
            self.spawn(request);
        }
    }

    pub fn spawn(&mut self, request: PageRequest) {
        self.in_flight.retain(|t| !t.task.is_finished());

        let source = self.source.clone();
        let seq = request.seq;
        let fetch = tokio::spawn(async move {
            source
                .fetch_runs(&request.entity, request.offset, request.limit)
                .await
        });
        let fetch_abort = fetch.abort_handle();

        // The outer task turns a panicked fetch into an error result so the
        // controller still leaves its loading state.
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let result = match fetch.await {
                Ok(result) => result,
                Err(join_err) if join_err.is_cancelled() => return,
                Err(join_err) => Err(eyre!("run history fetch crashed: {join_err}")),
            };
            if tx.send(AppEvent::PageResult { seq, result }).is_err() {
                tracing::warn!(seq, "fetch: channel closed");
            }
        });

        self.in_flight.push(InFlight {
            seq,
            task,
            fetch: fetch_abort,
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|t| !t.task.is_finished())
            .count()
    }

    pub fn abort_all(&mut self) {
        for t in self.in_flight.drain(..) {
            tracing::debug!(seq = t.seq, "aborting run history fetch");
            t.fetch.abort();
            t.task.abort();
        }
    }
}

impl Drop for FetchTasks {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{RunPage, RunRecord};
    use async_trait::async_trait;
    use color_eyre::eyre::Result;
    use std::time::Duration;

    struct FixedSource {
        delay: Duration,
    }

    #[async_trait]
    impl RunSource for FixedSource {
        async fn fetch_runs(&self, entity: &str, offset: usize, limit: usize) -> Result<RunPage> {
            tokio::time::sleep(self.delay).await;
            let records = (0..limit)
                .map(|i| RunRecord {
                    app_id: entity.to_string(),
                    run_type: "Scheduled".to_string(),
                    timestamp: (offset + i) as i64,
                    ..Default::default()
                })
                .collect();
            Ok(RunPage { records, total: 42 })
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl RunSource for PanickingSource {
        async fn fetch_runs(&self, _entity: &str, _offset: usize, _limit: usize) -> Result<RunPage> {
            panic!("backend exploded");
        }
    }

    fn request(seq: u64) -> PageRequest {
        PageRequest {
            seq,
            entity: "sales_report".to_string(),
            offset: 10,
            limit: 3,
        }
    }

    #[tokio::test]
    async fn spawn_posts_page_result() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = FetchTasks::new(
            Arc::new(FixedSource {
                delay: Duration::ZERO,
            }),
            tx,
        );
        tasks.spawn(request(7));

        match rx.recv().await {
            Some(AppEvent::PageResult { seq, result }) => {
                assert_eq!(seq, 7);
                let page = result.unwrap();
                assert_eq!(page.records.len(), 3);
                assert_eq!(page.records[0].timestamp, 10);
                assert_eq!(page.total, 42);
            }
            other => panic!("expected PageResult, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_none_spawns_nothing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut tasks = FetchTasks::new(
            Arc::new(FixedSource {
                delay: Duration::ZERO,
            }),
            tx,
        );
        tasks.dispatch(None);
        assert_eq!(tasks.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_fetch_becomes_error_result() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = FetchTasks::new(Arc::new(PanickingSource), tx);
        tasks.spawn(request(1));

        match rx.recv().await {
            Some(AppEvent::PageResult { seq, result }) => {
                assert_eq!(seq, 1);
                assert!(result.unwrap_err().to_string().contains("crashed"));
            }
            other => panic!("expected PageResult, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn abort_all_suppresses_results() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = FetchTasks::new(
            Arc::new(FixedSource {
                delay: Duration::from_secs(60),
            }),
            tx,
        );
        tasks.spawn(request(1));
        tasks.abort_all();
        drop(tasks);

        let got = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(matches!(got, Ok(None)));
    }
}
