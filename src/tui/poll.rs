//! Background stats poller.
//!
//! Fetches server and per-tube statistics on a fixed interval over its own
//! connection and pushes the results into the grids; the foreground loop is
//! notified through a refresh event. A failed fetch leaves the previous
//! dataset on screen and is retried on the next tick — never sooner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::{QueueSource, SourceError};

use super::event::Event;
use super::grid::ScrollableGrid;

/// Periodic stats collector feeding the dashboard grids.
pub struct Poller {
    source: Box<dyn QueueSource>,
    server_grid: Arc<ScrollableGrid>,
    tube_grid: Arc<ScrollableGrid>,
}

impl Poller {
    pub fn new(
        source: Box<dyn QueueSource>,
        server_grid: Arc<ScrollableGrid>,
        tube_grid: Arc<ScrollableGrid>,
    ) -> Self {
        Self {
            source,
            server_grid,
            tube_grid,
        }
    }

    /// Runs one fetch cycle. Each category updates its grid only when its
    /// fetch succeeds; a failure in one category does not block the other.
    pub fn collect(&mut self) {
        match server_rows(self.source.as_mut(), &self.server_grid) {
            Ok(rows) => self.server_grid.update_data(rows),
            Err(err) => warn!("server stats fetch failed: {err}"),
        }
        match tube_rows(self.source.as_mut(), &self.tube_grid) {
            Ok(rows) => self.tube_grid.update_data(rows),
            Err(err) => warn!("tube stats fetch failed: {err}"),
        }
    }

    /// Spawns the polling thread. The shutdown flag is observed once per
    /// tick; the thread also exits when the event channel closes.
    pub fn spawn(
        mut self,
        interval: Duration,
        tx: Sender<Event>,
        done: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if done.load(Ordering::Relaxed) {
                    break;
                }
                self.collect();
                if tx.send(Event::Refresh).is_err() {
                    break;
                }
            }
            debug!("poller stopped");
        })
    }
}

/// Builds the single server-stats row in the grid's column order.
fn server_rows(
    source: &mut dyn QueueSource,
    grid: &ScrollableGrid,
) -> Result<Vec<Vec<String>>, SourceError> {
    let stats = source.server_stats()?;
    let row = grid
        .columns()
        .iter()
        .map(|col| stats.get(&col.name).cloned().unwrap_or_default())
        .collect();
    Ok(vec![row])
}

/// Builds one row per tube in the grid's column order.
fn tube_rows(
    source: &mut dyn QueueSource,
    grid: &ScrollableGrid,
) -> Result<Vec<Vec<String>>, SourceError> {
    let mut rows = Vec::new();
    for tube in source.list_queues()? {
        let stats = source.queue_stats(&tube)?;
        rows.push(
            grid.columns()
                .iter()
                .map(|col| stats.get(&col.name).cloned().unwrap_or_default())
                .collect(),
        );
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{JobState, StatsMap};
    use crate::tui::grid::{GridColumn, TextAlign};

    /// Source whose stats categories can be failed independently.
    struct FlakySource {
        fail_server: bool,
        fail_tubes: bool,
    }

    impl QueueSource for FlakySource {
        fn server_stats(&mut self) -> Result<StatsMap, SourceError> {
            if self.fail_server {
                return Err(SourceError::Protocol("connection closed".to_string()));
            }
            Ok(StatsMap::from([
                ("hostname".to_string(), "worker-1".to_string()),
                ("current-jobs-ready".to_string(), "8".to_string()),
            ]))
        }

        fn list_queues(&mut self) -> Result<Vec<String>, SourceError> {
            if self.fail_tubes {
                return Err(SourceError::Protocol("connection closed".to_string()));
            }
            Ok(vec!["default".to_string(), "emails".to_string()])
        }

        fn queue_stats(&mut self, name: &str) -> Result<StatsMap, SourceError> {
            Ok(StatsMap::from([
                ("name".to_string(), name.to_string()),
                ("current-jobs-ready".to_string(), "3".to_string()),
            ]))
        }

        fn peek_job(&mut self, _: &str, _: JobState) -> Result<Option<u64>, SourceError> {
            Ok(None)
        }

        fn delete_job(&mut self, _: u64) -> Result<(), SourceError> {
            Ok(())
        }

        fn bury_job(&mut self, _: u64, _: u32) -> Result<(), SourceError> {
            Ok(())
        }

        fn kick_jobs(&mut self, _: &str, _: u64) -> Result<u64, SourceError> {
            Ok(0)
        }

        fn reserve_job(&mut self, _: &str) -> Result<Option<u64>, SourceError> {
            Ok(None)
        }

        fn job_stats(&mut self, _: u64) -> Result<StatsMap, SourceError> {
            Ok(StatsMap::new())
        }
    }

    fn grids() -> (Arc<ScrollableGrid>, Arc<ScrollableGrid>) {
        let server = Arc::new(ScrollableGrid::new(
            "[ Server ]",
            vec![
                GridColumn::new("hostname", TextAlign::Left, 10),
                GridColumn::new("current-jobs-ready", TextAlign::Right, 20),
            ],
            false,
        ));
        let tubes = Arc::new(ScrollableGrid::new(
            "[ Tubes ]",
            vec![
                GridColumn::new("name", TextAlign::Left, 10),
                GridColumn::new("current-jobs-ready", TextAlign::Right, 20),
            ],
            true,
        ));
        (server, tubes)
    }

    #[test]
    fn collect_fills_both_grids() {
        let (server, tubes) = grids();
        let mut poller = Poller::new(
            Box::new(FlakySource {
                fail_server: false,
                fail_tubes: false,
            }),
            server.clone(),
            tubes.clone(),
        );
        poller.collect();

        assert_eq!(server.row_count(), 1);
        assert_eq!(tubes.row_count(), 2);
        assert_eq!(
            tubes.current_row().map(|r| r[0].clone()),
            Some("default".to_string())
        );
    }

    #[test]
    fn failed_fetch_keeps_prior_dataset() {
        let (server, tubes) = grids();
        let mut poller = Poller::new(
            Box::new(FlakySource {
                fail_server: false,
                fail_tubes: false,
            }),
            server.clone(),
            tubes.clone(),
        );
        poller.collect();
        assert_eq!(tubes.row_count(), 2);

        let mut failing = Poller::new(
            Box::new(FlakySource {
                fail_server: true,
                fail_tubes: true,
            }),
            server.clone(),
            tubes.clone(),
        );
        failing.collect();

        // prior data is still displayed
        assert_eq!(server.row_count(), 1);
        assert_eq!(tubes.row_count(), 2);
    }

    #[test]
    fn one_failing_category_does_not_block_the_other() {
        let (server, tubes) = grids();
        let mut poller = Poller::new(
            Box::new(FlakySource {
                fail_server: true,
                fail_tubes: false,
            }),
            server.clone(),
            tubes.clone(),
        );
        poller.collect();

        assert_eq!(server.row_count(), 0);
        assert_eq!(tubes.row_count(), 2);
    }
}
