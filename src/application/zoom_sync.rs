// Zoom synchronizer - debounces overview slider input into zoom ranges
use crate::domain::chart::ChartSpec;
use crate::domain::zoom::{visible_range, SliderWindow, ZoomRange};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_stream::wrappers::ReceiverStream;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Stream of emitted zoom ranges.
pub type ZoomEvents = ReceiverStream<ZoomRange>;

enum Command {
    Overview(Vec<Vec<DateTime<Utc>>>),
    Slider(SliderWindow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Idle,
    Debouncing { deadline: Instant },
}

enum Wake {
    Command(Option<Command>),
    Timer,
}

/// Input side of a running synchronizer.
#[derive(Clone)]
pub struct ZoomHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ZoomHandle {
    /// Replace the overview series the slider windows are mapped onto
    pub fn set_overview(&self, overview: &ChartSpec) {
        self.set_overview_series(overview.series_timestamps());
    }

    pub fn set_overview_series(&self, series: Vec<Vec<DateTime<Utc>>>) {
        let _ = self.tx.send(Command::Overview(series));
    }

    /// Record slider interaction; restarts the debounce timer
    pub fn slider_moved(&self, window: SliderWindow) {
        let _ = self.tx.send(Command::Slider(window));
    }
}

pub struct ZoomSynchronizer {
    debounce: Duration,
    state: SyncState,
    window: SliderWindow,
    overview: Vec<Vec<DateTime<Utc>>>,
}

impl ZoomSynchronizer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: SyncState::Idle,
            window: SliderWindow::FULL,
            overview: Vec::new(),
        }
    }

    /// Run on the tokio runtime until every handle is dropped.
    pub fn spawn(debounce: Duration) -> (ZoomHandle, ZoomEvents) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(16);
        tokio::spawn(Self::new(debounce).run(commands, events_tx));
        (ZoomHandle { tx }, ReceiverStream::new(events_rx))
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Overview(series) => self.overview = series,
            Command::Slider(window) => {
                self.window = window;
                self.state = SyncState::Debouncing {
                    deadline: Instant::now() + self.debounce,
                };
            }
        }
    }

    fn fire(&mut self) -> Option<ZoomRange> {
        self.state = SyncState::Idle;
        let range = visible_range(&self.overview, self.window);
        if range.is_none() {
            tracing::debug!("Slider window {:?} shows no overview points", self.window);
        }
        range
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::Sender<ZoomRange>,
    ) {
        loop {
            let wake = match self.state {
                SyncState::Idle => Wake::Command(commands.recv().await),
                SyncState::Debouncing { deadline } => tokio::select! {
                    command = commands.recv() => Wake::Command(command),
                    _ = tokio::time::sleep_until(deadline) => Wake::Timer,
                },
            };

            match wake {
                Wake::Command(Some(command)) => self.handle(command),
                Wake::Command(None) => break,
                Wake::Timer => {
                    if let Some(range) = self.fire() {
                        tracing::debug!("Zoom range {} .. {}", range.start, range.end);
                        if events.send(range).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio_stream::StreamExt;

    fn series(len: usize) -> Vec<DateTime<Utc>> {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..len)
            .map(|i| origin + chrono::Duration::seconds(i as i64))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_range() {
        let (handle, mut events) = ZoomSynchronizer::spawn(DEFAULT_DEBOUNCE);
        let overview = series(1000);
        handle.set_overview_series(vec![overview.clone()]);

        for i in 0..10 {
            handle.slider_moved(SliderWindow::new(i as f64, 75.0));
            tokio::time::advance(Duration::from_millis(50)).await;
        }

        let range = events.next().await.unwrap();
        assert_eq!(range.start, overview[90]);
        assert_eq!(range.end, overview[749]);

        let more = tokio::time::timeout(Duration::from_secs(5), events.next()).await;
        assert!(more.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_emit_separately() {
        let (handle, mut events) = ZoomSynchronizer::spawn(DEFAULT_DEBOUNCE);
        let overview = series(100);
        handle.set_overview_series(vec![overview.clone()]);

        handle.slider_moved(SliderWindow::new(0.0, 50.0));
        let first = events.next().await.unwrap();
        handle.slider_moved(SliderWindow::new(50.0, 100.0));
        let second = events.next().await.unwrap();

        assert_eq!((first.start, first.end), (overview[0], overview[49]));
        assert_eq!((second.start, second.end), (overview[50], overview[99]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_window_stays_silent() {
        let (handle, mut events) = ZoomSynchronizer::spawn(DEFAULT_DEBOUNCE);
        handle.set_overview_series(vec![series(10)]);
        handle.slider_moved(SliderWindow::new(40.0, 40.0));

        let emitted = tokio::time::timeout(Duration::from_secs(2), events.next()).await;
        assert!(emitted.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_update_does_not_emit() {
        let (handle, mut events) = ZoomSynchronizer::spawn(DEFAULT_DEBOUNCE);
        handle.set_overview_series(vec![series(10)]);
        handle.set_overview_series(vec![series(20)]);

        let emitted = tokio::time::timeout(Duration::from_secs(2), events.next()).await;
        assert!(emitted.is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut sync = ZoomSynchronizer::new(DEFAULT_DEBOUNCE);
        assert_eq!(sync.state, SyncState::Idle);
        sync.handle(Command::Overview(vec![series(4)]));
        assert_eq!(sync.state, SyncState::Idle);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            sync.handle(Command::Slider(SliderWindow::FULL));
            assert!(matches!(sync.state, SyncState::Debouncing { .. }));
            let range = sync.fire().unwrap();
            assert_eq!(sync.state, SyncState::Idle);
            assert_eq!(range.end - range.start, chrono::Duration::seconds(3));
        });
    }
}
