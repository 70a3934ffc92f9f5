// View controller - overview/detail state with latest-response-wins assignment
use crate::application::orchestrator::FetchOrchestrator;
use crate::application::renderer::DualViewRenderer;
use crate::domain::channel::{Channel, ChannelRef};
use crate::domain::chart::ChartSpec;
use crate::domain::data::{DataPoint, DataResponse, ResponseMetadata, TimeRange};
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::zoom::{SliderWindow, ZoomRange};
use crate::application::zoom_sync::ZoomEvents;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targets {
    pub overview: bool,
    pub detail: bool,
}

impl Targets {
    pub const BOTH: Targets = Targets {
        overview: true,
        detail: true,
    };
    pub const OVERVIEW: Targets = Targets {
        overview: true,
        detail: false,
    };
    pub const DETAIL: Targets = Targets {
        overview: false,
        detail: true,
    };
}

/// Sequence number handed out when a fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub seq: u64,
    pub targets: Targets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Every target view already shows a newer response.
    Stale,
    Cleared,
}

#[derive(Debug, Default)]
pub struct ViewState {
    last_seq: u64,
    overview_seq: u64,
    detail_seq: u64,
    overview: Vec<DataPoint>,
    detail: Vec<DataPoint>,
    metadata: Option<ResponseMetadata>,
    error: Option<String>,
    slider: Option<SliderWindow>,
    window: Option<ZoomRange>,
    selection: Option<ActiveSelection>,
}

impl ViewState {
    pub fn begin(&mut self, targets: Targets) -> Ticket {
        self.last_seq += 1;
        Ticket {
            seq: self.last_seq,
            targets,
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        (ticket.targets.overview && ticket.seq > self.overview_seq)
            || (ticket.targets.detail && ticket.seq > self.detail_seq)
    }

    /// Assign a response to each target view that has not seen a newer one.
    pub fn apply(&mut self, ticket: Ticket, response: DataResponse) -> ApplyOutcome {
        if !self.is_current(ticket) {
            tracing::warn!("Discarding stale response #{}", ticket.seq);
            return ApplyOutcome::Stale;
        }

        let to_overview = ticket.targets.overview && ticket.seq > self.overview_seq;
        let to_detail = ticket.targets.detail && ticket.seq > self.detail_seq;
        match (to_overview, to_detail) {
            (true, true) => {
                self.overview = response.points.clone();
                self.detail = response.points;
            }
            (true, false) => self.overview = response.points,
            (false, true) => self.detail = response.points,
            (false, false) => {}
        }
        if to_overview {
            self.overview_seq = ticket.seq;
        }
        if to_detail {
            self.detail_seq = ticket.seq;
        }
        self.metadata = Some(response.metadata);
        self.error = None;
        ApplyOutcome::Applied
    }

    /// Record a failure without clearing what is on screen.
    pub fn fail(&mut self, ticket: Ticket, error: &CoreError) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.error = Some(error.to_string());
        true
    }

    pub fn clear(&mut self) {
        let seq = self.begin(Targets::BOTH).seq;
        self.overview_seq = seq;
        self.detail_seq = seq;
        self.overview.clear();
        self.detail.clear();
        self.metadata = None;
        self.error = None;
        self.window = None;
        self.selection = None;
    }

    pub fn overview(&self) -> &[DataPoint] {
        &self.overview
    }

    pub fn detail(&self) -> &[DataPoint] {
        &self.detail
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Selection the views were last loaded for. `channels` carry the merged
/// value key as their name.
#[derive(Debug, Clone)]
struct ActiveSelection {
    test_id: String,
    refs: Vec<ChannelRef>,
    channels: Vec<Channel>,
    names: Vec<String>,
}

/// Rendered state handed to the UI.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub overview: ChartSpec,
    pub detail: ChartSpec,
    pub metadata: Option<ResponseMetadata>,
    pub error: Option<String>,
    /// Slider position the overview should be forced to, handed out once
    pub slider: Option<SliderWindow>,
    pub window: Option<ZoomRange>,
}

pub struct ViewController {
    orchestrator: FetchOrchestrator,
    renderer: DualViewRenderer,
    point_budget: usize,
    state: Mutex<ViewState>,
}

impl ViewController {
    pub fn new(orchestrator: FetchOrchestrator, renderer: DualViewRenderer, point_budget: usize) -> Self {
        Self {
            orchestrator,
            renderer,
            point_budget,
            state: Mutex::new(ViewState::default()),
        }
    }

    /// Change test and channel selection, loading both views over the full range.
    ///
    /// The new selection only replaces the current one once its data is applied.
    pub async fn select(&self, test_id: &str, refs: Vec<ChannelRef>) -> CoreResult<ApplyOutcome> {
        if test_id.trim().is_empty() || refs.is_empty() {
            self.state.lock().await.clear();
            return Ok(ApplyOutcome::Cleared);
        }

        let channels: Vec<Channel> = self
            .orchestrator
            .series(&refs)?
            .into_iter()
            .map(|s| Channel {
                name: s.key,
                ..s.channel
            })
            .collect();
        let names = channels.iter().map(|c| c.name.clone()).collect();
        let pending = ActiveSelection {
            test_id: test_id.to_string(),
            refs,
            channels,
            names,
        };

        let ticket = self.state.lock().await.begin(Targets::BOTH);
        self.run(ticket, &pending, None, true).await
    }

    /// Refetch the detail view for a zoom window; the overview is left as is.
    pub async fn zoom(&self, range: ZoomRange) -> CoreResult<ApplyOutcome> {
        let active = self.active().await?;
        let window = TimeRange::new(range.start, range.end)?;
        let ticket = {
            let mut state = self.state.lock().await;
            state.window = Some(range);
            state.begin(Targets::DETAIL)
        };
        self.run(ticket, &active, Some(window), false).await
    }

    pub async fn reload_overview(&self) -> CoreResult<ApplyOutcome> {
        let active = self.active().await?;
        let ticket = self.state.lock().await.begin(Targets::OVERVIEW);
        self.run(ticket, &active, None, false).await
    }

    /// Reload the full-range overview and move the slider back to `[0, 100]`.
    pub async fn reset_overview(&self) -> CoreResult<ApplyOutcome> {
        self.state.lock().await.slider = Some(SliderWindow::FULL);
        self.reload_overview().await
    }

    pub async fn copy_detail_to_overview(&self) {
        let mut state = self.state.lock().await;
        let seq = state.begin(Targets::OVERVIEW).seq;
        state.overview = state.detail.clone();
        state.overview_seq = seq;
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let mut state = self.state.lock().await;
        let slider = state.slider.take();
        let (channels, names) = match &state.selection {
            Some(active) => (active.channels.as_slice(), active.names.as_slice()),
            None => (&[][..], &[][..]),
        };
        ViewSnapshot {
            overview: self.renderer.build_overview(&state.overview, channels, names),
            detail: self.renderer.build_detail(&state.detail, channels, names),
            metadata: state.metadata,
            error: state.error.clone(),
            slider,
            window: state.window,
        }
    }

    /// Drive detail refetches from a synchronizer's event stream.
    pub async fn follow_zoom(self: Arc<Self>, mut events: ZoomEvents) {
        while let Some(range) = events.next().await {
            if let Err(e) = self.zoom(range).await {
                tracing::error!("Detail refetch for {} .. {} failed: {}", range.start, range.end, e);
            }
        }
    }

    async fn active(&self) -> CoreResult<ActiveSelection> {
        self.state
            .lock()
            .await
            .selection
            .clone()
            .ok_or_else(|| CoreError::invalid("no active selection"))
    }

    /// Fetch for `active` and apply under `ticket`; with `commit`, an applied
    /// response also makes `active` the current selection.
    async fn run(
        &self,
        ticket: Ticket,
        active: &ActiveSelection,
        range: Option<TimeRange>,
        commit: bool,
    ) -> CoreResult<ApplyOutcome> {
        let result = self
            .orchestrator
            .fetch(&active.refs, &active.test_id, range, self.point_budget)
            .await;

        let mut state = self.state.lock().await;
        match result {
            Ok(response) => {
                let outcome = state.apply(ticket, response);
                if commit && outcome == ApplyOutcome::Applied {
                    state.selection = Some(active.clone());
                    state.window = None;
                }
                Ok(outcome)
            }
            Err(e) => {
                state.fail(ticket, &e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orchestrator::DeviceQuery;
    use crate::application::query_executor::QueryExecutor;
    use crate::domain::channel::{ChannelRegistry, ResolutionPolicy};
    use crate::infrastructure::memory_source::InMemoryRowSource;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn response(secs: &[i64]) -> DataResponse {
        let points = secs.iter().map(|s| DataPoint::new(ts(*s))).collect();
        DataResponse::new(points, secs.len() as u64, 1, None)
    }

    #[test]
    fn test_late_response_is_discarded() {
        let mut state = ViewState::default();
        let older = state.begin(Targets::DETAIL);
        let newer = state.begin(Targets::DETAIL);

        assert_eq!(state.apply(newer, response(&[2, 3])), ApplyOutcome::Applied);
        assert_eq!(state.apply(older, response(&[1])), ApplyOutcome::Stale);
        assert_eq!(state.detail().len(), 2);
    }

    #[test]
    fn test_detail_ticket_leaves_overview_alone() {
        let mut state = ViewState::default();
        let load = state.begin(Targets::BOTH);
        state.apply(load, response(&[0, 1, 2, 3]));
        let zoom = state.begin(Targets::DETAIL);
        state.apply(zoom, response(&[1, 2]));

        assert_eq!(state.overview().len(), 4);
        assert_eq!(state.detail().len(), 2);
    }

    #[test]
    fn test_failure_keeps_previous_view() {
        let mut state = ViewState::default();
        let load = state.begin(Targets::BOTH);
        state.apply(load, response(&[0, 1]));

        let retry = state.begin(Targets::BOTH);
        assert!(state.fail(retry, &CoreError::SourceUnavailable(anyhow::anyhow!("timeout"))));
        assert_eq!(state.overview().len(), 2);
        assert!(state.error().unwrap().contains("timeout"));

        let again = state.begin(Targets::BOTH);
        state.apply(again, response(&[5]));
        assert_eq!(state.error(), None);
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let mut state = ViewState::default();
        let older = state.begin(Targets::DETAIL);
        let newer = state.begin(Targets::DETAIL);
        state.apply(newer, response(&[1]));
        assert!(!state.fail(older, &CoreError::invalid("x")));
        assert_eq!(state.error(), None);
    }

    /// Delegates to the demo source; slow for the first window it sees.
    struct SlowFirstZoom {
        inner: QueryExecutor,
        slowed: AtomicBool,
    }

    #[async_trait]
    impl DeviceQuery for SlowFirstZoom {
        async fn execute(
            &self,
            device: &str,
            test_id: &str,
            channels: &[String],
            range: Option<TimeRange>,
            point_budget: usize,
        ) -> CoreResult<DataResponse> {
            if range.is_some() && !self.slowed.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            QueryExecutor::execute(&self.inner, device, test_id, channels, range, point_budget).await
        }
    }

    /// Demo source with one device that can be switched off.
    struct Outage {
        inner: QueryExecutor,
        down: Option<&'static str>,
    }

    #[async_trait]
    impl DeviceQuery for Outage {
        async fn execute(
            &self,
            device: &str,
            test_id: &str,
            channels: &[String],
            range: Option<TimeRange>,
            point_budget: usize,
        ) -> CoreResult<DataResponse> {
            if self.down == Some(device) {
                return Err(CoreError::SourceUnavailable(anyhow::anyhow!("{device} down")));
            }
            QueryExecutor::execute(&self.inner, device, test_id, channels, range, point_budget).await
        }
    }

    fn demo_registry() -> Arc<ChannelRegistry> {
        Arc::new(ChannelRegistry::from_pairs([
            (
                "Device1",
                vec![Channel::new("temp", "Temperatura", "°C"), Channel::new("hum", "Humedad", "%")],
            ),
            (
                "Device2",
                vec![Channel::new("pres", "Presión", "hPa"), Channel::new("vel", "Velocidad", "m/s")],
            ),
        ]))
    }

    fn demo_executor() -> QueryExecutor {
        QueryExecutor::new(Arc::new(InMemoryRowSource::demo().unwrap()))
    }

    fn controller_with(registry: Arc<ChannelRegistry>, devices: Arc<dyn DeviceQuery>) -> ViewController {
        ViewController::new(
            FetchOrchestrator::new(registry, devices, ResolutionPolicy::FirstMatch),
            DualViewRenderer::default(),
            10_000,
        )
    }

    fn controller() -> ViewController {
        let devices = Arc::new(SlowFirstZoom {
            inner: demo_executor(),
            slowed: AtomicBool::new(false),
        });
        controller_with(demo_registry(), devices)
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_zoom_responses() {
        let controller = controller();
        let outcome = controller
            .select("recta", vec![ChannelRef::bare("temp"), ChannelRef::bare("pres")])
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);

        let wide = ZoomRange { start: ts(0), end: ts(49) };
        let narrow = ZoomRange { start: ts(10), end: ts(19) };
        let (first, second) = tokio::join!(controller.zoom(wide), controller.zoom(narrow));
        assert_eq!(first.unwrap(), ApplyOutcome::Stale);
        assert_eq!(second.unwrap(), ApplyOutcome::Applied);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.detail.series[0].data.len(), 10);
        assert_eq!(snapshot.overview.series[0].data.len(), 100);
        assert_eq!(snapshot.window, Some(narrow));
    }

    #[tokio::test]
    async fn test_copy_detail_and_empty_selection() {
        let controller = controller();
        controller
            .select("senoidal", vec![ChannelRef::qualified("Device1", "hum")])
            .await
            .unwrap();
        controller
            .zoom(ZoomRange { start: ts(0), end: ts(360) })
            .await
            .unwrap();
        controller.copy_detail_to_overview().await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.overview.series[0].data.len(), 11);
        assert_eq!(snapshot.detail.y_axes[0].unit, "%");

        let outcome = controller.select("senoidal", Vec::new()).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Cleared);
        let snapshot = controller.snapshot().await;
        assert!(snapshot.overview.is_empty() && snapshot.detail.is_empty());
        assert!(controller.zoom(ZoomRange { start: ts(0), end: ts(1) }).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_select_keeps_previous_view() {
        let devices = Arc::new(Outage {
            inner: demo_executor(),
            down: Some("Device2"),
        });
        let controller = controller_with(demo_registry(), devices);
        controller
            .select("recta", vec![ChannelRef::bare("temp")])
            .await
            .unwrap();
        let before = controller.snapshot().await;

        let err = controller
            .select("recta", vec![ChannelRef::bare("pres")])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SourceUnavailable(_)));

        let after = controller.snapshot().await;
        assert_eq!(after.overview, before.overview);
        assert_eq!(after.detail, before.detail);
        assert_eq!(after.overview.series[0].name, "Temperatura (overview)");
        assert!(after.error.unwrap().contains("Device2 down"));

        // Zooming still targets the selection that loaded
        let outcome = controller
            .zoom(ZoomRange { start: ts(10), end: ts(19) })
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.detail.series[0].channel, "temp");
        assert_eq!(snapshot.detail.series[0].data.len(), 10);
        assert_eq!(snapshot.error, None);
    }

    #[tokio::test]
    async fn test_same_channel_name_on_two_devices() {
        let mut source = InMemoryRowSource::new()
            .with_test(crate::domain::test_run::TestRun::new("E1", "Banco"))
            .with_device("Device1", vec![Channel::new("temp", "Temp banco", "°C")])
            .with_device("Device2", vec![Channel::new("temp", "Temp cámara", "°C")]);
        for i in 0..3 {
            source.push_row("Device1", "E1", ts(i * 10), &[("temp", 20.0)]).unwrap();
            source.push_row("Device2", "E1", ts(i * 10 + 5), &[("temp", 90.0)]).unwrap();
        }
        let registry = Arc::new(ChannelRegistry::from_pairs([
            ("Device1", vec![Channel::new("temp", "Temp banco", "°C")]),
            ("Device2", vec![Channel::new("temp", "Temp cámara", "°C")]),
        ]));
        let controller = controller_with(registry, Arc::new(QueryExecutor::new(Arc::new(source))));

        controller
            .select(
                "E1",
                vec![
                    ChannelRef::qualified("Device1", "temp"),
                    ChannelRef::qualified("Device2", "temp"),
                ],
            )
            .await
            .unwrap();

        let detail = controller.snapshot().await.detail;
        assert_eq!(detail.series.len(), 2);
        assert_eq!(detail.series[0].name, "Temp banco (Device1)");
        assert_eq!(detail.series[1].name, "Temp cámara (Device2)");
        let values = |i: usize| -> Vec<Option<f64>> { detail.series[i].data.iter().map(|(_, v)| *v).collect() };
        assert_eq!(values(0), vec![Some(20.0); 3]);
        assert_eq!(values(1), vec![Some(90.0); 3]);
        // Both share one °C axis
        assert_eq!(detail.y_axes.len(), 1);
    }

    #[tokio::test]
    async fn test_slider_reset_is_handed_out_once() {
        let controller = controller();
        controller
            .select("senoidal", vec![ChannelRef::bare("temp")])
            .await
            .unwrap();
        controller.reset_overview().await.unwrap();

        assert_eq!(controller.snapshot().await.slider, Some(SliderWindow::FULL));
        assert_eq!(controller.snapshot().await.slider, None);
    }
}
