use crate::engine::criteria::Criteria;
use crate::engine::{aggregator, detector, filter};
use crate::error::EngineError;
use crate::models::{CycleResult, EngineEvent, Listing};
use crate::sources::traits::SourceAdapter;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives the fetch → filter → diff pipeline on a fixed interval.
///
/// The scheduler runs as a single spawned task that owns the adapters,
/// the current criteria and the accepted-batch baseline. Cycles run
/// inline in that task, so two cycles can never overlap and the baseline
/// has exactly one writer. Collaborators steer it through a
/// [`SchedulerHandle`] and consume [`EngineEvent`]s from the channel
/// given at construction.
pub struct PollScheduler {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    criteria: Criteria,
    state: State,
    baseline: Option<Vec<Listing>>,
    events: mpsc::UnboundedSender<EngineEvent>,
    fetch_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Paused,
}

#[derive(Debug)]
enum Command {
    Start,
    Pause,
    Stop,
    SetCriteria(Criteria),
}

/// Control surface handed to the UI/config collaborator. Cheap to clone;
/// the scheduler task ends once every handle is dropped.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    /// Begin polling. From idle this primes a fresh baseline and fires
    /// immediately; from paused it resumes with the baseline retained;
    /// while running it is a no-op.
    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    /// Suspend the timer without discarding the baseline.
    pub fn pause(&self) {
        let _ = self.commands.send(Command::Pause);
    }

    /// Stop polling and discard the baseline. The next `start` runs a
    /// fresh priming cycle.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Replace the criteria, effective from the next cycle. Invalid
    /// values are rejected here and the previous criteria stay in force.
    pub fn set_criteria(&self, criteria: Criteria) -> Result<(), EngineError> {
        criteria.validate()?;
        let _ = self.commands.send(Command::SetCriteria(criteria));
        Ok(())
    }
}

impl PollScheduler {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        criteria: Criteria,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            adapters,
            criteria,
            state: State::Idle,
            baseline: None,
            events,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Cap on how long one adapter may spend fetching before it counts
    /// as failed for the cycle.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Move the scheduler onto its own task and return the control handle.
    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(rx));
        SchedulerHandle { commands: tx }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut ticker = new_ticker(self.criteria.poll_interval);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &mut ticker),
                    None => break,
                },
                _ = ticker.tick(), if self.state == State::Running => {
                    let started = Instant::now();
                    self.run_cycle().await;
                    if started.elapsed() >= self.criteria.poll_interval {
                        warn!("Cycle outlasted the poll interval, missed fires are skipped");
                    }
                }
            }
        }

        debug!("All scheduler handles dropped, poll loop ends");
    }

    fn handle_command(&mut self, command: Command, ticker: &mut Interval) {
        match command {
            Command::Start => match self.state {
                State::Idle => {
                    info!(interval = ?self.criteria.poll_interval, "Polling started");
                    self.baseline = None;
                    self.state = State::Running;
                    *ticker = new_ticker(self.criteria.poll_interval);
                }
                State::Paused => {
                    info!("Polling resumed");
                    self.state = State::Running;
                    *ticker = new_ticker(self.criteria.poll_interval);
                }
                State::Running => debug!("Already running, start ignored"),
            },
            Command::Pause => {
                if self.state == State::Running {
                    info!("Polling paused, baseline retained");
                    self.state = State::Paused;
                }
            }
            Command::Stop => {
                if self.state != State::Idle {
                    info!("Polling stopped, baseline discarded");
                }
                self.state = State::Idle;
                self.baseline = None;
            }
            Command::SetCriteria(criteria) => {
                let interval_changed = criteria.poll_interval != self.criteria.poll_interval;
                self.criteria = criteria;
                if interval_changed && self.state == State::Running {
                    // The new rhythm applies from the next fire; no
                    // immediate tick on a criteria change.
                    *ticker = ticker_at(
                        Instant::now() + self.criteria.poll_interval,
                        self.criteria.poll_interval,
                    );
                }
                self.refresh_view();
            }
        }
    }

    /// One full cycle: fan out to all sources, filter, diff against the
    /// baseline. Success replaces the baseline; aggregate failure leaves
    /// it untouched and only reports.
    async fn run_cycle(&mut self) {
        match aggregator::fetch_all(&self.adapters, self.fetch_timeout).await {
            Ok(outcome) => {
                let filtered = filter::apply(outcome.listings, &self.criteria);
                let diff = detector::diff(filtered, self.baseline.as_deref(), &self.criteria);
                let new_count = diff.new_count;
                self.baseline = Some(diff.accepted.clone());

                info!(
                    accepted = diff.accepted.len(),
                    new = new_count,
                    sources_failed = outcome.failures.len(),
                    "Cycle completed"
                );

                self.emit(EngineEvent::CycleCompleted {
                    result: CycleResult {
                        listings: diff.accepted,
                        new_count,
                    },
                    completed_at: Utc::now(),
                });
                if new_count > 0 {
                    self.emit(EngineEvent::NewMatches { count: new_count });
                }
            }
            Err(e) => {
                error!(error = %e, "Cycle failed, previous state kept");
                self.emit(EngineEvent::CycleFailed {
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
            }
        }
    }

    /// Recompute the filtered view from the stored baseline after a
    /// criteria change, without waiting for the next cycle. The baseline
    /// itself is not rewritten, so loosening criteria between cycles can
    /// bring carried listings back.
    fn refresh_view(&mut self) {
        let Some(baseline) = &self.baseline else {
            return;
        };
        let listings = detector::reindex(
            baseline
                .iter()
                .filter(|l| self.criteria.matches(l))
                .cloned()
                .collect(),
        );
        let result = CycleResult {
            new_count: listings.iter().filter(|l| l.is_new).count(),
            listings,
        };
        self.emit(EngineEvent::ViewUpdated { result });
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("No event subscriber, event dropped");
        }
    }
}

fn new_ticker(period: Duration) -> Interval {
    ticker_at(Instant::now(), period)
}

fn ticker_at(start: Instant, period: Duration) -> Interval {
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::models::Provider;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn listing(link: &str, rooms: f32) -> Listing {
        Listing {
            link: link.to_string(),
            title: link.to_string(),
            street: String::new(),
            rooms,
            area_sqm: 60.0,
            rent: 700.0,
            external_link: link.to_string(),
            internal_link: link.to_string(),
            provider: Provider::Saga,
            fetched_at: Utc::now(),
            is_new: false,
            index: 0,
        }
    }

    /// Replays a scripted sequence of fetch results, then empty batches.
    struct ScriptedAdapter {
        script: Mutex<VecDeque<Result<Vec<Listing>, SourceError>>>,
    }

    impl ScriptedAdapter {
        fn new(script: Vec<Result<Vec<Listing>, SourceError>>) -> Arc<dyn SourceAdapter> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        async fn fetch(&self) -> Result<Vec<Listing>, SourceError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn provider(&self) -> &'static str {
            "scripted"
        }
    }

    fn fetch_failure() -> SourceError {
        SourceError::Fetch {
            provider: "scripted",
            reason: "connection refused".to_string(),
        }
    }

    fn test_criteria() -> Criteria {
        Criteria {
            min_rooms: 2.0,
            min_area: 40.0,
            max_rent: 900.0,
            poll_interval: Duration::from_millis(200),
        }
    }

    fn spawn_scripted(
        script: Vec<Result<Vec<Listing>, SourceError>>,
    ) -> (SchedulerHandle, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = PollScheduler::new(vec![ScriptedAdapter::new(script)], test_criteria(), tx);
        (scheduler.spawn(), rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> EngineEvent {
        time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event within 2s")
            .expect("event channel closed")
    }

    fn completed(event: EngineEvent) -> CycleResult {
        match event {
            EngineEvent::CycleCompleted { result, .. } => result,
            other => panic!("expected CycleCompleted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn priming_cycle_flags_nothing_as_new() {
        let (handle, mut rx) = spawn_scripted(vec![Ok(vec![listing("a", 3.0), listing("b", 2.0)])]);
        handle.start();

        let result = completed(next_event(&mut rx).await);
        assert_eq!(result.new_count, 0);
        assert_eq!(result.listings.len(), 2);
        assert!(result.listings.iter().all(|l| !l.is_new));
    }

    #[tokio::test]
    async fn second_cycle_puts_new_listing_first_and_notifies() {
        let (handle, mut rx) = spawn_scripted(vec![
            Ok(vec![listing("a", 3.0)]),
            Ok(vec![listing("a", 3.0), listing("b", 3.0)]),
        ]);
        handle.start();

        let _priming = completed(next_event(&mut rx).await);

        let result = completed(next_event(&mut rx).await);
        assert_eq!(result.new_count, 1);
        assert_eq!(result.listings[0].link, "b");
        assert!(result.listings[0].is_new);
        assert_eq!(result.listings[0].index, 0);
        assert_eq!(result.listings[1].link, "a");
        assert!(!result.listings[1].is_new);
        assert_eq!(result.listings[1].index, 1);

        match next_event(&mut rx).await {
            EngineEvent::NewMatches { count } => assert_eq!(count, 1),
            other => panic!("expected NewMatches, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_cycle_keeps_baseline_for_the_next_diff() {
        let (handle, mut rx) = spawn_scripted(vec![
            Ok(vec![listing("a", 3.0)]),
            Err(fetch_failure()),
            Ok(vec![listing("a", 3.0), listing("b", 3.0)]),
        ]);
        handle.start();

        let _priming = completed(next_event(&mut rx).await);

        match next_event(&mut rx).await {
            EngineEvent::CycleFailed { reason, .. } => {
                assert!(reason.contains("sources failed"), "reason: {reason}")
            }
            other => panic!("expected CycleFailed, got {other:?}"),
        }

        // "a" survived the failed cycle, so only "b" is new.
        let result = completed(next_event(&mut rx).await);
        assert_eq!(result.new_count, 1);
        assert_eq!(result.listings[0].link, "b");
        assert!(!result.listings[1].is_new);
    }

    #[tokio::test]
    async fn stop_then_start_runs_a_fresh_priming_cycle() {
        let (handle, mut rx) = spawn_scripted(vec![
            Ok(vec![listing("a", 3.0)]),
            Ok(vec![listing("a", 3.0), listing("b", 3.0)]),
        ]);
        handle.start();
        let _priming = completed(next_event(&mut rx).await);

        handle.stop();
        handle.start();

        let result = completed(next_event(&mut rx).await);
        assert_eq!(result.new_count, 0);
        assert_eq!(result.listings.len(), 2);
        assert!(result.listings.iter().all(|l| !l.is_new));
    }

    #[tokio::test]
    async fn pause_suspends_fires_and_resume_keeps_the_baseline() {
        let (handle, mut rx) = spawn_scripted(vec![
            Ok(vec![listing("a", 3.0)]),
            Ok(vec![listing("a", 3.0), listing("b", 3.0)]),
        ]);
        handle.start();
        let _priming = completed(next_event(&mut rx).await);

        handle.pause();
        let quiet = time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(quiet.is_err(), "no cycles may fire while paused");

        // Resume: baseline from before the pause still applies.
        handle.start();
        let result = completed(next_event(&mut rx).await);
        assert_eq!(result.new_count, 1);
        assert_eq!(result.listings[0].link, "b");
        assert!(result.listings[0].is_new);
    }

    #[tokio::test]
    async fn criteria_change_refreshes_the_view_between_cycles() {
        let (handle, mut rx) = spawn_scripted(vec![Ok(vec![
            listing("two-rooms", 2.0),
            listing("three-rooms", 3.0),
        ])]);
        handle.start();

        let result = completed(next_event(&mut rx).await);
        assert_eq!(result.listings.len(), 2);

        let tightened = Criteria {
            min_rooms: 3.0,
            ..test_criteria()
        };
        handle.set_criteria(tightened).unwrap();

        match next_event(&mut rx).await {
            EngineEvent::ViewUpdated { result } => {
                assert_eq!(result.listings.len(), 1);
                assert_eq!(result.listings[0].link, "three-rooms");
                assert_eq!(result.listings[0].index, 0);
            }
            other => panic!("expected ViewUpdated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_criteria_are_rejected_at_the_handle() {
        let (handle, _rx) = spawn_scripted(Vec::new());
        let invalid = Criteria {
            poll_interval: Duration::ZERO,
            ..test_criteria()
        };
        assert!(matches!(
            handle.set_criteria(invalid),
            Err(EngineError::InvalidCriteria(_))
        ));
    }

    #[tokio::test]
    async fn dropping_every_handle_ends_the_task() {
        let (handle, mut rx) = spawn_scripted(Vec::new());
        drop(handle);
        let closed = time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("task did not end");
        assert!(closed.is_none());
    }
}
