use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use super::bus::{MixBus, DEFAULT_SAMPLE_RATE};
use super::dialect::Dialect;
use super::scheduler::OscillatorScheduler;
use super::SoundEvent;
use crate::errors::{AgentError, AgentResult};

/// Opens the audio sink the first time a run needs it
pub type SinkOpener = Box<dyn FnMut() -> super::Result<MixBus> + Send + Sync>;

/// What one run scheduled
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub language: String,
    pub dialect: Option<Dialect>,
    pub events: Vec<SoundEvent>,
    /// Bus time the run's offsets are relative to
    pub epoch: f64,
    /// Bus time once everything scheduled has played
    pub end: f64,
    pub warning: Option<String>,
}

impl RunReport {
    pub fn scheduled(&self) -> usize {
        self.events.len()
    }
}

/// Dispatches Code Lab snippets to the matching dialect and schedules the
/// resulting sounds on one shared bus.
pub struct PolyglotRunner {
    opener: SinkOpener,
    scheduler: Option<OscillatorScheduler>,
    rng: StdRng,
    seed: u64,
}

impl PolyglotRunner {
    pub fn new(opener: SinkOpener) -> Self {
        Self::with_seed(opener, rand::random())
    }

    pub fn with_seed(opener: SinkOpener, seed: u64) -> Self {
        Self {
            opener,
            scheduler: None,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Runner backed by an in-memory bus at the default sample rate and
    /// capacity
    pub fn in_memory() -> Self {
        Self::new(Box::new(|| MixBus::new(DEFAULT_SAMPLE_RATE)))
    }

    pub fn languages(&self) -> Vec<&'static str> {
        Dialect::tags()
    }

    pub fn scheduler(&self) -> Option<&OscillatorScheduler> {
        self.scheduler.as_ref()
    }

    /// The bus, once a run has opened it
    pub fn bus(&self) -> Option<&MixBus> {
        self.scheduler.as_ref().map(OscillatorScheduler::bus)
    }

    pub fn bus_mut(&mut self) -> Option<&mut MixBus> {
        self.scheduler.as_mut().map(OscillatorScheduler::bus_mut)
    }

    fn open(&mut self) -> AgentResult<&mut OscillatorScheduler> {
        if self.scheduler.is_none() {
            let bus = (self.opener)().map_err(|e| AgentError::AudioInit(e.to_string()))?;
            self.scheduler = Some(OscillatorScheduler::new(bus, self.seed.wrapping_add(1)));
        }
        self.scheduler
            .as_mut()
            .ok_or_else(|| AgentError::AudioInit("audio sink unavailable".to_string()))
    }

    /// Interpret `source` in `language` and schedule every event it produces.
    ///
    /// Unknown languages schedule nothing, log one warning and never touch
    /// the audio sink.
    pub fn run(&mut self, language: &str, source: &str) -> AgentResult<RunReport> {
        let Some(dialect) = Dialect::for_tag(language) else {
            let warning = format!("Unsupported language: {language}");
            warn!(language, "{}", warning);
            return Ok(RunReport {
                language: language.to_string(),
                dialect: None,
                events: Vec::new(),
                epoch: 0.0,
                end: 0.0,
                warning: Some(warning),
            });
        };

        let events = dialect.interpret(source, &mut self.rng);
        let scheduler = self.open()?;
        let epoch = scheduler.begin();
        for event in &events {
            scheduler.schedule(event);
        }
        let end = scheduler.finish();

        info!(
            language,
            dialect = %dialect,
            events = events.len(),
            epoch,
            "code lab run"
        );

        Ok(RunReport {
            language: language.to_string(),
            dialect: Some(dialect),
            events,
            epoch,
            end,
            warning: None,
        })
    }
}

impl Default for PolyglotRunner {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_runner() -> (PolyglotRunner, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = opened.clone();
        let runner = PolyglotRunner::with_seed(
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                MixBus::new(8000)
            }),
            3,
        );
        (runner, opened)
    }

    #[test]
    fn test_unknown_language_schedules_nothing() {
        let (mut runner, opened) = counting_runner();
        let report = runner.run("cobol", "DISPLAY 'HI'").unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.dialect, None);
        assert_eq!(
            report.warning.as_deref(),
            Some("Unsupported language: cobol")
        );
        assert_eq!(opened.load(Ordering::SeqCst), 0);
        assert!(runner.bus().is_none());
    }

    #[test]
    fn test_sink_opened_once() {
        let (mut runner, opened) = counting_runner();
        runner.run("alda", "piano: c d").unwrap();
        runner.run("ALDA", "synth: e").unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(runner.scheduler().map(|s| s.scheduled_count()), Some(3));
    }

    #[test]
    fn test_runs_follow_each_other_on_the_clock() {
        let (mut runner, _) = counting_runner();
        let first = runner.run("sonic-pi", "play 60\nsleep 1\nplay 62").unwrap();
        assert_eq!(first.epoch, 0.0);
        assert_eq!(first.end, 1.4);

        let second = runner.run("strudel", r#"s "bd sn""#).unwrap();
        assert_eq!(second.epoch, first.end);
        assert_eq!(second.scheduled(), 2);
        assert!(runner.bus().unwrap().rms(1.4, 1.6) > 0.0);
    }

    #[test]
    fn test_huge_sleep_never_grows_the_bus() {
        let mut runner = PolyglotRunner::with_seed(
            Box::new(|| Ok(MixBus::new(8000)?.with_capacity_seconds(3.0))),
            5,
        );
        let report = runner.run("sonic-pi", "sleep 1e300\nplay 60").unwrap();
        assert_eq!(report.scheduled(), 0);
        assert_eq!(report.end, 0.0);

        let report = runner
            .run("sonic-pi", "play 60\nsleep 100000\nplay 62")
            .unwrap();
        assert_eq!(report.scheduled(), 1);

        // the drone runs past the capacity and is cut short, later runs are dropped
        runner.run("csound", "").unwrap();
        runner.run("alda", "piano: c d e").unwrap();
        let bus = runner.bus().unwrap();
        assert_eq!(bus.samples().len(), 24_000);
        assert_eq!(runner.scheduler().map(|s| s.scheduled_count()), Some(2));
    }

    #[test]
    fn test_failed_sink_reports_every_run() {
        let mut runner = PolyglotRunner::with_seed(
            Box::new(|| Err(AudioError::Init("no device".to_string()))),
            0,
        );
        for _ in 0..2 {
            let err = runner.run("alda", "piano: c").unwrap_err();
            assert!(matches!(err, AgentError::AudioInit(msg) if msg.contains("no device")));
        }
    }

    #[test]
    fn test_simulated_language_renders_drone() {
        let (mut runner, _) = counting_runner();
        let report = runner.run("SuperCollider", "SinOsc.ar(440)").unwrap();
        assert_eq!(report.dialect, Some(Dialect::Simulated));
        assert_eq!(report.scheduled(), 1);
        assert_eq!(report.end, 4.0);
        assert!(runner.languages().contains(&"csound"));
    }
}
