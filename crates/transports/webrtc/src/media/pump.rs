//! Time-paced delivery of looping media onto a local track

use crate::media::sink::MediaSink;
use crate::media::source::MediaSource;
use crate::session::SessionRegistry;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Background task pacing one media source onto one sink
///
/// Runs until its owning session disappears from the registry, or until
/// the source or sink fails in a way a reopen cannot fix. End of source
/// is not a failure: the source is rewound and delivery continues on the
/// next tick, so the pump never self-terminates on a clean EOF.
pub struct MediaPump<S, K> {
    session_id: String,
    kind: &'static str,
    registry: Arc<SessionRegistry>,
    source: S,
    sink: K,
}

impl<S: MediaSource, K: MediaSink> MediaPump<S, K> {
    pub fn new(
        session_id: impl Into<String>,
        kind: &'static str,
        registry: Arc<SessionRegistry>,
        source: S,
        sink: K,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            registry,
            source,
            sink,
        }
    }

    /// Drive the pump until termination
    ///
    /// Liveness is re-checked against the registry on every pacing tick;
    /// nothing is cached, so removal is observed within one interval.
    pub async fn run(mut self) {
        let mut ticker = interval(self.source.cadence());
        // A late tick delivers one unit, not a burst of catch-up units.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(
            session_id = %self.session_id,
            kind = self.kind,
            cadence_ms = self.source.cadence().as_millis() as u64,
            "media pump started"
        );

        loop {
            ticker.tick().await;

            if !self.registry.contains(&self.session_id) {
                debug!(
                    session_id = %self.session_id,
                    kind = self.kind,
                    "session gone, stopping pump"
                );
                return;
            }

            match self.source.next_unit() {
                Ok(Some(unit)) => {
                    if let Err(e) = self.sink.write_unit(unit).await {
                        warn!(
                            session_id = %self.session_id,
                            kind = self.kind,
                            "sink write failed, stopping pump: {}",
                            e
                        );
                        return;
                    }
                }
                Ok(None) => {
                    debug!(
                        session_id = %self.session_id,
                        kind = self.kind,
                        "end of source, rewinding"
                    );
                    if let Err(e) = self.source.rewind() {
                        warn!(
                            session_id = %self.session_id,
                            kind = self.kind,
                            "rewind failed, stopping pump: {}",
                            e
                        );
                        return;
                    }
                }
                Err(e) => {
                    warn!(
                        session_id = %self.session_id,
                        kind = self.kind,
                        "source failed, stopping pump: {}",
                        e
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::source::MediaUnit;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::timeout;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    const TICK: Duration = Duration::from_millis(5);

    enum Step {
        Unit,
        End,
        Fail,
    }

    /// Source that replays a fixed script, counting opens (1 + rewinds).
    /// With `endless` set it produces units forever once the script runs
    /// out, instead of reporting end of source.
    struct ScriptedSource {
        steps: VecDeque<Step>,
        endless: bool,
        opens: Arc<Mutex<u32>>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>, opens: Arc<Mutex<u32>>) -> Self {
            *opens.lock() += 1;
            Self {
                steps: steps.into(),
                endless: false,
                opens,
            }
        }

        fn endless(opens: Arc<Mutex<u32>>) -> Self {
            let mut source = Self::new(Vec::new(), opens);
            source.endless = true;
            source
        }
    }

    impl MediaSource for ScriptedSource {
        fn cadence(&self) -> Duration {
            TICK
        }

        fn next_unit(&mut self) -> Result<Option<MediaUnit>> {
            let step = match self.steps.pop_front() {
                Some(step) => step,
                None if self.endless => Step::Unit,
                None => Step::End,
            };
            match step {
                Step::Unit => Ok(Some(MediaUnit {
                    data: Bytes::from_static(b"unit"),
                    duration: TICK,
                })),
                Step::End => Ok(None),
                Step::Fail => Err(Error::MediaSourceError("scripted failure".to_string())),
            }
        }

        fn rewind(&mut self) -> Result<()> {
            *self.opens.lock() += 1;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CollectingSink {
        written: Arc<Mutex<Vec<MediaUnit>>>,
    }

    #[async_trait]
    impl MediaSink for CollectingSink {
        async fn write_unit(&self, unit: MediaUnit) -> Result<()> {
            self.written.lock().push(unit);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl MediaSink for FailingSink {
        async fn write_unit(&self, _unit: MediaUnit) -> Result<()> {
            Err(Error::MediaTrackError("sink rejected unit".to_string()))
        }
    }

    async fn registry_with_session(session_id: &str) -> Arc<SessionRegistry> {
        let registry = Arc::new(SessionRegistry::new());
        let api = APIBuilder::new().build();
        let connection = api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap();
        registry.register(session_id, Arc::new(connection));
        registry
    }

    #[tokio::test]
    async fn test_pump_exits_when_session_absent() {
        let registry = Arc::new(SessionRegistry::new());
        let opens = Arc::new(Mutex::new(0));
        let sink = CollectingSink::default();
        let pump = MediaPump::new(
            "ghost",
            "video",
            registry,
            ScriptedSource::endless(Arc::clone(&opens)),
            sink.clone(),
        );

        timeout(Duration::from_secs(1), pump.run()).await.unwrap();
        assert!(sink.written.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pump_loops_on_end_of_source() {
        let registry = registry_with_session("s1").await;
        let opens = Arc::new(Mutex::new(0));
        let sink = CollectingSink::default();
        // Two clean EOFs, then units forever: the open count settles at
        // one initial open plus one rewind per EOF.
        let mut source = ScriptedSource::new(
            vec![Step::Unit, Step::End, Step::Unit, Step::End],
            Arc::clone(&opens),
        );
        source.endless = true;
        let pump = MediaPump::new("s1", "video", Arc::clone(&registry), source, sink.clone());
        let handle = tokio::spawn(pump.run());

        let written = Arc::clone(&sink.written);
        timeout(Duration::from_secs(2), async move {
            while written.lock().len() < 3 {
                tokio::time::sleep(TICK).await;
            }
        })
        .await
        .unwrap();

        // The pump never stopped on its own despite two ends of source.
        assert_eq!(*opens.lock(), 3);
        registry.remove("s1");
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_pump_stops_on_source_error_but_keeps_session() {
        let registry = registry_with_session("s1").await;
        let opens = Arc::new(Mutex::new(0));
        let sink = CollectingSink::default();
        let source = ScriptedSource::new(vec![Step::Unit, Step::Fail], Arc::clone(&opens));
        let pump = MediaPump::new("s1", "audio", Arc::clone(&registry), source, sink.clone());

        timeout(Duration::from_secs(1), pump.run()).await.unwrap();

        assert_eq!(sink.written.lock().len(), 1);
        // A pump failure is local; the session itself stays up.
        assert!(registry.contains("s1"));
    }

    #[tokio::test]
    async fn test_pump_stops_on_sink_error() {
        let registry = registry_with_session("s1").await;
        let opens = Arc::new(Mutex::new(0));
        let pump = MediaPump::new(
            "s1",
            "video",
            Arc::clone(&registry),
            ScriptedSource::endless(Arc::clone(&opens)),
            FailingSink,
        );

        timeout(Duration::from_secs(1), pump.run()).await.unwrap();
        assert!(registry.contains("s1"));
    }

    #[tokio::test]
    async fn test_pump_exits_promptly_after_removal() {
        let registry = registry_with_session("s1").await;
        let opens = Arc::new(Mutex::new(0));
        let sink = CollectingSink::default();
        let pump = MediaPump::new(
            "s1",
            "video",
            Arc::clone(&registry),
            ScriptedSource::endless(Arc::clone(&opens)),
            sink.clone(),
        );
        let handle = tokio::spawn(pump.run());

        let written = Arc::clone(&sink.written);
        timeout(Duration::from_secs(1), async move {
            while written.lock().is_empty() {
                tokio::time::sleep(TICK).await;
            }
        })
        .await
        .unwrap();

        registry.remove("s1");
        // Termination is observed on the next tick, not after a write
        // attempt or an io error.
        timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
