use crate::BackendClient;
use couchtv_core::{AlarmConfig, EventBus, MovieProgressMap, PlaylistProgressMap, TvEvent};
use couchtv_engine::ProgressSink;
use std::sync::Arc;
use tracing::{info, warn};

/// Local mirror of the TV power relay. Requests run in the background; the
/// mirror only changes once the backend has accepted a request, which the
/// spawned task reports as `TvEvent::PowerChanged` and the owner feeds back
/// through [`PowerRelay::confirm`].
pub struct PowerRelay {
    client: Arc<BackendClient>,
    bus: EventBus<TvEvent>,
    is_on: bool,
}

impl PowerRelay {
    /// The TV is assumed on at startup.
    pub fn new(client: Arc<BackendClient>, bus: EventBus<TvEvent>) -> Self {
        Self {
            client,
            bus,
            is_on: true,
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Always re-sends the command, so a TV switched off by hand comes back.
    pub fn power_on(&self) {
        self.request(true);
    }

    pub fn power_off(&self) {
        self.request(false);
    }

    /// Requests the opposite of the mirrored state and returns the requested state.
    pub fn toggle(&self) -> bool {
        let on = !self.is_on;
        self.request(on);
        on
    }

    /// Applies a state the backend acknowledged.
    pub fn confirm(&mut self, on: bool) {
        if self.is_on != on {
            info!(on, "tv power");
        }
        self.is_on = on;
    }

    fn request(&self, on: bool) {
        let client = Arc::clone(&self.client);
        let bus = self.bus.clone();
        tokio::spawn(async move {
            match client.set_tv_power(on).await {
                Ok(()) => bus.publish(TvEvent::PowerChanged { on }),
                Err(err) => warn!(error = %err, on, "tv power request failed"),
            }
        });
    }
}

/// Persists progress snapshots on spawned tasks. Last write wins, no retry.
#[derive(Clone)]
pub struct SpawningSink {
    client: Arc<BackendClient>,
}

impl SpawningSink {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }

    pub fn persist_alarm(&self, settings: AlarmConfig) {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            if let Err(err) = client.save_alarm_settings(&settings).await {
                warn!(error = %err, "failed to save alarm settings");
            }
        });
    }
}

impl ProgressSink for SpawningSink {
    fn persist_playlists(&self, progress: &PlaylistProgressMap) {
        let client = Arc::clone(&self.client);
        let snapshot = progress.clone();
        tokio::spawn(async move {
            if let Err(err) = client.save_playlist_progress(&snapshot).await {
                warn!(error = %err, "failed to save playlist progress");
            }
        });
    }

    fn persist_movies(&self, progress: &MovieProgressMap) {
        let client = Arc::clone(&self.client);
        let snapshot = progress.clone();
        tokio::spawn(async move {
            if let Err(err) = client.save_movie_progress(&snapshot).await {
                warn!(error = %err, "failed to save movie progress");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{PowerRelay, SpawningSink};
    use crate::BackendClient;
    use couchtv_core::{BackendConfig, EventBus, MovieProgress, MovieProgressMap, TvEvent};
    use couchtv_engine::ProgressSink;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> Arc<BackendClient> {
        Arc::new(
            BackendClient::new(&BackendConfig {
                base_url: base_url.to_string(),
                request_timeout_ms: 500,
                ..BackendConfig::default()
            })
            .unwrap(),
        )
    }

    async fn wait_for_requests(server: &MockServer, count: usize) {
        for _ in 0..100 {
            let seen = server.received_requests().await.map_or(0, |r| r.len());
            if seen >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("backend never saw {count} request(s)");
    }

    #[tokio::test]
    async fn relay_mirror_holds_when_backend_is_down() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut relay = PowerRelay::new(client("http://127.0.0.1:1"), bus);
        assert!(relay.is_on());

        assert!(!relay.toggle());
        let event = tokio::time::timeout(Duration::from_millis(800), rx.recv()).await;
        assert!(event.is_err(), "failed request must not report a power change");
        assert!(relay.is_on());

        // A retry still asks for the same state.
        assert!(!relay.toggle());
        relay.confirm(false);
        assert!(!relay.is_on());
        assert!(relay.toggle());
    }

    #[tokio::test]
    async fn relay_reports_accepted_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tv-power"))
            .and(body_json(json!({ "on": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut relay = PowerRelay::new(client(&server.uri()), bus);
        relay.power_off();
        assert!(relay.is_on());

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(TvEvent::PowerChanged { on: false }));
        relay.confirm(false);
        assert!(!relay.is_on());
    }

    #[tokio::test]
    async fn sink_posts_movie_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/movies-progress"))
            .and(body_json(json!({ "a.mp4": { "currentTime": 12.5 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = SpawningSink::new(client(&server.uri()));
        let mut progress = MovieProgressMap::new();
        progress.insert("a.mp4".to_string(), MovieProgress { current_time: 12.5 });
        sink.persist_movies(&progress);

        wait_for_requests(&server, 1).await;
        server.verify().await;
    }
}
