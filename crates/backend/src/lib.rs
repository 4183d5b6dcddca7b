pub mod relay;

pub use relay::{PowerRelay, SpawningSink};

use couchtv_core::urls::join_endpoint;
use couchtv_core::{
    AlarmConfig, BackendConfig, BackendEndpoints, MovieProgressMap, PlaylistProgressMap, TvError,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

const PROGRESS_STORE: &str = "progress store";
const MOVIE_CATALOG: &str = "movie catalog";
const POWER_RELAY: &str = "power relay";
const ALARM_SETTINGS: &str = "alarm settings";

/// JSON client for the home backend: saved positions, the movie catalog, alarm
/// settings and the TV power relay.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    endpoints: BackendEndpoints,
}

impl BackendClient {
    pub fn new(cfg: &BackendConfig) -> Result<Self, TvError> {
        let parsed = Url::parse(&cfg.base_url)
            .map_err(|err| TvError::Config(format!("invalid backend url {:?}: {err}", cfg.base_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TvError::Config(format!(
                "backend url must be http(s), got {:?}",
                cfg.base_url
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms.max(1)))
            .build()
            .map_err(|err| TvError::unavailable("http client", err))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            endpoints: cfg.endpoints.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &BackendEndpoints {
        &self.endpoints
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        join_endpoint(&self.base_url, path)
    }

    pub async fn load_playlist_progress(&self) -> Result<PlaylistProgressMap, TvError> {
        self.get_json(PROGRESS_STORE, &self.endpoints.load).await
    }

    pub async fn save_playlist_progress(&self, progress: &PlaylistProgressMap) -> Result<(), TvError> {
        self.post_json(PROGRESS_STORE, &self.endpoints.save, progress)
            .await
    }

    pub async fn load_movie_progress(&self) -> Result<MovieProgressMap, TvError> {
        self.get_json(PROGRESS_STORE, &self.endpoints.movies_progress)
            .await
    }

    pub async fn save_movie_progress(&self, progress: &MovieProgressMap) -> Result<(), TvError> {
        self.post_json(PROGRESS_STORE, &self.endpoints.movies_progress, progress)
            .await
    }

    pub async fn list_movies(&self) -> Result<Vec<String>, TvError> {
        self.get_json(MOVIE_CATALOG, &self.endpoints.movies_list)
            .await
    }

    pub async fn set_tv_power(&self, on: bool) -> Result<(), TvError> {
        self.post_json(POWER_RELAY, &self.endpoints.tv_power, &json!({ "on": on }))
            .await
    }

    pub async fn load_alarm_settings(&self) -> Result<AlarmConfig, TvError> {
        self.get_json(ALARM_SETTINGS, &self.endpoints.alarm_settings)
            .await
    }

    pub async fn save_alarm_settings(&self, settings: &AlarmConfig) -> Result<(), TvError> {
        self.post_json(ALARM_SETTINGS, &self.endpoints.alarm_settings, settings)
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        path: &str,
    ) -> Result<T, TvError> {
        let url = self.endpoint_url(path);
        debug!(%url, "backend GET");
        self.http
            .get(&url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| TvError::unavailable(service, err))?
            .json::<T>()
            .await
            .map_err(|err| TvError::unavailable(service, format!("bad response body: {err}")))
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        service: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), TvError> {
        let url = self.endpoint_url(path);
        debug!(%url, "backend POST");
        self.http
            .post(&url)
            .json(body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| TvError::unavailable(service, err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BackendClient;
    use couchtv_core::{AlarmConfig, BackendConfig, TvError};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            base_url: base_url.to_string(),
            request_timeout_ms: 2_000,
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_non_http_base_url() {
        let cfg = BackendConfig {
            base_url: "ftp://nas.local".to_string(),
            ..BackendConfig::default()
        };
        assert!(matches!(BackendClient::new(&cfg), Err(TvError::Config(_))));

        let cfg = BackendConfig {
            base_url: "not a url".to_string(),
            ..BackendConfig::default()
        };
        assert!(matches!(BackendClient::new(&cfg), Err(TvError::Config(_))));
    }

    #[test]
    fn endpoint_urls_join_cleanly() {
        let c = client("http://localhost:5000/");
        assert_eq!(c.base_url(), "http://localhost:5000");
        assert_eq!(c.endpoint_url("/movies-list"), "http://localhost:5000/movies-list");
    }

    #[tokio::test]
    async fn unreachable_backend_is_reported_as_unavailable() {
        let c = client("http://127.0.0.1:1");
        match c.list_movies().await {
            Err(TvError::ExternalServiceUnavailable { service, .. }) => {
                assert_eq!(service, "movie catalog")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_movie_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movies-list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["a.mp4", "b.mkv"])))
            .expect(1)
            .mount(&server)
            .await;

        let movies = client(&server.uri()).list_movies().await.unwrap();
        assert_eq!(movies, vec!["a.mp4".to_string(), "b.mkv".to_string()]);
    }

    #[tokio::test]
    async fn posts_power_state_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tv-power"))
            .and(body_json(json!({ "on": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri()).set_tv_power(false).await.unwrap();
    }

    #[tokio::test]
    async fn reads_alarm_settings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alarm-settings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "time": "06:45", "enabled": true })),
            )
            .mount(&server)
            .await;

        let settings: AlarmConfig = client(&server.uri()).load_alarm_settings().await.unwrap();
        assert_eq!(settings.time.to_string(), "06:45");
        assert!(settings.enabled);
    }

    #[tokio::test]
    async fn alarm_settings_without_time_keep_enabled_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alarm-settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "enabled": true })))
            .mount(&server)
            .await;

        let settings = client(&server.uri()).load_alarm_settings().await.unwrap();
        assert_eq!(settings.time.to_string(), "08:00");
        assert!(settings.enabled);
    }

    #[tokio::test]
    async fn saves_alarm_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alarm-settings"))
            .and(body_json(json!({ "time": "07:10", "enabled": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let settings = AlarmConfig {
            time: "07:10".parse().unwrap(),
            enabled: true,
        };
        client(&server.uri())
            .save_alarm_settings(&settings)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/load"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(matches!(
            client(&server.uri()).load_playlist_progress().await,
            Err(TvError::ExternalServiceUnavailable { service: "progress store", .. })
        ));
    }
}
