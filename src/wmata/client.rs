//! Remote data client for the WMATA rail API.
//!
//! Every read goes through the shared TTL cache, the hourly rate limiter is
//! consulted before any request leaves the process, and connection-level
//! failures are retried a bounded number of times with a fixed backoff.
//! HTTP error statuses are never retried.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{Instrument, error, info, info_span, warn};

use crate::cache::{Cache, Clock};
use crate::config::WmataConfig;
use crate::error::WmataError;
use crate::model::wmata_api_model::{LineDto, StationDto, StationPathDto, TrainPredictionDto};
use crate::utils::extract_first_station_code;
use crate::wmata::rate_limit::HourlyRateLimiter;

const LINES_ENDPOINT: &str = "/Rail.svc/json/jLines";
const STATIONS_ENDPOINT: &str = "/Rail.svc/json/jStations";
const PREDICTIONS_ENDPOINT: &str = "/StationPrediction.svc/json/GetPrediction";
const PATH_ENDPOINT: &str = "/Rail.svc/json/jPath";

const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub struct WmataClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry_attempts: u32,
    cache: Arc<dyn Cache>,
    limiter: HourlyRateLimiter,
    lines_ttl: Duration,
    stations_ttl: Duration,
    paths_ttl: Duration,
    predictions_ttl: Duration,
}

impl WmataClient {
    pub fn new(
        config: &WmataConfig,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WmataError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let limiter = HourlyRateLimiter::new(
            cache.clone(),
            clock,
            config.max_requests_per_hour,
        );

        Ok(WmataClient {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry_attempts: config.retry_attempts.max(1),
            cache,
            limiter,
            lines_ttl: Duration::from_secs(config.lines_ttl_secs),
            stations_ttl: Duration::from_secs(config.stations_ttl_secs),
            paths_ttl: Duration::from_secs(config.paths_ttl_secs),
            predictions_ttl: Duration::from_secs(config.predictions_ttl_secs),
        })
    }

    pub fn limiter(&self) -> &HourlyRateLimiter {
        &self.limiter
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn get_lines(&self) -> Result<Vec<LineDto>, WmataError> {
        let cache_key = "wmata.lines";
        if let Some(lines) = self.cached(cache_key) {
            return Ok(lines);
        }

        let payload = self.make_request(LINES_ENDPOINT).await?;
        let lines: Vec<LineDto> = parse_list(&payload, "Lines")?;

        info!("got {} lines", lines.len());
        self.store(cache_key, &lines, self.lines_ttl);

        Ok(lines)
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn get_stations_for_line(
        &self,
        line_code: &str,
    ) -> Result<Vec<StationDto>, WmataError> {
        let cache_key = format!("wmata.stations.line.{line_code}");
        if let Some(stations) = self.cached(&cache_key) {
            return Ok(stations);
        }

        let endpoint = format!("{STATIONS_ENDPOINT}?LineCode={line_code}");
        let payload = self.make_request(&endpoint).await?;
        let stations: Vec<StationDto> = parse_list(&payload, "Stations")?;

        self.store(&cache_key, &stations, self.stations_ttl);

        Ok(stations)
    }

    /// The base station list plus any stations only reachable through the
    /// per-line queries, deduped by code. `StationTogether` codes from the
    /// base list mark stations expected to show up in a line query.
    #[tracing::instrument(err, skip(self))]
    pub async fn get_all_stations(&self) -> Result<Vec<StationDto>, WmataError> {
        let cache_key = "wmata.stations.all";
        if let Some(stations) = self.cached(cache_key) {
            return Ok(stations);
        }

        let payload = self.make_request(STATIONS_ENDPOINT).await?;
        let base_stations: Vec<StationDto> = parse_list(&payload, "Stations")?;

        let mut all_stations = Vec::with_capacity(base_stations.len());
        let mut seen: HashMap<String, bool> = HashMap::new();

        for station in base_stations {
            seen.insert(station.code.clone(), true);

            for together in [&station.station_together_1, &station.station_together_2] {
                if let Some(code) = together {
                    seen.entry(code.clone()).or_insert(false);
                }
            }

            all_stations.push(station);
        }

        for line in self.get_lines().await? {
            for station in self.get_stations_for_line(&line.line_code).await? {
                if !seen.get(&station.code).copied().unwrap_or(false) {
                    seen.insert(station.code.clone(), true);
                    all_stations.push(station);
                }
            }
        }

        info!("got {} stations", all_stations.len());
        self.store(cache_key, &all_stations, self.stations_ttl);

        Ok(all_stations)
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn get_train_predictions(
        &self,
        station_code: &str,
    ) -> Result<Vec<TrainPredictionDto>, WmataError> {
        let station_code = extract_first_station_code(station_code);
        let cache_key = format!("wmata.predictions.{station_code}");
        if let Some(predictions) = self.cached(&cache_key) {
            return Ok(predictions);
        }

        let endpoint = format!("{PREDICTIONS_ENDPOINT}/{station_code}");
        let payload = self.make_request(&endpoint).await?;
        let predictions: Vec<TrainPredictionDto> = parse_list(&payload, "Trains")?;

        self.store(&cache_key, &predictions, self.predictions_ttl);

        Ok(predictions)
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn get_station_path(
        &self,
        from_station_code: &str,
        to_station_code: &str,
    ) -> Result<Vec<StationPathDto>, WmataError> {
        let cache_key = format!("wmata.path.{from_station_code}.{to_station_code}");
        if let Some(path) = self.cached(&cache_key) {
            return Ok(path);
        }

        let endpoint = format!(
            "{PATH_ENDPOINT}?FromStationCode={from_station_code}&ToStationCode={to_station_code}"
        );
        let payload = self.make_request(&endpoint).await?;
        let path: Vec<StationPathDto> = parse_list(&payload, "Path")?;

        self.store(&cache_key, &path, self.paths_ttl);

        Ok(path)
    }

    /// Full start-to-end path of a line, every entry stamped with the line's
    /// own code. The path feed reports the code of whichever line it walked,
    /// which is not always the one asked for at interchanges.
    #[tracing::instrument(err, skip(self))]
    pub async fn get_line_complete_path(
        &self,
        line_code: &str,
    ) -> Result<Vec<StationPathDto>, WmataError> {
        let lines = self.get_lines().await?;
        let line = lines
            .iter()
            .find(|line| line.line_code == line_code)
            .ok_or_else(|| WmataError::LineNotFound(line_code.to_string()))?;

        if line.start_station_code.is_empty() || line.end_station_code.is_empty() {
            return Err(WmataError::IncompletePath(line_code.to_string()));
        }

        let cache_key = format!("wmata.path.complete.{line_code}");
        if let Some(path) = self.cached(&cache_key) {
            return Ok(path);
        }

        info!(
            "getting complete path for line {line_code} from {} to {}",
            line.start_station_code, line.end_station_code
        );

        let mut path = self
            .get_station_path(&line.start_station_code, &line.end_station_code)
            .await?;

        for entry in &mut path {
            entry.line_code = line_code.to_string();
        }

        self.store(&cache_key, &path, self.paths_ttl);

        Ok(path)
    }

    async fn make_request(&self, endpoint: &str) -> Result<Value, WmataError> {
        self.limiter.check()?;

        let url = format!("{}{}", self.base_url, endpoint);
        info!("WMATA API request {url}");

        let mut attempt = 0;
        let response = loop {
            attempt += 1;

            let result = self
                .http
                .get(&url)
                .header("api_key", &self.api_key)
                .header("Accept", "application/json")
                .send()
                .instrument(info_span!("Sending request"))
                .await;

            match result {
                Ok(response) => break response,
                Err(e) if e.is_connect() && attempt < self.retry_attempts => {
                    warn!("connection failure on attempt {attempt}, retrying: {e}");
                    sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(WmataError::Connection(e)),
            }
        };

        let status = response.status();
        let body = response
            .text()
            .instrument(info_span!("Reading body of response"))
            .await?;

        if !status.is_success() {
            error!("WMATA API request failed: {endpoint} returned {status}");
            return Err(WmataError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        self.limiter.record_request();

        Ok(serde_json::from_str(&body)?)
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        serde_json::from_str(&raw).ok()
    }

    fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.cache.put(key, raw, ttl),
            Err(e) => warn!("not caching {key}: {e}"),
        }
    }
}

/// The feeds wrap their lists in a single field; a missing field reads as an
/// empty list, matching how the feeds report "nothing".
fn parse_list<T: DeserializeOwned>(payload: &Value, field: &str) -> Result<Vec<T>, WmataError> {
    match payload.get(field) {
        Some(items) => Ok(serde_json::from_value(items.clone())?),
        None => Ok(vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_list_field_parses_as_empty() {
        let payload: Value = serde_json::from_str(r#"{"Message": "no data"}"#).unwrap();

        let lines: Vec<LineDto> = parse_list(&payload, "Lines").unwrap();

        assert!(lines.is_empty());
    }

    #[test]
    fn malformed_list_entry_is_a_mapping_error() {
        let payload: Value =
            serde_json::from_str(r#"{"Lines": [{"LineCode": "RD"}]}"#).unwrap();

        let result: Result<Vec<LineDto>, _> = parse_list(&payload, "Lines");

        assert!(matches!(result, Err(WmataError::Mapping(_))));
    }
}
