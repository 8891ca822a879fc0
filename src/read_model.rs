//! Cached frontend views over the persisted metro data.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use tracing::warn;

use crate::cache::Cache;
use crate::dal::{
    get_lines, get_ordered_path, get_ordered_path_for_stations, get_station, get_stations_on_line,
    line_exists,
};
use crate::model::db_model::{StationDb, StationPathDb};
use crate::model::wmata_api_model::TrainPredictionDto;
use crate::sync::{SyncSummary, sync_all_metro_data};
use crate::wmata::WmataClient;

const LINES_CACHE_KEY: &str = "metro.lines.frontend";
const ALL_STATIONS_CACHE_KEY: &str = "wmata.stations.all";
const FRONTEND_TTL: Duration = Duration::from_secs(3600);

/// Value/label pair for the frontend select components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Station entry on a line; the sequence fields are absent when the line has
/// no path rows and the unordered fallback kicked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationOption {
    pub value: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq_num: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_to_prev: Option<i32>,
}

pub struct MetroDataService {
    pool: Pool<Postgres>,
    client: Arc<WmataClient>,
    cache: Arc<dyn Cache>,
}

impl MetroDataService {
    pub fn new(pool: Pool<Postgres>, client: Arc<WmataClient>, cache: Arc<dyn Cache>) -> Self {
        MetroDataService { pool, client, cache }
    }

    pub async fn cached_lines(&self) -> Result<Vec<SelectOption>, Error> {
        if let Some(lines) = self.cached(LINES_CACHE_KEY) {
            return Ok(lines);
        }

        let options = get_lines(&self.pool)
            .await?
            .into_iter()
            .map(|line| SelectOption {
                value: line.line_code,
                label: line.display_name,
            })
            .collect_vec();

        self.store_lines(&options);

        Ok(options)
    }

    /// An empty line list is never cached, so a read that follows a sync in
    /// the same request sees the freshly written rows instead of a stale
    /// empty entry.
    fn store_lines(&self, options: &[SelectOption]) {
        if options.is_empty() {
            return;
        }

        self.store(LINES_CACHE_KEY, &options);
    }

    /// Stations serving a line in path order; falls back to the unordered
    /// station list when no path rows exist yet for the line.
    pub async fn ordered_stations_for_line(
        &self,
        line_code: &str,
    ) -> Result<Vec<StationOption>, Error> {
        let cache_key = format!("metro.stations.ordered.{line_code}");
        if let Some(stations) = self.cached(&cache_key) {
            return Ok(stations);
        }

        let stations = get_stations_on_line(line_code, &self.pool).await?;
        let station_codes = stations.iter().map(|s| s.code.clone()).collect_vec();
        let ordered_paths =
            get_ordered_path_for_stations(line_code, &station_codes, &self.pool).await?;

        if ordered_paths.is_empty() {
            warn!("no path data found for line {line_code}, using unordered stations");
        }

        let options = station_options(&stations, &ordered_paths);
        self.store(&cache_key, &options);

        Ok(options)
    }

    pub async fn train_predictions(
        &self,
        station_code: &str,
    ) -> Result<Vec<TrainPredictionDto>, Error> {
        Ok(self.client.get_train_predictions(station_code).await?)
    }

    pub async fn find_station(&self, code: &str) -> Result<Option<StationDb>, Error> {
        get_station(code, &self.pool).await
    }

    pub async fn line_exists(&self, line_code: &str) -> Result<bool, Error> {
        line_exists(line_code, &self.pool).await
    }

    pub async fn line_path(&self, line_code: &str) -> Result<Vec<StationPathDb>, Error> {
        get_ordered_path(line_code, &self.pool).await
    }

    pub async fn sync(&self) -> SyncSummary {
        sync_all_metro_data(&self.client, &self.pool).await
    }

    /// Presence of the line-list and all-stations keys; freshness and shape
    /// are not checked.
    pub fn validate_cache_integrity(&self) -> bool {
        self.cache.has(LINES_CACHE_KEY) && self.cache.has(ALL_STATIONS_CACHE_KEY)
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        serde_json::from_str(&raw).ok()
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.cache.put(key, raw, FRONTEND_TTL);
        }
    }
}

fn station_options(stations: &[StationDb], ordered_paths: &[StationPathDb]) -> Vec<StationOption> {
    if ordered_paths.is_empty() {
        return stations
            .iter()
            .map(|station| StationOption {
                value: station.code.clone(),
                label: station.name.clone(),
                seq_num: None,
                distance_to_prev: None,
            })
            .collect_vec();
    }

    ordered_paths
        .iter()
        .map(|path| StationOption {
            value: path.station_code.clone(),
            label: path.station_name.clone(),
            seq_num: Some(path.seq_num),
            distance_to_prev: Some(path.distance_to_prev),
        })
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, SystemClock};
    use crate::config::WmataConfig;

    fn service_over_memory_cache() -> (MetroDataService, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new(Arc::new(SystemClock)));
        let config = WmataConfig {
            api_key: "demo_key".to_string(),
            base_url: "http://localhost".to_string(),
            timeout_secs: 1,
            retry_attempts: 1,
            lines_ttl_secs: 60,
            stations_ttl_secs: 60,
            paths_ttl_secs: 60,
            predictions_ttl_secs: 15,
            max_requests_per_hour: 10,
            predictions_refresh_interval_secs: 30,
        };
        let client =
            WmataClient::new(&config, cache.clone(), Arc::new(SystemClock)).unwrap();

        // never connected, the cache tests stay off the network and database
        let pool = Pool::connect_lazy("postgres://localhost/unused").unwrap();
        let service = MetroDataService::new(pool, Arc::new(client), cache.clone());

        (service, cache)
    }

    #[tokio::test]
    async fn empty_line_list_is_not_cached() {
        let (service, cache) = service_over_memory_cache();

        service.store_lines(&[]);

        assert!(!cache.has(LINES_CACHE_KEY));

        service.store_lines(&[SelectOption {
            value: "RD".to_string(),
            label: "Red".to_string(),
        }]);

        assert!(cache.has(LINES_CACHE_KEY));
    }

    fn station(code: &str, name: &str) -> StationDb {
        StationDb {
            code: code.to_string(),
            name: name.to_string(),
            line_code_1: Some("RD".to_string()),
            line_code_2: None,
            line_code_3: None,
            line_code_4: None,
            station_together_1: None,
            station_together_2: None,
            lat: 38.9,
            lon: -77.0,
            is_active: true,
        }
    }

    fn path_row(code: &str, name: &str, seq: i32, distance: i32) -> StationPathDb {
        StationPathDb {
            line_code: "RD".to_string(),
            station_code: code.to_string(),
            station_name: name.to_string(),
            seq_num: seq,
            distance_to_prev: distance,
        }
    }

    #[test]
    fn ordered_paths_win_over_station_order() {
        let stations = vec![station("B01", "Judiciary Square"), station("A01", "Metro Center")];
        let paths = vec![
            path_row("A01", "Metro Center", 1, 0),
            path_row("B01", "Judiciary Square", 2, 2500),
        ];

        let options = station_options(&stations, &paths);

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].value, "A01");
        assert_eq!(options[1].value, "B01");
        assert_eq!(options[1].seq_num, Some(2));
        assert_eq!(options[1].distance_to_prev, Some(2500));
    }

    #[test]
    fn falls_back_to_unordered_stations_without_path_rows() {
        let stations = vec![station("A01", "Metro Center"), station("B01", "Judiciary Square")];

        let options = station_options(&stations, &[]);

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].seq_num, None);
        assert_eq!(options[0].distance_to_prev, None);
    }

    #[test]
    fn fallback_entries_serialize_without_sequence_fields() {
        let options = station_options(&[station("A01", "Metro Center")], &[]);

        let json = serde_json::to_value(&options[0]).unwrap();

        assert_eq!(json.get("seq_num"), None);
        assert_eq!(json.get("distance_to_prev"), None);
        assert_eq!(json["value"], "A01");
    }
}
