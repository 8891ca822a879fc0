//! Sequential sync pipeline: lines, then stations and addresses, then one
//! path replacement per line. The first two phases are fatal; the path phase
//! tolerates per-line failures and records them instead of aborting.

use anyhow::Error;
use itertools::Itertools;
use serde::Serialize;
use sqlx::{Pool, Postgres};
use tracing::{error, info};

use crate::dal;
use crate::error::WmataError;
use crate::model::db_model::{LineDb, StationAddressDb, StationDb, StationPathDb};
use crate::model::wmata_api_model::{LineDto, StationDto, StationPathDto};
use crate::wmata::WmataClient;

#[derive(Debug, Default, Serialize)]
pub struct SyncSummary {
    pub lines: u64,
    pub stations: u64,
    pub paths: u64,
    pub errors: Vec<String>,
}

impl SyncSummary {
    /// A non-empty error list is a failed run even when rows were written.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Remote reads and persistence the pipeline runs against. Injected the same
/// way `Clock` and `Cache` are, so the control flow stays checkable without
/// a live feed or database.
pub(crate) trait SyncBackend {
    async fn fetch_lines(&self) -> Result<Vec<LineDto>, WmataError>;
    async fn fetch_all_stations(&self) -> Result<Vec<StationDto>, WmataError>;
    async fn fetch_line_path(&self, line_code: &str) -> Result<Vec<StationPathDto>, WmataError>;

    async fn persisted_lines(&self) -> Result<Vec<LineDb>, Error>;
    async fn save_lines(&self, lines: &[LineDb]) -> Result<u64, Error>;
    async fn save_stations(
        &self,
        stations: &[StationDb],
        addresses: &[StationAddressDb],
    ) -> Result<u64, Error>;
    async fn replace_line_path(
        &self,
        line_code: &str,
        path: &[StationPathDb],
    ) -> Result<u64, Error>;
}

struct PgBackend<'a> {
    client: &'a WmataClient,
    pool: &'a Pool<Postgres>,
}

impl SyncBackend for PgBackend<'_> {
    async fn fetch_lines(&self) -> Result<Vec<LineDto>, WmataError> {
        self.client.get_lines().await
    }

    async fn fetch_all_stations(&self) -> Result<Vec<StationDto>, WmataError> {
        self.client.get_all_stations().await
    }

    async fn fetch_line_path(&self, line_code: &str) -> Result<Vec<StationPathDto>, WmataError> {
        self.client.get_line_complete_path(line_code).await
    }

    async fn persisted_lines(&self) -> Result<Vec<LineDb>, Error> {
        dal::get_lines(self.pool).await
    }

    async fn save_lines(&self, lines: &[LineDb]) -> Result<u64, Error> {
        dal::upsert_lines(lines, self.pool).await
    }

    async fn save_stations(
        &self,
        stations: &[StationDb],
        addresses: &[StationAddressDb],
    ) -> Result<u64, Error> {
        let count = dal::upsert_stations(stations, self.pool).await?;
        dal::upsert_station_addresses(addresses, self.pool).await?;

        Ok(count)
    }

    async fn replace_line_path(
        &self,
        line_code: &str,
        path: &[StationPathDb],
    ) -> Result<u64, Error> {
        dal::replace_line_path(line_code, path, self.pool).await
    }
}

#[tracing::instrument(skip(client, pool))]
pub async fn sync_all_metro_data(client: &WmataClient, pool: &Pool<Postgres>) -> SyncSummary {
    run_sync_pipeline(&PgBackend { client, pool }).await
}

pub(crate) async fn run_sync_pipeline<B: SyncBackend>(backend: &B) -> SyncSummary {
    let mut summary = SyncSummary::default();

    if let Err(e) = sync_lines_and_stations(backend, &mut summary).await {
        error!("sync aborted: {e:#}");
        summary.errors.push(format!("{e:#}"));
        return summary;
    }

    sync_station_paths(backend, &mut summary).await;

    info!(
        lines = summary.lines,
        stations = summary.stations,
        paths = summary.paths,
        errors = summary.errors.len(),
        "sync finished"
    );

    summary
}

async fn sync_lines_and_stations<B: SyncBackend>(
    backend: &B,
    summary: &mut SyncSummary,
) -> Result<(), Error> {
    let lines = backend.fetch_lines().await?;
    let line_rows = lines.iter().map(LineDb::from).collect_vec();
    summary.lines = backend.save_lines(&line_rows).await?;

    let stations = backend.fetch_all_stations().await?;
    let station_rows = stations.iter().map(StationDb::from).collect_vec();
    let address_rows = stations.iter().map(StationAddressDb::from).collect_vec();

    summary.stations = backend.save_stations(&station_rows, &address_rows).await?;

    Ok(())
}

/// Path rows of a line are only cleared once its fresh path has been fetched,
/// so a failing line keeps whatever it had before this run.
async fn sync_station_paths<B: SyncBackend>(backend: &B, summary: &mut SyncSummary) {
    let lines = match backend.persisted_lines().await {
        Ok(lines) => lines,
        Err(e) => {
            summary.errors.push(format!("Failed to list lines for path sync: {e:#}"));
            return;
        }
    };

    for line in lines {
        let result: Result<u64, Error> = async {
            let path = backend.fetch_line_path(&line.line_code).await?;
            let rows = path.iter().map(StationPathDb::from).collect_vec();

            Ok(backend.replace_line_path(&line.line_code, &rows).await?)
        }
        .await;

        match result {
            Ok(inserted) => summary.paths += inserted,
            Err(e) => {
                error!("path sync failed for line {}: {e:#}", line.line_code);
                summary.errors.push(format!(
                    "Failed to sync path for line {}: {e:#}",
                    line.line_code
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::wmata_api_model::AddressDto;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned feed plus a recorder of which lines had their paths replaced.
    /// A line absent from `paths` fails its path fetch.
    #[derive(Default)]
    struct CannedBackend {
        lines: Vec<LineDto>,
        stations: Vec<StationDto>,
        paths: HashMap<String, Vec<StationPathDto>>,
        fail_lines_fetch: bool,
        replaced: Mutex<Vec<(String, Vec<StationPathDb>)>>,
        saved_addresses: Mutex<u64>,
    }

    impl SyncBackend for CannedBackend {
        async fn fetch_lines(&self) -> Result<Vec<LineDto>, WmataError> {
            if self.fail_lines_fetch {
                return Err(WmataError::RequestFailed {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }

            Ok(self.lines.clone())
        }

        async fn fetch_all_stations(&self) -> Result<Vec<StationDto>, WmataError> {
            Ok(self.stations.clone())
        }

        async fn fetch_line_path(
            &self,
            line_code: &str,
        ) -> Result<Vec<StationPathDto>, WmataError> {
            match self.paths.get(line_code) {
                Some(path) => Ok(path.clone()),
                None => Err(WmataError::RequestFailed {
                    status: 500,
                    body: "timeout".to_string(),
                }),
            }
        }

        async fn persisted_lines(&self) -> Result<Vec<LineDb>, Error> {
            Ok(self.lines.iter().map(LineDb::from).collect_vec())
        }

        async fn save_lines(&self, lines: &[LineDb]) -> Result<u64, Error> {
            Ok(lines.len() as u64)
        }

        async fn save_stations(
            &self,
            stations: &[StationDb],
            addresses: &[StationAddressDb],
        ) -> Result<u64, Error> {
            *self.saved_addresses.lock().unwrap() = addresses.len() as u64;

            Ok(stations.len() as u64)
        }

        async fn replace_line_path(
            &self,
            line_code: &str,
            path: &[StationPathDb],
        ) -> Result<u64, Error> {
            self.replaced
                .lock()
                .unwrap()
                .push((line_code.to_string(), path.to_vec()));

            Ok(path.len() as u64)
        }
    }

    fn line(code: &str, start: &str, end: &str) -> LineDto {
        LineDto {
            display_name: format!("{code} line"),
            line_code: code.to_string(),
            start_station_code: start.to_string(),
            end_station_code: end.to_string(),
            internal_destination_1: None,
            internal_destination_2: None,
        }
    }

    fn station(code: &str, line_code: &str) -> StationDto {
        StationDto {
            code: code.to_string(),
            name: format!("Station {code}"),
            station_together_1: None,
            station_together_2: None,
            line_code_1: Some(line_code.to_string()),
            line_code_2: None,
            line_code_3: None,
            line_code_4: None,
            lat: 38.9,
            lon: -77.0,
            address: AddressDto {
                street: "600 F St NW".to_string(),
                city: "Washington".to_string(),
                state: "DC".to_string(),
                zip: "20004".to_string(),
            },
        }
    }

    fn path_entry(line_code: &str, code: &str, seq: i32, distance: i32) -> StationPathDto {
        StationPathDto {
            line_code: line_code.to_string(),
            station_code: code.to_string(),
            station_name: format!("Station {code}"),
            seq_num: seq,
            distance_to_prev: distance,
        }
    }

    #[tokio::test]
    async fn single_line_sync_counts_every_record() {
        let backend = CannedBackend {
            lines: vec![line("RD", "A01", "B01")],
            stations: vec![station("A01", "RD"), station("B01", "RD")],
            paths: HashMap::from([(
                "RD".to_string(),
                vec![path_entry("RD", "A01", 1, 0), path_entry("RD", "B01", 2, 2500)],
            )]),
            ..Default::default()
        };

        let summary = run_sync_pipeline(&backend).await;

        assert!(summary.is_success());
        assert_eq!(summary.lines, 1);
        assert_eq!(summary.stations, 2);
        assert_eq!(summary.paths, 2);
        assert_eq!(*backend.saved_addresses.lock().unwrap(), 2);

        let replaced = backend.replaced.lock().unwrap();
        assert_eq!(replaced.len(), 1);
        let (line_code, rows) = &replaced[0];
        assert_eq!(line_code, "RD");
        assert_eq!(rows[1].station_code, "B01");
        assert_eq!(rows[1].seq_num, 2);
        assert_eq!(rows[1].distance_to_prev, 2500);
    }

    #[tokio::test]
    async fn path_failure_is_isolated_to_its_line() {
        let backend = CannedBackend {
            lines: vec![line("RD", "A01", "B01"), line("BL", "C01", "D01")],
            stations: vec![station("A01", "RD"), station("C01", "BL")],
            // no BL entry, so its path fetch fails
            paths: HashMap::from([(
                "RD".to_string(),
                vec![path_entry("RD", "A01", 1, 0), path_entry("RD", "B01", 2, 2500)],
            )]),
            ..Default::default()
        };

        let summary = run_sync_pipeline(&backend).await;

        assert!(!summary.is_success());
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("Failed to sync path for line BL:"));

        // the healthy line still synced in full
        assert_eq!(summary.paths, 2);

        // the failing line was never cleared or rewritten
        let replaced = backend.replaced.lock().unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].0, "RD");
    }

    #[tokio::test]
    async fn every_failing_line_gets_its_own_error_entry() {
        let backend = CannedBackend {
            lines: vec![
                line("RD", "A01", "B01"),
                line("BL", "C01", "D01"),
                line("SV", "N01", "G01"),
            ],
            stations: vec![station("A01", "RD")],
            paths: HashMap::from([(
                "RD".to_string(),
                vec![path_entry("RD", "A01", 1, 0)],
            )]),
            ..Default::default()
        };

        let summary = run_sync_pipeline(&backend).await;

        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors.iter().any(|e| e.contains("line BL")));
        assert!(summary.errors.iter().any(|e| e.contains("line SV")));
        assert_eq!(summary.paths, 1);
    }

    #[tokio::test]
    async fn lines_phase_failure_aborts_the_run_with_one_error() {
        let backend = CannedBackend {
            fail_lines_fetch: true,
            lines: vec![line("RD", "A01", "B01")],
            ..Default::default()
        };

        let summary = run_sync_pipeline(&backend).await;

        assert_eq!(summary.lines, 0);
        assert_eq!(summary.stations, 0);
        assert_eq!(summary.paths, 0);
        assert_eq!(summary.errors.len(), 1);
        assert!(backend.replaced.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_summary_is_success() {
        assert!(SyncSummary::default().is_success());
    }

    #[test]
    fn any_error_marks_the_run_failed() {
        let summary = SyncSummary {
            lines: 6,
            stations: 98,
            paths: 0,
            errors: vec!["Failed to sync path for line RD: timeout".to_string()],
        };

        assert!(!summary.is_success());
    }
}
