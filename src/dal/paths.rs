use anyhow::Error;
use sqlx::{Pool, Postgres, QueryBuilder, query, query_as};
use tracing::{Instrument, info_span};

use crate::model::db_model::StationPathDb;

/// Replaces every path row of a line inside one transaction, so readers
/// never observe a mix of old and new sequences. Returns the number of rows
/// inserted.
pub async fn replace_line_path(
    line_code: &str,
    path: &[StationPathDb],
    pool: &Pool<Postgres>,
) -> Result<u64, Error> {
    let mut tx = pool.begin().await?;

    query("DELETE FROM station_paths WHERE line_code = $1")
        .bind(line_code)
        .execute(&mut *tx)
        .instrument(info_span!("Clearing line path"))
        .await?;

    let mut inserted = 0;

    if !path.is_empty() {
        let mut query_builder = QueryBuilder::new(
            "INSERT INTO station_paths (
                line_code,
                station_code,
                station_name,
                seq_num,
                distance_to_prev
            )",
        );

        query_builder.push_values(path, |mut b, entry| {
            b.push_bind(&entry.line_code)
                .push_bind(&entry.station_code)
                .push_bind(&entry.station_name)
                .push_bind(entry.seq_num)
                .push_bind(entry.distance_to_prev);
        });

        inserted = query_builder
            .build()
            .execute(&mut *tx)
            .instrument(info_span!("Inserting line path"))
            .await?
            .rows_affected();
    }

    tx.commit().await?;

    Ok(inserted)
}

pub async fn get_ordered_path(
    line_code: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<StationPathDb>, Error> {
    let path = query_as::<_, StationPathDb>(
        "SELECT
            line_code,
            station_code,
            station_name,
            seq_num,
            distance_to_prev
        FROM station_paths
        WHERE line_code = $1
        ORDER BY seq_num",
    )
    .bind(line_code)
    .fetch_all(pool)
    .await?;

    Ok(path)
}

/// Ordered path rows restricted to a known set of station codes.
pub async fn get_ordered_path_for_stations(
    line_code: &str,
    station_codes: &[String],
    pool: &Pool<Postgres>,
) -> Result<Vec<StationPathDb>, Error> {
    let path = query_as::<_, StationPathDb>(
        "SELECT
            line_code,
            station_code,
            station_name,
            seq_num,
            distance_to_prev
        FROM station_paths
        WHERE line_code = $1
          AND station_code = ANY($2)
        ORDER BY seq_num",
    )
    .bind(line_code)
    .bind(station_codes)
    .fetch_all(pool)
    .await?;

    Ok(path)
}
