use anyhow::Error;
use sqlx::{Pool, Postgres, QueryBuilder, query_as, query_scalar};
use tracing::{Instrument, info_span};

use crate::model::db_model::LineDb;

/// Upsert by line code. Returns the number of rows written.
pub async fn upsert_lines(lines: &[LineDb], pool: &Pool<Postgres>) -> Result<u64, Error> {
    if lines.is_empty() {
        return Ok(0);
    }

    let mut query_builder = QueryBuilder::new(
        "INSERT INTO lines (
            line_code,
            display_name,
            start_station_code,
            end_station_code,
            internal_destination_1,
            internal_destination_2
        )",
    );

    query_builder.push_values(lines, |mut b, line| {
        b.push_bind(&line.line_code)
            .push_bind(&line.display_name)
            .push_bind(&line.start_station_code)
            .push_bind(&line.end_station_code)
            .push_bind(&line.internal_destination_1)
            .push_bind(&line.internal_destination_2);
    });

    query_builder.push(
        " ON CONFLICT ( line_code ) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            start_station_code = EXCLUDED.start_station_code,
            end_station_code = EXCLUDED.end_station_code,
            internal_destination_1 = EXCLUDED.internal_destination_1,
            internal_destination_2 = EXCLUDED.internal_destination_2",
    );

    let result = query_builder
        .build()
        .execute(pool)
        .instrument(info_span!("Upserting lines"))
        .await?;

    Ok(result.rows_affected())
}

pub async fn get_lines(pool: &Pool<Postgres>) -> Result<Vec<LineDb>, Error> {
    let lines = query_as::<_, LineDb>(
        "SELECT
            line_code,
            display_name,
            start_station_code,
            end_station_code,
            internal_destination_1,
            internal_destination_2
        FROM lines
        ORDER BY line_code",
    )
    .fetch_all(pool)
    .await?;

    Ok(lines)
}

pub async fn line_exists(line_code: &str, pool: &Pool<Postgres>) -> Result<bool, Error> {
    let exists: bool =
        query_scalar("SELECT EXISTS (SELECT 1 FROM lines WHERE line_code = $1)")
            .bind(line_code)
            .fetch_one(pool)
            .await?;

    Ok(exists)
}
