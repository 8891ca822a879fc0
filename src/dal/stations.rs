use anyhow::Error;
use sqlx::{Pool, Postgres, QueryBuilder, query_as};
use tracing::{Instrument, info_span};

use crate::model::db_model::{StationAddressDb, StationDb};

/// Upsert by station code. Returns the number of rows written.
pub async fn upsert_stations(stations: &[StationDb], pool: &Pool<Postgres>) -> Result<u64, Error> {
    if stations.is_empty() {
        return Ok(0);
    }

    let mut query_builder = QueryBuilder::new(
        "INSERT INTO stations (
            code,
            name,
            line_code_1,
            line_code_2,
            line_code_3,
            line_code_4,
            station_together_1,
            station_together_2,
            lat,
            lon,
            is_active
        )",
    );

    query_builder.push_values(stations, |mut b, station| {
        b.push_bind(&station.code)
            .push_bind(&station.name)
            .push_bind(&station.line_code_1)
            .push_bind(&station.line_code_2)
            .push_bind(&station.line_code_3)
            .push_bind(&station.line_code_4)
            .push_bind(&station.station_together_1)
            .push_bind(&station.station_together_2)
            .push_bind(station.lat)
            .push_bind(station.lon)
            .push_bind(station.is_active);
    });

    query_builder.push(
        " ON CONFLICT ( code ) DO UPDATE SET
            name = EXCLUDED.name,
            line_code_1 = EXCLUDED.line_code_1,
            line_code_2 = EXCLUDED.line_code_2,
            line_code_3 = EXCLUDED.line_code_3,
            line_code_4 = EXCLUDED.line_code_4,
            station_together_1 = EXCLUDED.station_together_1,
            station_together_2 = EXCLUDED.station_together_2,
            lat = EXCLUDED.lat,
            lon = EXCLUDED.lon,
            is_active = EXCLUDED.is_active",
    );

    let result = query_builder
        .build()
        .execute(pool)
        .instrument(info_span!("Upserting stations"))
        .await?;

    Ok(result.rows_affected())
}

pub async fn upsert_station_addresses(
    addresses: &[StationAddressDb],
    pool: &Pool<Postgres>,
) -> Result<u64, Error> {
    if addresses.is_empty() {
        return Ok(0);
    }

    let mut query_builder = QueryBuilder::new(
        "INSERT INTO station_addresses (
            station_code,
            street,
            city,
            state,
            zip_code
        )",
    );

    query_builder.push_values(addresses, |mut b, address| {
        b.push_bind(&address.station_code)
            .push_bind(&address.street)
            .push_bind(&address.city)
            .push_bind(&address.state)
            .push_bind(&address.zip_code);
    });

    query_builder.push(
        " ON CONFLICT ( station_code ) DO UPDATE SET
            street = EXCLUDED.street,
            city = EXCLUDED.city,
            state = EXCLUDED.state,
            zip_code = EXCLUDED.zip_code",
    );

    let result = query_builder
        .build()
        .execute(pool)
        .instrument(info_span!("Upserting station addresses"))
        .await?;

    Ok(result.rows_affected())
}

pub async fn get_station(code: &str, pool: &Pool<Postgres>) -> Result<Option<StationDb>, Error> {
    let station = query_as::<_, StationDb>(
        "SELECT
            code, name,
            line_code_1, line_code_2, line_code_3, line_code_4,
            station_together_1, station_together_2,
            lat, lon, is_active
        FROM stations
        WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(station)
}

/// All stations serving a line through any of the four membership slots.
pub async fn get_stations_on_line(
    line_code: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<StationDb>, Error> {
    let stations = query_as::<_, StationDb>(
        "SELECT
            code, name,
            line_code_1, line_code_2, line_code_3, line_code_4,
            station_together_1, station_together_2,
            lat, lon, is_active
        FROM stations
        WHERE line_code_1 = $1
           OR line_code_2 = $1
           OR line_code_3 = $1
           OR line_code_4 = $1
        ORDER BY code",
    )
    .bind(line_code)
    .fetch_all(pool)
    .await?;

    Ok(stations)
}
