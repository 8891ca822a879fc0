use sqlx::prelude::FromRow;

use super::wmata_api_model::{LineDto, StationDto, StationPathDto};

#[derive(Debug, Clone, FromRow)]
pub struct LineDb {
    pub line_code: String,
    pub display_name: String,
    pub start_station_code: String,
    pub end_station_code: String,
    pub internal_destination_1: Option<String>,
    pub internal_destination_2: Option<String>,
}

impl From<&LineDto> for LineDb {
    fn from(dto: &LineDto) -> Self {
        LineDb {
            line_code: dto.line_code.clone(),
            display_name: dto.display_name.clone(),
            start_station_code: dto.start_station_code.clone(),
            end_station_code: dto.end_station_code.clone(),
            internal_destination_1: dto.internal_destination_1.clone(),
            internal_destination_2: dto.internal_destination_2.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StationDb {
    pub code: String,
    pub name: String,
    pub line_code_1: Option<String>,
    pub line_code_2: Option<String>,
    pub line_code_3: Option<String>,
    pub line_code_4: Option<String>,
    pub station_together_1: Option<String>,
    pub station_together_2: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub is_active: bool,
}

impl From<&StationDto> for StationDb {
    fn from(dto: &StationDto) -> Self {
        StationDb {
            code: dto.code.clone(),
            name: dto.name.clone(),
            line_code_1: dto.line_code_1.clone(),
            line_code_2: dto.line_code_2.clone(),
            line_code_3: dto.line_code_3.clone(),
            line_code_4: dto.line_code_4.clone(),
            station_together_1: dto.station_together_1.clone(),
            station_together_2: dto.station_together_2.clone(),
            lat: dto.lat,
            lon: dto.lon,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StationAddressDb {
    pub station_code: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl From<&StationDto> for StationAddressDb {
    fn from(dto: &StationDto) -> Self {
        StationAddressDb {
            station_code: dto.code.clone(),
            street: dto.address.street.clone(),
            city: dto.address.city.clone(),
            state: dto.address.state.clone(),
            zip_code: dto.address.zip.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StationPathDb {
    pub line_code: String,
    pub station_code: String,
    pub station_name: String,
    pub seq_num: i32,
    pub distance_to_prev: i32,
}

impl From<&StationPathDto> for StationPathDb {
    fn from(dto: &StationPathDto) -> Self {
        StationPathDb {
            line_code: dto.line_code.clone(),
            station_code: dto.station_code.clone(),
            station_name: dto.station_name.clone(),
            seq_num: dto.seq_num,
            distance_to_prev: dto.distance_to_prev,
        }
    }
}
