//! Wire shapes of the WMATA feeds. The feeds are inconsistent about field
//! casing, so every field carries an explicit alias table (PascalCase
//! primary, camelCase fallback) and optional codes normalize empty strings
//! to `None` at the parse boundary.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineDto {
    #[serde(rename = "DisplayName", alias = "displayName")]
    pub display_name: String,
    #[serde(rename = "LineCode", alias = "lineCode")]
    pub line_code: String,
    #[serde(rename = "StartStationCode", alias = "startStationCode")]
    pub start_station_code: String,
    #[serde(rename = "EndStationCode", alias = "endStationCode")]
    pub end_station_code: String,
    #[serde(
        rename = "InternalDestination1",
        alias = "internalDestination1",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub internal_destination_1: Option<String>,
    #[serde(
        rename = "InternalDestination2",
        alias = "internalDestination2",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub internal_destination_2: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddressDto {
    #[serde(rename = "Street", alias = "street")]
    pub street: String,
    #[serde(rename = "City", alias = "city")]
    pub city: String,
    #[serde(rename = "State", alias = "state")]
    pub state: String,
    #[serde(rename = "Zip", alias = "zip")]
    pub zip: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationDto {
    #[serde(
        rename = "Code",
        alias = "StationCode",
        alias = "stationCode",
        alias = "code"
    )]
    pub code: String,
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(
        rename = "StationTogether1",
        alias = "stationTogether1",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub station_together_1: Option<String>,
    #[serde(
        rename = "StationTogether2",
        alias = "stationTogether2",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub station_together_2: Option<String>,
    #[serde(
        rename = "LineCode1",
        alias = "lineCode1",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub line_code_1: Option<String>,
    #[serde(
        rename = "LineCode2",
        alias = "lineCode2",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub line_code_2: Option<String>,
    #[serde(
        rename = "LineCode3",
        alias = "lineCode3",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub line_code_3: Option<String>,
    #[serde(
        rename = "LineCode4",
        alias = "lineCode4",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub line_code_4: Option<String>,
    #[serde(rename = "Lat", alias = "lat")]
    pub lat: f64,
    #[serde(rename = "Lon", alias = "lon")]
    pub lon: f64,
    #[serde(rename = "Address", alias = "address")]
    pub address: AddressDto,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationPathDto {
    #[serde(rename = "LineCode", alias = "lineCode")]
    pub line_code: String,
    #[serde(rename = "StationCode", alias = "stationCode")]
    pub station_code: String,
    #[serde(rename = "StationName", alias = "stationName")]
    pub station_name: String,
    #[serde(rename = "SeqNum", alias = "seqNum")]
    pub seq_num: i32,
    #[serde(rename = "DistanceToPrev", alias = "distanceToPrev")]
    pub distance_to_prev: i32,
}

/// The minutes field can be "ARR", "BRD", a number or empty, so it stays a
/// string end to end.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainPredictionDto {
    #[serde(
        rename = "Car",
        alias = "car",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub car: Option<String>,
    #[serde(rename = "Destination", alias = "destination")]
    pub destination: String,
    #[serde(
        rename = "DestinationCode",
        alias = "destinationCode",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub destination_code: Option<String>,
    #[serde(rename = "DestinationName", alias = "destinationName")]
    pub destination_name: String,
    #[serde(
        rename = "Group",
        alias = "group",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub group: Option<String>,
    #[serde(rename = "Line", alias = "line")]
    pub line: String,
    #[serde(rename = "LocationCode", alias = "locationCode")]
    pub location_code: String,
    #[serde(rename = "LocationName", alias = "locationName")]
    pub location_name: String,
    #[serde(rename = "Min", alias = "min")]
    pub min: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrontendPrediction {
    pub line: String,
    pub destination: String,
    pub minutes: String,
    pub cars: String,
    pub group: String,
}

impl TrainPredictionDto {
    pub fn to_frontend(&self) -> FrontendPrediction {
        FrontendPrediction {
            line: self.line.clone(),
            destination: self.destination_name.clone(),
            minutes: self.min.clone(),
            cars: self.car.clone().unwrap_or_else(|| "Unknown".to_string()),
            group: self.group.clone().unwrap_or_else(|| "1".to_string()),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
