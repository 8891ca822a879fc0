pub mod db_model;
pub mod wmata_api_model;
