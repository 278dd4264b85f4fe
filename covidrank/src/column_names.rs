//! Column names shared by the raw sources and the derived tables. The JHU CSSE names must be kept
//! in sync with the upstream time series files.

pub const PROVINCE_STATE: &str = "Province/State";
pub const COUNTRY_REGION: &str = "Country/Region";
pub const LATITUDE: &str = "Lat";
pub const LONGITUDE: &str = "Long";

pub const POPULATION_COUNTRY: &str = "country";
pub const POPULATION_VALUE: &str = "population";
pub const POPULATION_COUNTRY_RAW: &str = "Country (or dependency)";
pub const POPULATION_VALUE_RAW: &str = "Population (2020)";

pub const DATE: &str = "date";
pub const TREND_SUFFIX: &str = " (trend)";

pub const WORLD: &str = "World";
pub const WORLD_EXCEPT_CHINA: &str = "WorldExceptChina";
pub const CHINA: &str = "China";

/// Synthetic aggregate columns that are never ranked as countries.
pub const AGGREGATES: [&str; 2] = [WORLD, WORLD_EXCEPT_CHINA];
