//! Reads the JHU CSSE wide time series and the population table, and normalizes them into
//! date-indexed, country-columned tables.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info, warn};
use polars::prelude::*;
use regex::Regex;

use crate::{
    aliases::{AliasTable, Source},
    error::CovidRankError,
    population::PopulationTable,
    table::TimeSeriesTable,
    COL,
};

/// Date columns in the JHU files are headed `M/D/YY`.
const DATE_HEADER_PATTERN: &str = r"^\d{1,2}/\d{1,2}/\d{2}$";
const DATE_HEADER_FORMAT: &str = "%m/%d/%y";

/// Reads a CSV file with a header row into a `DataFrame`.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("Failed to read CSV '{}'", path.display()))
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| CovidRankError::MissingColumn(name.to_string()))?
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Collapses sub-national rows into one row per country (summing the cumulative counts),
/// transposes dates into the row index and appends the `World` and `WorldExceptChina` aggregate
/// columns. Country names are reconciled through the COVID side of `aliases`.
pub fn normalize_series(raw: &DataFrame, aliases: &AliasTable) -> Result<TimeSeriesTable> {
    let date_header = Regex::new(DATE_HEADER_PATTERN)?;
    let mut date_columns: Vec<(NaiveDate, &Series)> = vec![];
    for series in raw.get_columns() {
        if date_header.is_match(series.name()) {
            let date = NaiveDate::parse_from_str(series.name(), DATE_HEADER_FORMAT)
                .with_context(|| format!("Invalid date column '{}'", series.name()))?;
            date_columns.push((date, series));
        } else if series.name() != COL::COUNTRY_REGION {
            debug!("Dropping column '{}'", series.name());
        }
    }
    date_columns.sort_by_key(|(date, _)| *date);
    let dates = date_columns.iter().map(|(date, _)| *date).collect_vec();
    if dates.is_empty() {
        return Err(anyhow!(CovidRankError::InvalidSeries(
            "no date columns found".into()
        )));
    }

    let countries = string_column(raw, COL::COUNTRY_REGION)?;
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (column, (_, series)) in date_columns.iter().enumerate() {
        let values = series.cast(&DataType::Float64)?;
        for (country, value) in countries.iter().zip(values.f64()?) {
            let Some(country) = country else {
                continue;
            };
            let canonical = aliases.canonical(Source::Covid, country);
            let totals = groups
                .entry(canonical.to_string())
                .or_insert_with(|| vec![0.0; dates.len()]);
            totals[column] += value.unwrap_or(0.0);
        }
    }
    let skipped = countries.iter().filter(|country| country.is_none()).count();
    if skipped > 0 {
        warn!("Skipped {skipped} row(s) without a country");
    }

    let world = (0..dates.len())
        .map(|row| groups.values().map(|totals| totals[row]).sum::<f64>())
        .collect_vec();
    let world_except_china = match groups.get(COL::CHINA) {
        Some(china) => world.iter().zip(china).map(|(w, c)| w - c).collect_vec(),
        None => {
            warn!(
                "No '{}' column, '{}' equals '{}'",
                COL::CHINA,
                COL::WORLD_EXCEPT_CHINA,
                COL::WORLD
            );
            world.clone()
        }
    };

    let to_column = |values: Vec<f64>| values.into_iter().map(Some).collect_vec();
    let columns = groups
        .into_iter()
        .map(|(country, totals)| (country, to_column(totals)))
        .chain([
            (COL::WORLD.to_string(), to_column(world)),
            (COL::WORLD_EXCEPT_CHINA.to_string(), to_column(world_except_china)),
        ])
        .collect_vec();
    let table = TimeSeriesTable::from_columns(dates, columns)?;
    info!(
        "Normalized series with {} dates and {} columns",
        table.height(),
        table.width()
    );
    Ok(table)
}

/// Reads and normalizes one JHU wide-format time series file.
pub fn load_series<P: AsRef<Path>>(path: P, aliases: &AliasTable) -> Result<TimeSeriesTable> {
    let raw = read_csv(&path)?;
    info!(
        "Read '{}' with shape: {:?}",
        path.as_ref().display(),
        raw.shape()
    );
    normalize_series(&raw, aliases)
}

fn population_values(series: &Series) -> Result<Vec<Option<u64>>> {
    if series.dtype() == &DataType::String {
        // Thousands separators are common in hand-exported population tables
        return Ok(series
            .str()?
            .into_iter()
            .map(|value| value.and_then(|v| v.replace(',', "").trim().parse::<u64>().ok()))
            .collect());
    }
    Ok(series.cast(&DataType::UInt64)?.u64()?.into_iter().collect())
}

/// Builds the population table from a frame with `country` and `population` columns (or the raw
/// `Country (or dependency)` / `Population (2020)` headers).
pub fn normalize_population(mut raw: DataFrame, aliases: &AliasTable) -> Result<PopulationTable> {
    let columns = raw.get_column_names_owned();
    for (from, to) in [
        (COL::POPULATION_COUNTRY_RAW, COL::POPULATION_COUNTRY),
        (COL::POPULATION_VALUE_RAW, COL::POPULATION_VALUE),
    ] {
        if columns.iter().any(|name| name.as_str() == from) {
            raw.rename(from, to)?;
        }
    }
    let countries = string_column(&raw, COL::POPULATION_COUNTRY)?;
    let values = population_values(
        raw.column(COL::POPULATION_VALUE)
            .map_err(|_| CovidRankError::MissingColumn(COL::POPULATION_VALUE.to_string()))?,
    )?;
    let rows = countries
        .into_iter()
        .zip(values)
        .filter_map(|(country, population)| match (country, population) {
            (Some(country), Some(population)) => Some((country, population)),
            (country, _) => {
                debug!("Skipping population row without a value: {country:?}");
                None
            }
        })
        .collect_vec();
    let population = PopulationTable::from_entries(rows, aliases);
    info!("Loaded population for {} entries", population.len());
    Ok(population)
}

/// Reads the population CSV at `path`.
pub fn load_population<P: AsRef<Path>>(path: P, aliases: &AliasTable) -> Result<PopulationTable> {
    normalize_population(read_csv(path)?, aliases)
}

/// Reindexes `deaths` onto the dates and countries of `confirmed`, so every derived table shares
/// one index even when a single source fell back to an older cached copy. Dates or countries
/// absent from `deaths` become nulls; extra ones are dropped. Tables sharing no date are rejected.
pub fn align_to(confirmed: &TimeSeriesTable, deaths: TimeSeriesTable) -> Result<TimeSeriesTable> {
    if confirmed.dates() == deaths.dates() && confirmed.countries() == deaths.countries() {
        return Ok(deaths);
    }
    let rows = confirmed
        .dates()
        .iter()
        .map(|date| deaths.dates().binary_search(date).ok())
        .collect::<Vec<_>>();
    let shared = rows.iter().flatten().count();
    if shared == 0 {
        return Err(anyhow!(CovidRankError::InvalidSeries(
            "confirmed and deaths share no dates".to_string()
        )));
    }
    if shared < confirmed.height() {
        warn!(
            "Deaths cover {shared} of {} confirmed dates, the rest is left undefined",
            confirmed.height()
        );
    }
    if shared < deaths.height() {
        warn!(
            "Dropping {} deaths dates outside the confirmed range",
            deaths.height() - shared
        );
    }

    let mut missing = vec![];
    let columns = confirmed
        .countries()
        .into_iter()
        .map(|country| -> Result<_> {
            if !deaths.contains(country) {
                missing.push(country);
                return Ok((country, vec![None; rows.len()]));
            }
            let source = deaths.values(country)?;
            let values = rows.iter().map(|&row| row.and_then(|r| source[r])).collect();
            Ok((country, values))
        })
        .collect::<Result<Vec<_>>>()?;
    if !missing.is_empty() {
        warn!(
            "Countries missing from deaths, left undefined: [{}]",
            missing.join(", ")
        );
    }
    let extra = deaths
        .countries()
        .into_iter()
        .filter(|country| !confirmed.contains(country))
        .join(", ");
    if !extra.is_empty() {
        warn!("Dropping deaths countries absent from confirmed: [{extra}]");
    }
    Ok(TimeSeriesTable::from_columns(
        confirmed.dates().to_vec(),
        columns,
    )?)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::aliases::COUNTRY_ALIASES;

    pub(crate) const CONFIRMED_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Italy,41.87,12.56,0,2,5
Hubei,China,30.97,112.27,10,20,40
Beijing,China,40.18,116.41,1,1,2
,US,40.0,-100.0,1,1,3
,Taiwan*,23.7,121.0,0,1,1
";

    pub(crate) const DEATHS_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Italy,41.87,12.56,0,0,1
Hubei,China,30.97,112.27,1,2,4
Beijing,China,40.18,116.41,0,0,0
,US,40.0,-100.0,0,0,0
,Taiwan*,23.7,121.0,0,0,0
";

    pub(crate) const POPULATION_CSV: &str = "\
country,population
China,1400
Italy,60
United States,330
Chile,19
";

    pub(crate) fn write_fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn sub_national_rows_should_be_summed() {
        let file = write_fixture(CONFIRMED_CSV);
        let table = load_series(file.path(), &COUNTRY_ALIASES).unwrap();
        assert_eq!(
            table.values("China").unwrap(),
            vec![Some(11.0), Some(21.0), Some(42.0)]
        );
        assert_eq!(
            table.dates(),
            &[
                NaiveDate::from_ymd_opt(2020, 1, 22).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 23).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 24).unwrap(),
            ]
        );
    }

    #[test]
    fn covid_names_should_be_reconciled() {
        let file = write_fixture(CONFIRMED_CSV);
        let table = load_series(file.path(), &COUNTRY_ALIASES).unwrap();
        assert_eq!(
            table.countries(),
            vec!["China", "Italy", "Taiwan", "Usa", COL::WORLD, COL::WORLD_EXCEPT_CHINA]
        );
    }

    #[test]
    fn world_columns_should_aggregate_countries() {
        let file = write_fixture(CONFIRMED_CSV);
        let table = load_series(file.path(), &COUNTRY_ALIASES).unwrap();
        let world = table.values(COL::WORLD).unwrap();
        let china = table.values(COL::CHINA).unwrap();
        let except_china = table.values(COL::WORLD_EXCEPT_CHINA).unwrap();
        for row in 0..table.height() {
            let real_total: f64 = table
                .countries()
                .into_iter()
                .filter(|c| !COL::AGGREGATES.contains(c))
                .map(|c| table.value(row, c).unwrap().unwrap())
                .sum();
            assert_eq!(world[row], Some(real_total));
            assert_eq!(except_china[row], Some(world[row].unwrap() - china[row].unwrap()));
        }
        assert_eq!(world, vec![Some(12.0), Some(25.0), Some(51.0)]);
    }

    #[test]
    fn out_of_order_date_columns_should_be_sorted() {
        let csv = "Province/State,Country/Region,Lat,Long,1/23/20,1/22/20\n,Italy,0,0,5,1\n";
        let file = write_fixture(csv);
        let table = load_series(file.path(), &COUNTRY_ALIASES).unwrap();
        assert_eq!(table.values("Italy").unwrap(), vec![Some(1.0), Some(5.0)]);
    }

    #[test]
    fn date_gaps_should_be_rejected() {
        let csv = "Province/State,Country/Region,Lat,Long,1/22/20,1/24/20\n,Italy,0,0,1,5\n";
        let file = write_fixture(csv);
        assert!(load_series(file.path(), &COUNTRY_ALIASES).is_err());
    }

    #[test]
    fn population_should_load_with_raw_headers() {
        let csv = "\
Country (or dependency),Population (2020),Yearly Change
United States,330,0.59 %
South Korea,51,0.09 %
";
        let file = write_fixture(csv);
        let population = load_population(file.path(), &COUNTRY_ALIASES).unwrap();
        assert_eq!(population.get("Usa"), Some(330));
        assert_eq!(population.get("Korea, South"), Some(51));
        assert_eq!(population.get(COL::WORLD), Some(381));
    }

    #[test]
    fn population_should_accept_thousands_separators() {
        let csv = "country,population\nItaly,\"60,461,826\"\nChile,\n";
        let file = write_fixture(csv);
        let population = load_population(file.path(), &COUNTRY_ALIASES).unwrap();
        assert_eq!(population.get("Italy"), Some(60_461_826));
        assert!(!population.contains("Chile"));
    }

    #[test]
    fn deaths_should_be_reindexed_onto_confirmed() {
        let confirmed = write_fixture(CONFIRMED_CSV);
        let confirmed = load_series(confirmed.path(), &COUNTRY_ALIASES).unwrap();
        let deaths = write_fixture(DEATHS_CSV);
        let deaths = load_series(deaths.path(), &COUNTRY_ALIASES).unwrap();

        let same = align_to(&confirmed, deaths.clone()).unwrap();
        assert_eq!(same.values("China").unwrap(), deaths.values("China").unwrap());

        // An older cached deaths copy, one day short and without Taiwan
        let stale = TimeSeriesTable::from_columns(
            confirmed.dates()[..2].to_vec(),
            [
                ("China", vec![Some(1.0), Some(2.0)]),
                ("Atlantis", vec![Some(1.0), Some(1.0)]),
            ],
        )
        .unwrap();
        let aligned = align_to(&confirmed, stale).unwrap();
        assert_eq!(aligned.dates(), confirmed.dates());
        assert_eq!(aligned.countries(), confirmed.countries());
        assert_eq!(
            aligned.values("China").unwrap(),
            vec![Some(1.0), Some(2.0), None]
        );
        assert_eq!(aligned.values("Taiwan").unwrap(), vec![None, None, None]);
        assert!(!aligned.contains("Atlantis"));
    }

    #[test]
    fn disjoint_dates_should_be_rejected() {
        let confirmed = write_fixture(CONFIRMED_CSV);
        let confirmed = load_series(confirmed.path(), &COUNTRY_ALIASES).unwrap();
        let csv = "Province/State,Country/Region,Lat,Long,3/1/20,3/2/20\n,Italy,0,0,1,2\n";
        let deaths = write_fixture(csv);
        let deaths = load_series(deaths.path(), &COUNTRY_ALIASES).unwrap();
        assert!(align_to(&confirmed, deaths).is_err());
    }
}
