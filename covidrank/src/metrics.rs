//! The metric engine: every derived table is computed column by column from the aligned
//! cumulative confirmed/deaths tables and the population table.

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    error::{CovidRankError, CovidRankResult},
    population::PopulationTable,
    table::{is_missing, TimeSeriesTable},
};

/// Per-capita tables are expressed per million inhabitants.
pub const POPULATION_UNIT: f64 = 1_000_000.0;
pub const MOVING_AVERAGE_WINDOW: usize = 7;

/// The derived tables available for ranking and display.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(ascii_case_insensitive)]
pub enum MetricKind {
    Confirmed,
    ConfirmedPerMillion,
    DailyCases,
    DailyCasesAvg,
    DailyCasesPerMillion,
    DailyCasesPerMillionAvg,
    Deaths,
    Mortality,
    DailyDeaths,
    DailyDeathsAvg,
    DailyDeathsPerMillion,
    DailyDeathsPerMillionAvg,
    GrowthFactor,
    DeathRatio,
}

/// How a table is meant to be drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Line,
    Bar,
}

impl MetricKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed cases",
            Self::ConfirmedPerMillion => "Confirmed cases per million",
            Self::DailyCases => "Daily new cases",
            Self::DailyCasesAvg => "Daily new cases (7-day average)",
            Self::DailyCasesPerMillion => "Daily new cases per million",
            Self::DailyCasesPerMillionAvg => "Daily new cases per million (7-day average)",
            Self::Deaths => "Deaths",
            Self::Mortality => "Mortality (deaths per million)",
            Self::DailyDeaths => "Daily new deaths",
            Self::DailyDeathsAvg => "Daily new deaths (7-day average)",
            Self::DailyDeathsPerMillion => "Daily new deaths per million",
            Self::DailyDeathsPerMillionAvg => "Daily new deaths per million (7-day average)",
            Self::GrowthFactor => "Growth factor (daily)",
            Self::DeathRatio => "Death/case ratio %",
        }
    }

    /// Raw daily counts are drawn as bars, everything else as lines.
    pub fn chart(&self) -> ChartKind {
        match self {
            Self::DailyCases
            | Self::DailyCasesPerMillion
            | Self::DailyDeaths
            | Self::DailyDeathsPerMillion => ChartKind::Bar,
            _ => ChartKind::Line,
        }
    }
}

/// What the death/case ratio holds where cumulative confirmed cases are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeathRatioPolicy {
    /// Plain floating point division: `0/0` is NaN and `x/0` is infinity.
    #[default]
    Propagate,
    /// Zero confirmed cases yields a missing value.
    Missing,
    /// Zero confirmed cases yields `0`.
    Zero,
}

fn difference(today: Option<f64>, yesterday: Option<f64>) -> Option<f64> {
    Some(today? - yesterday?)
}

/// Day-over-day difference of a cumulative series. The first day compares against itself, so it
/// is always zero.
pub fn daily_delta(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(row, &today)| {
            let yesterday = if row == 0 { today } else { values[row - 1] };
            difference(today, yesterday)
        })
        .collect()
}

/// Ratio of each day's cumulative value to the previous day's. A zero (or absent, on the first
/// day) previous value is replaced by 1, so growth from nothing equals the day's raw count.
pub fn growth_factor(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(row, &today)| {
            let yesterday = if row == 0 { Some(0.0) } else { values[row - 1] };
            let divisor = match yesterday? {
                y if y == 0.0 => 1.0,
                y => y,
            };
            Some(today? / divisor)
        })
        .collect()
}

/// Trailing simple mean over `window` values; undefined until `window` values are available.
pub fn moving_average(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|row| {
            if window == 0 || row + 1 < window {
                return None;
            }
            let samples = &values[row + 1 - window..=row];
            let total = samples.iter().copied().sum::<Option<f64>>()?;
            Some(total / window as f64)
        })
        .collect()
}

/// Divides every column present in `population` by that population and scales by `unit`.
/// Countries without a (positive) population are dropped.
pub fn per_capita(
    table: &TimeSeriesTable,
    population: &PopulationTable,
    unit: f64,
) -> CovidRankResult<TimeSeriesTable> {
    let mut dropped = vec![];
    let result = table.filter_map_columns(|country, values| match population.get(country) {
        Some(people) if people > 0 => {
            let people = people as f64;
            Some(values.iter().map(|v| v.map(|v| v * unit / people)).collect())
        }
        _ => {
            dropped.push(country.to_string());
            None
        }
    })?;
    if !dropped.is_empty() {
        debug!(
            "No population for {} column(s): {}",
            dropped.len(),
            dropped.join(", ")
        );
    }
    Ok(result)
}

/// Cumulative deaths as a percentage of cumulative confirmed cases.
pub fn death_ratio(
    confirmed: &TimeSeriesTable,
    deaths: &TimeSeriesTable,
    policy: DeathRatioPolicy,
) -> CovidRankResult<TimeSeriesTable> {
    let mut failure: Option<CovidRankError> = None;
    let result = confirmed.map_columns(|country, cases| {
        let country_deaths = match deaths.values(country) {
            Ok(values) => values,
            Err(err) => {
                failure.get_or_insert(err);
                return vec![None; cases.len()];
            }
        };
        cases
            .iter()
            .zip(country_deaths)
            .map(|(&confirmed, died)| {
                let (confirmed, died) = (confirmed?, died?);
                match policy {
                    DeathRatioPolicy::Missing if confirmed == 0.0 => None,
                    DeathRatioPolicy::Zero if confirmed == 0.0 => Some(0.0),
                    _ => Some(died / confirmed * 100.0),
                }
            })
            .collect()
    })?;
    match failure {
        Some(err) => Err(err),
        None => Ok(result),
    }
}

/// Extrapolates `confirmed` for `countries` with each country's mean growth factor over the last
/// `lookback` rows. The trend starts on the last date at the last confirmed value and spans
/// `horizon` days.
pub fn trend<S: AsRef<str>>(
    confirmed: &TimeSeriesTable,
    growth: &TimeSeriesTable,
    countries: &[S],
    lookback: usize,
    horizon: usize,
) -> CovidRankResult<TimeSeriesTable> {
    let Some(&last_date) = confirmed.dates().last() else {
        return Err(CovidRankError::InvalidSeries("table has no dates".into()));
    };
    if horizon == 0 || lookback == 0 {
        return Err(CovidRankError::InvalidInput(
            "trend lookback and horizon must be positive".into(),
        ));
    }
    let dates: Vec<NaiveDate> = last_date.iter_days().take(horizon).collect();
    let recent = growth.tail(lookback);
    let mut columns = vec![];
    for country in countries {
        let country = country.as_ref();
        let factors = recent
            .values(country)?
            .into_iter()
            .filter(|v| !is_missing(*v))
            .flatten()
            .collect_vec();
        let start = confirmed.values(country)?.last().copied().flatten();
        let values = match (start, factors.is_empty()) {
            (Some(start), false) => {
                let mean = factors.iter().sum::<f64>() / factors.len() as f64;
                std::iter::successors(Some(start), |previous| Some(previous * mean))
                    .take(horizon)
                    .map(Some)
                    .collect_vec()
            }
            _ => {
                warn!("Not enough data to extrapolate a trend for '{country}'");
                vec![None; horizon]
            }
        };
        columns.push((country, values));
    }
    TimeSeriesTable::from_columns(dates, columns)
}

/// The full battery of derived tables. All share the confirmed table's date index; the per-capita
/// tables keep only countries with a known population.
#[derive(Debug, Clone)]
pub struct DerivedTables {
    confirmed: TimeSeriesTable,
    confirmed_per_million: TimeSeriesTable,
    daily_cases: TimeSeriesTable,
    daily_cases_avg: TimeSeriesTable,
    daily_cases_per_million: TimeSeriesTable,
    daily_cases_per_million_avg: TimeSeriesTable,
    deaths: TimeSeriesTable,
    mortality: TimeSeriesTable,
    daily_deaths: TimeSeriesTable,
    daily_deaths_avg: TimeSeriesTable,
    daily_deaths_per_million: TimeSeriesTable,
    daily_deaths_per_million_avg: TimeSeriesTable,
    growth_factor: TimeSeriesTable,
    death_ratio: TimeSeriesTable,
}

impl DerivedTables {
    pub fn compute(
        confirmed: TimeSeriesTable,
        deaths: TimeSeriesTable,
        population: &PopulationTable,
        policy: DeathRatioPolicy,
    ) -> CovidRankResult<Self> {
        let per_million = |table: &TimeSeriesTable| per_capita(table, population, POPULATION_UNIT);
        let average = |table: &TimeSeriesTable| {
            table.map_columns(|_, values| moving_average(values, MOVING_AVERAGE_WINDOW))
        };

        let daily_cases = confirmed.map_columns(|_, values| daily_delta(values))?;
        let daily_cases_avg = average(&daily_cases)?;
        let daily_deaths = deaths.map_columns(|_, values| daily_delta(values))?;
        let daily_deaths_avg = average(&daily_deaths)?;

        let tables = Self {
            confirmed_per_million: per_million(&confirmed)?,
            daily_cases_per_million: per_million(&daily_cases)?,
            daily_cases_per_million_avg: per_million(&daily_cases_avg)?,
            mortality: per_million(&deaths)?,
            daily_deaths_per_million: per_million(&daily_deaths)?,
            daily_deaths_per_million_avg: per_million(&daily_deaths_avg)?,
            growth_factor: confirmed.map_columns(|_, values| growth_factor(values))?,
            death_ratio: death_ratio(&confirmed, &deaths, policy)?,
            daily_cases,
            daily_cases_avg,
            daily_deaths,
            daily_deaths_avg,
            confirmed,
            deaths,
        };
        info!(
            "Computed derived tables: {} dates, {} columns ({} per capita)",
            tables.confirmed.height(),
            tables.confirmed.width(),
            tables.mortality.width()
        );
        Ok(tables)
    }

    pub fn table(&self, kind: MetricKind) -> &TimeSeriesTable {
        match kind {
            MetricKind::Confirmed => &self.confirmed,
            MetricKind::ConfirmedPerMillion => &self.confirmed_per_million,
            MetricKind::DailyCases => &self.daily_cases,
            MetricKind::DailyCasesAvg => &self.daily_cases_avg,
            MetricKind::DailyCasesPerMillion => &self.daily_cases_per_million,
            MetricKind::DailyCasesPerMillionAvg => &self.daily_cases_per_million_avg,
            MetricKind::Deaths => &self.deaths,
            MetricKind::Mortality => &self.mortality,
            MetricKind::DailyDeaths => &self.daily_deaths,
            MetricKind::DailyDeathsAvg => &self.daily_deaths_avg,
            MetricKind::DailyDeathsPerMillion => &self.daily_deaths_per_million,
            MetricKind::DailyDeathsPerMillionAvg => &self.daily_deaths_per_million_avg,
            MetricKind::GrowthFactor => &self.growth_factor,
            MetricKind::DeathRatio => &self.death_ratio,
        }
    }
}
