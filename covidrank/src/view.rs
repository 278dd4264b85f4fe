//! Resolves a selection (metric, zone, day window) into the slice a renderer draws.

use chrono::NaiveDate;
use itertools::Itertools;
use log::{info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{zone_from_names, Catalog, Zone},
    config::Config,
    error::{CovidRankError, CovidRankResult},
    metrics::{trend, ChartKind, DerivedTables, MetricKind},
    table::TimeSeriesTable,
    COL,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum MetricSelection {
    /// Position in the metric catalog.
    Index(usize),
    Kind(MetricKind),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ZoneSelection {
    /// Position in the zone catalog.
    Index(usize),
    /// Country names, matched against the known countries.
    Countries(Vec<String>),
}

/// A saved selection. Serialized as JSON it doubles as a replayable recipe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
    pub metric: MetricSelection,
    pub zone: ZoneSelection,
    /// Trailing days to keep; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<usize>,
    #[serde(default)]
    pub trend: bool,
}

/// What a renderer needs: a title, how to draw, the data slice and an optional trend overlay.
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub title: String,
    pub kind: ChartKind,
    pub data: TimeSeriesTable,
    pub trend: Option<TimeSeriesTable>,
}

impl ViewRequest {
    pub fn resolve(
        &self,
        tables: &DerivedTables,
        catalog: &Catalog,
        config: &Config,
    ) -> CovidRankResult<ChartRequest> {
        let metric = match &self.metric {
            MetricSelection::Index(index) => catalog.metric(*index)?.kind,
            MetricSelection::Kind(kind) => *kind,
        };
        let days = self.days.unwrap_or(config.plot_days);
        if days == 0 {
            return Err(CovidRankError::InvalidInput(
                "the day window must hold at least one day".into(),
            ));
        }
        if self.trend && metric != MetricKind::Confirmed {
            return Err(CovidRankError::TrendUnavailable(metric));
        }
        let zone = match &self.zone {
            ZoneSelection::Index(index) => catalog.zone(*index)?.zone.clone(),
            ZoneSelection::Countries(names) => zone_from_names(names, catalog.known_countries())?,
        };

        let table = tables.table(metric);
        let countries = present_countries(&zone, table, metric)?;
        let data = table.select(&countries)?.tail(days);
        let trend = if self.trend {
            Some(trend(
                tables.table(MetricKind::Confirmed),
                tables.table(MetricKind::GrowthFactor),
                &countries,
                config.trend_lookback_days,
                config.trend_horizon_days,
            )?)
        } else {
            None
        };
        info!(
            "View of {metric} for '{}': {} countries over {} days",
            zone.name,
            data.width(),
            data.height()
        );
        Ok(ChartRequest {
            title: format!("COVID-19 {} - {}", metric.label(), zone.name),
            kind: metric.chart(),
            data,
            trend,
        })
    }
}

fn present_countries<'a>(
    zone: &'a Zone,
    table: &TimeSeriesTable,
    metric: MetricKind,
) -> CovidRankResult<Vec<&'a str>> {
    let (present, missing): (Vec<&str>, Vec<&str>) = zone
        .countries
        .iter()
        .map(String::as_str)
        .partition(|country| table.contains(country));
    if !missing.is_empty() {
        warn!("No {metric} data for: {}", missing.join(", "));
    }
    if present.is_empty() {
        return Err(CovidRankError::EmptySelection(format!(
            "none of '{}' has {metric} data",
            zone.name
        )));
    }
    Ok(present)
}

/// Lays `values` (indexed by `dates`) out over `union`, leaving gaps as nulls.
fn align(dates: &[NaiveDate], values: Vec<Option<f64>>, union: &[NaiveDate]) -> Vec<Option<f64>> {
    union
        .iter()
        .map(|date| {
            dates
                .binary_search(date)
                .ok()
                .and_then(|row| values[row])
        })
        .collect()
}

impl ChartRequest {
    /// The data as one frame: `date`, the selected countries and, with a trend, one
    /// `<country> (trend)` column each. Rows cover the dates of both tables.
    pub fn to_dataframe(&self) -> CovidRankResult<DataFrame> {
        let Some(trend) = &self.trend else {
            return self.data.to_dataframe();
        };
        let union = self
            .data
            .dates()
            .iter()
            .merge(trend.dates())
            .dedup()
            .copied()
            .collect_vec();

        let mut columns = vec![Series::new(COL::DATE, union.clone())];
        for (country, values) in self.data.columns()? {
            columns.push(Series::new(country, align(self.data.dates(), values, &union)));
        }
        for (country, values) in trend.columns()? {
            let name = format!("{country}{}", COL::TREND_SUFFIX);
            columns.push(Series::new(&name, align(trend.dates(), values, &union)));
        }
        Ok(DataFrame::new(columns)?)
    }
}
