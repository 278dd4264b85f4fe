//! The date-indexed, country-columned table every pipeline stage produces.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::{
    error::{CovidRankError, CovidRankResult},
    COL,
};

/// A value is missing when it is null or NaN, matching how rankings and the last-valid-row lookup
/// treat gaps.
pub fn is_missing(value: Option<f64>) -> bool {
    value.map_or(true, f64::is_nan)
}

fn series_values(series: &Series) -> CovidRankResult<Vec<Option<f64>>> {
    Ok(series.f64()?.into_iter().collect())
}

fn validate_dates(dates: &[NaiveDate]) -> CovidRankResult<()> {
    for pair in dates.windows(2) {
        if pair[0].succ_opt() != Some(pair[1]) {
            return Err(CovidRankError::InvalidSeries(format!(
                "dates must be consecutive days, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
    }
    Ok(())
}

/// A table keyed by (date, country). Rows follow a gap-free daily date index; each column is a
/// `Float64` series named after a country. Nulls mark undefined values.
#[derive(Debug, Clone)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    frame: DataFrame,
}

impl TimeSeriesTable {
    /// Wraps a frame of country columns, casting every column to `Float64`.
    pub fn new(dates: Vec<NaiveDate>, frame: DataFrame) -> CovidRankResult<Self> {
        validate_dates(&dates)?;
        if frame.width() > 0 && frame.height() != dates.len() {
            return Err(CovidRankError::InvalidSeries(format!(
                "table has {} rows but {} dates",
                frame.height(),
                dates.len()
            )));
        }
        let columns = frame
            .get_columns()
            .iter()
            .map(|series| series.cast(&DataType::Float64))
            .collect::<PolarsResult<Vec<Series>>>()?;
        Ok(Self {
            dates,
            frame: DataFrame::new(columns)?,
        })
    }

    /// Builds a table from named value vectors, one per country.
    pub fn from_columns<I, S>(dates: Vec<NaiveDate>, columns: I) -> CovidRankResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<Option<f64>>)>,
        S: AsRef<str>,
    {
        let mut series = vec![];
        for (name, values) in columns {
            if values.len() != dates.len() {
                return Err(CovidRankError::InvalidSeries(format!(
                    "column '{}' has {} values but there are {} dates",
                    name.as_ref(),
                    values.len(),
                    dates.len()
                )));
            }
            series.push(Series::new(name.as_ref(), values));
        }
        Self::new(dates, DataFrame::new(series)?)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn height(&self) -> usize {
        self.dates.len()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn countries(&self) -> Vec<&str> {
        self.frame.get_columns().iter().map(|s| s.name()).collect()
    }

    pub fn contains(&self, country: &str) -> bool {
        self.frame.get_column_index(country).is_some()
    }

    fn series(&self, country: &str) -> CovidRankResult<&Series> {
        if !self.contains(country) {
            return Err(CovidRankError::MissingColumn(country.to_string()));
        }
        Ok(self.frame.column(country)?)
    }

    /// All values of one country, in date order.
    pub fn values(&self, country: &str) -> CovidRankResult<Vec<Option<f64>>> {
        series_values(self.series(country)?)
    }

    pub fn value(&self, row: usize, country: &str) -> CovidRankResult<Option<f64>> {
        Ok(self.series(country)?.f64()?.get(row))
    }

    /// Iterates over `(country, values)` pairs in column order.
    pub fn columns(&self) -> CovidRankResult<Vec<(&str, Vec<Option<f64>>)>> {
        self.frame
            .get_columns()
            .iter()
            .map(|series| -> CovidRankResult<_> {
                Ok((series.name(), series_values(series)?))
            })
            .collect()
    }

    /// Derives a table on the same date index, keeping only the columns for which `f` returns
    /// values.
    pub fn filter_map_columns<F>(&self, mut f: F) -> CovidRankResult<Self>
    where
        F: FnMut(&str, &[Option<f64>]) -> Option<Vec<Option<f64>>>,
    {
        let mut columns = vec![];
        for (name, values) in self.columns()? {
            if let Some(derived) = f(name, &values) {
                columns.push((name, derived));
            }
        }
        Self::from_columns(self.dates.clone(), columns)
    }

    /// Derives a table on the same date index and column set.
    pub fn map_columns<F>(&self, mut f: F) -> CovidRankResult<Self>
    where
        F: FnMut(&str, &[Option<f64>]) -> Vec<Option<f64>>,
    {
        self.filter_map_columns(|name, values| Some(f(name, values)))
    }

    /// Returns a copy with `country` appended as the last column.
    pub fn with_column(&self, country: &str, values: Vec<Option<f64>>) -> CovidRankResult<Self> {
        if values.len() != self.height() {
            return Err(CovidRankError::InvalidSeries(format!(
                "column '{country}' has {} values but there are {} dates",
                values.len(),
                self.height()
            )));
        }
        let mut columns = self.frame.get_columns().to_vec();
        columns.push(Series::new(country, values));
        Self::new(self.dates.clone(), DataFrame::new(columns)?)
    }

    /// Restricts the table to `countries`, in the order given.
    pub fn select<S: AsRef<str>>(&self, countries: &[S]) -> CovidRankResult<Self> {
        let columns = countries
            .iter()
            .map(|country| self.series(country.as_ref()).cloned())
            .collect::<CovidRankResult<Vec<Series>>>()?;
        Self::new(self.dates.clone(), DataFrame::new(columns)?)
    }

    /// Keeps the trailing `days` rows. Asking for more rows than exist returns the whole table.
    pub fn tail(&self, days: usize) -> Self {
        let days = days.min(self.height());
        let offset = self.height() - days;
        Self {
            dates: self.dates[offset..].to_vec(),
            frame: self.frame.slice(offset as i64, days),
        }
    }

    /// The last row holding at least one present value.
    pub fn last_valid_row(&self) -> CovidRankResult<Option<usize>> {
        let mut last: Option<usize> = None;
        for series in self.frame.get_columns() {
            let values = series.f64()?;
            if let Some(row) = (0..values.len()).rev().find(|&i| !is_missing(values.get(i))) {
                last = Some(last.map_or(row, |current| current.max(row)));
            }
        }
        Ok(last)
    }

    /// The country columns without the date index.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// The table as a polars frame with the `date` column first.
    pub fn to_dataframe(&self) -> CovidRankResult<DataFrame> {
        let mut columns = vec![Series::new(COL::DATE, self.dates.clone())];
        columns.extend(self.frame.get_columns().iter().cloned());
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn days(count: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 22).unwrap();
        start.iter_days().take(count).collect()
    }

    pub(crate) fn table<const N: usize>(columns: &[(&str, [f64; N])]) -> TimeSeriesTable {
        TimeSeriesTable::from_columns(
            days(N),
            columns
                .iter()
                .map(|(name, values)| (*name, values.iter().copied().map(Some).collect())),
        )
        .unwrap()
    }

    #[test]
    fn gaps_in_dates_should_be_rejected() {
        let mut dates = days(3);
        dates[2] = dates[2].succ_opt().unwrap();
        let result = TimeSeriesTable::from_columns(dates, [("Italy", vec![Some(1.0); 3])]);
        assert!(matches!(result, Err(CovidRankError::InvalidSeries(_))));
    }

    #[test]
    fn mismatched_lengths_should_be_rejected() {
        let result = TimeSeriesTable::from_columns(days(3), [("Italy", vec![Some(1.0); 2])]);
        assert!(matches!(result, Err(CovidRankError::InvalidSeries(_))));
    }

    #[test]
    fn integer_columns_should_be_cast_to_float() {
        let frame = df!("Italy" => &[1i64, 2, 3]).unwrap();
        let table = TimeSeriesTable::new(days(3), frame).unwrap();
        assert_eq!(
            table.values("Italy").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn select_should_follow_requested_order() {
        let table = table(&[("Italy", [1.0]), ("Spain", [2.0]), ("Chile", [3.0])]);
        let selected = table.select(&["Chile", "Italy"]).unwrap();
        assert_eq!(selected.countries(), vec!["Chile", "Italy"]);
        assert!(matches!(
            table.select(&["Narnia"]),
            Err(CovidRankError::MissingColumn(name)) if name == "Narnia"
        ));
    }

    #[test]
    fn tail_should_keep_trailing_rows() {
        let table = table(&[("Italy", [1.0, 2.0, 3.0, 4.0])]);
        let tail = table.tail(2);
        assert_eq!(tail.dates(), &table.dates()[2..]);
        assert_eq!(tail.values("Italy").unwrap(), vec![Some(3.0), Some(4.0)]);
        assert_eq!(table.tail(10).height(), 4);
    }

    #[test]
    fn last_valid_row_should_skip_trailing_gaps() {
        let table = TimeSeriesTable::from_columns(
            days(4),
            [
                ("Italy", vec![Some(1.0), Some(2.0), None, None]),
                ("Spain", vec![None, Some(f64::NAN), Some(3.0), Some(f64::NAN)]),
            ],
        )
        .unwrap();
        assert_eq!(table.last_valid_row().unwrap(), Some(2));

        let empty = TimeSeriesTable::from_columns(days(2), [("Italy", vec![None, None])]).unwrap();
        assert_eq!(empty.last_valid_row().unwrap(), None);
    }

    #[test]
    fn dataframe_should_lead_with_dates() {
        let table = table(&[("Italy", [1.0, 2.0])]);
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.get_column_names(), vec![COL::DATE, "Italy"]);
        assert_eq!(df.shape(), (2, 2));
    }
}
