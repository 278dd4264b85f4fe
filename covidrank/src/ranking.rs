//! Top-N ranking of countries by their most recent value in a table.

use std::cmp::Ordering;

use log::debug;

use crate::{
    error::CovidRankResult,
    table::TimeSeriesTable,
    COL,
};

pub const DEFAULT_TOP_N: usize = 10;

/// Returns up to `n` countries of `table` with the largest value at the table's last valid row,
/// largest first. The aggregate columns and anything in `exclude` are skipped. Missing values sort
/// after present ones and equal values keep their column order.
pub fn top_n<S: AsRef<str>>(
    table: &TimeSeriesTable,
    exclude: &[S],
    n: usize,
) -> CovidRankResult<Vec<String>> {
    let Some(row) = table.last_valid_row()? else {
        debug!("Table has no valid rows, nothing to rank");
        return Ok(vec![]);
    };
    let mut candidates = table
        .countries()
        .into_iter()
        .filter(|country| {
            !COL::AGGREGATES.contains(country)
                && !exclude.iter().any(|excluded| excluded.as_ref() == *country)
        })
        .map(|country| -> CovidRankResult<_> {
            let value = table.value(row, country)?;
            Ok((country, value.filter(|v| !v.is_nan())))
        })
        .collect::<CovidRankResult<Vec<(&str, Option<f64>)>>>()?;

    // `sort_by` is stable, so ties keep column order
    candidates.sort_by(|(_, a), (_, b)| match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Ok(candidates
        .into_iter()
        .take(n)
        .map(|(country, _)| country.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::{days, table};

    const NO_EXCLUSIONS: [&str; 0] = [];

    #[test]
    fn should_rank_by_latest_value_descending() {
        let table = table(&[
            ("Italy", [9.0, 1.0]),
            ("Spain", [0.0, 5.0]),
            ("Chile", [0.0, 3.0]),
        ]);
        assert_eq!(
            top_n(&table, &NO_EXCLUSIONS, 2).unwrap(),
            vec!["Spain", "Chile"]
        );
    }

    #[test]
    fn ties_should_keep_column_order() {
        let table = table(&[
            ("Peru", [4.0]),
            ("Italy", [7.0]),
            ("Chile", [4.0]),
            ("Spain", [4.0]),
        ]);
        assert_eq!(
            top_n(&table, &NO_EXCLUSIONS, 10).unwrap(),
            vec!["Italy", "Peru", "Chile", "Spain"]
        );
    }

    #[test]
    fn aggregates_should_never_be_ranked() {
        let table = table(&[
            ("Italy", [1.0]),
            (COL::WORLD, [100.0]),
            (COL::WORLD_EXCEPT_CHINA, [90.0]),
            ("China", [10.0]),
        ]);
        assert_eq!(
            top_n(&table, &NO_EXCLUSIONS, 10).unwrap(),
            vec!["China", "Italy"]
        );
        assert_eq!(top_n(&table, &["China"], 10).unwrap(), vec!["Italy"]);
    }

    #[test]
    fn should_use_last_valid_row() {
        let table = TimeSeriesTable::from_columns(
            days(3),
            [
                ("Italy", vec![Some(1.0), Some(2.0), None]),
                ("Spain", vec![Some(5.0), Some(1.0), None]),
            ],
        )
        .unwrap();
        assert_eq!(
            top_n(&table, &NO_EXCLUSIONS, 10).unwrap(),
            vec!["Italy", "Spain"]
        );
    }

    #[test]
    fn missing_values_should_sort_last() {
        let table = TimeSeriesTable::from_columns(
            days(1),
            [
                ("Italy", vec![Some(f64::NAN)]),
                ("Peru", vec![None]),
                ("Spain", vec![Some(1.0)]),
                ("Chile", vec![Some(f64::INFINITY)]),
            ],
        )
        .unwrap();
        assert_eq!(
            top_n(&table, &NO_EXCLUSIONS, 10).unwrap(),
            vec!["Chile", "Spain", "Italy", "Peru"]
        );
    }

    #[test]
    fn empty_tables_should_rank_nothing() {
        let table = TimeSeriesTable::from_columns(days(2), [("Italy", vec![None, None])]).unwrap();
        assert!(top_n(&table, &NO_EXCLUSIONS, 10).unwrap().is_empty());
    }
}
