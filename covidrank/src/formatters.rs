use std::io::{Cursor, Write};

use anyhow::{anyhow, Result};
use enum_dispatch::enum_dispatch;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Utility function to convert from polars `AnyValue` to `serde_json::Value`.
/// Covers the types a chart frame holds. Non-finite floats become `null`.
fn any_value_to_json(value: &AnyValue) -> Result<Value> {
    match value {
        AnyValue::Null => Ok(Value::Null),
        AnyValue::Boolean(b) => Ok(Value::Bool(*b)),
        AnyValue::String(s) => Ok(Value::String((*s).to_string())),
        AnyValue::Int32(n) => Ok(json!(*n)),
        AnyValue::Int64(n) => Ok(json!(*n)),
        AnyValue::UInt32(n) => Ok(json!(*n)),
        AnyValue::UInt64(n) => Ok(json!(*n)),
        AnyValue::Float32(n) => Ok(json!(*n)),
        AnyValue::Float64(n) => Ok(json!(*n)),
        _ => Err(anyhow!("Failed to convert type: {}", value.dtype())),
    }
}

/// Trait to define different output generators. Defines two
/// functions, format which generates a serialized string of the
/// `DataFrame` and save which writes it to a writer
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        // Just creating an empty vec to store the buffered output
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;

        Ok(String::from_utf8(data)?)
    }
}

/// Enum of OutputFormatters one for each potential
/// output type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug)]
pub enum OutputFormatter {
    Csv(CSVFormatter),
    Json(JSONFormatter),
}

/// Format the results as a CSV file
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CSVFormatter;

impl OutputGenerator for CSVFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        CsvWriter::new(writer).finish(df)?;
        Ok(())
    }
}

/// Format the results as a JSON array with one object per date, keys in column order
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct JSONFormatter;

impl OutputGenerator for JSONFormatter {
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        // Dates are rendered as ISO strings rather than day counts
        let columns = df
            .get_columns()
            .iter()
            .map(|series| match series.dtype() {
                DataType::Date => series.cast(&DataType::String),
                _ => Ok(series.clone()),
            })
            .collect::<PolarsResult<Vec<Series>>>()?;

        let mut records = vec![];
        for idx in 0..df.height() {
            let mut record = serde_json::Map::new();
            for col in &columns {
                record.insert(col.name().to_string(), any_value_to_json(&col.get(idx)?)?);
            }
            records.push(Value::Object(record));
        }
        Ok(Value::Array(records).to_string())
    }

    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        let result = self.format(df)?;
        writer.write_all(result.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn test_df() -> DataFrame {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        df!(
             "date" => start.iter_days().take(3).collect::<Vec<_>>(),
             "Italy" => &[Some(1.0), Some(2.5), None],
             "Italy (trend)" => &[None, Some(2.5), Some(f64::NAN)]
        )
        .unwrap()
    }

    #[test]
    fn csv_formatter_should_work() {
        let formatter = OutputFormatter::Csv(CSVFormatter);
        let mut df = test_df();
        let output = formatter.format(&mut df);
        let correct_str = [
            "date,Italy,Italy (trend)",
            "2020-03-01,1.0,",
            "2020-03-02,2.5,2.5",
            "2020-03-03,,NaN",
            "",
        ]
        .join("\n");

        assert!(output.is_ok(), "Output should not error");
        assert_eq!(output.unwrap(), correct_str, "Output should be correct");
    }

    #[test]
    fn json_formatter_should_work() {
        let formatter = OutputFormatter::Json(JSONFormatter);
        let mut df = test_df();
        let output = formatter.format(&mut df);
        let correct_str = concat!(
            r#"[{"date":"2020-03-01","Italy":1.0,"Italy (trend)":null},"#,
            r#"{"date":"2020-03-02","Italy":2.5,"Italy (trend)":2.5},"#,
            r#"{"date":"2020-03-03","Italy":null,"Italy (trend)":null}]"#
        );
        assert!(output.is_ok(), "Output should not error");
        assert_eq!(output.unwrap(), correct_str, "Output should be correct");
    }
}
