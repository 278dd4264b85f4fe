use comfy_table::{presets::NOTHING, *};
use covidrank::{
    catalog::{MetricDescriptor, ZoneDescriptor},
    metrics::ChartKind,
    population::PopulationTable,
    view::ChartRequest,
};
use polars::prelude::*;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn header<I: IntoIterator<Item = S>, S: ToString>(names: I) -> Vec<Cell> {
    names
        .into_iter()
        .map(|name| Cell::new(name.to_string()).add_attribute(Attribute::Bold))
        .collect()
}

pub fn display_metrics(metrics: &[MetricDescriptor]) {
    let mut table = new_table();
    table.set_header(header(["#", "Metric", "Drawn as"]));
    for (index, metric) in metrics.iter().enumerate() {
        let chart = match metric.chart {
            ChartKind::Line => "lines",
            ChartKind::Bar => "bars",
        };
        table.add_row(vec![index.to_string(), metric.label.to_string(), chart.into()]);
    }
    if let Some(column) = table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("\n{table}");
}

/// Lists the zone catalog. With `full`, every zone's countries are spelled out.
pub fn display_zones(zones: &[ZoneDescriptor], full: bool) {
    let mut table = new_table();
    if full {
        table.set_header(header(["#", "Zone", "Countries"]));
    } else {
        table.set_header(header(["#", "Zone"]));
    }
    for (index, zone) in zones.iter().enumerate() {
        let mut row = vec![index.to_string(), zone.label.clone()];
        if full {
            row.push(zone.listing.clone().unwrap_or_default());
        }
        table.add_row(row);
    }
    if let Some(column) = table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("\n{table}");
}

pub fn display_countries(countries: &[String], population: &PopulationTable) {
    let mut table = new_table();
    table.set_header(header(["Country", "Population"]));
    for country in countries {
        let population = population
            .get(country)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        table.add_row(vec![country.clone(), population]);
    }
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("\n{table}");
}

fn format_value(value: AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Float64(v) => format!("{v:.2}"),
        AnyValue::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Renders a chart frame as rows of dates by countries.
pub fn display_chart(chart: &ChartRequest) -> anyhow::Result<()> {
    let df = chart.to_dataframe()?;
    let columns = df
        .get_columns()
        .iter()
        .map(|series| match series.dtype() {
            DataType::Date => series.cast(&DataType::String),
            _ => Ok(series.clone()),
        })
        .collect::<PolarsResult<Vec<Series>>>()?;

    let mut table = new_table();
    table.set_header(header(df.get_column_names()));
    for idx in 0..df.height() {
        let row = columns
            .iter()
            .map(|series| series.get(idx).map(format_value))
            .collect::<PolarsResult<Vec<String>>>()?;
        table.add_row(row);
    }
    for column in table.column_iter_mut().skip(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("\n{}\n{table}", chart.title);
    Ok(())
}
