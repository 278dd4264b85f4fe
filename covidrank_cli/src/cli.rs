use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use covidrank::{
    config::Config,
    formatters::{CSVFormatter, JSONFormatter, OutputFormatter, OutputGenerator},
    metrics::MetricKind,
    view::{ChartRequest, MetricSelection, ViewRequest, ZoneSelection},
    CovidRank,
};
use enum_dispatch::enum_dispatch;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::EnumString;

use crate::display::{display_chart, display_countries, display_metrics, display_zones};
use crate::error::CovidRankCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const LOADING_STRING: &str = "Loading time series";
const QUIT: &str = "q";
const CUSTOM_ZONE: &str = "c";

/// Defines the output formats we are able to produce data in.
#[derive(Clone, Debug, Default, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

fn write_output<T, U>(
    output_generator: T,
    mut data: polars::frame::DataFrame,
    output_file: Option<U>,
) -> CovidRankCliResult<()>
where
    T: OutputGenerator,
    U: AsRef<Path>,
{
    if let Some(output_file) = output_file {
        let mut f = File::create(output_file).context("Failed to write output")?;
        output_generator.save(&mut f, &mut data)?;
    } else {
        let mut stdout_lock = std::io::stdout().lock();
        output_generator.save(&mut stdout_lock, &mut data)?;
    };
    Ok(())
}

/// Renders a chart in the requested format.
fn output_chart(
    chart: &ChartRequest,
    format: &OutputFormat,
    output_file: Option<&str>,
) -> CovidRankCliResult<()> {
    let formatter = match format {
        OutputFormat::Table => {
            display_chart(chart)?;
            return Ok(());
        }
        OutputFormat::Csv => OutputFormatter::Csv(CSVFormatter),
        OutputFormat::Json => OutputFormatter::Json(JSONFormatter),
    };
    write_output(formatter, chart.to_dataframe()?, output_file)
}

/// Where the time series come from. Local files bypass the download cache entirely.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    #[arg(long, requires = "deaths_file", help = "Read confirmed cases from a local CSV")]
    confirmed_file: Option<PathBuf>,
    #[arg(long, requires = "confirmed_file", help = "Read deaths from a local CSV")]
    deaths_file: Option<PathBuf>,
    #[arg(long, help = "Population CSV, overriding the configured path")]
    population_file: Option<PathBuf>,
}

/// Loads and computes every table, showing a spinner unless `quiet`.
async fn load(
    mut config: Config,
    source: &SourceArgs,
    quiet: bool,
    refresh: bool,
) -> CovidRankCliResult<CovidRank> {
    if let Some(population) = &source.population_file {
        config.population_path = population.clone();
    }
    let sp = (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            LOADING_STRING.to_string() + RUNNING_TAIL_STRING,
        )
    });
    let covid = match (&source.confirmed_file, &source.deaths_file) {
        (Some(confirmed), Some(deaths)) => CovidRank::from_paths(config, confirmed, deaths),
        _ => CovidRank::new_with_config(config, refresh).await,
    };
    if let Some(mut s) = sp {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
    }
    Ok(covid?)
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> CovidRankCliResult<()>;
}

/// What a line typed at a prompt means.
#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Quit,
    Default,
    Text(String),
}

fn parse_choice(line: &str) -> Choice {
    match line.trim() {
        QUIT => Choice::Quit,
        "" => Choice::Default,
        text => Choice::Text(text.to_string()),
    }
}

/// Reads one line; `None` means nothing was entered. End of input and the quit sentinel leave the
/// process immediately.
fn prompt<R: BufRead>(input: &mut R, message: &str) -> CovidRankCliResult<Option<String>> {
    print!("\n{message} [{QUIT} to quit]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        process::exit(0);
    }
    match parse_choice(&line) {
        Choice::Quit => process::exit(0),
        Choice::Default => Ok(None),
        Choice::Text(text) => Ok(Some(text)),
    }
}

/// Prompts until a non-negative integer (or nothing, meaning `default`) is entered.
fn input_integer<R: BufRead>(
    input: &mut R,
    default: usize,
    message: &str,
) -> CovidRankCliResult<usize> {
    loop {
        let Some(text) = prompt(input, message)? else {
            println!("No pick, using default value {default}");
            return Ok(default);
        };
        match text.parse::<usize>() {
            Ok(value) => return Ok(value),
            Err(_) => println!("Not a valid input"),
        }
    }
}

/// The `explore` command runs the interactive selector: pick a metric, a zone and a day window,
/// see the result, repeat.
#[derive(Args, Debug, Default)]
pub struct ExploreCommand {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(from_global)]
    quiet: bool,
    #[arg(from_global)]
    refresh: bool,
}

impl ExploreCommand {
    pub fn new(quiet: bool, refresh: bool) -> Self {
        Self {
            quiet,
            refresh,
            ..Self::default()
        }
    }

    fn read_zone<R: BufRead>(
        &self,
        covid: &CovidRank,
        input: &mut R,
    ) -> CovidRankCliResult<Option<ZoneSelection>> {
        display_zones(covid.catalog.zones(), true);
        println!("  {CUSTOM_ZONE}  Custom list of countries");
        let selection = match prompt(input, "Pick a zone (default 0)")? {
            Some(text) if text.eq_ignore_ascii_case(CUSTOM_ZONE) => {
                let Some(names) = prompt(input, "Comma-separated countries")? else {
                    return Ok(None);
                };
                match covid.catalog.zone_from_text(&names) {
                    Ok(zone) => ZoneSelection::Countries(zone.countries.into_iter().collect()),
                    Err(err) => {
                        println!("{err}");
                        return Ok(None);
                    }
                }
            }
            Some(text) => match text.parse::<usize>() {
                Ok(index) => ZoneSelection::Index(index),
                Err(_) => {
                    println!("Not a valid input");
                    return Ok(None);
                }
            },
            None => ZoneSelection::Index(0),
        };
        Ok(Some(selection))
    }
}

impl RunCommand for ExploreCommand {
    async fn run(&self, config: Config) -> CovidRankCliResult<()> {
        info!("Running `explore` subcommand");
        let covid = load(config, &self.source, self.quiet, self.refresh).await?;
        let stdin = io::stdin();
        let mut input = stdin.lock();
        loop {
            display_metrics(covid.catalog.metrics());
            let metric = input_integer(&mut input, 0, "Pick a metric (default 0)")?;
            let Some(zone) = self.read_zone(&covid, &mut input)? else {
                continue;
            };
            let days = input_integer(
                &mut input,
                covid.config.plot_days,
                &format!("Days to show (default {})", covid.config.plot_days),
            )?;
            let trend = match covid.catalog.metric(metric) {
                Ok(descriptor) if descriptor.kind == MetricKind::Confirmed => matches!(
                    prompt(&mut input, "Add trend? (y/N)")?,
                    Some(answer) if answer.eq_ignore_ascii_case("y")
                ),
                _ => false,
            };
            let request = ViewRequest {
                metric: MetricSelection::Index(metric),
                zone,
                days: Some(days),
                trend,
            };
            debug!("{request:?}");
            // A failed view is reported and the loop goes on
            match covid.view(&request) {
                Ok(chart) => display_chart(&chart)?,
                Err(err) => println!("Cannot show this selection: {err}"),
            }
        }
    }
}

/// The `metrics` command lists the metric catalog.
#[derive(Args, Debug)]
pub struct MetricsCommand {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(from_global)]
    quiet: bool,
    #[arg(from_global)]
    refresh: bool,
}

impl RunCommand for MetricsCommand {
    async fn run(&self, config: Config) -> CovidRankCliResult<()> {
        info!("Running `metrics` subcommand");
        let covid = load(config, &self.source, self.quiet, self.refresh).await?;
        display_metrics(covid.catalog.metrics());
        Ok(())
    }
}

/// The `zones` command lists the static zones and the computed rankings.
#[derive(Args, Debug)]
pub struct ZonesCommand {
    #[arg(long, help = "Show the countries of every zone")]
    full: bool,
    #[command(flatten)]
    source: SourceArgs,
    #[arg(from_global)]
    quiet: bool,
    #[arg(from_global)]
    refresh: bool,
}

impl RunCommand for ZonesCommand {
    async fn run(&self, config: Config) -> CovidRankCliResult<()> {
        info!("Running `zones` subcommand");
        let covid = load(config, &self.source, self.quiet, self.refresh).await?;
        display_zones(covid.catalog.zones(), self.full);
        Ok(())
    }
}

/// The `countries` command lists every country that can be selected, with its population when
/// known.
#[derive(Args, Debug)]
pub struct CountriesCommand {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(from_global)]
    quiet: bool,
    #[arg(from_global)]
    refresh: bool,
}

impl RunCommand for CountriesCommand {
    async fn run(&self, config: Config) -> CovidRankCliResult<()> {
        info!("Running `countries` subcommand");
        let covid = load(config, &self.source, self.quiet, self.refresh).await?;
        println!("\nThe following countries are available:");
        display_countries(covid.catalog.known_countries(), &covid.population);
        Ok(())
    }
}

/// Accepts a catalog index or a metric name such as `dailyCasesAvg`.
fn parse_metric(value: &str) -> Result<MetricSelection, String> {
    if let Ok(index) = value.parse::<usize>() {
        return Ok(MetricSelection::Index(index));
    }
    value
        .parse::<MetricKind>()
        .map(MetricSelection::Kind)
        .map_err(|_| format!("'{value}' is neither a metric index nor a metric name"))
}

/// The `plot` command renders one view without prompting.
#[derive(Args, Debug)]
pub struct PlotCommand {
    #[arg(short, long, value_parser = parse_metric, help = "Metric index or name")]
    metric: MetricSelection,
    #[arg(
        short,
        long,
        conflicts_with = "countries",
        required_unless_present = "countries",
        help = "Zone index"
    )]
    zone: Option<usize>,
    #[arg(short, long, help = "Comma-separated country names")]
    countries: Option<String>,
    #[arg(short, long, help = "Trailing days to show")]
    days: Option<usize>,
    #[arg(short, long, help = "Add the extrapolated trend (confirmed cases only)")]
    trend: bool,
    #[arg(
        short = 'f',
        long,
        default_value = "table",
        value_name = "table|csv|json",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[command(flatten)]
    source: SourceArgs,
    #[arg(from_global)]
    quiet: bool,
    #[arg(from_global)]
    refresh: bool,
}

impl RunCommand for PlotCommand {
    async fn run(&self, config: Config) -> CovidRankCliResult<()> {
        info!("Running `plot` subcommand");
        let covid = load(config, &self.source, self.quiet, self.refresh).await?;
        let zone = match (&self.countries, self.zone) {
            (Some(names), _) => ZoneSelection::Countries(
                covid
                    .catalog
                    .zone_from_text(names)?
                    .countries
                    .into_iter()
                    .collect(),
            ),
            (None, index) => ZoneSelection::Index(index.unwrap_or_default()),
        };
        let request = ViewRequest {
            metric: self.metric.clone(),
            zone,
            days: self.days,
            trend: self.trend,
        };
        debug!("{request:?}");
        let chart = covid.view(&request)?;
        output_chart(&chart, &self.output_format, self.output_file.as_deref())
    }
}

/// The `recipe` command replays a view saved as JSON
#[derive(Args, Debug)]
pub struct RecipeCommand {
    #[arg(index = 1)]
    recipe_file: String,
    #[arg(short = 'f', long, default_value = "table", value_name = "table|csv|json")]
    output_format: OutputFormat,
    #[arg(short = 'o', long)]
    output_file: Option<String>,
    #[command(flatten)]
    source: SourceArgs,
    #[arg(from_global)]
    quiet: bool,
    #[arg(from_global)]
    refresh: bool,
}

impl RunCommand for RecipeCommand {
    async fn run(&self, config: Config) -> CovidRankCliResult<()> {
        info!("Running `recipe` subcommand");
        let recipe = std::fs::read_to_string(&self.recipe_file).context(format!(
            "Failed to read recipe from file: {}",
            self.recipe_file
        ))?;
        let request: ViewRequest = serde_json::from_str(&recipe)?;
        debug!("{request:?}");
        let covid = load(config, &self.source, self.quiet, self.refresh).await?;
        let chart = covid.view(&request)?;
        output_chart(&chart, &self.output_format, self.output_file.as_deref())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Rank and compare countries by COVID-19 cases and deaths", long_about = None, name="covidrank")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress bar to stdout. Prompt, results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        long = "refresh",
        help = "Download the time series even when the cached copies are recent",
        global = true
    )]
    pub refresh: bool,
}

/// Commands contains the list of subcommands available for use in the CLI.
/// Each command should implement the RunCommand trait and specify the list
/// of args and options it supports.
#[enum_dispatch(RunCommand)]
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactively pick a metric, a zone and a day window (the default)
    Explore(ExploreCommand),
    /// List the available metrics
    Metrics(MetricsCommand),
    /// List the static zones and the computed rankings
    Zones(ZonesCommand),
    /// List the known countries
    Countries(CountriesCommand),
    /// Output one view of a metric for a zone
    Plot(PlotCommand),
    /// Replay a view saved as a JSON recipe
    Recipe(RecipeCommand),
}
