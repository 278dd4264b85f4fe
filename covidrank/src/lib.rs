use std::{path::Path, time::Duration};

use aliases::COUNTRY_ALIASES;
use anyhow::Result;
use cache::{update_file, Fetch, HttpFetcher};
use catalog::Catalog;
use error::CovidRankResult;
use log::debug;
use metrics::DerivedTables;
use population::PopulationTable;
use table::TimeSeriesTable;
use view::{ChartRequest, ViewRequest};

use crate::config::Config;

// Re-exports
pub use column_names as COL;

// Modules
pub mod aliases;
pub mod cache;
pub mod catalog;
pub mod column_names;
pub mod config;
pub mod error;
pub mod formatters;
pub mod loader;
pub mod metrics;
pub mod population;
pub mod ranking;
pub mod table;
pub mod view;

/// The loaded pipeline: every derived table and the catalogs built from them
pub struct CovidRank {
    pub config: Config,
    pub population: PopulationTable,
    pub tables: DerivedTables,
    pub catalog: Catalog,
}

impl CovidRank {
    /// Setup the CovidRank object with default configuration
    pub async fn new() -> Result<Self> {
        Self::new_with_config(Config::default(), false).await
    }

    /// Setup the CovidRank object with custom configuration, downloading sources over HTTP
    pub async fn new_with_config(config: Config, force_refresh: bool) -> Result<Self> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
        Self::new_with_fetcher(config, &fetcher, force_refresh).await
    }

    /// Setup the CovidRank object, refreshing the cached sources through `fetcher`
    pub async fn new_with_fetcher<F: Fetch>(
        config: Config,
        fetcher: &F,
        force_refresh: bool,
    ) -> Result<Self> {
        debug!("config: {config:?}");
        let confirmed = update_file(
            fetcher,
            &config.confirmed_url,
            &config.confirmed_cache_path(),
            config.cache_max_age_days,
            force_refresh,
        )
        .await?;
        let deaths = update_file(
            fetcher,
            &config.deaths_url,
            &config.deaths_cache_path(),
            config.cache_max_age_days,
            force_refresh,
        )
        .await?;
        Self::from_paths(config, &confirmed, &deaths)
    }

    /// Setup the CovidRank object from local time series files
    pub fn from_paths(config: Config, confirmed: &Path, deaths: &Path) -> Result<Self> {
        let confirmed = loader::load_series(confirmed, &COUNTRY_ALIASES)?;
        let deaths = loader::load_series(deaths, &COUNTRY_ALIASES)?;
        let population = loader::load_population(&config.population_path, &COUNTRY_ALIASES)?;
        Self::from_tables(config, confirmed, deaths, population)
    }

    /// Setup the CovidRank object from normalized tables
    pub fn from_tables(
        config: Config,
        confirmed: TimeSeriesTable,
        deaths: TimeSeriesTable,
        population: PopulationTable,
    ) -> Result<Self> {
        let deaths = loader::align_to(&confirmed, deaths)?;
        let tables =
            DerivedTables::compute(confirmed, deaths, &population, config.death_ratio_policy)?;
        let catalog = Catalog::build(&tables, &config.zones, config.top_n)?;
        Ok(Self {
            config,
            population,
            tables,
            catalog,
        })
    }

    /// Resolves a selection into the slice to draw
    pub fn view(&self, request: &ViewRequest) -> CovidRankResult<ChartRequest> {
        request.resolve(&self.tables, &self.catalog, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::anyhow;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        loader::tests::{write_fixture, CONFIRMED_CSV, DEATHS_CSV, POPULATION_CSV},
        metrics::MetricKind,
        view::{MetricSelection, ZoneSelection},
    };

    /// Serves fixed bodies without touching the network
    struct StaticFetcher(HashMap<&'static str, &'static str>);

    impl Fetch for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0
                .get(url)
                .map(|body| body.as_bytes().to_vec())
                .ok_or_else(|| anyhow!("no route to {url}"))
        }
    }

    fn test_config(cache: &TempDir, population: &Path) -> Config {
        Config {
            confirmed_url: "mem://confirmed".into(),
            deaths_url: "mem://deaths".into(),
            population_path: population.to_path_buf(),
            cache_dir: Some(cache.path().to_path_buf()),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn pipeline_should_load_through_fetcher() {
        let cache = TempDir::new().unwrap();
        let population = write_fixture(POPULATION_CSV);
        let config = test_config(&cache, population.path());
        let fetcher = StaticFetcher(HashMap::from([
            ("mem://confirmed", CONFIRMED_CSV),
            ("mem://deaths", DEATHS_CSV),
        ]));

        let covid = CovidRank::new_with_fetcher(config, &fetcher, false)
            .await
            .unwrap();
        assert!(cache.path().join("confirmed.csv").exists());
        assert_eq!(covid.population.get(COL::WORLD), Some(1809));

        let chart = covid
            .view(&ViewRequest {
                metric: MetricSelection::Kind(MetricKind::Deaths),
                zone: ZoneSelection::Countries(vec!["china".into()]),
                days: Some(1),
                trend: false,
            })
            .unwrap();
        assert_eq!(chart.data.values("China").unwrap(), vec![Some(4.0)]);
    }

    #[test]
    fn pipeline_should_accept_an_older_deaths_copy() {
        let cache = TempDir::new().unwrap();
        let population = write_fixture(POPULATION_CSV);
        let confirmed = write_fixture(CONFIRMED_CSV);
        let deaths = write_fixture(
            "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n\
             Hubei,China,30.97,112.27,1,2\n\
             ,Italy,41.87,12.56,0,0\n",
        );
        let config = test_config(&cache, population.path());

        let covid = CovidRank::from_paths(config, confirmed.path(), deaths.path()).unwrap();
        assert_eq!(
            covid.tables.table(MetricKind::Deaths).dates(),
            covid.tables.table(MetricKind::Confirmed).dates()
        );

        let chart = covid
            .view(&ViewRequest {
                metric: MetricSelection::Kind(MetricKind::Deaths),
                zone: ZoneSelection::Countries(vec!["China".into(), "Italy".into()]),
                days: None,
                trend: false,
            })
            .unwrap();
        assert_eq!(
            chart.data.values("China").unwrap(),
            vec![Some(1.0), Some(2.0), None]
        );
    }

    #[tokio::test]
    async fn pipeline_should_fail_without_any_source() {
        let cache = TempDir::new().unwrap();
        let population = write_fixture(POPULATION_CSV);
        let config = test_config(&cache, population.path());
        let fetcher = StaticFetcher(HashMap::new());

        let result = CovidRank::new_with_fetcher(config, &fetcher, false).await;
        assert!(result.is_err(), "Startup should fail with nothing to load");
    }
}
