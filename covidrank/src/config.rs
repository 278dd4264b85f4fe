use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{metrics::DeathRatioPolicy, ranking::DEFAULT_TOP_N, COL};

const JHU_TIME_SERIES: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

/// A hand-curated group of countries shown alongside the computed rankings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StaticZone {
    pub name: String,
    pub countries: Vec<String>,
}

impl StaticZone {
    pub fn new(name: &str, countries: &[&str]) -> Self {
        Self {
            name: name.into(),
            countries: countries.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub confirmed_url: String,
    pub deaths_url: String,
    pub population_path: PathBuf,
    /// Where downloaded sources are kept. Defaults to the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Local copies younger than this (in days, fractions allowed) are not downloaded again.
    pub cache_max_age_days: f64,
    pub request_timeout_secs: u64,
    pub top_n: usize,
    pub plot_days: usize,
    pub trend_lookback_days: usize,
    pub trend_horizon_days: usize,
    pub death_ratio_policy: DeathRatioPolicy,
    pub zones: Vec<StaticZone>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            confirmed_url: format!("{JHU_TIME_SERIES}/time_series_covid19_confirmed_global.csv"),
            deaths_url: format!("{JHU_TIME_SERIES}/time_series_covid19_deaths_global.csv"),
            population_path: "population_by_country_2020.csv".into(),
            cache_dir: None,
            cache_max_age_days: 0.25,
            request_timeout_secs: 30,
            top_n: DEFAULT_TOP_N,
            plot_days: 28,
            trend_lookback_days: 5,
            trend_horizon_days: 4,
            death_ratio_policy: DeathRatioPolicy::default(),
            zones: default_zones(),
        }
    }
}

fn default_zones() -> Vec<StaticZone> {
    vec![
        StaticZone::new(COL::WORLD, &[COL::WORLD]),
        StaticZone::new(
            "Latam",
            &[
                "Brazil",
                "Argentina",
                "Chile",
                "Mexico",
                "Ecuador",
                "Uruguay",
                "Peru",
            ],
        ),
        StaticZone::new(
            "Europe",
            &[
                "Italy",
                "Spain",
                "Germany",
                "France",
                "United Kingdom",
                "Switzerland",
                "Austria",
                "Norway",
                "Sweden",
                "Belgium",
                "Netherlands",
            ],
        ),
        StaticZone::new(
            "Zones of interest",
            &[
                COL::WORLD,
                COL::WORLD_EXCEPT_CHINA,
                COL::CHINA,
                "Italy",
                "Usa",
                "Germany",
                "Switzerland",
                "United Kingdom",
                "Spain",
                "Iran",
                "Argentina",
                "Korea, South",
                "Canada",
                "Austria",
                "Norway",
                "Russia",
            ],
        ),
    ]
}

impl Config {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("covidrank")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn confirmed_cache_path(&self) -> PathBuf {
        self.cache_dir().join("confirmed.csv")
    }

    pub fn deaths_cache_path(&self) -> PathBuf {
        self.cache_dir().join("deaths.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_should_fill_defaults() {
        let config: Config = toml::from_str(
            r#"
            top_n = 5
            death_ratio_policy = "zero"
            cache_dir = "/tmp/covid"
            "#,
        )
        .unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.death_ratio_policy, DeathRatioPolicy::Zero);
        assert_eq!(config.plot_days, 28);
        assert_eq!(config.zones, default_zones());
        assert_eq!(
            config.confirmed_cache_path(),
            PathBuf::from("/tmp/covid/confirmed.csv")
        );
    }

    #[test]
    fn zones_should_be_replaceable() {
        let config: Config = toml::from_str(
            r#"
            [[zones]]
            name = "Andes"
            countries = ["Chile", "Peru", "Bolivia"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.zones,
            vec![StaticZone::new("Andes", &["Chile", "Peru", "Bolivia"])]
        );
    }
}
