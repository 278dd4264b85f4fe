//! The index-addressable menus a selector works from: the metric catalog, the zone catalog (static
//! zones interleaved with computed rankings) and the set of every known country.

use itertools::Itertools;
use log::{debug, info, warn};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    config::StaticZone,
    error::{CovidRankError, CovidRankResult},
    metrics::{ChartKind, DerivedTables, MetricKind},
    ranking::top_n,
};

/// Rankings shown after each static zone, in order. Groups left over once the static zones run
/// out are appended at the end.
const RANKING_GROUPS: [&[MetricKind]; 3] = [
    &[
        MetricKind::Confirmed,
        MetricKind::DailyCasesAvg,
        MetricKind::DailyCasesPerMillionAvg,
        MetricKind::ConfirmedPerMillion,
    ],
    &[
        MetricKind::Deaths,
        MetricKind::DailyDeathsAvg,
        MetricKind::DailyDeathsPerMillionAvg,
        MetricKind::Mortality,
    ],
    &[MetricKind::GrowthFactor, MetricKind::DeathRatio],
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDescriptor {
    pub kind: MetricKind,
    pub label: &'static str,
    pub chart: ChartKind,
}

impl From<MetricKind> for MetricDescriptor {
    fn from(kind: MetricKind) -> Self {
        Self {
            kind,
            label: kind.label(),
            chart: kind.chart(),
        }
    }
}

/// A named, ordered group of countries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub countries: NonEmpty<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneDescriptor {
    pub zone: Zone,
    pub label: String,
    /// The countries spelled out, for zones of more than one country.
    pub listing: Option<String>,
    /// The metric a computed zone was ranked by; `None` for static zones.
    pub ranked_by: Option<MetricKind>,
}

impl ZoneDescriptor {
    fn new(zone: Zone, ranked_by: Option<MetricKind>) -> Self {
        let listing = (zone.countries.len() > 1).then(|| zone.countries.iter().join(", "));
        Self {
            label: zone.name.clone(),
            zone,
            listing,
            ranked_by,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    metrics: Vec<MetricDescriptor>,
    zones: Vec<ZoneDescriptor>,
    known_countries: Vec<String>,
}

fn ranked_zone(
    tables: &DerivedTables,
    kind: MetricKind,
    n: usize,
) -> CovidRankResult<Option<ZoneDescriptor>> {
    let ranked = top_n(tables.table(kind), &[] as &[&str], n)?;
    let Some(countries) = NonEmpty::from_vec(ranked) else {
        warn!("No values to rank by {kind}, leaving the zone out");
        return Ok(None);
    };
    let name = format!("Top {} by {}", countries.len(), kind.label().to_lowercase());
    debug!("{name}: {countries:?}");
    Ok(Some(ZoneDescriptor::new(Zone { name, countries }, Some(kind))))
}

fn static_zone(zone: &StaticZone) -> Option<ZoneDescriptor> {
    let Some(countries) = NonEmpty::from_vec(zone.countries.clone()) else {
        warn!("Static zone '{}' has no countries, leaving it out", zone.name);
        return None;
    };
    Some(ZoneDescriptor::new(
        Zone {
            name: zone.name.clone(),
            countries,
        },
        None,
    ))
}

impl Catalog {
    /// Builds both catalogs. Each static zone is followed by one group of top-`n` rankings.
    pub fn build(
        tables: &DerivedTables,
        static_zones: &[StaticZone],
        n: usize,
    ) -> CovidRankResult<Self> {
        let metrics = MetricKind::iter().map(MetricDescriptor::from).collect_vec();

        let mut zones = vec![];
        let mut groups = RANKING_GROUPS.iter();
        for zone in static_zones {
            zones.extend(static_zone(zone));
            for &kind in groups.next().copied().unwrap_or_default() {
                zones.extend(ranked_zone(tables, kind, n)?);
            }
        }
        for &kind in groups.flat_map(|group| group.iter()) {
            zones.extend(ranked_zone(tables, kind, n)?);
        }

        let known_countries = tables
            .table(MetricKind::Confirmed)
            .countries()
            .into_iter()
            .map(str::to_string)
            .collect_vec();
        info!(
            "Catalog holds {} metrics, {} zones and {} known countries",
            metrics.len(),
            zones.len(),
            known_countries.len()
        );
        Ok(Self {
            metrics,
            zones,
            known_countries,
        })
    }

    pub fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    pub fn zones(&self) -> &[ZoneDescriptor] {
        &self.zones
    }

    pub fn known_countries(&self) -> &[String] {
        &self.known_countries
    }

    pub fn metric(&self, index: usize) -> CovidRankResult<&MetricDescriptor> {
        self.metrics
            .get(index)
            .ok_or(CovidRankError::IndexOutOfRange {
                what: "metric",
                index,
                len: self.metrics.len(),
            })
    }

    pub fn zone(&self, index: usize) -> CovidRankResult<&ZoneDescriptor> {
        self.zones.get(index).ok_or(CovidRankError::IndexOutOfRange {
            what: "zone",
            index,
            len: self.zones.len(),
        })
    }

    /// Parses a comma-separated list of country names into a zone of known countries.
    pub fn zone_from_text(&self, text: &str) -> CovidRankResult<Zone> {
        zone_from_text(text, &self.known_countries)
    }
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest, so
/// `"korea, south"` becomes `"Korea, South"` and `"usa"` becomes `"Usa"`.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if in_word {
            result.extend(c.to_lowercase());
        } else {
            result.extend(c.to_uppercase());
        }
        in_word = c.is_alphabetic();
    }
    result
}

fn match_country<'a>(entry: &str, known: &'a [String]) -> Option<&'a String> {
    let titled = title_case(entry);
    known
        .iter()
        .find(|country| **country == titled)
        .or_else(|| known.iter().find(|country| country.eq_ignore_ascii_case(entry)))
}

/// Resolves country names against `known`. Exact title-cased matches win over case-insensitive
/// ones; unknown names are dropped with a warning and duplicates are kept once.
pub fn zone_from_names<S: AsRef<str>>(names: &[S], known: &[String]) -> CovidRankResult<Zone> {
    let mut countries: Vec<String> = vec![];
    for name in names {
        match match_country(name.as_ref(), known) {
            Some(country) if !countries.contains(country) => countries.push(country.clone()),
            Some(_) => {}
            None => warn!("Unknown country '{}', skipping", name.as_ref()),
        }
    }
    let countries = NonEmpty::from_vec(countries).ok_or_else(|| {
        CovidRankError::EmptySelection(format!(
            "no known country in [{}]",
            names.iter().map(|name| name.as_ref()).join(", ")
        ))
    })?;
    Ok(Zone {
        name: countries.iter().join(", "),
        countries,
    })
}

/// Like [`zone_from_names`], for a comma-separated list as typed by a user.
pub fn zone_from_text(text: &str, known: &[String]) -> CovidRankResult<Zone> {
    let entries = text
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect_vec();
    let mut names = vec![];
    let mut i = 0;
    while i < entries.len() {
        // Some names contain the separator ("Korea, South")
        match entries.get(i + 1).map(|next| format!("{}, {next}", entries[i])) {
            Some(joined) if match_country(&joined, known).is_some() => {
                names.push(joined);
                i += 2;
            }
            _ => {
                names.push(entries[i].to_string());
                i += 1;
            }
        }
    }
    zone_from_names(&names, known)
}
