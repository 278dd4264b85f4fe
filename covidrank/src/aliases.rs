//! Country name reconciliation between the COVID time series and the population table.
//!
//! Each source spells a handful of countries differently. Rather than patching names inline, every
//! synonym lives in a versioned [`AliasTable`] so the set can be audited and tested on its own.
//! Both sides map onto one canonical spelling per country.

use serde::{Deserialize, Serialize};

/// Which data source a raw country name comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Covid,
    Population,
}

/// A versioned set of `(raw, canonical)` renames per source.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    pub version: u32,
    pub covid: &'static [(&'static str, &'static str)],
    pub population: &'static [(&'static str, &'static str)],
}

pub const COUNTRY_ALIASES: AliasTable = AliasTable {
    version: 1,
    covid: &[("US", "Usa"), ("Taiwan*", "Taiwan")],
    population: &[
        ("United States", "Usa"),
        ("South Korea", "Korea, South"),
        ("Myanmar", "Burma"),
        ("Czech Republic (Czechia)", "Czechia"),
    ],
};

impl AliasTable {
    fn renames(&self, source: Source) -> &'static [(&'static str, &'static str)] {
        match source {
            Source::Covid => self.covid,
            Source::Population => self.population,
        }
    }

    /// Returns the canonical spelling of `name` as found in `source`. Names without an alias are
    /// already canonical.
    pub fn canonical<'a>(&self, source: Source, name: &'a str) -> &'a str {
        match self.renames(source).iter().find(|(raw, _)| *raw == name) {
            Some(&(_, canonical)) => canonical,
            None => name,
        }
    }

    /// All canonical names the table can produce, in declaration order and without duplicates.
    pub fn canonical_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = vec![];
        for (_, canonical) in self.covid.iter().chain(self.population.iter()) {
            if !names.contains(canonical) {
                names.push(*canonical);
            }
        }
        names
    }
}
