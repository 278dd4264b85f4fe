use std::collections::BTreeMap;

use log::warn;

use crate::{
    aliases::{AliasTable, Source},
    COL,
};

/// Population per country, keyed by the canonical country spelling, plus a synthetic `World` entry
/// holding the total of every row present at load time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulationTable {
    entries: BTreeMap<String, u64>,
}

impl PopulationTable {
    /// Builds the table from raw `(country, population)` rows, renaming countries through the
    /// population side of `aliases`. A raw `World` row is ignored in favour of the computed total.
    pub fn from_entries<I, S>(rows: I, aliases: &AliasTable) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        let mut world: u64 = 0;
        for (country, population) in rows {
            let country = country.as_ref();
            if country == COL::WORLD {
                warn!("Ignoring '{}' row in population source", COL::WORLD);
                continue;
            }
            world = world.checked_add(population).unwrap_or_else(|| {
                warn!("Population total overflows at '{country}', saturating");
                u64::MAX
            });
            let canonical = aliases.canonical(Source::Population, country);
            if entries.contains_key(canonical) {
                warn!("Duplicate population entry for '{canonical}', keeping the first");
                continue;
            }
            entries.insert(canonical.to_string(), population);
        }
        entries.insert(COL::WORLD.to_string(), world);
        Self { entries }
    }

    pub fn get(&self, country: &str) -> Option<u64> {
        self.entries.get(country).copied()
    }

    pub fn contains(&self, country: &str) -> bool {
        self.entries.contains_key(country)
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::COUNTRY_ALIASES;

    #[test]
    fn world_should_total_all_rows() {
        let population = PopulationTable::from_entries(
            [("Italy", 60u64), ("United States", 330), ("Chile", 19)],
            &COUNTRY_ALIASES,
        );
        assert_eq!(population.get(COL::WORLD), Some(409));
        assert_eq!(population.len(), 4);
    }

    #[test]
    fn countries_should_use_covid_spelling() {
        let population = PopulationTable::from_entries(
            [("United States", 330u64), ("South Korea", 51), ("Myanmar", 54)],
            &COUNTRY_ALIASES,
        );
        assert_eq!(population.get("Usa"), Some(330));
        assert_eq!(population.get("Korea, South"), Some(51));
        assert_eq!(population.get("Burma"), Some(54));
        assert!(!population.contains("United States"));
    }

    #[test]
    fn world_total_should_saturate() {
        let population = PopulationTable::from_entries(
            [("Italy", u64::MAX - 1), ("Chile", 19), ("Peru", 33)],
            &COUNTRY_ALIASES,
        );
        assert_eq!(population.get(COL::WORLD), Some(u64::MAX));
        assert_eq!(population.get("Chile"), Some(19));
    }

    #[test]
    fn source_world_row_should_be_replaced() {
        let population =
            PopulationTable::from_entries([("World", 7_000u64), ("Italy", 60)], &COUNTRY_ALIASES);
        assert_eq!(population.get(COL::WORLD), Some(60));
    }
}
