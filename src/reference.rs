use std::collections::HashMap;

use crate::domain::{CountryId, Geography};

/// Static region reference data. Geography populations are never fetched from
/// the API: a simulation's geography id is looked up here and the entity is
/// constructed locally.
#[derive(Debug, Clone)]
pub struct GeographyTable {
    regions: HashMap<String, Vec<Region>>,
    current_law: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub label: String,
}

impl GeographyTable {
    pub fn new() -> Self {
        Self {
            regions: HashMap::new(),
            current_law: HashMap::new(),
        }
    }

    /// Table shipped with the crate. The region lists are intentionally
    /// shallow: enough for national and first-level subdivisions, with unknown
    /// ids degrading to unlabeled geographies at lookup sites.
    pub fn builtin() -> Self {
        let mut table = Self::new();

        table.add_regions(
            "us",
            [
                ("us", "United States"),
                ("state/ca", "California"),
                ("state/ny", "New York"),
                ("state/tx", "Texas"),
                ("state/fl", "Florida"),
                ("state/pa", "Pennsylvania"),
                ("state/il", "Illinois"),
                ("state/oh", "Ohio"),
                ("state/wa", "Washington"),
                ("state/ma", "Massachusetts"),
            ],
        );
        table.add_regions(
            "uk",
            [
                ("uk", "United Kingdom"),
                ("country/england", "England"),
                ("country/scotland", "Scotland"),
                ("country/wales", "Wales"),
                ("country/ni", "Northern Ireland"),
            ],
        );
        table.add_regions("ca", [("ca", "Canada")]);

        // Baseline "current law" policies are reference data, not user
        // content; the orchestrator skips them when saving.
        table.set_current_law("us", "2");
        table.set_current_law("uk", "1");
        table.set_current_law("ca", "1");

        table
    }

    pub fn add_regions<'a>(
        &mut self,
        country: &str,
        regions: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let entry = self.regions.entry(country.to_string()).or_default();
        for (id, label) in regions {
            entry.push(Region {
                id: id.to_string(),
                label: label.to_string(),
            });
        }
    }

    pub fn set_current_law(&mut self, country: &str, policy_id: &str) {
        self.current_law
            .insert(country.to_string(), policy_id.to_string());
    }

    pub fn lookup(&self, country: &CountryId, id: &str) -> Option<&Region> {
        self.regions
            .get(country.as_str())
            .and_then(|regions| regions.iter().find(|region| region.id == id))
    }

    pub fn regions(&self, country: &CountryId) -> &[Region] {
        self.regions
            .get(country.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Well-known baseline policy id for a country, if one is registered.
    pub fn current_law_policy_id(&self, country: &CountryId) -> Option<&str> {
        self.current_law.get(country.as_str()).map(String::as_str)
    }

    pub fn is_current_law(&self, country: &CountryId, policy_id: &str) -> bool {
        self.current_law_policy_id(country) == Some(policy_id)
    }

    /// Build a geography entity for an id, labeled when the table knows it.
    /// Ids the table has never heard of still resolve: the table is versioned
    /// data and can lag behind server-issued ids.
    pub fn geography(&self, country: &CountryId, id: &str) -> Geography {
        Geography {
            id: id.to_string(),
            country_id: country.clone(),
            label: self
                .lookup(country, id)
                .map(|region| region.label.clone()),
        }
    }
}

impl Default for GeographyTable {
    fn default() -> Self {
        Self::builtin()
    }
}
