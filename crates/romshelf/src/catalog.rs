use crate::{
    storage::{RomId, RomRecord},
    system::System,
};
use chrono::{DateTime, Utc};
use std::{cmp::Ordering, convert::Infallible, fmt::Display, str::FromStr};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SystemFilter {
    #[default]
    All,
    /// Tag compared verbatim against the stored tag, tags from the system table are
    /// spelled the way the table spells them
    System(String),
}

impl SystemFilter {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            SystemFilter::All => true,
            SystemFilter::System(selected) => selected == tag,
        }
    }
}

impl FromStr for SystemFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(SystemFilter::All);
        }

        match System::from_str(s) {
            Ok(system) => Ok(SystemFilter::System(system.tag().to_string())),
            Err(_) => Ok(SystemFilter::System(s.to_string())),
        }
    }
}

impl Display for SystemFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemFilter::All => write!(f, "all"),
            SystemFilter::System(tag) => write!(f, "{}", tag),
        }
    }
}

/// Library ordering: recently played first, never played after, then by name
pub fn library_order(a: &RomRecord, b: &RomRecord) -> Ordering {
    match (a.last_played, b.last_played) {
        (Some(a_played), Some(b_played)) => b_played.cmp(&a_played),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| compare_names(&a.name, &b.name))
    .then_with(|| a.id.cmp(&b.id))
}

// Case folded first so "apple" and "Apple" sit together, case breaks the tie
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// The filtered and sorted view of the library the user is looking at
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    records: Vec<RomRecord>,
    filter: SystemFilter,
    search: String,
    visible: Vec<usize>,
}

impl CatalogView {
    pub fn new(records: Vec<RomRecord>) -> Self {
        let mut me = Self {
            records,
            ..Default::default()
        };
        me.refresh();
        me
    }

    pub fn replace_records(&mut self, records: Vec<RomRecord>) {
        self.records = records;
        self.refresh();
    }

    pub fn filter(&self) -> &SystemFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: SystemFilter) {
        if self.filter == filter {
            return;
        }

        self.filter = filter;
        self.refresh();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        if self.search == search {
            return;
        }

        self.search = search;
        self.refresh();
    }

    /// Every record, including the ones currently filtered out
    pub fn records(&self) -> &[RomRecord] {
        &self.records
    }

    pub fn visible(&self) -> impl Iterator<Item = &RomRecord> {
        self.visible.iter().map(|index| &self.records[*index])
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn get(&self, id: RomId) -> Option<&RomRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn record_played(&mut self, id: RomId, played_at: DateTime<Utc>) {
        if let Some(record) = self.records.iter_mut().find(|record| record.id == id) {
            record.last_played = Some(played_at);
            self.refresh();
        }
    }

    pub fn remove(&mut self, id: RomId) {
        self.records.retain(|record| record.id != id);
        self.refresh();
    }

    fn refresh(&mut self) {
        let search = self.search.to_lowercase();

        self.visible = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                self.filter.matches(&record.system)
                    && (search.is_empty() || record.name.to_lowercase().contains(&search))
            })
            .map(|(index, _)| index)
            .collect();

        let records = &self.records;
        self.visible
            .sort_by(|a, b| library_order(&records[*a], &records[*b]));
    }
}
