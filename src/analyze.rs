use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::model::Scholarship;

pub const NO_RECORDS: &str = "No scholarships found.";
const RULE: &str = "--------------------";

/// Summary statistics over a non-empty set of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub total_grants: u64,
    pub grants_by_year: BTreeMap<i32, u64>,
    pub grants_by_unit: BTreeMap<String, u64>,
    /// Unit with the highest total and that total. On ties, the unit that
    /// appears first in the input wins.
    pub top_unit: (String, u64),
}

/// Single pass over `records`. `None` means there was nothing to aggregate,
/// which is not the same as a dataset whose grants sum to zero.
pub fn aggregate<'a, I>(records: I) -> Option<AggregateReport>
where
    I: IntoIterator<Item = &'a Scholarship>,
{
    let mut total_grants = 0u64;
    let mut grants_by_year = BTreeMap::new();
    let mut grants_by_unit: BTreeMap<String, u64> = BTreeMap::new();
    // Input position at which each unit first appeared.
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    // (unit, total, first seen)
    let mut top_unit: Option<(String, u64, usize)> = None;

    for record in records {
        let grants = u64::from(record.grant_count);
        total_grants += grants;
        *grants_by_year.entry(record.year).or_insert(0) += grants;

        let unit_total = grants_by_unit.entry(record.unit.clone()).or_insert(0);
        *unit_total += grants;
        let unit_total = *unit_total;

        let next_index = first_seen.len();
        let unit_index = *first_seen.entry(record.unit.clone()).or_insert(next_index);

        let leads = match &top_unit {
            Some((unit, max, index)) => {
                *unit == record.unit
                    || unit_total > *max
                    || (unit_total == *max && unit_index < *index)
            }
            None => true,
        };
        if leads {
            top_unit = Some((record.unit.clone(), unit_total, unit_index));
        }
    }

    let (unit, max, _) = top_unit?;
    Some(AggregateReport {
        total_grants,
        grants_by_year,
        grants_by_unit,
        top_unit: (unit, max),
    })
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total grants: {}", self.total_grants)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Grants by year:")?;
        for (year, grants) in &self.grants_by_year {
            writeln!(f, "- {year}: {grants}")?;
        }
        writeln!(f, "{RULE}")?;
        writeln!(f, "Grants by unit:")?;
        for (unit, grants) in &self.grants_by_unit {
            writeln!(f, "- {unit}: {grants}")?;
        }
        writeln!(f, "{RULE}")?;
        write!(
            f,
            "Unit with most grants: {} ({} grants)",
            self.top_unit.0, self.top_unit.1
        )
    }
}
