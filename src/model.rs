/// Column headers of the tabular sink, in order.
pub const COLUMNS: [&str; 5] = ["Year", "Unit", "Title", "Track", "GrantCount"];

/// One published grant-award entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scholarship {
    pub year: i32,
    pub unit: String,
    pub title: String,
    pub track: String,
    pub grant_count: u32,
}

impl Scholarship {
    /// Renders the record in `COLUMNS` order.
    pub fn to_row(&self) -> [String; 5] {
        [
            self.year.to_string(),
            self.unit.clone(),
            self.title.clone(),
            self.track.clone(),
            self.grant_count.to_string(),
        ]
    }
}
