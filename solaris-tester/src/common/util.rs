use chrono::{DateTime, Utc};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Compact UTC stamp for file names and store metadata.
pub fn timestamp_label(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S").to_string()
}
