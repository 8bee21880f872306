//! Utility functions for the demand_forecast crate

use chrono::{Duration, NaiveDate};

/// Normalize one free-text component (role or location) into a slug part.
///
/// Lower-cases, turns `", "`, `","` and spaces into `_`, and collapses runs of
/// underscores.
pub fn slug_part(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let replaced = lowered.replace(", ", "_").replace([',', ' '], "_");

    let mut slug = String::with_capacity(replaced.len());
    for ch in replaced.chars() {
        if ch == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(ch);
    }
    slug
}

/// Storage key for a (role, location) pair: `<role_slug>_<location_slug>`.
pub fn slug(role: &str, location: &str) -> String {
    format!("{}_{}", slug_part(role), slug_part(location))
}

/// The `n` week starts following `last`.
pub fn following_weeks(last: NaiveDate, n: usize) -> Vec<NaiveDate> {
    (1..=n as i64).map(|k| last + Duration::weeks(k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        assert_eq!(slug("Software Engineer", "New York, NY"), "software_engineer_new_york_ny");
        assert_eq!(slug("Data  Scientist", "Austin,TX"), "data_scientist_austin_tx");
        assert_eq!(slug_part("  Remote "), "remote");
    }

    #[test]
    fn test_following_weeks() {
        let last = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let weeks = following_weeks(last, 2);
        assert_eq!(
            weeks,
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()
            ]
        );
    }
}
