//! Budget ranges: room conditions → search codes, and label filtering.
//!
//! Codes follow the candidate source's fixed yen bands (B001..B010). Labels
//! on fetched candidates are free text such as "2001～3000円" or "～999円".

use dk_core::{BudgetRange, Candidate};

/// Open upper bound.
pub const MAX_BUDGET: u32 = u32::MAX;

const BUDGET_CODE_RANGES: [(&str, u32, u32); 10] = [
    ("B001", 0, 500),
    ("B002", 501, 1000),
    ("B003", 1001, 1500),
    ("B004", 1501, 2000),
    ("B005", 2001, 3000),
    ("B006", 3001, 4000),
    ("B007", 4001, 5000),
    ("B008", 5001, 7000),
    ("B009", 7001, 10000),
    ("B010", 10001, 15000),
];

const RANGE_MARKS: [char; 3] = ['～', '〜', '~'];

/// `None` when neither bound is given; missing bounds open to 0 / MAX; reversed bounds swap.
pub fn normalize_budget_range(min: Option<u32>, max: Option<u32>) -> Option<BudgetRange> {
    if min.is_none() && max.is_none() {
        return None;
    }
    let lo = min.unwrap_or(0);
    let hi = max.unwrap_or(MAX_BUDGET);
    Some(if lo > hi {
        BudgetRange { min: hi, max: lo }
    } else {
        BudgetRange { min: lo, max: hi }
    })
}

/// Every code whose band overlaps `range`, in band order.
pub fn budget_codes_for_range(range: Option<&BudgetRange>) -> Vec<String> {
    let Some(range) = range else {
        return Vec::new();
    };
    BUDGET_CODE_RANGES
        .iter()
        .filter(|(_, lo, hi)| *hi >= range.min && *lo <= range.max)
        .map(|(code, _, _)| (*code).to_string())
        .collect()
}

/// Parse a free-text budget label; `None` when it holds no number.
pub fn parse_budget_label(label: &str) -> Option<BudgetRange> {
    let normalized: String = label
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let numbers = digit_runs(&normalized);
    let first = *numbers.first()?;

    if numbers.len() >= 2 {
        return Some(BudgetRange { min: first, max: numbers[1] });
    }
    if normalized.starts_with(&RANGE_MARKS[..]) {
        return Some(BudgetRange { min: 0, max: first });
    }
    if normalized.ends_with(&RANGE_MARKS[..]) {
        return Some(BudgetRange { min: first, max: MAX_BUDGET });
    }
    Some(BudgetRange { min: first, max: first })
}

/// Maximal ASCII digit runs as numbers (saturating at `u32::MAX`).
fn digit_runs(s: &str) -> Vec<u32> {
    s.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(|run| {
            run.bytes().fold(0u32, |acc, b| {
                acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
            })
        })
        .collect()
}

/// Keep candidates whose label overlaps `range`; unlabeled or unparseable labels pass.
pub fn filter_by_budget_range(candidates: Vec<Candidate>, range: Option<&BudgetRange>) -> Vec<Candidate> {
    let Some(range) = range else {
        return candidates;
    };
    candidates
        .into_iter()
        .filter(|c| {
            c.budget
                .as_deref()
                .filter(|label| !label.is_empty())
                .and_then(parse_budget_label)
                .map_or(true, |parsed| parsed.overlaps(range))
        })
        .collect()
}
