//! Numeric-aware ("natural") ordering of identifiers.
//!
//! Tiles and feature classes are named with unpadded indices
//! (`dtm_split_2`, `dtm_split_10`), so plain lexicographic ordering would
//! process `dtm_split_10` first. Every listing in the crate goes through
//! [`natural_sort`].

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

fn chunk_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+|\D+").expect("static pattern is valid"))
}

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9]").expect("static pattern is valid"))
}

/// Compares two digit runs numerically without parsing them.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

/// Compares two identifiers in natural order.
///
/// Digit runs compare by numeric value, other runs compare
/// case-insensitively. Ties fall back to a plain comparison so the
/// ordering is total.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunk_pattern().find_iter(a);
    let mut right = chunk_pattern().find_iter(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let (l, r) = (l.as_str(), r.as_str());
                let l_digit = l.as_bytes()[0].is_ascii_digit();
                let r_digit = r.as_bytes()[0].is_ascii_digit();
                let ord = match (l_digit, r_digit) {
                    (true, true) => cmp_digits(l, r),
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => l.to_lowercase().cmp(&r.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Sorts names in place in natural order.
pub fn natural_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

/// Strips every separator character from a region code.
///
/// `"15-08-301-A"` becomes `"1508301A"`.
#[must_use]
pub fn sanitize_code(code: &str) -> String {
    separator_pattern().replace_all(code, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numeric_runs_compare_by_value() {
        assert_eq!(natural_cmp("tile_2", "tile_10"), Ordering::Less);
        assert_eq!(natural_cmp("tile_10", "tile_2"), Ordering::Greater);
        assert_eq!(natural_cmp("tile_2", "tile_2"), Ordering::Equal);
    }

    #[test]
    fn test_natural_sort_listing() {
        let mut names = vec![
            "dtm_split_10",
            "dtm_split_1",
            "dtm_split_2",
            "dtm_split_0",
            "dtm_split_21",
        ];
        natural_sort(&mut names);
        assert_eq!(
            names,
            vec!["dtm_split_0", "dtm_split_1", "dtm_split_2", "dtm_split_10", "dtm_split_21"]
        );
    }

    #[test]
    fn test_leading_zeros_are_total() {
        assert_eq!(natural_cmp("fill_007", "fill_7"), "fill_007".cmp("fill_7"));
        assert_eq!(natural_cmp("fill_007", "fill_010"), Ordering::Less);
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(natural_cmp("CL", "CL_1"), Ordering::Less);
    }

    #[test]
    fn test_huge_digit_runs_do_not_overflow() {
        let a = "x_99999999999999999999999";
        let b = "x_100000000000000000000000";
        assert_eq!(natural_cmp(a, b), Ordering::Less);
    }

    #[test]
    fn test_sanitize_code() {
        assert_eq!(sanitize_code("15-08-301-A"), "1508301A");
        assert_eq!(sanitize_code("Q 1/2_b"), "Q12b");
        assert_eq!(sanitize_code("Q1"), "Q1");
    }
}
