//! Three-tier value resolution shared by every configurable entity.
//!
//! Precedence, highest first:
//! 1. explicit/runtime override (flag or per-call override)
//! 2. entity value, or the user's declared default for it
//! 3. hard default (process-wide constant, always present)

/// Returns the first present tier, falling back to `hard_default`.
pub fn resolve<T>(explicit: Option<T>, entity: Option<T>, hard_default: T) -> T {
    explicit.or(entity).unwrap_or(hard_default)
}

/// Returns the first present value of an arbitrary-length tier chain.
pub fn first_some<T>(tiers: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    tiers.into_iter().flatten().next()
}

/// String fields treat an empty value as absent.
pub fn first_non_empty<'a>(tiers: impl IntoIterator<Item = &'a str>) -> &'a str {
    tiers.into_iter().find(|s| !s.is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(true), Some(false), false, true)]
    #[case(None, Some(true), false, true)]
    #[case(None, None, true, true)]
    #[case(Some(false), None, true, false)]
    fn resolve_returns_highest_present_tier(
        #[case] explicit: Option<bool>,
        #[case] entity: Option<bool>,
        #[case] hard: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(resolve(explicit, entity, hard), expected);
    }

    #[rstest]
    #[case(Some("flag"), Some("file"), "flag")]
    #[case(None, Some("file"), "file")]
    #[case(None, None, "hard")]
    fn resolve_works_for_strings(
        #[case] explicit: Option<&str>,
        #[case] entity: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(resolve(explicit, entity, "hard"), expected);
    }

    #[test]
    fn first_some_skips_absent_tiers() {
        assert_eq!(first_some([None, None, Some(3), Some(4)]), Some(3));
        assert_eq!(first_some::<u8>([None, None]), None);
    }

    #[test]
    fn first_non_empty_treats_empty_as_absent() {
        assert_eq!(first_non_empty(["", "main", "defaults"]), "main");
        assert_eq!(first_non_empty(["", ""]), "");
    }
}
