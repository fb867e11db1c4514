//! # Release Versions
//!
//! Repositories are released with versions of the form `MAJOR.MINOR` or
//! `MAJOR.MINOR.beta`. This module parses those strings and implements the
//! rules the deploy workflow enforces between two consecutive releases.
//!
//! ## Ordering
//!
//! Versions are totally ordered by `(major, minor)`. At the same
//! `(major, minor)` a release follows its beta, so `1.2.beta < 1.2 < 1.3.beta`.
//!
//! ## Successors
//!
//! Given the last release `M.m` (beta or not), the only acceptable next
//! versions are:
//!
//! - `M.(m+1)`: a minor release,
//! - `M.(m+1).beta`: a minor beta,
//! - `(M+1).0.beta`: a major bump, which always starts as a beta.
//!
//! ## Derived versions
//!
//! - Development image versions strip the `.beta` suffix and append `.dev`.
//! - Package metadata versions strip the `.beta` suffix and append `.0`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const BETA_SUFFIX: &str = ".beta";

/// A parsed `MAJOR.MINOR[.beta]` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseVersion {
    pub major: u64,
    pub minor: u64,
    pub beta: bool,
}

impl ReleaseVersion {
    pub fn new(major: u64, minor: u64, beta: bool) -> Self {
        Self { major, minor, beta }
    }

    /// The three versions allowed to follow this one, in prompt order.
    pub fn successors(&self) -> [ReleaseVersion; 3] {
        [
            ReleaseVersion::new(self.major, self.minor + 1, false),
            ReleaseVersion::new(self.major, self.minor + 1, true),
            ReleaseVersion::new(self.major + 1, 0, true),
        ]
    }

    /// Whether `candidate` is the major-bump successor of `self`.
    pub fn is_major_bump_to(&self, candidate: &ReleaseVersion) -> bool {
        *candidate == ReleaseVersion::new(self.major + 1, 0, true)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.beta {
            f.write_str(BETA_SUFFIX)?;
        }
        Ok(())
    }
}

impl FromStr for ReleaseVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_version(s)
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor)
            .cmp(&(other.major, other.minor))
            // A release follows its beta.
            .then_with(|| other.beta.cmp(&self.beta))
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parses `MAJOR.MINOR` or `MAJOR.MINOR.beta`.
///
/// Anything else, including signs, whitespace, leading `v` or a third
/// numeric component, is rejected.
pub fn parse_version(version: &str) -> Result<ReleaseVersion> {
    let invalid = || Error::InvalidVersion {
        version: version.to_string(),
    };

    let (numbers, beta) = match version.strip_suffix(BETA_SUFFIX) {
        Some(rest) => (rest, true),
        None => (version, false),
    };

    let (major, minor) = numbers.split_once('.').ok_or_else(invalid)?;
    // Parts are bounded to u32 so successors never overflow.
    let parse_part = |part: &str| -> Result<u64> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        part.parse::<u32>().map(u64::from).map_err(|_| invalid())
    };

    Ok(ReleaseVersion::new(parse_part(major)?, parse_part(minor)?, beta))
}

/// Checks that `candidate` is one of the successors of `last`.
///
/// Returns the parsed candidate on success.
pub fn validate_next_version(last: &ReleaseVersion, candidate: &str) -> Result<ReleaseVersion> {
    let parsed = parse_version(candidate)?;
    let allowed = last.successors();
    if allowed.contains(&parsed) {
        Ok(parsed)
    } else {
        Err(Error::VersionOrder {
            last: last.to_string(),
            candidate: candidate.to_string(),
            allowed: allowed.iter().map(ToString::to_string).collect(),
        })
    }
}

/// Whether `candidate` is an acceptable next version after `last`.
pub fn is_valid_next_version(last: &str, candidate: &str) -> bool {
    parse_version(last)
        .and_then(|last| validate_next_version(&last, candidate))
        .is_ok()
}

/// Strips a trailing `.beta`, leaving other strings untouched.
pub fn strip_beta(version: &str) -> &str {
    version.strip_suffix(BETA_SUFFIX).unwrap_or(version)
}

/// Version used for development images.
pub fn dev_version(manifest_version: &str, has_local_changes: bool) -> String {
    let mut version = format!("{}.dev", strip_beta(manifest_version));
    if has_local_changes {
        version.push_str(".changes");
    }
    version
}

/// Version written into package metadata files.
///
/// Always appends `.0`, whatever the number of components.
pub fn package_version(version: &str) -> String {
    format!("{}.0", strip_beta(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_version_release_and_beta() {
        assert_eq!(parse_version("1.2").unwrap(), ReleaseVersion::new(1, 2, false));
        assert_eq!(
            parse_version("10.0.beta").unwrap(),
            ReleaseVersion::new(10, 0, true)
        );
    }

    #[test]
    fn test_parse_version_rejects_malformed() {
        for bad in [
            "", "1", "1.", ".1", "v1.2", "1.2.3", "1.2.alpha", "1.2beta", "1.2.beta.beta",
            " 1.2", "1.2 ", "+1.2", "1.-2", "a.b", "1.2.BETA",
        ] {
            assert!(parse_version(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_version_rejects_oversized_parts() {
        for bad in ["1.18446744073709551615", "18446744073709551615.0", "4294967296.0.beta"] {
            assert!(
                matches!(parse_version(bad), Err(Error::InvalidVersion { .. })),
                "accepted {:?}",
                bad
            );
        }
        let last = parse_version("4294967295.4294967295").unwrap();
        let names: Vec<String> = last.successors().iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["4294967295.4294967296", "4294967295.4294967296.beta", "4294967296.0.beta"]
        );
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(ReleaseVersion::new(3, 7, true).to_string(), "3.7.beta");
        assert_eq!(ReleaseVersion::new(3, 7, false).to_string(), "3.7");
    }

    #[test]
    fn test_ordering_release_follows_beta() {
        let beta = parse_version("1.2.beta").unwrap();
        let release = parse_version("1.2").unwrap();
        let next_beta = parse_version("1.3.beta").unwrap();
        assert!(beta < release);
        assert!(release < next_beta);
        assert!(parse_version("1.10").unwrap() > parse_version("1.9").unwrap());
        assert!(parse_version("2.0.beta").unwrap() > parse_version("1.99").unwrap());
    }

    #[test]
    fn test_successors() {
        let last = parse_version("1.4").unwrap();
        let names: Vec<String> = last.successors().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["1.5", "1.5.beta", "2.0.beta"]);
    }

    #[test]
    fn test_successors_of_beta_use_major_minor_only() {
        assert!(is_valid_next_version("1.1.beta", "1.2"));
        assert!(is_valid_next_version("1.1.beta", "1.2.beta"));
        assert!(is_valid_next_version("1.1.beta", "2.0.beta"));
        assert!(!is_valid_next_version("1.1.beta", "1.1"));
    }

    #[test]
    fn test_validate_next_version_rejects_others() {
        let last = parse_version("1.4").unwrap();
        for bad in ["1.4", "1.6", "2.0", "2.1.beta", "0.5", "1.5.0"] {
            assert!(validate_next_version(&last, bad).is_err(), "accepted {}", bad);
        }
        match validate_next_version(&last, "1.6").unwrap_err() {
            Error::VersionOrder { allowed, .. } => {
                assert_eq!(allowed, vec!["1.5", "1.5.beta", "2.0.beta"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_major_bump() {
        let last = parse_version("1.4.beta").unwrap();
        assert!(last.is_major_bump_to(&parse_version("2.0.beta").unwrap()));
        assert!(!last.is_major_bump_to(&parse_version("1.5").unwrap()));
    }

    #[test]
    fn test_derived_versions() {
        assert_eq!(dev_version("1.2.beta", false), "1.2.dev");
        assert_eq!(dev_version("1.2", true), "1.2.dev.changes");
        assert_eq!(package_version("1.2.beta"), "1.2.0");
        assert_eq!(package_version("1.2"), "1.2.0");
        assert_eq!(package_version("1.2.3"), "1.2.3.0");
    }

    proptest! {
        /// Property: parsing a rendered version gives back the same triple
        #[test]
        fn parse_round_trips(major in 0u64..100_000, minor in 0u64..100_000, beta in any::<bool>()) {
            let version = ReleaseVersion::new(major, minor, beta);
            prop_assert_eq!(parse_version(&version.to_string()).unwrap(), version);
        }

        /// Property: parsing accepts exactly ^\d+\.\d+(\.beta)?$
        #[test]
        fn parse_matches_pattern(input in "[0-9.a-z]{0,9}") {
            let pattern = regex::Regex::new(r"^\d+\.\d+(\.beta)?$").unwrap();
            prop_assert_eq!(parse_version(&input).is_ok(), pattern.is_match(&input));
        }

        /// Property: exactly the three successors are accepted
        #[test]
        fn only_successors_accepted(
            major in 0u64..50,
            minor in 0u64..50,
            beta in any::<bool>(),
            c_major in 0u64..52,
            c_minor in 0u64..52,
            c_beta in any::<bool>(),
        ) {
            let last = ReleaseVersion::new(major, minor, beta);
            let candidate = ReleaseVersion::new(c_major, c_minor, c_beta);
            let expected = last.successors().contains(&candidate);
            prop_assert_eq!(
                is_valid_next_version(&last.to_string(), &candidate.to_string()),
                expected
            );
            prop_assert!(!is_valid_next_version(&last.to_string(), &last.to_string()));
        }

        /// Property: every successor sorts after the last version
        #[test]
        fn successors_are_greater(major in 0u64..1000, minor in 0u64..1000, beta in any::<bool>()) {
            let last = ReleaseVersion::new(major, minor, beta);
            for next in last.successors() {
                prop_assert!(next > last);
            }
        }
    }
}
