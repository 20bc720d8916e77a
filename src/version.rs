//! Semantic version with an auxiliary build field.
//!
//! Ordering is lexicographic over `(major, minor, patch)`; the `build`
//! field only breaks ties under [`Version::cmp_long`]. Compatibility of a
//! provided version against a required one follows Cargo/semver-style
//! caret rules, restricted to the pre-1.0 rule the original runtime uses:
//! same major, and if major is zero then also same minor, with `got` at
//! least as new as `required` under the short ordering.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// A semantic version: `major.minor.patch`, plus an auxiliary `build` field.
///
/// The `build` field never participates in compatibility checks or in the
/// default (short) ordering; it exists purely as a tie-breaker for callers
/// that need a strict total order over otherwise-identical versions (see
/// [`Version::cmp_long`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    /// Major version component.
    pub major: u32,
    /// Minor version component.
    pub minor: u32,
    /// Patch version component.
    pub patch: u32,
    /// Auxiliary build number, not considered by compatibility checks.
    pub build: u64,
}

impl Version {
    /// Creates a new version with `build` set to zero.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build: 0,
        }
    }

    /// Creates a new version with an explicit build field.
    #[must_use]
    pub const fn with_build(major: u32, minor: u32, patch: u32, build: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// Compares `self` and `other` over `(major, minor, patch)` only.
    #[must_use]
    pub const fn cmp_short(&self, other: &Self) -> Ordering {
        if self.major != other.major {
            return if self.major < other.major {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        if self.minor != other.minor {
            return if self.minor < other.minor {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        if self.patch != other.patch {
            return if self.patch < other.patch {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        Ordering::Equal
    }

    /// Compares `self` and `other` over `(major, minor, patch, build)`.
    #[must_use]
    pub const fn cmp_long(&self, other: &Self) -> Ordering {
        match self.cmp_short(other) {
            Ordering::Equal => {
                if self.build != other.build {
                    if self.build < other.build {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    }
                } else {
                    Ordering::Equal
                }
            }
            other => other,
        }
    }

    /// Returns whether `self` (the version a module *got*) satisfies
    /// `required` (the version a module *asked for*).
    ///
    /// Rule: same major; if `required.major == 0`, also same minor; and
    /// `self >= required` under the short ordering.
    #[must_use]
    pub const fn is_compatible_with(&self, required: &Self) -> bool {
        if required.major != self.major {
            return false;
        }
        if required.major == 0 && required.minor != self.minor {
            return false;
        }
        matches!(
            required.cmp_short(self),
            Ordering::Less | Ordering::Equal
        )
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_short(other)
    }
}

impl fmt::Display for Version {
    /// The short form: `major.minor.patch`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Version {
    /// Renders the long form: `major.minor.patch+build`.
    #[must_use]
    pub fn to_long_string(&self) -> String {
        format!("{}.{}.{}+{}", self.major, self.minor, self.patch, self.build)
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Parses either the short form (`major.minor.patch`) or the long form
    /// (`major.minor.patch+build`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version_part, build_part) = match s.split_once('+') {
            Some((v, b)) => (v, Some(b)),
            None => (s, None),
        };

        let mut parts = version_part.split('.');
        let major = parts
            .next()
            .ok_or_else(Error::invalid_argument)?
            .parse::<u32>()
            .map_err(|_| Error::invalid_argument().with_context("major component"))?;
        let minor = parts
            .next()
            .ok_or_else(Error::invalid_argument)?
            .parse::<u32>()
            .map_err(|_| Error::invalid_argument().with_context("minor component"))?;
        let patch = parts
            .next()
            .ok_or_else(Error::invalid_argument)?
            .parse::<u32>()
            .map_err(|_| Error::invalid_argument().with_context("patch component"))?;
        if parts.next().is_some() {
            return Err(Error::invalid_argument().with_context("trailing version component"));
        }

        let build = match build_part {
            Some(b) => b
                .parse::<u64>()
                .map_err(|_| Error::invalid_argument().with_context("build component"))?,
            None => 0,
        };

        Ok(Self::with_build(major, minor, patch, build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_table_covers_major_minor_boundaries() {
        let cases = [
            ((1, 2, 3), (1, 2, 3), true),
            ((1, 3, 0), (1, 2, 3), true),
            ((2, 0, 0), (1, 2, 3), false),
            ((0, 2, 0), (0, 2, 0), true),
            ((0, 3, 0), (0, 2, 0), false),
        ];
        for ((gma, gmi, gp), (rma, rmi, rp), expected) in cases {
            let got = Version::new(gma, gmi, gp);
            let required = Version::new(rma, rmi, rp);
            assert_eq!(
                got.is_compatible_with(&required),
                expected,
                "got={got} required={required}"
            );
        }
    }

    #[test]
    fn short_ordering_ignores_build() {
        let a = Version::with_build(1, 0, 0, 5);
        let b = Version::with_build(1, 0, 0, 9);
        assert_eq!(a.cmp_short(&b), Ordering::Equal);
        assert_eq!(a.cmp_long(&b), Ordering::Less);
    }

    #[test]
    fn parse_short_and_long() {
        assert_eq!("1.2.3".parse::<Version>().unwrap(), Version::new(1, 2, 3));
        assert_eq!(
            "1.2.3+7".parse::<Version>().unwrap(),
            Version::with_build(1, 2, 3, 7)
        );
        assert!("1.2".parse::<Version>().is_err());
        assert!("a.b.c".parse::<Version>().is_err());
    }

    #[test]
    fn display_round_trips_short_form() {
        let v = Version::with_build(1, 2, 3, 99);
        assert_eq!(v.to_string(), "1.2.3");
        assert_eq!(v.to_long_string(), "1.2.3+99");
    }

    #[test]
    fn zero_major_requires_exact_minor() {
        assert!(Version::new(0, 5, 2).is_compatible_with(&Version::new(0, 5, 0)));
        assert!(!Version::new(0, 5, 2).is_compatible_with(&Version::new(0, 4, 0)));
    }
}
