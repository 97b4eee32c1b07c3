//! Template-facing helpers.
//!
//! Plain functions over a [`UtmParameter`] for use in rendering code, plus
//! [`UtmDirective`], the named conditionals templates can refer to.

use std::fmt;
use std::str::FromStr;

use super::parameters::ParameterSet;
use super::resolver::UtmParameter;

pub fn get_all_utm(utm: &UtmParameter) -> ParameterSet {
    utm.all()
}

pub fn get_utm<'a>(utm: &'a UtmParameter, key: &str) -> Option<&'a str> {
    utm.get(key)
}

pub fn has_utm(utm: &UtmParameter, key: &str, value: Option<&str>) -> bool {
    utm.has(key, value)
}

pub fn has_not_utm(utm: &UtmParameter, key: &str, value: Option<&str>) -> bool {
    utm.has_not(key, value)
}

pub fn contains_utm(utm: &UtmParameter, key: &str, value: &str) -> bool {
    utm.contains(key, value)
}

pub fn contains_not_utm(utm: &UtmParameter, key: &str, value: &str) -> bool {
    utm.contains_not(key, value)
}

/// A conditional a template can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtmDirective {
    HasUtm,
    HasNotUtm,
    ContainsUtm,
    ContainsNotUtm,
}

/// Returned when a directive name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown UTM directive: {0}")]
pub struct UnknownDirective(pub String);

impl UtmDirective {
    pub const ALL: [UtmDirective; 4] = [
        Self::HasUtm,
        Self::HasNotUtm,
        Self::ContainsUtm,
        Self::ContainsNotUtm,
    ];

    /// Name used in templates, e.g. `hasUtm`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::HasUtm => "hasUtm",
            Self::HasNotUtm => "hasNotUtm",
            Self::ContainsUtm => "containsUtm",
            Self::ContainsNotUtm => "containsNotUtm",
        }
    }

    /// Evaluate against `utm`.
    ///
    /// The contains variants need a value; without one `containsUtm` is
    /// false and `containsNotUtm` is true.
    #[must_use]
    pub fn evaluate(self, utm: &UtmParameter, key: &str, value: Option<&str>) -> bool {
        match self {
            Self::HasUtm => has_utm(utm, key, value),
            Self::HasNotUtm => has_not_utm(utm, key, value),
            Self::ContainsUtm => value.is_some_and(|value| contains_utm(utm, key, value)),
            Self::ContainsNotUtm => !value.is_some_and(|value| contains_utm(utm, key, value)),
        }
    }
}

impl fmt::Display for UtmDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UtmDirective {
    type Err = UnknownDirective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|directive| directive.name() == s)
            .ok_or_else(|| UnknownDirective(s.to_string()))
    }
}
