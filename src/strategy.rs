use core::{fmt, str::FromStr};

use crate::UnknownStrategy;

/// A placement strategy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// No strategy. Every allocation fails.
    #[default]
    NotSet = 0,
    /// The hole that leaves the smallest remainder.
    Best = 1,
    /// The largest hole.
    Worst = 2,
    /// The lowest-addressed hole that fits.
    First = 3,
    /// The first hole that fits, searching circularly from the most recent
    /// allocation.
    Next = 4,
}

impl Strategy {
    /// Every usable strategy, in enumerant order.
    pub const ALL: [Self; 4] = [Self::Best, Self::Worst, Self::First, Self::Next];

    /// Map a name to a strategy. Matching is exact and case-sensitive;
    /// anything else maps to [`Self::NotSet`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "best" => Self::Best,
            "worst" => Self::Worst,
            "first" => Self::First,
            "next" => Self::Next,
            _ => Self::NotSet,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Worst => "worst",
            Self::First => "first",
            Self::Next => "next",
            Self::NotSet => "unknown",
        }
    }

    #[inline]
    pub const fn is_set(self) -> bool {
        !matches!(self, Self::NotSet)
    }

    /// The strategies a run restricted to `self` covers: just `self`, or
    /// [`Self::ALL`] for [`Self::NotSet`].
    pub const fn selection(self) -> &'static [Self] {
        match self {
            Self::NotSet => &Self::ALL,
            Self::Best => &[Self::Best],
            Self::Worst => &[Self::Worst],
            Self::First => &[Self::First],
            Self::Next => &[Self::Next],
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_name(s) {
            Self::NotSet => Err(UnknownStrategy),
            x => Ok(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for strategy in Strategy::ALL {
            assert_eq!(Strategy::from_name(strategy.name()), strategy);
            assert_eq!(strategy.name().parse(), Ok(strategy));
        }
    }

    #[test]
    fn unknown_names() {
        for name in ["", "Best", "FIRST", "next ", "unknown", "best-fit"] {
            assert_eq!(Strategy::from_name(name), Strategy::NotSet);
            assert_eq!(name.parse::<Strategy>(), Err(UnknownStrategy));
        }
        assert_eq!(Strategy::NotSet.name(), "unknown");
        assert!(!Strategy::NotSet.is_set());
    }

    #[test]
    fn selection() {
        assert_eq!(Strategy::NotSet.selection(), Strategy::ALL);
        for strategy in Strategy::ALL {
            assert_eq!(strategy.selection(), [strategy]);
        }
    }

    #[test]
    fn discriminants() {
        assert_eq!(Strategy::NotSet as u8, 0);
        assert_eq!(Strategy::Best as u8, 1);
        assert_eq!(Strategy::Worst as u8, 2);
        assert_eq!(Strategy::First as u8, 3);
        assert_eq!(Strategy::Next as u8, 4);
    }
}
