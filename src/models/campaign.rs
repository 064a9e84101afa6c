//! Campaign enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A game campaign; the top level of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Campaign {
    Prophecies,
    Factions,
    Nightfall,
    #[serde(rename = "EOTN")]
    Eotn,
    PreSearing,
    #[serde(rename = "LDoA")]
    Ldoa,
}

impl Campaign {
    /// All campaigns in catalog order.
    pub const ALL: [Campaign; 6] = [
        Campaign::Prophecies,
        Campaign::Factions,
        Campaign::Nightfall,
        Campaign::Eotn,
        Campaign::PreSearing,
        Campaign::Ldoa,
    ];

    /// Short identifier used as the `quest_key` prefix.
    pub fn slug(self) -> &'static str {
        match self {
            Campaign::Prophecies => "prophecies",
            Campaign::Factions => "factions",
            Campaign::Nightfall => "nightfall",
            Campaign::Eotn => "eotn",
            Campaign::PreSearing => "pre-searing",
            Campaign::Ldoa => "ldoa",
        }
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Campaign::Prophecies => "Prophecies",
            Campaign::Factions => "Factions",
            Campaign::Nightfall => "Nightfall",
            Campaign::Eotn => "Eye of the North",
            Campaign::PreSearing => "Pre-Searing",
            Campaign::Ldoa => "LDoA",
        }
    }

    /// Position in [`Campaign::ALL`].
    pub fn ordinal(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Campaign {
    type Err = AppError;

    /// Accepts slugs, display names, and serde names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| {
                wanted == c.slug()
                    || wanted == c.display_name().to_lowercase()
                    || wanted == format!("{c:?}").to_lowercase()
            })
            .ok_or_else(|| AppError::validation(format!("unknown campaign '{s}'")))
    }
}
