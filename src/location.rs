//! Brazilian states and the five macro-regions used by the location filter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StateCode {
    AC, AL, AM, AP, BA, CE, DF, ES, GO, MA, MG, MS, MT, PA,
    PB, PE, PI, PR, RJ, RN, RO, RR, RS, SC, SE, SP, TO,
}

impl StateCode {
    pub const ALL: [StateCode; 27] = [
        StateCode::AC, StateCode::AL, StateCode::AM, StateCode::AP, StateCode::BA,
        StateCode::CE, StateCode::DF, StateCode::ES, StateCode::GO, StateCode::MA,
        StateCode::MG, StateCode::MS, StateCode::MT, StateCode::PA, StateCode::PB,
        StateCode::PE, StateCode::PI, StateCode::PR, StateCode::RJ, StateCode::RN,
        StateCode::RO, StateCode::RR, StateCode::RS, StateCode::SC, StateCode::SE,
        StateCode::SP, StateCode::TO,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateCode::AC => "AC",
            StateCode::AL => "AL",
            StateCode::AM => "AM",
            StateCode::AP => "AP",
            StateCode::BA => "BA",
            StateCode::CE => "CE",
            StateCode::DF => "DF",
            StateCode::ES => "ES",
            StateCode::GO => "GO",
            StateCode::MA => "MA",
            StateCode::MG => "MG",
            StateCode::MS => "MS",
            StateCode::MT => "MT",
            StateCode::PA => "PA",
            StateCode::PB => "PB",
            StateCode::PE => "PE",
            StateCode::PI => "PI",
            StateCode::PR => "PR",
            StateCode::RJ => "RJ",
            StateCode::RN => "RN",
            StateCode::RO => "RO",
            StateCode::RR => "RR",
            StateCode::RS => "RS",
            StateCode::SC => "SC",
            StateCode::SE => "SE",
            StateCode::SP => "SP",
            StateCode::TO => "TO",
        }
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        StateCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Norte,
    Nordeste,
    CentroOeste,
    Sudeste,
    Sul,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Norte,
        Region::Nordeste,
        Region::CentroOeste,
        Region::Sudeste,
        Region::Sul,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Region::Norte => "NORTE",
            Region::Nordeste => "NORDESTE",
            Region::CentroOeste => "CENTRO-OESTE",
            Region::Sudeste => "SUDESTE",
            Region::Sul => "SUL",
        }
    }

    pub fn states(&self) -> &'static [StateCode] {
        use StateCode::*;
        match self {
            Region::Norte => &[AC, AP, AM, PA, RO, RR, TO],
            Region::Nordeste => &[AL, BA, CE, MA, PB, PE, PI, RN, SE],
            Region::CentroOeste => &[DF, GO, MT, MS],
            Region::Sudeste => &[ES, MG, RJ, SP],
            Region::Sul => &[PR, RS, SC],
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        Region::ALL.iter().copied().find(|r| r.name().eq_ignore_ascii_case(s))
    }
}

/// Which states a search covers. `Any` sends no state parameter upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationFilter {
    Any,
    States(BTreeSet<StateCode>),
}

impl LocationFilter {
    /// One entry per upstream request; `None` means "no state parameter".
    pub fn request_locations(&self) -> Vec<Option<StateCode>> {
        match self {
            LocationFilter::Any => vec![None],
            LocationFilter::States(states) => states.iter().copied().map(Some).collect(),
        }
    }
}

/// Maps a mixed selection of region names and state codes to a state set.
/// Unknown names are ignored; nothing resolvable means no location filter.
pub fn resolve_locations<S: AsRef<str>>(selection: &[S]) -> LocationFilter {
    let mut states = BTreeSet::new();
    for loc in selection {
        let loc = loc.as_ref();
        if let Some(region) = Region::from_name(loc) {
            states.extend(region.states().iter().copied());
        } else if let Ok(state) = loc.parse::<StateCode>() {
            states.insert(state);
        }
    }
    if states.is_empty() {
        LocationFilter::Any
    } else {
        LocationFilter::States(states)
    }
}

/// Region names followed by state codes, sorted, as offered in the selector.
pub fn location_options() -> Vec<&'static str> {
    let mut options: Vec<&'static str> = Region::ALL
        .iter()
        .map(|r| r.name())
        .chain(StateCode::ALL.iter().map(|s| s.as_str()))
        .collect();
    options.sort_unstable();
    options
}

pub const DEFAULT_LOCATIONS: [&str; 3] = ["SUDESTE", "NORDESTE", "NORTE"];
