//! GTC-45 risk scoring: factor level domains, derived probability/risk values
//! and the interpretation bands used to classify them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FactorLevelError {
    #[error("deficiency level {0} is not one of 1, 2, 6, 10")]
    Deficiency(u32),
    #[error("exposure level {0} is not one of 1, 2, 3, 4")]
    Exposure(u32),
    #[error("consequence level {0} is not one of 10, 25, 60, 100")]
    Consequence(u32),
}

macro_rules! factor_level {
    (
        $(#[$meta:meta])*
        $name:ident, $err:ident { $($variant:ident = $value:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "u32", into = "u32")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn value(self) -> u32 {
                match self {
                    $($name::$variant => $value),+
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = FactorLevelError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(FactorLevelError::$err(other)),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(level: $name) -> u32 {
                level.value()
            }
        }
    };
}

factor_level!(
    /// Deficiency level (ND): how far existing controls fall short.
    DeficiencyLevel, Deficiency {
        Low = 1 => "Low",
        Medium = 2 => "Medium",
        High = 6 => "High",
        VeryHigh = 10 => "Very high",
    }
);

factor_level!(
    /// Exposure level (NE): how often workers are exposed.
    ExposureLevel, Exposure {
        Sporadic = 1 => "Sporadic",
        Occasional = 2 => "Occasional",
        Frequent = 3 => "Frequent",
        Continuous = 4 => "Continuous",
    }
);

factor_level!(
    /// Consequence level (NC): worst reasonable outcome of the hazard.
    ConsequenceLevel, Consequence {
        Minor = 10 => "Minor",
        Serious = 25 => "Serious",
        VerySerious = 60 => "Very serious",
        Fatal = 100 => "Fatal",
    }
);

/// Values derived from a factor set. A field is `None` whenever one of the
/// inputs it multiplies is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Derived {
    pub probability: Option<u32>,
    pub risk: Option<u32>,
}

impl Derived {
    pub fn probability_band(&self) -> ProbabilityBand {
        classify_probability(self.probability)
    }

    pub fn risk_band(&self) -> RiskBand {
        classify_risk(self.risk)
    }
}

pub fn compute_derived(
    nd: Option<DeficiencyLevel>,
    ne: Option<ExposureLevel>,
    nc: Option<ConsequenceLevel>,
) -> Derived {
    let probability = match (nd, ne) {
        (Some(nd), Some(ne)) => Some(nd.value() * ne.value()),
        _ => None,
    };
    let risk = match (probability, nc) {
        (Some(probability), Some(nc)) => Some(probability * nc.value()),
        _ => None,
    };
    Derived { probability, risk }
}

/// Presentation severity attached to every band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Neutral,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub const fn class_name(self) -> &'static str {
        match self {
            Severity::Neutral => "",
            Severity::Low => "severity-low",
            Severity::Moderate => "severity-moderate",
            Severity::High => "severity-high",
            Severity::Critical => "severity-critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityBand {
    Unclassified,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ProbabilityBand {
    pub const fn label(self) -> &'static str {
        match self {
            ProbabilityBand::Unclassified => "",
            ProbabilityBand::Low => "Low",
            ProbabilityBand::Medium => "Medium",
            ProbabilityBand::High => "High",
            ProbabilityBand::VeryHigh => "Very high",
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            ProbabilityBand::Unclassified => Severity::Neutral,
            ProbabilityBand::Low => Severity::Low,
            ProbabilityBand::Medium => Severity::Moderate,
            ProbabilityBand::High => Severity::High,
            ProbabilityBand::VeryHigh => Severity::Critical,
        }
    }

    pub const fn interpretation(self) -> &'static str {
        match self {
            ProbabilityBand::Unclassified => "",
            ProbabilityBand::Low => {
                "Improved situation with continuous exposure, or exposure is sporadic; \
                 damage is not expected to materialise"
            }
            ProbabilityBand::Medium => {
                "Deficient situation with sporadic exposure, or improved situation with \
                 continuous or frequent exposure; damage may occur at some point"
            }
            ProbabilityBand::High => {
                "Deficient situation with frequent or occasional exposure; damage is \
                 likely to occur several times during the working life"
            }
            ProbabilityBand::VeryHigh => {
                "Very deficient situation with frequent exposure, or deficient situation \
                 with continuous exposure; damage usually materialises frequently"
            }
        }
    }
}

pub fn classify_probability(probability: Option<u32>) -> ProbabilityBand {
    match probability {
        None => ProbabilityBand::Unclassified,
        Some(p) if p < 8 => ProbabilityBand::Low,
        Some(p) if p < 20 => ProbabilityBand::Medium,
        Some(p) if p < 40 => ProbabilityBand::High,
        Some(_) => ProbabilityBand::VeryHigh,
    }
}

/// GTC-45 risk level bands, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Unclassified,
    Acceptable,
    Improvable,
    AcceptableWithControl,
    NotAcceptable,
}

impl RiskBand {
    pub const fn label(self) -> &'static str {
        match self {
            RiskBand::Unclassified => "",
            RiskBand::Acceptable => "Acceptable",
            RiskBand::Improvable => "Improvable",
            RiskBand::AcceptableWithControl => "Not-acceptable-or-acceptable-with-control",
            RiskBand::NotAcceptable => "Not-acceptable",
        }
    }

    /// GTC-45 intervention level, I being the most severe.
    pub const fn roman(self) -> &'static str {
        match self {
            RiskBand::Unclassified => "",
            RiskBand::Acceptable => "IV",
            RiskBand::Improvable => "III",
            RiskBand::AcceptableWithControl => "II",
            RiskBand::NotAcceptable => "I",
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            RiskBand::Unclassified => Severity::Neutral,
            RiskBand::Acceptable => Severity::Low,
            RiskBand::Improvable => Severity::Moderate,
            RiskBand::AcceptableWithControl => Severity::High,
            RiskBand::NotAcceptable => Severity::Critical,
        }
    }

    pub const fn interpretation(self) -> &'static str {
        match self {
            RiskBand::Unclassified => "",
            RiskBand::Acceptable => {
                "Keep existing control measures; consider improvements only where \
                 cost-free and verify they stay effective"
            }
            RiskBand::Improvable => {
                "Improve if possible; it is worth justifying the intervention and its cost"
            }
            RiskBand::AcceptableWithControl => {
                "Correct and adopt control measures immediately; consider suspending \
                 activities when the risk level is above or equal to 360"
            }
            RiskBand::NotAcceptable => {
                "Critical situation; suspend activities until the risk is under control \
                 and intervene urgently"
            }
        }
    }

    pub const fn acceptability(self) -> &'static str {
        match self {
            RiskBand::Unclassified => "",
            RiskBand::Acceptable => "Acceptable",
            RiskBand::Improvable => "Improvable",
            RiskBand::AcceptableWithControl => "Not acceptable or acceptable with specific control",
            RiskBand::NotAcceptable => "Not acceptable",
        }
    }
}

pub fn classify_risk(risk: Option<u32>) -> RiskBand {
    match risk {
        None => RiskBand::Unclassified,
        Some(r) if r < 40 => RiskBand::Acceptable,
        Some(r) if r < 150 => RiskBand::Improvable,
        Some(r) if r < 600 => RiskBand::AcceptableWithControl,
        Some(_) => RiskBand::NotAcceptable,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
