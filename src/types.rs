// =============================================================================
// Shared types used across the swing scanner
// =============================================================================

use serde::{Deserialize, Serialize};

/// Which rule-based setup produced a detection.
///
/// Persisted in the trade memory as `"TREND"` / `"MEANREV"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetupKind {
    #[serde(rename = "TREND")]
    Trend,
    #[serde(rename = "MEANREV")]
    MeanRev,
}

impl std::fmt::Display for SetupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trend => write!(f, "TREND"),
            Self::MeanRev => write!(f, "MEANREV"),
        }
    }
}

/// Directional bias carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bias {
    Long,
    Short,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Outcome category of a single ticker in a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    /// A novel setup was found and notified.
    Detected,
    /// A setup matched but the trade memory already holds it.
    Suppressed,
    /// Enough data, no rule fired.
    NoSetup,
    /// Not enough price history to evaluate.
    Skipped,
    /// The ticker's evaluation failed.
    Failed,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected => write!(f, "Detected"),
            Self::Suppressed => write!(f, "Suppressed"),
            Self::NoSetup => write!(f, "NoSetup"),
            Self::Skipped => write!(f, "Skipped"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// The part of the pipeline a scan row is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanModule {
    Trend,
    MeanRev,
    Data,
    Scan,
    Error,
}

impl From<SetupKind> for ScanModule {
    fn from(kind: SetupKind) -> Self {
        match kind {
            SetupKind::Trend => Self::Trend,
            SetupKind::MeanRev => Self::MeanRev,
        }
    }
}

impl std::fmt::Display for ScanModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trend => write!(f, "Trend"),
            Self::MeanRev => write!(f, "MeanRev"),
            Self::Data => write!(f, "Data"),
            Self::Scan => write!(f, "Scan"),
            Self::Error => write!(f, "Error"),
        }
    }
}
