//! Record collection identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three independently synchronized record collections.
///
/// The variant order is the fixed processing order of a full sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    /// Tension test records
    Tension,
    /// Stock-take records
    StockTake,
    /// Finish-earlier session records
    FinishEarlier,
}

impl Collection {
    /// All collections in sync processing order.
    pub const ALL: [Self; 3] = [Self::Tension, Self::StockTake, Self::FinishEarlier];

    /// Local table name backing this collection.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Tension => "tension_records",
            Self::StockTake => "stock_takes",
            Self::FinishEarlier => "finish_earlier",
        }
    }

    /// Path segment of the remote REST resource.
    pub const fn remote_path(self) -> &'static str {
        match self {
            Self::Tension => "tension-records",
            Self::StockTake => "stock-takes",
            Self::FinishEarlier => "finish-earlier",
        }
    }

    /// Whether local deletes are soft (tombstoned) or physical.
    ///
    /// Finish-earlier sessions are removed outright; the other collections
    /// keep the row so the deletion can propagate to the remote side.
    pub const fn uses_soft_delete(self) -> bool {
        !matches!(self, Self::FinishEarlier)
    }

    /// Stable identifier used in conflict keys and user-facing output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tension => "tension",
            Self::StockTake => "stock-take",
            Self::FinishEarlier => "finish-earlier",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tension" => Ok(Self::Tension),
            "stock-take" => Ok(Self::StockTake),
            "finish-earlier" => Ok(Self::FinishEarlier),
            other => Err(format!("unknown collection: {other}")),
        }
    }
}
