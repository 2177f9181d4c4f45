//! Tri-state connectivity status.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Network connectivity status derived from the most recent check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    /// No check has completed yet.
    #[default]
    Unknown,
    /// Every probed endpoint answered.
    Online,
    /// No probed endpoint answered.
    Offline,
    /// Some, but not all, probed endpoints answered.
    Limited,
}

impl ConnectivityStatus {
    /// Aggregate per-endpoint reachability into a status.
    ///
    /// An empty probe set counts as offline.
    pub fn from_counts(reachable: usize, total: usize) -> Self {
        if reachable == 0 || total == 0 {
            ConnectivityStatus::Offline
        } else if reachable >= total {
            ConnectivityStatus::Online
        } else {
            ConnectivityStatus::Limited
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::Unknown => "unknown",
            ConnectivityStatus::Online => "online",
            ConnectivityStatus::Offline => "offline",
            ConnectivityStatus::Limited => "limited",
        }
    }
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(ConnectivityStatus::Unknown),
            "online" => Ok(ConnectivityStatus::Online),
            "offline" => Ok(ConnectivityStatus::Offline),
            "limited" => Ok(ConnectivityStatus::Limited),
            other => Err(format!("unknown connectivity status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_counts_covers_every_split() {
        for total in 1..=6 {
            for reachable in 0..=total {
                let status = ConnectivityStatus::from_counts(reachable, total);
                let expected = if reachable == 0 {
                    ConnectivityStatus::Offline
                } else if reachable == total {
                    ConnectivityStatus::Online
                } else {
                    ConnectivityStatus::Limited
                };
                assert_eq!(status, expected, "{}/{}", reachable, total);
            }
        }
    }

    #[test]
    fn test_single_endpoint_never_limited() {
        assert_eq!(ConnectivityStatus::from_counts(0, 1), ConnectivityStatus::Offline);
        assert_eq!(ConnectivityStatus::from_counts(1, 1), ConnectivityStatus::Online);
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(ConnectivityStatus::Limited.to_string(), "limited");
        assert_eq!(
            "ONLINE".parse::<ConnectivityStatus>().unwrap(),
            ConnectivityStatus::Online
        );
        assert!("sideways".parse::<ConnectivityStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ConnectivityStatus::Unknown).unwrap(),
            "\"unknown\""
        );
    }
}
