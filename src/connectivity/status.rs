//! Connectivity snapshots and derived link quality.

/// A value snapshot of the current connection. Recomputed on every
/// transition, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub is_online: bool,
    /// Platform-reported effective connection type ("slow-2g", "2g", "3g",
    /// "4g") when available.
    pub effective_type: Option<String>,
    /// Estimated downstream bandwidth in Mbps.
    pub downlink: Option<f64>,
    /// Estimated round-trip time in milliseconds.
    pub rtt: Option<u32>,
    /// Whether the user enabled a data-saver mode.
    pub save_data: Option<bool>,
}

impl ConnectionStatus {
    /// Online with no link-quality information.
    pub fn online() -> Self {
        Self {
            is_online: true,
            effective_type: None,
            downlink: None,
            rtt: None,
            save_data: None,
        }
    }

    pub fn offline() -> Self {
        Self {
            is_online: false,
            effective_type: None,
            downlink: None,
            rtt: None,
            save_data: None,
        }
    }

    pub fn with_link(mut self, effective_type: &str, downlink: f64) -> Self {
        self.effective_type = Some(effective_type.to_string());
        self.downlink = Some(downlink);
        self
    }

    /// Derive coarse link quality from the effective type and downlink
    /// thresholds. `Unknown` when offline or when no link signal exists.
    pub fn quality(&self) -> NetworkQuality {
        if !self.is_online {
            return NetworkQuality::Unknown;
        }
        let effective_type = self.effective_type.as_deref();
        if effective_type.is_none() && self.downlink.is_none() {
            return NetworkQuality::Unknown;
        }

        let below = |limit: f64| self.downlink.is_some_and(|d| d < limit);
        if matches!(effective_type, Some("slow-2g") | Some("2g")) || below(0.1) {
            NetworkQuality::Slow
        } else if effective_type == Some("3g") || below(1.0) {
            NetworkQuality::Medium
        } else if effective_type == Some("4g") || self.downlink.is_some_and(|d| d >= 1.0) {
            NetworkQuality::Fast
        } else {
            NetworkQuality::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkQuality {
    Slow,
    Medium,
    Fast,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_unknown_when_offline_or_unprobed() {
        assert_eq!(ConnectionStatus::offline().quality(), NetworkQuality::Unknown);
        assert_eq!(
            ConnectionStatus::offline().with_link("4g", 10.0).quality(),
            NetworkQuality::Unknown
        );
        assert_eq!(ConnectionStatus::online().quality(), NetworkQuality::Unknown);
    }

    #[test]
    fn test_quality_thresholds() {
        let online = ConnectionStatus::online;
        assert_eq!(online().with_link("2g", 0.5).quality(), NetworkQuality::Slow);
        assert_eq!(online().with_link("slow-2g", 0.3).quality(), NetworkQuality::Slow);
        // Downlink below 0.1 Mbps counts as slow regardless of type
        assert_eq!(online().with_link("4g", 0.05).quality(), NetworkQuality::Slow);
        assert_eq!(online().with_link("3g", 0.8).quality(), NetworkQuality::Medium);
        assert_eq!(online().with_link("4g", 12.0).quality(), NetworkQuality::Fast);
    }

    #[test]
    fn test_quality_from_downlink_alone() {
        let mut status = ConnectionStatus::online();
        status.downlink = Some(2.0);
        assert_eq!(status.quality(), NetworkQuality::Fast);
        status.downlink = Some(0.5);
        assert_eq!(status.quality(), NetworkQuality::Medium);
    }
}
