//! Feed type classification for landed transit files.
//!
//! Every object landing in the incoming bucket carries its upstream URL in
//! its name, so the real-time data category can be derived from the filename
//! alone. Files that match no pattern are skipped by the batcher, never fatal.

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, UnclassifiableSnafu};

/// Real-time data category of a landed feed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    RtAlerts,
    RtTripUpdates,
    RtVehiclePositions,
    BusTripUpdates,
    BusVehiclePositions,
}

/// All feed types, in classification order.
///
/// Bus patterns are checked first: busloc filenames also contain the
/// `TripUpdates` / `VehiclePositions` substrings of the rail feeds.
pub const FEED_TYPES: [FeedType; 5] = [
    FeedType::BusTripUpdates,
    FeedType::BusVehiclePositions,
    FeedType::RtAlerts,
    FeedType::RtTripUpdates,
    FeedType::RtVehiclePositions,
];

impl FeedType {
    /// Classify a landed file by its name.
    ///
    /// Filenames embed the upstream fetch URL, e.g.
    /// `2024-01-01T00:00:00Z_https_cdn.mbta.com_realtime_Alerts_enhanced.json.gz`.
    pub fn from_filename(filename: &str) -> Result<Self, FeedError> {
        for feed_type in FEED_TYPES {
            if filename.contains(feed_type.pattern()) {
                return Ok(feed_type);
            }
        }
        UnclassifiableSnafu { filename }.fail()
    }

    /// Filename substring identifying this feed type.
    fn pattern(&self) -> &'static str {
        match self {
            FeedType::RtAlerts => "mbta.com_realtime_Alerts_enhanced",
            FeedType::RtTripUpdates => "mbta.com_realtime_TripUpdates_enhanced",
            FeedType::RtVehiclePositions => "mbta.com_realtime_VehiclePositions_enhanced",
            FeedType::BusTripUpdates => "busloc_s3.s3.amazonaws.com_prod_TripUpdates_enhanced",
            FeedType::BusVehiclePositions => {
                "busloc_s3.s3.amazonaws.com_prod_VehiclePositions_enhanced"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::RtAlerts => "rt_alerts",
            FeedType::RtTripUpdates => "rt_trip_updates",
            FeedType::RtVehiclePositions => "rt_vehicle_positions",
            FeedType::BusTripUpdates => "bus_trip_updates",
            FeedType::BusVehiclePositions => "bus_vehicle_positions",
        }
    }
}

impl std::fmt::Display for FeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rail_feeds() {
        let alerts = "2024-01-01T00:00:00Z_https_cdn.mbta.com_realtime_Alerts_enhanced.json.gz";
        assert_eq!(FeedType::from_filename(alerts), Ok(FeedType::RtAlerts));

        let trips =
            "2024-01-01T00:00:00Z_https_cdn.mbta.com_realtime_TripUpdates_enhanced.json.gz";
        assert_eq!(FeedType::from_filename(trips), Ok(FeedType::RtTripUpdates));

        let positions =
            "2024-01-01T00:00:00Z_https_cdn.mbta.com_realtime_VehiclePositions_enhanced.json.gz";
        assert_eq!(
            FeedType::from_filename(positions),
            Ok(FeedType::RtVehiclePositions)
        );
    }

    #[test]
    fn test_classify_bus_feeds_before_rail() {
        // Busloc names contain the rail substrings too; bus must win.
        let bus =
            "2024-01-01T00:00:00Z_https_mbta_busloc_s3.s3.amazonaws.com_prod_TripUpdates_enhanced.json.gz";
        assert_eq!(FeedType::from_filename(bus), Ok(FeedType::BusTripUpdates));

        let bus_vp =
            "2024-01-01T00:00:00Z_https_mbta_busloc_s3.s3.amazonaws.com_prod_VehiclePositions_enhanced.json.gz";
        assert_eq!(
            FeedType::from_filename(bus_vp),
            Ok(FeedType::BusVehiclePositions)
        );
    }

    #[test]
    fn test_unclassifiable_is_recoverable_error() {
        let err = FeedType::from_filename("vehicleCount.gz").unwrap_err();
        assert!(err.to_string().contains("vehicleCount.gz"));
    }
}
