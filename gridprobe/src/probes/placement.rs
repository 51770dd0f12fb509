//! Geographic placement probe.
//!
//! Resolves the node's endpoint host to an IP and looks it up in a local
//! MaxMind GeoLite2 City database. An address the database does not know is
//! reported as `NotFound`, which is distinct from `LookupFailed` (resolution
//! error, missing database, malformed record).

use super::{Probe, resolve_endpoint_ip};
use async_trait::async_trait;
use gridprobe_common::{Dimension, Geolocation, NodeConfig, PlacementOutcome, RawSample};
use maxminddb::{MaxMindDBError, Reader, geoip2};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

enum GeoDb {
    Ready(Reader<Vec<u8>>),
    Unavailable(String),
}

pub struct PlacementProbe {
    db: GeoDb,
    /// Budget for resolving the endpoint host.
    resolve_timeout: Duration,
}

impl PlacementProbe {
    /// Open the geo database at `path`. A missing or unreadable database
    /// does not abort the run; every lookup then reports `LookupFailed`.
    pub fn new(path: Option<&Path>, resolve_timeout: Duration) -> Self {
        let db = match path {
            Some(path) => match Reader::open_readfile(path) {
                Ok(reader) => GeoDb::Ready(reader),
                Err(e) => {
                    warn!("Failed to open geo database {:?}: {}", path, e);
                    GeoDb::Unavailable(format!("geo database unavailable: {}", e))
                }
            },
            None => GeoDb::Unavailable("no geo database configured".to_string()),
        };
        Self { db, resolve_timeout }
    }
}

#[async_trait]
impl Probe for PlacementProbe {
    fn dimension(&self) -> Dimension {
        Dimension::Placement
    }

    async fn run(&self, node: &NodeConfig) -> RawSample {
        let reader = match &self.db {
            GeoDb::Ready(reader) => reader,
            GeoDb::Unavailable(reason) => {
                return RawSample::Placement(PlacementOutcome::LookupFailed {
                    reason: reason.clone(),
                });
            }
        };

        let ip = match resolve_endpoint_ip(node, self.resolve_timeout).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Placement resolution failed for {}: {:#}", node.id, e);
                return RawSample::Placement(PlacementOutcome::LookupFailed {
                    reason: format!("{:#}", e),
                });
            }
        };

        match reader.lookup::<geoip2::City>(ip) {
            Ok(city) => {
                let location = city.location.as_ref();
                let (Some(latitude), Some(longitude)) = (
                    location.and_then(|l| l.latitude),
                    location.and_then(|l| l.longitude),
                ) else {
                    // Record exists but carries no coordinates.
                    debug!("Geo record for {} ({}) has no coordinates", node.id, ip);
                    return RawSample::Placement(PlacementOutcome::NotFound);
                };

                let city_name = city
                    .city
                    .as_ref()
                    .and_then(|c| c.names.as_ref())
                    .and_then(|names| names.get("en"))
                    .map(|s| s.to_string());
                let country = city
                    .country
                    .as_ref()
                    .and_then(|c| c.iso_code)
                    .map(str::to_string);

                debug!(
                    "Placement for {} ({}): {:?}, {:?}",
                    node.id, ip, city_name, country
                );
                RawSample::Placement(PlacementOutcome::Located(Geolocation {
                    latitude,
                    longitude,
                    city: city_name,
                    country,
                }))
            }
            Err(MaxMindDBError::AddressNotFoundError(_)) => {
                debug!("No geo record for {} ({})", node.id, ip);
                RawSample::Placement(PlacementOutcome::NotFound)
            }
            Err(e) => {
                warn!("Geo lookup failed for {} ({}): {}", node.id, ip, e);
                RawSample::Placement(PlacementOutcome::LookupFailed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridprobe_common::NodeId;
    use std::path::PathBuf;

    fn node() -> NodeConfig {
        NodeConfig {
            id: NodeId::new("n"),
            endpoint_uri: "https://198.51.100.4:8443".to_string(),
            control_host: None,
            control_port: None,
        }
    }

    #[tokio::test]
    async fn test_missing_database_is_lookup_failure() {
        let probe = PlacementProbe::new(None, Duration::from_secs(1));
        let sample = probe.run(&node()).await;
        match sample {
            RawSample::Placement(PlacementOutcome::LookupFailed { reason }) => {
                assert!(reason.contains("no geo database"));
            }
            other => panic!("expected lookup failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_database_is_lookup_failure() {
        let probe = PlacementProbe::new(
            Some(&PathBuf::from("/nonexistent/geo.mmdb")),
            Duration::from_secs(1),
        );
        let sample = probe.run(&node()).await;
        assert!(matches!(
            sample,
            RawSample::Placement(PlacementOutcome::LookupFailed { .. })
        ));
    }
}
