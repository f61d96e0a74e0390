//! Read-only lookups over precomputed street segment risk records.

pub mod hex;
pub mod rtree;

use crate::config::IndexKind;
use crate::model::{Coordinate, RiskLabel};
use chrono::NaiveDateTime;
use geo::prelude::*;
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

pub use hex::HexSegmentIndex;
pub use rtree::RTreeSegmentIndex;

/// Meters per degree of latitude, used to size the search prefilter.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// One scored street segment, anchored at its midpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRiskRecord {
    pub unitid: String,
    pub street_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub risk_score: f64,
    pub risk_label: RiskLabel,
    pub cluster_id: Option<i32>,
    pub incident_density: Option<f64>,
    pub night_fraction: Option<f64>,
    pub last_90d_incidents: Option<i32>,
    pub model_version: Option<String>,
    pub override_reason: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl SegmentRiskRecord {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// The nearest segment to a queried point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMatch {
    pub unitid: String,
    pub risk_score: f64,
    pub risk_label: RiskLabel,
    pub distance_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    #[error("bounds must be finite (west {west}, south {south}, east {east}, north {north})")]
    NonFinite {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    },
    #[error("east ({east}) must be greater than or equal to west ({west})")]
    EastBeforeWest { west: f64, east: f64 },
    #[error("north ({north}) must be greater than or equal to south ({south})")]
    NorthBeforeSouth { south: f64, north: f64 },
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, BoundsError> {
        if ![west, south, east, north].iter().all(|edge| edge.is_finite()) {
            return Err(BoundsError::NonFinite {
                west,
                south,
                east,
                north,
            });
        }
        if east < west {
            return Err(BoundsError::EastBeforeWest { west, east });
        }
        if north < south {
            return Err(BoundsError::NorthBeforeSouth { south, north });
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Degree box that contains every point within `radius_m` of `center`.
    pub fn around(center: Coordinate, radius_m: f64) -> Self {
        let lat_delta = radius_m / METERS_PER_DEGREE;
        // Clamp so the longitude span stays finite near the poles.
        let cos_lat = center.lat.to_radians().cos().max(1e-6);
        let lng_delta = radius_m / (METERS_PER_DEGREE * cos_lat);
        Self {
            west: center.lng - lng_delta,
            south: center.lat - lat_delta,
            east: center.lng + lng_delta,
            north: center.lat + lat_delta,
        }
    }

    /// The part of a box that crosses the antimeridian, shifted by 360 degrees
    /// onto the other side of the longitude range.
    pub fn wrapped(&self) -> Option<Self> {
        let shift = if self.west < -180.0 {
            360.0
        } else if self.east > 180.0 {
            -360.0
        } else {
            return None;
        };
        Some(Self {
            west: self.west + shift,
            east: self.east + shift,
            ..*self
        })
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.west..=self.east).contains(&point.lng) && (self.south..=self.north).contains(&point.lat)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("coordinate ({lat}, {lng}) is outside the valid range")]
    InvalidCoordinate { lat: f64, lng: f64 },
    #[error("segment store unavailable: {0}")]
    Unavailable(String),
}

/// Nearest-neighbour and range lookups over scored segments.
pub trait SegmentRiskStore: Send + Sync {
    /// Closest segment whose reference point lies within `radius_m` meters.
    fn find_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
    ) -> Result<Option<SegmentMatch>, StoreError>;

    /// All segments whose reference point lies inside `bounds`, ordered by id.
    fn find_within_bounds(&self, bounds: &BoundingBox)
    -> Result<Vec<SegmentRiskRecord>, StoreError>;

    fn find_by_id(&self, unitid: &str) -> Result<Option<SegmentRiskRecord>, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Indexes `records` with the chosen backend.
pub fn build_index(
    kind: IndexKind,
    resolution: Resolution,
    records: Vec<SegmentRiskRecord>,
) -> Arc<dyn SegmentRiskStore> {
    match kind {
        IndexKind::RTree => Arc::new(RTreeSegmentIndex::new(records)),
        IndexKind::Hex => Arc::new(HexSegmentIndex::new(records, resolution)),
    }
}

pub(crate) fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

pub(crate) fn ensure_valid(point: Coordinate) -> Result<(), StoreError> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(StoreError::InvalidCoordinate {
            lat: point.lat,
            lng: point.lng,
        })
    }
}

/// Picks the closest candidate within `radius_m`; equal distances go to the
/// lower `unitid` so every index answers the same way.
pub(crate) fn closest_within<'a>(
    point: Coordinate,
    radius_m: f64,
    candidates: impl IntoIterator<Item = &'a SegmentRiskRecord>,
) -> Option<SegmentMatch> {
    candidates
        .into_iter()
        .map(|record| (haversine_m(point, record.location()), record))
        .filter(|(distance, _)| *distance <= radius_m)
        .min_by(|(da, a), (db, b)| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.unitid.cmp(&b.unitid))
        })
        .map(|(distance_m, record)| SegmentMatch {
            unitid: record.unitid.clone(),
            risk_score: record.risk_score,
            risk_label: record.risk_label,
            distance_m,
        })
}

pub(crate) fn sort_by_id(records: &mut [SegmentRiskRecord]) {
    records.sort_by(|a, b| a.unitid.cmp(&b.unitid));
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn bounding_box_rejects_inverted_edges() {
        assert!(matches!(
            BoundingBox::new(-122.3, 47.6, -122.4, 47.7),
            Err(BoundsError::EastBeforeWest { .. })
        ));
        assert!(matches!(
            BoundingBox::new(-122.4, 47.7, -122.3, 47.6),
            Err(BoundsError::NorthBeforeSouth { .. })
        ));
        assert!(BoundingBox::new(-122.4, 47.6, -122.4, 47.6).is_ok());
    }

    #[test]
    fn bounding_box_rejects_non_finite_edges() {
        for (west, south, east, north) in [
            (f64::NAN, 47.6, -122.3, 47.7),
            (-122.4, 47.6, f64::NAN, 47.7),
            (f64::NEG_INFINITY, -90.0, f64::INFINITY, 90.0),
            (-122.4, 47.6, -122.3, f64::INFINITY),
        ] {
            assert!(matches!(
                BoundingBox::new(west, south, east, north),
                Err(BoundsError::NonFinite { .. })
            ));
        }
    }

    #[test]
    fn prefilter_box_wraps_at_antimeridian() {
        let east_edge = BoundingBox::around(Coordinate::new(0.0, 179.9998), 100.0);
        let wrapped = east_edge.wrapped().expect("crosses 180");
        assert!(wrapped.contains(Coordinate::new(0.0, -179.9998)));

        let west_edge = BoundingBox::around(Coordinate::new(0.0, -179.9998), 100.0);
        let wrapped = west_edge.wrapped().expect("crosses -180");
        assert!(wrapped.contains(Coordinate::new(0.0, 179.9998)));

        let seattle = BoundingBox::around(Coordinate::new(47.6090, -122.3406), 100.0);
        assert_eq!(seattle.wrapped(), None);
    }

    #[test]
    fn prefilter_box_covers_radius() {
        let center = Coordinate::new(47.6090, -122.3406);
        let bounds = BoundingBox::around(center, 200.0);
        let north = Coordinate::new(center.lat + 190.0 / METERS_PER_DEGREE, center.lng);
        assert!(bounds.contains(north));
        assert!(haversine_m(center, Coordinate::new(center.lat, bounds.east)) >= 199.0);
    }

    #[test]
    fn closest_within_respects_radius_and_ties() {
        let records = vec![
            segment("B", 47.6090, -122.3406, 0.3, RiskLabel::Low),
            segment("A", 47.6090, -122.3406, 0.9, RiskLabel::High),
        ];
        let point = Coordinate::new(47.6091, -122.3406);

        let hit = closest_within(point, 50.0, &records).expect("within radius");
        assert_eq!(hit.unitid, "A");
        assert!(hit.distance_m <= 50.0);

        assert!(closest_within(point, 5.0, &records).is_none());
    }

    #[test]
    fn invalid_coordinates_are_reported() {
        assert!(ensure_valid(Coordinate::new(91.0, 0.0)).is_err());
        assert!(ensure_valid(Coordinate::new(0.0, f64::NAN)).is_err());
        assert!(ensure_valid(Coordinate::new(47.6, -122.3)).is_ok());
    }

    #[test]
    fn both_backends_index_every_record() {
        for kind in [IndexKind::RTree, IndexKind::Hex] {
            let store = build_index(kind, Resolution::Nine, downtown());
            assert_eq!(store.len(), 4);
            assert!(!store.is_empty());
        }
    }

    #[test]
    fn downtown_fixture_is_well_formed() {
        for record in downtown() {
            assert!(record.location().is_valid());
            assert!((0.0..=1.0).contains(&record.risk_score));
        }
    }
}
