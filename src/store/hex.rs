use super::{
    closest_within, ensure_valid, sort_by_id, BoundingBox, SegmentMatch, SegmentRiskRecord,
    SegmentRiskStore, StoreError,
};
use crate::model::Coordinate;
use h3o::{CellIndex, LatLng, Resolution};
use std::collections::HashMap;

// Past this many rings a linear scan is cheaper than walking the disk.
const MAX_RINGS: u32 = 32;

/// Segment store that buckets segment midpoints into H3 cells.
///
/// A nearest query walks the disk of cells around the query cell that is wide
/// enough to cover the search radius.
pub struct HexSegmentIndex {
    resolution: Resolution,
    records: Vec<SegmentRiskRecord>,
    by_id: HashMap<String, usize>,
    cells: HashMap<CellIndex, Vec<usize>>,
}

impl HexSegmentIndex {
    /// Records with coordinates H3 cannot place are kept for id and bounding
    /// box lookups but never match a nearest query.
    pub fn new(records: Vec<SegmentRiskRecord>, resolution: Resolution) -> Self {
        let mut cells: HashMap<CellIndex, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(records.len());

        for (slot, record) in records.iter().enumerate() {
            by_id.insert(record.unitid.clone(), slot);
            if let Ok(position) = LatLng::new(record.latitude, record.longitude) {
                cells
                    .entry(position.to_cell(resolution))
                    .or_default()
                    .push(slot);
            }
        }

        Self {
            resolution,
            records,
            by_id,
            cells,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn rings_for(&self, radius_m: f64) -> u32 {
        let edge_m = self.resolution.edge_length_m();
        ((radius_m / edge_m).ceil() as u32).saturating_add(1)
    }
}

impl SegmentRiskStore for HexSegmentIndex {
    fn find_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
    ) -> Result<Option<SegmentMatch>, StoreError> {
        ensure_valid(point)?;
        let origin = LatLng::new(point.lat, point.lng)
            .map_err(|_| StoreError::InvalidCoordinate {
                lat: point.lat,
                lng: point.lng,
            })?
            .to_cell(self.resolution);

        let rings = self.rings_for(radius_m);
        if rings > MAX_RINGS {
            return Ok(closest_within(point, radius_m, &self.records));
        }

        let candidates = origin
            .grid_disk::<Vec<_>>(rings)
            .into_iter()
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .map(|&slot| &self.records[slot]);

        Ok(closest_within(point, radius_m, candidates))
    }

    fn find_within_bounds(
        &self,
        bounds: &BoundingBox,
    ) -> Result<Vec<SegmentRiskRecord>, StoreError> {
        let mut found: Vec<_> = self
            .records
            .iter()
            .filter(|record| bounds.contains(record.location()))
            .cloned()
            .collect();
        sort_by_id(&mut found);
        Ok(found)
    }

    fn find_by_id(&self, unitid: &str) -> Result<Option<SegmentRiskRecord>, StoreError> {
        Ok(self.by_id.get(unitid).map(|&slot| self.records[slot].clone()))
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
