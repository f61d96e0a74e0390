use super::{
    closest_within, ensure_valid, sort_by_id, BoundingBox, SegmentMatch, SegmentRiskRecord,
    SegmentRiskStore, StoreError,
};
use crate::model::Coordinate;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::HashMap;

// [lon, lat] in degrees, tagged with the record's slot in `records`.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Segment store backed by an R-tree over segment midpoints.
///
/// The tree works in plain degree space; queries use it as a coarse prefilter
/// and settle distances with Haversine.
pub struct RTreeSegmentIndex {
    records: Vec<SegmentRiskRecord>,
    by_id: HashMap<String, usize>,
    tree: RTree<IndexedPoint>,
}

impl RTreeSegmentIndex {
    pub fn new(records: Vec<SegmentRiskRecord>) -> Self {
        let entries: Vec<IndexedPoint> = records
            .iter()
            .enumerate()
            .map(|(slot, record)| GeomWithData::new([record.longitude, record.latitude], slot))
            .collect();
        let by_id: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(slot, record)| (record.unitid.clone(), slot))
            .collect();

        Self {
            records,
            by_id,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Records whose midpoint lies within the degree circle covering `bounds`.
    fn candidates<'a>(&'a self, bounds: &BoundingBox) -> impl Iterator<Item = &'a SegmentRiskRecord> + 'a {
        let center = [
            (bounds.west + bounds.east) / 2.0,
            (bounds.south + bounds.north) / 2.0,
        ];
        let half_width = (bounds.east - bounds.west) / 2.0;
        let half_height = (bounds.north - bounds.south) / 2.0;
        let radius_2 = half_width * half_width + half_height * half_height;

        self.tree
            .locate_within_distance(center, radius_2)
            .map(|entry| &self.records[entry.data])
    }
}

impl SegmentRiskStore for RTreeSegmentIndex {
    fn find_nearest(
        &self,
        point: Coordinate,
        radius_m: f64,
    ) -> Result<Option<SegmentMatch>, StoreError> {
        ensure_valid(point)?;
        let bounds = BoundingBox::around(point, radius_m);
        // Degree space does not wrap, so a search circle crossing 180 degrees
        // also has to look on the far side.
        let across = bounds.wrapped();
        let candidates = self
            .candidates(&bounds)
            .chain(across.iter().flat_map(|wrapped| self.candidates(wrapped)));
        Ok(closest_within(point, radius_m, candidates))
    }

    fn find_within_bounds(
        &self,
        bounds: &BoundingBox,
    ) -> Result<Vec<SegmentRiskRecord>, StoreError> {
        let mut found: Vec<_> = self
            .candidates(bounds)
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
