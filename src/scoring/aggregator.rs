use crate::model::{Coordinate, RiskLabel, StepRisk};
use crate::store::SegmentRiskStore;
use tracing::debug;

/// Reduces the segment matches of one step's sample points.
#[derive(Debug, Clone, Copy)]
pub struct RiskAggregator {
    search_radius_m: f64,
}

impl RiskAggregator {
    pub fn new(search_radius_m: f64) -> Self {
        Self { search_radius_m }
    }

    pub fn search_radius_m(&self) -> f64 {
        self.search_radius_m
    }

    /// One nearest-segment lookup per point. Points with no segment in range,
    /// or whose lookup fails, are left out of the average rather than counted
    /// as zero risk.
    pub fn aggregate(&self, points: &[Coordinate], store: &dyn SegmentRiskStore) -> StepRisk {
        let mut score_sum = 0.0;
        let mut matched = 0usize;
        let mut labels = LabelTally::default();

        for point in points {
            match store.find_nearest(*point, self.search_radius_m) {
                Ok(Some(segment)) => {
                    score_sum += segment.risk_score;
                    matched += 1;
                    labels.record(segment.risk_label);
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(%err, lat = point.lat, lng = point.lng, "segment lookup failed; skipping point");
                }
            }
        }

        if matched == 0 {
            return StepRisk::no_data(points.len());
        }

        StepRisk {
            average_risk_score: score_sum / matched as f64,
            dominant_risk_label: labels.dominant().unwrap_or_default(),
            sampled_points: points.len(),
            matched_points: matched,
        }
    }
}

/// Occurrence counts in first-seen order.
#[derive(Debug, Default)]
struct LabelTally {
    counts: Vec<(RiskLabel, usize)>,
}

impl LabelTally {
    fn record(&mut self, label: RiskLabel) {
        match self.counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((label, 1)),
        }
    }

    /// Most frequent label; ties go to the one seen first.
    fn dominant(&self) -> Option<RiskLabel> {
        let mut best: Option<(RiskLabel, usize)> = None;
        for &(label, count) in &self.counts {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((label, count));
            }
        }
        best.map(|(label, _)| label)
    }
}
