use super::{sample, RiskAggregator};
use crate::model::{Route, RouteRisk, RouteRiskRequest, RouteRiskResponse, RouteStep, StepRisk};
use crate::store::SegmentRiskStore;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Scores candidate routes against a segment store.
///
/// Holds no per-request state, so one instance is shared by every handler.
#[derive(Clone)]
pub struct RouteScorer {
    store: Arc<dyn SegmentRiskStore>,
    aggregator: RiskAggregator,
}

impl RouteScorer {
    pub fn new(store: Arc<dyn SegmentRiskStore>, search_radius_m: f64) -> Self {
        Self {
            store,
            aggregator: RiskAggregator::new(search_radius_m),
        }
    }

    pub fn store(&self) -> &dyn SegmentRiskStore {
        self.store.as_ref()
    }

    pub fn search_radius_m(&self) -> f64 {
        self.aggregator.search_radius_m()
    }

    /// One `RouteRisk` per input route, in input order.
    pub fn score(&self, request: &RouteRiskRequest) -> RouteRiskResponse {
        let span = info_span!("score_routes", routes = request.routes.len());
        let _guard = span.enter();

        let routes = request
            .routes
            .iter()
            .enumerate()
            .map(|(index, route)| self.score_route(index + 1, route))
            .collect();

        RouteRiskResponse { routes }
    }

    /// `position` is 1-based and only used to name routes without a summary.
    pub fn score_route(&self, position: usize, route: &Route) -> RouteRisk {
        let route_name = match route.summary.as_deref() {
            Some(summary) if !summary.is_empty() => summary.to_string(),
            _ => format!("Route {position}"),
        };

        let step_risks: Vec<StepRisk> = route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(|step| self.score_step(step))
            .collect();

        let total_steps = step_risks.len();
        let total_risk_score = if total_steps == 0 {
            0.0
        } else {
            step_risks.iter().map(|step| step.average_risk_score).sum::<f64>() / total_steps as f64
        };

        debug!(route = %route_name, total_steps, total_risk_score, "scored route");

        RouteRisk {
            route_name,
            total_risk_score,
            total_steps,
            step_risks,
        }
    }

    pub fn score_step(&self, step: &RouteStep) -> StepRisk {
        let points = sample(step);
        if points.is_empty() {
            return StepRisk::no_data(0);
        }
        self.aggregator.aggregate(&points, self.store.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, EncodedPolyline, RiskLabel, RouteLeg};
    use crate::polyline;
    use crate::store::fixtures::segment;
    use crate::store::RTreeSegmentIndex;

    fn scorer() -> RouteScorer {
        let store = RTreeSegmentIndex::new(vec![
            segment("LOW", 47.6000, -122.3000, 0.2, RiskLabel::Low),
            segment("HIGH", 47.6100, -122.3000, 0.8, RiskLabel::High),
        ]);
        RouteScorer::new(Arc::new(store), 50.0)
    }

    fn polyline_step(points: &[Coordinate]) -> RouteStep {
        RouteStep {
            polyline: Some(EncodedPolyline {
                points: Some(polyline::encode(points)),
            }),
            ..RouteStep::default()
        }
    }

    fn route(summary: Option<&str>, steps: Vec<RouteStep>) -> Route {
        Route {
            summary: summary.map(str::to_string),
            legs: vec![RouteLeg { steps }],
        }
    }

    #[test]
    fn empty_request_scores_nothing() {
        let response = scorer().score(&RouteRiskRequest::default());
        assert!(response.routes.is_empty());
    }

    #[test]
    fn two_point_step_averages_and_breaks_tie_by_first_seen() {
        let step = polyline_step(&[
            Coordinate::new(47.6000, -122.3000),
            Coordinate::new(47.6100, -122.3000),
        ]);
        let request = RouteRiskRequest {
            routes: vec![route(Some("via 1st Ave"), vec![step])],
        };

        let response = scorer().score(&request);
        let route = &response.routes[0];
        assert_eq!(route.route_name, "via 1st Ave");
        assert_eq!(route.total_steps, 1);
        assert!((route.step_risks[0].average_risk_score - 0.5).abs() < 1e-9);
        assert_eq!(route.step_risks[0].dominant_risk_label, RiskLabel::Low);
        assert!((route.total_risk_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn total_is_mean_of_step_scores_across_legs() {
        let high = polyline_step(&[Coordinate::new(47.6100, -122.3000)]);
        let low = polyline_step(&[Coordinate::new(47.6000, -122.3000)]);
        let nowhere = RouteStep::default();
        let request = RouteRiskRequest {
            routes: vec![Route {
                summary: None,
                legs: vec![
                    RouteLeg { steps: vec![high] },
                    RouteLeg { steps: vec![] },
                    RouteLeg { steps: vec![low, nowhere] },
                ],
            }],
        };

        let response = scorer().score(&request);
        let route = &response.routes[0];
        assert_eq!(route.total_steps, 3);
        assert_eq!(route.step_risks[0].dominant_risk_label, RiskLabel::High);
        assert_eq!(route.step_risks[1].dominant_risk_label, RiskLabel::Low);
        assert_eq!(route.step_risks[2], StepRisk::no_data(0));
        // The empty step still counts towards the mean as 0.0.
        assert!((route.total_risk_score - (0.8 + 0.2 + 0.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn routes_without_steps_score_zero() {
        let request = RouteRiskRequest {
            routes: vec![
                Route::default(),
                Route {
                    summary: Some(String::new()),
                    legs: vec![RouteLeg::default()],
                },
            ],
        };

        let response = scorer().score(&request);
        for route in &response.routes {
            assert_eq!(route.total_risk_score, 0.0);
            assert_eq!(route.total_steps, 0);
            assert!(route.step_risks.is_empty());
        }
    }

    #[test]
    fn unnamed_routes_use_their_position() {
        let request = RouteRiskRequest {
            routes: vec![
                route(None, vec![]),
                route(Some("SR-99"), vec![]),
                route(Some(""), vec![]),
            ],
        };

        let names: Vec<_> = scorer()
            .score(&request)
            .routes
            .into_iter()
            .map(|route| route.route_name)
            .collect();
        assert_eq!(names, vec!["Route 1", "SR-99", "Route 3"]);
    }

    #[test]
    fn endpoint_fallback_samples_start_then_end() {
        let step = RouteStep {
            start_location: Some(Coordinate::new(47.6100, -122.3000)),
            end_location: Some(Coordinate::new(47.6000, -122.3000)),
            ..RouteStep::default()
        };
        let risk = scorer().score_step(&step);
        assert_eq!(risk.sampled_points, 2);
        assert_eq!(risk.matched_points, 2);
        // HIGH is sampled first and wins the tie.
        assert_eq!(risk.dominant_risk_label, RiskLabel::High);
    }
}
