use geo::Point;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A WGS84 position as sent by the directions provider (`{ "lat", "lng" }`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// geo points are (x = lon, y = lat)
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }
}

// 0.0 = Safe, 1.0 = Dangerous; the label is the cluster bucket the score fell into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum RiskLabel {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl RiskLabel {
    /// Case-insensitive; anything unrecognised (including blank) is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for RiskLabel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Inbound: directions provider payload ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteRiskRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteLeg {
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<RouteStep>,
}

/// One maneuver of a leg. Only the geometry fields matter for scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub distance: Option<Measure>,
    #[serde(default)]
    pub duration: Option<Measure>,
    #[serde(default, alias = "start_location")]
    pub start_location: Option<Coordinate>,
    #[serde(default, alias = "end_location")]
    pub end_location: Option<Coordinate>,
    #[serde(default)]
    pub polyline: Option<EncodedPolyline>,
}

impl RouteStep {
    /// The encoded geometry, if the provider sent a non-empty one.
    pub fn encoded_points(&self) -> Option<&str> {
        self.polyline
            .as_ref()
            .and_then(|polyline| polyline.points.as_deref())
            .filter(|points| !points.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodedPolyline {
    #[serde(default)]
    pub points: Option<String>,
}

/// Distance or duration as `{ "text": "0.3 km", "value": 300 }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measure {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Option<i64>,
}

// --- Outbound ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRisk {
    pub average_risk_score: f64,
    pub dominant_risk_label: RiskLabel,
    pub sampled_points: usize,
    pub matched_points: usize,
}

impl StepRisk {
    /// Result for a step with nothing to match.
    pub fn no_data(sampled_points: usize) -> Self {
        Self {
            average_risk_score: 0.0,
            dominant_risk_label: RiskLabel::Unknown,
            sampled_points,
            matched_points: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRisk {
    pub route_name: String,
    pub total_risk_score: f64,
    pub total_steps: usize,
    pub step_risks: Vec<StepRisk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRiskResponse {
    pub routes: Vec<RouteRisk>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
