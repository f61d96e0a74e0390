use crate::model::{Coordinate, RouteStep};
use crate::polyline;
use tracing::warn;

/// Points to look up for one step.
///
/// The decoded polyline when there is one; otherwise the step's start and end
/// locations, whichever are present. A polyline that fails to decode counts as
/// no polyline so one bad step cannot sink the whole request.
pub fn sample(step: &RouteStep) -> Vec<Coordinate> {
    let mut points = polyline::decode_optional(step.encoded_points()).unwrap_or_else(|err| {
        warn!(%err, "ignoring undecodable step polyline");
        Vec::new()
    });

    if points.is_empty() {
        points.extend(step.start_location);
        points.extend(step.end_location);
    }

    points
}
