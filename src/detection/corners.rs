//! Canonical corner ordering for detected quadrilaterals.
//!
//! Output order is always `[top_left, top_right, bottom_left, bottom_right]`.

use serde::{Deserialize, Serialize};

use crate::models::{Point, Quadrilateral};

/// Rule used to decide which detected corner is the card's top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerOrdering {
    /// Sort by angle around the centroid, then start from the leftmost of
    /// the two topmost corners.
    #[default]
    Centroid,
    /// Assume the short edge is the card's top edge and that the tracer
    /// started at the top-left or top-right corner.
    ShortEdge,
}

impl CornerOrdering {
    pub fn normalize(&self, quad: &Quadrilateral) -> Quadrilateral {
        match self {
            CornerOrdering::Centroid => order_by_centroid(quad),
            CornerOrdering::ShortEdge => order_by_short_edge(quad),
        }
    }
}

/// Cyclic sequence (TL, TR, BR, BL) to the canonical layout
fn to_canonical(cyclic: [Point; 4]) -> Quadrilateral {
    Quadrilateral::new([cyclic[0], cyclic[1], cyclic[3], cyclic[2]])
}

/// Short-edge heuristic.
///
/// If `|p0 p1| < |p1 p2|` the first edge is the top and `p0` is kept as
/// top-left. Otherwise the sequence is rolled forward by one point, which
/// moves the last point to the front. Equal edge lengths take the roll.
pub fn order_by_short_edge(quad: &Quadrilateral) -> Quadrilateral {
    let [p0, p1, p2, p3] = quad.corners;
    let first = p0.distance(&p1);
    let second = p1.distance(&p2);

    let cyclic = if first < second {
        [p0, p1, p2, p3]
    } else {
        [p3, p0, p1, p2]
    };
    to_canonical(cyclic)
}

/// Angle-around-centroid ordering.
///
/// Corners are sorted clockwise (image coordinates, y down). The top edge
/// is taken to be the two corners with the smallest y; the one with the
/// smaller x becomes top-left. Ties on y are broken by smaller x.
pub fn order_by_centroid(quad: &Quadrilateral) -> Quadrilateral {
    let cx = quad.corners.iter().map(|p| p.x as f64).sum::<f64>() / 4.0;
    let cy = quad.corners.iter().map(|p| p.y as f64).sum::<f64>() / 4.0;

    let mut sorted = quad.corners;
    sorted.sort_by(|a, b| {
        let ta = (a.y as f64 - cy).atan2(a.x as f64 - cx);
        let tb = (b.y as f64 - cy).atan2(b.x as f64 - cx);
        ta.total_cmp(&tb)
    });

    let mut by_height = sorted;
    by_height.sort_by_key(|p| (p.y, p.x));
    let (upper, other) = (by_height[0], by_height[1]);
    let top_left = if other.x < upper.x { other } else { upper };

    let start = sorted.iter().position(|p| *p == top_left).unwrap_or(0);
    sorted.rotate_left(start);
    to_canonical(sorted)
}
