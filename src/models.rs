use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Integer pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<imageproc::point::Point<i32>> for Point {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Closed boundary traced in a binarized frame
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<Point>,
    /// True for the border of a hole inside a foreground region
    pub is_hole: bool,
}

impl Contour {
    /// Enclosed area by the shoelace formula (absolute value)
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Length of the closed boundary
    pub fn perimeter(&self) -> f64 {
        closed_length(&self.points)
    }
}

pub(crate) fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area: i64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

pub(crate) fn closed_length(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.distance(b))
        .sum()
}

/// Four corners of a card-shaped region.
///
/// Straight out of the detector the order is whatever contour traversal
/// produced. After corner normalization it is
/// `[top_left, top_right, bottom_left, bottom_right]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub corners: [Point; 4],
}

impl Quadrilateral {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point {
        self.corners[1]
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[2]
    }

    pub fn bottom_right(&self) -> Point {
        self.corners[3]
    }
}

/// One known card variant in a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    #[serde(alias = "id")]
    pub card_id: String,
    #[serde(alias = "hash")]
    pub fingerprint: Fingerprint,
}

impl CardRecord {
    pub fn new(card_id: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            card_id: card_id.into(),
            fingerprint,
        }
    }
}

/// A catalog entry together with its distance from a query fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub card_id: String,
    pub distance: u32,
}

impl MatchResult {
    /// Caller-side confidence policy: accept only matches at or below `max_distance`
    pub fn is_within(&self, max_distance: u32) -> bool {
        self.distance <= max_distance
    }
}

/// Outcome for one detected candidate in a frame
#[derive(Debug, Clone)]
pub struct Identification {
    /// Index of the candidate in detector order
    pub candidate: usize,
    /// Normalized corners in detection coordinates (the working
    /// resolution when one is configured, otherwise the input frame)
    pub corners: Quadrilateral,
    pub fingerprint: Fingerprint,
    pub best: MatchResult,
    /// Nearest catalog entries, best first
    pub ranked: Vec<MatchResult>,
    /// Rectified card image, kept when the scanner is asked to
    pub card_image: Option<DynamicImage>,
}
