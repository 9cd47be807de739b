use image::GrayImage;
use imageproc::contours::BorderType;

use crate::models::{Contour, Point};

/// Trace the borders of connected foreground regions in a binary image.
///
/// The image is traced inside a one-pixel background margin so regions
/// touching the frame edge still get a border; points are reported in the
/// original image coordinates.
pub fn find_contours(binary: &GrayImage, include_holes: bool) -> Vec<Contour> {
    let padded = pad_with_background(binary);
    imageproc::contours::find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| include_holes || c.border_type == BorderType::Outer)
        .map(|c| Contour {
            is_hole: c.border_type == BorderType::Hole,
            points: c
                .points
                .into_iter()
                .map(Point::from)
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect(),
        })
        .collect()
}

fn pad_with_background(binary: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(binary.width() + 2, binary.height() + 2);
    image::imageops::replace(&mut padded, binary, 1, 1);
    padded
}

/// Simplify a closed curve with the Douglas-Peucker algorithm.
///
/// The curve is split at two mutually distant points (an approximation of
/// its diameter), and each half is simplified as an open chain, so the
/// result does not depend on where the tracer happened to start.
pub fn approximate_polygon(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let a = farthest_from(points, 0);
    let b = farthest_from(points, a);
    if a == b {
        return vec![points[a]];
    }
    let (a, b) = (a.min(b), a.max(b));

    // a -> b, then b -> a wrapping around the end
    let first: Vec<Point> = points[a..=b].to_vec();
    let second: Vec<Point> = points[b..]
        .iter()
        .chain(points[..=a].iter())
        .copied()
        .collect();

    let mut result = simplify_open(&first, epsilon);
    result.pop();
    let mut tail = simplify_open(&second, epsilon);
    tail.pop();
    result.extend(tail);
    result
}

fn farthest_from(points: &[Point], idx: usize) -> usize {
    let origin = points[idx];
    let mut best = idx;
    let mut best_d = 0i64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as i64;
        let dy = (p.y - origin.y) as i64;
        let d = dx * dx + dy * dy;
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Douglas-Peucker on an open chain; both endpoints are always kept
fn simplify_open(chain: &[Point], epsilon: f64) -> Vec<Point> {
    if chain.len() <= 2 {
        return chain.to_vec();
    }

    let last = chain.len() - 1;
    let mut keep = vec![false; chain.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0usize, last)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_d = 0.0;
        let mut max_i = start;
        for i in start + 1..end {
            let d = distance_to_line(&chain[i], &chain[start], &chain[end]);
            if d > max_d {
                max_d = d;
                max_i = i;
            }
        }
        if max_d > epsilon {
            keep[max_i] = true;
            stack.push((start, max_i));
            stack.push((max_i, end));
        }
    }

    chain
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn distance_to_line(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return p.distance(a);
    }
    ((p.x - a.x) as f64 * dy - (p.y - a.y) as f64 * dx).abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if x >= x0 && x <= x1 && y >= y0 && y <= y1 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_single_rect_has_one_outer_contour() {
        let img = filled_rect(100, 80, 20, 10, 69, 59);
        let contours = find_contours(&img, false);
        assert_eq!(contours.len(), 1);
        assert!(!contours[0].is_hole);
        // border polygon runs through pixel centers: 49 x 49
        assert!((contours[0].area() - 49.0 * 49.0).abs() < 1.0);
    }

    #[test]
    fn test_regions_touching_each_edge_are_traced() {
        let cases = [
            (0, 20, 39, 59),  // left
            (60, 20, 99, 59), // right
            (30, 0, 69, 39),  // top
            (30, 40, 69, 79), // bottom
            (0, 0, 99, 79),   // whole frame
        ];
        for (x0, y0, x1, y1) in cases {
            let img = filled_rect(100, 80, x0, y0, x1, y1);
            let contours = find_contours(&img, false);
            assert_eq!(contours.len(), 1, "rect {:?}", (x0, y0, x1, y1));
            let c = &contours[0];
            let xs = c.points.iter().map(|p| p.x);
            let ys = c.points.iter().map(|p| p.y);
            assert_eq!(xs.clone().min(), Some(x0 as i32));
            assert_eq!(xs.max(), Some(x1 as i32));
            assert_eq!(ys.clone().min(), Some(y0 as i32));
            assert_eq!(ys.max(), Some(y1 as i32));
        }
    }

    #[test]
    fn test_holes_only_when_requested() {
        let mut img = filled_rect(100, 100, 10, 10, 89, 89);
        for y in 30..70 {
            for x in 30..70 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        assert_eq!(find_contours(&img, false).len(), 1);
        let all = find_contours(&img, true);
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|c| c.is_hole).count(), 1);
    }

    #[test]
    fn test_approximate_rect_border_gives_four_corners() {
        let img = filled_rect(120, 120, 10, 20, 89, 109);
        let contour = &find_contours(&img, false)[0];
        let approx = approximate_polygon(&contour.points, 0.05 * contour.perimeter());
        assert_eq!(approx.len(), 4);
        for corner in [
            Point::new(10, 20),
            Point::new(89, 20),
            Point::new(89, 109),
            Point::new(10, 109),
        ] {
            assert!(approx.contains(&corner), "missing corner {:?}", corner);
        }
    }

    #[test]
    fn test_approximate_keeps_collinear_chain_short() {
        let line: Vec<Point> = (0..10).map(|i| Point::new(i, 0)).collect();
        let simplified = simplify_open(&line, 0.5);
        assert_eq!(simplified, vec![Point::new(0, 0), Point::new(9, 0)]);
    }

    #[test]
    fn test_distance_to_line() {
        let d = distance_to_line(&Point::new(0, 5), &Point::new(-3, 0), &Point::new(3, 0));
        assert!((d - 5.0).abs() < 1e-12);
    }
}
