//! The Geometry Kernel - exact disk/rectangle intersection areas
//!
//! Every entity is modelled as a disk of uniform probability mass. The
//! engine needs, for each grid cell, the exact area of the disk that falls
//! inside the cell. This module computes it in closed form by integrating
//! circular segments, so no polygonal approximation of the circle is involved.
//!
//! All functions are pure and hold no shared state; they are called
//! concurrently from the aggregation workers.

use crate::error::{OccupancyError, Result};
use agglo_env::EntitySnapshot;
use geo::{Area, Coord, Rect};
use std::f64::consts::PI;

/// Circular region of position uncertainty around a reported entity.
///
/// Radius 0 is allowed and denotes a point mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disk {
    center: Coord<f64>,
    radius: f64,
}

impl Disk {
    /// Create a disk, rejecting non-finite centres and negative radii.
    pub fn new(center: Coord<f64>, radius: f64) -> Result<Self> {
        if !center.x.is_finite() || !center.y.is_finite() {
            return Err(OccupancyError::geometry(format!(
                "non-finite disk centre ({}, {})",
                center.x, center.y
            )));
        }
        if !radius.is_finite() || radius < 0.0 {
            return Err(OccupancyError::geometry(format!("invalid radius {}", radius)));
        }

        Ok(Self { center, radius })
    }

    /// Build the disk of an entity: centre = position, radius = accuracy.
    pub fn from_entity(entity: &EntitySnapshot) -> Result<Self> {
        let [x, y] = entity.position;
        Self::new(Coord { x, y }, entity.accuracy).map_err(|e| match e {
            OccupancyError::InvalidGeometry(msg) => {
                OccupancyError::geometry(format!("entity {}: {}", entity.id, msg))
            }
            other => other,
        })
    }

    pub fn center(&self) -> Coord<f64> {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Geometric area `π·r²`.
    pub fn area(&self) -> f64 {
        PI * self.radius * self.radius
    }

    /// True when the disk degenerates to a point mass.
    ///
    /// Radii below ~1e-154 count as points: `π·r²` underflows to 0.
    pub fn is_point(&self) -> bool {
        self.area() == 0.0
    }

    /// Axis-aligned bounding square of the disk.
    pub fn bounding_rect(&self) -> Rect<f64> {
        let r = self.radius;
        Rect::new(
            Coord { x: self.center.x - r, y: self.center.y - r },
            Coord { x: self.center.x + r, y: self.center.y + r },
        )
    }
}

/// Area of a disk with the given radius.
pub fn disk_area(radius: f64) -> Result<f64> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(OccupancyError::geometry(format!("invalid radius {}", radius)));
    }
    Ok(PI * radius * radius)
}

/// Area of an axis-aligned rectangle.
pub fn rect_area(rect: &Rect<f64>) -> f64 {
    rect.unsigned_area()
}

/// Fast reject: does the disk reach the rectangle at all?
///
/// Compares the distance from the centre to the nearest point of the
/// rectangle against the radius. Touching counts as intersecting.
pub fn intersects(disk: &Disk, rect: &Rect<f64>) -> bool {
    let min = rect.min();
    let max = rect.max();
    let c = disk.center;

    let dx = c.x - c.x.clamp(min.x, max.x);
    let dy = c.y - c.y.clamp(min.y, max.y);

    dx * dx + dy * dy <= disk.radius * disk.radius
}

/// Exact area of `disk ∩ rect`.
///
/// Returns 0 when they are disjoint, the full disk area when the rectangle
/// contains the disk and the full rectangle area when the disk contains the
/// rectangle.
pub fn intersection_area(disk: &Disk, rect: &Rect<f64>) -> f64 {
    let r = disk.radius;
    if r == 0.0 || !intersects(disk, rect) {
        return 0.0;
    }

    // Work in disk-centred coordinates, clipped to the disk's bounding square
    let min = rect.min();
    let max = rect.max();
    let x0 = (min.x - disk.center.x).max(-r);
    let x1 = (max.x - disk.center.x).min(r);
    let y0 = (min.y - disk.center.y).max(-r);
    let y1 = (max.y - disk.center.y).min(r);

    if x0 >= x1 || y0 >= y1 {
        return 0.0;
    }

    if x0 == -r && x1 == r && y0 == -r && y1 == r {
        return disk.area();
    }

    let far_x = x0.abs().max(x1.abs());
    let far_y = y0.abs().max(y1.abs());
    if far_x * far_x + far_y * far_y <= r * r {
        return (x1 - x0) * (y1 - y0);
    }

    let band = |lo: f64, hi: f64| strip_above(x0, x1, lo, r) - strip_above(x0, x1, hi, r);

    let area = if y0 >= 0.0 {
        band(y0, y1)
    } else if y1 <= 0.0 {
        // Entirely below the centre line: mirror it upwards
        band(-y1, -y0)
    } else {
        band(0.0, -y0) + band(0.0, y1)
    };

    area.clamp(0.0, disk.area())
}

/// Area of the origin-centred disk inside `x0 <= x <= x1, y >= h` for `h >= 0`.
fn strip_above(x0: f64, x1: f64, h: f64, r: f64) -> f64 {
    let s = half_chord(h, r);
    segment_primitive(x1.clamp(-s, s), h, r) - segment_primitive(x0.clamp(-s, s), h, r)
}

/// Half-length of the chord cut by the line `y = h`.
fn half_chord(h: f64, r: f64) -> f64 {
    if h < r {
        (r * r - h * h).sqrt()
    } else {
        0.0
    }
}

/// Antiderivative of `sqrt(r² - x²) - h`.
fn segment_primitive(x: f64, h: f64, r: f64) -> f64 {
    let root = (r * r - x * x).max(0.0).sqrt();
    0.5 * (x * root + r * r * (x / r).clamp(-1.0, 1.0).asin()) - h * x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn disk(x: f64, y: f64, r: f64) -> Disk {
        Disk::new(Coord { x, y }, r).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    /// Midpoint-rule reference used to check the closed form.
    fn numeric_area(d: &Disk, b: &Rect<f64>, steps: usize) -> f64 {
        let min = b.min();
        let max = b.max();
        let dx = (max.x - min.x) / steps as f64;
        let mut total = 0.0;
        for i in 0..steps {
            let x = min.x + (i as f64 + 0.5) * dx - d.center().x;
            let half = (d.radius() * d.radius() - x * x).max(0.0).sqrt();
            let lo = (min.y - d.center().y).max(-half);
            let hi = (max.y - d.center().y).min(half);
            total += (hi - lo).max(0.0) * dx;
        }
        total
    }

    #[test]
    fn test_disk_area() {
        assert_relative_eq!(disk_area(1.0).unwrap(), PI);
        assert_relative_eq!(disk_area(2.0).unwrap(), 4.0 * PI);
        assert_eq!(disk_area(0.0).unwrap(), 0.0);
        assert!(matches!(disk_area(-1.0), Err(OccupancyError::InvalidGeometry(_))));
    }

    #[test]
    fn test_disk_rejects_invalid_input() {
        assert!(Disk::new(Coord { x: 0.0, y: 0.0 }, -0.1).is_err());
        assert!(Disk::new(Coord { x: 0.0, y: 0.0 }, f64::INFINITY).is_err());
        assert!(Disk::new(Coord { x: f64::NAN, y: 0.0 }, 1.0).is_err());
        assert!(Disk::new(Coord { x: 0.0, y: 0.0 }, 0.0).unwrap().is_point());
    }

    #[test]
    fn test_extreme_radii() {
        let tiny = disk(0.5, 0.5, 1e-170);
        assert!(tiny.is_point());
        assert!(!disk(0.5, 0.5, 1e-150).is_point());

        // Cell far inside a huge disk: full cell area, no NaN
        let huge = disk(3.0, 3.0, 1e200);
        assert!(huge.area().is_infinite());
        assert_eq!(intersection_area(&huge, &rect(0.0, 0.0, 1.0, 1.0)), 1.0);
    }

    #[test]
    fn test_entity_disk_error_names_entity() {
        let entity = EntitySnapshot::new("dev-7", [1.0, 1.0], -2.0);
        let err = Disk::from_entity(&entity).unwrap_err();
        assert!(err.to_string().contains("dev-7"));
    }

    #[test]
    fn test_quarter_disk_in_unit_cell() {
        // Centre on a corner of the cell: exactly a quarter of the disk
        let area = intersection_area(&disk(1.0, 1.0, 1.0), &rect(0.0, 0.0, 1.0, 1.0));
        assert_relative_eq!(area, PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disjoint_is_zero() {
        assert_eq!(intersection_area(&disk(5.0, 5.0, 1.0), &rect(0.0, 0.0, 1.0, 1.0)), 0.0);
        assert!(!intersects(&disk(5.0, 5.0, 1.0), &rect(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_touching_is_intersecting_but_empty() {
        let d = disk(2.0, 0.5, 1.0);
        let b = rect(0.0, 0.0, 1.0, 1.0);
        assert!(intersects(&d, &b));
        assert_eq!(intersection_area(&d, &b), 0.0);
    }

    #[test]
    fn test_rect_contains_disk() {
        let d = disk(5.0, 5.0, 2.0);
        assert_eq!(intersection_area(&d, &rect(0.0, 0.0, 10.0, 10.0)), d.area());
    }

    #[test]
    fn test_disk_contains_rect() {
        let b = rect(-0.5, -0.5, 0.5, 0.5);
        assert_relative_eq!(intersection_area(&disk(0.0, 0.0, 10.0), &b), 1.0);
        assert_relative_eq!(rect_area(&b), 1.0);
    }

    #[test]
    fn test_half_disk() {
        let area = intersection_area(&disk(0.0, 0.0, 1.0), &rect(-2.0, 0.0, 2.0, 2.0));
        assert_relative_eq!(area, PI / 2.0, epsilon = 1e-12);

        let area = intersection_area(&disk(0.0, 0.0, 1.0), &rect(-2.0, -2.0, 0.0, 2.0));
        assert_relative_eq!(area, PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_partial_overlaps_match_numeric_integration() {
        let cases = [
            (disk(0.3, 0.2, 1.0), rect(0.0, 0.0, 0.7, 0.9)),
            (disk(0.3, 0.2, 1.0), rect(-1.5, -0.4, 0.1, 0.3)),
            (disk(2.0, 2.0, 1.5), rect(1.0, 0.0, 2.5, 1.2)),
            (disk(-1.0, 4.0, 0.8), rect(-1.5, 3.1, -0.2, 5.0)),
            (disk(0.0, 0.0, 3.0), rect(-10.0, -1.0, 10.0, 0.5)),
        ];

        for (d, b) in cases {
            let exact = intersection_area(&d, &b);
            let reference = numeric_area(&d, &b, 1_000_000);
            assert_relative_eq!(exact, reference, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_four_cells_around_centre_sum_to_disk() {
        let d = disk(2.3, 1.7, 0.9);
        let cells = [
            rect(0.0, 0.0, 2.0, 2.0),
            rect(2.0, 0.0, 4.0, 2.0),
            rect(0.0, 2.0, 2.0, 4.0),
            rect(2.0, 2.0, 4.0, 4.0),
        ];
        let total: f64 = cells.iter().map(|b| intersection_area(&d, b)).sum();
        assert_relative_eq!(total, d.area(), epsilon = 1e-12);
    }

    #[test]
    fn test_point_disk_has_no_area() {
        let d = disk(0.5, 0.5, 0.0);
        let b = rect(0.0, 0.0, 1.0, 1.0);
        assert!(intersects(&d, &b));
        assert_eq!(intersection_area(&d, &b), 0.0);
    }

    #[test]
    fn test_bounding_rect() {
        let b = disk(1.0, 2.0, 0.5).bounding_rect();
        assert_eq!(b.min(), Coord { x: 0.5, y: 1.5 });
        assert_eq!(b.max(), Coord { x: 1.5, y: 2.5 });
    }
}
