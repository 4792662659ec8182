//! Projects a run's path into a fixed viewport as a simple polyline.
//!
//! This is not a map projection: latitude and longitude are stretched
//! independently to fill the viewport, which is enough to show the shape of
//! a run at a glance.

use geo::{BoundingRect, Coord, LineString};

use crate::LocationSample;

/// Span used when every point shares a latitude (or longitude).
const DEGENERATE_RANGE_DEG: f64 = 0.0001;

/// Target drawing area in view units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 240.0,
            padding: 30.0,
        }
    }
}

/// A path projected into view coordinates, y growing downwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPath {
    pub points: Vec<Coord<f64>>,
}

impl ProjectedPath {
    pub fn start(&self) -> Option<Coord<f64>> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Coord<f64>> {
        self.points.last().copied()
    }

    /// SVG path data: `M x,y L x,y L ...`
    pub fn svg_path(&self) -> String {
        let parts: Vec<String> = self
            .points
            .iter()
            .map(|c| format!("{},{}", c.x, c.y))
            .collect();
        format!("M {}", parts.join(" L "))
    }
}

/// Project points (oldest first) into the viewport. North is up.
/// Returns `None` with fewer than two points.
pub fn project_path<'a, I>(points: I, viewport: Viewport) -> Option<ProjectedPath>
where
    I: IntoIterator<Item = &'a LocationSample>,
{
    let line: LineString<f64> = points
        .into_iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();
    if line.0.len() < 2 {
        return None;
    }

    let bounds = line.bounding_rect()?;
    let range = |span: f64| if span != 0.0 { span } else { DEGENERATE_RANGE_DEG };
    let lng_range = range(bounds.width());
    let lat_range = range(bounds.height());

    let inner_w = viewport.width - 2.0 * viewport.padding;
    let inner_h = viewport.height - 2.0 * viewport.padding;

    let points = line
        .coords()
        .map(|c| Coord {
            x: viewport.padding + (c.x - bounds.min().x) / lng_range * inner_w,
            y: viewport.height - (viewport.padding + (c.y - bounds.min().y) / lat_range * inner_h),
        })
        .collect();

    Some(ProjectedPath { points })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lon: f64) -> LocationSample {
        LocationSample::new(lat, lon, 0)
    }

    #[test]
    fn test_too_few_points() {
        let empty: [LocationSample; 0] = [];
        assert!(project_path(&empty, Viewport::default()).is_none());
        assert!(project_path(&[sample(1.0, 1.0)], Viewport::default()).is_none());
    }

    #[test]
    fn test_corners_map_to_padded_box() {
        let path = [sample(0.0, 0.0), sample(1.0, 2.0)];
        let projected = project_path(&path, Viewport::default()).unwrap();
        assert_eq!(projected.start(), Some(Coord { x: 30.0, y: 210.0 }));
        assert_eq!(projected.end(), Some(Coord { x: 270.0, y: 30.0 }));
        assert_eq!(projected.svg_path(), "M 30,210 L 270,30");
    }

    #[test]
    fn test_degenerate_range() {
        // Due north: longitude span is zero, so x stays at the left padding
        let path = [sample(10.0, 5.0), sample(10.001, 5.0), sample(10.002, 5.0)];
        let projected = project_path(&path, Viewport::default()).unwrap();
        assert!(projected.points.iter().all(|c| c.x == 30.0));
        assert!((projected.points[1].y - 120.0).abs() < 1e-6);
    }
}
