use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps, Coord, Line, LineString, MultiPolygon, Polygon};
use tracing::debug;

/// Structural validity: closed rings of at least four finite coordinates,
/// no ring crossing or touching itself, and no zero-area shells.
/// Consecutive repeated vertices are ignored.
pub fn is_valid(geometry: &MultiPolygon<f64>) -> bool {
    if geometry.0.is_empty() {
        return false;
    }

    geometry.0.iter().all(|polygon| {
        if polygon.unsigned_area() == 0.0 {
            return false;
        }
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors().iter())
            .all(ring_is_simple)
    })
}

fn all_finite(coords: &[Coord<f64>]) -> bool {
    coords.iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

fn ring_is_simple(ring: &LineString<f64>) -> bool {
    let mut coords = ring.0.clone();
    coords.dedup();
    if coords.len() < 4 || coords.first() != coords.last() || !all_finite(&coords) {
        return false;
    }

    let segments: Vec<Line<f64>> = coords.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let n = segments.len();

    for i in 0..n {
        for j in (i + 1)..n {
            // Neighbours share a vertex by construction; the first and last
            // segments meet at the closing vertex.
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                if is_degenerate_overlap(&segments[i], &segments[j]) {
                    return false;
                }
                continue;
            }
            if line_intersection(segments[i], segments[j]).is_some() {
                return false;
            }
        }
    }
    true
}

// Consecutive segments that double back over each other form a spike.
fn is_degenerate_overlap(a: &Line<f64>, b: &Line<f64>) -> bool {
    matches!(line_intersection(*a, *b), Some(LineIntersection::Collinear { intersection })
        if intersection.start != intersection.end)
}

/// Returns the geometry unchanged when valid; otherwise attempts the
/// zero-distance repair and returns `None` if nothing with area remains.
pub fn ensure_valid(geometry: MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    if is_valid(&geometry) {
        return Some(geometry);
    }

    let repaired = zero_buffer(&geometry);
    debug!(
        "Repaired geometry: {} polygon(s) in, {} out",
        geometry.0.len(),
        repaired.0.len()
    );

    // Boolean-op output may keep shells that touch their holes at a vertex.
    let usable = !repaired.0.is_empty()
        && repaired.unsigned_area() > 0.0
        && repaired.0.iter().all(|p| {
            std::iter::once(p.exterior())
                .chain(p.interiors().iter())
                .all(|r| all_finite(&r.0))
        });

    if usable {
        Some(repaired)
    } else {
        None
    }
}

/// Splits a ring wherever it revisits a vertex, yielding closed loops.
/// An inverted hole becomes the outer loop plus the pinched-off loop.
pub fn split_ring(ring: &LineString<f64>) -> Vec<LineString<f64>> {
    let mut coords = ring.0.clone();
    coords.dedup();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }

    let mut loops = Vec::new();
    let mut path: Vec<Coord<f64>> = Vec::new();

    for c in coords {
        if let Some(k) = path.iter().position(|p| *p == c) {
            let mut pinched: Vec<Coord<f64>> = path.drain(k..).collect();
            pinched.push(c);
            loops.push(pinched);
        }
        path.push(c);
    }
    if let Some(&first) = path.first() {
        path.push(first);
        loops.push(path);
    }

    loops
        .into_iter()
        .filter(|l| l.len() >= 4)
        .map(LineString::new)
        .collect()
}

/// Even-odd re-noding of every ring, then a union across polygons. This
/// splits self-intersections and pinched rings into valid shells and holes
/// the same way a zero-width buffer does.
pub fn zero_buffer(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let mut result: MultiPolygon<f64> = MultiPolygon::new(vec![]);

    for polygon in &geometry.0 {
        if !all_finite(&polygon.exterior().0) {
            continue;
        }
        let mut shape: MultiPolygon<f64> = MultiPolygon::new(vec![]);
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors().iter()) {
            for piece in split_ring(ring) {
                shape = shape.xor(&Polygon::new(piece, vec![]));
            }
        }
        result = result.union(&shape);
    }

    result
}
