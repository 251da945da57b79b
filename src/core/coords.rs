use crate::types::{round3, BoundingBox, SatError, SatResult};

/// Convert a drawn-rectangle ring into a canonical W/S/E/N bounding box.
///
/// The ring is the ordered vertex list of a rectangle traced from one corner:
/// vertex 0 holds the western/southern corner, vertex 2 the opposite
/// eastern/northern corner. The source map addresses longitude in the
/// [0, 360) convention, so values above 180 are shifted into [-180, 180).
///
/// Rectangles drawn across the antimeridian are not handled; the shift
/// assumes the whole rectangle sits on one side of it.
pub fn normalize_ring(ring: &[(f64, f64)]) -> SatResult<BoundingBox> {
    if ring.len() < 3 {
        return Err(SatError::InvalidGeometry(format!(
            "rectangle ring needs at least 3 vertices, got {}",
            ring.len()
        )));
    }

    let (x0, y0) = ring[0];
    let (x2, y2) = ring[2];

    let bbox = BoundingBox {
        west: round3(shift_lon(x0)),
        south: round3(y0),
        east: round3(shift_lon(x2)),
        north: round3(y2),
    };

    log::debug!("normalized ring to {:?}", bbox);
    Ok(bbox)
}

/// Shift a longitude from the [0, 360) map convention into [-180, 180)
fn shift_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}
