//! Corner-calibrated coordinate mapping.
//!
//! Maps a raw field vector onto screen coordinates using three
//! calibrated corner vectors. The model: the pointed-at spot P satisfies
//!
//! ```text
//! A + u*(B - A) + v*(C - A) = t*P
//! ```
//!
//! where A/B/C are the top-left, top-right and bottom-left corners and
//! (u, v) in 0..1 are the screen coordinates. Rearranged into the 3x4
//! augmented system `-t*P + u*(B-A) + v*(C-A) = -A` and solved by
//! Gauss-Jordan elimination with partial pivoting. A pivot collapsing to
//! (near) zero means the corner set is degenerate - e.g. collinear
//! corners - and there is no mapping this tick; the caller keeps its
//! previous output.

use crate::sensor::XyzVector;

/// Pivots smaller than this (in magnitude) are treated as singular.
const SINGULAR_EPSILON: f32 = 0.000_976_562_5; // 2^-10

/// Full-scale HID coordinate (logical maximum of the pointer report).
const AXIS_RANGE: f32 = 32767.0;

/// Solve for the screen position of `point` inside the quadrilateral
/// spanned by `corners[0..3]` (top-left, top-right, bottom-left; the
/// fourth corner is captured for symmetry but not used by this model).
///
/// Returns `None` when the system is singular.
pub fn map_to_screen(point: &XyzVector, corners: &[XyzVector; 4]) -> Option<(i16, i16)> {
    const W: usize = 4;
    const H: usize = 3;

    let a = &corners[0];
    let b = &corners[1];
    let c = &corners[2];

    // Columns: u-direction, v-direction, -point | rhs = -topleft.
    let mut m: [[f32; W]; H] = [
        [
            (b.x - a.x) as f32,
            (c.x - a.x) as f32,
            -(point.x as f32),
            -(a.x as f32),
        ],
        [
            (b.y - a.y) as f32,
            (c.y - a.y) as f32,
            -(point.y as f32),
            -(a.y as f32),
        ],
        [
            (b.z - a.z) as f32,
            (c.z - a.z) as f32,
            -(point.z as f32),
            -(a.z as f32),
        ],
    ];

    // Forward elimination with partial pivoting. Magnitudes are compared
    // through their squares; f32::abs is a std intrinsic and this core
    // stays no_std.
    for col in 0..H {
        let mut maxrow = col;
        let mut pivot_sq = m[maxrow][col] * m[maxrow][col];
        for row in (col + 1)..H {
            let candidate_sq = m[row][col] * m[row][col];
            if candidate_sq > pivot_sq {
                pivot_sq = candidate_sq;
                maxrow = row;
            }
        }
        if pivot_sq < SINGULAR_EPSILON * SINGULAR_EPSILON {
            return None;
        }
        if maxrow != col {
            m.swap(col, maxrow);
        }

        for row in (col + 1)..H {
            let factor = m[row][col] / m[col][col];
            for x in col..W {
                m[row][x] -= m[col][x] * factor;
            }
        }
    }

    // Back-substitute. The unknowns are (u, v, t) in column order; t is
    // the ray scale factor and is discarded.
    let t = m[2][3] / m[2][2];
    let v = (m[1][3] - m[1][2] * t) / m[1][1];
    let u = (m[0][3] - m[0][1] * v - m[0][2] * t) / m[0][0];

    // `as` casts saturate, so out-of-quadrilateral points clamp to the
    // report's logical range instead of wrapping.
    Some(((u * AXIS_RANGE) as i16, (v * AXIS_RANGE) as i16))
}
