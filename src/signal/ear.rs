//! Eye aspect ratio from six eyelid landmarks per eye.
//!
//! Points follow the usual EAR convention: p1/p4 are the outer and inner eye
//! corners (horizontal endpoints), (p2, p6) and (p3, p5) the two vertical
//! eyelid pairs.

pub type Point = (f32, f32);

/// Six landmark points per eye, in pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub struct EyeGeometry {
    pub left: [Point; 6],
    pub right: [Point; 6],
}

fn distance(a: Point, b: Point) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// EAR for a single eye: (|p2-p6| + |p3-p5|) / (2 * |p1-p4|).
/// Returns 0.0 when the horizontal distance degenerates.
pub fn eye_ear(points: &[Point; 6]) -> f32 {
    let [p1, p2, p3, p4, p5, p6] = *points;

    let vertical_1 = distance(p2, p6);
    let vertical_2 = distance(p3, p5);
    let horizontal = distance(p1, p4);

    if horizontal == 0.0 {
        return 0.0;
    }
    (vertical_1 + vertical_2) / (2.0 * horizontal)
}

/// Frame-level EAR: mean of the two per-eye ratios.
pub fn frame_ear(geometry: &EyeGeometry) -> f32 {
    (eye_ear(&geometry.left) + eye_ear(&geometry.right)) / 2.0
}
