/// A single point with an optional unit normal.
///
/// [`crate::PointCloud`] stores points column-wise; this is the row view used
/// when a caller wants one point at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
}

impl Point {
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    pub fn with_normal(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self {
            position,
            normal: Some(normal),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
    }
}
