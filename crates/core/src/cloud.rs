use crate::{Point, RigidTransform};

/// An ordered set of 3D points stored column-wise, with optional per-point
/// normals.
///
/// Clouds are treated as immutable once loaded: registration tracks a pose
/// per cloud and only [`PointCloud::transformed`] materialises new geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub normals: Option<Normals>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normals {
    pub nx: Vec<f32>,
    pub ny: Vec<f32>,
    pub nz: Vec<f32>,
}

impl Normals {
    pub fn len(&self) -> usize {
        self.nx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nx.is_empty()
    }

    pub fn get(&self, i: usize) -> [f32; 3] {
        [self.nx[i], self.ny[i], self.nz[i]]
    }

    pub fn from_vectors(normals: &[[f32; 3]]) -> Self {
        Self {
            nx: normals.iter().map(|n| n[0]).collect(),
            ny: normals.iter().map(|n| n[1]).collect(),
            nz: normals.iter().map(|n| n[2]).collect(),
        }
    }
}

impl PointCloud {
    pub fn new() -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            normals: None,
        }
    }

    pub fn from_xyz(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have same length");
        assert_eq!(x.len(), z.len(), "x and z must have same length");

        Self {
            x,
            y,
            z,
            normals: None,
        }
    }

    pub fn from_positions(points: &[[f32; 3]]) -> Self {
        Self::from_xyz(
            points.iter().map(|p| p[0]).collect(),
            points.iter().map(|p| p[1]).collect(),
            points.iter().map(|p| p[2]).collect(),
        )
    }

    /// Builds a cloud from row-wise points. Normals are kept only when every
    /// point carries one.
    pub fn from_points(points: &[Point]) -> Self {
        let positions: Vec<[f32; 3]> = points.iter().map(|p| p.position).collect();
        let mut cloud = Self::from_positions(&positions);
        let normals: Option<Vec<[f32; 3]>> = points.iter().map(|p| p.normal).collect();
        if !points.is_empty() {
            cloud.normals = normals.map(|n| Normals::from_vectors(&n));
        }
        cloud
    }

    /// Attaches normals, replacing any existing ones.
    ///
    /// # Panics
    ///
    /// Panics if the normal count differs from the point count.
    pub fn with_normals(mut self, normals: Normals) -> Self {
        assert_eq!(normals.len(), self.len(), "normal count must match point count");
        self.normals = Some(normals);
        self
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.x.len(), self.y.len());
        debug_assert_eq!(self.x.len(), self.z.len());
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|n| n.len() == self.len())
    }

    pub fn position(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    pub fn point(&self, i: usize) -> Point {
        Point {
            position: self.position(i),
            normal: self.normals.as_ref().map(|n| n.get(i)),
        }
    }

    pub fn iter_positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| [*x, *y, *z])
    }

    pub fn iter_points(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.len()).map(move |i| self.point(i))
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        let mut x = Vec::with_capacity(indices.len());
        let mut y = Vec::with_capacity(indices.len());
        let mut z = Vec::with_capacity(indices.len());

        for &idx in indices {
            assert!(idx < self.len(), "index out of bounds in select");
            x.push(self.x[idx]);
            y.push(self.y[idx]);
            z.push(self.z[idx]);
        }

        let normals = self.normals.as_ref().map(|n| Normals {
            nx: indices.iter().map(|&idx| n.nx[idx]).collect(),
            ny: indices.iter().map(|&idx| n.ny[idx]).collect(),
            nz: indices.iter().map(|&idx| n.nz[idx]).collect(),
        });

        Self { x, y, z, normals }
    }

    /// Returns a copy with every point mapped through `transform`. Normals are
    /// rotated.
    pub fn transformed(&self, transform: &RigidTransform) -> Self {
        let positions: Vec<[f32; 3]> = self
            .iter_positions()
            .map(|p| transform.apply_point_f32(p))
            .collect();
        let mut out = Self::from_positions(&positions);
        out.normals = self.normals.as_ref().map(|n| {
            let rotated: Vec<[f32; 3]> = (0..n.len())
                .map(|i| transform.apply_vector_f32(n.get(i)))
                .collect();
            Normals::from_vectors(&rotated)
        });
        out
    }

    /// Concatenates clouds in order. The result has normals only if every
    /// input does.
    pub fn concat(clouds: &[PointCloud]) -> Self {
        let total: usize = clouds.iter().map(PointCloud::len).sum();
        let mut out = Self {
            x: Vec::with_capacity(total),
            y: Vec::with_capacity(total),
            z: Vec::with_capacity(total),
            normals: None,
        };
        for c in clouds {
            out.x.extend_from_slice(&c.x);
            out.y.extend_from_slice(&c.y);
            out.z.extend_from_slice(&c.z);
        }

        if !clouds.is_empty() && clouds.iter().all(PointCloud::has_normals) {
            let mut normals = Normals {
                nx: Vec::with_capacity(total),
                ny: Vec::with_capacity(total),
                nz: Vec::with_capacity(total),
            };
            for n in clouds.iter().filter_map(|c| c.normals.as_ref()) {
                normals.nx.extend_from_slice(&n.nx);
                normals.ny.extend_from_slice(&n.ny);
                normals.nz.extend_from_slice(&n.nz);
            }
            out.normals = Some(normals);
        }
        out
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}
