//! Geometry provider: centroid, surface normal and curvature estimation,
//! and nearest-neighbor lookup over a point set.
//!
//! Normals come from the standard PCA estimate: the eigenvector of the
//! position covariance with the smallest eigenvalue, oriented toward the
//! sensor viewpoint (the origin). Curvature is the surface-variation ratio
//! `λ₀ / (λ₀ + λ₁ + λ₂)`.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

use crate::cloud::ColoredPoint;

/// Centroid of a point set. Origin for an empty slice.
pub fn centroid(points: &[ColoredPoint]) -> Point3<f32> {
    if points.is_empty() {
        return Point3::origin();
    }
    let mut acc = Vector3::<f64>::zeros();
    for p in points {
        acc += p.position.coords.cast::<f64>();
    }
    Point3::from((acc / points.len() as f64).cast::<f32>())
}

/// PCA surface normal and curvature of a point set.
///
/// The normal is unit length and oriented toward the viewpoint at the
/// origin. Fewer than three points under-determine the plane; the estimate
/// falls back to the unit Z axis with zero curvature.
pub fn normal_and_curvature(points: &[ColoredPoint]) -> (Vector3<f32>, f32) {
    if points.len() < 3 {
        return (Vector3::z(), 0.0);
    }

    let c = centroid(points).coords.cast::<f64>();
    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = p.position.coords.cast::<f64>() - c;
        cov += d * d.transpose();
    }
    cov /= points.len() as f64;

    let eig = SymmetricEigen::new(cov);
    let mut min_i = 0;
    for i in 1..3 {
        if eig.eigenvalues[i] < eig.eigenvalues[min_i] {
            min_i = i;
        }
    }

    let mut normal = eig.eigenvectors.column(min_i).into_owned();
    // Orient toward the viewpoint at the origin.
    if normal.dot(&(-c)) < 0.0 {
        normal = -normal;
    }
    let norm = normal.norm();
    if norm > 0.0 {
        normal /= norm;
    }

    let total: f64 = eig.eigenvalues.iter().sum();
    let curvature = if total > 0.0 {
        (eig.eigenvalues[min_i] / total) as f32
    } else {
        0.0
    };

    (normal.cast::<f32>(), curvature)
}

/// Nearest-neighbor index over a fixed point set.
///
/// Build once per point set, query many times; the imputation step uses
/// this to pair each haptic sample with the member point it touched.
pub struct PointIndex {
    tree: KdTree<f32, 3>,
    len: usize,
}

impl PointIndex {
    /// Index a point set.
    pub fn new(points: &[ColoredPoint]) -> Self {
        let mut tree = KdTree::new();
        for (i, p) in points.iter().enumerate() {
            tree.add(&[p.position.x, p.position.y, p.position.z], i as u64);
        }
        Self {
            tree,
            len: points.len(),
        }
    }

    /// Index of the point closest to `query`, or `None` for an empty set.
    pub fn nearest(&self, query: &Point3<f32>) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let nn = self
            .tree
            .nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
        Some(nn.item as usize)
    }
}

/// One-shot nearest neighbor, for callers without a reusable index.
pub fn nearest_neighbor(query: &Point3<f32>, points: &[ColoredPoint]) -> Option<usize> {
    PointIndex::new(points).nearest(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use approx::assert_relative_eq;

    fn plane_points() -> Vec<ColoredPoint> {
        // A 3x3 grid on z = 2 (in front of the origin along +z).
        let mut pts = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                pts.push(ColoredPoint::new(
                    i as f32 * 0.1,
                    j as f32 * 0.1,
                    2.0,
                    Rgb::default(),
                ));
            }
        }
        pts
    }

    #[test]
    fn test_centroid() {
        let pts = vec![
            ColoredPoint::new(0.0, 0.0, 0.0, Rgb::default()),
            ColoredPoint::new(2.0, 4.0, 6.0, Rgb::default()),
        ];
        let c = centroid(&pts);
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 2.0);
        assert_relative_eq!(c.z, 3.0);
    }

    #[test]
    fn test_planar_normal_faces_viewpoint() {
        let (n, curv) = normal_and_curvature(&plane_points());
        // Plane at z = 2, viewpoint at origin: normal must point along -z.
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-5);
        assert!(n.z < -0.99);
        assert_relative_eq!(curv, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_underdetermined_normal_falls_back() {
        let pts = vec![ColoredPoint::new(1.0, 1.0, 1.0, Rgb::default())];
        let (n, curv) = normal_and_curvature(&pts);
        assert_eq!(n, Vector3::z());
        assert_eq!(curv, 0.0);
    }

    #[test]
    fn test_nearest_neighbor() {
        let pts = plane_points();
        let idx = nearest_neighbor(&Point3::new(0.21, 0.19, 2.0), &pts).unwrap();
        // Closest grid point is (0.2, 0.2, 2.0) = index 8 (i=2, j=2).
        assert_eq!(idx, 8);

        assert!(nearest_neighbor(&Point3::origin(), &[]).is_none());
    }
}
