pub mod bounding_box;
pub mod curves;
pub mod frame;
pub mod nurbs;
pub mod point;
pub mod surfaces;
pub mod vector;

use thiserror::Error;

pub use bounding_box::BoundingBox;
pub use curves::{Circle3d, Curve, CurveEval, CurveType, Ellipse3d, Hyperbola3d, Line3d, Parabola3d};
pub use frame::Frame;
pub use nurbs::{NurbsCurve, NurbsSurface};
pub use point::Point3d;
pub use surfaces::{Cone, Cylinder, Plane, Sphere, Surface, SurfaceEval, SurfaceType, Torus};
pub use vector::Vec3;

/// Rejected geometry definitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("degenerate {0}: direction has zero length")]
    DegenerateDirection(&'static str),
    #[error("invalid {name}: {value}")]
    InvalidDimension { name: &'static str, value: f64 },
    #[error("invalid NURBS definition: {0}")]
    InvalidNurbs(String),
}

/// Positive, finite radius or length.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<f64, GeometryError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(GeometryError::InvalidDimension { name, value })
    }
}
