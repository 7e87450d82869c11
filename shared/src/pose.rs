//! Conversions between glam transforms and the wire's row-major float grid.
//!
//! Head, hand and arrow poses cross the network as a plain `[[f32; 4]; 4]`
//! in row-major order. glam stores matrices column-major, so every
//! conversion transposes.

use glam::{Mat4, Vec3};

/// Row-major 4x4 transform as it appears on the wire.
pub type Mat4Wire = [[f32; 4]; 4];

/// Identity pose: no rotation, origin at zero.
pub const IDENTITY: Mat4Wire = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub fn to_wire(transform: &Mat4) -> Mat4Wire {
    transform.transpose().to_cols_array_2d()
}

pub fn from_wire(wire: &Mat4Wire) -> Mat4 {
    Mat4::from_cols_array_2d(wire).transpose()
}

/// Pure translation pose with its origin at `position`.
pub fn translation(position: Vec3) -> Mat4Wire {
    to_wire(&Mat4::from_translation(position))
}

/// World-space origin of a pose.
pub fn origin(wire: &Mat4Wire) -> Vec3 {
    from_wire(wire).w_axis.truncate()
}

/// Point `offset` metres along the pose's local forward (+z) axis,
/// in world space.
pub fn forward_point(wire: &Mat4Wire, offset: f32) -> Vec3 {
    from_wire(wire).transform_point3(Vec3::new(0.0, 0.0, offset))
}

/// Pose located at `position` with its forward axis along `direction`.
///
/// Orientation is decomposed into yaw about y then pitch, so the pose
/// never rolls. A degenerate direction falls back to facing +z.
pub fn looking_along(position: Vec3, direction: Vec3) -> Mat4Wire {
    let direction = if direction.length_squared() > f32::EPSILON {
        direction
    } else {
        Vec3::Z
    };
    let yaw = direction.x.atan2(direction.z);
    let horizontal = (direction.x * direction.x + direction.z * direction.z).sqrt();
    let pitch = direction.y.atan2(horizontal);
    let transform = Mat4::from_translation(position)
        * Mat4::from_rotation_y(yaw)
        * Mat4::from_rotation_x(-pitch);
    to_wire(&transform)
}
