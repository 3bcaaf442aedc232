//! Small fixed-size vector and quaternion types.
//!
//! Kept deliberately close to what the WGSL kernel can express so the CPU
//! reference and the device program perform the same operations in the same
//! order.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn from_slice(values: &[f32]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Component-wise product.
    #[must_use]
    pub fn mul_elem(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Component-wise quotient.
    #[must_use]
    pub fn div_elem(self, other: Self) -> Self {
        Self::new(self.x / other.x, self.y / other.y, self.z / other.z)
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, k: f32) -> Self {
        Self::new(self.x / k, self.y / k, self.z / k)
    }
}

/// Unit quaternion stored scalar first, matching the `qpos` layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Quat {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    #[must_use]
    pub fn from_slice(values: &[f32]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Rotation of `angle` radians about the world z axis.
    #[must_use]
    pub fn from_yaw(angle: f32) -> Self {
        let half = 0.5 * angle;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    fn vector(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Rotates a torso-frame vector into the world frame.
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = self.vector();
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    /// Rotates a world-frame vector into the torso frame.
    #[must_use]
    pub fn inverse_rotate(self, v: Vec3) -> Vec3 {
        Self::new(self.w, -self.x, -self.y, -self.z).rotate(v)
    }

    /// Advances the orientation by a torso-frame angular velocity over `dt`
    /// and renormalises.
    #[must_use]
    pub fn integrate(self, omega: Vec3, dt: f32) -> Self {
        let u = self.vector();
        let dw = -u.dot(omega);
        let dv = omega * self.w + u.cross(omega);
        let h = 0.5 * dt;
        let q = Self::new(
            self.w + h * dw,
            self.x + h * dv.x,
            self.y + h * dv.y,
            self.z + h * dv.z,
        );
        q.normalize()
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// World z component of the torso's up axis.
    #[must_use]
    pub fn up_z(self) -> f32 {
        1.0 - 2.0 * (self.x * self.x + self.y * self.y)
    }

    /// Heading angle about the world z axis.
    #[must_use]
    pub fn yaw(self) -> f32 {
        (2.0 * (self.w * self.z + self.x * self.y))
            .atan2(1.0 - 2.0 * (self.y * self.y + self.z * self.z))
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.w, self.x, self.y, self.z]
    }
}
