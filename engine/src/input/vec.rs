// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Minimal vector math for signal values. Signals carry a [`Vec4`]; the
//! float/vec2/vec3 views are projections of it.

use std::ops::{Add, AddAssign, Index, IndexMut, Mul};

/// Component-count cap shared with composite signals.
pub const AXIS_COUNT: usize = 4;

const SIMILAR_EPSILON: f32 = 1e-5;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const ZERO: Vec4 = Vec4 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 0.0,
    };

    #[must_use]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self { Self { x, y, z, w } }

    #[must_use]
    pub fn xy(self) -> Vec2 { Vec2 { x: self.x, y: self.y } }

    #[must_use]
    pub fn xyz(self) -> Vec3 {
        Vec3 {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }

    /// Approximate equality, component-wise.
    #[must_use]
    pub fn similar(self, other: Vec4) -> bool {
        (self.x - other.x).abs() <= SIMILAR_EPSILON
            && (self.y - other.y).abs() <= SIMILAR_EPSILON
            && (self.z - other.z).abs() <= SIMILAR_EPSILON
            && (self.w - other.w).abs() <= SIMILAR_EPSILON
    }
}

impl Index<usize> for Vec4 {
    type Output = f32;

    fn index(&self, axis: usize) -> &f32 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            3 => &self.w,
            _ => panic!("vector axis out of range: {axis}"),
        }
    }
}

impl IndexMut<usize> for Vec4 {
    fn index_mut(&mut self, axis: usize) -> &mut f32 {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            3 => &mut self.w,
            _ => panic!("vector axis out of range: {axis}"),
        }
    }
}

impl Add for Vec4 {
    type Output = Vec4;

    fn add(self, other: Vec4) -> Vec4 {
        Vec4::new(
            self.x + other.x,
            self.y + other.y,
            self.z + other.z,
            self.w + other.w,
        )
    }
}

impl AddAssign for Vec4 {
    fn add_assign(&mut self, other: Vec4) { *self = *self + other; }
}

impl std::ops::Sub for Vec4 {
    type Output = Vec4;

    fn sub(self, other: Vec4) -> Vec4 {
        Vec4::new(
            self.x - other.x,
            self.y - other.y,
            self.z - other.z,
            self.w - other.w,
        )
    }
}

impl Mul<f32> for Vec4 {
    type Output = Vec4;

    fn mul(self, factor: f32) -> Vec4 {
        Vec4::new(
            self.x * factor,
            self.y * factor,
            self.z * factor,
            self.w * factor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similar_tolerates_tiny_differences() {
        let a = Vec4::new(1.0, 2.0, 3.0, 4.0);
        let b = Vec4::new(1.000_001, 2.0, 3.0, 4.0);
        assert!(a.similar(b));
        assert!(!a.similar(Vec4::new(1.1, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn component_indexing_maps_xyzw() {
        let mut v = Vec4::ZERO;
        v[0] = 1.0;
        v[3] = 4.0;
        assert_eq!(v, Vec4::new(1.0, 0.0, 0.0, 4.0));
        assert_eq!(v[3], 4.0);
    }

    #[test]
    fn projections_take_leading_components() {
        let v = Vec4::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(v.xy(), Vec2 { x: 1.0, y: 2.0 });
        assert_eq!(v.xyz(), Vec3 { x: 1.0, y: 2.0, z: 3.0 });
    }
}
