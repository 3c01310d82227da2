use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Array3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Array3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Array3d) -> f64 {
        (self.x * other.x) + (self.y * other.y) + (self.z * other.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Array3d {
    fn default() -> Self {
        Self {
            x: 0f64,
            y: 0f64,
            z: 0f64,
        }
    }
}

impl From<[f64; 3]> for Array3d {
    fn from(value: [f64; 3]) -> Self {
        Self {
            x: value[0],
            y: value[1],
            z: value[2],
        }
    }
}

impl<'a> Sum<&'a Self> for Array3d {
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = &'a Self>,
    {
        iter.fold(Self::default(), |acc, x| acc + x)
    }
}

impl Sum for Array3d {
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = Self>,
    {
        iter.fold(Self::default(), |acc, x| acc + x)
    }
}

impl_op_ex!(+ |a: &Array3d, b: &Array3d| -> Array3d {
    Array3d {
        x: a.x + b.x,
        y: a.y + b.y,
        z: a.z + b.z,
    }
});

impl_op_ex!(+= |a: &mut Array3d, b: &Array3d| {
    a.x += b.x;
    a.y += b.y;
    a.z += b.z;
});

impl_op_ex!(-|a: &Array3d, b: &Array3d| -> Array3d {
    Array3d {
        x: a.x - b.x,
        y: a.y - b.y,
        z: a.z - b.z,
    }
});

impl_op_ex!(-= |a: &mut Array3d, b: &Array3d| {
    a.x -= b.x;
    a.y -= b.y;
    a.z -= b.z;
});

impl_op_ex!(-|a: &Array3d| -> Array3d {
    Array3d {
        x: -a.x,
        y: -a.y,
        z: -a.z,
    }
});

impl_op_ex_commutative!(*|a: &Array3d, b: &f64| -> Array3d {
    Array3d {
        x: a.x * b,
        y: a.y * b,
        z: a.z * b,
    }
});

impl_op_ex!(/ |a: &Array3d, b: &f64| -> Array3d {
    Array3d {
        x: a.x / b,
        y: a.y / b,
        z: a.z / b,
    }
});

/// Squared euclidean length, avoids the sqrt where only comparisons are needed.
pub fn l2_norm_squared(x: &Array3d) -> f64 {
    x.dot(x)
}

pub fn l2_norm(x: &Array3d) -> f64 {
    l2_norm_squared(x).sqrt()
}

/// Scale a vector to unit length. A precomputed norm may be passed in to
/// avoid computing it twice.
pub fn normalize(x: &Array3d, norm: Option<f64>) -> Array3d {
    let norm = norm.unwrap_or_else(|| l2_norm(x));
    x / norm
}
