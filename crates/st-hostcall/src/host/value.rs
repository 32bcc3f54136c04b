// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use ndarray::{ArrayD, IxDyn};
use st_tensor::broadcast::zip_with;

use crate::error::HostError;

/// Value as seen by a host function. Integers widen to `i64` and floats to
/// `f64`, so arithmetic inside host code never loses precision relative to
/// the tensors it came from.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Bool(ArrayD<bool>),
    Int(ArrayD<i64>),
    Float(ArrayD<f64>),
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
}

impl HostValue {
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            HostValue::Bool(a) => a.shape(),
            HostValue::Int(a) => a.shape(),
            HostValue::Float(a) => a.shape(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.shape().is_empty()
    }

    /// Scalar integer view. Booleans read as 0/1; floats are refused.
    pub fn as_i64(&self) -> Option<i64> {
        if !self.is_scalar() {
            return None;
        }
        match self {
            HostValue::Bool(a) => a.iter().next().map(|&b| i64::from(b)),
            HostValue::Int(a) => a.iter().next().copied(),
            HostValue::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if !self.is_scalar() {
            return None;
        }
        match self {
            HostValue::Bool(a) => a.iter().next().map(|&b| if b { 1.0 } else { 0.0 }),
            HostValue::Int(a) => a.iter().next().map(|&v| v as f64),
            HostValue::Float(a) => a.iter().next().copied(),
        }
    }

    /// Elementwise sum with broadcasting. Bools promote to int, and anything
    /// combined with a float becomes float.
    pub fn add(&self, other: &HostValue) -> Result<HostValue, HostError> {
        self.arith(other, Arith::Add)
    }

    pub fn sub(&self, other: &HostValue) -> Result<HostValue, HostError> {
        self.arith(other, Arith::Sub)
    }

    pub fn mul(&self, other: &HostValue) -> Result<HostValue, HostError> {
        self.arith(other, Arith::Mul)
    }

    fn arith(&self, other: &HostValue, op: Arith) -> Result<HostValue, HostError> {
        match (self.ints(), other.ints()) {
            (Some(a), Some(b)) => {
                let out = zip_with(&a, &b, |x: i64, y: i64| match op {
                    Arith::Add => x.wrapping_add(y),
                    Arith::Sub => x.wrapping_sub(y),
                    Arith::Mul => x.wrapping_mul(y),
                })?;
                Ok(HostValue::Int(out))
            }
            _ => {
                let out = zip_with(&self.floats(), &other.floats(), |x: f64, y: f64| match op {
                    Arith::Add => x + y,
                    Arith::Sub => x - y,
                    Arith::Mul => x * y,
                })?;
                Ok(HostValue::Float(out))
            }
        }
    }

    fn ints(&self) -> Option<ArrayD<i64>> {
        match self {
            HostValue::Bool(a) => Some(a.mapv(i64::from)),
            HostValue::Int(a) => Some(a.clone()),
            HostValue::Float(_) => None,
        }
    }

    fn floats(&self) -> ArrayD<f64> {
        match self {
            HostValue::Bool(a) => a.mapv(|b| if b { 1.0 } else { 0.0 }),
            HostValue::Int(a) => a.mapv(|v| v as f64),
            HostValue::Float(a) => a.clone(),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(ArrayD::from_elem(IxDyn(&[]), value))
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(ArrayD::from_elem(IxDyn(&[]), i64::from(value)))
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(ArrayD::from_elem(IxDyn(&[]), value))
    }
}

impl From<f32> for HostValue {
    fn from(value: f32) -> Self {
        HostValue::Float(ArrayD::from_elem(IxDyn(&[]), f64::from(value)))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(ArrayD::from_elem(IxDyn(&[]), value))
    }
}

impl From<ArrayD<i64>> for HostValue {
    fn from(value: ArrayD<i64>) -> Self {
        HostValue::Int(value)
    }
}

impl From<ArrayD<f64>> for HostValue {
    fn from(value: ArrayD<f64>) -> Self {
        HostValue::Float(value)
    }
}

impl From<ArrayD<bool>> for HostValue {
    fn from(value: ArrayD<bool>) -> Self {
        HostValue::Bool(value)
    }
}
