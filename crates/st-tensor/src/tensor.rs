// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};

use crate::broadcast::zip_with;
use crate::{DType, Element, TensorError, TensorResult};

/// Typed backing array of a tensor.
#[derive(Clone, Debug, PartialEq)]
pub enum Storage {
    Bool(ArrayD<bool>),
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl Storage {
    pub fn dtype(&self) -> DType {
        match self {
            Storage::Bool(_) => DType::Bool,
            Storage::U8(_) => DType::U8,
            Storage::I32(_) => DType::I32,
            Storage::I64(_) => DType::I64,
            Storage::F32(_) => DType::F32,
            Storage::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Storage::Bool(a) => a.shape(),
            Storage::U8(a) => a.shape(),
            Storage::I32(a) => a.shape(),
            Storage::I64(a) => a.shape(),
            Storage::F32(a) => a.shape(),
            Storage::F64(a) => a.shape(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
        }
    }
}

/// Immutable n-dimensional array. Clones share the same buffer.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    storage: Arc<Storage>,
}

impl Tensor {
    pub fn from_storage(storage: Storage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    pub fn from_array<T: Element>(array: ArrayD<T>) -> Self {
        Self::from_storage(T::wrap(array))
    }

    /// Rank-0 tensor holding `value`.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self::from_array(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn from_vec<T: Element>(shape: &[usize], data: Vec<T>) -> TensorResult<Self> {
        let expected = element_count(shape)?;
        let got = data.len();
        if expected != got {
            return Err(TensorError::DataLength { expected, got });
        }
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Self::from_array)
            .map_err(|_| TensorError::DataLength { expected, got })
    }

    pub fn zeros(dtype: DType, shape: &[usize]) -> TensorResult<Self> {
        element_count(shape)?;
        let dim = IxDyn(shape);
        let storage = match dtype {
            DType::Bool => Storage::Bool(ArrayD::from_elem(dim, false)),
            DType::U8 => Storage::U8(ArrayD::zeros(dim)),
            DType::I32 => Storage::I32(ArrayD::zeros(dim)),
            DType::I64 => Storage::I64(ArrayD::zeros(dim)),
            DType::F32 => Storage::F32(ArrayD::zeros(dim)),
            DType::F64 => Storage::F64(ArrayD::zeros(dim)),
        };
        Ok(Self::from_storage(storage))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        self.storage.shape()
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_array<T: Element>(&self) -> TensorResult<ArrayD<T>> {
        T::view(&self.storage)
            .cloned()
            .ok_or(TensorError::DTypeMismatch {
                expected: T::DTYPE,
                got: self.dtype(),
            })
    }

    /// Reads the single value of a rank-0 tensor.
    pub fn scalar_value<T: Element>(&self) -> TensorResult<T> {
        let array = T::view(&self.storage).ok_or(TensorError::DTypeMismatch {
            expected: T::DTYPE,
            got: self.dtype(),
        })?;
        if array.ndim() != 0 {
            return Err(TensorError::NotScalar {
                shape: array.shape().to_vec(),
            });
        }
        array.iter().next().copied().ok_or(TensorError::NotScalar {
            shape: array.shape().to_vec(),
        })
    }

    pub fn add(&self, other: &Tensor) -> TensorResult<Tensor> {
        self.binary(other, BinaryOp::Add)
    }

    pub fn sub(&self, other: &Tensor) -> TensorResult<Tensor> {
        self.binary(other, BinaryOp::Sub)
    }

    pub fn mul(&self, other: &Tensor) -> TensorResult<Tensor> {
        self.binary(other, BinaryOp::Mul)
    }

    fn binary(&self, other: &Tensor, op: BinaryOp) -> TensorResult<Tensor> {
        macro_rules! int_op {
            ($a:expr, $b:expr, $variant:ident) => {
                zip_with($a, $b, |x, y| match op {
                    BinaryOp::Add => x.wrapping_add(y),
                    BinaryOp::Sub => x.wrapping_sub(y),
                    BinaryOp::Mul => x.wrapping_mul(y),
                })
                .map(Storage::$variant)
            };
        }
        macro_rules! float_op {
            ($a:expr, $b:expr, $variant:ident) => {
                zip_with($a, $b, |x, y| match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    BinaryOp::Mul => x * y,
                })
                .map(Storage::$variant)
            };
        }

        let storage = match (&*self.storage, &*other.storage) {
            (Storage::U8(a), Storage::U8(b)) => int_op!(a, b, U8)?,
            (Storage::I32(a), Storage::I32(b)) => int_op!(a, b, I32)?,
            (Storage::I64(a), Storage::I64(b)) => int_op!(a, b, I64)?,
            (Storage::F32(a), Storage::F32(b)) => float_op!(a, b, F32)?,
            (Storage::F64(a), Storage::F64(b)) => float_op!(a, b, F64)?,
            (Storage::Bool(_), Storage::Bool(_)) => {
                return Err(TensorError::UnsupportedOperation {
                    op: op.name(),
                    dtype: DType::Bool,
                })
            }
            (left, right) => {
                return Err(TensorError::DTypeMismatch {
                    expected: left.dtype(),
                    got: right.dtype(),
                })
            }
        };
        Ok(Tensor::from_storage(storage))
    }

    /// Standard numeric cast. Floats saturate into integer targets and any
    /// nonzero value becomes `true`.
    pub fn cast(&self, dtype: DType) -> Tensor {
        if self.dtype() == dtype {
            return self.clone();
        }
        macro_rules! cast_numeric {
            ($a:expr) => {
                match dtype {
                    DType::Bool => Storage::Bool($a.mapv(|v| v != Default::default())),
                    DType::U8 => Storage::U8($a.mapv(|v| v as u8)),
                    DType::I32 => Storage::I32($a.mapv(|v| v as i32)),
                    DType::I64 => Storage::I64($a.mapv(|v| v as i64)),
                    DType::F32 => Storage::F32($a.mapv(|v| v as f32)),
                    DType::F64 => Storage::F64($a.mapv(|v| v as f64)),
                }
            };
        }
        let storage = match &*self.storage {
            Storage::Bool(a) => {
                let bytes = a.mapv(u8::from);
                cast_numeric!(bytes)
            }
            Storage::U8(a) => cast_numeric!(a),
            Storage::I32(a) => cast_numeric!(a),
            Storage::I64(a) => cast_numeric!(a),
            Storage::F32(a) => cast_numeric!(a),
            Storage::F64(a) => cast_numeric!(a),
        };
        Tensor::from_storage(storage)
    }
}

/// Number of elements in `shape`. The product of the nonzero axis lengths
/// must fit in `isize`, as ndarray requires even for empty arrays.
fn element_count(shape: &[usize]) -> TensorResult<usize> {
    let extent = shape
        .iter()
        .filter(|&&dim| dim != 0)
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .filter(|&extent| extent <= isize::MAX as usize)
        .ok_or_else(|| TensorError::ShapeOverflow {
            shape: shape.to_vec(),
        })?;
    Ok(if shape.contains(&0) { 0 } else { extent })
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.storage {
            Storage::Bool(a) => write!(f, "Tensor<bool>({a})"),
            Storage::U8(a) => write!(f, "Tensor<u8>({a})"),
            Storage::I32(a) => write!(f, "Tensor<i32>({a})"),
            Storage::I64(a) => write!(f, "Tensor<i64>({a})"),
            Storage::F32(a) => write!(f, "Tensor<f32>({a})"),
            Storage::F64(a) => write!(f, "Tensor<f64>({a})"),
        }
    }
}

impl<T: Element> From<T> for Tensor {
    fn from(value: T) -> Self {
        Tensor::scalar(value)
    }
}
