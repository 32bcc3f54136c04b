// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Element types understood by [`Tensor`](crate::Tensor).

use std::fmt;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::tensor::Storage;

/// Scalar types a tensor can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    /// Canonical lowercase spelling.
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::U8 => "u8",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, DType::U8 | DType::I32 | DType::I64)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalar types that map one-to-one onto a [`DType`].
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn wrap(array: ArrayD<Self>) -> Storage;

    fn view(storage: &Storage) -> Option<&ArrayD<Self>>;
}

macro_rules! element {
    ($ty:ty, $dtype:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            fn wrap(array: ArrayD<Self>) -> Storage {
                Storage::$dtype(array)
            }

            fn view(storage: &Storage) -> Option<&ArrayD<Self>> {
                match storage {
                    Storage::$dtype(array) => Some(array),
                    _ => None,
                }
            }
        }
    };
}

element!(bool, Bool);
element!(u8, U8);
element!(i32, I32);
element!(i64, I64);
element!(f32, F32);
element!(f64, F64);
