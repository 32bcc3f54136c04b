// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use ndarray::ArrayD;
use st_tensor::{DType, Storage, Tensor};

use super::HostValue;
use crate::error::{BridgeError, BridgeResult};

/// Widens a tensor into its host representation. Never fails.
pub fn tensor_to_host(tensor: &Tensor) -> HostValue {
    match tensor.storage() {
        Storage::Bool(a) => HostValue::Bool(a.clone()),
        Storage::U8(a) => HostValue::Int(a.mapv(i64::from)),
        Storage::I32(a) => HostValue::Int(a.mapv(i64::from)),
        Storage::I64(a) => HostValue::Int(a.clone()),
        Storage::F32(a) => HostValue::Float(a.mapv(f64::from)),
        Storage::F64(a) => HostValue::Float(a.clone()),
    }
}

/// Narrows a host value into a tensor of `dtype`.
///
/// Integer targets reject values outside their range and non-finite floats;
/// finite floats are truncated toward zero first. `f32` rejects finite values
/// beyond its range. Any nonzero value converts to `true`.
pub fn host_to_tensor(value: &HostValue, dtype: DType) -> BridgeResult<Tensor> {
    let fail = |reason: String| BridgeError::TypeConversion { dtype, reason };
    let storage = match value {
        HostValue::Bool(a) => {
            let ints = a.mapv(i64::from);
            from_ints(&ints, dtype).map_err(fail)?
        }
        HostValue::Int(a) => from_ints(a, dtype).map_err(fail)?,
        HostValue::Float(a) => from_floats(a, dtype).map_err(fail)?,
    };
    Ok(Tensor::from_storage(storage))
}

/// Converts a tensor to `dtype` under the same rules as [`host_to_tensor`].
pub fn cast_checked(tensor: &Tensor, dtype: DType) -> BridgeResult<Tensor> {
    if tensor.dtype() == dtype {
        return Ok(tensor.clone());
    }
    host_to_tensor(&tensor_to_host(tensor), dtype)
}

fn from_ints(array: &ArrayD<i64>, dtype: DType) -> Result<Storage, String> {
    let storage = match dtype {
        DType::Bool => Storage::Bool(array.mapv(|v| v != 0)),
        DType::U8 => Storage::U8(try_map(array, |v| narrow(v, dtype))?),
        DType::I32 => Storage::I32(try_map(array, |v| narrow(v, dtype))?),
        DType::I64 => Storage::I64(array.clone()),
        DType::F32 => Storage::F32(array.mapv(|v| v as f32)),
        DType::F64 => Storage::F64(array.mapv(|v| v as f64)),
    };
    Ok(storage)
}

fn from_floats(array: &ArrayD<f64>, dtype: DType) -> Result<Storage, String> {
    let storage = match dtype {
        DType::Bool => Storage::Bool(array.mapv(|v| v != 0.0)),
        DType::U8 => Storage::U8(try_map(array, |v| truncate(v, dtype))?),
        DType::I32 => Storage::I32(try_map(array, |v| truncate(v, dtype))?),
        DType::I64 => Storage::I64(try_map(array, |v| truncate(v, dtype))?),
        DType::F32 => Storage::F32(try_map(array, |v| {
            if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                Err(format!("{v} overflows f32"))
            } else {
                Ok(v as f32)
            }
        })?),
        DType::F64 => Storage::F64(array.clone()),
    };
    Ok(storage)
}

fn narrow<T: TryFrom<i64>>(value: i64, dtype: DType) -> Result<T, String> {
    T::try_from(value).map_err(|_| format!("{value} is out of range for {dtype}"))
}

fn truncate<T: TryFrom<i128>>(value: f64, dtype: DType) -> Result<T, String> {
    if !value.is_finite() {
        return Err(format!("{value} has no {dtype} representation"));
    }
    // `as` saturates at the i128 bounds, which are outside every target range.
    T::try_from(value.trunc() as i128).map_err(|_| format!("{value} is out of range for {dtype}"))
}

fn try_map<A, B, F>(array: &ArrayD<A>, f: F) -> Result<ArrayD<B>, String>
where
    A: Copy,
    F: Fn(A) -> Result<B, String>,
{
    let data = array.iter().map(|&v| f(v)).collect::<Result<Vec<_>, _>>()?;
    ArrayD::from_shape_vec(array.raw_dim(), data).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn int_into_i32_checks_range() {
        let t = host_to_tensor(&HostValue::from(3i64), DType::I32).unwrap();
        assert_eq!(t, Tensor::scalar(3i32));

        let err = host_to_tensor(&HostValue::from(i64::from(i32::MAX) + 1), DType::I32).unwrap_err();
        assert!(matches!(err, BridgeError::TypeConversion { dtype: DType::I32, .. }));

        let err = host_to_tensor(&HostValue::from(-1i64), DType::U8).unwrap_err();
        assert!(err.to_string().contains("out of range for u8"));
    }

    #[test]
    fn floats_truncate_into_integers() {
        let v = HostValue::Float(arr1(&[2.9, -2.9, 0.0]).into_dyn());
        let t = host_to_tensor(&v, DType::I64).unwrap();
        assert_eq!(t, Tensor::from_vec(&[3], vec![2i64, -2, 0]).unwrap());
    }

    #[test]
    fn non_finite_floats_have_no_integer_form() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = host_to_tensor(&HostValue::from(bad), DType::I32).unwrap_err();
            assert!(matches!(err, BridgeError::TypeConversion { .. }));
        }
        let err = host_to_tensor(&HostValue::from(1e300), DType::I64).unwrap_err();
        assert!(matches!(err, BridgeError::TypeConversion { dtype: DType::I64, .. }));
    }

    #[test]
    fn f32_overflow_is_rejected_but_infinity_passes() {
        assert!(host_to_tensor(&HostValue::from(1e39), DType::F32).is_err());
        let inf = host_to_tensor(&HostValue::from(f64::INFINITY), DType::F32).unwrap();
        assert_eq!(inf.scalar_value::<f32>().unwrap(), f32::INFINITY);
    }

    #[test]
    fn nonzero_means_true() {
        let v = HostValue::Int(arr1(&[0i64, 5, -1]).into_dyn());
        let t = host_to_tensor(&v, DType::Bool).unwrap();
        assert_eq!(t, Tensor::from_vec(&[3], vec![false, true, true]).unwrap());
    }

    #[test]
    fn cast_checked_refuses_lossy_narrowing() {
        let t = Tensor::scalar(300i32);
        assert!(cast_checked(&t, DType::U8).is_err());
        assert_eq!(cast_checked(&t, DType::I64).unwrap(), Tensor::scalar(300i64));
    }
}
