// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use approx::assert_relative_eq;
use st_hostcall::{host_to_tensor, tensor_to_host, BridgeError, DType, HostValue, Tensor};

fn roundtrip(tensor: &Tensor) -> Tensor {
    host_to_tensor(&tensor_to_host(tensor), tensor.dtype()).unwrap()
}

#[test]
fn representable_values_roundtrip_exactly() {
    let cases = vec![
        Tensor::from_vec(&[3], vec![true, false, true]).unwrap(),
        Tensor::from_vec(&[3], vec![0u8, 1, u8::MAX]).unwrap(),
        Tensor::from_vec(&[4], vec![i32::MIN, -1, 0, i32::MAX]).unwrap(),
        Tensor::from_vec(&[2, 2], vec![i64::MIN, -7, 7, i64::MAX]).unwrap(),
        Tensor::from_vec(&[4], vec![f32::MIN, -0.1, f32::EPSILON, f32::MAX]).unwrap(),
        Tensor::from_vec(&[3], vec![f64::MIN_POSITIVE, 1.0 / 3.0, f64::MAX]).unwrap(),
        Tensor::scalar(f32::INFINITY),
        Tensor::zeros(DType::I32, &[0, 4]).unwrap(),
    ];
    for tensor in &cases {
        assert_eq!(&roundtrip(tensor), tensor, "dtype {}", tensor.dtype());
    }
}

#[test]
fn host_widening_is_exact() {
    let value = tensor_to_host(&Tensor::scalar(0.1f32));
    assert_eq!(value.as_f64(), Some(f64::from(0.1f32)));
    let back = host_to_tensor(&value, DType::F32).unwrap();
    assert_relative_eq!(back.scalar_value::<f32>().unwrap(), 0.1f32);

    assert_eq!(tensor_to_host(&Tensor::scalar(200u8)), HostValue::from(200i64));
}

#[test]
fn out_of_range_values_are_type_conversion_errors() {
    let cases = [
        (HostValue::from(256i64), DType::U8),
        (HostValue::from(i64::from(i32::MIN) - 1), DType::I32),
        (HostValue::from(f64::NAN), DType::I64),
        (HostValue::from(f64::MAX), DType::F32),
    ];
    for (value, dtype) in cases {
        match host_to_tensor(&value, dtype) {
            Err(BridgeError::TypeConversion { dtype: got, .. }) => assert_eq!(got, dtype),
            other => panic!("expected conversion error for {value:?} -> {dtype}, got {other:?}"),
        }
    }
}
