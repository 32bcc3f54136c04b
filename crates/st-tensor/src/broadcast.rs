// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! NumPy-style broadcasting shared by tensor kernels and host values.

use ndarray::{ArrayD, IxDyn, Zip};

use crate::{TensorError, TensorResult};

/// Resulting shape when broadcasting `left` against `right`, or `None` when
/// some trailing axis disagrees and neither side is 1.
pub fn broadcast_shape(left: &[usize], right: &[usize]) -> Option<Vec<usize>> {
    let rank = left.len().max(right.len());
    let pad_left = rank - left.len();
    let pad_right = rank - right.len();
    let mut out = Vec::with_capacity(rank);
    for axis in 0..rank {
        let l = if axis < pad_left { 1 } else { left[axis - pad_left] };
        let r = if axis < pad_right { 1 } else { right[axis - pad_right] };
        let dim = if l == r || r == 1 {
            l
        } else if l == 1 {
            r
        } else {
            return None;
        };
        out.push(dim);
    }
    Some(out)
}

/// Applies `f` elementwise over the broadcast of both arrays.
pub fn zip_with<A, B, C, F>(left: &ArrayD<A>, right: &ArrayD<B>, f: F) -> TensorResult<ArrayD<C>>
where
    A: Copy,
    B: Copy,
    F: Fn(A, B) -> C,
{
    let incompatible = || TensorError::IncompatibleShapes {
        left: left.shape().to_vec(),
        right: right.shape().to_vec(),
    };
    let shape = broadcast_shape(left.shape(), right.shape()).ok_or_else(incompatible)?;
    let dim = IxDyn(&shape);
    let l = left.broadcast(dim.clone()).ok_or_else(incompatible)?;
    let r = right.broadcast(dim).ok_or_else(incompatible)?;
    Ok(Zip::from(l).and(r).map_collect(|a, b| f(*a, *b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn scalar_broadcasts_against_anything() {
        assert_eq!(broadcast_shape(&[], &[3, 2]), Some(vec![3, 2]));
        assert_eq!(broadcast_shape(&[3, 1], &[4]), Some(vec![3, 4]));
        assert_eq!(broadcast_shape(&[3], &[4]), None);
    }

    #[test]
    fn zip_with_reports_incompatible_shapes() {
        let a = arr1(&[1, 2, 3]).into_dyn();
        let b = arr1(&[1, 2]).into_dyn();
        let err = zip_with(&a, &b, |x: i32, y: i32| x + y).unwrap_err();
        assert_eq!(
            err,
            TensorError::IncompatibleShapes {
                left: vec![3],
                right: vec![2]
            }
        );
    }
}
