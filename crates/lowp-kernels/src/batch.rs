// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed-width batching with a scalar tail.
//!
//! Kernels walk their spans in batches of [`BATCH_WIDTH`] elements so the
//! compiler can unroll and vectorise the loop body, then finish the tail one
//! element at a time with the very same per-element function. Results are
//! therefore bit-identical regardless of where a span is split.

/// Number of elements processed per batch (one 128-bit vector of 8-bit
/// results, four vectors of 32-bit accumulators).
pub const BATCH_WIDTH: usize = 16;

/// Applies `f` element-wise from `src` into `dst`.
///
/// # Panics
/// Panics if the slices have different lengths.
#[inline]
pub(crate) fn map_batched<S, D, F>(src: &[S], dst: &mut [D], f: F)
where
    S: Copy,
    F: Fn(S) -> D,
{
    assert_eq!(src.len(), dst.len(), "source and destination spans differ in length");

    let mut src_batches = src.chunks_exact(BATCH_WIDTH);
    let mut dst_batches = dst.chunks_exact_mut(BATCH_WIDTH);
    for (s, d) in (&mut src_batches).zip(&mut dst_batches) {
        for i in 0..BATCH_WIDTH {
            d[i] = f(s[i]);
        }
    }
    for (s, d) in src_batches
        .remainder()
        .iter()
        .zip(dst_batches.into_remainder())
    {
        *d = f(*s);
    }
}

/// Like [`map_batched`], also passing each element's index within the span.
///
/// # Panics
/// Panics if the slices have different lengths.
#[inline]
pub(crate) fn map_batched_indexed<S, D, F>(src: &[S], dst: &mut [D], f: F)
where
    S: Copy,
    F: Fn(usize, S) -> D,
{
    assert_eq!(src.len(), dst.len(), "source and destination spans differ in length");

    let mut src_batches = src.chunks_exact(BATCH_WIDTH);
    let mut dst_batches = dst.chunks_exact_mut(BATCH_WIDTH);
    let mut base = 0;
    for (s, d) in (&mut src_batches).zip(&mut dst_batches) {
        for i in 0..BATCH_WIDTH {
            d[i] = f(base + i, s[i]);
        }
        base += BATCH_WIDTH;
    }
    for (i, (s, d)) in src_batches
        .remainder()
        .iter()
        .zip(dst_batches.into_remainder())
        .enumerate()
    {
        *d = f(base + i, *s);
    }
}

/// Applies `f` in place, passing each element's index within the span.
#[inline]
pub(crate) fn update_indexed<T, F>(values: &mut [T], f: F)
where
    T: Copy,
    F: Fn(usize, T) -> T,
{
    let mut batches = values.chunks_exact_mut(BATCH_WIDTH);
    let mut base = 0;
    for batch in &mut batches {
        for i in 0..BATCH_WIDTH {
            batch[i] = f(base + i, batch[i]);
        }
        base += BATCH_WIDTH;
    }
    for (i, v) in batches.into_remainder().iter_mut().enumerate() {
        *v = f(base + i, *v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_batched_covers_tail() {
        let src: Vec<i32> = (0..37).collect();
        let mut dst = vec![0i64; 37];
        map_batched(&src, &mut dst, |v| v as i64 * 2);
        assert!(dst.iter().enumerate().all(|(i, &v)| v == i as i64 * 2));
    }

    #[test]
    fn test_map_batched_indexed() {
        let src = vec![1i32; BATCH_WIDTH + 5];
        let mut dst = vec![0i32; src.len()];
        map_batched_indexed(&src, &mut dst, |i, v| i as i32 + v);
        assert!(dst.iter().enumerate().all(|(i, &v)| v == i as i32 + 1));
    }

    #[test]
    fn test_update_indexed_passes_global_index() {
        let mut v = vec![0usize; BATCH_WIDTH * 2 + 3];
        update_indexed(&mut v, |i, _| i);
        assert!(v.iter().enumerate().all(|(i, &x)| x == i));
    }

    #[test]
    #[should_panic]
    fn test_map_batched_length_mismatch() {
        let mut dst = [0u8; 2];
        map_batched(&[1u8, 2, 3], &mut dst, |v| v);
    }
}
