//! Batched census computation over groups of 16 adjacent center pixels.
//!
//! One row is processed as full 16-lane chunks with a scalar loop for the
//! remainder. On x86_64 the chunk kernel uses SSE2; elsewhere a portable
//! 16-lane array kernel produces the same bytes. Both are bit-identical to
//! the scalar engine.

use crate::{census_pixel, MAX_DESCRIPTOR_BYTES};

/// Lane count of the batch kernels, equal to the stride alignment unit.
pub(crate) const LANES: usize = census_core::VECTOR_WIDTH;

/// Compute descriptors for the valid pixels of one row.
///
/// `out_row` is the full output row (stride bytes); only columns in
/// `[edge, cols - edge)` are written.
pub(crate) fn census_row(
    src: &[u8],
    in_stride: usize,
    row: usize,
    edge: usize,
    cols: usize,
    pattern: &[i32],
    desc: usize,
    out_row: &mut [u8],
) {
    let last = cols - edge;
    let row_base = row * in_stride;
    let mut j = edge;

    #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
    while j + LANES <= last {
        unsafe {
            census_chunk_sse2(src, row_base + j, pattern, desc, &mut out_row[j * desc..(j + LANES) * desc]);
        }
        j += LANES;
    }

    while j + LANES <= last {
        census_chunk_batch(src, row_base + j, pattern, desc, &mut out_row[j * desc..(j + LANES) * desc]);
        j += LANES;
    }

    for jj in j..last {
        census_pixel(src, row_base + jj, pattern, &mut out_row[jj * desc..(jj + 1) * desc]);
    }
}

/// Portable 16-lane kernel: per pattern entry, compare 16 neighbor bytes
/// against 16 center bytes and OR the entry's bit into the per-byte lane
/// accumulator, then interleave the accumulators into pixel order.
fn census_chunk_batch(src: &[u8], base: usize, pattern: &[i32], desc: usize, dst: &mut [u8]) {
    let mut accum = [[0u8; LANES]; MAX_DESCRIPTOR_BYTES];
    let center = &src[base..base + LANES];

    for (k, &off) in pattern.iter().enumerate() {
        let nbase = (base as isize + off as isize) as usize;
        let neighbors = &src[nbase..nbase + LANES];
        let bit = 1u8 << (k & 7);
        let lanes = &mut accum[k >> 3];
        for l in 0..LANES {
            if neighbors[l] > center[l] {
                lanes[l] |= bit;
            }
        }
    }

    for l in 0..LANES {
        for b in 0..desc {
            dst[l * desc + b] = accum[b][l];
        }
    }
}

/// SSE2 kernel. The unsigned neighbor-vs-center comparison is realized with
/// the sign-bias trick (`x ^ 0x80` then signed greater-than); the per-lane
/// descriptor bytes are interleaved on store so the output layout matches the
/// scalar engine byte for byte.
#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
unsafe fn census_chunk_sse2(src: &[u8], base: usize, pattern: &[i32], desc: usize, dst: &mut [u8]) {
    use std::arch::x86_64::*;

    let bias = _mm_set1_epi8(0x80u8 as i8);
    let center = _mm_xor_si128(
        _mm_loadu_si128(src.as_ptr().add(base) as *const __m128i),
        bias,
    );
    let mut accum = [_mm_setzero_si128(); MAX_DESCRIPTOR_BYTES];

    for (k, &off) in pattern.iter().enumerate() {
        let p = src.as_ptr().offset(base as isize + off as isize);
        let neighbors = _mm_xor_si128(_mm_loadu_si128(p as *const __m128i), bias);
        let mask = _mm_cmpgt_epi8(neighbors, center);
        let bit = _mm_set1_epi8((1u8 << (k & 7)) as i8);
        accum[k >> 3] = _mm_or_si128(accum[k >> 3], _mm_and_si128(mask, bit));
    }

    let dst_ptr = dst.as_mut_ptr() as *mut __m128i;
    if desc == 1 {
        _mm_storeu_si128(dst_ptr, accum[0]);
    } else {
        _mm_storeu_si128(dst_ptr, _mm_unpacklo_epi8(accum[0], accum[1]));
        _mm_storeu_si128(dst_ptr.add(1), _mm_unpackhi_epi8(accum[0], accum[1]));
    }
}
