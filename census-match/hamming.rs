//! Population count and summed Hamming distance (SHD) primitives.
//!
//! SHD between two census descriptors is the total number of differing bits
//! over a sampling pattern of byte offsets into the packed descriptor image.
//! Two granularities exist, selected by the census image's pixel step: the
//! 2-byte path reads one u16 per pattern entry, the 1-byte path reads one u32
//! per four entries.

use census_core::{Feature, Image};

/// Set-bit counts for every 4-bit value.
static NIBBLE_POPCOUNT: [u8; 16] = [0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4];

/// Bit-parallel population count (the classic magic-constant reduction).
#[inline]
pub fn popcount_swar(v: u32) -> u32 {
    const M1: u32 = 0x5555_5555;
    const M2: u32 = 0x3333_3333;
    const M4: u32 = 0x0F0F_0F0F;
    const M8: u32 = 0x00FF_00FF;
    const M16: u32 = 0x0000_FFFF;

    let mut r = v - ((v >> 1) & M1);
    r = ((r >> 2) & M2) + (r & M2);
    r = ((r >> 4) + r) & M4;
    r = ((r >> 8) + r) & M8;
    r = ((r >> 16) + r) & M16;
    r
}

/// Table-driven population count over 4-bit groups. Agrees with
/// [`popcount_swar`] for every input; the pair is cross-checked in tests.
#[inline]
pub fn popcount_nibble(v: u32) -> u32 {
    let mut total = 0u32;
    let mut v = v;
    for _ in 0..8 {
        total += NIBBLE_POPCOUNT[(v & 0xF) as usize] as u32;
        v >>= 4;
    }
    total
}

/// SHD between the descriptors at `kp1` in `census1` and `kp2` in `census2`.
///
/// `pattern` holds byte offsets into the packed descriptor image; `px_step`
/// is the census images' descriptor width and selects the sampling
/// granularity. Callers validate `px_step` at configuration time; anything
/// other than 2 takes the 1-byte path.
#[inline]
pub fn summed_hamming_dist(
    census1: &Image,
    census2: &Image,
    kp1: &Feature,
    kp2: &Feature,
    pattern: &[i32],
    px_step: i32,
) -> u32 {
    if px_step == 2 {
        shd_2b(census1, census2, kp1, kp2, pattern)
    } else {
        shd_1b(census1, census2, kp1, kp2, pattern)
    }
}

/// 2-byte granularity: each pattern entry addresses one 16-bit descriptor.
fn shd_2b(census1: &Image, census2: &Image, kp1: &Feature, kp2: &Feature, pattern: &[i32]) -> u32 {
    let d1 = census1.data();
    let d2 = census2.data();
    let base1 = census1.offset(kp1.y, kp1.x) as isize;
    let base2 = census2.offset(kp2.y, kp2.x) as isize;

    let mut total = 0;
    for &off in pattern {
        let o1 = (base1 + off as isize) as usize;
        let o2 = (base2 + off as isize) as usize;
        let l = (d1[o1] as u32) << 8 | d1[o1 + 1] as u32;
        let r = (d2[o2] as u32) << 8 | d2[o2 + 1] as u32;
        total += popcount_swar(l ^ r);
    }
    total
}

/// 1-byte granularity: four pattern entries are gathered into one 32-bit
/// quantity per unrolled step. Pattern length is a multiple of 4, enforced at
/// configuration.
fn shd_1b(census1: &Image, census2: &Image, kp1: &Feature, kp2: &Feature, pattern: &[i32]) -> u32 {
    let d1 = census1.data();
    let d2 = census2.data();
    let base1 = census1.offset(kp1.y, kp1.x) as isize;
    let base2 = census2.offset(kp2.y, kp2.x) as isize;

    let gather = |d: &[u8], base: isize, offs: &[i32]| -> u32 {
        (d[(base + offs[0] as isize) as usize] as u32) << 24
            | (d[(base + offs[1] as isize) as usize] as u32) << 16
            | (d[(base + offs[2] as isize) as usize] as u32) << 8
            | d[(base + offs[3] as isize) as usize] as u32
    };

    let mut total = 0;
    for offs in pattern.chunks_exact(4) {
        let l = gather(d1, base1, offs);
        let r = gather(d2, base2, offs);
        total += popcount_swar(l ^ r);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_core::Pt;

    #[test]
    fn test_popcount_known_values() {
        for popcount in [popcount_swar, popcount_nibble] {
            assert_eq!(popcount(0), 0);
            assert_eq!(popcount(1), 1);
            assert_eq!(popcount(0xFFFF_FFFF), 32);
            assert_eq!(popcount(0x8000_0001), 2);
            assert_eq!(popcount(0x5555_5555), 16);
            assert_eq!(popcount(0xFFFF), 16);
        }
    }

    #[test]
    fn test_popcount_variants_agree_on_all_u16() {
        for v in 0..=u16::MAX as u32 {
            assert_eq!(popcount_swar(v), popcount_nibble(v), "v = {:#x}", v);
            assert_eq!(popcount_swar(v), v.count_ones());
        }
    }

    fn lcg_census(rows: i32, cols: i32, px_step: i32, mut seed: u32) -> Image<'static> {
        let mut im = Image::alloc(rows, cols, px_step, Pt::default()).unwrap();
        let data = im.data_mut().unwrap();
        for b in data.iter_mut() {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            *b = (seed >> 24) as u8;
        }
        im
    }

    #[test]
    fn test_shd_zero_for_identical_descriptors() {
        let c = lcg_census(16, 16, 2, 3);
        let kp = Feature::new(8, 8, 1);
        let pattern = vec![0, 2, -2, c.stride, -c.stride];
        assert_eq!(summed_hamming_dist(&c, &c, &kp, &kp, &pattern, 2), 0);
    }

    #[test]
    fn test_shd_symmetry_2b() {
        let c1 = lcg_census(16, 16, 2, 17);
        let c2 = lcg_census(16, 16, 2, 91);
        let kp1 = Feature::new(8, 7, 1);
        let kp2 = Feature::new(6, 9, 1);
        let s = c1.stride;
        let pattern = vec![0, 2, -2, s, -s, s + 2, -s - 2, s - 2];
        let ab = summed_hamming_dist(&c1, &c2, &kp1, &kp2, &pattern, 2);
        let ba = summed_hamming_dist(&c2, &c1, &kp2, &kp1, &pattern, 2);
        assert_eq!(ab, ba);
        assert!(ab > 0);
    }

    #[test]
    fn test_shd_symmetry_1b() {
        let c1 = lcg_census(16, 32, 1, 5);
        let c2 = lcg_census(16, 32, 1, 23);
        let kp1 = Feature::new(16, 8, 1);
        let kp2 = Feature::new(12, 6, 1);
        let s = c1.stride;
        let pattern = vec![0, 1, -1, s, -s, s + 1, -s - 1, 2];
        let ab = summed_hamming_dist(&c1, &c2, &kp1, &kp2, &pattern, 1);
        let ba = summed_hamming_dist(&c2, &c1, &kp2, &kp1, &pattern, 1);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_shd_counts_single_flipped_bit() {
        let mut c1 = lcg_census(16, 16, 2, 42);
        let c2 = c1.clone();
        let kp = Feature::new(8, 8, 1);
        // Flip one bit in the descriptor the pattern's first entry addresses
        let o = c1.offset(8, 8);
        c1.data_mut().unwrap()[o] ^= 0x10;
        let pattern = vec![0];
        assert_eq!(summed_hamming_dist(&c1, &c2, &kp, &kp, &pattern, 2), 1);
    }
}
