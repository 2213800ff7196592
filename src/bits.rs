//! Bit-level helpers shared by the decoders.
//!
//! The replication tables follow zune-bmp 0.5.2 by Caleb Etemesi
//! (MIT/Apache-2.0/Zlib), as does the chunked unpacking loop.

#![cfg_attr(not(all(feature = "bmp", feature = "tiff")), allow(dead_code))]

/// Unpack a 1-bit-per-pixel row, most significant bit first, into one
/// byte per pixel: `set` for 1 bits, `clear` for 0 bits.
///
/// Exactly `out.len()` pixels are produced; a partial final byte only
/// contributes its leading bits.
pub(crate) fn unpack_bits_msb(input: &[u8], out: &mut [u8], set: u8, clear: u8) {
    let pick = |bit: u8| if bit != 0 { set } else { clear };

    let mut in_iter = input.iter();
    let mut out_iter = out.chunks_exact_mut(8);

    (&mut out_iter)
        .zip(&mut in_iter)
        .for_each(|(out_vals, &in_val)| {
            for (pos, out_val) in out_vals.iter_mut().enumerate() {
                *out_val = pick((in_val >> (7 - pos)) & 0x01);
            }
        });

    if let Some(&in_val) = in_iter.next() {
        for (pos, out_val) in out_iter.into_remainder().iter_mut().enumerate() {
            *out_val = pick((in_val >> (7 - pos)) & 0x01);
        }
    }
}

/// Multipliers that replicate an N-bit value across 8 bits.
const MUL_TABLE: [u32; 9] = [
    0,    // 0 bits
    0xff, // 1 bit:  0b11111111
    0x55, // 2 bits: 0b01010101
    0x49, // 3 bits: 0b01001001
    0x11, // 4 bits: 0b00010001
    0x21, // 5 bits: 0b00100001
    0x41, // 6 bits: 0b01000001
    0x81, // 7 bits: 0b10000001
    0x01, // 8 bits: 0b00000001
];

const SHIFT_TABLE: [u32; 9] = [0, 0, 0, 1, 0, 2, 4, 6, 0];

/// Scale an already-extracted `bits`-wide field to 0..=255.
pub(crate) fn scale_to_eight(value: u32, bits: u32) -> u8 {
    let bits = bits.clamp(0, 8) as usize;
    let mask = (1u32 << bits) - 1;
    ((value & mask).wrapping_mul(MUL_TABLE[bits]) >> SHIFT_TABLE[bits]) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_partial_final_byte() {
        let mut out = [0u8; 10];
        unpack_bits_msb(&[0b1010_0001, 0b1100_0000], &mut out, 255, 0);
        assert_eq!(out, [255, 0, 255, 0, 0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn unpack_with_inverted_polarity() {
        let mut out = [0u8; 3];
        unpack_bits_msb(&[0b0110_0000], &mut out, 0, 9);
        assert_eq!(out, [9, 0, 0]);
    }

    #[test]
    fn five_and_six_bit_fields_reach_full_scale() {
        assert_eq!(scale_to_eight(0x1f, 5), 255);
        assert_eq!(scale_to_eight(0x3f, 6), 255);
        assert_eq!(scale_to_eight(0, 5), 0);
        assert_eq!(scale_to_eight(0x10, 5), 132);
    }
}
