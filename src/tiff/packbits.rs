//! PackBits run-length decoding (TIFF compression 32773).

/// Longest encoding of `decoded` bytes a conforming writer produces: all
/// literals, one header per 128 bytes.
pub(crate) fn max_packed_len(decoded: usize) -> usize {
    decoded + decoded.div_ceil(128)
}

/// Decode `input` into `out`, stopping when either runs out.
///
/// Returns the number of bytes written. A run that would overflow `out` is
/// truncated.
pub(crate) fn unpack(input: &[u8], out: &mut [u8]) -> usize {
    let mut src = 0;
    let mut dst = 0;
    while src < input.len() && dst < out.len() {
        let header = input[src] as i8;
        src += 1;
        match header {
            0..=127 => {
                let len = (header as usize + 1)
                    .min(input.len() - src)
                    .min(out.len() - dst);
                out[dst..dst + len].copy_from_slice(&input[src..src + len]);
                src += header as usize + 1;
                dst += len;
            }
            -128 => {}
            _ => {
                let Some(&value) = input.get(src) else {
                    break;
                };
                src += 1;
                let len = (1 - isize::from(header)) as usize;
                let len = len.min(out.len() - dst);
                out[dst..dst + len].fill(value);
                dst += len;
            }
        }
    }
    dst
}
