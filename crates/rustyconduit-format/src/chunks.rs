//! Splitting a row-major dataset buffer into fixed-size chunks and
//! reassembling it, for any rank.

use crate::error::FormatError;

fn row_strides(dims: &[u64]) -> Vec<u64> {
    let mut strides = vec![1u64; dims.len()];
    for d in (0..dims.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * dims[d + 1];
    }
    strides
}

/// Copy a box of `count` elements per axis from `src` (shape `src_dims`,
/// starting at `src_start`) into `dst` (shape `dst_dims`, at `dst_start`).
#[allow(clippy::too_many_arguments)]
pub fn copy_box(
    src: &[u8],
    src_dims: &[u64],
    src_start: &[u64],
    dst: &mut [u8],
    dst_dims: &[u64],
    dst_start: &[u64],
    count: &[u64],
    esize: usize,
) {
    let rank = count.len();
    if rank == 0 {
        dst[..esize].copy_from_slice(&src[..esize]);
        return;
    }
    if count.iter().any(|&c| c == 0) {
        return;
    }
    let ss = row_strides(src_dims);
    let ds = row_strides(dst_dims);
    let row = count[rank - 1] as usize * esize;
    let mut idx = vec![0u64; rank - 1];
    loop {
        let mut s = src_start[rank - 1];
        let mut d = dst_start[rank - 1];
        for (axis, &i) in idx.iter().enumerate() {
            s += (src_start[axis] + i) * ss[axis];
            d += (dst_start[axis] + i) * ds[axis];
        }
        let (s, d) = (s as usize * esize, d as usize * esize);
        dst[d..d + row].copy_from_slice(&src[s..s + row]);

        // odometer over the outer axes
        let mut axis = rank - 1;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            idx[axis] += 1;
            if idx[axis] < count[axis] {
                break;
            }
            idx[axis] = 0;
        }
    }
}

/// Chunk origins covering `dims`, in row-major order.
pub fn chunk_origins(dims: &[u64], chunk_dims: &[u64]) -> Vec<Vec<u64>> {
    if dims.iter().any(|&d| d == 0) {
        return Vec::new();
    }
    let grid: Vec<u64> = dims.iter().zip(chunk_dims).map(|(d, c)| d.div_ceil(*c)).collect();
    let total: u64 = grid.iter().product();
    let strides = row_strides(&grid);
    (0..total)
        .map(|n| {
            grid.iter()
                .zip(&strides)
                .zip(chunk_dims)
                .map(|((g, s), c)| (n / s % g) * c)
                .collect()
        })
        .collect()
}

fn clipped(dims: &[u64], origin: &[u64], chunk_dims: &[u64]) -> Vec<u64> {
    origin
        .iter()
        .zip(chunk_dims)
        .zip(dims)
        .map(|((o, c), d)| (*c).min(d.saturating_sub(*o)))
        .collect()
}

/// Cut `data` (shape `dims`) into full-size chunks; edge chunks are
/// zero-padded.
pub fn split(data: &[u8], dims: &[u64], chunk_dims: &[u64], esize: usize) -> Vec<(Vec<u64>, Vec<u8>)> {
    let chunk_bytes = chunk_dims.iter().product::<u64>() as usize * esize;
    let zero = vec![0u64; dims.len()];
    chunk_origins(dims, chunk_dims)
        .into_iter()
        .map(|origin| {
            let mut chunk = vec![0u8; chunk_bytes];
            let count = clipped(dims, &origin, chunk_dims);
            copy_box(data, dims, &origin, &mut chunk, chunk_dims, &zero, &count, esize);
            (origin, chunk)
        })
        .collect()
}

/// Place decoded chunks into a zero-filled buffer of shape `dims`.
pub fn assemble<'a>(
    dims: &[u64],
    chunk_dims: &[u64],
    esize: usize,
    chunks: impl IntoIterator<Item = (&'a [u64], Vec<u8>)>,
) -> Result<Vec<u8>, FormatError> {
    let total = dims.iter().product::<u64>() as usize * esize;
    let chunk_bytes = chunk_dims.iter().product::<u64>() as usize * esize;
    let mut out = vec![0u8; total];
    let zero = vec![0u64; dims.len()];
    for (origin, bytes) in chunks {
        if origin.iter().zip(dims).any(|(o, d)| o >= d) {
            continue; // left behind by a shrink
        }
        if bytes.len() < chunk_bytes {
            return Err(FormatError::Invalid(format!(
                "chunk at {origin:?} decoded to {} bytes, expected {chunk_bytes}",
                bytes.len()
            )));
        }
        let count = clipped(dims, origin, chunk_dims);
        copy_box(&bytes, chunk_dims, &zero, &mut out, dims, origin, &count, esize);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_dimensional_split_pads_last_chunk() {
        let data: Vec<u8> = (1..=10).collect();
        let chunks = split(&data, &[10], &[4], 1);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].0, vec![8]);
        assert_eq!(chunks[2].1, vec![9, 10, 0, 0]);
    }

    #[test]
    fn two_dimensional_round_trip() {
        let dims = [5u64, 7];
        let data: Vec<u8> = (0..35).collect();
        let chunks = split(&data, &dims, &[2, 3], 1);
        assert_eq!(chunks.len(), 9);
        let back = assemble(&dims, &[2, 3], 1, chunks.iter().map(|(o, b)| (o.as_slice(), b.clone()))).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn copy_box_with_wide_elements() {
        // 3x3 of u16, copy the 2x2 lower-right corner
        let src: Vec<u8> = (0..9u16).flat_map(|v| v.to_le_bytes()).collect();
        let mut dst = vec![0u8; 8];
        copy_box(&src, &[3, 3], &[1, 1], &mut dst, &[2, 2], &[0, 0], &[2, 2], 2);
        let vals: Vec<u16> = dst.chunks(2).map(|b| u16::from_le_bytes([b[0], b[1]])).collect();
        assert_eq!(vals, vec![4, 5, 7, 8]);
    }

    #[test]
    fn empty_extent_has_no_chunks() {
        assert!(split(&[], &[0], &[16], 4).is_empty());
        assert!(assemble(&[0], &[16], 4, Vec::new()).unwrap().is_empty());
    }
}
