//! Regular strided selections (`start`, `stride`, `count` per axis, block 1)
//! over a row-major element buffer.

use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    pub start: Vec<u64>,
    pub stride: Vec<u64>,
    pub count: Vec<u64>,
}

impl Hyperslab {
    /// Contiguous one-dimensional run.
    pub fn range(start: u64, count: u64) -> Self {
        Self {
            start: vec![start],
            stride: vec![1],
            count: vec![count],
        }
    }

    pub fn num_elements(&self) -> u64 {
        self.count.iter().product()
    }

    /// Verify the selection fits inside `dims`.
    pub fn check(&self, dims: &[u64]) -> Result<(), FormatError> {
        let rank = dims.len();
        if self.start.len() != rank || self.stride.len() != rank || self.count.len() != rank {
            return Err(FormatError::Invalid(format!(
                "selection of rank {} on a rank {rank} dataspace",
                self.start.len()
            )));
        }
        for d in 0..rank {
            if self.stride[d] == 0 {
                return Err(FormatError::Invalid(format!("zero stride on axis {d}")));
            }
            if self.count[d] == 0 {
                continue;
            }
            let last = self.start[d] + (self.count[d] - 1) * self.stride[d];
            if last >= dims[d] {
                return Err(FormatError::Invalid(format!(
                    "axis {d}: element {last} outside extent {}",
                    dims[d]
                )));
            }
        }
        Ok(())
    }

    /// Element indices of the selection in row-major order.
    fn element_indices(&self, dims: &[u64]) -> Vec<usize> {
        let rank = dims.len();
        let n = self.num_elements() as usize;
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return out;
        }
        let mut row = vec![1u64; rank];
        for d in (0..rank.saturating_sub(1)).rev() {
            row[d] = row[d + 1] * dims[d + 1];
        }
        let mut idx = vec![0u64; rank];
        for _ in 0..n {
            let flat: u64 = (0..rank)
                .map(|d| (self.start[d] + idx[d] * self.stride[d]) * row[d])
                .sum();
            out.push(flat as usize);
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < self.count[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        out
    }

    /// Copy the selected elements out of `data` (shape `dims`).
    pub fn gather(&self, data: &[u8], dims: &[u64], esize: usize) -> Result<Vec<u8>, FormatError> {
        self.check(dims)?;
        let mut out = Vec::with_capacity(self.num_elements() as usize * esize);
        for i in self.element_indices(dims) {
            out.extend_from_slice(&data[i * esize..(i + 1) * esize]);
        }
        Ok(out)
    }

    /// Write `src` (packed elements) into the selected positions of `data`.
    pub fn scatter(
        &self,
        data: &mut [u8],
        dims: &[u64],
        esize: usize,
        src: &[u8],
    ) -> Result<(), FormatError> {
        self.check(dims)?;
        let expected = self.num_elements() as usize * esize;
        if src.len() != expected {
            return Err(FormatError::Invalid(format!(
                "selection needs {expected} bytes, got {}",
                src.len()
            )));
        }
        for (k, i) in self.element_indices(dims).into_iter().enumerate() {
            data[i * esize..(i + 1) * esize].copy_from_slice(&src[k * esize..(k + 1) * esize]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_1d() {
        let data: Vec<u8> = (0..10).collect();
        let sel = Hyperslab {
            start: vec![1],
            stride: vec![3],
            count: vec![3],
        };
        assert_eq!(sel.gather(&data, &[10], 1).unwrap(), vec![1, 4, 7]);
    }

    #[test]
    fn scatter_leaves_gaps() {
        let mut data = vec![9u8; 6];
        let sel = Hyperslab {
            start: vec![0],
            stride: vec![2],
            count: vec![3],
        };
        sel.scatter(&mut data, &[6], 1, &[1, 2, 3]).unwrap();
        assert_eq!(data, vec![1, 9, 2, 9, 3, 9]);
    }

    #[test]
    fn two_dimensional_block() {
        // 4x5, rows 1..3, every second column from 0
        let data: Vec<u8> = (0..20).collect();
        let sel = Hyperslab {
            start: vec![1, 0],
            stride: vec![1, 2],
            count: vec![2, 3],
        };
        assert_eq!(sel.gather(&data, &[4, 5], 1).unwrap(), vec![5, 7, 9, 10, 12, 14]);
    }

    #[test]
    fn out_of_extent() {
        let sel = Hyperslab::range(8, 3);
        assert!(sel.gather(&[0; 10], &[10], 1).is_err());
        assert!(Hyperslab::range(10, 0).check(&[10]).is_ok());
    }
}
