//! Jenkins lookup3 `hashlittle`, the checksum HDF5 puts on v2 metadata.

/// One lookup3 mixing round: `x -= z; x ^= rot(z, r); z += y` over rotating roles.
fn mix(s: &mut [u32; 3]) {
    const STEPS: [(usize, usize, usize, u32); 6] = [
        (0, 1, 2, 4),
        (1, 2, 0, 6),
        (2, 0, 1, 8),
        (0, 1, 2, 16),
        (1, 2, 0, 19),
        (2, 0, 1, 4),
    ];
    for (x, y, z, r) in STEPS {
        s[x] = s[x].wrapping_sub(s[z]) ^ s[z].rotate_left(r);
        s[z] = s[z].wrapping_add(s[y]);
    }
}

fn final_mix(s: &mut [u32; 3]) {
    const STEPS: [(usize, usize, u32); 7] = [
        (2, 1, 14),
        (0, 2, 11),
        (1, 0, 25),
        (2, 1, 16),
        (0, 2, 4),
        (1, 0, 14),
        (2, 1, 24),
    ];
    for (x, y, r) in STEPS {
        s[x] = (s[x] ^ s[y]).wrapping_sub(s[y].rotate_left(r));
    }
}

fn add_block(s: &mut [u32; 3], block: &[u8; 12]) {
    for (i, word) in block.chunks_exact(4).enumerate() {
        let w = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        s[i] = s[i].wrapping_add(w);
    }
}

/// Checksum of `data` with an initial value of zero.
pub fn jenkins_lookup3(data: &[u8]) -> u32 {
    let init = 0xdead_beef_u32.wrapping_add(data.len() as u32);
    let mut s = [init; 3];

    let mut rest = data;
    while rest.len() > 12 {
        let mut block = [0u8; 12];
        block.copy_from_slice(&rest[..12]);
        add_block(&mut s, &block);
        mix(&mut s);
        rest = &rest[12..];
    }
    if rest.is_empty() {
        return s[2];
    }
    // tail bytes land at the same positions a zero-padded block would give
    let mut block = [0u8; 12];
    block[..rest.len()].copy_from_slice(rest);
    add_block(&mut s, &block);
    final_mix(&mut s);
    s[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(jenkins_lookup3(&[]), 0xdeadbeef);
    }

    #[test]
    fn reference_vector() {
        // hashlittle("Four score and seven years ago", 30, 0) from lookup3.c
        assert_eq!(
            jenkins_lookup3(b"Four score and seven years ago"),
            0x17770551
        );
    }

    #[test]
    fn sensitive_to_every_byte() {
        let base: Vec<u8> = (0..40).collect();
        let h = jenkins_lookup3(&base);
        for i in 0..base.len() {
            let mut v = base.clone();
            v[i] ^= 1;
            assert_ne!(jenkins_lookup3(&v), h, "byte {i}");
        }
    }
}
