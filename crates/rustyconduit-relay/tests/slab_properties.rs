//! Window reads and writes agree with plain index arithmetic.

use proptest::prelude::*;
use rustyconduit::Node;
use rustyconduit_relay::{Hdf5File, SlabOptions, SlabParams};

fn store() -> (tempfile::TempDir, Hdf5File) {
    let dir = tempfile::tempdir().unwrap();
    let f = Hdf5File::create(dir.path().join("p.h5")).unwrap();
    (dir, f)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn window_reads_match_step_by(
        values in prop::collection::vec(any::<i32>(), 1..40),
        offset_frac in 0.0f64..1.0,
        stride in 1u64..6,
    ) {
        let offset = (offset_frac * values.len() as f64) as u64;
        let (_dir, mut f) = store();
        let mut n = Node::new();
        n.set_slice(&values);
        f.write(&n, "d").unwrap();

        let opts = SlabOptions::new().offset(offset).stride(stride);
        let got = f.read_with_options("d", &opts).unwrap().values::<i32>().unwrap();
        let want: Vec<i32> = values.iter().copied().skip(offset as usize).step_by(stride as usize).collect();
        prop_assert_eq!(&got, &want);

        let params = SlabParams::resolve(&opts, &[values.len() as u64]).unwrap();
        prop_assert_eq!(params.readcount, want.len() as u64);
    }

    #[test]
    fn window_writes_touch_only_their_positions(
        base in prop::collection::vec(any::<i16>(), 1..12),
        update in prop::collection::vec(any::<i16>(), 1..6),
        offset in 0u64..16,
        stride in 1u64..4,
    ) {
        // a plain write must match the fixed extent exactly
        prop_assume!(offset > 0 || stride > 1 || update.len() == base.len());
        let (_dir, mut f) = store();
        let mut n = Node::new();
        n.set_slice(&base);
        f.write(&n, "d").unwrap();
        n.set_slice(&update);
        f.write_with_options(&n, "d", &SlabOptions::new().offset(offset).stride(stride)).unwrap();

        let end = offset as usize + (update.len() - 1) * stride as usize + 1;
        let mut want = base.clone();
        if want.len() < end {
            want.resize(end, 0);
        }
        for (i, v) in update.iter().enumerate() {
            want[offset as usize + i * stride as usize] = *v;
        }
        let got = f.read("d").unwrap().values::<i16>().unwrap();
        prop_assert_eq!(got, want);
    }
}
