//! Node trees through HDF5 files: round trips, windows, layout policy and
//! error reporting.

use pretty_assertions::assert_eq;
use rustyconduit::{DataType, Endianness, Node, TypeId};
use rustyconduit_relay::{
    hdf5_has_path, hdf5_read, hdf5_read_info, hdf5_remove, hdf5_save, hdf5_write, Error, Hdf5File, Hdf5Options,
    SlabOptions,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scratch(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

fn every_kind() -> Node {
    let mut n = Node::new();
    n.fetch("i8").set_slice(&[-1i8, 2, -3]);
    n.fetch("i16").set_slice(&[-300i16, 300]);
    n.fetch("i32").set(-70_000i32);
    n.fetch("i64").set_slice(&[i64::MIN, 0, i64::MAX]);
    n.fetch("u8").set_slice(&[0u8, 255]);
    n.fetch("u16").set(65_535u16);
    n.fetch("u32").set_slice(&[1u32, 2, 3, 4]);
    n.fetch("u64").set(u64::MAX);
    n.fetch("f32").set_slice(&[0.5f32, -1.25]);
    n.fetch("f64").set_slice(&[std::f64::consts::PI, f64::MIN_POSITIVE]);
    n.fetch("s").set_string("hello relay");
    n.fetch("zero").set_slice::<u32>(&[]);
    n.fetch("nothing");
    n.fetch("nested/deeper/leaf").set(1u8);
    n
}

#[test]
fn every_leaf_kind_round_trips_through_a_file() {
    let (_dir, path) = scratch("kinds.h5");
    let tree = every_kind();

    let mut f = Hdf5File::create(&path).unwrap();
    f.write(&tree, "/").unwrap();
    f.close().unwrap();

    let f = Hdf5File::open(&path, "r").unwrap();
    let back = f.read("").unwrap();
    assert_eq!(back.diff(&tree), None);
    assert_eq!(back, tree);

    let zero = back.fetch_existing("zero").unwrap();
    assert_eq!(zero.dtype().id(), TypeId::UInt32);
    assert_eq!(zero.number_of_elements(), 0);
    assert!(back.fetch_existing("nothing").unwrap().is_empty());
    assert_eq!(back.fetch_existing("s").unwrap().as_string().unwrap(), "hello relay");
}

#[test]
fn objects_keep_their_insertion_order() {
    let (_dir, path) = scratch("order.h5");
    let mut n = Node::new();
    for name in ["zeta", "alpha", "mid"] {
        n.fetch(name).set(1i32);
    }
    let mut f = Hdf5File::create(&path).unwrap();
    f.write(&n, "").unwrap();
    f.close().unwrap();

    let back = Hdf5File::open(&path, "r").unwrap().read("").unwrap();
    assert_eq!(back.child_names(), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn lists_come_back_as_lists() {
    let (_dir, path) = scratch("lists.h5");
    let mut n = Node::new();
    let list = n.fetch("items");
    list.append().set(1i32);
    list.append().set_slice(&[2.5f64, 3.5]);
    list.append().set_string("three");
    n.fetch("named/x").set(4i64);

    let mut f = Hdf5File::create(&path).unwrap();
    f.write(&n, "").unwrap();
    f.close().unwrap();

    let back = Hdf5File::open(&path, "r").unwrap().read("").unwrap();
    let items = back.fetch_existing("items").unwrap();
    assert!(items.is_list());
    assert_eq!(items.number_of_children(), 3);
    assert_eq!(items.child_at(0).unwrap().to_i64().unwrap(), 1);
    assert_eq!(items.child_at(1).unwrap().to_f64_vec().unwrap(), vec![2.5, 3.5]);
    assert_eq!(items.child_at(2).unwrap().as_string().unwrap(), "three");
    assert!(back.fetch_existing("named").unwrap().is_object());
    assert_eq!(back, n);
}

#[test]
fn offset_and_stride_writes_compose() {
    let (_dir, path) = scratch("slabs.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_slice(&[-16i16, -15]);
    f.write(&n, "d").unwrap();
    assert_eq!(f.read_info("d").unwrap().fetch_existing("extendible").unwrap().as_string().unwrap(), "false");

    n.set_slice(&[1i16, 2]);
    f.write_with_options(&n, "d", &SlabOptions::new().offset(2)).unwrap();
    assert_eq!(f.read("d").unwrap().values::<i16>().unwrap(), vec![-16, -15, 1, 2]);

    let info = f.read_info("d").unwrap();
    assert_eq!(info.fetch_existing("extendible").unwrap().as_string().unwrap(), "true");
    assert_eq!(info.fetch_existing("layout").unwrap().as_string().unwrap(), "chunked");

    f.close().unwrap();
    let mut f = Hdf5File::open(&path, "a").unwrap();

    n.set_slice(&[-1i16, -3]);
    f.write_with_options(&n, "d", &SlabOptions::new().offset(0).stride(2)).unwrap();
    assert_eq!(f.read("d").unwrap().values::<i16>().unwrap(), vec![-1, -15, -3, 2]);

    n.set_slice(&[5i16, 6]);
    f.write_with_options(&n, "d", &SlabOptions::new().offset(7)).unwrap();
    f.close().unwrap();

    let back = hdf5_read(&format!("{}:d", path.display())).unwrap();
    assert_eq!(back.values::<i16>().unwrap(), vec![-1, -15, -3, 2, 0, 0, 0, 5, 6]);
}

#[test]
fn new_datasets_can_start_at_an_offset() {
    let (_dir, path) = scratch("fresh.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_slice(&[7u64, 8]);
    f.write_with_options(&n, "g/d", &SlabOptions::new().offset(1).stride(3)).unwrap();
    assert_eq!(f.read("g/d").unwrap().values::<u64>().unwrap(), vec![0, 7, 0, 0, 8]);
}

#[test]
fn promoted_members_keep_their_place() {
    let (_dir, path) = scratch("places.h5");
    let mut tree = Node::new();
    let list = tree.fetch("items");
    list.append().set_slice(&[1i16, 2]);
    list.append().set_slice(&[3i16, 4]);
    tree.fetch("obj/a").set_slice(&[5i16, 6]);
    tree.fetch("obj/b").set_slice(&[7i16, 8]);

    let mut f = Hdf5File::create(&path).unwrap();
    f.write(&tree, "").unwrap();

    let mut tail = Node::new();
    tail.set_slice(&[9i16]);
    let at_two = SlabOptions::new().offset(2);
    f.write_with_options(&tail, "items/0", &at_two).unwrap();
    f.write_with_options(&tail, "obj/a", &at_two).unwrap();
    f.close().unwrap();

    let back = Hdf5File::open(&path, "r").unwrap().read("").unwrap();
    let items = back.fetch_existing("items").unwrap();
    assert!(items.is_list());
    assert_eq!(items.child_at(0).unwrap().values::<i16>().unwrap(), vec![1, 2, 9]);
    assert_eq!(items.child_at(1).unwrap().values::<i16>().unwrap(), vec![3, 4]);
    let names: Vec<&str> = back.fetch_existing("obj").unwrap().entries().map(|(k, _)| k).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(back.fetch_existing("obj/a").unwrap().values::<i16>().unwrap(), vec![5, 6, 9]);
}

#[test]
fn slab_writes_of_whole_lists_stay_in_order() {
    let (_dir, path) = scratch("list_slab.h5");
    let mut list = Node::new();
    list.append().set_slice(&[1u32]);
    list.append().set_slice(&[2u32]);
    list.append().set_slice(&[3u32]);
    let mut f = Hdf5File::create(&path).unwrap();
    f.write(&list, "l").unwrap();

    let mut update = Node::new();
    update.append().set_slice(&[10u32]);
    update.append().set_slice(&[20u32]);
    f.write_with_options(&update, "l", &SlabOptions::new().offset(1)).unwrap();

    let back = f.read("l").unwrap();
    let values: Vec<Vec<u32>> = back.children().map(|c| c.values::<u32>().unwrap()).collect();
    assert_eq!(values, vec![vec![1, 10], vec![2, 20], vec![3]]);
}

#[test]
fn windows_past_the_addressable_extent_are_out_of_range() {
    let (_dir, path) = scratch("huge.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_slice(&[1i16, 2]);
    f.write(&n, "d").unwrap();

    for window in [
        SlabOptions::new().offset(u64::MAX - 1),
        SlabOptions::new().offset(1).stride(u64::MAX),
        SlabOptions::new().offset(u64::MAX / 2),
    ] {
        let err = f.write_with_options(&n, "d", &window).unwrap_err();
        assert!(matches!(err, Error::OutOfRange(_)), "{err}");
        let err = f.write_with_options(&n, "fresh", &window).unwrap_err();
        assert!(matches!(err, Error::OutOfRange(_)), "{err}");
    }
    assert!(!f.has_path("fresh"));
    assert_eq!(f.read("d").unwrap().values::<i16>().unwrap(), vec![1, 2]);
    assert_eq!(f.read_info("d").unwrap().fetch_existing("extendible").unwrap().as_string().unwrap(), "false");
}

#[test]
fn zero_stride_is_rejected_without_mutation() {
    let (_dir, path) = scratch("stride.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_slice(&[1.0f32, 2.0, 3.0]);
    f.write(&n, "d").unwrap();

    let mut other = Node::new();
    other.set_slice(&[9.0f32]);
    let err = f.write_with_options(&other, "d", &SlabOptions::new().stride(0)).unwrap_err();
    assert!(matches!(err, Error::Usage(_)), "{err}");
    let err = f.write_with_options(&other, "new", &SlabOptions::new().stride(0)).unwrap_err();
    assert!(matches!(err, Error::Usage(_)), "{err}");
    assert!(!f.has_path("new"));

    let err = f.read_with_options("d", &SlabOptions::new().stride(0)).unwrap_err();
    assert!(matches!(err, Error::Usage(_)), "{err}");
    assert_eq!(f.read("d").unwrap().values::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn incompatible_writes_leave_the_file_alone() {
    let (_dir, path) = scratch("compat.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.fetch("a").set_slice(&[1i32, 2, 3]);
    n.fetch("b").set(1u8);
    f.write(&n, "").unwrap();
    let before = f.read("").unwrap();

    let mut bigger = Node::new();
    bigger.fetch("b").set(2u8);
    bigger.fetch("a").set_slice(&[1i32, 2, 3, 4]);
    let err = f.write(&bigger, "").unwrap_err();
    match &err {
        Error::IncompatibleTree(why) => {
            assert!(why.contains("compat.h5:/a"), "{why}");
            assert!(why.contains("fixed extent"), "{why}");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(f.read("").unwrap(), before);

    let mut retyped = Node::new();
    retyped.fetch("a").set_slice(&[1.0f64, 2.0, 3.0]);
    assert!(matches!(f.write(&retyped, ""), Err(Error::IncompatibleTree(_))));
    assert_eq!(f.read("").unwrap(), before);
}

#[test]
fn strings_overwrite_in_place_when_they_fit() {
    let (_dir, path) = scratch("strings.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_string("abc");
    f.write(&n, "s").unwrap();
    n.set_string("xyz");
    f.write(&n, "s").unwrap();
    assert_eq!(f.read("s").unwrap().as_string().unwrap(), "xyz");

    n.set_string("longer");
    assert!(matches!(f.write(&n, "s"), Err(Error::IncompatibleTree(_))));
    n.set_string("xyz");
    let err = f.write_with_options(&n, "s", &SlabOptions::new().offset(1)).unwrap_err();
    assert!(matches!(err, Error::Usage(_)), "{err}");
}

#[test]
fn windows_and_metadata_only_reads() {
    let (_dir, path) = scratch("window.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_slice(&(0..10).collect::<Vec<i64>>());
    f.write(&n, "d").unwrap();

    let window = SlabOptions::new().offset(2).stride(2).size(3);
    assert_eq!(f.read_with_options("d", &window).unwrap().to_i64_vec().unwrap(), vec![2, 4, 6]);

    let tail = SlabOptions::new().offset(1).stride(3);
    assert_eq!(f.read_with_options("d", &tail).unwrap().to_i64_vec().unwrap(), vec![1, 4, 7]);

    let meta = f.read_with_options("d", &tail.metadata_only()).unwrap();
    assert_eq!(meta.fetch_existing("sizes").unwrap().values::<u64>().unwrap(), vec![3]);
    assert_eq!(meta.number_of_children(), 1);
}

#[test]
fn read_errors_name_the_file_and_path_once() {
    let (_dir, path) = scratch("errors.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_slice(&[1u16, 2, 3]);
    f.write(&n, "data/x").unwrap();

    let err = f.read_with_options("data/x", &SlabOptions::new().offset(3)).unwrap_err();
    assert!(matches!(err, Error::OutOfRange(_)), "{err}");
    let msg = err.to_string();
    assert_eq!(msg.matches("data/x").count(), 1, "{msg}");
    assert!(msg.contains("errors.h5:/data/x"), "{msg}");

    let err = f.read_with_options("data/x", &SlabOptions::new().size(4)).unwrap_err();
    assert!(matches!(err, Error::OutOfRange(_)), "{err}");

    let err = f.read("data/missing").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err}");
    assert!(err.to_string().ends_with("errors.h5:/data/missing: no such object"), "{err}");

    let err = f.dataset("data").unwrap_err();
    assert!(matches!(err, Error::WrongKind { expected: "dataset", found: "group", .. }), "{err}");
}

#[test]
fn failed_lookups_leave_one_diagnostic() {
    let (_dir, path) = scratch("diag.h5");
    let f = Hdf5File::create(&path).unwrap();
    assert!(!f.has_path("nope"));
    assert!(f.diagnostics().messages().is_empty());
    assert!(f.read("nope").is_err());
    assert_eq!(f.diagnostics().messages().len(), 1);
    assert!(!f.diagnostics().is_suppressed());
}

#[test]
fn links_back_to_an_ancestor_are_skipped() {
    let (_dir, path) = scratch("cycle.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.fetch("a/x").set(1i32);
    f.write(&n, "").unwrap();
    f.link("", "a/up").unwrap();
    f.link("a/x", "a/again").unwrap();
    f.close().unwrap();

    let f = Hdf5File::open(&path, "r").unwrap();
    assert_eq!(f.child_names("a").unwrap(), vec!["x", "up", "again"]);
    let back = f.read("").unwrap();
    let a = back.fetch_existing("a").unwrap();
    assert_eq!(a.child_names(), vec!["x", "again"]);
    assert_eq!(a.fetch_existing("again").unwrap().to_i64().unwrap(), 1);

    let info = f.read_info("").unwrap();
    assert!(info.has_path("a/x/dtype"));
    assert!(!info.has_path("a/up"));
}

#[test]
fn promotion_invalidates_old_dataset_handles() {
    let (_dir, path) = scratch("handles.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut n = Node::new();
    n.set_slice(&[1i32, 2]);
    f.write(&n, "d").unwrap();
    let old = f.dataset("d").unwrap();

    let fresh = f.write_leaf_to_dataset(&n, &old, &SlabOptions::new().offset(2)).unwrap();
    assert_eq!(fresh.path(), "d");
    let err = f.write_leaf_to_dataset(&n, &old, &SlabOptions::new()).unwrap_err();
    assert!(matches!(err, Error::StaleHandle(_)), "{err}");

    f.write_leaf_to_dataset(&n, &fresh, &SlabOptions::new().offset(4)).unwrap();
    assert_eq!(f.read("d").unwrap().values::<i32>().unwrap(), vec![1, 2, 1, 2, 1, 2]);
}

#[test]
fn big_endian_leaves_read_back_in_machine_order() {
    let (_dir, path) = scratch("endian.h5");
    let dtype = DataType::new(TypeId::Int32, 2, 0, 4, 4, Endianness::Big);
    let n = Node::from_leaf_bytes(dtype, vec![0, 0, 0, 1, 0, 0, 1, 0]).unwrap();

    let mut f = Hdf5File::create(&path).unwrap();
    f.write(&n, "be").unwrap();
    f.close().unwrap();

    let f = Hdf5File::open(&path, "r").unwrap();
    let info = f.read_info("be").unwrap();
    assert_eq!(info.fetch_existing("byte_order").unwrap().as_string().unwrap(), "big");
    let back = f.read("be").unwrap();
    assert_eq!(back.values::<i32>().unwrap(), vec![1, 256]);
    assert_eq!(back.dtype().endianness(), Endianness::Default);
}

#[test]
fn layout_policy_follows_the_options() {
    let (_dir, path) = scratch("layout.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let opts: Hdf5Options = serde_json::from_str(
        r#"{
            "compact_storage": {"enabled": false},
            "chunking": {"threshold": 64, "chunk_size": 16, "compression": {"method": "gzip", "level": 6}}
        }"#,
    )
    .unwrap();
    f.set_options(opts);

    let mut n = Node::new();
    n.fetch("big").set_slice(&(0..100).map(f64::from).collect::<Vec<_>>());
    n.fetch("small").set_slice(&[1i8, 2]);
    f.write(&n, "").unwrap();
    f.close().unwrap();

    let info = hdf5_read_info(&format!("{}:", path.display())).unwrap();
    assert_eq!(info.fetch_existing("big/layout").unwrap().as_string().unwrap(), "chunked");
    assert_eq!(info.fetch_existing("big/extendible").unwrap().as_string().unwrap(), "true");
    assert_eq!(info.fetch_existing("small/layout").unwrap().as_string().unwrap(), "contiguous");
    assert_eq!(info.fetch_existing("big/dims").unwrap().values::<u64>().unwrap(), vec![100]);

    let back = hdf5_read(&format!("{}:/", path.display())).unwrap();
    assert_eq!(back, n);
}

#[test]
fn small_leaves_are_compact_by_default() {
    let (_dir, path) = scratch("compact.h5");
    let mut n = Node::new();
    n.fetch("x").set_slice(&[1.0f32; 8]);
    hdf5_save(&n, &format!("{}:", path.display())).unwrap();
    let info = hdf5_read_info(&format!("{}:x", path.display())).unwrap();
    assert_eq!(info.fetch_existing("layout").unwrap().as_string().unwrap(), "compact");
}

#[test]
fn zfp_needs_a_registered_codec() {
    let (_dir, path) = scratch("zfp.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    f.set_options(
        Hdf5Options::default()
            .without_compact_storage()
            .with_chunking(8, 64)
            .with_zfp(rustyconduit_relay::ZfpMode::Rate),
    );
    let mut n = Node::new();
    n.set_slice(&[1.0f64, 2.0, 3.0, 4.0]);
    let err = f.write(&n, "z").unwrap_err();
    assert!(matches!(err, Error::Usage(_)), "{err}");

    n.set_slice(&[1i64, 2, 3, 4]);
    f.write(&n, "ints").unwrap();
    assert_eq!(f.read("ints").unwrap().to_i64_vec().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn convenience_entry_points() {
    let (_dir, path) = scratch("conv.h5");
    let file = path.display().to_string();
    let mut n = Node::new();
    n.fetch("a").set(1i32);
    hdf5_save(&n, &format!("{file}:run/0")).unwrap();

    let mut m = Node::new();
    m.fetch("b").set(2i32);
    hdf5_write(&m, &format!("{file}:run/1")).unwrap();

    assert!(hdf5_has_path(&format!("{file}:run/0/a")).unwrap());
    assert!(hdf5_has_path(&format!("{file}:/run/1/b")).unwrap());
    assert!(!hdf5_has_path(&format!("{file}:run/2")).unwrap());

    hdf5_remove(&format!("{file}:run/0")).unwrap();
    assert!(!hdf5_has_path(&format!("{file}:run/0")).unwrap());
    assert_eq!(hdf5_read(&format!("{file}:run/1")).unwrap(), m);

    hdf5_save(&m, &format!("{file}:fresh")).unwrap();
    assert!(!hdf5_has_path(&format!("{file}:run")).unwrap());
}

#[test]
fn read_into_merges_with_an_existing_tree() {
    let (_dir, path) = scratch("merge.h5");
    let mut f = Hdf5File::create(&path).unwrap();
    let mut stored = Node::new();
    stored.fetch("a").set(1i32);
    f.write(&stored, "").unwrap();

    let mut dest = Node::new();
    dest.fetch("keep").set(9u8);
    f.read_into("", &mut dest, &SlabOptions::new()).unwrap();
    assert_eq!(dest.child_names(), vec!["keep", "a"]);
}

#[test]
fn read_only_handles_refuse_writes() {
    let (_dir, path) = scratch("ro.h5");
    Hdf5File::create(&path).unwrap().close().unwrap();
    let mut f = Hdf5File::open(&path, "r").unwrap();
    let mut n = Node::new();
    n.set(1i32);
    assert!(matches!(f.write(&n, "x"), Err(Error::Usage(_))));
    assert!(matches!(Hdf5File::open(&path, "at"), Err(Error::Usage(_))));
}
