use rustyconduit_format::message::MessageType;
use rustyconduit_format::object_header::ObjectHeader;
use rustyconduit_format::superblock::{find_signature, Superblock};
use rustyconduit_format::{
    Attribute, ByteOrder, CodecRegistry, Dataset, Dataspace, Datatype, FileImage, FilterSpec,
    Group, Hyperslab, Object, StorageLayout, UNLIMITED,
};

// ============================================================
// Helpers
// ============================================================

fn f64_be() -> Datatype {
    Datatype::FloatingPoint {
        size: 8,
        byte_order: ByteOrder::BigEndian,
    }
}

fn u16_le() -> Datatype {
    Datatype::FixedPoint {
        size: 2,
        byte_order: ByteOrder::LittleEndian,
        signed: false,
    }
}

fn reload(image: &FileImage) -> FileImage {
    let codecs = CodecRegistry::new();
    let bytes = image.to_bytes(&codecs).expect("encode");
    FileImage::parse(&bytes, &codecs).expect("parse")
}

// ============================================================
// Files on disk
// ============================================================

#[test]
fn write_to_disk_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.h5");
    let codecs = CodecRegistry::new();

    let mut image = FileImage::new();
    let root = image.root();
    let data: Vec<u8> = [1.5f64, -2.25].iter().flat_map(|v| v.to_be_bytes()).collect();
    let ds = Dataset::new(f64_be(), Dataspace::simple(vec![2]), StorageLayout::Compact, data.clone()).unwrap();
    image.add_child(root, "x", Object::Dataset(ds)).unwrap();
    std::fs::write(&path, image.to_bytes(&codecs).unwrap()).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let offset = find_signature(&bytes).expect("signature not found");
    assert_eq!(offset, 0);
    let sb = Superblock::parse(&bytes, offset).expect("superblock");
    assert_eq!(sb.eof_address, bytes.len() as u64);

    let hdr = ObjectHeader::parse(&bytes, sb.root_group_address as usize, sb.offset_size, sb.length_size)
        .expect("root header");
    assert!(hdr.first(MessageType::LinkInfo).is_some());
    assert_eq!(hdr.all(MessageType::Link).count(), 1);

    let back = FileImage::parse(&bytes, &codecs).unwrap();
    let x = back.dataset(back.resolve(back.root(), "x").unwrap()).unwrap();
    assert_eq!(x.datatype, f64_be());
    assert_eq!(x.data(), data.as_slice());
}

#[test]
fn garbage_is_rejected() {
    let codecs = CodecRegistry::new();
    assert!(FileImage::parse(b"definitely not hdf5", &codecs).is_err());

    let mut bytes = FileImage::new().to_bytes(&codecs).unwrap();
    bytes[20] ^= 0xff;
    assert!(FileImage::parse(&bytes, &codecs).is_err());
}

// ============================================================
// Chunked storage
// ============================================================

#[test]
fn two_dimensional_edge_chunks() {
    let mut image = FileImage::new();
    let root = image.root();
    let values: Vec<u16> = (0..7 * 5).collect();
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let ds = Dataset::new(
        u16_le(),
        Dataspace::simple(vec![7, 5]),
        StorageLayout::Chunked { chunk_dims: vec![3, 2] },
        raw.clone(),
    )
    .unwrap();
    image.add_child(root, "grid", Object::Dataset(ds)).unwrap();

    let back = reload(&image);
    let grid = back.dataset(back.resolve(back.root(), "grid").unwrap()).unwrap();
    assert_eq!(grid.data(), raw.as_slice());

    let column = Hyperslab {
        start: vec![0, 4],
        stride: vec![1, 1],
        count: vec![7, 1],
    };
    let got: Vec<u16> = grid
        .read_selection(&column)
        .unwrap()
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(got, vec![4, 9, 14, 19, 24, 29, 34]);
}

#[test]
fn many_chunks_need_an_internal_btree_level() {
    let mut image = FileImage::new();
    let root = image.root();
    let n = 300u64;
    let raw: Vec<u8> = (0..n as u16).flat_map(|v| v.to_le_bytes()).collect();
    let ds = Dataset::new(
        u16_le(),
        Dataspace::Simple {
            dims: vec![n],
            max_dims: Some(vec![UNLIMITED]),
        },
        StorageLayout::Chunked { chunk_dims: vec![2] },
        raw.clone(),
    )
    .unwrap()
    .with_filters(vec![FilterSpec::deflate(1)]);
    image.add_child(root, "long", Object::Dataset(ds)).unwrap();

    let back = reload(&image);
    let long = back.dataset(back.resolve(back.root(), "long").unwrap()).unwrap();
    assert!(long.is_extendible());
    assert_eq!(long.data(), raw.as_slice());
}

#[test]
fn extent_growth_survives_reload() {
    let mut image = FileImage::new();
    let root = image.root();
    let ds = Dataset::new(
        u16_le(),
        Dataspace::extendible(3),
        StorageLayout::Chunked { chunk_dims: vec![4] },
        vec![1, 0, 2, 0, 3, 0],
    )
    .unwrap();
    let id = image.add_child(root, "grow", Object::Dataset(ds)).unwrap();
    {
        let ds = image.dataset_mut(id).unwrap();
        ds.set_extent(&[6]).unwrap();
        ds.write_selection(&Hyperslab::range(4, 2), &[5, 0, 6, 0]).unwrap();
    }

    let back = reload(&image);
    let grow = back.dataset(back.resolve(back.root(), "grow").unwrap()).unwrap();
    assert_eq!(grow.shape(), vec![6]);
    assert_eq!(grow.data(), &[1, 0, 2, 0, 3, 0, 0, 0, 5, 0, 6, 0]);
}

// ============================================================
// Groups, attributes and cycles
// ============================================================

#[test]
fn attributes_and_empty_datasets_round_trip() {
    let mut image = FileImage::new();
    let root = image.root();
    let mut list = Group::new();
    list.set_attribute(Attribute::scalar_i32("marker", 1));
    let list = image.add_child(root, "list", Object::Group(list)).unwrap();
    let empty = Dataset::new(
        Datatype::Opaque {
            size: 1,
            tag: "empty".into(),
        },
        Dataspace::Null,
        StorageLayout::Compact,
        Vec::new(),
    )
    .unwrap();
    image.add_child(list, "0", Object::Dataset(empty)).unwrap();

    let back = reload(&image);
    let list = back.resolve(back.root(), "list").unwrap();
    let group = back.group(list).unwrap();
    assert_eq!(group.attribute("marker").map(|a| a.data.clone()), Some(1i32.to_le_bytes().to_vec()));
    let empty = back.dataset(back.resolve(list, "0").unwrap()).unwrap();
    assert_eq!(empty.dataspace, Dataspace::Null);
    assert!(empty.data().is_empty());
}

#[test]
fn self_referencing_group_round_trips() {
    let mut image = FileImage::new();
    let root = image.root();
    let a = image.add_child(root, "a", Object::Group(Group::new())).unwrap();
    image.group_mut(a).unwrap().add_link("self", a).unwrap();

    let back = reload(&image);
    let a = back.resolve(back.root(), "a").unwrap();
    assert_eq!(back.resolve(a, "self/self/self"), Some(a));
}
