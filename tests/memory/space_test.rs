/*!
 * Space Tests
 * Relative I/O, streams, objects, copies and read-only projections
 */

use ai_os_vmem::core::codec::{BincodeCodec, JsonCodec};
use ai_os_vmem::core::types::KB;
use ai_os_vmem::memory::{FixedMemoryAllocator, MemoryError, Space, VirtualMemory};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    id: u32,
    name: String,
    tags: Vec<String>,
}

fn record() -> Record {
    Record {
        id: 7,
        name: "sector".to_string(),
        tags: vec!["hot".to_string(), "pinned".to_string()],
    }
}

#[test]
fn test_offsets_are_relative_to_the_block() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let _pad = memory.allocate(100).unwrap();
    let space = memory.allocate(50).unwrap();
    assert_eq!(space.address(), 100);

    space.write_at(b"abc", 10).unwrap();

    let mut raw = [0u8; 3];
    memory.virtual_memory().read_at(&mut raw, 110).unwrap();
    assert_eq!(&raw, b"abc");

    let mut buf = [0u8; 3];
    assert_eq!(space.read_at(&mut buf, 10).unwrap(), 3);
    assert_eq!(&buf, b"abc");
}

#[test]
fn test_access_past_the_block_rejected() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(16).unwrap();
    let neighbour = memory.allocate(16).unwrap();
    neighbour.write(&[1u8; 16]).unwrap();

    match space.write_at(&[0u8; 8], 12) {
        Err(MemoryError::OutOfBounds { offset, length, size }) => {
            assert_eq!((offset, length, size), (12, 8, 16));
        }
        other => panic!("Expected OutOfBounds, got {:?}", other),
    }
    assert!(space.read_at(&mut [0u8; 1], 16).unwrap_err().is_bounds_violation());

    // The neighbour was not touched by the rejected write.
    let mut buf = [0u8; 16];
    neighbour.read(&mut buf).unwrap();
    assert_eq!(buf, [1u8; 16]);
}

#[test]
fn test_read_truncates_to_space_size() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(4).unwrap();
    space.write(b"wxyz").unwrap();

    let mut buf = [0u8; 10];
    assert_eq!(space.read(&mut buf).unwrap(), 4);
    assert_eq!(&buf[..4], b"wxyz");
}

#[test]
fn test_streams_are_bounded_by_the_space() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(8).unwrap();

    {
        let mut writer = space.writer().unwrap();
        writer.write_all(b"12345678").unwrap();
        let err = writer.write_all(b"9").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WriteZero);
    }

    let mut content = Vec::new();
    space.reader().unwrap().read_to_end(&mut content).unwrap();
    assert_eq!(content, b"12345678");
}

#[test]
fn test_string_round_trip() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(64).unwrap();

    space.write_string("Hello2").unwrap();
    assert_eq!(space.read_string().unwrap(), "Hello2");
}

#[test]
fn test_objects_with_both_codecs() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let binary = memory.allocate(128).unwrap();
    let json = memory.allocate(128).unwrap();

    binary.write_object(&BincodeCodec, &record()).unwrap();
    json.write_object(&JsonCodec, &record()).unwrap();

    assert_eq!(binary.read_object::<_, Record>(&BincodeCodec).unwrap(), record());
    assert_eq!(json.read_object::<_, Record>(&JsonCodec).unwrap(), record());

    let mut text = vec![0u8; 6];
    json.read(&mut text).unwrap();
    assert_eq!(&text, b"{\"id\":");
}

#[test]
fn test_object_larger_than_space_fails() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(8).unwrap();
    assert!(space.write_object(&BincodeCodec, &record()).is_err());
}

#[test]
fn test_dump_copies_every_byte() {
    let memory = FixedMemoryAllocator::allocate(64 * KB).unwrap();
    let space = memory.allocate(20 * KB).unwrap();
    let pattern: Vec<u8> = (0..20 * KB).map(|i| (i % 251) as u8).collect();
    space.write(&pattern).unwrap();

    let mut out = Vec::new();
    space.dump(&mut out).unwrap();
    assert_eq!(out, pattern);
}

#[test]
fn test_copy_is_independent() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let original = memory.allocate(32).unwrap();
    original.write(b"original").unwrap();

    let copy = original.copy().unwrap();
    assert_ne!(copy.address(), original.address());
    assert_eq!(copy.size(), original.size());

    copy.write(b"modified").unwrap();

    let mut buf = [0u8; 8];
    original.read(&mut buf).unwrap();
    assert_eq!(&buf, b"original");
    copy.read(&mut buf).unwrap();
    assert_eq!(&buf, b"modified");
}

#[test]
fn test_copy_without_room_fails() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(600).unwrap();
    assert!(space.copy().unwrap_err().is_out_of_memory());
    assert_eq!(memory.used_size(), 600);
}

#[test]
fn test_read_only_rejects_mutation() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(32).unwrap();
    let view = space.read_only();

    assert!(view.free().unwrap_err().is_write_not_allowed());
    assert!(view.write(b"x").unwrap_err().is_write_not_allowed());
    assert!(view.write_at(b"x", 1).unwrap_err().is_write_not_allowed());
    assert!(view.writer().is_err());
    assert!(view.write_string("x").unwrap_err().is_write_not_allowed());

    // The space behind the view is still allocated.
    assert!(!space.is_freed());
    assert_eq!(memory.used_size(), 32);
}

#[test]
fn test_read_only_is_a_live_view() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(64).unwrap();
    let view = space.read_only();

    space.write_string("before").unwrap();
    assert_eq!(view.read_string().unwrap(), "before");

    space.write_string("after").unwrap();
    assert_eq!(view.read_string().unwrap(), "after");
    assert_eq!(view.address(), space.address());
    assert_eq!(view.size(), space.size());

    let nested = view.read_only();
    assert!(nested.free().is_err());

    let copy = view.copy().unwrap();
    copy.write_string("writable").unwrap();
    assert_eq!(copy.read_string().unwrap(), "writable");
}

#[test]
fn test_clones_share_the_block() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(16).unwrap();
    let alias = space.clone();

    alias.free().unwrap();
    assert!(space.is_freed());
    assert_eq!(space.size(), 0);
    assert_eq!(memory.free_size(), KB);
}

#[test]
fn test_string_from_raw_bytes_is_codec_error() {
    let memory = FixedMemoryAllocator::allocate(8 * KB).unwrap();
    let space = memory.allocate(4 * KB).unwrap();
    space.write(&[0xAB; 4 * KB]).unwrap();

    assert!(matches!(space.read_string(), Err(MemoryError::Codec(_))));
    assert!(matches!(
        space.read_object::<_, Record>(&BincodeCodec),
        Err(MemoryError::Codec(_))
    ));
}

#[test]
fn test_length_prefix_beyond_space_is_codec_error() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(64).unwrap();
    space.write(&(1u64 << 40).to_le_bytes()).unwrap();

    assert!(matches!(space.read_string(), Err(MemoryError::Codec(_))));
}

#[test]
fn test_json_from_raw_bytes_is_codec_error() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(64).unwrap();
    space.write(&[0xAB; 64]).unwrap();

    assert!(matches!(
        space.read_object::<_, Record>(&JsonCodec),
        Err(MemoryError::Codec(_))
    ));
}
