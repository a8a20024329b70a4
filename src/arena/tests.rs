use alloc::vec::Vec;
use core::ptr::NonNull;

use crate::raw::{self, WORD};

use super::{Arena, ArenaAllocError};

fn payload<'a>(ptr: NonNull<[u8]>) -> &'a mut [u8] {
    unsafe { core::slice::from_raw_parts_mut(ptr.cast::<u8>().as_ptr(), ptr.len()) }
}

#[test]
fn create_rounds_to_power_of_two() {
    let arena = Arena::try_create(40, 2).unwrap();
    assert_eq!(arena.size(), 64);
    assert_eq!(arena.nodes(), 1);
    assert_eq!(arena.max_nodes(), 2);
    assert_eq!(arena.size_used(), 0);

    assert!(Arena::try_create(0, 2).is_err());
    assert!(Arena::try_create(64, 0).is_err());
}

#[test]
fn bump_and_chain() {
    // 64-byte nodes, two of them. Each 40-byte allocation costs
    // header(8) + 40 = 48 bytes, so the second one spawns a node and the
    // third hits the cap.
    let mut arena = Arena::try_create(64, 2).unwrap();

    let p1 = arena.try_alloc(40).unwrap();
    assert_eq!(arena.nodes(), 1);
    assert_eq!(arena.size_used(), 48);

    let p2 = arena.try_alloc(40).unwrap();
    assert_eq!(arena.nodes(), 2, "full head must spawn a second node");
    assert_ne!(p1.cast::<u8>(), p2.cast::<u8>());

    assert!(matches!(
        arena.try_alloc(40),
        Err(ArenaAllocError::OutOfNodes)
    ));
}

#[test]
fn header_records_request() {
    let mut arena = Arena::try_create(4096, 1).unwrap();
    for n in [1usize, 7, 40, 100] {
        let p = arena.try_alloc(n).unwrap();
        assert_eq!(p.len(), n);
        assert_eq!(unsafe { raw::read_header(p.cast::<u8>().as_ptr()) }, n);
    }
}

#[test]
fn zero_alloc_rejected() {
    let mut arena = Arena::try_create(64, 1).unwrap();
    assert!(matches!(
        arena.try_alloc(0),
        Err(ArenaAllocError::InvalidSize)
    ));
}

#[test]
fn oversized_request_rejected() {
    let mut arena = Arena::try_create(64, 4).unwrap();
    // header + 57 > 64 can never fit, and must not grow the chain
    assert!(matches!(
        arena.try_alloc(57),
        Err(ArenaAllocError::RequestTooLarge)
    ));
    assert_eq!(arena.nodes(), 1);

    // header + 56 fills a node exactly
    assert!(arena.try_alloc(56).is_ok());
    assert_eq!(arena.size_used(), 64);
}

#[test]
fn realloc_copies_and_zero_fills() {
    let mut arena = Arena::try_create(4096, 1).unwrap();

    let old = arena.try_alloc(16).unwrap();
    for (i, byte) in payload(old).iter_mut().enumerate() {
        *byte = i as u8 + 1;
    }

    let new = unsafe { arena.try_realloc(old.cast::<u8>(), 40) }.unwrap();
    let bytes = payload(new);
    for (i, byte) in bytes[..16].iter().enumerate() {
        assert_eq!(*byte, i as u8 + 1, "old contents must survive the move");
    }
    assert!(
        bytes[16..].iter().all(|&b| b == 0),
        "grown tail must read as zero"
    );
}

#[test]
fn realloc_shrink_copies_prefix() {
    let mut arena = Arena::try_create(4096, 1).unwrap();

    let old = arena.try_alloc(40).unwrap();
    for (i, byte) in payload(old).iter_mut().enumerate() {
        *byte = i as u8;
    }

    let new = unsafe { arena.try_realloc(old.cast::<u8>(), 16) }.unwrap();
    assert_eq!(new.len(), 16);
    for (i, byte) in payload(new).iter().enumerate() {
        assert_eq!(*byte, i as u8);
    }
}

#[test]
fn realloc_rejects_foreign_pointer() {
    let mut a = Arena::try_create(4096, 1).unwrap();
    let mut b = Arena::try_create(4096, 1).unwrap();

    let p = a.try_alloc(16).unwrap();
    assert!(matches!(
        unsafe { b.try_realloc(p.cast::<u8>(), 32) },
        Err(ArenaAllocError::ForeignPointer)
    ));
}

#[test]
fn realloc_rejects_chained_node_pointer() {
    // Validation only ranges over the head node, so a pointer that landed
    // in the second node is treated as foreign.
    let mut arena = Arena::try_create(64, 2).unwrap();

    let head_ptr = arena.try_alloc(40).unwrap();
    let chained_ptr = arena.try_alloc(40).unwrap();
    assert_eq!(arena.nodes(), 2);

    assert!(matches!(
        unsafe { arena.try_realloc(chained_ptr.cast::<u8>(), 8) },
        Err(ArenaAllocError::ForeignPointer)
    ));
    assert!(unsafe { arena.try_realloc(head_ptr.cast::<u8>(), 8) }.is_ok());
}

#[test]
fn reset_rewinds_and_zeroes() {
    let mut arena = Arena::try_create(4096, 1).unwrap();

    let p = arena.try_alloc(40).unwrap();
    payload(p).fill(0xAB);
    assert_eq!(arena.size_used(), 48);

    arena.reset();
    assert_eq!(arena.size_used(), 0);

    let q = arena.try_alloc(40).unwrap();
    assert_eq!(
        p.cast::<u8>(),
        q.cast::<u8>(),
        "reset must rewind to the buffer base"
    );
    assert!(payload(q).iter().all(|&b| b == 0));
}

#[test]
fn reset_replays_identical_pointer_sequence() {
    let mut arena = Arena::try_create(1024, 1).unwrap();
    let sizes = [5usize, 17, 40, 3, 128];

    let first: Vec<usize> = sizes
        .iter()
        .map(|&n| arena.try_alloc(n).unwrap().cast::<u8>().as_ptr() as usize)
        .collect();

    arena.reset();

    let second: Vec<usize> = sizes
        .iter()
        .map(|&n| arena.try_alloc(n).unwrap().cast::<u8>().as_ptr() as usize)
        .collect();

    assert_eq!(first, second);
}

#[test]
fn entries_pack_without_padding() {
    let mut arena = Arena::try_create(1024, 1).unwrap();

    let p1 = arena.try_alloc(3).unwrap();
    let p2 = arena.try_alloc(5).unwrap();
    let gap = p2.cast::<u8>().as_ptr() as usize - p1.cast::<u8>().as_ptr() as usize;
    assert_eq!(gap, 3 + WORD, "next entry starts right after the previous");
}
