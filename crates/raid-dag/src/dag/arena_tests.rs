use crate::dag::Arena;
use crate::error::DagError;

#[test]
fn alloc_zeroed_and_alloc_from_track_bytes() {
    let mut arena = Arena::new(None);
    let a = arena.alloc_zeroed(16).unwrap();
    let b = arena.alloc_from(&[1, 2, 3]).unwrap();

    assert_ne!(a, b);
    assert_eq!(arena.get(a), &[0u8; 16]);
    assert_eq!(arena.get(b), &[1, 2, 3]);
    assert_eq!(arena.len(), 2);
    assert_eq!(arena.allocated_bytes(), 19);
}

#[test]
fn limit_rejects_allocation_past_budget() {
    let mut arena = Arena::new(Some(32));
    arena.alloc_zeroed(24).unwrap();
    let err = arena.alloc_zeroed(16).unwrap_err();
    assert_eq!(
        err,
        DagError::OutOfMemory {
            requested: 16,
            allocated: 24
        }
    );
    assert_eq!(arena.len(), 1, "failed allocation must not leave a buffer");
    arena.alloc_zeroed(8).unwrap();
}

#[test]
fn take_and_restore_keep_contents() {
    let mut arena = Arena::new(None);
    let id = arena.alloc_from(&[7; 4]).unwrap();
    let mut buf = arena.take(id);
    buf[0] = 9;
    arena.restore(id, buf);
    assert_eq!(arena.get(id), &[9, 7, 7, 7]);

    arena.get_mut(id)[3] = 1;
    assert_eq!(arena.get(id), &[9, 7, 7, 1]);
}
