use crate::dag::IoParam;
use crate::engine::DiskIo;
use crate::error::IoError;
use crate::layout::{PhysDiskAddr, RaidLayout, RaidLevel};
use crate::retention::FileArray;

fn layout() -> RaidLayout {
    RaidLayout::new(RaidLevel::Raid5, 4, 8, 16).unwrap()
}

#[test]
fn open_creates_one_image_per_column() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let array = FileArray::open(dir.path(), &layout(), 4).expect("open");

    assert_eq!(array.disk_len(), 4 * 128);
    for i in 0..4 {
        let path = dir.path().join(format!("disk{i}.img"));
        assert_eq!(std::fs::metadata(&path).expect("image").len(), 512);
        assert_eq!(array.disk(i).expect("disk").path(), path);
    }
    assert!(array.disk(4).is_none());
    assert!(array.failed_cols().is_empty());
}

#[test]
fn extents_persist_across_reopen() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let pda = PhysDiskAddr::new(2, 0, 9, 3);
    let data: Vec<u8> = (0..48).collect();
    {
        let mut array = FileArray::open(dir.path(), &layout(), 4).expect("open");
        array.write(&pda, &data, 1, IoParam::default()).expect("write");
        array.flush().expect("flush");
    }

    let mut array = FileArray::open(dir.path(), &layout(), 4).expect("reopen");
    let mut back = vec![0u8; 48];
    array.read(&pda, &mut back, 1, IoParam::default()).expect("read");
    assert_eq!(back, data);

    let raw = std::fs::read(dir.path().join("disk2.img")).expect("raw image");
    assert_eq!(&raw[9 * 16..12 * 16], data.as_slice());
}

#[test]
fn out_of_range_extent_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut array = FileArray::open(dir.path(), &layout(), 1).expect("open");
    let mut buf = vec![0u8; 32];
    let err = array
        .read(&PhysDiskAddr::new(0, 0, 7, 2), &mut buf, 0, IoParam::default())
        .unwrap_err();
    assert_eq!(
        err,
        IoError::OutOfRange {
            col: 0,
            start: 7,
            end: 9
        }
    );
}

#[test]
fn failed_then_replaced_disk() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut array = FileArray::open(dir.path(), &layout(), 2).expect("open");
    let pda = PhysDiskAddr::new(1, 0, 0, 1);
    array.write(&pda, &[7; 16], 0, IoParam::default()).expect("write");

    array.fail_disk(1).expect("fail");
    assert_eq!(array.failed_cols(), vec![1]);
    assert!(array.status_string().contains("disk 1: FAILED"));
    let mut buf = [0u8; 16];
    assert_eq!(
        array.read(&pda, &mut buf, 0, IoParam::default()),
        Err(IoError::DiskFailed { col: 1 })
    );

    array.replace_disk(1).expect("replace");
    assert!(array.status_string().contains("disk 1: OK"));
    array.read(&pda, &mut buf, 0, IoParam::default()).expect("read");
    assert_eq!(buf, [0; 16]);

    assert!(array.fail_disk(9).is_err());
}

#[test]
fn locking_reads_are_released_by_unlock() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut array = FileArray::open(dir.path(), &layout(), 1).expect("open");
    let pda = PhysDiskAddr::new(3, 0, 0, 8);
    let locking = IoParam::new(1, true, false, 0);
    let mut buf = vec![0u8; 128];

    array.read(&pda, &mut buf, 0, locking).expect("read");
    assert!(array.status_string().contains("disk 3: OK (locks=1"));
    array.unlock(&pda, IoParam::default()).expect("unlock");
    assert_eq!(
        array.unlock(&pda, IoParam::default()),
        Err(IoError::NotLocked { col: 3 })
    );
}
