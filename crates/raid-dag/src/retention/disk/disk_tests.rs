use crate::retention::disk::FileDisk;
use rand::RngCore;
use tempfile::NamedTempFile;

const DISK_LEN: u64 = 1 << 16;

#[test]
fn open_prealloc_creates_and_sizes_file() {
    let tf = NamedTempFile::new().expect("tmp file");

    let d = FileDisk::open_prealloc(tf.path(), DISK_LEN).expect("open_prealloc");
    assert_eq!(d.len(), DISK_LEN);
    assert!(d.is_operational());
    let meta = std::fs::metadata(tf.path()).expect("metadata");
    assert_eq!(meta.len(), DISK_LEN, "backing file must be pre-sized");
}

#[test]
fn initial_reads_are_zero_filled() {
    let tf = NamedTempFile::new().expect("tmp file");
    let d = FileDisk::open_prealloc(tf.path(), DISK_LEN).expect("open_prealloc");

    let mut buf = vec![0xAAu8; 4096];
    assert_eq!(d.read_at(0, &mut buf), 4096);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn write_then_reopen_and_read_back() {
    let tf = NamedTempFile::new().expect("tmp file");
    let off = DISK_LEN / 2 - 200;
    let mut data = vec![0u8; 512];
    rand::rng().fill_bytes(&mut data);

    {
        let mut d = FileDisk::open_prealloc(tf.path(), DISK_LEN).expect("open_prealloc");
        assert_eq!(d.write_at(off, &data), data.len());
        d.flush().expect("flush");
    }

    let d = FileDisk::open_prealloc(tf.path(), DISK_LEN).expect("reopen");
    let mut back = vec![0u8; data.len()];
    assert_eq!(d.read_at(off, &mut back), data.len());
    assert_eq!(back, data);
}

#[test]
fn access_past_end_is_truncated() {
    let tf = NamedTempFile::new().expect("tmp file");
    let mut d = FileDisk::open_prealloc(tf.path(), DISK_LEN).expect("open_prealloc");

    assert_eq!(d.write_at(DISK_LEN - 100, &[0x5A; 500]), 100);

    let mut buf = vec![0xCCu8; 256];
    assert_eq!(d.read_at(DISK_LEN - 128, &mut buf), 128);
    assert!(buf[..28].iter().all(|&b| b == 0));
    assert!(buf[28..128].iter().all(|&b| b == 0x5A));
    assert!(buf[128..].iter().all(|&b| b == 0xCC), "untouched tail must remain");
    assert_eq!(d.read_at(DISK_LEN, &mut buf), 0);
}

#[test]
fn failed_disk_is_renamed_and_unusable() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("disk0.img");
    let mut d = FileDisk::open_prealloc(&path, DISK_LEN).expect("open_prealloc");
    d.write_at(0, b"payload");

    d.fail().expect("fail");
    assert!(!d.is_operational());
    assert!(!path.exists(), "image must be moved aside");
    let renamed = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().contains(".failed."));
    assert!(renamed);

    let mut buf = [0u8; 7];
    assert_eq!(d.read_at(0, &mut buf), 0);
    assert_eq!(d.write_at(0, b"x"), 0);
}

#[test]
fn replaced_disk_starts_zeroed() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("disk1.img");
    let mut d = FileDisk::open_prealloc(&path, DISK_LEN).expect("open_prealloc");
    d.write_at(64, b"stale");
    d.fail().expect("fail");

    d.replace().expect("replace");
    assert!(d.is_operational());
    let mut buf = [0xFFu8; 5];
    assert_eq!(d.read_at(64, &mut buf), 5);
    assert_eq!(buf, [0; 5]);
}
