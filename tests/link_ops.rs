//! Hard link, unlink-with-open-handle, and tmpfile lifetime tests.

use memfs::{FileMode, FsError, MemFs};

#[test]
fn link_binds_a_second_name() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let f = fs.create(&root, "a", FileMode::new(0o644)).unwrap();
    fs.write_at(&f, 0, b"shared").unwrap();
    assert_eq!(f.nlink(), 1);

    fs.link(&root, "b", &f).unwrap();
    assert_eq!(f.nlink(), 2);

    // Both names resolve to the same node and see the same bytes.
    let via_b = fs.lookup(&root, "b").unwrap();
    assert_eq!(via_b.id(), f.id());
    let mut buf = [0u8; 6];
    fs.read_at(&via_b, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"shared");

    // A write through one name is visible through the other.
    fs.write_at(&via_b, 0, b"SHARED").unwrap();
    fs.read_at(&f, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"SHARED");
}

#[test]
fn unlinking_one_name_keeps_the_node() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let f = fs.create(&root, "a", FileMode::new(0o644)).unwrap();
    fs.link(&root, "b", &f).unwrap();

    fs.unlink(&root, "a").unwrap();
    assert_eq!(f.nlink(), 1);
    assert_eq!(fs.lookup(&root, "a").unwrap_err(), FsError::NotFound);
    assert_eq!(fs.lookup(&root, "b").unwrap().id(), f.id());
}

#[test]
fn directories_cannot_be_hard_linked() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let d = fs.mkdir(&root, "d", FileMode::new(0o755)).unwrap();
    assert_eq!(fs.link(&root, "d2", &d).unwrap_err(), FsError::IsADirectory);
    assert_eq!(fs.lookup(&root, "d2").unwrap_err(), FsError::NotFound);
    assert_eq!(d.nlink(), 2);
}

#[test]
fn link_to_an_occupied_name_fails() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let a = fs.create(&root, "a", FileMode::new(0o644)).unwrap();
    fs.create(&root, "b", FileMode::new(0o644)).unwrap();
    assert_eq!(fs.link(&root, "b", &a).unwrap_err(), FsError::AlreadyExists);
    assert_eq!(a.nlink(), 1);
}

#[test]
fn open_handle_outlives_the_last_binding() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let f = fs.create(&root, "a", FileMode::new(0o644)).unwrap();
    fs.write_at(&f, 0, b"still here").unwrap();

    let nodes_before = fs.statfs().node_count;
    fs.unlink(&root, "a").unwrap();
    assert_eq!(f.nlink(), 0);

    // The name is gone but the handle still reads the content.
    assert_eq!(fs.lookup(&root, "a").unwrap_err(), FsError::NotFound);
    let mut buf = [0u8; 10];
    assert_eq!(fs.read_at(&f, 0, &mut buf).unwrap(), 10);
    assert_eq!(&buf, b"still here");
    assert_eq!(fs.statfs().node_count, nodes_before);

    // Dropping the last handle reclaims the node.
    drop(f);
    assert_eq!(fs.statfs().node_count, nodes_before - 1);
}

#[test]
fn cloned_handles_each_pin_the_node() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let f = fs.create(&root, "a", FileMode::new(0o644)).unwrap();
    let g = f.clone();
    fs.unlink(&root, "a").unwrap();

    let nodes = fs.statfs().node_count;
    drop(f);
    assert_eq!(fs.statfs().node_count, nodes);
    drop(g);
    assert_eq!(fs.statfs().node_count, nodes - 1);
}

#[test]
fn tmpfile_is_unbound_from_birth() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let t = fs.tmpfile(&root, FileMode::new(0o600)).unwrap();
    assert_eq!(t.nlink(), 0);

    fs.write_at(&t, 0, b"scratch").unwrap();
    let mut buf = [0u8; 7];
    fs.read_at(&t, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"scratch");

    // Never listed anywhere.
    assert!(fs.readdir(&root).unwrap().is_empty());

    let nodes = fs.statfs().node_count;
    drop(t);
    assert_eq!(fs.statfs().node_count, nodes - 1);
}

#[test]
fn tmpfile_requires_a_directory() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let f = fs.create(&root, "f", FileMode::new(0o644)).unwrap();
    assert_eq!(
        fs.tmpfile(&f, FileMode::new(0o600)).unwrap_err(),
        FsError::NotADirectory
    );
}

#[test]
fn removed_directory_rejects_new_bindings() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let d = fs.mkdir(&root, "d", FileMode::new(0o755)).unwrap();
    let f = fs.create(&root, "f", FileMode::new(0o644)).unwrap();

    fs.rmdir(&root, "d").unwrap();
    assert_eq!(d.nlink(), 0);

    // Every binding path through the stale handle fails; nothing can be
    // parked in a directory the tree can no longer reach.
    let mode = FileMode::new(0o644);
    assert_eq!(fs.create(&d, "ghost", mode).unwrap_err(), FsError::NotFound);
    assert_eq!(
        fs.mkdir(&d, "ghost", FileMode::new(0o755)).unwrap_err(),
        FsError::NotFound
    );
    assert_eq!(fs.symlink(&d, "ghost", "t").unwrap_err(), FsError::NotFound);
    assert_eq!(fs.link(&d, "ghost", &f).unwrap_err(), FsError::NotFound);
    assert_eq!(fs.tmpfile(&d, mode).unwrap_err(), FsError::NotFound);
    assert_eq!(
        fs.rename(&root, "f", &d, "ghost").unwrap_err(),
        FsError::NotFound
    );

    // The failed attempts left the tree untouched.
    assert_eq!(f.nlink(), 1);
    assert!(fs.lookup(&root, "f").is_ok());
    assert_eq!(fs.statfs().node_count, 3);

    // Dropping the stale handle reclaims the removed directory, leaving
    // only the root and the file.
    drop(d);
    assert_eq!(fs.statfs().node_count, 2);
}

#[test]
fn relinking_a_tmpfile_via_link() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    let t = fs.tmpfile(&root, FileMode::new(0o600)).unwrap();
    fs.write_at(&t, 0, b"kept").unwrap();

    // Binding the anonymous node gives it a name and a link.
    fs.link(&root, "named", &t).unwrap();
    assert_eq!(t.nlink(), 1);
    drop(t);

    let named = fs.lookup(&root, "named").unwrap();
    let mut buf = [0u8; 4];
    fs.read_at(&named, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"kept");
}
