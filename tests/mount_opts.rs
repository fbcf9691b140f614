//! Mount-level tests: option parsing end to end, read-only mounts, the
//! memory budget, statistics, and unmount teardown.

use memfs::{FileMode, FsError, MemFs, MountOpts};

#[test]
fn mode_option_sets_root_permissions() {
    let fs = MemFs::mount("mode=0750").unwrap();
    let root = fs.root();
    let stat = root.stat();
    assert_eq!(stat.mode.permissions(), 0o750);
    assert!(stat.mode.is_directory());
    assert_eq!(fs.show_options(), ",mode=750");
}

#[test]
fn default_mount_shows_no_options() {
    let fs = MemFs::mount("").unwrap();
    assert_eq!(fs.root().stat().mode.permissions(), 0o755);
    assert_eq!(fs.show_options(), "");
}

#[test]
fn malformed_options_fail_the_mount() {
    assert_eq!(MemFs::mount("mode=bogus").err(), Some(FsError::ParseError));
}

#[test]
fn unknown_options_do_not_fail_the_mount() {
    let fs = MemFs::mount("noatime,size=10m,mode=0700").unwrap();
    assert_eq!(fs.root().stat().mode.permissions(), 0o700);
}

#[test]
fn read_only_mount_rejects_mutation() {
    let fs = MemFs::mount_with(MountOpts::default().read_only()).unwrap();
    let root = fs.root();
    let mode = FileMode::new(0o644);

    assert_eq!(fs.create(&root, "f", mode).unwrap_err(), FsError::ReadOnly);
    assert_eq!(fs.mkdir(&root, "d", mode).unwrap_err(), FsError::ReadOnly);
    assert_eq!(fs.symlink(&root, "l", "t").unwrap_err(), FsError::ReadOnly);
    assert_eq!(fs.tmpfile(&root, mode).unwrap_err(), FsError::ReadOnly);
    assert_eq!(fs.unlink(&root, "f").unwrap_err(), FsError::ReadOnly);
    assert_eq!(fs.rmdir(&root, "d").unwrap_err(), FsError::ReadOnly);
    assert_eq!(
        fs.rename(&root, "f", &root, "g").unwrap_err(),
        FsError::ReadOnly
    );

    // Read-side operations still work.
    assert!(fs.readdir(&root).unwrap().is_empty());
    assert_eq!(fs.lookup(&root, "f").unwrap_err(), FsError::NotFound);
}

#[test]
fn node_budget_exhaustion_is_no_space() {
    // Each node charges 256 bytes: root plus one file fit in 600, a
    // second file does not.
    let opts = MountOpts {
        max_bytes: 600,
        ..MountOpts::default()
    };
    let fs = MemFs::mount_with(opts).unwrap();
    let root = fs.root();

    fs.create(&root, "a", FileMode::new(0o644)).unwrap();
    assert_eq!(
        fs.create(&root, "b", FileMode::new(0o644)).unwrap_err(),
        FsError::NoSpace
    );
    // The failed create left no binding behind.
    assert_eq!(fs.readdir(&root).unwrap().len(), 1);

    // Releasing a node makes room again.
    fs.unlink(&root, "a").unwrap();
    fs.create(&root, "b", FileMode::new(0o644)).unwrap();
}

#[test]
fn statfs_reports_usage() {
    let opts = MountOpts {
        max_bytes: 1 << 20,
        ..MountOpts::default()
    };
    let fs = MemFs::mount_with(opts).unwrap();
    let root = fs.root();

    let s = fs.statfs();
    assert_eq!(s.total_bytes, 1 << 20);
    assert_eq!(s.node_count, 1);
    assert_eq!(s.name_max, 255);
    let baseline = s.used_bytes;
    assert!(baseline > 0);

    let f = fs.create(&root, "f", FileMode::new(0o644)).unwrap();
    fs.write_at(&f, 0, b"data").unwrap();
    let s = fs.statfs();
    assert_eq!(s.node_count, 2);
    assert!(s.used_bytes > baseline);
}

#[test]
fn unmount_consumes_the_handle() {
    let fs = MemFs::mount("").unwrap();
    let root = fs.root();
    fs.create(&root, "f", FileMode::new(0o644)).unwrap();
    drop(root);
    fs.unmount();
    // `fs` is gone; a stale handle cannot outlive the mount by type.
}

#[test]
fn handles_are_bound_to_their_mount() {
    let a = MemFs::mount("").unwrap();
    let b = MemFs::mount("").unwrap();
    let root_a = a.root();
    let root_b = b.root();
    let f_b = b.create(&root_b, "f", FileMode::new(0o644)).unwrap();

    // Node ids are per-store, so a foreign handle must be rejected
    // outright rather than resolved against this mount's arena.
    assert_eq!(
        a.link(&root_a, "alien", &f_b).unwrap_err(),
        FsError::InvalidArgument
    );
    assert_eq!(
        a.create(&root_b, "x", FileMode::new(0o644)).unwrap_err(),
        FsError::InvalidArgument
    );
    assert_eq!(a.lookup(&root_b, "f").unwrap_err(), FsError::InvalidArgument);
    assert_eq!(
        a.rename(&root_a, "x", &root_b, "y").unwrap_err(),
        FsError::InvalidArgument
    );
    let mut buf = [0u8; 1];
    assert_eq!(a.read_at(&f_b, 0, &mut buf).unwrap_err(), FsError::InvalidArgument);

    // Neither tree was touched.
    assert_eq!(f_b.nlink(), 1);
    assert!(a.readdir(&root_a).unwrap().is_empty());
    assert_eq!(b.readdir(&root_b).unwrap().len(), 1);
}

#[test]
fn mounts_are_independent() {
    let a = MemFs::mount("").unwrap();
    let b = MemFs::mount("").unwrap();
    fs_put(&a, "only-in-a");
    assert_eq!(
        b.lookup(&b.root(), "only-in-a").unwrap_err(),
        FsError::NotFound
    );
    assert_eq!(a.statfs().node_count, 2);
    assert_eq!(b.statfs().node_count, 1);
}

fn fs_put(fs: &MemFs, name: &str) {
    let root = fs.root();
    fs.create(&root, name, FileMode::new(0o644)).unwrap();
}
