mod common;

use std::io::SeekFrom;

use imgfs::{Error, OpenFlag, Principal};

use common::{format, pattern, read_file, write_file};

#[test]
fn create_and_exclusive_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);

    assert!(matches!(fs.open("/new", OpenFlag::read_only()), Err(Error::NoSuchEntry)));

    let fd = fs
        .open_file("/new", OpenFlag::RDWR | OpenFlag::CREATE | OpenFlag::EXCL, 0o600)
        .unwrap();
    assert_eq!(0, fd);
    assert_eq!("rw-------", fs.fstat(fd).unwrap().mode.to_string());
    assert!(matches!(
        fs.open("/new", OpenFlag::WRONLY | OpenFlag::CREATE | OpenFlag::EXCL),
        Err(Error::AlreadyExists)
    ));
    // 没有 EXCL 时打开已有文件
    let again = fs.open("/new", OpenFlag::WRONLY | OpenFlag::CREATE).unwrap();
    assert_eq!(1, again);
    assert_eq!(2, fs.open_files());

    fs.create_directory("/dir", 0o755).unwrap();
    assert!(matches!(fs.open("/dir", OpenFlag::read_only()), Err(Error::IsADirectory)));
    assert!(matches!(
        fs.open("/new", OpenFlag::read_only() | OpenFlag::TRUNC),
        Err(Error::InvalidArgument)
    ));
}

#[test]
fn independent_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    write_file(&mut fs, "/log", b"0123456789");

    let a = fs.open("/log", OpenFlag::read_only()).unwrap();
    let b = fs.open("/log", OpenFlag::read_only()).unwrap();
    let mut buf = [0; 4];
    fs.read(a, &mut buf).unwrap();
    assert_eq!(b"0123", &buf);
    fs.read(a, &mut buf).unwrap();
    assert_eq!(b"4567", &buf);
    fs.read(b, &mut buf).unwrap();
    assert_eq!(b"0123", &buf);

    assert_eq!(2, fs.read(a, &mut buf).unwrap());
    assert_eq!(b"89", &buf[..2]);
    assert_eq!(0, fs.read(a, &mut buf).unwrap());
}

#[test]
fn seek_positions() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    write_file(&mut fs, "/f", b"abcdefgh");
    let fd = fs.open("/f", OpenFlag::RDWR.into()).unwrap();

    assert_eq!(6, fs.seek(fd, SeekFrom::End(-2)).unwrap());
    assert_eq!(3, fs.seek(fd, SeekFrom::Current(-3)).unwrap());
    fs.write(fd, b"XY").unwrap();
    assert_eq!(5, fs.seek(fd, SeekFrom::Current(0)).unwrap());
    assert_eq!(0, fs.seek(fd, SeekFrom::Start(0)).unwrap());

    let mut buf = [0; 8];
    fs.read(fd, &mut buf).unwrap();
    assert_eq!(b"abcXYfgh", &buf);
    assert!(matches!(fs.seek(fd, SeekFrom::Current(-9)), Err(Error::InvalidArgument)));
    assert_eq!(8, fs.seek(fd, SeekFrom::Current(0)).unwrap());
}

#[test]
fn writing_past_the_end_fills_with_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    let fd = fs.open("/sparse", OpenFlag::WRONLY | OpenFlag::CREATE).unwrap();
    fs.seek(fd, SeekFrom::Start(5000)).unwrap();
    fs.write(fd, b"x").unwrap();
    fs.close(fd).unwrap();

    let data = read_file(&mut fs, "/sparse");
    assert_eq!(5001, data.len());
    assert!(data[..5000].iter().all(|&b| b == 0));
    assert_eq!(b'x', data[5000]);
}

#[test]
fn append_and_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    write_file(&mut fs, "/f", b"head");

    let fd = fs.open("/f", OpenFlag::WRONLY | OpenFlag::APPEND).unwrap();
    fs.seek(fd, SeekFrom::Start(0)).unwrap();
    fs.write(fd, b"-tail").unwrap();
    fs.close(fd).unwrap();
    assert_eq!(b"head-tail".to_vec(), read_file(&mut fs, "/f"));

    write_file(&mut fs, "/big", &pattern(8 * 1024));
    let free_blocks = fs.free_blocks();
    let fd = fs.open("/big", OpenFlag::WRONLY | OpenFlag::TRUNC).unwrap();
    assert_eq!(0, fs.fstat(fd).unwrap().size);
    assert_eq!(free_blocks + 8, fs.free_blocks());
    fs.close(fd).unwrap();
}

#[test]
fn large_file_uses_indirect_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    let free_blocks = fs.free_blocks();
    let data = pattern(13 * 1024 + 100);
    let id = write_file(&mut fs, "/large", &data);

    let stat = fs.stat("/large").unwrap();
    assert_eq!(14, fs.blocks_of(id).unwrap().len());
    assert_eq!(15, stat.blocks);
    assert_eq!(free_blocks - 15, fs.free_blocks());
    assert_eq!(data, read_file(&mut fs, "/large"));

    // 缩回直接索引范围时间接索引块也被释放
    let fd = fs.open("/large", OpenFlag::WRONLY | OpenFlag::TRUNC).unwrap();
    fs.write(fd, &data[..1024]).unwrap();
    fs.close(fd).unwrap();
    assert_eq!(free_blocks - 1, fs.free_blocks());
}

#[test]
fn file_size_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    // 12 个直接块加上 1024 / 4 个间接块
    let limit = (12 + 256) * 1024;
    let fd = fs.open("/max", OpenFlag::WRONLY | OpenFlag::CREATE).unwrap();

    fs.seek(fd, SeekFrom::Start(limit)).unwrap();
    assert!(matches!(fs.write(fd, b"!"), Err(Error::FileTooLarge)));
    fs.seek(fd, SeekFrom::Start(limit - 1)).unwrap();
    assert_eq!(1, fs.write(fd, b"!").unwrap());
    assert_eq!(limit, fs.fstat(fd).unwrap().size);
}

#[test]
fn descriptor_rules() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    write_file(&mut fs, "/f", b"data");

    let ro = fs.open("/f", OpenFlag::read_only()).unwrap();
    let wo = fs.open("/f", OpenFlag::WRONLY.into()).unwrap();
    assert!(matches!(fs.write(ro, b"x"), Err(Error::BadDescriptor)));
    assert!(matches!(fs.read(wo, &mut [0; 4]), Err(Error::BadDescriptor)));

    fs.close(ro).unwrap();
    assert!(matches!(fs.close(ro), Err(Error::BadDescriptor)));
    assert!(matches!(fs.read(99, &mut [0; 4]), Err(Error::BadDescriptor)));
    // 关闭后空出的最小槽位被复用
    assert_eq!(ro, fs.open("/f", OpenFlag::read_only()).unwrap());
}

#[test]
fn too_many_open_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    write_file(&mut fs, "/f", b"data");

    for expected in 0..64 {
        assert_eq!(expected, fs.open("/f", OpenFlag::read_only()).unwrap());
    }
    assert!(matches!(fs.open("/f", OpenFlag::read_only()), Err(Error::TooManyOpenFiles)));
    assert!(matches!(
        fs.open("/g", OpenFlag::WRONLY | OpenFlag::CREATE),
        Err(Error::TooManyOpenFiles)
    ));
    assert!(matches!(fs.resolve("/g"), Err(Error::NoSuchEntry)));
}

#[test]
fn open_checks_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    fs.create_directory("/home", 0o777).unwrap();
    write_file(&mut fs, "/home/private", b"secret");
    fs.chmod("/home/private", 0o640).unwrap();
    fs.chown("/home/private", 0, 50).unwrap();

    fs.set_principal(Principal::new(1000, 50));
    assert!(fs.open("/home/private", OpenFlag::read_only()).is_ok());
    assert!(matches!(
        fs.open("/home/private", OpenFlag::RDWR.into()),
        Err(Error::PermissionDenied)
    ));
    assert!(matches!(fs.chmod("/home/private", 0o666), Err(Error::PermissionDenied)));

    fs.set_principal(Principal::new(1000, 1000));
    assert!(matches!(
        fs.open("/home/private", OpenFlag::read_only()),
        Err(Error::PermissionDenied)
    ));
    // 新建的文件不受自身权限位限制
    let fd = fs
        .open_file("/home/mine", OpenFlag::WRONLY | OpenFlag::CREATE, 0o400)
        .unwrap();
    assert_eq!(3, fs.write(fd, b"abc").unwrap());
    fs.chmod("/home/mine", 0o600).unwrap();
    assert_eq!("rw-------", fs.stat("/home/mine").unwrap().mode.to_string());
}

#[test]
fn huge_offsets_do_not_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    write_file(&mut fs, "/f", b"data");
    let free_blocks = fs.free_blocks();
    let fd = fs.open("/f", OpenFlag::RDWR.into()).unwrap();

    assert_eq!(u64::MAX, fs.seek(fd, SeekFrom::Start(u64::MAX)).unwrap());
    assert_eq!(0, fs.read(fd, &mut [0; 4]).unwrap());

    fs.seek(fd, SeekFrom::Start(u64::MAX - 1)).unwrap();
    assert!(matches!(fs.write(fd, b"abc"), Err(Error::FileTooLarge)));
    assert_eq!(4, fs.fstat(fd).unwrap().size);
    assert_eq!(free_blocks, fs.free_blocks());
}

#[test]
fn empty_write_past_the_end_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    let free_blocks = fs.free_blocks();
    let fd = fs.open("/empty", OpenFlag::WRONLY | OpenFlag::CREATE).unwrap();
    let free_blocks_after_create = fs.free_blocks();
    assert_eq!(free_blocks, free_blocks_after_create);

    fs.seek(fd, SeekFrom::Start(5000)).unwrap();
    assert_eq!(0, fs.write(fd, b"").unwrap());
    assert_eq!(0, fs.fstat(fd).unwrap().size);
    assert_eq!(0, fs.fstat(fd).unwrap().blocks);

    fs.seek(fd, SeekFrom::Start(u64::MAX)).unwrap();
    assert_eq!(0, fs.write(fd, b"").unwrap());
    assert_eq!(free_blocks, fs.free_blocks());
}

#[test]
fn failed_open_leaves_no_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    write_file(&mut fs, "/f", b"keep me");
    fs.chmod("/f", 0o644).unwrap();

    fs.set_principal(Principal::new(1000, 1000));
    assert!(matches!(
        fs.open("/f", OpenFlag::WRONLY | OpenFlag::TRUNC),
        Err(Error::PermissionDenied)
    ));
    assert_eq!(0, fs.open_files());

    fs.set_principal(Principal::ROOT);
    assert_eq!(b"keep me".to_vec(), read_file(&mut fs, "/f"));
    let fd = fs.open("/f", OpenFlag::WRONLY | OpenFlag::TRUNC).unwrap();
    assert_eq!(1, fs.open_files());
    assert_eq!(0, fs.fstat(fd).unwrap().size);
}

#[test]
fn create_through_dangling_symlink() {
    let dir = tempfile::tempdir().unwrap();
    let mut fs = format(&dir);
    fs.create_soft_link("/target", "/link").unwrap();

    // 悬空链接的目标不会被创建
    assert!(matches!(
        fs.open("/link", OpenFlag::WRONLY | OpenFlag::CREATE),
        Err(Error::NoSuchEntry)
    ));
    assert!(matches!(fs.resolve_nofollow("/target"), Err(Error::NoSuchEntry)));
    assert_eq!(0, fs.open_files());

    write_file(&mut fs, "/target", b"now here");
    assert_eq!(b"now here".to_vec(), read_file(&mut fs, "/link"));
}
