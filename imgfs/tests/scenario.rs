mod common;

use imgfs::{Error, FileSystem, InodeKind, OpenFlag};

use common::{BLOCK_SIZE, IMAGE_SIZE, pattern, read_file, write_file};

#[test]
fn home_directory_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("img");
    let mut fs = FileSystem::init_partition(&image, IMAGE_SIZE, BLOCK_SIZE).unwrap();

    // 根目录只占用一个数据块
    let root = fs.get_inode(fs.current_directory()).unwrap();
    assert!(root.is_dir());
    assert_eq!("/", fs.current_path());
    assert!(!fs.is_block_free(0).unwrap());
    assert!(fs.is_block_free(1).unwrap());
    assert_eq!(fs.data_blocks() as usize - 1, fs.free_blocks());

    let home = fs.create_directory("/home", 0o755).unwrap();
    assert_eq!(home.id(), fs.resolve("/home").unwrap().inode);
    assert_eq!("rwxr-xr-x", fs.stat("/home").unwrap().mode.to_string());

    let file = fs.create_file("/home/x.txt", 0o644).unwrap();
    let data = pattern(2048);
    let fd = fs.open("/home/x.txt", OpenFlag::WRONLY.into()).unwrap();
    assert_eq!(2048, fs.write(fd, &data).unwrap());
    fs.close(fd).unwrap();

    let stat = fs.stat("/home/x.txt").unwrap();
    assert_eq!(2048, stat.size);
    assert_eq!(2, stat.blocks);
    assert_eq!(2, fs.blocks_of(file.id()).unwrap().len());

    fs.create_hard_link("/home/x.txt", "/home/y.txt").unwrap();
    assert_eq!(2, fs.get_inode(file.id()).unwrap().links());

    fs.unlink("/home/x.txt").unwrap();
    assert!(matches!(fs.resolve("/home/x.txt"), Err(Error::NoSuchEntry)));
    assert_eq!(1, fs.get_inode(file.id()).unwrap().links());
    assert_eq!(data, read_file(&mut fs, "/home/y.txt"));
}

#[test]
fn reopened_image_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("img");
    let data = pattern(20 * 1024);

    let (free_blocks, free_inodes, id) = {
        let mut fs = FileSystem::init_partition(&image, IMAGE_SIZE, BLOCK_SIZE).unwrap();
        fs.create_directory("/etc", 0o750).unwrap();
        let id = write_file(&mut fs, "/etc/big", &data);
        fs.create_soft_link("/etc/big", "/big").unwrap();
        fs.chown("/etc", 7, 8).unwrap();
        (fs.free_blocks(), fs.free_inodes(), id)
    };

    let mut fs = FileSystem::mount(&image).unwrap();
    assert_eq!(free_blocks, fs.free_blocks());
    assert_eq!(free_inodes, fs.free_inodes());
    assert_eq!(data, read_file(&mut fs, "/big"));
    assert_eq!(id, fs.resolve("/big").unwrap().inode);
    assert_eq!("/etc/big", fs.read_link("/big").unwrap());

    let etc = fs.stat("/etc").unwrap();
    assert_eq!(InodeKind::Directory, etc.kind);
    assert_eq!((7, 8), (etc.owner, etc.group));
    assert_eq!("rwxr-x---", etc.mode.to_string());
}

#[test]
fn bad_images_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let too_small = dir.path().join("tiny.img");
    assert!(matches!(
        FileSystem::init_partition(&too_small, 2048, BLOCK_SIZE),
        Err(Error::InvalidSize)
    ));
    assert!(matches!(
        FileSystem::init_partition(&too_small, IMAGE_SIZE, 1000),
        Err(Error::InvalidSize)
    ));

    let blank = dir.path().join("blank.img");
    std::fs::write(&blank, vec![0; 4096]).unwrap();
    assert!(matches!(FileSystem::mount(&blank), Err(Error::Corrupted)));

    assert!(matches!(
        FileSystem::mount(dir.path().join("missing.img")),
        Err(Error::Io(_))
    ));
    assert!(matches!(
        FileSystem::init_partition(dir.path().join("no/such/dir.img"), IMAGE_SIZE, BLOCK_SIZE),
        Err(Error::Io(_))
    ));
}
