#![allow(dead_code)]

use imgfs::{FileSystem, OpenFlag};
use tempfile::TempDir;

pub const IMAGE_SIZE: u64 = 1 << 20;
pub const BLOCK_SIZE: u32 = 1024;

pub fn format(dir: &TempDir) -> FileSystem {
    FileSystem::init_partition(dir.path().join("fs.img"), IMAGE_SIZE, BLOCK_SIZE).unwrap()
}

/// 64 KiB image: 16 inodes, 60 data blocks
pub fn format_small(dir: &TempDir) -> FileSystem {
    FileSystem::init_partition(dir.path().join("small.img"), 64 << 10, BLOCK_SIZE).unwrap()
}

pub fn write_file(fs: &mut FileSystem, path: &str, data: &[u8]) -> u32 {
    let fd = fs
        .open(path, OpenFlag::WRONLY | OpenFlag::CREATE | OpenFlag::TRUNC)
        .unwrap();
    assert_eq!(data.len(), fs.write(fd, data).unwrap());
    fs.close(fd).unwrap();
    fs.resolve(path).unwrap().inode
}

pub fn read_file(fs: &mut FileSystem, path: &str) -> Vec<u8> {
    let fd = fs.open(path, OpenFlag::read_only()).unwrap();
    let mut data = vec![0; fs.fstat(fd).unwrap().size as usize];
    assert_eq!(data.len(), fs.read(fd, &mut data).unwrap());
    assert_eq!(0, fs.read(fd, &mut [0; 8]).unwrap());
    fs.close(fd).unwrap();
    data
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
