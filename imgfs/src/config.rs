//! Constants used in imgfs

pub const DEFAULT_BLOCK_SIZE: u32 = 1024;
pub const MIN_BLOCK_SIZE: u32 = 256;
pub const MAX_BLOCK_SIZE: u32 = 65536;

/// inode 表中每条记录的字节数
pub const INODE_SIZE: usize = 128;
/// 目录项的字节数
pub const DIR_ENTRY_SIZE: usize = 64;

/// 直接索引的块数，其后是一个一级间接索引块
pub const DIRECT_COUNT: usize = 12;

/// 每多少块分配一个 inode
pub const BLOCKS_PER_INODE: u64 = 4;
pub const MIN_INODES: u32 = 16;
pub const MAX_INODES: u32 = 1024;

pub const MAX_OPEN_FILES: usize = 64;
pub const MAX_SYMLINK_DEPTH: usize = 8;

pub const ROOT_INODE: u32 = 0;
pub const ROOT_UID: u32 = 0;
pub const ROOT_MODE: u16 = 0o755;
pub const DEFAULT_FILE_MODE: u16 = 0o644;
pub const SYMLINK_MODE: u16 = 0o777;

/// 未使用的块指针
pub const NO_BLOCK: u32 = u32::MAX;
