//! # imgfs
//!
//! 存放在单个镜像文件中的虚拟文件系统。
//!
//! 镜像布局：头部 | 空闲块位图 | inode 表 | 数据区

mod block_cache;
mod block_file;
mod block_store;
pub mod config;
mod dir;
mod error;
mod fd;
mod inode_table;
mod layout;
mod link;
mod partition;
mod path;
mod permission;
mod stat;

pub use self::{
    block_file::BlockFile,
    dir::DirEntry,
    error::{Error, Result},
    fd::OpenFlag,
    layout::{Inode, InodeKind, SuperBlock},
    partition::FileSystem,
    path::{ResolvedPath, is_relative_path},
    permission::{Access, Mode, Principal, check_permissions, chown_inode, set_permissions},
    stat::Stat,
};

/// 镜像头部的魔数
pub const MAGIC: u32 = 0x494d_4746;
/// 镜像格式版本
pub const VERSION: u32 = 1;
