//! inode 记录与块索引
//!
//! - 直接索引：`DIRECT_COUNT` 个块编号，每个都指向一个**数据块**
//! - 一级间接索引：整个块连续存储**块编号**，每个编号都指向一个数据块
//!
//! 目录的空间用于存放目录项；普通文件的空间用于存放它的数据；
//! 符号链接的空间用于存放目标路径。
//!
//! 数据块数由 `size` 推出，`size` 以外的指针均为 [`NO_BLOCK`]。

use super::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64};
use crate::config::{DIRECT_COUNT, INODE_SIZE, NO_BLOCK};
use crate::permission::Mode;
use crate::{Error, Result};

const FLAG_USED: u8 = 0b1;

const DIRECT_OFFSET: usize = 48;
const INDIRECT_OFFSET: usize = DIRECT_OFFSET + DIRECT_COUNT * 4;

/// inode 所描述对象的种类，三者互斥
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum InodeKind {
    #[default]
    Regular = 0,
    Directory = 1,
    SymbolicLink = 2,
}

impl TryFrom<u8> for InodeKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Regular),
            1 => Ok(Self::Directory),
            2 => Ok(Self::SymbolicLink),
            _ => Err(Error::Corrupted),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// inode 表中的槽位，创建后不再改变
    pub(crate) id: u32,
    pub(crate) kind: InodeKind,
    pub mode: Mode,
    /// 硬链接个数，即指向它的目录项数
    pub(crate) links: u32,
    pub owner: u32,
    pub group: u32,
    /// 字节数
    pub(crate) size: u64,
    /// 自 UNIX 纪元起的秒数
    pub created_at: u64,
    pub modified_at: u64,
    pub(crate) direct: [u32; DIRECT_COUNT],
    pub(crate) indirect: u32,
}

impl Inode {
    pub(crate) fn new(id: u32, kind: InodeKind, mode: Mode, owner: u32, group: u32, now: u64) -> Self {
        Self {
            id,
            kind,
            mode,
            links: 1,
            owner,
            group,
            size: 0,
            created_at: now,
            modified_at: now,
            direct: [NO_BLOCK; DIRECT_COUNT],
            indirect: NO_BLOCK,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> InodeKind {
        self.kind
    }

    #[inline]
    pub fn links(&self) -> u32 {
        self.links
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.kind == InodeKind::SymbolicLink
    }

    /// 按 `size` 计算数据块数
    #[inline]
    pub fn count_data_block(size: u64, block_size: u32) -> usize {
        size.div_ceil(block_size as u64) as usize
    }

    /// 数据块数加上间接索引块
    #[inline]
    pub fn count_total_block(size: u64, block_size: u32) -> usize {
        let data_blocks = Self::count_data_block(size, block_size);
        if data_blocks > DIRECT_COUNT {
            data_blocks + 1
        } else {
            data_blocks
        }
    }

    /// 单个 inode 可索引的数据块上限
    #[inline]
    pub fn max_data_blocks(block_size: u32) -> usize {
        DIRECT_COUNT + block_size as usize / 4
    }

    /// 直接索引中正在使用的块
    pub fn direct_blocks(&self, block_size: u32) -> &[u32] {
        let count = Self::count_data_block(self.size, block_size).min(DIRECT_COUNT);
        &self.direct[..count]
    }

    /// 间接索引块，未启用时为空
    #[inline]
    pub fn indirect_block(&self) -> Option<u32> {
        (self.indirect != NO_BLOCK).then_some(self.indirect)
    }

    /// 写入一条 `INODE_SIZE` 字节的记录
    pub fn encode(&self, buf: &mut [u8]) {
        let buf = &mut buf[..INODE_SIZE];
        buf.fill(0);
        buf[0] = FLAG_USED;
        buf[1] = self.kind as u8;
        put_u16(buf, 2, self.mode.bits());
        put_u32(buf, 4, self.links);
        put_u32(buf, 8, self.owner);
        put_u32(buf, 12, self.group);
        put_u64(buf, 16, self.size);
        put_u64(buf, 24, self.created_at);
        put_u64(buf, 32, self.modified_at);
        for (i, &block) in self.direct.iter().enumerate() {
            put_u32(buf, DIRECT_OFFSET + i * 4, block);
        }
        put_u32(buf, INDIRECT_OFFSET, self.indirect);
    }

    /// 未使用的槽位记录全部为零
    pub fn encode_unused(buf: &mut [u8]) {
        buf[..INODE_SIZE].fill(0);
    }

    /// 解析一条记录，槽位未使用时返回空
    pub fn decode(id: u32, buf: &[u8]) -> Result<Option<Self>> {
        if buf[0] & FLAG_USED == 0 {
            return Ok(None);
        }

        let mut direct = [NO_BLOCK; DIRECT_COUNT];
        for (i, block) in direct.iter_mut().enumerate() {
            *block = get_u32(buf, DIRECT_OFFSET + i * 4);
        }

        Ok(Some(Self {
            id,
            kind: InodeKind::try_from(buf[1])?,
            mode: Mode::new(get_u16(buf, 2)),
            links: get_u32(buf, 4),
            owner: get_u32(buf, 8),
            group: get_u32(buf, 12),
            size: get_u64(buf, 16),
            created_at: get_u64(buf, 24),
            modified_at: get_u64(buf, 32),
            direct,
            indirect: get_u32(buf, INDIRECT_OFFSET),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_counting() {
        assert_eq!(0, Inode::count_data_block(0, 1024));
        assert_eq!(2, Inode::count_data_block(2048, 1024));
        assert_eq!(3, Inode::count_data_block(2049, 1024));
        assert_eq!(12, Inode::count_total_block(12 * 1024, 1024));
        assert_eq!(14, Inode::count_total_block(12 * 1024 + 1, 1024));
        assert_eq!(12 + 256, Inode::max_data_blocks(1024));
    }

    #[test]
    fn record_codec() {
        let mut inode = Inode::new(7, InodeKind::SymbolicLink, Mode::new(0o777), 3, 4, 99);
        inode.size = 5;
        inode.direct[0] = 42;

        let mut buf = [0xff; INODE_SIZE];
        inode.encode(&mut buf);
        assert_eq!(Some(inode), Inode::decode(7, &buf).unwrap());

        Inode::encode_unused(&mut buf);
        assert_eq!(None, Inode::decode(7, &buf).unwrap());
    }

    #[test]
    fn unknown_kind_is_corruption() {
        let mut buf = [0; INODE_SIZE];
        buf[0] = FLAG_USED;
        buf[1] = 9;
        assert!(matches!(Inode::decode(0, &buf), Err(Error::Corrupted)));
    }
}
