use super::{get_u32, get_u64, put_u32, put_u64};
use crate::config::{
    BLOCKS_PER_INODE, INODE_SIZE, MAX_BLOCK_SIZE, MAX_INODES, MIN_BLOCK_SIZE, MIN_INODES,
    ROOT_INODE,
};
use crate::{Error, MAGIC, Result, VERSION};

/// 镜像头部，位于第 0 块：
/// - 提供镜像合法性校验；
/// - 定位其它连续区域
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// 魔数：用于校验镜像合法性
    magic: u32,
    version: u32,
    /// 镜像的字节数
    pub total_size: u64,
    pub block_size: u32,
    /// 镜像占据块数
    pub total_blocks: u32,
    pub bitmap_start: u32,
    pub bitmap_blocks: u32,
    pub inode_table_start: u32,
    pub inode_table_blocks: u32,
    /// inode 表的槽位数
    pub inode_count: u32,
    pub data_start: u32,
    /// 数据区块数，也是位图的有效位数
    pub data_blocks: u32,
    pub root_inode: u32,
}

impl SuperBlock {
    /// 头部编码后的字节数
    pub const SIZE: usize = 56;

    /// 由镜像大小与块大小计算各区域的位置。
    ///
    /// 块大小须为 2 的幂；镜像至少要容纳头部、位图、inode 表与一个数据块，
    /// 否则返回 [`Error::InvalidSize`]。
    pub fn new(total_size: u64, block_size: u32) -> Result<Self> {
        if !block_size.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size)
        {
            return Err(Error::InvalidSize);
        }

        let total_blocks =
            u32::try_from(total_size / block_size as u64).map_err(|_| Error::InvalidSize)?;
        let inode_count = (total_blocks as u64 / BLOCKS_PER_INODE)
            .clamp(MIN_INODES as u64, MAX_INODES as u64) as u32;
        let inode_table_blocks =
            (inode_count as usize * INODE_SIZE).div_ceil(block_size as usize) as u32;

        // 头部占一块
        let remaining = total_blocks
            .checked_sub(1 + inode_table_blocks)
            .ok_or(Error::InvalidSize)?;
        let block_bits = block_size * 8;
        let bitmap_blocks = ((remaining as u64 + block_bits as u64) / (block_bits as u64 + 1)) as u32;
        let data_blocks = remaining - bitmap_blocks;
        if data_blocks == 0 {
            return Err(Error::InvalidSize);
        }

        let bitmap_start = 1;
        let inode_table_start = bitmap_start + bitmap_blocks;
        let data_start = inode_table_start + inode_table_blocks;

        Ok(Self {
            magic: MAGIC,
            version: VERSION,
            total_size,
            block_size,
            total_blocks,
            bitmap_start,
            bitmap_blocks,
            inode_table_start,
            inode_table_blocks,
            inode_count,
            data_start,
            data_blocks,
            root_inode: ROOT_INODE,
        })
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.version == VERSION
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.magic);
        put_u32(buf, 4, self.version);
        put_u64(buf, 8, self.total_size);
        put_u32(buf, 16, self.block_size);
        put_u32(buf, 20, self.total_blocks);
        put_u32(buf, 24, self.bitmap_start);
        put_u32(buf, 28, self.bitmap_blocks);
        put_u32(buf, 32, self.inode_table_start);
        put_u32(buf, 36, self.inode_table_blocks);
        put_u32(buf, 40, self.inode_count);
        put_u32(buf, 44, self.data_start);
        put_u32(buf, 48, self.data_blocks);
        put_u32(buf, 52, self.root_inode);
    }

    pub fn decode(buf: &[u8]) -> Self {
        Self {
            magic: get_u32(buf, 0),
            version: get_u32(buf, 4),
            total_size: get_u64(buf, 8),
            block_size: get_u32(buf, 16),
            total_blocks: get_u32(buf, 20),
            bitmap_start: get_u32(buf, 24),
            bitmap_blocks: get_u32(buf, 28),
            inode_table_start: get_u32(buf, 32),
            inode_table_blocks: get_u32(buf, 36),
            inode_count: get_u32(buf, 40),
            data_start: get_u32(buf, 44),
            data_blocks: get_u32(buf, 48),
            root_inode: get_u32(buf, 52),
        }
    }

    /// 头部与自身大小重新推导出的布局一致
    pub fn is_consistent(&self) -> bool {
        Self::new(self.total_size, self.block_size).is_ok_and(|expected| expected == *self)
    }
}
