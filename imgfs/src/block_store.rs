//! # 块存储
//!
//! 数据区内的块从 0 开始编号，块号到镜像内偏移的换算只在这里进行。

use crate::{Error, FileSystem, Result};

impl FileSystem {
    /// 数据块在镜像中的块号
    #[inline]
    pub(crate) fn data_block_id(&self, index: u32) -> usize {
        (self.super_block.data_start + index) as usize
    }

    /// 数据块在镜像中的字节偏移
    pub fn block_offset(&self, index: u32) -> Result<u64> {
        self.check_block(index)?;
        Ok(self.data_block_id(index) as u64 * self.block_size() as u64)
    }

    /// 分配编号最小的空闲块并清零
    pub fn allocate_block(&mut self) -> Result<u32> {
        let index = self.bitmap.alloc().ok_or(Error::NoSpace)?;
        let block_id = self.data_block_id(index);
        if let Err(err) = self.cache.modify(block_id, |block| block.fill(0)) {
            self.bitmap.dealloc(index);
            return Err(err.into());
        }

        log::trace!("allocate block {index}");
        Ok(index)
    }

    /// 释放一块；释放空闲块什么也不做
    pub fn free_block(&mut self, index: u32) -> Result<()> {
        self.check_block(index)?;
        if self.bitmap.dealloc(index) {
            log::trace!("free block {index}");
        }
        Ok(())
    }

    pub fn is_block_free(&self, index: u32) -> Result<bool> {
        self.check_block(index)?;
        Ok(!self.bitmap.is_set(index))
    }

    #[inline]
    fn check_block(&self, index: u32) -> Result<()> {
        if (index as usize) < self.bitmap.capacity() {
            Ok(())
        } else {
            Err(Error::OutOfRange(index))
        }
    }

    pub(crate) fn read_data_block<V>(&mut self, index: u32, f: impl FnOnce(&[u8]) -> V) -> Result<V> {
        let block_id = self.data_block_id(index);
        Ok(self.cache.read(block_id, f)?)
    }

    pub(crate) fn modify_data_block<V>(
        &mut self,
        index: u32,
        f: impl FnOnce(&mut [u8]) -> V,
    ) -> Result<V> {
        let block_id = self.data_block_id(index);
        Ok(self.cache.modify(block_id, f)?)
    }
}
