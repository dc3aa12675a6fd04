//! # inode 表
//!
//! inode 表是以编号为下标的定长数组，会话期间整体常驻内存。
//! 修改 inode 时先复制一份，改完再用 [`FileSystem::put_inode`] 放回，放回的 inode 会在同步时写回。

use core::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{DIRECT_COUNT, NO_BLOCK, ROOT_INODE};
use crate::layout::{Inode, InodeKind, get_u32, put_u32};
use crate::permission::Mode;
use crate::{Error, FileSystem, Result};

/// 自 UNIX 纪元起的秒数
pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

impl FileSystem {
    /// 占用第一个空槽位，引用计数为 1，属主为当前用户
    pub fn allocate_inode(&mut self, mode: Mode, kind: InodeKind) -> Result<Inode> {
        let id = self
            .inodes
            .iter()
            .position(Option::is_none)
            .ok_or(Error::NoInodes)? as u32;

        let inode = Inode::new(
            id,
            kind,
            mode,
            self.principal.uid,
            self.principal.gid,
            now(),
        );
        self.put_inode(inode.clone());

        log::debug!("allocate inode {id} ({kind:?})");
        Ok(inode)
    }

    /// 释放 inode 及其全部数据块。
    ///
    /// 仅当引用计数为零且没有文件描述符打开它时才允许，否则返回 [`Error::InodeInUse`]。
    pub fn free_inode(&mut self, id: u32) -> Result<()> {
        let mut inode = self.get_inode(id)?.clone();
        if inode.links != 0 || id == ROOT_INODE || self.fd_table.references(id) {
            return Err(Error::InodeInUse(id));
        }

        self.resize(&mut inode, 0)?;
        self.inodes[id as usize] = None;
        self.dirty_inodes.insert(id);

        log::debug!("free inode {id}");
        Ok(())
    }

    pub fn get_inode(&self, id: u32) -> Result<&Inode> {
        self.inodes
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidInode(id))
    }

    /// 返回的 inode 被视为已修改
    pub fn get_inode_mut(&mut self, id: u32) -> Result<&mut Inode> {
        let inode = self
            .inodes
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidInode(id))?;
        self.dirty_inodes.insert(id);
        Ok(inode)
    }

    pub(crate) fn put_inode(&mut self, inode: Inode) {
        let id = inode.id;
        self.inodes[id as usize] = Some(inode);
        self.dirty_inodes.insert(id);
    }

    /// inode 按逻辑顺序占用的数据块，不含间接索引块
    pub fn blocks_of(&mut self, id: u32) -> Result<Vec<u32>> {
        let inode = self.get_inode(id)?.clone();
        let count = Inode::count_data_block(inode.size, self.block_size());
        let mut blocks = inode.direct_blocks(self.block_size()).to_vec();
        for index in DIRECT_COUNT..count {
            blocks.push(self.block_of(&inode, index)?);
        }
        Ok(blocks)
    }

    /// 逻辑上 inode 指向一系列数据块，此处传入的是这些数据块的逻辑索引，
    /// 返回其在数据区内的编号
    pub(crate) fn block_of(&mut self, inode: &Inode, index: usize) -> Result<u32> {
        if index < DIRECT_COUNT {
            return Ok(inode.direct[index]);
        }

        let indirect = inode.indirect_block().ok_or(Error::Corrupted)?;
        let offset = (index - DIRECT_COUNT) * 4;
        self.read_data_block(indirect, |block| get_u32(block, offset))
    }

    pub(crate) fn resize(&mut self, inode: &mut Inode, new_size: u64) -> Result<()> {
        match new_size.cmp(&inode.size) {
            Ordering::Greater => self.expand_to(inode, new_size),
            Ordering::Less => self.shrink_to(inode, new_size),
            Ordering::Equal => Ok(()),
        }
    }

    /// 先确认空闲块足够再分配，失败时 inode 与位图均不变
    fn expand_to(&mut self, inode: &mut Inode, larger_size: u64) -> Result<()> {
        let block_size = self.block_size();
        let old_blocks = Inode::count_data_block(inode.size, block_size);
        let new_blocks = Inode::count_data_block(larger_size, block_size);
        if new_blocks > Inode::max_data_blocks(block_size) {
            return Err(Error::FileTooLarge);
        }
        let needed = Inode::count_total_block(larger_size, block_size)
            - Inode::count_total_block(inode.size, block_size);
        if needed > self.bitmap.count_free() {
            return Err(Error::NoSpace);
        }

        let mut block_index = old_blocks;

        /******************** 直接索引 ********************/
        while block_index < new_blocks.min(DIRECT_COUNT) {
            inode.direct[block_index] = self.allocate_block()?;
            block_index += 1;
        }

        /******************** 一级索引 ********************/
        if new_blocks > DIRECT_COUNT {
            // 这次 size 的增加越过了直接索引，创建一级索引
            if inode.indirect == NO_BLOCK {
                inode.indirect = self.allocate_block()?;
            }

            let first = block_index - DIRECT_COUNT;
            let mut entries = Vec::with_capacity(new_blocks - block_index);
            while block_index < new_blocks {
                entries.push(self.allocate_block()?);
                block_index += 1;
            }
            self.modify_data_block(inode.indirect, |indirect| {
                for (i, &block) in entries.iter().enumerate() {
                    put_u32(indirect, (first + i) * 4, block);
                }
            })?;
        }

        inode.size = larger_size;
        Ok(())
    }

    fn shrink_to(&mut self, inode: &mut Inode, smaller_size: u64) -> Result<()> {
        let block_size = self.block_size();
        let old_blocks = Inode::count_data_block(inode.size, block_size);
        let new_blocks = Inode::count_data_block(smaller_size, block_size);

        for block_index in new_blocks..old_blocks {
            let block = self.block_of(inode, block_index)?;
            self.free_block(block)?;
            if block_index < DIRECT_COUNT {
                inode.direct[block_index] = NO_BLOCK;
            }
        }
        if new_blocks <= DIRECT_COUNT {
            if let Some(indirect) = inode.indirect_block() {
                self.free_block(indirect)?;
                inode.indirect = NO_BLOCK;
            }
        }
        inode.size = smaller_size;

        // 末块中 size 之后的字节保持为零，再次扩展时读出的才是零
        let tail = (smaller_size % block_size as u64) as usize;
        if tail != 0 {
            let block = self.block_of(inode, new_blocks - 1)?;
            self.modify_data_block(block, |data| data[tail..].fill(0))?;
        }
        Ok(())
    }

    pub(crate) fn read_at(&mut self, inode: &Inode, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= inode.size {
            return Ok(0);
        }
        let block_size = self.block_size() as u64;
        let end = offset.saturating_add(buf.len() as u64).min(inode.size);

        let mut start = offset;
        let mut read = 0;
        while start < end {
            let block_index = (start / block_size) as usize;
            let block_end = ((start / block_size + 1) * block_size).min(end);
            let inner = (start % block_size) as usize;
            let len = (block_end - start) as usize;

            let block = self.block_of(inode, block_index)?;
            let dst = &mut buf[read..read + len];
            self.read_data_block(block, |data| dst.copy_from_slice(&data[inner..inner + len]))?;

            read += len;
            start = block_end;
        }
        Ok(read)
    }

    /// 写入超出 `size` 时先扩展 inode；空写入不改变 inode
    pub(crate) fn write_at(&mut self, inode: &mut Inode, offset: u64, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let block_size = self.block_size() as u64;
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(Error::FileTooLarge)?;
        if end > inode.size {
            self.resize(inode, end)?;
        }

        let mut start = offset;
        let mut written = 0;
        while start < end {
            let block_index = (start / block_size) as usize;
            let block_end = ((start / block_size + 1) * block_size).min(end);
            let inner = (start % block_size) as usize;
            let len = (block_end - start) as usize;

            let block = self.block_of(inode, block_index)?;
            let src = &buf[written..written + len];
            self.modify_data_block(block, |data| data[inner..inner + len].copy_from_slice(src))?;

            written += len;
            start = block_end;
        }

        inode.modified_at = now();
        Ok(written)
    }
}
