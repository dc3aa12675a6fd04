//! # 分区管理层
//!
//! 构建出镜像的布局并使用。[`FileSystem`] 是一次挂载会话，独占镜像文件；
//! 位图与 inode 表常驻内存，每次结构性修改之后写回镜像。

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::path::Path as HostPath;
use std::sync::Arc;

use block_dev::BlockDevice;

use crate::block_cache::BlockCacheManager;
use crate::config::{INODE_SIZE, ROOT_INODE, ROOT_MODE};
use crate::fd::FdTable;
use crate::layout::{Bitmap, DiskDirEntry, Inode, InodeKind, SuperBlock};
use crate::permission::{Mode, Principal};
use crate::{BlockFile, Error, Result};

pub struct FileSystem {
    pub(crate) cache: BlockCacheManager,
    pub(crate) super_block: SuperBlock,
    /// 数据块位图的内存镜像
    pub(crate) bitmap: Bitmap,
    /// 以 inode 编号为下标的表，`None` 为未使用的槽位
    pub(crate) inodes: Vec<Option<Inode>>,
    /// 尚未写回的 inode
    pub(crate) dirty_inodes: BTreeSet<u32>,
    pub(crate) fd_table: FdTable,
    /// 当前目录
    pub(crate) cwd: u32,
    /// 当前目录的绝对路径，非根时不以`/`结束
    pub(crate) cwd_path: String,
    pub(crate) principal: Principal,
}

impl FileSystem {
    /// 创建（或截断）镜像文件并格式化，根目录属于超级用户，权限为 `rwxr-xr-x`。
    pub fn init_partition(
        path: impl AsRef<HostPath>,
        total_size: u64,
        block_size: u32,
    ) -> Result<Self> {
        let super_block = SuperBlock::new(total_size, block_size)?;

        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        // 截断后重新扩展的部分全部为零，位图与 inode 表因此天然为空
        fd.set_len(total_size)?;
        let block_device: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));

        let cache = BlockCacheManager::new(block_device, block_size as usize);
        let bitmap = Bitmap::new(super_block.data_blocks as usize);
        let inodes = vec![None; super_block.inode_count as usize];
        let mut fs = Self::assemble(cache, super_block, bitmap, inodes);

        let header = &fs.super_block;
        fs.cache.modify(0, |block| header.encode(block))?;

        let mut root = fs.allocate_inode(Mode::new(ROOT_MODE), InodeKind::Directory)?;
        if root.id != ROOT_INODE {
            return Err(Error::Corrupted);
        }
        fs.write_directory(
            &mut root,
            &[
                DiskDirEntry::new(".", ROOT_INODE)?,
                DiskDirEntry::new("..", ROOT_INODE)?,
            ],
        )?;
        fs.put_inode(root);
        fs.flush()?;

        log::info!(
            "format image: {} blocks of {} bytes, {} inodes, data region {}+{}",
            fs.super_block.total_blocks,
            block_size,
            fs.super_block.inode_count,
            fs.super_block.data_start,
            fs.super_block.data_blocks,
        );
        Ok(fs)
    }

    /// 挂载已有的镜像，并回收上次会话遗留的孤儿 inode。
    pub fn mount(path: impl AsRef<HostPath>) -> Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let block_device: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));

        // 块大小未知，只读取头部所在的前若干字节
        let mut header = [0; SuperBlock::SIZE];
        block_device.read_block(0, &mut header)?;
        let super_block = SuperBlock::decode(&header);
        if !super_block.is_valid() || !super_block.is_consistent() {
            return Err(Error::Corrupted);
        }

        let block_size = super_block.block_size as usize;
        let mut cache = BlockCacheManager::new(block_device, block_size);

        let mut bitmap_bytes = Vec::with_capacity(super_block.bitmap_blocks as usize * block_size);
        for i in 0..super_block.bitmap_blocks {
            let block_id = (super_block.bitmap_start + i) as usize;
            cache.read(block_id, |block| bitmap_bytes.extend_from_slice(block))?;
        }
        let bitmap = Bitmap::from_bytes(&bitmap_bytes, super_block.data_blocks as usize);

        let per_block = block_size / INODE_SIZE;
        let mut inodes = Vec::with_capacity(super_block.inode_count as usize);
        for i in 0..super_block.inode_table_blocks {
            let block_id = (super_block.inode_table_start + i) as usize;
            let first = i as usize * per_block;
            let records = per_block.min(super_block.inode_count as usize - first);
            cache.read(block_id, |block| {
                block
                    .chunks_exact(INODE_SIZE)
                    .take(records)
                    .enumerate()
                    .try_for_each(|(j, record)| {
                        inodes.push(Inode::decode((first + j) as u32, record)?);
                        Ok::<(), Error>(())
                    })
            })??;
        }

        if !inodes
            .get(super_block.root_inode as usize)
            .and_then(Option::as_ref)
            .is_some_and(Inode::is_dir)
        {
            return Err(Error::Corrupted);
        }

        let mut fs = Self::assemble(cache, super_block, bitmap, inodes);
        fs.reclaim_orphans()?;
        fs.flush()?;

        log::info!(
            "open image: {} blocks of {} bytes, {} free blocks, {} free inodes",
            fs.super_block.total_blocks,
            fs.super_block.block_size,
            fs.free_blocks(),
            fs.free_inodes(),
        );
        Ok(fs)
    }

    fn assemble(
        cache: BlockCacheManager,
        super_block: SuperBlock,
        bitmap: Bitmap,
        inodes: Vec<Option<Inode>>,
    ) -> Self {
        Self {
            cache,
            super_block,
            bitmap,
            inodes,
            dirty_inodes: BTreeSet::new(),
            fd_table: FdTable::new(),
            cwd: ROOT_INODE,
            cwd_path: String::from("/"),
            principal: Principal::ROOT,
        }
    }

    /// 把脏 inode、位图与缓存中的块写回镜像
    pub fn flush(&mut self) -> Result<()> {
        let block_size = self.block_size() as usize;

        if self.bitmap.is_dirty() {
            let mut bytes = vec![0; self.super_block.bitmap_blocks as usize * block_size];
            self.bitmap.write_bytes(&mut bytes);
            for (i, chunk) in bytes.chunks(block_size).enumerate() {
                let block_id = self.super_block.bitmap_start as usize + i;
                self.cache.modify(block_id, |block| block.copy_from_slice(chunk))?;
            }
            self.bitmap.mark_clean();
        }

        while let Some(&id) = self.dirty_inodes.first() {
            let (block_id, offset) = self.inode_pos(id);
            let record = self.inodes[id as usize].as_ref();
            self.cache.modify(block_id, |block| match record {
                Some(inode) => inode.encode(&mut block[offset..]),
                None => Inode::encode_unused(&mut block[offset..]),
            })?;
            self.dirty_inodes.remove(&id);
        }

        self.cache.sync_all()?;
        Ok(())
    }

    /// inode 记录所在的块与块内偏移
    #[inline]
    fn inode_pos(&self, id: u32) -> (usize, usize) {
        let byte = id as usize * INODE_SIZE;
        let block_size = self.block_size() as usize;
        (
            self.super_block.inode_table_start as usize + byte / block_size,
            byte % block_size,
        )
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.super_block.block_size
    }

    #[inline]
    pub fn total_blocks(&self) -> u32 {
        self.super_block.total_blocks
    }

    #[inline]
    pub fn data_blocks(&self) -> u32 {
        self.super_block.data_blocks
    }

    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.bitmap.count_free()
    }

    pub fn free_inodes(&self) -> usize {
        self.inodes.iter().filter(|slot| slot.is_none()).count()
    }

    #[inline]
    pub fn current_directory(&self) -> u32 {
        self.cwd
    }

    #[inline]
    pub fn current_path(&self) -> &str {
        &self.cwd_path
    }

    #[inline]
    pub fn principal(&self) -> Principal {
        self.principal
    }

    /// 切换发起后续操作的用户
    pub fn set_principal(&mut self, principal: Principal) {
        log::debug!("switch principal to {}:{}", principal.uid, principal.gid);
        self.principal = principal;
    }
}

impl Drop for FileSystem {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            log::warn!("failed to flush image on unmount: {err}");
        }
    }
}
