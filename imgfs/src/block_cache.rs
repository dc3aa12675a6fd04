//! # 块缓存层
//!
//! 镜像读写慢于内存读写，因此把即将操作的块复制到内存中；
//! 块缓存层也会尝试返回已缓存的块。
//!
//! 每个文件系统会话拥有自己的缓存管理器，不存在全局缓存。
//! 缓存与设备同步后并不会移除块缓存，淘汰由缓存管理器调度执行。

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;

/// 内存中的块缓存
pub struct BlockCache {
    /// 缓存的数据
    data: Vec<u8>,
    /// 对应的块ID
    block_id: usize,
    /// 底层块设备的引用
    block_device: Arc<dyn BlockDevice>,
    /// 是否为脏块
    modified: bool,
}

impl BlockCache {
    pub fn new(
        block_id: usize,
        block_size: usize,
        block_device: Arc<dyn BlockDevice>,
    ) -> io::Result<Self> {
        let mut data = vec![0; block_size];
        block_device.read_block(block_id, &mut data)?;

        Ok(Self {
            data,
            block_id,
            block_device,
            modified: false,
        })
    }

    pub fn sync(&mut self) -> io::Result<()> {
        if self.modified {
            self.block_device.write_block(self.block_id, &self.data)?;
            self.modified = false;
        }
        Ok(())
    }

    #[inline]
    pub fn map<V>(&self, f: impl FnOnce(&[u8]) -> V) -> V {
        f(&self.data)
    }

    #[inline]
    pub fn map_mut<V>(&mut self, f: impl FnOnce(&mut [u8]) -> V) -> V {
        self.modified = true;
        f(&mut self.data)
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if let Err(err) = self.sync() {
            log::warn!("failed to write back block {}: {err}", self.block_id);
        }
    }
}

/// 块缓存管理，缓存、调度块缓存
pub struct BlockCacheManager {
    queue: VecDeque<BlockCache>,
    block_size: usize,
    block_device: Arc<dyn BlockDevice>,
}

impl BlockCacheManager {
    /// 块缓存个数的上限
    const CAPACITY: usize = 16;

    pub fn new(block_device: Arc<dyn BlockDevice>, block_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(Self::CAPACITY),
            block_size,
            block_device,
        }
    }

    // 块缓存调度策略：先进先出，淘汰时写回
    pub fn get(&mut self, block_id: usize) -> io::Result<&mut BlockCache> {
        if let Some(index) = self
            .queue
            .iter()
            .position(|cache| cache.block_id == block_id)
        {
            return Ok(&mut self.queue[index]);
        }

        if self.queue.len() == Self::CAPACITY {
            if let Some(mut victim) = self.queue.pop_front() {
                log::trace!("evict block cache {}", victim.block_id);
                victim.sync()?;
            }
        }

        let cache = BlockCache::new(block_id, self.block_size, self.block_device.clone())?;
        self.queue.push_back(cache);
        let last = self.queue.len() - 1;
        Ok(&mut self.queue[last])
    }

    /// 读取整块并交给 `f`
    #[inline]
    pub fn read<V>(&mut self, block_id: usize, f: impl FnOnce(&[u8]) -> V) -> io::Result<V> {
        Ok(self.get(block_id)?.map(f))
    }

    /// 修改整块，块被标记为脏
    #[inline]
    pub fn modify<V>(
        &mut self,
        block_id: usize,
        f: impl FnOnce(&mut [u8]) -> V,
    ) -> io::Result<V> {
        Ok(self.get(block_id)?.map_mut(f))
    }

    pub fn sync_all(&mut self) -> io::Result<()> {
        for cache in self.queue.iter_mut() {
            cache.sync()?;
        }
        self.block_device.flush()
    }
}
