use crate::layout::{Inode, InodeKind};
use crate::permission::Mode;
use crate::{FileSystem, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Inode number
    pub inode: u32,
    pub kind: InodeKind,
    pub mode: Mode,
    /// 硬链接个数
    pub links: u32,
    pub owner: u32,
    pub group: u32,
    /// File size
    pub size: u64,
    /// Occupying blocks，含间接索引块
    pub blocks: u64,
    /// Optimal I/O block size
    pub block_size: u32,
    pub created_at: u64,
    pub modified_at: u64,
}

impl FileSystem {
    /// 末段为符号链接时描述其目标
    pub fn stat(&mut self, path: &str) -> Result<Stat> {
        let resolved = self.resolve(path)?;
        self.stat_inode(resolved.inode)
    }

    /// 末段为符号链接时描述链接本身
    pub fn lstat(&mut self, path: &str) -> Result<Stat> {
        let resolved = self.resolve_nofollow(path)?;
        self.stat_inode(resolved.inode)
    }

    pub(crate) fn stat_inode(&self, id: u32) -> Result<Stat> {
        let inode = self.get_inode(id)?;
        let block_size = self.block_size();
        Ok(Stat {
            inode: inode.id,
            kind: inode.kind,
            mode: inode.mode,
            links: inode.links,
            owner: inode.owner,
            group: inode.group,
            size: inode.size,
            blocks: Inode::count_total_block(inode.size, block_size) as u64,
            block_size,
            created_at: inode.created_at,
            modified_at: inode.modified_at,
        })
    }
}
