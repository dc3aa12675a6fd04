//! # 链接
//!
//! 硬链接是指向已有 inode 的新目录项，引用计数随之加一；
//! 符号链接是独立的 inode，数据为目标路径的字面值，解析时再走一遍路径。
//!
//! 引用计数归零的 inode 若仍被文件描述符打开，则成为孤儿，
//! 等最后一个描述符关闭（或下次挂载）时再回收。

use crate::config::SYMLINK_MODE;
use crate::layout::{Inode, InodeKind};
use crate::permission::Mode;
use crate::{Error, FileSystem, Result};

impl FileSystem {
    /// 为 `existing_path` 指向的 inode 增加名字 `new_path`。末段不跟随符号链接。
    pub fn create_hard_link(&mut self, existing_path: &str, new_path: &str) -> Result<()> {
        let target = self.resolve_nofollow(existing_path)?;
        let mut inode = self.get_inode(target.inode)?.clone();
        if inode.is_dir() {
            return Err(Error::IsADirectory);
        }

        let (parent, name) = self.prepare_entry(new_path)?;
        self.add_entry(parent, name, inode.id)?;
        inode.links += 1;
        self.put_inode(inode);
        self.flush()?;

        log::debug!("link {new_path:?} -> {} (inode {})", target.path, target.inode);
        Ok(())
    }

    /// 创建符号链接，目标不必存在
    pub fn create_soft_link(&mut self, target: &str, new_path: &str) -> Result<Inode> {
        if target.is_empty() {
            return Err(Error::InvalidArgument);
        }

        self.create_node(
            new_path,
            Mode::new(SYMLINK_MODE),
            InodeKind::SymbolicLink,
            |fs, link, _| fs.write_at(link, 0, target.as_bytes()).map(|_| ()),
        )
    }

    /// 读取符号链接本身存储的目标路径
    pub fn read_link(&mut self, path: &str) -> Result<String> {
        let resolved = self.resolve_nofollow(path)?;
        let link = self.get_inode(resolved.inode)?.clone();
        self.symlink_target(&link)
    }

    pub(crate) fn symlink_target(&mut self, link: &Inode) -> Result<String> {
        if !link.is_symlink() {
            return Err(Error::NotASymlink);
        }

        let mut bytes = vec![0; link.size as usize];
        self.read_at(link, 0, &mut bytes)?;
        String::from_utf8(bytes).map_err(|_| Error::Corrupted)
    }

    /// 删除一个非目录的名字。引用计数归零且没有描述符打开它时释放 inode。
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let (parent, name, child) = self.prepare_removal(path)?;
        let mut inode = self.get_inode(child)?.clone();
        if inode.is_dir() {
            return Err(Error::IsADirectory);
        }

        self.remove_entry(parent, name)?;
        inode.links = inode.links.saturating_sub(1);
        let links = inode.links;
        self.put_inode(inode);
        if links == 0 {
            self.release(child)?;
        }
        self.flush()?;

        log::debug!("unlink {path:?} (inode {child}, {links} links left)");
        Ok(())
    }

    /// 回收引用计数为零的 inode；仍被打开时保留为孤儿
    pub(crate) fn release(&mut self, id: u32) -> Result<()> {
        if self.get_inode(id)?.links != 0 {
            return Ok(());
        }
        if self.fd_table.references(id) {
            log::debug!("inode {id} is orphaned until its last descriptor closes");
            return Ok(());
        }
        self.free_inode(id)
    }

    /// 挂载时回收上次会话遗留的孤儿
    pub(crate) fn reclaim_orphans(&mut self) -> Result<()> {
        let orphans: Vec<u32> = self
            .inodes
            .iter()
            .flatten()
            .filter(|inode| inode.links == 0)
            .map(|inode| inode.id)
            .collect();

        for id in orphans {
            log::debug!("reclaim orphaned inode {id}");
            self.release(id)?;
        }
        Ok(())
    }
}
