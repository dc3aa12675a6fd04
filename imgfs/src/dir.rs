//! # 目录
//!
//! 目录的数据是定长目录项的有序序列，前两项恒为`.`与`..`，
//! `size` 恰为目录项总字节数。

use enumflags2::make_bitflags;

use crate::config::ROOT_INODE;
use crate::layout::{DiskDirEntry, Inode, InodeKind};
use crate::path::split_parent;
use crate::permission::{Access, Mode, check_permissions};
use crate::{Error, FileSystem, Result};

/// 列目录时返回的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode number
    pub inode: u32,
    pub kind: InodeKind,
    pub name: String,
}

impl FileSystem {
    pub fn create_file(&mut self, path: &str, mode: u16) -> Result<Inode> {
        self.create_node(path, Mode::new(mode), InodeKind::Regular, |_, _, _| Ok(()))
    }

    pub fn create_directory(&mut self, path: &str, mode: u16) -> Result<Inode> {
        self.create_node(path, Mode::new(mode), InodeKind::Directory, |fs, dir, parent| {
            let id = dir.id;
            fs.write_directory(
                dir,
                &[DiskDirEntry::new(".", id)?, DiskDirEntry::new("..", parent)?],
            )
        })
    }

    /// 删除空目录；根目录与当前目录不可删除
    pub fn remove_directory(&mut self, path: &str) -> Result<()> {
        let (parent, name, child) = self.prepare_removal(path)?;
        let mut dir = self.get_inode(child)?.clone();
        if !dir.is_dir() {
            return Err(Error::NotADirectory);
        }
        if child == ROOT_INODE || child == self.cwd {
            return Err(Error::Busy);
        }
        if self
            .read_directory(&dir)?
            .iter()
            .any(|entry| !matches!(entry.name(), "." | ".."))
        {
            return Err(Error::DirectoryNotEmpty);
        }

        self.remove_entry(parent, name)?;
        dir.links = dir.links.saturating_sub(1);
        self.put_inode(dir);
        self.free_inode(child)?;
        self.flush()?;

        log::debug!("remove directory {path:?} (inode {child})");
        Ok(())
    }

    /// 按存储顺序列出目录项，包括`.`与`..`；需要目录的读权限
    pub fn list_directory(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        let resolved = self.resolve(path)?;
        let dir = self.get_inode(resolved.inode)?.clone();
        if !dir.is_dir() {
            return Err(Error::NotADirectory);
        }
        if !check_permissions(&dir, Access::Read.into(), &self.principal) {
            return Err(Error::PermissionDenied);
        }

        self.read_directory(&dir)?
            .into_iter()
            .map(|entry| {
                Ok(DirEntry {
                    inode: entry.inode_id(),
                    kind: self.get_inode(entry.inode_id())?.kind,
                    name: entry.name().to_owned(),
                })
            })
            .collect()
    }

    /// 分配 inode、初始化其内容并登记到父目录；任一步失败都会撤销先前的步骤
    pub(crate) fn create_node(
        &mut self,
        path: &str,
        mode: Mode,
        kind: InodeKind,
        init: impl FnOnce(&mut Self, &mut Inode, u32) -> Result<()>,
    ) -> Result<Inode> {
        let (parent, name) = self.prepare_entry(path)?;
        let mut inode = self.allocate_inode(mode, kind)?;

        let result = match init(self, &mut inode, parent) {
            Ok(()) => {
                self.put_inode(inode.clone());
                self.add_entry(parent, name, inode.id)
            }
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.discard_inode(inode)?;
            return Err(err);
        }
        self.flush()?;

        log::debug!("create {kind:?} {path:?} (inode {})", inode.id);
        Ok(inode)
    }

    fn discard_inode(&mut self, mut inode: Inode) -> Result<()> {
        let id = inode.id;
        inode.links = 0;
        self.put_inode(inode);
        self.free_inode(id)
    }

    /// 检查新路径：父目录存在、可写可遍历，且名字未被占用。返回父目录与名字。
    pub(crate) fn prepare_entry<'p>(&mut self, path: &'p str) -> Result<(u32, &'p str)> {
        let (parent_path, name) = split_parent(path)?;
        if name.len() > DiskDirEntry::NAME_MAX_LEN {
            return Err(Error::NameTooLong);
        }

        let parent = self.writable_dir(parent_path)?;
        if self.lookup(&parent, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        Ok((parent.id, name))
    }

    /// 检查要删除的路径，返回父目录、名字与名字指向的 inode。末段不跟随符号链接。
    pub(crate) fn prepare_removal<'p>(&mut self, path: &'p str) -> Result<(u32, &'p str, u32)> {
        let (parent_path, name) = split_parent(path)?;
        if matches!(name, "." | "..") {
            return Err(Error::InvalidPath);
        }

        let parent = self.writable_dir(parent_path)?;
        let child = self.lookup(&parent, name)?.ok_or(Error::NoSuchEntry)?;
        Ok((parent.id, name, child))
    }

    fn writable_dir(&mut self, path: &str) -> Result<Inode> {
        let resolved = self.resolve(path)?;
        let dir = self.get_inode(resolved.inode)?;
        if !dir.is_dir() {
            return Err(Error::NotADirectory);
        }
        if !check_permissions(dir, make_bitflags!(Access::{Write | Execute}), &self.principal) {
            return Err(Error::PermissionDenied);
        }
        Ok(dir.clone())
    }

    pub(crate) fn read_directory(&mut self, dir: &Inode) -> Result<Vec<DiskDirEntry>> {
        let mut bytes = vec![0; dir.size as usize];
        self.read_at(dir, 0, &mut bytes)?;
        bytes
            .chunks_exact(DiskDirEntry::SIZE)
            .map(DiskDirEntry::decode)
            .collect()
    }

    /// 整体重写目录内容
    pub(crate) fn write_directory(&mut self, dir: &mut Inode, entries: &[DiskDirEntry]) -> Result<()> {
        let mut bytes = vec![0; entries.len() * DiskDirEntry::SIZE];
        for (entry, chunk) in entries.iter().zip(bytes.chunks_exact_mut(DiskDirEntry::SIZE)) {
            entry.encode(chunk);
        }

        let new_size = bytes.len() as u64;
        if new_size < dir.size {
            self.resize(dir, new_size)?;
        }
        self.write_at(dir, 0, &bytes)?;
        Ok(())
    }

    pub(crate) fn lookup(&mut self, dir: &Inode, name: &str) -> Result<Option<u32>> {
        Ok(self
            .read_directory(dir)?
            .into_iter()
            .find(|entry| entry.name() == name)
            .map(|entry| entry.inode_id()))
    }

    /// 在目录末尾追加一项
    pub(crate) fn add_entry(&mut self, parent: u32, name: &str, id: u32) -> Result<()> {
        let mut dir = self.get_inode(parent)?.clone();
        let mut buf = [0; DiskDirEntry::SIZE];
        DiskDirEntry::new(name, id)?.encode(&mut buf);

        let offset = dir.size;
        self.write_at(&mut dir, offset, &buf)?;
        self.put_inode(dir);
        Ok(())
    }

    /// 删除一项，其后的目录项依次前移。返回被删除项指向的 inode。
    pub(crate) fn remove_entry(&mut self, parent: u32, name: &str) -> Result<u32> {
        let mut dir = self.get_inode(parent)?.clone();
        let mut entries = self.read_directory(&dir)?;
        let index = entries
            .iter()
            .position(|entry| entry.name() == name)
            .ok_or(Error::NoSuchEntry)?;
        let removed = entries.remove(index);

        self.write_directory(&mut dir, &entries)?;
        self.put_inode(dir);
        Ok(removed.inode_id())
    }
}
