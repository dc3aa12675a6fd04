//! # 文件描述符表
//!
//! 每个会话一张表，描述符是表中槽位的下标，新描述符总是占用最小的空槽位。
//! 多个描述符可以指向同一 inode，各自维护偏移。

use std::io::SeekFrom;

use enumflags2::{BitFlags, bitflags};

use crate::config::{DEFAULT_FILE_MODE, MAX_OPEN_FILES};
use crate::inode_table::now;
use crate::permission::{Access, check_permissions};
use crate::stat::Stat;
use crate::{Error, FileSystem, Result};

#[rustfmt::skip]
#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFlag {
    /// 只写
    WRONLY = 0b0000_0000_0001,
    /// 读写兼备
    RDWR   = 0b0000_0000_0010,
    /// 不存在时创建
    CREATE = 0b0001_0000_0000,
    /// 打开时清空
    TRUNC  = 0b0010_0000_0000,
    /// 每次写入前移到末尾
    APPEND = 0b0100_0000_0000,
    /// 与 CREATE 同用，文件已存在时失败
    EXCL   = 0b1000_0000_0000,
}

impl OpenFlag {
    // enumflags2拒绝值为0的标志
    /// 只读
    pub const RDONLY: u32 = 0b0000_0000_0000;

    #[inline]
    pub fn read_only() -> BitFlags<OpenFlag> {
        BitFlags::from_bits_truncate(Self::RDONLY)
    }

    /// 返回 `[可读, 可写]`
    fn access(flags: BitFlags<OpenFlag>) -> [bool; 2] {
        if flags.contains(OpenFlag::RDWR) {
            [true, true]
        } else if flags.contains(OpenFlag::WRONLY) {
            [false, true]
        } else {
            [true, false]
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub inode: u32,
    /// 当前读写位置
    pub offset: u64,
    pub flags: BitFlags<OpenFlag>,
}

impl FileDescriptor {
    #[inline]
    fn readable(&self) -> bool {
        OpenFlag::access(self.flags)[0]
    }

    #[inline]
    fn writable(&self) -> bool {
        OpenFlag::access(self.flags)[1]
    }
}

#[derive(Debug, Default)]
pub struct FdTable(Vec<Option<FileDescriptor>>);

impl FdTable {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// 插入新描述符至最小的空槽位，并返回槽位的索引
    pub fn insert(&mut self, descriptor: FileDescriptor) -> Result<usize> {
        let index = match self.0.iter().position(Option::is_none) {
            Some(index) => index,
            None if self.0.len() < MAX_OPEN_FILES => {
                self.0.push(None);
                self.0.len() - 1
            }
            None => return Err(Error::TooManyOpenFiles),
        };
        self.0[index] = Some(descriptor);
        Ok(index)
    }

    pub fn get(&self, fd: usize) -> Result<&FileDescriptor> {
        self.0
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(Error::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: usize) -> Result<&mut FileDescriptor> {
        self.0
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(Error::BadDescriptor)
    }

    pub fn remove(&mut self, fd: usize) -> Result<FileDescriptor> {
        self.0
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(Error::BadDescriptor)
    }

    /// 是否有描述符指向该 inode
    pub fn references(&self, inode: u32) -> bool {
        self.0.iter().flatten().any(|desc| desc.inode == inode)
    }

    pub fn len(&self) -> usize {
        self.0.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= MAX_OPEN_FILES
    }
}

impl FileSystem {
    /// 打开文件并返回描述符，偏移为 0。
    ///
    /// 带 [`OpenFlag::CREATE`] 且文件不存在时以 `mode` 创建；
    /// 末段为符号链接时跟随它，目录不能被打开。
    pub fn open_file(&mut self, path: &str, flags: BitFlags<OpenFlag>, mode: u16) -> Result<usize> {
        let [readable, writable] = OpenFlag::access(flags);
        if flags.contains(OpenFlag::TRUNC) && !writable {
            return Err(Error::InvalidArgument);
        }
        if self.fd_table.is_full() {
            return Err(Error::TooManyOpenFiles);
        }

        let (id, created) = match self.resolve(path) {
            Ok(_) if flags.contains(OpenFlag::CREATE | OpenFlag::EXCL) => {
                return Err(Error::AlreadyExists);
            }
            Ok(resolved) => (resolved.inode, false),
            Err(Error::NoSuchEntry) if flags.contains(OpenFlag::CREATE) => {
                // 末段是悬空的符号链接：不替它创建目标
                if self.resolve_nofollow(path).is_ok() {
                    return Err(Error::NoSuchEntry);
                }
                (self.create_file(path, mode)?.id, true)
            }
            Err(err) => return Err(err),
        };

        let mut inode = self.get_inode(id)?.clone();
        if inode.is_dir() {
            return Err(Error::IsADirectory);
        }
        // 新建的文件不受其权限位限制
        if !created {
            let mut requested = BitFlags::empty();
            if readable {
                requested |= Access::Read;
            }
            if writable {
                requested |= Access::Write;
            }
            if !check_permissions(&inode, requested, &self.principal) {
                return Err(Error::PermissionDenied);
            }
        }

        if flags.contains(OpenFlag::TRUNC) && inode.size != 0 {
            self.resize(&mut inode, 0)?;
            inode.modified_at = now();
            self.put_inode(inode);
            self.flush()?;
        }

        let fd = self.fd_table.insert(FileDescriptor {
            inode: id,
            offset: 0,
            flags,
        })?;

        log::debug!("open {path:?} as fd {fd} (inode {id}, {flags:?})");
        Ok(fd)
    }

    /// 以默认权限位打开，创建时使用 `rw-r--r--`
    #[inline]
    pub fn open(&mut self, path: &str, flags: BitFlags<OpenFlag>) -> Result<usize> {
        self.open_file(path, flags, DEFAULT_FILE_MODE)
    }

    /// 从当前偏移读取，返回读到的字节数；到达末尾时返回 0
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let desc = self.fd_table.get(fd)?;
        if !desc.readable() {
            return Err(Error::BadDescriptor);
        }
        let (id, offset) = (desc.inode, desc.offset);

        let inode = self.get_inode(id)?.clone();
        let read = self.read_at(&inode, offset, buf)?;
        self.fd_table.get_mut(fd)?.offset += read as u64;
        Ok(read)
    }

    /// 从当前偏移写入，超出末尾时文件随之增长
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        let desc = self.fd_table.get(fd)?;
        if !desc.writable() {
            return Err(Error::BadDescriptor);
        }
        let (id, append) = (desc.inode, desc.flags.contains(OpenFlag::APPEND));

        let mut inode = self.get_inode(id)?.clone();
        let offset = if append { inode.size } else { desc.offset };
        let written = self.write_at(&mut inode, offset, buf)?;
        self.put_inode(inode);
        self.fd_table.get_mut(fd)?.offset = offset + written as u64;
        self.flush()?;
        Ok(written)
    }

    /// 移动偏移并返回新的偏移，允许越过末尾
    pub fn seek(&mut self, fd: usize, pos: SeekFrom) -> Result<u64> {
        let desc = self.fd_table.get(fd)?;
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (offset, 0),
            SeekFrom::Current(delta) => (desc.offset, delta),
            SeekFrom::End(delta) => (self.get_inode(desc.inode)?.size, delta),
        };
        let offset = base
            .checked_add_signed(delta)
            .ok_or(Error::InvalidArgument)?;

        self.fd_table.get_mut(fd)?.offset = offset;
        Ok(offset)
    }

    /// 释放描述符；若它是孤儿 inode 的最后一个描述符，交由链接层回收该 inode
    pub fn close(&mut self, fd: usize) -> Result<()> {
        let desc = self.fd_table.remove(fd)?;
        self.release(desc.inode)?;
        self.flush()?;

        log::debug!("close fd {fd} (inode {})", desc.inode);
        Ok(())
    }

    pub fn fstat(&self, fd: usize) -> Result<Stat> {
        let desc = self.fd_table.get(fd)?;
        self.stat_inode(desc.inode)
    }

    /// 当前打开的描述符个数
    #[inline]
    pub fn open_files(&self) -> usize {
        self.fd_table.len()
    }
}
