//! # 权限模型
//!
//! 每个 inode 带有 owner/group/other 三组 rwx 位。
//! 遍历目录需要执行权限，列出目录需要读权限。

use core::fmt::{self, Write};

use enumflags2::{BitFlags, bitflags};

use crate::config::ROOT_UID;
use crate::layout::Inode;
use crate::{Error, FileSystem, Result};

/// 访问类别
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Execute = 0b001,
    Write = 0b010,
    Read = 0b100,
}

/// 9 位权限位，高位多余的位被丢弃
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u16);

impl Mode {
    const OWNER_SHIFT: u16 = 6;
    const GROUP_SHIFT: u16 = 3;
    const OTHER_SHIFT: u16 = 0;

    #[inline]
    pub const fn new(bits: u16) -> Self {
        Self(bits & 0o777)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn owner(self) -> BitFlags<Access> {
        self.triad(Self::OWNER_SHIFT)
    }

    #[inline]
    pub fn group(self) -> BitFlags<Access> {
        self.triad(Self::GROUP_SHIFT)
    }

    #[inline]
    pub fn other(self) -> BitFlags<Access> {
        self.triad(Self::OTHER_SHIFT)
    }

    fn triad(self, shift: u16) -> BitFlags<Access> {
        BitFlags::from_bits_truncate(((self.0 >> shift) & 0o7) as u8)
    }
}

impl From<u16> for Mode {
    fn from(bits: u16) -> Self {
        Self::new(bits)
    }
}

/// 形如 `rwxr-xr-x`
impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for triad in [self.owner(), self.group(), self.other()] {
            for (access, c) in [(Access::Read, 'r'), (Access::Write, 'w'), (Access::Execute, 'x')] {
                f.write_char(if triad.contains(access) { c } else { '-' })?;
            }
        }
        Ok(())
    }
}

/// 发起操作的用户
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub uid: u32,
    pub gid: u32,
}

impl Principal {
    pub const ROOT: Self = Self::new(ROOT_UID, 0);

    #[inline]
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.uid == ROOT_UID
    }

    /// 属主或超级用户
    #[inline]
    pub fn owns(&self, inode: &Inode) -> bool {
        self.is_root() || self.uid == inode.owner
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::ROOT
    }
}

/// 按属主、属组、其他的顺序选出一组权限位，
/// 请求的每一位都被允许时返回真。超级用户总是被允许。
pub fn check_permissions(inode: &Inode, requested: BitFlags<Access>, principal: &Principal) -> bool {
    if principal.is_root() {
        return true;
    }

    let granted = if principal.uid == inode.owner {
        inode.mode.owner()
    } else if principal.gid == inode.group {
        inode.mode.group()
    } else {
        inode.mode.other()
    };
    granted.contains(requested)
}

/// 无条件修改属主与属组，调用者须事先完成授权
pub fn chown_inode(inode: &mut Inode, uid: u32, gid: u32) {
    inode.owner = uid;
    inode.group = gid;
}

pub fn set_permissions(inode: &mut Inode, mode: Mode) {
    inode.mode = mode;
}

impl FileSystem {
    /// 修改权限位，仅属主或超级用户可以执行
    pub fn chmod(&mut self, path: &str, mode: u16) -> Result<()> {
        let resolved = self.resolve(path)?;
        let mut inode = self.get_inode(resolved.inode)?.clone();
        if !self.principal.owns(&inode) {
            return Err(Error::PermissionDenied);
        }

        set_permissions(&mut inode, Mode::new(mode));
        self.put_inode(inode);
        self.flush()
    }

    /// 修改属主与属组，仅属主或超级用户可以执行
    pub fn chown(&mut self, path: &str, uid: u32, gid: u32) -> Result<()> {
        let resolved = self.resolve(path)?;
        let mut inode = self.get_inode(resolved.inode)?.clone();
        if !self.principal.owns(&inode) {
            return Err(Error::PermissionDenied);
        }

        chown_inode(&mut inode, uid, gid);
        self.put_inode(inode);
        self.flush()
    }
}
