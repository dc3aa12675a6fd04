use super::{get_u32, put_u32};
use crate::config::DIR_ENTRY_SIZE;
use crate::{Error, Result};

/// 目录项：inode 编号 | 名字长度 | 名字
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskDirEntry {
    name: String,
    inode_id: u32,
}

impl DiskDirEntry {
    /// 目录项大小恒为64字节
    pub const SIZE: usize = DIR_ENTRY_SIZE;
    pub const NAME_MAX_LEN: usize = DIR_ENTRY_SIZE - 5;

    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        if name.len() > Self::NAME_MAX_LEN {
            return Err(Error::NameTooLong);
        }

        Ok(Self {
            name: name.to_owned(),
            inode_id,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let buf = &mut buf[..Self::SIZE];
        buf.fill(0);
        put_u32(buf, 0, self.inode_id);
        buf[4] = self.name.len() as u8;
        buf[5..5 + self.name.len()].copy_from_slice(self.name.as_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let len = buf[4] as usize;
        if len > Self::NAME_MAX_LEN {
            return Err(Error::Corrupted);
        }
        let name = core::str::from_utf8(&buf[5..5 + len]).map_err(|_| Error::Corrupted)?;

        Ok(Self {
            name: name.to_owned(),
            inode_id: get_u32(buf, 0),
        })
    }
}
