use std::io;

use derive_more::Display;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    /// 镜像文件无法读写，会话不可继续
    #[display(fmt = "I/O failure on backing image: {}", _0)]
    Io(io::Error),
    #[display(fmt = "image size cannot hold the metadata regions and one data block")]
    InvalidSize,
    #[display(fmt = "no free data block")]
    NoSpace,
    #[display(fmt = "inode table is full")]
    NoInodes,
    #[display(fmt = "invalid inode {}", _0)]
    InvalidInode(u32),
    #[display(fmt = "block index {} out of range", _0)]
    OutOfRange(u32),
    #[display(fmt = "permission denied")]
    PermissionDenied,
    #[display(fmt = "no such file or directory")]
    NoSuchEntry,
    #[display(fmt = "entry already exists")]
    AlreadyExists,
    #[display(fmt = "not a directory")]
    NotADirectory,
    #[display(fmt = "is a directory")]
    IsADirectory,
    #[display(fmt = "too many levels of symbolic links")]
    TooManySymlinks,
    #[display(fmt = "directory not empty")]
    DirectoryNotEmpty,
    #[display(fmt = "file name too long")]
    NameTooLong,
    #[display(fmt = "invalid path")]
    InvalidPath,
    #[display(fmt = "invalid argument")]
    InvalidArgument,
    #[display(fmt = "not a symbolic link")]
    NotASymlink,
    #[display(fmt = "bad file descriptor")]
    BadDescriptor,
    #[display(fmt = "too many open files")]
    TooManyOpenFiles,
    /// 仍被目录项或文件描述符引用的 inode 不可释放
    #[display(fmt = "inode {} is still referenced", _0)]
    InodeInUse(u32),
    #[display(fmt = "resource busy")]
    Busy,
    #[display(fmt = "file too large")]
    FileTooLarge,
    #[display(fmt = "image is corrupted")]
    Corrupted,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}
