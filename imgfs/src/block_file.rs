use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::BlockDevice;

/// 以宿主机上的普通文件作为块设备
#[derive(Debug)]
pub struct BlockFile {
    inner: Mutex<File>,
}

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self {
            inner: Mutex::new(fd),
        }
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, File>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("block file lock poisoned"))
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start((block_id * buf.len()) as u64))?;
        file.read_exact(buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start((block_id * buf.len()) as u64))?;
        file.write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        self.lock()?.flush()
    }
}
