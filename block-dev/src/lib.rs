//! # 块设备接口层
//!
//! 块设备以**块**为单位存储数据；[`BlockDevice`] 是对读写块设备的抽象。
//! 块的长度由调用者传入的缓冲区长度决定，同一设备上应始终使用同一块长。
//!
//! `imgfs` 通过块设备驱动读写镜像文件。

use std::any::Any;
use std::io;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 读取第 `block_id` 块，块长为 `buf.len()`
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()>;

    /// 写入第 `block_id` 块，块长为 `buf.len()`
    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()>;

    /// 将设备缓冲写入持久存储
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}
