/// 数据块位图，第 i 位记录数据块 i 是否已被占用。
///
/// 会话期间常驻内存，由 [`FileSystem`](crate::FileSystem) 在同步时整体写回位图区域。
#[derive(Debug, Clone)]
pub struct Bitmap {
    bits: Vec<u64>,
    /// 位图所指示区域的总块数
    capacity: usize,
    /// 自上次写回以来是否被修改
    dirty: bool,
}

impl Bitmap {
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; capacity.div_ceil(64)],
            capacity,
            dirty: true,
        }
    }

    /// 从位图区域的字节恢复，字节内低位在前
    pub fn from_bytes(bytes: &[u8], capacity: usize) -> Self {
        let mut bitmap = Self::new(capacity);
        for (word, chunk) in bitmap.bits.iter_mut().zip(bytes.chunks(8)) {
            let mut raw = [0; 8];
            raw[..chunk.len()].copy_from_slice(chunk);
            *word = u64::from_le_bytes(raw);
        }
        // 超出容量的位没有意义
        if let Some(last) = bitmap.bits.last_mut() {
            let tail = capacity % 64;
            if tail != 0 {
                *last &= (1 << tail) - 1;
            }
        }
        bitmap.dirty = false;
        bitmap
    }

    /// 写入位图区域的字节，`bytes` 不短于 `capacity / 8` 向上取整
    pub fn write_bytes(&self, bytes: &mut [u8]) {
        for (chunk, word) in bytes.chunks_mut(8).zip(&self.bits) {
            let len = chunk.len();
            chunk.copy_from_slice(&word.to_le_bytes()[..len]);
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// 分配编号最小的空闲块，返回其编号；位图用尽时返回空。
    pub fn alloc(&mut self) -> Option<u32> {
        // 寻找还有 0 的 bit 组
        let (group_index, ingroup_index) = self
            .bits
            .iter()
            .enumerate()
            .find_map(|(group_index, &bits)| {
                (bits != u64::MAX).then_some((group_index, bits.trailing_ones() as usize))
            })?;

        let index = group_index * 64 + ingroup_index;
        if index >= self.capacity {
            return None;
        }

        self.bits[group_index] |= 1 << ingroup_index;
        self.dirty = true;
        Some(index as u32)
    }

    /// 释放块，若原本就空闲则什么也不做。返回该块此前是否被占用。
    pub fn dealloc(&mut self, index: u32) -> bool {
        let (group_index, ingroup_index) = Self::locate(index);
        let was_set = self.bits[group_index] & (1 << ingroup_index) != 0;
        if was_set {
            self.bits[group_index] &= !(1 << ingroup_index);
            self.dirty = true;
        }
        was_set
    }

    #[inline]
    pub fn is_set(&self, index: u32) -> bool {
        let (group_index, ingroup_index) = Self::locate(index);
        self.bits[group_index] & (1 << ingroup_index) != 0
    }

    pub fn count_free(&self) -> usize {
        let used: u32 = self.bits.iter().map(|bits| bits.count_ones()).sum();
        self.capacity - used as usize
    }

    #[inline]
    fn locate(index: u32) -> (usize, usize) {
        let index = index as usize;
        (index / 64, index % 64)
    }
}

#[cfg(test)]
mod tests {
    use super::Bitmap;

    #[test]
    fn lowest_free_first() {
        let mut bitmap = Bitmap::new(130);
        for expected in 0..70 {
            assert_eq!(Some(expected), bitmap.alloc());
        }
        assert!(bitmap.dealloc(3));
        assert!(bitmap.dealloc(65));
        assert_eq!(Some(3), bitmap.alloc());
        assert_eq!(Some(65), bitmap.alloc());
        assert_eq!(Some(70), bitmap.alloc());
    }

    #[test]
    fn exhaustion_and_double_free() {
        let mut bitmap = Bitmap::new(5);
        for _ in 0..5 {
            bitmap.alloc().unwrap();
        }
        assert_eq!(None, bitmap.alloc());
        assert_eq!(0, bitmap.count_free());

        assert!(bitmap.dealloc(4));
        assert!(!bitmap.dealloc(4));
        assert_eq!(1, bitmap.count_free());
    }

    #[test]
    fn bytes_are_lsb_first() {
        let mut bitmap = Bitmap::new(20);
        bitmap.alloc();
        bitmap.alloc();
        bitmap.alloc();
        bitmap.dealloc(1);
        let mut bytes = [0; 3];
        bitmap.write_bytes(&mut bytes);
        assert_eq!([0b101, 0, 0], bytes);

        let restored = Bitmap::from_bytes(&bytes, 20);
        assert!(restored.is_set(0));
        assert!(!restored.is_set(1));
        assert!(restored.is_set(2));
        assert_eq!(18, restored.count_free());
    }
}
