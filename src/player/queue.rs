use crossbeam::queue::SegQueue;

use crate::core::Watermarks;

/// 带水位线的无锁队列
///
/// `enqueue` 永远不阻塞也不拒绝，生产者应当先检查 `is_full()`，满了就自我暂停；
/// 消费者出队后若 `is_below_min()` 则唤醒生产者。两个阈值避免了单阈值的
/// 唤醒/睡眠抖动。同一时刻最多超出 max 一个在途元素（每个生产者）。
pub struct BoundedQueue<T> {
    inner: SegQueue<T>,
    watermarks: Watermarks,
}

impl<T> BoundedQueue<T> {
    pub fn new(watermarks: Watermarks) -> Self {
        Self {
            inner: SegQueue::new(),
            watermarks,
        }
    }

    pub fn enqueue(&self, item: T) {
        self.inner.push(item);
    }

    pub fn try_dequeue(&self) -> Option<T> {
        self.inner.pop()
    }

    /// 近似长度（并发下只是快照）
    pub fn size(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.watermarks.max
    }

    pub fn is_below_min(&self) -> bool {
        self.size() < self.watermarks.min
    }

    pub fn min(&self) -> usize {
        self.watermarks.min
    }

    /// 丢弃所有元素，返回丢弃的数量
    pub fn clear(&self) -> usize {
        let mut count = 0;
        while self.inner.pop().is_some() {
            count += 1;
        }
        count
    }
}
