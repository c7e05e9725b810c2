//! # 防抖调度
//!
//! 截图工具常在很短时间内多次写剪贴板（先写半成品，再写最终图）。
//! 调度器最多持有一个待处理的捕获：每次合格通知都会替换负载并重置截止时间，
//! 截止时间到达后只触发一次，使用的是最后一次通知的负载。
//!
//! 调度器本身不含定时器，只是一个状态机；由唯一的处理循环驱动，
//! 因此“取消并重新布置”天然是原子的，不会出现两次并发提取。

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct Pending<T> {
    deadline: Instant,
    payload: T,
    bursts: u32,
}

/// `arm` 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// 从空闲进入等待
    Armed,
    /// 替换了尚未触发的捕获，`bursts` 为当前这一轮累计的通知次数
    Superseded { bursts: u32 },
}

#[derive(Debug)]
pub struct DebounceScheduler<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

impl<T> DebounceScheduler<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 布置（或重新布置）一次捕获，截止时间为 `now + delay`。
    pub fn arm(&mut self, now: Instant, payload: T) -> ArmOutcome {
        let deadline = now + self.delay;
        match self.pending.as_mut() {
            Some(pending) => {
                pending.deadline = deadline;
                pending.payload = payload;
                pending.bursts = pending.bursts.saturating_add(1);
                ArmOutcome::Superseded {
                    bursts: pending.bursts,
                }
            }
            None => {
                self.pending = Some(Pending {
                    deadline,
                    payload,
                    bursts: 1,
                });
                ArmOutcome::Armed
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 截止时间已到则取出负载并回到空闲，否则什么也不做。
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        if self.pending.as_ref()?.deadline > now {
            return None;
        }
        self.pending.take().map(|pending| pending.payload)
    }

    /// 丢弃待处理的捕获。
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}
