use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTag {
    /// One-shot heuristic evaluation (event cadence).
    Evaluate,
    /// Periodic heuristic evaluation (poll cadence).
    Poll,
    /// Time-boxed overlay dismissal.
    AutoHide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Tick delivered back into the owner's queue when a timer elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub tag: TimerTag,
    pub handle: TimerHandle,
    /// App the timer was scheduled for.
    pub app: String,
}

/// Cancelable one-shot timers, at most one live timer per tag.
///
/// Timers only post [`TimerFired`] messages; the owner must call [`TimerQueue::claim`]
/// before acting so ticks that raced with a cancel are dropped.
pub struct TimerQueue {
    tx: UnboundedSender<TimerFired>,
    next_id: u64,
    pending: HashMap<TimerTag, (TimerHandle, JoinHandle<()>)>,
}

impl TimerQueue {
    pub fn new(tx: UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            next_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Schedule `tag` to fire after `delay`, replacing any pending timer with the same tag.
    pub fn schedule_after(&mut self, delay: Duration, tag: TimerTag, app: &str) -> TimerHandle {
        self.cancel_tag(tag);

        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        let tx = self.tx.clone();
        let fired = TimerFired {
            tag,
            handle,
            app: app.to_string(),
        };
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(fired);
        });

        self.pending.insert(tag, (handle, task));
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let tag = self
            .pending
            .iter()
            .find_map(|(tag, (h, _))| (*h == handle).then_some(*tag));
        match tag {
            Some(tag) => self.cancel_tag(tag),
            None => false,
        }
    }

    pub fn cancel_tag(&mut self, tag: TimerTag) -> bool {
        match self.pending.remove(&tag) {
            Some((_, task)) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, task)) in self.pending.drain() {
            task.abort();
        }
    }

    pub fn is_pending(&self, tag: TimerTag) -> bool {
        self.pending.contains_key(&tag)
    }

    /// Accept a fired tick if it is still the live timer for its tag.
    pub fn claim(&mut self, fired: &TimerFired) -> bool {
        match self.pending.get(&fired.tag) {
            Some((handle, _)) if *handle == fired.handle => {
                self.pending.remove(&fired.tag);
                true
            }
            _ => false,
        }
    }
}

impl Drop for TimerQueue {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
