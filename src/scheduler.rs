//! Cooperative soft-timer scheduler (§4.7).
//!
//! Grounded on the "fixed-size array of `{deadline, period, task}`
//! triples" redesign note in §9, replacing the BeRTOS intrusive `List`
//! the original scheduler was built on: the task set here is static and
//! known at startup, so no dynamic registration is needed.

use crate::clock::elapsed_at_least;
use heapless::Vec;

pub const MAX_TASKS: usize = 4;

/// Identifies which registered task fired, so the main loop can match on
/// it without storing trait objects or closures (no_std-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    Sms,
    Console,
    Button,
}

struct Timer {
    id: TaskId,
    period_ms: u32,
    deadline_ms: u32,
    armed: bool,
}

/// A fixed-size list of soft timers, each firing at most once per
/// `poll()` call (§4.7 "Ordering").
pub struct Scheduler {
    timers: Vec<Timer, MAX_TASKS>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { timers: Vec::new() }
    }

    /// Register a task with the given period, starting armed (fires on
    /// the first poll at or after `now_ms + period_ms`).
    pub fn register(&mut self, id: TaskId, period_ms: u32, now_ms: u32) {
        let _ = self.timers.push(Timer {
            id,
            period_ms,
            deadline_ms: now_ms.wrapping_add(period_ms),
            armed: true,
        });
    }

    /// Arm or disarm a previously-registered task (e.g. the button task
    /// is only armed while the button is held, §4.8 step 4).
    pub fn set_armed(&mut self, id: TaskId, armed: bool, now_ms: u32) {
        for t in self.timers.iter_mut() {
            if t.id == id {
                t.armed = armed;
                if armed {
                    t.deadline_ms = now_ms.wrapping_add(t.period_ms);
                }
            }
        }
    }

    /// Walk the timer list once; any timer whose deadline has passed
    /// fires and is rearmed. Fired timers are collected into `out` in
    /// due order; a timer that fires during this poll does not re-fire
    /// within the same poll.
    pub fn poll(&mut self, now_ms: u32, out: &mut Vec<TaskId, MAX_TASKS>) {
        out.clear();
        for t in self.timers.iter_mut() {
            if t.armed && elapsed_at_least(now_ms, t.deadline_ms.wrapping_sub(t.period_ms), t.period_ms) {
                t.deadline_ms = now_ms.wrapping_add(t.period_ms);
                let _ = out.push(t.id);
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_period_elapsed() {
        let mut sched = Scheduler::new();
        sched.register(TaskId::Console, 1_000, 0);
        let mut out = Vec::new();
        sched.poll(500, &mut out);
        assert!(out.is_empty());
        sched.poll(1_000, &mut out);
        assert_eq!(out.as_slice(), &[TaskId::Console]);
    }

    #[test]
    fn disarmed_task_never_fires() {
        let mut sched = Scheduler::new();
        sched.register(TaskId::Button, 3_000, 0);
        sched.set_armed(TaskId::Button, false, 0);
        let mut out = Vec::new();
        sched.poll(10_000, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn rearming_resets_deadline_from_now() {
        let mut sched = Scheduler::new();
        sched.register(TaskId::Button, 3_000, 0);
        sched.set_armed(TaskId::Button, false, 0);
        sched.set_armed(TaskId::Button, true, 5_000);
        let mut out = Vec::new();
        sched.poll(7_000, &mut out);
        assert!(out.is_empty());
        sched.poll(8_000, &mut out);
        assert_eq!(out.as_slice(), &[TaskId::Button]);
    }
}
