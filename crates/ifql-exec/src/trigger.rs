//! Triggers: when does a partition's builder become an emitted block.
//!
//! A trigger spec resolves to a small state machine consulted with the
//! current watermark, processing time, and finish flag. The default fires
//! once the watermark passes the partition's stop; firing clears the
//! partition's state.

use ifql_core::time::{Bounds, Duration, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSpec {
    /// Fire when `watermark >= bounds.stop + allowed_lateness`.
    AfterWatermark { allowed_lateness: Duration },
}

impl Default for TriggerSpec {
    fn default() -> Self {
        TriggerSpec::AfterWatermark {
            allowed_lateness: Duration(0),
        }
    }
}

impl TriggerSpec {
    pub fn create(&self) -> Box<dyn Trigger> {
        match *self {
            TriggerSpec::AfterWatermark { allowed_lateness } => {
                Box::new(WatermarkTrigger { allowed_lateness })
            }
        }
    }
}

/// Inputs at the moment a trigger is consulted for one partition.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext {
    pub bounds: Bounds,
    pub watermark: Time,
    pub processing_time: Time,
    /// All parents have finished; everything remaining must fire.
    pub finished: bool,
}

pub trait Trigger: Send {
    fn triggered(&mut self, cx: &TriggerContext) -> bool;
}

struct WatermarkTrigger {
    allowed_lateness: Duration,
}

impl Trigger for WatermarkTrigger {
    fn triggered(&mut self, cx: &TriggerContext) -> bool {
        cx.finished || cx.watermark >= cx.bounds.stop + self.allowed_lateness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx(watermark: i64, finished: bool) -> TriggerContext {
        TriggerContext {
            bounds: Bounds::new(Time(0), Time(10)),
            watermark: Time(watermark),
            processing_time: Time(0),
            finished,
        }
    }

    #[test]
    fn fires_at_stop_watermark() {
        let mut t = TriggerSpec::default().create();
        assert!(!t.triggered(&cx(9, false)));
        assert!(t.triggered(&cx(10, false)));
    }

    #[test]
    fn finish_forces_fire() {
        let mut t = TriggerSpec::default().create();
        assert!(t.triggered(&cx(0, true)));
    }

    #[test]
    fn lateness_delays_fire() {
        let mut t = TriggerSpec::AfterWatermark {
            allowed_lateness: Duration(5),
        }
        .create();
        assert!(!t.triggered(&cx(12, false)));
        assert!(t.triggered(&cx(15, false)));
    }
}
