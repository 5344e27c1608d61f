//! Gain automation
//!
//! `GainParam` is a timeline of automation events evaluated against the
//! audio clock, the same model as a Web Audio `AudioParam`:
//!
//! - `SetValue` jumps to a value at a time
//! - `LinearRamp` moves linearly from the previous event's end point to a
//!   value, arriving at its end time
//! - `SetTarget` approaches a target exponentially from its start time,
//!   `v(t) = target + (v0 - target) * e^(-(t - t0) / tau)`
//!
//! `GainStage` wraps a param for sharing between the control side and the
//! render thread, and only ever schedules through the fixed
//! cancel → snapshot → schedule sequence, so two ramps never overlap on one
//! stage.

use parking_lot::Mutex;
use std::sync::Arc;

/// One scheduled automation event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationEvent {
    SetValue {
        time: f64,
        value: f32,
    },
    LinearRamp {
        end_time: f64,
        value: f32,
    },
    SetTarget {
        start_time: f64,
        target: f32,
        time_constant: f64,
    },
}

impl AutomationEvent {
    /// The time that orders this event on the timeline
    pub fn time(&self) -> f64 {
        match *self {
            AutomationEvent::SetValue { time, .. } => time,
            AutomationEvent::LinearRamp { end_time, .. } => end_time,
            AutomationEvent::SetTarget { start_time, .. } => start_time,
        }
    }
}

/// Shape of the value between two events
#[derive(Debug, Clone, Copy)]
enum Curve {
    Hold(f32),
    Approach {
        start: f64,
        from: f32,
        target: f32,
        time_constant: f64,
    },
}

impl Curve {
    fn eval(&self, t: f64) -> f32 {
        match *self {
            Curve::Hold(v) => v,
            Curve::Approach {
                start,
                from,
                target,
                time_constant,
            } => {
                if time_constant <= 0.0 || t <= start {
                    return if time_constant <= 0.0 { target } else { from };
                }
                let decay = (-(t - start) / time_constant).exp() as f32;
                target + (from - target) * decay
            }
        }
    }
}

/// Automation timeline for one gain value
#[derive(Debug, Clone)]
pub struct GainParam {
    /// Value before the first event
    default_value: f32,
    /// Events ordered by `time()`
    events: Vec<AutomationEvent>,
}

impl GainParam {
    pub fn new(value: f32) -> Self {
        Self {
            default_value: value,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        let time = event.time();
        let index = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(index, event);
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent::SetValue { time, value });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(AutomationEvent::LinearRamp { end_time, value });
    }

    pub fn set_target_at_time(&mut self, target: f32, start_time: f64, time_constant: f64) {
        self.insert(AutomationEvent::SetTarget {
            start_time,
            target,
            time_constant,
        });
    }

    /// Remove every event at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Value of the param at time `t`
    pub fn value_at(&self, t: f64) -> f32 {
        let mut curve = Curve::Hold(self.default_value);
        let mut prev_time = 0.0;

        for event in &self.events {
            match *event {
                AutomationEvent::SetValue { time, value } => {
                    if t < time {
                        return curve.eval(t);
                    }
                    curve = Curve::Hold(value);
                    prev_time = time;
                }
                AutomationEvent::LinearRamp { end_time, value } => {
                    if t < end_time {
                        if t <= prev_time {
                            return curve.eval(t);
                        }
                        let from = curve.eval(prev_time);
                        let span = end_time - prev_time;
                        let frac = ((t - prev_time) / span) as f32;
                        return from + (value - from) * frac;
                    }
                    curve = Curve::Hold(value);
                    prev_time = end_time;
                }
                AutomationEvent::SetTarget {
                    start_time,
                    target,
                    time_constant,
                } => {
                    if t < start_time {
                        return curve.eval(t);
                    }
                    let from = curve.eval(start_time);
                    curve = Curve::Approach {
                        start: start_time,
                        from,
                        target,
                        time_constant,
                    };
                    prev_time = start_time;
                }
            }
        }

        curve.eval(t)
    }

    /// Collapse events that no longer affect values at or after `now`
    pub fn prune(&mut self, now: f64) {
        let settled = self.events.iter().rposition(|e| {
            matches!(
                e,
                AutomationEvent::SetValue { .. } | AutomationEvent::LinearRamp { .. }
            ) && e.time() <= now
        });
        if let Some(index) = settled {
            if index == 0 {
                return;
            }
            let anchor = match self.events[index] {
                AutomationEvent::SetValue { time, value } => AutomationEvent::SetValue { time, value },
                AutomationEvent::LinearRamp { end_time, value } => AutomationEvent::SetValue {
                    time: end_time,
                    value,
                },
                AutomationEvent::SetTarget { .. } => return,
            };
            self.events.drain(..=index);
            self.events.insert(0, anchor);
        }
    }

    /// Where the last scheduled event is heading
    pub fn pending_target(&self) -> Option<f32> {
        self.events.last().map(|e| match *e {
            AutomationEvent::SetValue { value, .. } => value,
            AutomationEvent::LinearRamp { value, .. } => value,
            AutomationEvent::SetTarget { target, .. } => target,
        })
    }

    /// End time of the latest scheduled linear ramp
    pub fn ramp_end_time(&self) -> Option<f64> {
        self.events.iter().rev().find_map(|e| match *e {
            AutomationEvent::LinearRamp { end_time, .. } => Some(end_time),
            _ => None,
        })
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }
}

/// The volume-control stage of one source, shared with the render thread
#[derive(Debug, Clone)]
pub struct GainStage {
    param: Arc<Mutex<GainParam>>,
}

impl GainStage {
    pub fn new(initial: f32) -> Self {
        Self {
            param: Arc::new(Mutex::new(GainParam::new(clamp_gain(initial)))),
        }
    }

    /// Cancel pending changes, then hold the value the stage produces now.
    /// Returns that value.
    fn reschedule(param: &mut GainParam, now: f64) -> f32 {
        let current = param.value_at(now);
        param.cancel_scheduled_values(now);
        param.prune(now);
        param.set_value_at_time(current, now);
        current
    }

    /// Current gain
    pub fn value_at(&self, t: f64) -> f32 {
        self.param.lock().value_at(t)
    }

    /// Jump to `value` at `now`, dropping any pending ramp
    pub fn set_value(&self, value: f32, now: f64) {
        let mut param = self.param.lock();
        Self::reschedule(&mut param, now);
        param.cancel_scheduled_values(now);
        param.set_value_at_time(clamp_gain(value), now);
    }

    /// Ramp linearly from the current value to `target` over `duration`.
    /// Returns the value the ramp starts from.
    pub fn ramp_to(&self, target: f32, now: f64, duration: f64) -> f32 {
        let mut param = self.param.lock();
        let current = Self::reschedule(&mut param, now);
        param.linear_ramp_to_value_at_time(clamp_gain(target), now + duration.max(0.0));
        tracing::trace!(from = current, target, duration, "gain ramp scheduled");
        current
    }

    /// Ramp linearly from `from` to `target` over `duration`
    pub fn ramp_from(&self, from: f32, target: f32, now: f64, duration: f64) {
        let mut param = self.param.lock();
        Self::reschedule(&mut param, now);
        param.cancel_scheduled_values(now);
        param.set_value_at_time(clamp_gain(from), now);
        param.linear_ramp_to_value_at_time(clamp_gain(target), now + duration.max(0.0));
        tracing::trace!(from, target, duration, "gain ramp scheduled");
    }

    /// Approach `target` exponentially with the given time constant
    pub fn approach(&self, target: f32, now: f64, time_constant: f64) {
        let mut param = self.param.lock();
        Self::reschedule(&mut param, now);
        param.set_target_at_time(clamp_gain(target), now, time_constant);
        tracing::trace!(target, time_constant, "gain approach scheduled");
    }

    /// Target of the pending automation, if any
    pub fn pending_target(&self) -> Option<f32> {
        self.param.lock().pending_target()
    }

    /// End time of the pending linear ramp, if any
    pub fn ramp_end_time(&self) -> Option<f64> {
        self.param.lock().ramp_end_time()
    }

    /// Per-frame gain values for a render block starting at `start`
    pub fn fill_block(&self, start: f64, frame_duration: f64, out: &mut [f32]) {
        let param = self.param.lock();
        for (i, gain) in out.iter_mut().enumerate() {
            *gain = param.value_at(start + i as f64 * frame_duration);
        }
    }

    /// Copy of the underlying timeline
    pub fn snapshot(&self) -> GainParam {
        self.param.lock().clone()
    }
}

fn clamp_gain(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
