use foundation::ids::ModelId;
use foundation::time::{Time, TimeSpan};

/// The clock parameters a time-varying item asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockDefinition {
    pub start: Option<Time>,
    pub stop: Option<Time>,
    pub current: Option<Time>,
    pub multiplier: f64,
    pub is_paused: bool,
}

/// What happens when the clock runs past `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockRange {
    #[default]
    Unbounded,
    Clamped,
    LoopStop,
}

/// The single clock shared by every time-varying item on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    pub start: Time,
    pub stop: Time,
    pub current: Time,
    /// Clock seconds per real second.
    pub multiplier: f64,
    pub should_animate: bool,
    pub range: ClockRange,
    pub bound_item: Option<ModelId>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::stopped()
    }
}

impl Clock {
    pub fn stopped() -> Self {
        Self {
            start: Time(0.0),
            stop: Time(0.0),
            current: Time(0.0),
            multiplier: 1.0,
            should_animate: false,
            range: ClockRange::Unbounded,
            bound_item: None,
        }
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.stop)
    }

    /// Advances by `dt` real seconds. A paused or unbound clock is returned
    /// unchanged.
    pub fn tick(&self, dt: f64) -> Clock {
        if !self.should_animate || self.bound_item.is_none() {
            return self.clone();
        }
        let next = self.current.add_seconds(dt * self.multiplier);
        let current = match self.range {
            ClockRange::Unbounded => next,
            ClockRange::Clamped => self.span().clamp(next),
            ClockRange::LoopStop if next.0 > self.stop.0 => self.start,
            ClockRange::LoopStop => self.span().clamp(next),
        };
        Clock {
            current,
            ..self.clone()
        }
    }
}

/// Derives the shared clock from the top item's definition.
///
/// With no top item the clock stops where it is. Otherwise the definition
/// wins field by field; times it leaves out are kept from `previous`.
pub fn reconcile(top: Option<(&ModelId, &ClockDefinition)>, previous: &Clock) -> Clock {
    let Some((id, def)) = top else {
        return Clock {
            should_animate: false,
            bound_item: None,
            ..previous.clone()
        };
    };

    let start = def.start.or(def.current).unwrap_or(previous.start);
    let stop = match def.stop {
        Some(stop) if stop.0 >= start.0 => stop,
        _ => start,
    };
    let bounded = def.start.is_some() && def.stop.is_some();
    let current = def.current.or(def.start).unwrap_or(previous.current);
    let current = if bounded {
        TimeSpan::new(start, stop).clamp(current)
    } else {
        current
    };

    Clock {
        start,
        stop,
        current,
        multiplier: def.multiplier,
        should_animate: !def.is_paused,
        range: if bounded {
            ClockRange::LoopStop
        } else {
            ClockRange::Unbounded
        },
        bound_item: Some(id.clone()),
    }
}
