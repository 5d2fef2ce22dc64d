use smallvec::SmallVec;

use crate::time::Time;

// Most handlers will not yield very many events
pub type EventList<C> = SmallVec<[Event<C>; 4]>;

/// A command to be dispatched at an absolute simulated time.
#[derive(Debug, Clone)]
pub struct Event<C> {
    pub(crate) time: Time,
    pub(crate) cmd: C,
}

impl<C> Event<C> {
    pub fn new(time: Time, cmd: impl Into<C>) -> Self {
        Self {
            time,
            cmd: cmd.into(),
        }
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn into_cmd(self) -> C {
        self.cmd
    }
}
