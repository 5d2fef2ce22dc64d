pub mod event;

use tracing::{debug, trace};

use crate::{error::Error, queue::TimedQueue, time::Time};

use self::event::EventList;

/// Receives commands popped off a [`Scheduler`].
///
/// A dispatcher never holds the scheduler itself: follow-up work is handed back as an
/// [`EventList`], so the run loop cannot be entered again from inside a handler.
pub trait Dispatch<C> {
    type Error: From<Error>;

    fn dispatch(&mut self, now: Time, cmd: C) -> Result<EventList<C>, Self::Error>;
}

/// A time-ordered event dispatcher with no knowledge of what its commands mean.
///
/// The clock only moves when an event is popped. Events at the same time are dispatched in the
/// order they were scheduled. Scheduling before the current clock is rejected.
///
/// A handler error stops the loop and is returned to the caller. The failing event has already
/// been consumed; everything else stays queued.
#[derive(Debug)]
pub struct Scheduler<C> {
    now: Time,
    queue: TimedQueue<C>,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            now: Time::ZERO,
            queue: TimedQueue::default(),
        }
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The time of the next event to be dispatched, if any.
    pub fn next_time(&self) -> Option<Time> {
        self.queue.peek_time()
    }

    pub fn schedule(&mut self, time: Time, cmd: impl Into<C>) -> Result<(), Error> {
        if time < self.now {
            return Err(Error::PastEventScheduled {
                time,
                now: self.now,
            });
        }
        self.queue.push(time, cmd.into());
        Ok(())
    }

    /// Dispatches events until the queue is empty.
    pub fn run<D: Dispatch<C>>(&mut self, dispatcher: &mut D) -> Result<(), D::Error> {
        debug!(now = %self.now, pending = self.len(), "run");
        while self.step(dispatcher, Time::MAX)? {}
        debug!(now = %self.now, "run finished");
        Ok(())
    }

    /// Dispatches every event scheduled at or before `end`, leaving later ones queued.
    pub fn run_until<D: Dispatch<C>>(
        &mut self,
        end: Time,
        dispatcher: &mut D,
    ) -> Result<(), D::Error> {
        debug!(now = %self.now, %end, pending = self.len(), "run until");
        while self.step(dispatcher, end)? {}
        debug!(now = %self.now, pending = self.len(), "run until finished");
        Ok(())
    }

    // Returns `false` once there is nothing left to do at or before `end`.
    fn step<D: Dispatch<C>>(&mut self, dispatcher: &mut D, end: Time) -> Result<bool, D::Error> {
        match self.queue.peek_time() {
            Some(time) if time <= end => {}
            _ => return Ok(false),
        }
        let Some((time, cmd)) = self.queue.pop() else {
            return Ok(false);
        };
        assert!(self.now <= time);
        self.now = time;
        trace!(now = %time, "dispatch");

        let events = dispatcher.dispatch(time, cmd)?;
        // All or nothing
        if let Some(ev) = events.iter().find(|ev| ev.time < self.now) {
            return Err(Error::PastEventScheduled {
                time: ev.time,
                now: self.now,
            }
            .into());
        }
        for ev in events {
            self.queue.push(ev.time, ev.cmd);
        }
        Ok(true)
    }
}
