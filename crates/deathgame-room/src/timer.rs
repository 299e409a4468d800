//! The single pending deadline of a room.
//!
//! A room waits on at most one thing at a time: the current round's
//! deadline, the end of the results pause, or its own disposal after the
//! game ends. [`PhaseTimer`] holds that one deadline and sits in the room
//! actor's `tokio::select!` loop next to the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = receiver.recv() => { /* handle command */ }
//!         wake = timer.wait() => { /* advance the phase */ }
//!     }
//! }
//! ```
//!
//! Each [`Wake`] carries the round it was armed for, so a wake that
//! belongs to a round the room has already moved past is recognisable and
//! ignored.

use tokio::time::{self, Duration, Instant};
use tracing::trace;

/// What the room should do when its timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The open round ran out of time.
    RoundDeadline { round: u32 },
    /// The results pause after `round` is over; open the next one.
    NextRound { round: u32 },
    /// The finished room has lingered long enough.
    Dispose,
}

#[derive(Debug, Default)]
pub(crate) struct PhaseTimer {
    armed: Option<(Instant, Wake)>,
}

impl PhaseTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was pending with `wake` at `deadline`.
    pub(crate) fn arm_at(&mut self, deadline: Instant, wake: Wake) {
        trace!(?wake, "timer armed");
        self.armed = Some((deadline, wake));
    }

    pub(crate) fn arm_after(&mut self, delay: Duration, wake: Wake) {
        self.arm_at(Instant::now() + delay, wake);
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = None;
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> Option<Wake> {
        self.armed.map(|(_, wake)| wake)
    }

    /// Resolves when the armed deadline passes, and disarms the timer.
    ///
    /// Pends forever while nothing is armed. Cancel-safe: dropping the
    /// future before it resolves leaves the timer armed.
    pub(crate) async fn wait(&mut self) -> Wake {
        let Some((deadline, _)) = self.armed else {
            return std::future::pending().await;
        };
        time::sleep_until(deadline).await;
        match self.armed.take() {
            Some((_, wake)) => wake,
            None => std::future::pending().await,
        }
    }
}
