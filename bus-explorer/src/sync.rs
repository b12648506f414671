use log::debug;
use serde::{Deserialize, Serialize};

use crate::navigation::{Viewport, ViewportEvent};

/// Identifies one programmatic map move, so its completion can be told apart from older ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveToken(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
struct InFlight {
    token: MoveToken,
    // In case the map never says the move finished
    deadline_ms: f64,
    // Restoring from browser history, rather than fitting to a route
    restoring: bool,
}

/// Who a viewport report should be blamed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveCause {
    User,
    /// A route fit or initial positioning
    App,
    /// Restoring from browser history
    History,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingReport {
    event: ViewportEvent,
    // The move in flight when the map reported, if any
    during: Option<InFlight>,
}

/// Decides which viewport reports from the map reflect the user moving it, and so should be
/// written back to navigation state.
///
/// While a move the app started is in flight, whatever the map reports is just that move playing
/// out. The move ends when the map reports completion for its token, or when its grace window
/// passes, whichever comes first. Reports are also coalesced, so only the last one before a frame
/// is considered.
pub struct ViewportSync {
    next_token: u32,
    in_flight: Option<InFlight>,
    pending: Option<PendingReport>,
    /// The viewport the URL currently holds
    last_synced: Viewport,
}

impl ViewportSync {
    pub fn new(initial: Viewport) -> Self {
        Self {
            next_token: 0,
            in_flight: None,
            pending: None,
            last_synced: initial,
        }
    }

    /// Starts suppressing reports. Any earlier move in flight is superseded; its completion will
    /// be ignored.
    pub fn begin_move(&mut self, now_ms: f64, grace_ms: f64, restoring: bool) -> MoveToken {
        let token = MoveToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.in_flight = Some(InFlight {
            token,
            deadline_ms: now_ms + grace_ms,
            restoring,
        });
        token
    }

    /// True if this finished the move in flight.
    pub fn complete_move(&mut self, token: MoveToken) -> bool {
        if self.in_flight.map(|x| x.token) == Some(token) {
            self.in_flight = None;
            return true;
        }
        debug!("Ignoring completion of stale move {:?}", token);
        false
    }

    fn expire(&mut self, now_ms: f64) {
        if let Some(in_flight) = self.in_flight {
            if now_ms >= in_flight.deadline_ms {
                debug!("Move {:?} never finished; giving up on it", in_flight.token);
                self.in_flight = None;
            }
        }
    }

    /// Restoring the viewport from browser history.
    pub fn is_navigating(&mut self, now_ms: f64) -> bool {
        self.expire(now_ms);
        self.in_flight.map_or(false, |x| x.restoring)
    }

    pub fn is_suppressed(&mut self, now_ms: f64) -> bool {
        self.expire(now_ms);
        self.in_flight.is_some()
    }

    /// Later reports replace earlier ones that haven't been taken yet. Remembers which move, if
    /// any, was underway when the map reported.
    pub fn queue(&mut self, event: ViewportEvent) {
        self.pending = Some(PendingReport {
            event,
            during: self.in_flight,
        });
    }

    /// The last report since the previous frame, and who caused it. A move that finished between
    /// the report and now still gets the blame, as long as its grace window hasn't passed.
    pub fn take_pending(&mut self, now_ms: f64) -> Option<(ViewportEvent, MoveCause)> {
        let pending = self.pending.take()?;
        self.expire(now_ms);
        let during = pending
            .during
            .filter(|x| now_ms < x.deadline_ms)
            .or(self.in_flight);
        let cause = match during {
            None => MoveCause::User,
            Some(x) if x.restoring => MoveCause::History,
            Some(_) => MoveCause::App,
        };
        Some((pending.event, cause))
    }

    /// If `viewport` is meaningfully different from what the URL holds, remember it as the new
    /// synced one and return true.
    pub fn accept(&mut self, viewport: Viewport, epsilon: f64) -> bool {
        if !viewport.differs_from(&self.last_synced, epsilon) {
            return false;
        }
        self.last_synced = viewport;
        true
    }

    /// The URL changed some other way
    pub fn mark_synced(&mut self, viewport: Viewport) {
        self.last_synced = viewport;
    }

    pub fn last_synced(&self) -> Viewport {
        self.last_synced
    }

    pub fn cancel(&mut self) {
        self.in_flight = None;
        self.pending = None;
    }
}
