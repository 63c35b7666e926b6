//! Single-shot turn completion.
//!
//! A [`TurnCompletion`] and its [`TurnWaiter`] are two ends of a `oneshot`
//! channel. The completion end can fire once; every later attempt is
//! reported as a [`BattleError::Concurrency`] and changes nothing.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::entity::UnitId;
use crate::error::BattleError;
use crate::events::TurnEnd;

/// Sending end of a turn's completion channel.
#[derive(Debug)]
pub(crate) struct TurnCompletion {
    unit: UnitId,
    sender: Option<oneshot::Sender<TurnEnd>>,
}

impl TurnCompletion {
    /// Creates a linked completion and waiter.
    pub(crate) fn channel(unit: UnitId) -> (Self, TurnWaiter) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                unit,
                sender: Some(sender),
            },
            TurnWaiter { unit, receiver },
        )
    }

    /// Returns `true` once the turn has been completed.
    pub(crate) fn is_spent(&self) -> bool {
        self.sender.is_none()
    }

    /// Resolves the turn.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::Concurrency`] if the turn was already
    /// resolved.
    pub(crate) fn complete(&mut self, reason: TurnEnd) -> Result<(), BattleError> {
        let Some(sender) = self.sender.take() else {
            debug!(unit = %self.unit, ?reason, "duplicate turn resolution discarded");
            return Err(BattleError::Concurrency(self.unit));
        };
        // The waiter may already be gone if the scheduler shut down.
        let _ = sender.send(reason);
        Ok(())
    }
}

/// Receiving end of a turn's completion channel.
///
/// Resolves to the reason the turn ended. If the completion end is dropped
/// without firing, the turn counts as forfeited.
#[derive(Debug)]
pub struct TurnWaiter {
    unit: UnitId,
    receiver: oneshot::Receiver<TurnEnd>,
}

impl TurnWaiter {
    /// Unit whose turn this is.
    #[must_use]
    pub const fn unit(&self) -> UnitId {
        self.unit
    }
}

impl Future for TurnWaiter {
    type Output = TurnEnd;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(TurnEnd::Forfeited))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_completion_wins() {
        let (mut completion, waiter) = TurnCompletion::channel(UnitId::new(4));
        assert!(completion.complete(TurnEnd::Ended).is_ok());
        assert!(completion.is_spent());
        assert_eq!(
            completion.complete(TurnEnd::TimedOut),
            Err(BattleError::Concurrency(UnitId::new(4)))
        );
        assert_eq!(waiter.await, TurnEnd::Ended);
    }

    #[tokio::test]
    async fn dropped_completion_forfeits() {
        let (completion, waiter) = TurnCompletion::channel(UnitId::new(1));
        assert_eq!(waiter.unit(), UnitId::new(1));
        drop(completion);
        assert_eq!(waiter.await, TurnEnd::Forfeited);
    }
}
