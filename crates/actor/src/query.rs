use std::fmt::{self, Debug};

use tokio::sync::oneshot;

use crate::{Actor, Message};

/// A message that runs a closure against the state and sends the result
/// back to the caller.
pub struct Query<F, R> {
    pub f: F,
    pub reply_tx: oneshot::Sender<R>,
}

impl<F, R> Debug for Query<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").finish_non_exhaustive()
    }
}

impl<S, F, R> Message<S> for Query<F, R>
where
    F: FnOnce(&mut S) -> R + Send + 'static,
    R: Send + 'static,
{
    #[inline]
    fn handle(self, state: &mut S, _handle: &Actor<S>) {
        // The caller may have given up waiting.
        self.reply_tx.send((self.f)(state)).ok();
    }
}
