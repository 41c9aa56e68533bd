use tracing::info;

use super::{lock, ChatApp};

impl ChatApp {
    /// Cancel the in-flight send, if any.
    ///
    /// The send's read loop stops at its next await point, removes the
    /// loading placeholder and appends "Request cancelled.". Returns `false`
    /// when nothing was in flight.
    pub fn cancel(&self) -> bool {
        match lock(&self.active).take() {
            Some(token) => {
                token.cancel();
                info!("Cancelled in-flight send");
                true
            }
            None => false,
        }
    }
}
