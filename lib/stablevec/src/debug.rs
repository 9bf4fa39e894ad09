//! `Debug` formatting for [`StableVec`](crate::StableVec).

use std::fmt;

use crate::StableVec;

impl<T: fmt::Debug> fmt::Debug for StableVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.enumerate()).finish()
    }
}
