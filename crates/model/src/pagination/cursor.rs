use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the pagination cursor: an offset into the source's record space.
///
/// Cursors never move backwards. Only the offset controller advances one.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct Cursor {
    offset: usize,
}

impl Cursor {
    /// The first page of the source.
    pub const fn start() -> Self {
        Cursor { offset: 0 }
    }

    pub const fn at(offset: usize) -> Self {
        Cursor { offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the cursor `step` records further into the source.
    pub fn advance(&self, step: usize) -> Cursor {
        Cursor {
            offset: self.offset.saturating_add(step),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn advance_moves_forward_by_step() {
        let cursor = Cursor::start().advance(5).advance(5);
        assert_eq!(cursor.offset(), 10);
        assert!(cursor > Cursor::start());
    }

    #[test]
    fn advance_saturates() {
        let cursor = Cursor::at(usize::MAX - 1).advance(5);
        assert_eq!(cursor.offset(), usize::MAX);
    }
}
