//! Time and timezone provider seam.
//!
//! Engine operations and the email scheduler never call `Utc::now()`
//! directly; they go through a [`Clock`] so tests can pin time and the
//! send-time computation stays deterministic.

use chrono::{DateTime, FixedOffset, Utc};

pub trait Clock: Send + Sync {
    /// Current instant (UTC).
    fn now(&self) -> DateTime<Utc>;

    /// Local timezone offset of the recipient/site, used to align
    /// scheduled sends to local clock times.
    fn local_offset(&self) -> FixedOffset;
}

/// System wall clock with a configurable fixed site offset.
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// UTC site offset.
    pub fn utc() -> Self {
        use chrono::Offset;
        Self { offset: Utc.fix() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock pinned to a fixed instant, for deterministic evaluation in
/// tests and replays.
pub struct FixedClock {
    pub at: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl FixedClock {
    pub fn at_epoch(epoch: i64, offset: FixedOffset) -> Self {
        Self {
            at: DateTime::<Utc>::from_timestamp(epoch, 0).unwrap_or_default(),
            offset,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }

    fn local_offset(&self) -> FixedOffset {
        self.offset
    }
}
