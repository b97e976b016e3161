//! Score ledger: current session points and best-ever score.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreLedger {
    current: u32,
    best: u32,
}

impl ScoreLedger {
    /// Fresh session with a previously stored best.
    pub fn with_best(best: u32) -> Self {
        Self { current: 0, best }
    }

    #[inline]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[inline]
    pub fn best(&self) -> u32 {
        self.best
    }

    pub fn award(&mut self, points: u32) {
        self.current = self.current.saturating_add(points);
    }

    /// Close the session. Returns the new best when it was beaten.
    pub fn finish(&mut self) -> Option<u32> {
        (self.current > self.best).then(|| {
            self.best = self.current;
            tracing::info!(best = self.best, "new best score");
            self.best
        })
    }
}
