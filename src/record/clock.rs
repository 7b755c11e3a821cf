/// What the draw loop does on one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    /// Redraw the whole canvas showing content frame `content_index`.
    ///
    /// `arm` is set on the tick that starts capture; `capture` carries the output frame index
    /// once capture is armed.
    Draw {
        content_index: usize,
        arm: bool,
        capture: Option<u64>,
    },
    /// All ticks recorded; finalize after the grace delay.
    Finish,
}

/// Tick counter for the recording loop.
///
/// The counter starts at `-warmup`. Capture arms when it reaches zero, and the loop finishes
/// once `total` ticks have been captured.
#[derive(Clone, Debug)]
pub struct RecordingClock {
    tick: i64,
    base_frames: usize,
    total: u64,
    armed: bool,
    finished: bool,
}

impl RecordingClock {
    pub fn new(warmup: usize, base_frames: usize, total: usize) -> Self {
        Self {
            tick: -(warmup as i64),
            base_frames: base_frames.max(1),
            total: total as u64,
            armed: false,
            finished: false,
        }
    }

    pub fn tick(&self) -> i64 {
        self.tick
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance by one tick. Returns `Finish` forever once done.
    pub fn advance(&mut self) -> TickAction {
        if self.finished {
            return TickAction::Finish;
        }

        let mut arm = false;
        if self.tick == 0 && !self.armed {
            self.armed = true;
            arm = true;
        }
        if self.tick >= 0 && self.tick as u64 >= self.total {
            self.finished = true;
            return TickAction::Finish;
        }

        let content_index = (self.tick.unsigned_abs() as usize) % self.base_frames;
        let capture = self.armed.then_some(self.tick as u64);
        self.tick += 1;
        TickAction::Draw {
            content_index,
            arm,
            capture,
        }
    }

    /// Capture progress in percent, reported every 15 captured ticks.
    pub fn progress_percent(&self) -> Option<u32> {
        if self.tick <= 0 || self.tick % 15 != 0 || self.total == 0 {
            return None;
        }
        Some(((self.tick as u64 * 100 + self.total / 2) / self.total) as u32)
    }
}
