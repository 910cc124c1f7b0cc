/// Coarse speaking-turn state, independent of sentence boundaries.
///
/// `begin` reports `true` only for the first sentence of a turn, so the
/// engine emits exactly one start signal per turn however many sentences
/// it contains.
#[derive(Debug, Default)]
pub struct TurnSignal {
    speaking: bool,
}

impl TurnSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Mark a sentence as starting; true if this opened the turn.
    pub fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.speaking, true)
    }

    /// Close the turn gracefully; true if a turn had been opened.
    pub fn finish(&mut self) -> bool {
        std::mem::replace(&mut self.speaking, false)
    }

    /// Drop the turn after an interrupt. No end signal follows.
    pub fn abandon(&mut self) {
        self.speaking = false;
    }
}
