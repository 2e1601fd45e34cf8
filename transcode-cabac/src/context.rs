//! Context models.
//!
//! A context is one packed probability state `2 * pStateIdx + valMPS`. The
//! caller owns the contexts; the coder only reads and overwrites them.

use crate::error::{CabacError, Result};
use crate::tables::MAX_STATES;

/// Highest slice QP the initialization rule accepts.
pub const MAX_QP: i32 = 51;

/// Adaptive probability state of one syntax-element context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextState(u8);

impl ContextState {
    /// Create a context from a packed state index.
    ///
    /// Returns `None` for indices outside `0..128`.
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < MAX_STATES).then_some(Self(index))
    }

    /// Initialize from an H.264 `(m, n)` pair at the given slice QP.
    pub fn from_init(m: i8, n: i8, qp: i32) -> Self {
        let qp = qp.clamp(0, MAX_QP);
        let pre = (((m as i32 * qp) >> 4) + n as i32).clamp(1, 126);
        if pre <= 63 {
            Self(((63 - pre) << 1) as u8)
        } else {
            Self((((pre - 64) << 1) | 1) as u8)
        }
    }

    /// Packed state index.
    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    /// Probability state without the MPS bit (0-63).
    #[inline]
    pub fn probability_state(self) -> u8 {
        self.0 >> 1
    }

    /// Current most probable symbol.
    #[inline]
    pub fn mps(self) -> bool {
        self.0 & 1 != 0
    }

    #[inline]
    pub(crate) fn set(&mut self, index: u8) {
        self.0 = index;
    }
}

/// Look up `index` in a context slice, failing fast on caller errors.
#[inline]
pub(crate) fn context_at(contexts: &mut [ContextState], index: usize) -> Result<&mut ContextState> {
    let len = contexts.len();
    debug_assert!(index < len, "context index {} out of bounds ({})", index, len);
    contexts
        .get_mut(index)
        .ok_or(CabacError::InvalidContext { index, len })
}

/// Caller-owned array of contexts addressed by small integer ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextArray {
    states: Vec<ContextState>,
}

impl ContextArray {
    /// Create `len` contexts, all in state 0.
    pub fn new(len: usize) -> Self {
        Self {
            states: vec![ContextState::default(); len],
        }
    }

    /// Create contexts from H.264 `(m, n)` initialization pairs.
    pub fn from_init_table(init: &[(i8, i8)], qp: i32) -> Self {
        Self {
            states: init.iter().map(|&(m, n)| ContextState::from_init(m, n, qp)).collect(),
        }
    }

    /// Re-derive every context from `(m, n)` pairs at a new slice QP.
    pub fn init_from_table(&mut self, init: &[(i8, i8)], qp: i32) -> Result<()> {
        if init.len() != self.states.len() {
            return Err(CabacError::InvalidParameter(format!(
                "{} init pairs for {} contexts",
                init.len(),
                self.states.len()
            )));
        }
        for (state, &(m, n)) in self.states.iter_mut().zip(init) {
            *state = ContextState::from_init(m, n, qp);
        }
        Ok(())
    }

    /// Reset every context to state 0.
    pub fn reset(&mut self) {
        self.states.fill(ContextState::default());
    }

    /// Number of contexts.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Context `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<ContextState> {
        self.states.get(index).copied()
    }

    /// Mutable context `index`.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut ContextState> {
        context_at(&mut self.states, index)
    }

    /// Contexts from `base` onwards, for binarizations that address
    /// consecutive ids relative to a base.
    pub fn from_base(&mut self, base: usize) -> Result<&mut [ContextState]> {
        let len = self.states.len();
        self.states
            .get_mut(base..)
            .ok_or(CabacError::InvalidContext { index: base, len })
    }

    /// All contexts.
    pub fn as_slice(&self) -> &[ContextState] {
        &self.states
    }

    /// All contexts, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [ContextState] {
        &mut self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_new_bounds() {
        assert_eq!(ContextState::new(127).map(ContextState::index), Some(127));
        assert!(ContextState::new(128).is_none());
    }

    #[test]
    fn test_packed_fields() {
        let ctx = ContextState::new(0x2B).unwrap();
        assert_eq!(ctx.probability_state(), 0x15);
        assert!(ctx.mps());
    }

    #[test]
    fn test_init_from_m_n() {
        // pre = ((0 * 26) >> 4) + 64 = 64 -> state 0, MPS 1
        assert_eq!(ContextState::from_init(0, 64, 26).index(), 1);
        // pre = 63 -> state 0, MPS 0
        assert_eq!(ContextState::from_init(0, 63, 26).index(), 0);
        // pre clamps to 1 -> state 62, MPS 0
        assert_eq!(ContextState::from_init(-128, -128, 51).index(), 124);
        // pre clamps to 126 -> state 62, MPS 1
        assert_eq!(ContextState::from_init(100, 127, 51).index(), 125);
        // QP is clamped to 0..=51
        assert_eq!(ContextState::from_init(20, 10, 99), ContextState::from_init(20, 10, 51));
    }

    #[test]
    fn test_array_reset_and_access() {
        let mut contexts = ContextArray::from_init_table(&[(20, -15), (2, 54), (3, 74)], 30);
        assert_eq!(contexts.len(), 3);
        assert!(contexts.as_slice().iter().any(|c| c.index() != 0));

        contexts.reset();
        assert!(contexts.as_slice().iter().all(|c| c.index() == 0));

        assert!(contexts.get_mut(2).is_ok());
        assert_eq!(contexts.from_base(3).map(|s| s.len()), Ok(0));
        assert!(contexts.from_base(4).is_err());
    }

    #[test]
    fn test_init_from_table_length_mismatch() {
        let mut contexts = ContextArray::new(2);
        assert!(contexts.init_from_table(&[(0, 64)], 26).is_err());
        assert!(contexts.init_from_table(&[(0, 64), (0, 63)], 26).is_ok());
        assert_eq!(contexts.get(0).map(ContextState::index), Some(1));
    }
}
