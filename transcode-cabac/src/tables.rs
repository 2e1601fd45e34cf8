//! Probability state tables.
//!
//! The H.264 arithmetic coder models each context with one of 64 probability
//! states plus the value of the most probable symbol (MPS). At run time the
//! two are packed into a single index `2 * state + mps`, so the base tables
//! are expanded once into 128-entry tables that carry the MPS bit along.

use tracing::debug;

use crate::error::{CabacError, Result};

/// Number of probability states in the standardized base tables.
pub const BASE_STATE_COUNT: usize = 64;

/// Number of packed (state, MPS) indices after expansion.
pub const MAX_STATES: usize = 2 * BASE_STATE_COUNT;

/// LPS sub-interval width per state and 2-bit range bucket (H.264 Table 9-44).
pub const H264_LPS_RANGE: [[u8; 4]; BASE_STATE_COUNT] = [
    [128, 176, 208, 240], [128, 167, 197, 227], [128, 158, 187, 216], [123, 150, 178, 205],
    [116, 142, 169, 195], [111, 135, 160, 185], [105, 128, 152, 175], [100, 122, 144, 166],
    [95, 116, 137, 158], [90, 110, 130, 150], [85, 104, 123, 142], [81, 99, 117, 135],
    [77, 94, 111, 128], [73, 89, 105, 122], [69, 85, 100, 116], [66, 80, 95, 110],
    [62, 76, 90, 104], [59, 72, 86, 99], [56, 69, 81, 94], [53, 65, 77, 89],
    [51, 62, 73, 85], [48, 59, 69, 80], [46, 56, 66, 76], [43, 53, 63, 72],
    [41, 50, 59, 69], [39, 48, 56, 65], [37, 45, 54, 62], [35, 43, 51, 59],
    [33, 41, 48, 56], [32, 39, 46, 53], [30, 37, 43, 50], [29, 35, 41, 48],
    [27, 33, 39, 45], [26, 31, 37, 43], [24, 30, 35, 41], [23, 28, 33, 39],
    [22, 27, 32, 37], [21, 26, 30, 35], [20, 24, 29, 33], [19, 23, 27, 31],
    [18, 22, 26, 30], [17, 21, 25, 28], [16, 20, 23, 27], [15, 19, 22, 25],
    [14, 18, 21, 24], [14, 17, 20, 23], [13, 16, 19, 22], [12, 15, 18, 21],
    [12, 14, 17, 20], [11, 14, 16, 19], [11, 13, 15, 18], [10, 12, 15, 17],
    [10, 12, 14, 16], [9, 11, 13, 15], [9, 11, 12, 14], [8, 10, 12, 14],
    [8, 9, 11, 13], [7, 9, 11, 12], [7, 9, 10, 12], [7, 8, 10, 11],
    [6, 8, 9, 11], [6, 7, 9, 10], [6, 7, 8, 9], [2, 2, 2, 2],
];

/// Successor state after coding the MPS (H.264 Table 9-45, transIdxMPS).
pub const H264_MPS_NEXT: [u8; BASE_STATE_COUNT] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
    17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32,
    33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
    49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 62, 63,
];

/// Successor state after coding the LPS (H.264 Table 9-45, transIdxLPS).
pub const H264_LPS_NEXT: [u8; BASE_STATE_COUNT] = [
    0, 0, 1, 2, 2, 4, 4, 5, 6, 7, 8, 9, 9, 11, 11, 12,
    13, 13, 15, 15, 16, 16, 18, 18, 19, 19, 21, 21, 22, 22, 23, 24,
    24, 25, 26, 26, 27, 27, 28, 29, 29, 30, 30, 30, 31, 32, 32, 33,
    33, 33, 34, 34, 35, 35, 35, 36, 36, 36, 37, 37, 37, 38, 38, 63,
];

/// The H.264 tables, expanded at compile time.
pub static H264_STATE_TABLE: StateTable =
    StateTable::expand(&H264_LPS_RANGE, &H264_MPS_NEXT, &H264_LPS_NEXT);

/// Expanded 128-entry state transition table.
///
/// Immutable once built; encoders and decoders borrow it, so any number of
/// streams on any number of threads can share one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTable {
    lps_range: [[u8; 4]; MAX_STATES],
    mps_next: [u8; MAX_STATES],
    lps_next: [u8; MAX_STATES],
    len: usize,
}

impl StateTable {
    /// Build the expanded table from base tables describing `lps_range.len()` states.
    ///
    /// All three tables must describe the same number of states (1 to 64),
    /// every successor must name an existing state and every LPS width must
    /// be nonzero.
    pub fn new(lps_range: &[[u8; 4]], mps_next: &[u8], lps_next: &[u8]) -> Result<Self> {
        let count = lps_range.len();
        if count == 0 || count > BASE_STATE_COUNT {
            return Err(CabacError::InvalidTable(format!(
                "state count {} not in 1..={}",
                count, BASE_STATE_COUNT
            )));
        }
        if mps_next.len() != count || lps_next.len() != count {
            return Err(CabacError::InvalidTable(format!(
                "table lengths differ: lps_range {}, mps_next {}, lps_next {}",
                count,
                mps_next.len(),
                lps_next.len()
            )));
        }
        if let Some(i) = (0..count).find(|&i| mps_next[i] as usize >= count || lps_next[i] as usize >= count) {
            return Err(CabacError::InvalidTable(format!("state {} has an out-of-range successor", i)));
        }
        if let Some(i) = lps_range.iter().position(|row| row.contains(&0)) {
            return Err(CabacError::InvalidTable(format!("state {} has a zero LPS range", i)));
        }

        debug!(states = count, "Building CABAC state table");
        Ok(Self::expand(lps_range, mps_next, lps_next))
    }

    /// The shared H.264 table.
    pub fn h264() -> &'static StateTable {
        &H264_STATE_TABLE
    }

    const fn expand(lps_range: &[[u8; 4]], mps_next: &[u8], lps_next: &[u8]) -> Self {
        let mut table = Self {
            lps_range: [[0; 4]; MAX_STATES],
            mps_next: [0; MAX_STATES],
            lps_next: [0; MAX_STATES],
            len: 2 * lps_range.len(),
        };

        let mut i = 0;
        while i < lps_range.len() {
            table.lps_range[2 * i] = lps_range[i];
            table.lps_range[2 * i + 1] = lps_range[i];

            table.mps_next[2 * i] = 2 * mps_next[i];
            table.mps_next[2 * i + 1] = 2 * mps_next[i] + 1;

            // An LPS in the weakest state swaps which symbol is more probable.
            if i == 0 {
                table.lps_next[0] = 1;
                table.lps_next[1] = 0;
            } else {
                table.lps_next[2 * i] = 2 * lps_next[i];
                table.lps_next[2 * i + 1] = 2 * lps_next[i] + 1;
            }
            i += 1;
        }

        table
    }

    /// Number of packed states.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table defines no states.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// LPS sub-interval width for `state` in range bucket `bucket` (0..4).
    #[inline]
    pub fn lps_range(&self, state: u8, bucket: usize) -> u8 {
        self.lps_range[state as usize][bucket & 3]
    }

    /// Successor of `state` after coding its MPS.
    #[inline]
    pub fn next_mps(&self, state: u8) -> u8 {
        self.mps_next[state as usize]
    }

    /// Successor of `state` after coding its LPS.
    #[inline]
    pub fn next_lps(&self, state: u8) -> u8 {
        self.lps_next[state as usize]
    }

    /// Fails with [`CabacError::InvalidState`] if `state` is not defined here.
    #[inline]
    pub(crate) fn check(&self, state: u8) -> Result<()> {
        if (state as usize) < self.len {
            Ok(())
        } else {
            Err(CabacError::InvalidState(state))
        }
    }
}

impl Default for StateTable {
    fn default() -> Self {
        H264_STATE_TABLE.clone()
    }
}
