use crate::error::VmError;

/// The addressable memory of one Intcode machine.
///
/// A zero-indexed sequence of `i64` cells that only ever grows. Reads and
/// writes are deliberately asymmetric:
/// - reading at or beyond `len()` yields 0 and leaves the tape untouched
/// - writing at or beyond `len()` zero-fills up to the address, then stores
///
/// Negative addresses are rejected on both paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<i64>,
}

impl Tape {
    /// Largest number of cells a tape may grow to (128 MiB of `i64`).
    pub const MAX_LEN: usize = 1 << 24;

    pub fn new(cells: Vec<i64>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    /// Read the cell at `addr`. Addresses past the end read as 0.
    pub fn get(&self, addr: i64) -> Result<i64, VmError> {
        let idx = index(addr)?;
        Ok(self.read(idx))
    }

    /// Read by unsigned index. Used for instruction fetch, where the index
    /// comes from the program counter and cannot be negative.
    pub fn read(&self, idx: usize) -> i64 {
        self.cells.get(idx).copied().unwrap_or(0)
    }

    /// Store `value` at `addr`, growing the tape if needed.
    pub fn set(&mut self, addr: i64, value: i64) -> Result<(), VmError> {
        let idx = index(addr)?;
        if idx >= Self::MAX_LEN {
            return Err(VmError::AddressOutOfRange(addr));
        }
        if idx >= self.cells.len() {
            // Vec growth is amortized doubling; resize zero-fills the gap.
            self.cells.resize(idx + 1, 0);
        }
        self.cells[idx] = value;
        Ok(())
    }
}

impl From<Vec<i64>> for Tape {
    fn from(cells: Vec<i64>) -> Self {
        Self::new(cells)
    }
}

fn index(addr: i64) -> Result<usize, VmError> {
    usize::try_from(addr).map_err(|_| VmError::NegativeAddress(addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_bounds() {
        let tape = Tape::new(vec![5, 6, 7]);
        assert_eq!(tape.get(0).unwrap(), 5);
        assert_eq!(tape.get(2).unwrap(), 7);
    }

    #[test]
    fn test_read_past_end_returns_zero_without_growth() {
        let tape = Tape::new(vec![1, 2, 3]);
        assert_eq!(tape.len(), 3);
        assert_eq!(tape.get(3).unwrap(), 0);
        assert_eq!(tape.get(1000).unwrap(), 0);
        assert_eq!(tape.len(), 3);
    }

    #[test]
    fn test_write_past_end_grows_and_zero_fills() {
        let mut tape = Tape::new(vec![1, 2]);
        tape.set(5, 9).unwrap();
        assert_eq!(tape.len(), 6);
        assert_eq!(tape.as_slice(), &[1, 2, 0, 0, 0, 9]);
    }

    #[test]
    fn test_write_within_bounds_keeps_length() {
        let mut tape = Tape::new(vec![1, 2, 3]);
        tape.set(1, -4).unwrap();
        assert_eq!(tape.as_slice(), &[1, -4, 3]);
    }

    #[test]
    fn test_negative_address_rejected() {
        let mut tape = Tape::new(vec![1]);
        assert!(matches!(tape.get(-1), Err(VmError::NegativeAddress(-1))));
        assert!(matches!(tape.set(-3, 0), Err(VmError::NegativeAddress(-3))));
        assert_eq!(tape.as_slice(), &[1]);
    }

    #[test]
    fn test_write_beyond_limit_rejected() {
        let mut tape = Tape::default();
        let addr = Tape::MAX_LEN as i64;
        assert!(matches!(tape.set(addr, 1), Err(VmError::AddressOutOfRange(a)) if a == addr));
        assert!(tape.is_empty());
    }
}
