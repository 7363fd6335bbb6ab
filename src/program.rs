use std::str::FromStr;

use crate::error::LoadError;
use crate::tape::Tape;

/// Parsed program text: the initial contents of a tape.
///
/// Text is a comma-separated list of base-10 signed integers, optionally
/// surrounded by whitespace (a trailing newline is typical).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<i64>,
}

impl Program {
    pub fn new(code: Vec<i64>) -> Self {
        Self { code }
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Overwrite one value before the program is loaded.
    pub fn patch(&mut self, addr: usize, value: i64) -> Result<(), LoadError> {
        let len = self.code.len();
        let slot = self
            .code
            .get_mut(addr)
            .ok_or(LoadError::PatchOutOfRange { addr, len })?;
        *slot = value;
        Ok(())
    }

    /// A fresh tape holding a private copy of the program.
    pub fn load(&self) -> Tape {
        Tape::new(self.code.clone())
    }
}

impl FromStr for Program {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .trim()
            .split(',')
            .enumerate()
            .map(|(position, token)| {
                let token = token.trim();
                token.parse::<i64>().map_err(|_| LoadError::InvalidToken {
                    token: token.to_string(),
                    position,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { code })
    }
}

impl From<Vec<i64>> for Program {
    fn from(code: Vec<i64>) -> Self {
        Self::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let program: Program = "1,9,10,3,2,3,11,0,99,30,40,50".parse().unwrap();
        assert_eq!(program.as_slice(), &[1, 9, 10, 3, 2, 3, 11, 0, 99, 30, 40, 50]);
    }

    #[test]
    fn test_parse_whitespace_and_negatives() {
        let program: Program = "  3, -4 ,1001\n".parse().unwrap();
        assert_eq!(program.as_slice(), &[3, -4, 1001]);
    }

    #[test]
    fn test_parse_reports_token_and_position() {
        let err = "1,2,x3,4".parse::<Program>().unwrap_err();
        assert_eq!(
            err,
            LoadError::InvalidToken {
                token: "x3".to_string(),
                position: 2
            }
        );
    }

    #[test]
    fn test_parse_empty_is_error() {
        let err = "".parse::<Program>().unwrap_err();
        assert!(matches!(err, LoadError::InvalidToken { position: 0, .. }));
    }

    #[test]
    fn test_parse_trailing_comma_is_error() {
        let err = "1,2,".parse::<Program>().unwrap_err();
        assert!(matches!(err, LoadError::InvalidToken { position: 2, .. }));
    }

    #[test]
    fn test_patch() {
        let mut program = Program::new(vec![1, 0, 0, 3, 99]);
        program.patch(1, 12).unwrap();
        program.patch(2, 2).unwrap();
        assert_eq!(program.as_slice(), &[1, 12, 2, 3, 99]);
        assert_eq!(
            program.patch(5, 1),
            Err(LoadError::PatchOutOfRange { addr: 5, len: 5 })
        );
    }

    #[test]
    fn test_load_is_independent_copy() {
        let program = Program::new(vec![1, 2, 3]);
        let mut tape = program.load();
        tape.set(0, 7).unwrap();
        assert_eq!(program.as_slice(), &[1, 2, 3]);
        assert_eq!(tape.as_slice(), &[7, 2, 3]);
    }
}
