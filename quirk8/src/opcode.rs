//! Helpers for extracting operands from opcodes.

/// A single fetched 16-bit instruction word.
///
/// ```text
///   op   X    Y    N
/// [1111 1111 1111 1111]
///           [   NN    ]
///      [     NNN      ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Assemble an opcode from two big-endian bytes.
    #[inline(always)]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Operation group in the upper nibble.
    #[inline(always)]
    pub fn op(self) -> u8 {
        ((self.0 & 0xF000) >> 12) as u8
    }

    /// Register index X.
    #[inline(always)]
    pub fn x(self) -> usize {
        ((self.0 & 0x0F00) >> 8) as usize
    }

    /// Register index Y.
    #[inline(always)]
    pub fn y(self) -> usize {
        ((self.0 & 0x00F0) >> 4) as usize
    }

    /// 4-bit literal.
    #[inline(always)]
    pub fn n(self) -> u8 {
        (self.0 & 0x000F) as u8
    }

    /// 8-bit literal.
    #[inline(always)]
    pub fn nn(self) -> u8 {
        (self.0 & 0x00FF) as u8
    }

    /// 12-bit address.
    #[inline(always)]
    pub fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }
}

impl From<u16> for Opcode {
    fn from(word: u16) -> Self {
        Self(word)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_operands() {
        let opcode = Opcode::from_bytes([0xD1, 0x2F]);
        assert_eq!(opcode, Opcode(0xD12F));
        assert_eq!(opcode.op(), 0xD);
        assert_eq!(opcode.x(), 0x1);
        assert_eq!(opcode.y(), 0x2);
        assert_eq!(opcode.n(), 0xF);
        assert_eq!(opcode.nn(), 0x2F);
        assert_eq!(opcode.nnn(), 0x12F);
        assert_eq!(opcode.to_string(), "D12F");
    }
}
