//! Hexadecimal keypad of the COSMAC VIP.
use crate::constants::KEY_COUNT;

/// One of the 16 keys, 0x0 through 0xF.
///
/// The machine only tracks one pressed key at a time, so input sources
/// pass `Option<KeyCode>` where `None` means every key is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8"))]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    #[inline]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Parse a hexadecimal digit character, as printed on the keypad.
    pub fn from_hex_digit(c: char) -> Option<Self> {
        c.to_digit(16).map(|d| Self::ALL[d as usize])
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(key_id as usize).copied().ok_or(InvalidKeyCode)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keycode_conversion() {
        for key_id in 0..KEY_COUNT {
            let keycode = KeyCode::try_from(key_id).unwrap();
            assert_eq!(keycode.as_u8(), key_id);
            assert_eq!(u8::from(keycode), key_id);
        }

        assert_eq!(KeyCode::try_from(16), Err(InvalidKeyCode));
        assert_eq!(KeyCode::try_from(0xFF), Err(InvalidKeyCode));
    }

    #[test]
    fn test_hex_digit() {
        assert_eq!(KeyCode::from_hex_digit('0'), Some(KeyCode::Key0));
        assert_eq!(KeyCode::from_hex_digit('a'), Some(KeyCode::KeyA));
        assert_eq!(KeyCode::from_hex_digit('F'), Some(KeyCode::KeyF));
        assert_eq!(KeyCode::from_hex_digit('g'), None);
        assert_eq!(KeyCode::KeyC.to_string(), "kc");
    }
}
