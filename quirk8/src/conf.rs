//! VM configuration.
use std::time::Duration;

use crate::constants::*;

/// VM Configuration Parameters.
///
/// The configuration is fixed for the lifetime of a [`Chip8Vm`](crate::prelude::Chip8Vm).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "snake_case"))]
pub struct Chip8Conf {
    /// Number of instructions executed per second by the driver loop.
    pub clock_frequency: Hz,
    pub quirks: Quirks,
    pub unknown_opcode: UnknownOpcodePolicy,
    /// Seed for the `CXNN` random number generator.
    ///
    /// When absent the generator is seeded from system entropy.
    pub rng_seed: Option<u64>,
}

/// Behavioural differences between the COSMAC VIP interpreter and later ones.
///
/// Defaults follow the COSMAC VIP where it matters to most programs (shift
/// source and index increment). `BNNN` adds no offset and `FX1E` flags a
/// carry out of the low byte, unlike the VIP; set `jump_base_v0` and
/// `index_overflow: unchanged` for the VIP behaviour.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Quirks {
    /// `8XY6` and `8XYE` shift VX in place and ignore VY.
    ///
    /// When off, VY is copied into VX before the shift.
    #[cfg_attr(feature = "serde", serde(alias = "shiftUsesVY"))]
    pub shift_in_place: bool,
    /// `BNNN` adds VX to the jump target, where X is the upper nibble of NNN.
    #[cfg_attr(feature = "serde", serde(alias = "jumpAddsVX"))]
    pub jump_adds_vx: bool,
    /// `BNNN` adds V0 to the jump target when `jump_adds_vx` is off.
    #[cfg_attr(feature = "serde", serde(alias = "jumpBaseV0"))]
    pub jump_base_v0: bool,
    /// `FX55` and `FX65` leave I unchanged.
    ///
    /// When off, I is incremented by X + 1.
    #[cfg_attr(feature = "serde", serde(alias = "memoryOpsPreserveIndex"))]
    pub memory_ops_preserve_index: bool,
    /// How `FX1E` reports overflow in VF.
    #[cfg_attr(feature = "serde", serde(alias = "indexOverflow"))]
    pub index_overflow: IndexOverflow,
}

impl Quirks {
    /// Behaviour of CHIP-48 and SUPER-CHIP derived interpreters.
    pub fn modern() -> Self {
        Self {
            shift_in_place: true,
            jump_adds_vx: true,
            jump_base_v0: false,
            memory_ops_preserve_index: true,
            index_overflow: IndexOverflow::Address,
        }
    }
}

/// Policy for setting the flag register after `FX1E` (ADD I, Vx).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IndexOverflow {
    /// VF is left as is.
    Unchanged,
    /// VF is set when I + VX exceeds 0xFF, otherwise cleared.
    #[default]
    Byte,
    /// VF is set when I + VX exceeds the 12-bit address space 0xFFF, otherwise cleared.
    Address,
}

impl IndexOverflow {
    /// Flag value for the sum of I and VX, or `None` when VF must not be touched.
    pub(crate) fn flag(self, sum: u32) -> Option<u8> {
        match self {
            Self::Unchanged => None,
            Self::Byte => Some((sum > 0xFF) as u8),
            Self::Address => Some((sum > 0xFFF) as u8),
        }
    }
}

/// What the VM does when it encounters an opcode that matches no instruction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnknownOpcodePolicy {
    /// Log a warning and continue at the next instruction.
    #[default]
    Skip,
    /// Fault the machine.
    Halt,
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Hz(pub u64);

impl Default for Hz {
    fn default() -> Self {
        Hz(DEFAULT_CLOCK_FREQUENCY)
    }
}

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);

        let interval: Duration = Hz::default().into();
        assert_eq!(interval.as_millis(), 1);

        let interval: Duration = Hz(0).into();
        assert!(interval.is_zero());
    }

    #[test]
    fn test_index_overflow_flag() {
        assert_eq!(IndexOverflow::Unchanged.flag(0x1000), None);
        assert_eq!(IndexOverflow::Byte.flag(0xFF), Some(0));
        assert_eq!(IndexOverflow::Byte.flag(0x100), Some(1));
        assert_eq!(IndexOverflow::Address.flag(0x100), Some(0));
        assert_eq!(IndexOverflow::Address.flag(0x1000), Some(1));
    }

    #[test]
    fn test_default_quirks() {
        let quirks = Quirks::default();
        assert!(!quirks.shift_in_place);
        assert!(!quirks.jump_adds_vx);
        assert!(!quirks.jump_base_v0);
        assert!(!quirks.memory_ops_preserve_index);
        assert_eq!(quirks.index_overflow, IndexOverflow::Byte);
    }
}
