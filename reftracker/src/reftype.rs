use crate::RefTrackerError;

/// Tag attached to each reference name in a reftracker object's omap
/// (spec §6): `Normal` counts toward the refcount, `Mask` hides the key
/// from future `Add` calls without counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefType {
    Normal = 1,
    Mask = 2,
}

impl RefType {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Result<Self, RefTrackerError> {
        match b {
            1 => Ok(RefType::Normal),
            2 => Ok(RefType::Mask),
            other => Err(RefTrackerError::InvalidArgument(format!(
                "invalid reftype byte: {other}"
            ))),
        }
    }
}
