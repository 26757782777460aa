use crate::LockError;

/// Maximum owner length in bytes (spec §3, §6).
pub const MAX_OWNER_LEN: usize = 256;

/// Lease duration granted by a successful acquire (spec §4.B).
pub const LOCK_DURATION_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked = 0,
    Locked = 1,
}

impl LockState {
    fn from_byte(b: u8) -> Result<Self, LockError> {
        match b {
            0 => Ok(LockState::Unlocked),
            1 => Ok(LockState::Locked),
            other => Err(LockError::InvalidArgument(format!(
                "invalid lock state byte: {other}"
            ))),
        }
    }
}

/// The on-the-wire lock record (spec §3, §6):
///
/// ```text
/// off size field
///  0   2  owner_len  (little-endian uint16, <=256)
///  2   L  owner      (UTF-8 bytes)
/// 2+L  1  state      (0=Unlocked, 1=Locked)
/// 3+L  8  expiry     (little-endian uint64, seconds since epoch)
/// ```
///
/// Endianness is an explicit commitment (spec §9 open question): little-endian
/// throughout, matching the field layout table in spec §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub owner: String,
    pub state: LockState,
    pub expiry: u64,
}

impl LockRecord {
    pub fn unlocked() -> Self {
        Self {
            owner: String::new(),
            state: LockState::Unlocked,
            expiry: 0,
        }
    }

    pub fn locked(owner: impl Into<String>, expiry: u64) -> Self {
        Self {
            owner: owner.into(),
            state: LockState::Locked,
            expiry,
        }
    }

    /// Held by a non-expired owner as of `now`.
    pub fn is_held(&self, now: u64) -> bool {
        self.state == LockState::Locked && self.expiry > now
    }

    /// Locked but past its expiry, i.e. up for grabs (spec §3 invariant).
    pub fn is_expired(&self, now: u64) -> bool {
        self.state == LockState::Locked && self.expiry <= now
    }

    pub fn encode(&self) -> Result<Vec<u8>, LockError> {
        let owner_bytes = self.owner.as_bytes();
        if owner_bytes.len() > MAX_OWNER_LEN {
            return Err(LockError::InvalidArgument(format!(
                "owner exceeds {MAX_OWNER_LEN} bytes"
            )));
        }
        let mut buf = Vec::with_capacity(2 + owner_bytes.len() + 1 + 8);
        buf.extend_from_slice(&(owner_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(owner_bytes);
        buf.push(self.state as u8);
        buf.extend_from_slice(&self.expiry.to_le_bytes());
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LockError> {
        if bytes.len() < 2 {
            return Err(LockError::InvalidArgument(
                "lock record truncated before owner_len".to_string(),
            ));
        }
        let owner_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        let owner_start = 2;
        let owner_end = owner_start + owner_len;
        let state_idx = owner_end;
        let expiry_start = state_idx + 1;
        let expiry_end = expiry_start + 8;

        if bytes.len() != expiry_end {
            return Err(LockError::InvalidArgument(format!(
                "declared owner length {owner_len} inconsistent with payload of {} bytes",
                bytes.len()
            )));
        }

        let owner = String::from_utf8(bytes[owner_start..owner_end].to_vec())
            .map_err(|e| LockError::InvalidArgument(format!("owner not valid UTF-8: {e}")))?;
        let state = LockState::from_byte(bytes[state_idx])?;
        let mut expiry_buf = [0u8; 8];
        expiry_buf.copy_from_slice(&bytes[expiry_start..expiry_end]);
        let expiry = u64::from_le_bytes(expiry_buf);

        Ok(Self {
            owner,
            state,
            expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_locked_record() {
        let record = LockRecord::locked("owner-1", 1_700_000_000);
        let encoded = record.encode().unwrap();
        let decoded = LockRecord::decode(&encoded).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn round_trips_unlocked_record() {
        let record = LockRecord::unlocked();
        let decoded = LockRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn round_trips_max_length_owner() {
        let owner = "x".repeat(MAX_OWNER_LEN);
        let record = LockRecord::locked(owner, 42);
        let decoded = LockRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn rejects_owner_over_max_length() {
        let owner = "x".repeat(MAX_OWNER_LEN + 1);
        let record = LockRecord::locked(owner, 42);
        assert!(record.encode().is_err());
    }

    #[test]
    fn rejects_invalid_state_byte() {
        let mut bytes = LockRecord::unlocked().encode().unwrap();
        bytes[2] = 7;
        assert!(LockRecord::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_inconsistent_owner_length() {
        let mut bytes = LockRecord::locked("owner", 42).encode().unwrap();
        bytes[0] = 255;
        bytes[1] = 0;
        assert!(LockRecord::decode(&bytes).is_err());
    }
}
