//! Size ceilings for untrusted input
//!
//! Every length read from the wire is compared against these limits before
//! anything is copied or reserved.

use crate::error::{Error, Result};

/// Maximum username length in bytes
pub const MAX_USERNAME_SIZE: usize = 64;
/// Maximum serialized resource pointer length (4 MiB)
pub const MAX_POINTER_SIZE: usize = 4 * 1024 * 1024;
/// Maximum number of readers or writers on one capability
pub const MAX_SET_SIZE: usize = 4096;
/// Maximum length of a serialized key field (Ed25519 keypair form)
pub const MAX_KEY_SIZE: usize = 64;

/// Ceilings applied when decoding capabilities
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapabilityLimits {
    pub max_username_len: usize,
    pub max_pointer_len: usize,
    pub max_set_len: usize,
}

impl Default for CapabilityLimits {
    fn default() -> Self {
        Self {
            max_username_len: MAX_USERNAME_SIZE,
            max_pointer_len: MAX_POINTER_SIZE,
            max_set_len: MAX_SET_SIZE,
        }
    }
}

impl CapabilityLimits {
    /// Reject unusable limits at startup
    pub fn validate(&self) -> Result<()> {
        if self.max_username_len == 0 {
            return Err(Error::InvalidLimits("max_username_len must be non-zero".into()));
        }
        if self.max_pointer_len == 0 {
            return Err(Error::InvalidLimits("max_pointer_len must be non-zero".into()));
        }
        if self.max_set_len == 0 {
            return Err(Error::InvalidLimits("max_set_len must be non-zero".into()));
        }
        Ok(())
    }
}

/// Fail with `SizeLimitExceeded` when `actual > limit`.
pub(crate) fn check(field: &'static str, actual: usize, limit: usize) -> Result<()> {
    if actual > limit {
        return Err(Error::SizeLimitExceeded { field, limit, actual });
    }
    Ok(())
}
