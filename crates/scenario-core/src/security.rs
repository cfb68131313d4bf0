//! USIM profile, session security state and the credential engine seam

use crate::error::{Error, Result};

/// Largest accepted SQN_MS (48-bit sequence number, all-ones excluded)
pub const SQN_MS_LIMIT: u64 = 0xFFFF_FFFF_FFFF;

/// Subscriber key material of the simulated USIM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsimProfile {
    /// Permanent key K
    pub k: [u8; 16],
    /// Highest accepted sequence number
    pub sqn_ms: u64,
}

/// Result of running AKA on the USIM
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthOutcome {
    /// Authentication response, when the challenge was accepted
    pub res: Option<Vec<u8>>,
    /// Resynchronisation token, when the sequence number was rejected
    pub auts: Option<Vec<u8>>,
    /// Session key derived for the serving network
    pub kasme: Option<Vec<u8>>,
}

/// NAS ciphering and integrity keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasKeys {
    pub k_enc: Vec<u8>,
    pub k_int: Vec<u8>,
}

/// EMM NAS security context of the simulated UE
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NasSecurityContext {
    pub eea: u8,
    pub eia: u8,
    /// Uplink NAS count, sequence number part
    pub ul_seq: u8,
    /// Uplink NAS count, overflow part
    pub ul_overflow: u16,
    pub keys: Option<NasKeys>,
}

impl NasSecurityContext {
    /// Split a 24-bit NAS count into its sequence number and overflow
    pub fn set_ul_count(&mut self, count: u32) {
        self.ul_seq = (count & 0xff) as u8;
        self.ul_overflow = ((count >> 8) & 0xffff) as u16;
    }

    pub fn ul_count(&self) -> u32 {
        ((self.ul_overflow as u32) << 8) | self.ul_seq as u32
    }
}

/// Security material accumulated while a scenario plays
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityState {
    pub kasme: Option<Vec<u8>>,
    pub nas: NasSecurityContext,
}

/// AKA and key derivation collaborator
pub trait CredentialEngine: Send {
    /// Run AKA for a challenge
    fn compute(
        &self,
        usim: &UsimProfile,
        rand: &[u8],
        autn: &[u8],
        plmn: Option<&[u8]>,
    ) -> Result<AuthOutcome>;

    /// Derive NAS keys for the selected algorithms
    fn derive_nas_keys(&self, kasme: &[u8], eea: u8, eia: u8) -> Result<NasKeys>;
}

/// Engine used when no AKA implementation is plugged in
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCredentials;

impl CredentialEngine for UnsupportedCredentials {
    fn compute(
        &self,
        _usim: &UsimProfile,
        _rand: &[u8],
        _autn: &[u8],
        _plmn: Option<&[u8]>,
    ) -> Result<AuthOutcome> {
        Err(Error::Credential("no credential engine configured".into()))
    }

    fn derive_nas_keys(&self, _kasme: &[u8], _eea: u8, _eia: u8) -> Result<NasKeys> {
        Err(Error::Credential("no credential engine configured".into()))
    }
}
