use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use super::TotpError;

/// Raw secret length for newly generated secrets (160 bits, RFC 4226 §4).
const GENERATED_SECRET_BYTES: usize = 20;

/// Shortest secret accepted (80 bits).
const MIN_SECRET_BYTES: usize = 10;

/// Code derivation parameters.
///
/// The defaults (30 s step, 6 digits, ±1 step) are what every mainstream
/// authenticator app assumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpSettings {
    pub step_seconds: u64,
    pub digits: u32,
    /// Number of steps accepted on either side of the current one.
    pub window: u64,
}

impl Default for TotpSettings {
    fn default() -> Self {
        Self {
            step_seconds: 30,
            digits: 6,
            window: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TotpEngine {
    settings: TotpSettings,
}

impl TotpEngine {
    pub fn new(settings: TotpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TotpSettings {
        &self.settings
    }

    /// Generate a new random secret, base32 encoded without padding.
    pub fn generate_secret(&self) -> String {
        let mut buf = [0u8; GENERATED_SECRET_BYTES];
        OsRng.fill_bytes(&mut buf);
        encode_secret(&buf)
    }

    /// Code for the current time step.
    pub fn generate_code(&self, secret: &str) -> Result<String, TotpError> {
        self.generate_code_at(secret, current_unix_time())
    }

    /// Code for the time step containing `unix_seconds`.
    pub fn generate_code_at(&self, secret: &str, unix_seconds: u64) -> Result<String, TotpError> {
        let key = decode_secret(secret)?;
        Ok(self.hotp(&key, self.time_step(unix_seconds)))
    }

    /// Check `code` against the current step and `window` steps either side.
    pub fn verify_code(&self, code: &str, secret: &str) -> Result<bool, TotpError> {
        self.verify_code_at(code, secret, current_unix_time())
    }

    /// Check `code` as if the clock read `unix_seconds`.
    ///
    /// Every step in the window is compared in constant time and the loop
    /// never exits early, so timing does not reveal which step matched.
    pub fn verify_code_at(
        &self,
        code: &str,
        secret: &str,
        unix_seconds: u64,
    ) -> Result<bool, TotpError> {
        let key = decode_secret(secret)?;

        if code.len() != self.settings.digits as usize || !code.bytes().all(|b| b.is_ascii_digit())
        {
            return Ok(false);
        }

        let current = self.time_step(unix_seconds);
        let first = current.saturating_sub(self.settings.window);
        let last = current.saturating_add(self.settings.window);

        let mut matched = subtle::Choice::from(0u8);
        for step in first..=last {
            let candidate = self.hotp(&key, step);
            matched |= candidate.as_bytes().ct_eq(code.as_bytes());
        }

        Ok(matched.into())
    }

    /// Seconds until the current step rolls over, in `1..=step_seconds`.
    pub fn time_remaining(&self) -> u64 {
        self.time_remaining_at(current_unix_time())
    }

    pub fn time_remaining_at(&self, unix_seconds: u64) -> u64 {
        let step = self.step_seconds();
        step - (unix_seconds % step)
    }

    fn step_seconds(&self) -> u64 {
        self.settings.step_seconds.max(1)
    }

    fn time_step(&self, unix_seconds: u64) -> u64 {
        unix_seconds / self.step_seconds()
    }

    /// HOTP with dynamic truncation (RFC 4226 §5.3).
    fn hotp(&self, key: &[u8], counter: u64) -> String {
        let digits = self.settings.digits.clamp(6, 9);

        // HMAC accepts keys of any length, so construction cannot fail.
        let mut mac = match Hmac::<Sha1>::new_from_slice(key) {
            Ok(mac) => mac,
            Err(_) => return "0".repeat(digits as usize),
        };
        mac.update(&counter.to_be_bytes());
        let hash = mac.finalize().into_bytes();

        let offset = (hash[hash.len() - 1] & 0x0f) as usize;
        let binary = ((hash[offset] as u32 & 0x7f) << 24)
            | ((hash[offset + 1] as u32) << 16)
            | ((hash[offset + 2] as u32) << 8)
            | (hash[offset + 3] as u32);

        let code = binary % 10u32.pow(digits);
        format!("{:0>width$}", code, width = digits as usize)
    }
}

/// Canonical form of a user-entered secret: no whitespace, dashes or
/// padding, upper case.
pub fn normalize_secret(secret: &str) -> String {
    secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '=')
        .collect::<String>()
        .to_ascii_uppercase()
}

pub(crate) fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    let normalized = normalize_secret(secret);
    if normalized.is_empty()
        || !normalized
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
    {
        return Err(TotpError::InvalidSecretFormat);
    }

    let key = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &normalized)
        .ok_or(TotpError::InvalidSecretFormat)?;

    if key.len() < MIN_SECRET_BYTES {
        return Err(TotpError::InvalidSecretFormat);
    }
    Ok(key)
}

pub(crate) fn encode_secret(bytes: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    // "12345678901234567890" in base32, the RFC 4226 / RFC 6238 SHA-1 seed.
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn eight_digit_engine() -> TotpEngine {
        TotpEngine::new(TotpSettings {
            digits: 8,
            ..TotpSettings::default()
        })
    }

    #[test]
    fn rfc6238_sha1_vectors() {
        let engine = eight_digit_engine();
        let vectors = [
            (59, "94287082"),
            (1111111109, "07081804"),
            (1111111111, "14050471"),
            (1234567890, "89005924"),
            (2000000000, "69279037"),
            (20000000000, "65353130"),
        ];

        for (time, expected) in vectors {
            let code = engine.generate_code_at(RFC_SECRET, time).unwrap();
            assert_eq!(code, expected, "mismatch at T={}", time);
        }
    }

    #[test]
    fn six_digit_codes_are_low_digits_of_rfc_vectors() {
        let engine = TotpEngine::default();
        assert_eq!(engine.generate_code_at(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(
            engine.generate_code_at(RFC_SECRET, 1111111109).unwrap(),
            "081804"
        );
        // RFC 4226 appendix D, counter 0
        assert_eq!(engine.generate_code_at(RFC_SECRET, 0).unwrap(), "755224");
    }

    #[test]
    fn same_timestamp_same_code() {
        let engine = TotpEngine::default();
        let secret = engine.generate_secret();
        let a = engine.generate_code_at(&secret, 1_700_000_000).unwrap();
        let b = engine.generate_code_at(&secret, 1_700_000_000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn verify_accepts_adjacent_steps() {
        let engine = TotpEngine::default();
        let now = 1_700_000_010;

        for offset in [-30i64, 0, 30] {
            let at = (now as i64 + offset) as u64;
            let code = engine.generate_code_at(RFC_SECRET, at).unwrap();
            assert!(
                engine.verify_code_at(&code, RFC_SECRET, now).unwrap(),
                "offset {} should verify",
                offset
            );
        }
    }

    #[test]
    fn verify_rejects_codes_outside_window() {
        let engine = TotpEngine::default();
        let now = 1_700_000_010;

        for offset in [-90i64, -120, 90] {
            let at = (now as i64 + offset) as u64;
            let code = engine.generate_code_at(RFC_SECRET, at).unwrap();
            assert!(
                !engine.verify_code_at(&code, RFC_SECRET, now).unwrap(),
                "offset {} should be rejected",
                offset
            );
        }
    }

    #[test]
    fn verify_rejects_malformed_codes() {
        let engine = TotpEngine::default();
        assert!(!engine.verify_code_at("12345", RFC_SECRET, 59).unwrap());
        assert!(!engine.verify_code_at("28708a", RFC_SECRET, 59).unwrap());
        assert!(!engine.verify_code_at("", RFC_SECRET, 59).unwrap());
    }

    #[test]
    fn verify_reports_invalid_secret() {
        let engine = TotpEngine::default();
        assert_eq!(
            engine.verify_code_at("123456", "not base32!", 59),
            Err(TotpError::InvalidSecretFormat)
        );
    }

    #[test]
    fn invalid_secrets_are_rejected() {
        let engine = TotpEngine::default();
        for bad in ["", "!!!!", "ABC1", "JBSWY3DP"] {
            assert_eq!(
                engine.generate_code_at(bad, 59),
                Err(TotpError::InvalidSecretFormat),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn secrets_are_normalized_before_decoding() {
        let engine = TotpEngine::default();
        let expected = engine.generate_code_at("JBSWY3DPEHPK3PXP", 59).unwrap();
        assert_eq!(
            engine.generate_code_at("jbsw y3dp-ehpk 3pxp", 59).unwrap(),
            expected
        );
        assert_eq!(normalize_secret(" jbsw-y3dp=="), "JBSWY3DP");
    }

    #[test]
    fn generated_secret_is_160_bit_base32() {
        let engine = TotpEngine::default();
        let secret = engine.generate_secret();
        assert_eq!(secret.len(), 32);
        assert_eq!(decode_secret(&secret).unwrap().len(), GENERATED_SECRET_BYTES);
        assert_ne!(secret, engine.generate_secret());
    }

    #[test]
    fn time_remaining_counts_down_within_step() {
        let engine = TotpEngine::default();
        assert_eq!(engine.time_remaining_at(0), 30);
        assert_eq!(engine.time_remaining_at(1), 29);
        assert_eq!(engine.time_remaining_at(29), 1);
        assert_eq!(engine.time_remaining_at(59), 1);

        let live = engine.time_remaining();
        assert!((1..=30).contains(&live));
    }
}
