//! Engine configuration parameters
//!
//! All tunable parameters for the cardlink engine.  Values can be
//! overridden by the host at construction time or hot-reloaded through
//! [`AppCommand::UpdateConfig`](crate::app::commands::AppCommand).

use serde::{Deserialize, Serialize};

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Session retry policy ---
    /// Maximum automatic setup re-attempts per connect() request
    pub retry_max_attempts: u8,
    /// Delay before the first re-attempt (milliseconds)
    pub retry_initial_delay_ms: u32,
    /// Multiplier applied to the delay after each failed attempt
    pub retry_backoff_multiplier: u32,
    /// Upper bound on the backoff delay (milliseconds)
    pub retry_max_delay_ms: u32,

    // --- Session defaults ---
    /// Data profile id used when the caller does not specify one
    pub default_profile_id: u8,

    // --- Identity validation ---
    /// Minimum accepted IMSI length (digits)
    pub imsi_min_digits: u8,
    /// Maximum accepted IMSI length (digits)
    pub imsi_max_digits: u8,

    // --- Record loading ---
    /// Bytes of EF_CSIM_EPRL to fetch (the full PRL can be huge;
    /// only the header carries the version)
    pub eprl_read_bytes: u8,
    /// Record index of the MDN entry in EF_CSIM_MDN
    pub mdn_record_index: u8,

    // --- Testing ---
    /// Treat the card as provisioned even without MDN/MIN
    /// (lab cards without a CSIM subscription)
    pub test_card_override: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Retry policy
            retry_max_attempts: 3,
            retry_initial_delay_ms: 5_000,
            retry_backoff_multiplier: 2,
            retry_max_delay_ms: 60_000,

            // Session defaults
            default_profile_id: 0,

            // IMSI is MCC+MNC+MSIN: at least 6 digits, at most 15
            imsi_min_digits: 6,
            imsi_max_digits: 15,

            // Record loading
            eprl_read_bytes: 4,
            mdn_record_index: 1,

            // Testing
            test_card_override: false,
        }
    }
}

impl SystemConfig {
    /// Range-check the configuration.  Returns a static description of the
    /// first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.retry_backoff_multiplier == 0 {
            return Err("retry_backoff_multiplier must be >= 1");
        }
        if self.retry_initial_delay_ms > self.retry_max_delay_ms {
            return Err("retry_initial_delay_ms exceeds retry_max_delay_ms");
        }
        if self.imsi_min_digits < 6 || self.imsi_max_digits > 15 {
            return Err("IMSI bounds outside 6..=15");
        }
        if self.imsi_min_digits > self.imsi_max_digits {
            return Err("imsi_min_digits exceeds imsi_max_digits");
        }
        if self.eprl_read_bytes < 4 {
            return Err("eprl_read_bytes must cover the 4-byte PRL header");
        }
        if self.mdn_record_index == 0 {
            return Err("mdn_record_index is 1-based");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.validate().is_ok());
        assert!(c.retry_max_attempts > 0);
        assert!(c.retry_initial_delay_ms <= c.retry_max_delay_ms);
        assert!(c.imsi_min_digits >= 6 && c.imsi_max_digits <= 15);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.retry_max_attempts, c2.retry_max_attempts);
        assert_eq!(c.retry_initial_delay_ms, c2.retry_initial_delay_ms);
        assert_eq!(c.mdn_record_index, c2.mdn_record_index);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.retry_max_delay_ms, c2.retry_max_delay_ms);
        assert_eq!(c.test_card_override, c2.test_card_override);
    }

    #[test]
    fn validate_rejects_inverted_imsi_bounds() {
        let mut c = SystemConfig::default();
        c.imsi_min_digits = 12;
        c.imsi_max_digits = 8;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_multiplier() {
        let mut c = SystemConfig::default();
        c.retry_backoff_multiplier = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_short_eprl_window() {
        let mut c = SystemConfig::default();
        c.eprl_read_bytes = 2;
        assert!(c.validate().is_err());
    }
}
