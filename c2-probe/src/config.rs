//! Configuration of the interface and of the emulated target.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameTable, FrameTableError, DEFAULT_WAIT_CYCLES};
use crate::reset::ResetTiming;
use crate::wire::Pull;
use crate::Error;

/// Which frame table the interface is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// DataRead and AddressWrite only.
    Minimal,
    /// All transaction kinds, including the reset pulse.
    #[default]
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub profile: Profile,
    /// Build the glitch injector into the interface.
    pub glitch: bool,
    /// Wait budget of the profile's frames that wait for the target. Custom
    /// frames keep their own.
    pub wait_cycles: u8,
    /// Reset pulse timing, used by the full profile.
    pub reset: ResetTiming,
    /// Replaces the profile's frames.
    pub frames: Option<Vec<Frame>>,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl InterfaceConfig {
    pub fn minimal() -> Self {
        Self {
            profile: Profile::Minimal,
            glitch: false,
            wait_cycles: DEFAULT_WAIT_CYCLES,
            reset: ResetTiming::default(),
            frames: None,
        }
    }

    pub fn full() -> Self {
        Self {
            profile: Profile::Full,
            glitch: true,
            wait_cycles: DEFAULT_WAIT_CYCLES,
            reset: ResetTiming::default(),
            frames: None,
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.frame_table()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::debug!("Loading interface configuration from {}", path.display());

        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Builds and validates the frame table this configuration describes.
    pub fn frame_table(&self) -> Result<FrameTable, FrameTableError> {
        let reset = match self.profile {
            Profile::Minimal => None,
            Profile::Full => Some(self.reset),
        };

        let table = match &self.frames {
            Some(frames) => FrameTable::new(frames.clone(), reset)?,
            None => {
                let table = match self.profile {
                    Profile::Minimal => FrameTable::minimal(),
                    Profile::Full => FrameTable::full().with_reset(reset),
                };
                table.with_wait_cycles(self.wait_cycles)
            }
        };

        table.validate()?;
        Ok(table)
    }
}

/// Behaviour of the emulated target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Clock periods spent in the wait phase before the target raises the
    /// data line.
    pub ready_latency: u32,
    /// A target that never signals readiness.
    pub unresponsive: bool,
    /// Clock low for this many ticks resets the target.
    pub reset_threshold: u32,
    /// Level of the data line when nobody drives it.
    pub pull: Pull,
    /// Initial SFR contents, starting at address 0.
    pub sfr: Vec<u8>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            ready_latency: 2,
            unresponsive: false,
            reset_threshold: 480,
            pull: Pull::Down,
            sfr: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TransactionKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_is_full_profile() {
        let table = InterfaceConfig::default().frame_table().unwrap();

        assert_eq!(table, FrameTable::full());
    }

    #[test]
    fn minimal_profile_has_no_reset() {
        let table = InterfaceConfig::minimal().frame_table().unwrap();

        assert_eq!(table, FrameTable::minimal());
        assert!(!table.supports(TransactionKind::Reset));
    }

    #[test]
    fn yaml_profile() {
        let config = InterfaceConfig::from_yaml_str(
            r#"
profile: minimal
wait_cycles: 40
"#,
        )
        .unwrap();

        assert_eq!(config.profile, Profile::Minimal);
        assert!(config.glitch, "unset fields keep their defaults");

        let table = config.frame_table().unwrap();
        assert_eq!(table.frame(TransactionKind::DataRead).map(|f| f.wait_cycles), Some(40));
    }

    #[test]
    fn yaml_custom_frames_are_validated() {
        let result = InterfaceConfig::from_yaml_str(
            r#"
frames:
  - kind: address-write
    header: 7
    payload_offset: 3
    tx_bits: 12
"#,
        );

        assert!(matches!(
            result,
            Err(Error::FrameTable(FrameTableError::PayloadMisaligned { .. }))
        ));
    }

    #[test]
    fn yaml_custom_frames_keep_their_wait_budget() {
        let config = InterfaceConfig::from_yaml_str(
            r#"
wait_cycles: 40
frames:
  - kind: data-read
    header: 1
    tx_bits: 5
    wait_cycles: 9
    rx_bits: 8
  - kind: address-write
    header: 7
    payload_offset: 3
    tx_bits: 11
"#,
        )
        .unwrap();

        let table = config.frame_table().unwrap();
        assert_eq!(table.frame(TransactionKind::DataRead).map(|f| f.wait_cycles), Some(9));
        assert_eq!(table.frame(TransactionKind::AddressWrite).map(|f| f.wait_cycles), Some(0));
        assert!(!table.supports(TransactionKind::DataWrite));
    }

    #[test]
    fn yaml_reset_timing() {
        let config = InterfaceConfig::from_yaml_str(
            r#"
reset:
  low_cycles: 100
"#,
        )
        .unwrap();

        assert_eq!(
            config.frame_table().unwrap().reset(),
            Some(ResetTiming {
                low_cycles: 100,
                high_cycles: 96
            })
        );
    }

    #[test]
    fn target_config_from_yaml() {
        let config: TargetConfig = serde_yaml::from_str("ready_latency: 7\npull: up\n").unwrap();

        assert_eq!(config.ready_latency, 7);
        assert_eq!(config.pull, Pull::Up);
        assert_eq!(config.reset_threshold, 480);
        assert!(config.sfr.is_empty());
    }
}
