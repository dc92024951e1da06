//! Agent and cell configuration surface.
//!
//! Loaded from a JSON file and overridable from the command line by the
//! binary. Everything here is set once at startup and copied where needed.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SliceError, SliceResult};

/// PRB widths a cell can legally have.
const VALID_PRB_WIDTHS: [u8; 6] = [6, 15, 25, 50, 75, 100];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Controller address and port.
    pub ctrl_addr: String,
    pub ctrl_port: u16,
    /// Identity of this eNB toward the controller; must be non-zero.
    pub enb_id: u32,
    /// Physical cell id.
    pub pci: u16,
    /// Cell width in PRBs.
    pub n_prb: u8,
    pub dl_earfcn: u32,
    pub ul_earfcn: u32,
    pub mcc: u16,
    pub mnc: u16,
    /// Evaluation window of the duo-dynamic scheduler, in subframes.
    pub duo_window: u32,
    /// Neutral switch position of the duo-dynamic scheduler.
    pub duo_neutral: u32,
    /// Measurement bandwidth advertised in RRC measurement objects, in PRBs.
    pub meas_bandwidth_prbs: u8,
}

impl Default for AgentConfig {
    fn default() -> AgentConfig {
        AgentConfig {
            ctrl_addr: "127.0.0.1".to_string(),
            ctrl_port: 2210,
            enb_id: 0x1001,
            pci: 1,
            n_prb: 25,
            dl_earfcn: 3400,
            ul_earfcn: 21400,
            mcc: 1,
            mnc: 1,
            duo_window: 1000,
            duo_neutral: 7,
            meas_bandwidth_prbs: 50,
        }
    }
}

impl AgentConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> SliceResult<AgentConfig> {
        let text = std::fs::read_to_string(path)?;
        let cfg: AgentConfig =
            serde_json::from_str(&text).map_err(|e| SliceError::Transport(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SliceResult<()> {
        if self.enb_id == 0 {
            return Err(SliceError::InvalidArgument("enb_id must be non-zero"));
        }
        if !VALID_PRB_WIDTHS.contains(&self.n_prb) {
            return Err(SliceError::InvalidArgument("n_prb is not a valid cell width"));
        }
        Ok(())
    }

    /// PLMN of the cell: 12-bit MCC next to 12-bit MNC.
    pub fn plmn(&self) -> u32 {
        (((self.mcc as u32) & 0x0fff) << 12) | ((self.mnc as u32) & 0x0fff)
    }

    /// Controller endpoint in `addr:port` form.
    pub fn ctrl_endpoint(&self) -> String {
        format!("{}:{}", self.ctrl_addr, self.ctrl_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AgentConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_enb_id_is_rejected() {
        let cfg = AgentConfig { enb_id: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn odd_cell_width_is_rejected() {
        let cfg = AgentConfig { n_prb: 33, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn plmn_packs_mcc_and_mnc() {
        let cfg = AgentConfig { mcc: 222, mnc: 93, ..Default::default() };
        assert_eq!(cfg.plmn(), (222 << 12) | 93);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: AgentConfig = serde_json::from_str(r#"{"enb_id": 77}"#).unwrap();
        assert_eq!(cfg.enb_id, 77);
        assert_eq!(cfg.n_prb, 25);
    }
}
