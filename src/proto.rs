//! Controller protocol: message envelope, message set and framing codec.
//!
//! Every message travels inside a [`Frame`] carrying the eNB id, the cell PCI
//! and the controller-side module id used for routing replies. On the wire a
//! frame is a 4-byte big-endian length followed by a JSON document; the
//! envelope fields and the message set are the binding part of the contract,
//! the encoding is not.

use serde::{Deserialize, Serialize};

use crate::error::{SliceError, SliceResult};

/// Hard cap on a single frame's payload, to bound decoder allocations.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Cell capability bits advertised in the eNB capability report.
pub const CELL_CAP_UE_REPORT: u32 = 1 << 0;
pub const CELL_CAP_UE_MEASURE: u32 = 1 << 1;
pub const CELL_CAP_CELL_MEASURE: u32 = 1 << 2;

/// Message envelope common to both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub enb_id: u32,
    pub cell_pci: u16,
    pub module_id: u32,
    pub msg: Message,
}

/// Connection state reported per UE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UeState {
    Connected,
    Disconnected,
}

/// One UE entry of a UE report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeDetails {
    pub pci: u16,
    pub rnti: u16,
    pub plmn: u32,
    pub imsi: u64,
    pub tmsi: u32,
    pub state: UeState,
}

/// One cell reading of a UE measurement report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellReading {
    pub pci: u16,
    pub rsrp: i16,
    pub rsrq: i16,
}

/// Slice state carried by a slice report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceState {
    pub slice_id: u64,
    pub plmn: u32,
    pub user_sched: u32,
    pub rbg: i32,
    pub users: Vec<u16>,
}

/// Slice configuration carried by slice commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceConfPayload {
    pub user_sched: u32,
    pub rbg: i32,
    pub time: i32,
    pub users: Vec<u16>,
}

/// The message set exchanged with the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // Controller -> agent.
    EnbSetupRequest,
    UeReportSetup { trigger_id: u32 },
    UeMeasureSetup {
        trigger_id: u32,
        meas_id: u32,
        rnti: u16,
        earfcn: u16,
        interval_ms: u32,
        max_cells: u8,
        max_meas: u8,
    },
    CellMeasureSetup { cell_pci: u16, interval_ms: u32, trigger_id: u32 },
    MacReportSetup { interval_ms: u32, trigger_id: u32 },
    SliceRequest { slice_id: u64 },
    SliceAdd { slice_id: u64, conf: SliceConfPayload },
    SliceRem { slice_id: u64 },
    SliceConf { slice_id: u64, conf: SliceConfPayload },
    TriggerRevoke { trigger_id: u32 },

    // Agent -> controller.
    EnbCapReport {
        cell_caps: u32,
        n_prb: u8,
        dl_earfcn: u32,
        ul_earfcn: u32,
        l2_caps: u32,
        slice_sched: u32,
    },
    UeReport { ues: Vec<UeDetails> },
    UeMeasReport {
        rnti: u16,
        meas_id: u32,
        serving: CellReading,
        neighbors: Vec<CellReading>,
    },
    UeMeasFail { rnti: u16, meas_id: u32 },
    CellMeasReport { cell_pci: u16, dl_prbs: u64, ul_prbs: u64 },
    SliceReport { slice: SliceState },
    SliceNotSupported,
}

/// Encode a frame as length-prefixed JSON.
pub fn encode_frame(frame: &Frame) -> SliceResult<Vec<u8>> {
    let body = serde_json::to_vec(frame).map_err(|e| SliceError::Transport(e.to_string()))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(SliceError::Transport(format!("frame too large: {} bytes", body.len())));
    }
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a frame body previously read off the wire.
pub fn decode_frame(body: &[u8]) -> SliceResult<Frame> {
    serde_json::from_slice(body).map_err(|e| SliceError::Transport(e.to_string()))
}

/// Validate a length prefix before reading the body.
pub fn frame_len(prefix: [u8; 4]) -> SliceResult<usize> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(SliceError::Transport(format!("bad frame length {len}")));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) -> Frame {
        let frame = Frame { enb_id: 0x1001, cell_pci: 3, module_id: 7, msg };
        let bytes = encode_frame(&frame).unwrap();
        let len = frame_len([bytes[0], bytes[1], bytes[2], bytes[3]]).unwrap();
        assert_eq!(len, bytes.len() - 4);
        decode_frame(&bytes[4..]).unwrap()
    }

    #[test]
    fn envelope_survives_the_wire() {
        let frame = roundtrip(Message::EnbSetupRequest);
        assert_eq!(frame.enb_id, 0x1001);
        assert_eq!(frame.cell_pci, 3);
        assert_eq!(frame.module_id, 7);
    }

    #[test]
    fn ue_report_roundtrips() {
        let frame = roundtrip(Message::UeReport {
            ues: vec![UeDetails {
                pci: 3,
                rnti: 0x46,
                plmn: 0x222f93,
                imsi: 222930000000001,
                tmsi: 0xc0ffee,
                state: UeState::Connected,
            }],
        });
        match frame.msg {
            Message::UeReport { ues } => {
                assert_eq!(ues.len(), 1);
                assert_eq!(ues[0].rnti, 0x46);
                assert_eq!(ues[0].state, UeState::Connected);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn zero_and_oversized_lengths_are_rejected() {
        assert!(frame_len([0, 0, 0, 0]).is_err());
        assert!(frame_len(0x7fff_ffffu32.to_be_bytes()).is_err());
        assert!(frame_len([0, 0, 1, 0]).is_ok());
    }
}
