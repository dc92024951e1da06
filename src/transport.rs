//! Controller link.
//!
//! A single long-lived TCP connection to the controller, driven by a
//! dedicated thread running a current-thread tokio runtime. Outbound frames
//! are queued on a lock-free channel and drained by a writer task; inbound
//! bytes are re-framed incrementally and dispatched to a handler owned by the
//! caller, so no process-wide state is involved.
//!
//! The link also owns the trigger registry: subscription commands register
//! their trigger id on arrival, revocations remove it, and a disconnect wipes
//! the registry. Reporting code polls [`ControllerTransport::has_trigger`]
//! and silently drops subscriptions whose trigger is gone.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{SliceError, SliceResult};
use crate::proto::{decode_frame, encode_frame, frame_len, Frame, Message, MAX_FRAME_LEN};

/// Outbound surface the agent reports through.
pub trait ControllerTransport: Send + Sync {
    /// Whether the controller still knows this trigger id.
    fn has_trigger(&self, enb_id: u32, trigger_id: u32) -> bool;

    /// Queue a frame for transmission. Never blocks.
    fn send(&self, frame: Frame) -> SliceResult<()>;
}

/// Inbound surface the link dispatches into. Implemented by the agent's
/// callback dispatcher; replies are sent back over the same link.
pub trait InboundHandler: Send + Sync {
    fn handle(&self, frame: Frame) -> Vec<Frame>;

    /// The connection dropped; subscriptions are gone.
    fn disconnected(&self);
}

/// Incremental length-prefix splitter for the inbound byte stream.
struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    fn new() -> FrameDecoder {
        FrameDecoder { buf: Vec::with_capacity(4096) }
    }

    fn push(&mut self, bytes: &[u8]) -> SliceResult<Vec<Frame>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            if self.buf.len() < 4 {
                break;
            }
            let len = frame_len([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])?;
            if self.buf.len() < 4 + len {
                break;
            }
            let frame = decode_frame(&self.buf[4..4 + len])?;
            self.buf.drain(..4 + len);
            frames.push(frame);
        }
        Ok(frames)
    }
}

struct LinkShared {
    enb_id: u32,
    triggers: Mutex<HashSet<u32>>,
    outbox_tx: Sender<Frame>,
    running: AtomicBool,
}

/// TCP implementation of the controller link.
pub struct ControllerLink {
    shared: Arc<LinkShared>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ControllerLink {
    /// Spawn the link thread; it keeps reconnecting to `addr` with a fixed
    /// backoff until [`ControllerLink::stop`] is called.
    pub fn start(
        enb_id: u32,
        addr: String,
        handler: Arc<dyn InboundHandler>,
    ) -> SliceResult<Arc<ControllerLink>> {
        let (outbox_tx, outbox_rx) = unbounded();
        let shared = Arc::new(LinkShared {
            enb_id,
            triggers: Mutex::new(HashSet::new()),
            outbox_tx,
            running: AtomicBool::new(true),
        });

        let thread_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("controller-link".to_string())
            .spawn(move || {
                link_thread(thread_shared, addr, handler, outbox_rx);
            })?;

        Ok(Arc::new(ControllerLink { shared, thread: Mutex::new(Some(thread)) }))
    }

    /// Stop the link thread and join it.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl ControllerTransport for ControllerLink {
    fn has_trigger(&self, enb_id: u32, trigger_id: u32) -> bool {
        enb_id == self.shared.enb_id && self.shared.triggers.lock().contains(&trigger_id)
    }

    fn send(&self, frame: Frame) -> SliceResult<()> {
        self.shared
            .outbox_tx
            .send(frame)
            .map_err(|_| SliceError::Transport("link is down".to_string()))
    }
}

/// Track trigger liveness from the messages flowing by.
fn register_triggers(shared: &LinkShared, msg: &Message) {
    match msg {
        Message::UeReportSetup { trigger_id }
        | Message::UeMeasureSetup { trigger_id, .. }
        | Message::CellMeasureSetup { trigger_id, .. }
        | Message::MacReportSetup { trigger_id, .. } => {
            shared.triggers.lock().insert(*trigger_id);
        }
        Message::TriggerRevoke { trigger_id } => {
            shared.triggers.lock().remove(trigger_id);
            debug!(trigger_id, "trigger revoked");
        }
        _ => {}
    }
}

fn link_thread(
    shared: Arc<LinkShared>,
    addr: String,
    handler: Arc<dyn InboundHandler>,
    outbox_rx: Receiver<Frame>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            warn!(error = %e, "cannot build link runtime");
            return;
        }
    };

    rt.block_on(async {
        while shared.running.load(Ordering::Relaxed) {
            let stream = match TcpStream::connect(&addr).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(addr = %addr, error = %e, "controller unreachable");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            info!(addr = %addr, "controller connected");
            let _ = stream.set_nodelay(true);

            run_connection(&shared, stream, &handler, &outbox_rx).await;

            // Whatever ended the connection, subscriptions are void now.
            shared.triggers.lock().clear();
            handler.disconnected();
            if shared.running.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });
}

async fn run_connection(
    shared: &Arc<LinkShared>,
    stream: TcpStream,
    handler: &Arc<dyn InboundHandler>,
    outbox_rx: &Receiver<Frame>,
) {
    let (mut rd, mut wr) = stream.into_split();
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; MAX_FRAME_LEN.min(16 * 1024)];

    'conn: loop {
        if !shared.running.load(Ordering::Relaxed) {
            break;
        }

        // Drain pending reports first; replies below join the same queue.
        while let Ok(frame) = outbox_rx.try_recv() {
            let bytes = match encode_frame(&frame) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "dropping unencodable frame");
                    continue;
                }
            };
            if wr.write_all(&bytes).await.is_err() {
                break 'conn;
            }
        }

        // Short read timeout so the outbox and the running flag stay live.
        match tokio::time::timeout(Duration::from_millis(20), rd.read(&mut chunk)).await {
            Err(_) => continue,
            Ok(Err(_)) | Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                let frames = match decoder.push(&chunk[..n]) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(error = %e, "framing error, dropping connection");
                        break;
                    }
                };
                for frame in frames {
                    register_triggers(shared, &frame.msg);
                    for reply in handler.handle(frame) {
                        let _ = shared.outbox_tx.send(reply);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Message;

    #[test]
    fn decoder_reassembles_split_frames() {
        let frame = Frame { enb_id: 1, cell_pci: 3, module_id: 0, msg: Message::EnbSetupRequest };
        let bytes = encode_frame(&frame).unwrap();
        let mut decoder = FrameDecoder::new();

        let (head, tail) = bytes.split_at(3);
        assert!(decoder.push(head).unwrap().is_empty());
        let frames = decoder.push(tail).unwrap();
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn decoder_handles_back_to_back_frames() {
        let a = Frame { enb_id: 1, cell_pci: 3, module_id: 0, msg: Message::EnbSetupRequest };
        let b = Frame {
            enb_id: 1,
            cell_pci: 3,
            module_id: 2,
            msg: Message::UeReportSetup { trigger_id: 9 },
        };
        let mut bytes = encode_frame(&a).unwrap();
        bytes.extend(encode_frame(&b).unwrap());
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&bytes).unwrap();
        assert_eq!(frames, vec![a, b]);
    }

    #[test]
    fn decoder_rejects_corrupt_length() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&[0xff, 0xff, 0xff, 0xff, 0]).is_err());
    }
}
