//! Stream reassembly
//!
//! Peers write packets back to back; each starts with its own 24-bit length.
//! Chunks from the socket are appended until whole packets can be cut off.

use anyhow::bail;
use lrv_wire::{packet_length, HEADER_LENGTH};

#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every packet completed by it
    pub fn push(&mut self, chunk: &[u8]) -> anyhow::Result<Vec<Vec<u8>>> {
        self.buffer.extend_from_slice(chunk);

        let mut packets = Vec::new();
        while let Some(size) = packet_length(&self.buffer) {
            if size < HEADER_LENGTH {
                bail!("declared packet length {} is shorter than the header", size);
            }
            if size > self.buffer.len() {
                break;
            }
            packets.push(self.buffer.drain(..size).collect());
        }
        Ok(packets)
    }

    /// Bytes of an incomplete packet
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
