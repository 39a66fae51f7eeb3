//! Per-computor tick votes (BroadcastTick payload)

use crate::codec::Reader;
use crate::crypto::{Crypto, Digest, Signature};
use crate::packet::MessageType;
use serde::{Deserialize, Serialize};

/// Payload length of a tick vote
pub const TICK_VOTE_LENGTH: usize = 352;

/// Bytes covered by the computor signature (everything before it)
const SIGNED_LENGTH: usize = TICK_VOTE_LENGTH - 64;

/// Wall-clock fields carried by a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TickTime {
    pub millisecond: u16,
    pub second: u8,
    pub minute: u8,
    pub hour: u8,
    pub day: u8,
    pub month: u8,
    /// Years since 2000
    pub year: u8,
}

impl TickTime {
    fn read(reader: &mut Reader<'_>) -> Self {
        Self {
            millisecond: reader.u16(),
            second: reader.u8(),
            minute: reader.u8(),
            hour: reader.u8(),
            day: reader.u8(),
            month: reader.u8(),
            year: reader.u8(),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.millisecond.to_le_bytes());
        out.extend_from_slice(&[
            self.second,
            self.minute,
            self.hour,
            self.day,
            self.month,
            self.year,
        ]);
    }
}

/// One computor's signed claim about a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickVote {
    pub computor_index: u16,
    pub epoch: u16,
    pub tick: u32,
    pub time: TickTime,
    pub prev_resource_testing_digest: [u8; 8],
    pub salted_resource_testing_digest: [u8; 8],
    pub prev_spectrum_digest: Digest,
    pub prev_universe_digest: Digest,
    pub prev_computer_digest: Digest,
    pub salted_spectrum_digest: Digest,
    pub salted_universe_digest: Digest,
    pub salted_computer_digest: Digest,
    pub transaction_digest: Digest,
    pub expected_next_tick_transaction_digest: Digest,
    pub signature: Signature,
}

impl TickVote {
    pub(crate) fn decode(payload: &[u8]) -> Self {
        let mut reader = Reader::new(payload);
        Self {
            computor_index: reader.u16(),
            epoch: reader.u16(),
            tick: reader.u32(),
            time: TickTime::read(&mut reader),
            prev_resource_testing_digest: reader.array(),
            salted_resource_testing_digest: reader.array(),
            prev_spectrum_digest: reader.array(),
            prev_universe_digest: reader.array(),
            prev_computer_digest: reader.array(),
            salted_spectrum_digest: reader.array(),
            salted_universe_digest: reader.array(),
            salted_computer_digest: reader.array(),
            transaction_digest: reader.array(),
            expected_next_tick_transaction_digest: reader.array(),
            signature: reader.array(),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.computor_index.to_le_bytes());
        out.extend_from_slice(&self.epoch.to_le_bytes());
        out.extend_from_slice(&self.tick.to_le_bytes());
        self.time.write(out);
        out.extend_from_slice(&self.prev_resource_testing_digest);
        out.extend_from_slice(&self.salted_resource_testing_digest);
        out.extend_from_slice(&self.prev_spectrum_digest);
        out.extend_from_slice(&self.prev_universe_digest);
        out.extend_from_slice(&self.prev_computer_digest);
        out.extend_from_slice(&self.salted_spectrum_digest);
        out.extend_from_slice(&self.salted_universe_digest);
        out.extend_from_slice(&self.salted_computer_digest);
        out.extend_from_slice(&self.transaction_digest);
        out.extend_from_slice(&self.expected_next_tick_transaction_digest);
        out.extend_from_slice(&self.signature);
    }

    /// Digest the computor signs. The first byte of the computor index is
    /// XOR-ed with the message type so a vote can't be replayed as another
    /// message.
    pub fn signing_digest(&self, crypto: &dyn Crypto) -> Digest {
        let mut bytes = Vec::with_capacity(TICK_VOTE_LENGTH);
        self.encode(&mut bytes);
        bytes.truncate(SIGNED_LENGTH);
        bytes[0] ^= MessageType::BroadcastTick as u8;
        crypto.digest(&bytes)
    }

    /// True when both votes carry identical tick content and signature
    pub fn same_content(&self, other: &TickVote) -> bool {
        self == other
    }
}
