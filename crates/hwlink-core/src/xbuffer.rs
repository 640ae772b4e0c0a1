//! Extended buffer transfer: chunked exchanges for oversized payloads
//!
//! Payloads larger than one frame are moved as numbered chunks. The chunk
//! position rides in `param4`: low 16 bits are the zero-based chunk index,
//! high 16 bits are `overall_chunks - 1`. Two ways of learning the total
//! size coexist, matching two device generations: the first response's
//! table header declares it, or a static registry knows it before any I/O.
//! Both share the packing and accumulation logic here.
//!
//! A multi-chunk transfer is one logical unit of work: chunks are requested
//! in strictly increasing index order, any chunk failure aborts the whole
//! transfer, and a partial accumulator is never handed to the caller.

use crate::channel::{opcodes, Command, CommandChannel};
use crate::error::{ProtocolError, Result};
use crate::frame::MAX_FRAME_PAYLOAD;
use crate::tables::{table_id, TableHeader, TABLE_HEADER_SIZE};
use crate::transport::TransportPort;

/// Pack a chunk position into the `param4` field.
///
/// `((overall_chunks - 1) << 16) | chunk_index`, bit-exact for device
/// compatibility. A single-chunk transfer packs to 0.
pub fn pack_chunk_param(overall_chunks: u16, chunk_index: u16) -> u32 {
    (((overall_chunks as u32) - 1) << 16) | chunk_index as u32
}

/// How a chunked receive learns the transfer's total size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSizing {
    /// The first response's table header declares it
    FromHeader,
    /// Known before any I/O from the command/table identity
    Known(usize),
}

/// Exact transfer sizes for commands whose tables have fixed layouts,
/// keyed by `(opcode, table id)`. Combinations missing from this registry
/// are sized by the first response's header instead.
const KNOWN_TRANSFER_SIZES: &[(u8, u16, usize)] = &[
    (opcodes::GET_CALIB_TABLE, table_id::DEPTH_CALIBRATION, 512),
    (opcodes::GET_CALIB_TABLE, table_id::RGB_CALIBRATION, 344),
    (opcodes::GET_CALIB_TABLE, table_id::IMU_CALIBRATION, 180),
    (opcodes::GET_CALIB_TABLE, table_id::FACTORY_CALIBRATION, 2500),
];

/// Look up a registered transfer size.
pub fn known_transfer_size(opcode: u8, table_id: u16) -> Option<usize> {
    KNOWN_TRANSFER_SIZES
        .iter()
        .find(|(op, id, _)| *op == opcode && *id == table_id)
        .map(|(_, _, size)| *size)
}

/// Look up a registered transfer size, treating absence as a configuration
/// bug at the call site.
pub fn require_known_transfer_size(opcode: u8, table_id: u16) -> Result<usize> {
    known_transfer_size(opcode, table_id)
        .ok_or(ProtocolError::UnknownTransferSize { opcode, table_id })
}

fn chunk_count(total: usize) -> Result<u16> {
    u16::try_from(total.div_ceil(MAX_FRAME_PAYLOAD))
        .map_err(|_| ProtocolError::MalformedResponse { len: total })
}

impl<P: TransportPort + ?Sized> CommandChannel<P> {
    /// Exchange a command whose payload may exceed one frame, in either
    /// direction.
    ///
    /// Commands carrying data are sent chunked — always, even when the
    /// payload fits one frame, so `param4` is populated for devices that
    /// inspect it unconditionally. Reads pick their sizing strategy from
    /// the registry: tables with a registered size are fetched with exactly
    /// that many chunks, everything else is sized by the first response's
    /// table header. The target table id is the low 16 bits of `param1`.
    pub fn send_extended(&self, command: &Command) -> Result<Vec<u8>> {
        if !command.data.is_empty() {
            return self.send_chunked(command);
        }
        match known_transfer_size(command.opcode, command.param1 as u16) {
            Some(size) => self.receive_known_size(command, size),
            None => self.receive_sized_by_header(command),
        }
    }

    /// Drive a chunked receive with an explicit sizing strategy.
    pub fn receive_chunked(&self, command: &Command, sizing: ChunkSizing) -> Result<Vec<u8>> {
        match sizing {
            ChunkSizing::FromHeader => self.receive_sized_by_header(command),
            ChunkSizing::Known(size) => self.receive_known_size(command, size),
        }
    }

    /// Receive a table whose size the first response declares.
    ///
    /// Chunk 0 is requested with `param4 = 0` ("chunk 0 of unknown
    /// total"); the table header at its start yields the total, and the
    /// remaining chunks are requested in increasing index order.
    pub fn receive_sized_by_header(&self, command: &Command) -> Result<Vec<u8>> {
        let mut chunk0 = command.clone();
        chunk0.param4 = 0;
        let first = self.send(&chunk0)?;

        if first.len() < TABLE_HEADER_SIZE {
            return Err(ProtocolError::TableTooSmall { len: first.len() });
        }
        let header = TableHeader::parse(&first)?;
        let total_size = header.total_size();

        if total_size <= MAX_FRAME_PAYLOAD {
            // The first response already holds the whole table.
            return Ok(first);
        }

        let overall = chunk_count(total_size)?;
        log::debug!(
            "opcode 0x{:02X}: {total_size}-byte table in {overall} chunks",
            command.opcode
        );

        let mut payload = first;
        for index in 1..overall {
            let mut next = command.clone();
            next.param4 = pack_chunk_param(overall, index);
            log::trace!("opcode 0x{:02X}: chunk {index}/{overall}", command.opcode);
            let chunk = self.send(&next)?;
            payload.extend_from_slice(&chunk);
        }
        Ok(payload)
    }

    /// Receive a table whose size is known before any I/O.
    ///
    /// Issues exactly `ceil(expected_size / frame limit)` requests. The
    /// loop degenerates correctly for single-chunk tables; `param4` is
    /// still written, with value 0.
    pub fn receive_known_size(&self, command: &Command, expected_size: usize) -> Result<Vec<u8>> {
        let overall = chunk_count(expected_size)?;
        let mut payload = Vec::with_capacity(expected_size);
        for index in 0..overall {
            let mut next = command.clone();
            next.param4 = pack_chunk_param(overall, index);
            log::trace!("opcode 0x{:02X}: chunk {index}/{overall}", command.opcode);
            payload.extend_from_slice(&self.send(&next)?);
        }
        Ok(payload)
    }

    /// Send an oversized payload as ordered chunks.
    ///
    /// The payload is split into frame-limit slices, the last one
    /// unpadded. Every request carries its packed position, including the
    /// degenerate single-chunk case. Returns the final response's payload.
    pub fn send_chunked(&self, command: &Command) -> Result<Vec<u8>> {
        let data = &command.data;
        let overall = chunk_count(data.len().max(1))?;
        log::debug!(
            "opcode 0x{:02X}: sending {} bytes in {overall} chunks",
            command.opcode,
            data.len()
        );

        let mut last = Vec::new();
        for index in 0..overall {
            let start = index as usize * MAX_FRAME_PAYLOAD;
            let end = (start + MAX_FRAME_PAYLOAD).min(data.len());
            let mut next = command.clone();
            next.param4 = pack_chunk_param(overall, index);
            next.data = data[start..end].to_vec();
            last = self.send(&next)?;
        }
        Ok(last)
    }
}
