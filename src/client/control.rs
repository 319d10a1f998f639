use bytes::BytesMut;
use tracing::debug;

use super::create::S7Client;
use crate::{
    connection::Exchange,
    errors::Result,
    s7_protocol::control::{
        encode_cold_restart, encode_compress, encode_copy_ram_to_rom, encode_hot_restart,
        encode_insert_file, encode_stop, validate_control_ack, BlockType, FileSystem,
    },
};

/// *Methods for controlling the PLC device*
impl S7Client {
    async fn control(
        &mut self,
        operation: &'static str,
        encode: impl FnOnce(u16) -> Result<BytesMut>,
    ) -> Result<()> {
        self.session.ensure_ready()?;
        let pdu_reference = self.session.next_pdu_reference();
        let request = encode(pdu_reference)?;
        debug!(operation, pdu_reference, "control request");
        let response = self.session.exchange(request).await?;
        validate_control_ack(&response, pdu_reference).map_err(|e| self.session.poison(e))?;
        Ok(())
    }

    /// Warm restart the CPU
    ///
    /// # Errors
    ///
    /// Will return `Error` if the PLC rejects the request.
    pub async fn hot_restart(&mut self) -> Result<()> {
        self.control("hot restart", encode_hot_restart).await
    }

    /// Cold restart the CPU, resetting retentive data
    ///
    /// # Errors
    ///
    /// Will return `Error` if the PLC rejects the request.
    pub async fn cold_restart(&mut self) -> Result<()> {
        self.control("cold restart", encode_cold_restart).await
    }

    /// Put the CPU into STOP
    ///
    /// # Errors
    ///
    /// Will return `Error` if the PLC rejects the request.
    pub async fn plc_stop(&mut self) -> Result<()> {
        self.control("stop", encode_stop).await
    }

    /// Copy RAM to ROM
    ///
    /// # Errors
    ///
    /// Will return `Error` if the PLC rejects the request.
    pub async fn copy_ram_to_rom(&mut self) -> Result<()> {
        self.control("copy ram to rom", encode_copy_ram_to_rom)
            .await
    }

    /// Compress the PLC memory
    ///
    /// # Errors
    ///
    /// Will return `Error` if the PLC rejects the request.
    pub async fn compress(&mut self) -> Result<()> {
        self.control("compress", encode_compress).await
    }

    /// Insert a downloaded block into the passive file system
    ///
    /// # Example
    /// ```rust, ignore
    /// use s7link::BlockType;
    ///
    /// client.insert_file(BlockType::DB, 100)
    ///     .await
    ///     .expect("Could not insert block");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if `number` has more than 5 digits or the PLC rejects the request.
    pub async fn insert_file(&mut self, block_type: BlockType, number: u32) -> Result<()> {
        self.insert_file_to(block_type, number, FileSystem::default())
            .await
    }

    /// Insert a downloaded block into the given file system
    ///
    /// # Errors
    ///
    /// Will return `Error` if `number` has more than 5 digits or the PLC rejects the request.
    pub async fn insert_file_to(
        &mut self,
        block_type: BlockType,
        number: u32,
        file_system: FileSystem,
    ) -> Result<()> {
        self.control("insert", |pdu_reference| {
            encode_insert_file(pdu_reference, block_type, number, file_system)
        })
        .await
    }
}
