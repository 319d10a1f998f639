//! CNC data of SINUMERIK controllers, read through NCK addressing.
//!
//! NCK payloads are little-endian regardless of the PLC family.

use super::{batch::read_batch, create::S7Client};
use crate::{
    convert::{bytes_to_f64, bytes_to_u16, bytes_to_u32, latin1_to_string, Endian},
    errors::{Error, Result},
    s7_protocol::segments::{
        data_item::DataItem,
        nck_item::{NckArea, NckItem, NckModule},
        request_item::RequestItem,
    },
};

/// Column holding the CNC identification
const CNC_ID_COLUMN: u16 = 18030;
/// Column holding version, type and manufacture date, one per line
const CNC_INFO_COLUMN: u16 = 18040;

/// Single line of unit 1
fn line(area: NckArea, column: u16, line: u16, module: NckModule) -> Result<NckItem> {
    NckItem::new(area, 1, column, line, module, 1)
}

fn nck_text(data: &[u8]) -> String {
    latin1_to_string(data)
        .trim_matches(|c: char| c <= ' ')
        .to_string()
}

/// *Methods for reading CNC data*
impl S7Client {
    /// Read NCK items in as few requests as the PDU length allows, failing if any of them failed
    ///
    /// # Example
    /// ```rust, ignore
    /// use s7link::{NckArea, NckItem, NckModule};
    ///
    /// let item = NckItem::new(NckArea::Channel, 1, 2, 1, NckModule::Sma, 1)?;
    /// let data = client.read_nck(&[item]).await?;
    /// ```
    /// # Errors
    ///
    /// Will return [`Error::Item`] naming every item the controller could not read.
    pub async fn read_nck(&mut self, items: &[NckItem]) -> Result<Vec<DataItem>> {
        let items: Vec<RequestItem> = items.iter().copied().map(RequestItem::from).collect();
        read_batch(&mut self.session, &items, true).await
    }

    async fn read_nck_item(&mut self, item: NckItem) -> Result<Vec<u8>> {
        self.read_nck(&[item])
            .await?
            .pop()
            .map(|item| item.data)
            .ok_or_else(|| Error::framing("response carries no data item"))
    }

    async fn read_nck_text(&mut self, item: NckItem) -> Result<String> {
        Ok(nck_text(&self.read_nck_item(item).await?))
    }

    async fn read_nck_f64(&mut self, item: NckItem) -> Result<f64> {
        bytes_to_f64(&self.read_nck_item(item).await?, Endian::Little)
    }

    async fn read_nck_u16(&mut self, item: NckItem) -> Result<u16> {
        bytes_to_u16(&self.read_nck_item(item).await?, Endian::Little)
    }

    async fn read_nck_f64s(&mut self, items: &[NckItem]) -> Result<Vec<f64>> {
        self.read_nck(items)
            .await?
            .iter()
            .map(|item| bytes_to_f64(&item.data, Endian::Little))
            .collect()
    }

    /// Axis values of `column` for lines `lines` in channel 1
    async fn read_axes(
        &mut self,
        column: u16,
        lines: std::ops::RangeInclusive<u16>,
        module: NckModule,
    ) -> Result<Vec<f64>> {
        let items = lines
            .map(|l| line(NckArea::Channel, column, l, module))
            .collect::<Result<Vec<_>>>()?;
        self.read_nck_f64s(&items).await
    }

    /// CNC identification
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_cnc_id(&mut self) -> Result<String> {
        self.read_nck_text(line(NckArea::Nck, CNC_ID_COLUMN, 1, NckModule::M)?)
            .await
    }

    /// CNC software version
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_cnc_version(&mut self) -> Result<String> {
        self.read_nck_text(line(NckArea::Nck, CNC_INFO_COLUMN, 1, NckModule::M)?)
            .await
    }

    /// CNC type, first variant
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_cnc_type1(&mut self) -> Result<String> {
        self.read_nck_text(line(NckArea::Nck, CNC_INFO_COLUMN, 2, NckModule::M)?)
            .await
    }

    /// CNC manufacture date
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_cnc_manufacture_date(&mut self) -> Result<String> {
        self.read_nck_text(line(NckArea::Nck, CNC_INFO_COLUMN, 3, NckModule::M)?)
            .await
    }

    /// CNC type
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_cnc_type(&mut self) -> Result<String> {
        self.read_nck_text(line(NckArea::Nck, CNC_INFO_COLUMN, 4, NckModule::M)?)
            .await
    }

    /// Machine coordinates of the first four axes
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_machine_position(&mut self) -> Result<Vec<f64>> {
        self.read_axes(2, 1..=4, NckModule::Sma).await
    }

    /// Workpiece coordinates of the first four axes
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_relative_position(&mut self) -> Result<Vec<f64>> {
        self.read_axes(25, 1..=4, NckModule::Sega).await
    }

    /// Distance to go of the first four axes
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_remain_position(&mut self) -> Result<Vec<f64>> {
        self.read_axes(3, 1..=4, NckModule::Sma).await
    }

    /// Tool offset in workpiece coordinates (X, Y, Z)
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_t_workpiece_position(&mut self) -> Result<Vec<f64>> {
        self.read_axes(1, 4..=6, NckModule::Fu).await
    }

    /// Active tool radius compensation number
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_tool_radius_compensation_number(&mut self) -> Result<u16> {
        self.read_nck_u16(line(NckArea::Channel, 35, 1, NckModule::S)?)
            .await
    }

    /// Active tool number
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_tool_number(&mut self) -> Result<u16> {
        self.read_nck_u16(line(NckArea::Channel, 23, 1, NckModule::S)?)
            .await
    }

    /// Actual spindle speed
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_act_spindle_speed(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Channel, 2, 1, NckModule::Ssp)?)
            .await
    }

    /// Programmed spindle speed
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_set_spindle_speed(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Nck, 3, 4, NckModule::Ssp)?)
            .await
    }

    /// Spindle override
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_spindle_rate(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Channel, 4, 1, NckModule::Ssp)?)
            .await
    }

    /// Feed override
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_feed_rate(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Channel, 3, 1, NckModule::S)?)
            .await
    }

    /// Programmed feed rate
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_set_feed_rate(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Channel, 2, 1, NckModule::S)?)
            .await
    }

    /// Actual feed rate
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_act_feed_rate(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Channel, 1, 1, NckModule::S)?)
            .await
    }

    /// Operating mode of mode group 1 (JOG, MDA, AUTO)
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_work_mode(&mut self) -> Result<u16> {
        self.read_nck_u16(line(NckArea::ModeGroup, 3, 1, NckModule::S)?)
            .await
    }

    /// Program status of channel 1
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_status(&mut self) -> Result<u16> {
        self.read_nck_u16(line(NckArea::Channel, 11, 1, NckModule::S)?)
            .await
    }

    /// Run time of the current program in seconds
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_run_time(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Channel, 297, 1, NckModule::S)?)
            .await
    }

    /// Remaining time of the current program in seconds
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_remain_time(&mut self) -> Result<f64> {
        self.read_nck_f64(line(NckArea::Channel, 298, 1, NckModule::S)?)
            .await
    }

    /// Name of the selected program
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_program_name(&mut self) -> Result<String> {
        self.read_nck_text(line(NckArea::Channel, 12, 1, NckModule::Sparpp)?)
            .await
    }

    /// Number of pending alarms
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_alarm_number(&mut self) -> Result<u16> {
        self.read_nck_u16(line(NckArea::Nck, 7, 1, NckModule::S)?)
            .await
    }

    /// Number of the first pending alarm
    ///
    /// # Errors
    ///
    /// Will return `Error` if the controller rejects the read.
    pub async fn read_alarm_info(&mut self) -> Result<u32> {
        bytes_to_u32(
            &self
                .read_nck_item(line(NckArea::Nck, 1, 1, NckModule::Sala)?)
                .await?,
            Endian::Little,
        )
    }
}
