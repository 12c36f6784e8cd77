//! Sheet references in the workbook part.

use crate::ooxml::error::Result;

use super::descriptor::SheetEntry;
use super::workbook::Workbook;

impl Workbook {
    /// Append a sheet reference to the workbook.
    ///
    /// `rid` is the number of the workbook relationship pointing at the
    /// worksheet part; it is stored as `rId<rid>`. Name length and id
    /// uniqueness are the caller's concern.
    pub fn set_workbook(&mut self, name: &str, sheet_id: u32, rid: u32) -> Result<()> {
        let wb = self.workbook_reader()?;
        let mut buf = itoa::Buffer::new();
        wb.sheets.push(SheetEntry {
            name: name.to_string(),
            sheet_id,
            r_id: format!("rId{}", buf.format(rid)),
            state: None,
        });
        Ok(())
    }

    /// Sheet references in tab order.
    pub fn sheet_list(&mut self) -> Result<Vec<SheetEntry>> {
        Ok(self.workbook_reader()?.sheets.clone())
    }
}
