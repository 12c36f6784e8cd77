//! Workbook properties (`workbookPr`).

use crate::ooxml::error::Result;

use super::descriptor::WorkbookPr;
use super::workbook::Workbook;

/// Workbook properties, each field independently optional.
///
/// `None` means "leave as is" when setting and "never configured" when
/// reading; `Some(false)` and `Some(String::new())` are real values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookPropsOptions {
    /// Use the 1904 date system
    pub date1904: Option<bool>,
    /// Strip personal information on save
    pub filter_privacy: Option<bool>,
    /// VBA code name of the workbook
    pub code_name: Option<String>,
}

impl Workbook {
    /// Set workbook properties.
    ///
    /// `None` changes nothing. Otherwise only the fields given in `opts` are
    /// written; the others keep their stored value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xlbook::ooxml::xlsx::{Workbook, WorkbookPropsOptions};
    ///
    /// let mut workbook = Workbook::new()?;
    /// workbook.set_workbook_props(Some(&WorkbookPropsOptions {
    ///     date1904: Some(true),
    ///     ..Default::default()
    /// }))?;
    /// assert_eq!(workbook.get_workbook_props()?.date1904, Some(true));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set_workbook_props(&mut self, opts: Option<&WorkbookPropsOptions>) -> Result<()> {
        let wb = self.workbook_reader()?;
        let Some(opts) = opts else {
            return Ok(());
        };

        let pr = wb.workbook_pr.get_or_insert_with(WorkbookPr::default);
        if let Some(date1904) = opts.date1904 {
            pr.date1904 = date1904;
        }
        if let Some(filter_privacy) = opts.filter_privacy {
            pr.filter_privacy = filter_privacy;
        }
        if let Some(code_name) = &opts.code_name {
            pr.code_name.clone_from(code_name);
        }
        Ok(())
    }

    /// Get workbook properties.
    ///
    /// Every field is `None` when the workbook has no `workbookPr` record.
    pub fn get_workbook_props(&mut self) -> Result<WorkbookPropsOptions> {
        let wb = self.workbook_reader()?;
        Ok(wb
            .workbook_pr
            .as_ref()
            .map(|pr| WorkbookPropsOptions {
                date1904: Some(pr.date1904),
                filter_privacy: Some(pr.filter_privacy),
                code_name: Some(pr.code_name.clone()),
            })
            .unwrap_or_default())
    }
}
