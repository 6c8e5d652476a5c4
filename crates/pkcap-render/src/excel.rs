//! Excel variance-reduction workbook renderer
//!
//! Generates a single-sheet XLSX workbook laid out in three sections:
//! - Input Parameters: baseline literals plus μ, λ and ρ as formulas
//! - Variance Reduction Analysis: one formula-driven row per scenario
//! - Key Metrics: before/after comparison against the reference scenario
//!
//! ## Live Formulas
//!
//! Every derived cell references the Input Parameters block, so editing
//! Initial Clients, σ or TPT in the spreadsheet recalculates the whole model.
//! Formulas carry the computed value as their cached result where it is
//! defined, so viewers that do not recalculate still show numbers.
//!
//! ## Example Output Structure
//!
//! ```text
//! | Parameter            | Value | Unit         | Notes                   |
//! |----------------------|-------|--------------|-------------------------|
//! | Initial Clients      | 15.00 | clients      | Baseline capacity       |
//! | Service Rate (μ)     | =1/B8 | clients/hour | 1/TPT                   |
//!
//! | Variance Reduction % | Variance (σ)          | ... | Capacity (Clients)  | ROI Multiplier |
//! |----------------------|-----------------------|-----|---------------------|----------------|
//! | 70%                  | =$B$6*(1-A24/100)     | ... | =15+0.00306*(A24)^2 | =E24/$B$5      |
//! ```
//!
//! The TPT (W) column uses the P-K formula exactly as the model defines it:
//! ```text
//! =$B$9+($B$10*(C17+1/$B$9^2))/(2*(1-$B$11))
//! ```

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::debug;

use pkcap_core::{CapacityAnalysis, CapacityCurve, Metric, RenderError, Renderer};

use crate::NOT_AVAILABLE;

const TITLE: &str = "Variance Reduction Analysis - P-K Formula Model";
const PK_CAPTION: &str = "P-K Formula: W = (1/μ) + (λ(σ² + 1/μ²)) / (2(1-ρ))";
const NUMBER_FORMAT: &str = "0.00";
const PERCENT_FORMAT: &str = "0\"%\"";
const FRACTIONAL_PERCENT_FORMAT: &str = "0.0#\"%\"";
/// 0-based row of the "Input Parameters" title
const PARAMETERS_START: u32 = 2;
const PARAMETER_COUNT: u32 = 7;
const COLUMN_WIDTHS: [f64; 6] = [25.0, 15.0, 15.0, 15.0, 18.0, 15.0];

/// Excel workbook renderer
#[derive(Clone, Debug)]
pub struct ExcelRenderer {
    /// Worksheet name
    pub sheet_name: String,
    /// Whether to write formulas (vs static values)
    pub use_formulas: bool,
    /// Whether to append a Warnings section when the analysis has warnings
    pub include_warnings: bool,
}

impl Default for ExcelRenderer {
    fn default() -> Self {
        Self {
            sheet_name: "Variance Reduction Analysis".into(),
            use_formulas: true,
            include_warnings: true,
        }
    }
}

/// 1-based spreadsheet rows of the Input Parameters block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParameterCells {
    pub clients: u32,
    pub sigma: u32,
    pub sigma2: u32,
    pub tpt: u32,
    pub mu: u32,
    pub lambda: u32,
    pub rho: u32,
}

impl ParameterCells {
    /// Consecutive rows starting at `first_row` (1-based)
    pub fn starting_at(first_row: u32) -> Self {
        Self {
            clients: first_row,
            sigma: first_row + 1,
            sigma2: first_row + 2,
            tpt: first_row + 3,
            mu: first_row + 4,
            lambda: first_row + 5,
            rho: first_row + 6,
        }
    }
}

/// Row positions of every workbook section for a given sweep size.
///
/// `*_start` fields are 0-based writer rows. `first_scenario_row`,
/// `first_metric_row` and [`ParameterCells`] are 1-based, as they appear in
/// cell formulas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SheetLayout {
    pub parameters_start: u32,
    pub parameters: ParameterCells,
    pub caption_row: u32,
    pub scenarios_start: u32,
    pub first_scenario_row: u32,
    pub summary_start: u32,
    pub first_metric_row: u32,
    pub warnings_start: u32,
}

impl SheetLayout {
    pub fn new(scenario_count: usize) -> Self {
        let parameters_start = PARAMETERS_START;
        // Title, header, then the parameter rows
        let parameters = ParameterCells::starting_at(parameters_start + 3);
        let caption_row = parameters_start + 2 + PARAMETER_COUNT + 1;

        let scenarios_start = caption_row + 2;
        let first_scenario_row = scenarios_start + 3;
        let summary_start = scenarios_start + 2 + scenario_count as u32 + 1;
        let first_metric_row = summary_start + 3;
        let warnings_start = summary_start + 2 + Metric::ALL.len() as u32 + 1;

        Self {
            parameters_start,
            parameters,
            caption_row,
            scenarios_start,
            first_scenario_row,
            summary_start,
            first_metric_row,
            warnings_start,
        }
    }

    /// 1-based row of the scenario at `index` in the sweep
    pub fn scenario_row(&self, index: usize) -> u32 {
        self.first_scenario_row + index as u32
    }
}

impl ExcelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set worksheet name
    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    /// Use static values instead of formulas
    pub fn static_values(mut self) -> Self {
        self.use_formulas = false;
        self
    }

    /// Omit the Warnings section
    pub fn no_warnings(mut self) -> Self {
        self.include_warnings = false;
        self
    }

    /// Render and write the workbook to `path`
    pub fn save(&self, analysis: &CapacityAnalysis, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let bytes = self.render(analysis)?;
        std::fs::write(path.as_ref(), bytes)?;
        debug!(path = %path.as_ref().display(), "workbook saved");
        Ok(())
    }

    /// Generate Excel workbook bytes
    pub fn render_to_bytes(&self, analysis: &CapacityAnalysis) -> Result<Vec<u8>, RenderError> {
        let reference_index = analysis.reference_index().ok_or_else(|| {
            RenderError::InvalidData(format!(
                "reference scenario {}% is not in the scenario table",
                analysis.summary.reference_vr
            ))
        })?;

        let layout = SheetLayout::new(analysis.scenarios.len());
        let cells = layout.parameters;
        let mut workbook = Workbook::new();
        let formats = Self::create_formats(percent_format(analysis));

        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name).map_err(xlsx_error)?;

        sheet
            .merge_range(0, 0, 0, 5, TITLE, &formats.title)
            .map_err(xlsx_error)?;

        self.write_parameters(sheet, analysis, &cells, &formats, layout.parameters_start)?;

        sheet
            .merge_range(layout.caption_row, 0, layout.caption_row, 5, PK_CAPTION, &formats.caption)
            .map_err(xlsx_error)?;

        self.write_scenarios(sheet, analysis, &cells, &formats, layout.scenarios_start)?;

        let reference_row = layout.scenario_row(reference_index);
        self.write_summary(sheet, analysis, &cells, reference_row, &formats, layout.summary_start)?;

        if self.include_warnings && analysis.has_warnings() {
            self.write_warnings(sheet, analysis, &formats, layout.warnings_start)?;
        }

        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            sheet.set_column_width(col as u16, *width).ok();
        }

        debug!(
            scenarios = analysis.scenarios.len(),
            formulas = self.use_formulas,
            "rendered workbook"
        );

        workbook
            .save_to_buffer()
            .map_err(|e| RenderError::Format(format!("Failed to create Excel: {e}")))
    }

    /// Create reusable formats
    fn create_formats(percent_format: &str) -> ExcelFormats {
        let title = Format::new().set_bold().set_font_size(14);

        let header = Format::new()
            .set_bold()
            .set_font_color(0xFFFFFF)
            .set_font_size(11)
            .set_background_color(0x366092)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin);

        let text = Format::new().set_border(FormatBorder::Thin);

        let number = Format::new()
            .set_num_format(NUMBER_FORMAT)
            .set_border(FormatBorder::Thin);

        let percent = Format::new()
            .set_num_format(percent_format)
            .set_border(FormatBorder::Thin);

        let caption = Format::new().set_italic();

        let warning = Format::new().set_font_color(0xC00000);

        ExcelFormats {
            title,
            header,
            text,
            number,
            percent,
            caption,
            warning,
        }
    }

    fn write_headers(
        sheet: &mut Worksheet,
        row: u32,
        headers: &[&str],
        formats: &ExcelFormats,
    ) -> Result<(), RenderError> {
        for (col, header) in headers.iter().enumerate() {
            sheet
                .write_with_format(row, col as u16, *header, &formats.header)
                .map_err(xlsx_error)?;
        }
        Ok(())
    }

    /// Write a derived cell: a formula (with cached result) or a static value.
    ///
    /// Undefined values are written as "N/A" in static mode.
    fn write_derived(
        &self,
        sheet: &mut Worksheet,
        row: u32,
        col: u16,
        formula: &str,
        value: Option<f64>,
        format: &Format,
    ) -> Result<(), RenderError> {
        if self.use_formulas {
            let mut formula = Formula::new(formula);
            if let Some(v) = value {
                formula = formula.set_result(v.to_string());
            }
            sheet
                .write_formula_with_format(row, col, formula, format)
                .map_err(xlsx_error)?;
        } else if let Some(v) = value {
            sheet
                .write_number_with_format(row, col, v, format)
                .map_err(xlsx_error)?;
        } else {
            sheet
                .write_string_with_format(row, col, NOT_AVAILABLE, format)
                .map_err(xlsx_error)?;
        }
        Ok(())
    }

    /// Input Parameters section
    fn write_parameters(
        &self,
        sheet: &mut Worksheet,
        analysis: &CapacityAnalysis,
        cells: &ParameterCells,
        formats: &ExcelFormats,
        start_row: u32,
    ) -> Result<(), RenderError> {
        let baseline = &analysis.baseline;

        sheet
            .write_with_format(start_row, 0, "Input Parameters", &formats.title)
            .map_err(xlsx_error)?;
        Self::write_headers(sheet, start_row + 1, &["Parameter", "Value", "Unit", "Notes"], formats)?;

        let first = start_row + 2;

        let arrival_note = format!("{} clients / {}h", baseline.clients(), baseline.tpt());
        let literals = [
            ("Initial Clients", baseline.clients(), "clients", "Baseline capacity"),
            ("Initial Variance (σ)", baseline.sigma(), "hours", "Standard deviation of service time"),
            ("Initial Variance² (σ²)", baseline.sigma2(), "hours²", "Variance of service time"),
            ("Initial TPT", baseline.tpt(), "hours", "Average time per task"),
        ];
        let derived = [
            ("Service Rate (μ)", format!("=1/B{}", cells.tpt), baseline.mu(), "clients/hour", "1/TPT"),
            (
                "Arrival Rate (λ)",
                format!("=B{}/B{}", cells.clients, cells.tpt),
                baseline.lambda(),
                "clients/hour",
                arrival_note.as_str(),
            ),
            (
                "Initial Utilization (ρ)",
                format!("=B{}/B{}", cells.lambda, cells.mu),
                baseline.rho(),
                "ratio",
                "λ/μ",
            ),
        ];

        let mut row = first;
        for (label, value, unit, note) in literals {
            sheet.write_with_format(row, 0, label, &formats.text).map_err(xlsx_error)?;
            sheet.write_with_format(row, 1, value, &formats.number).map_err(xlsx_error)?;
            sheet.write_with_format(row, 2, unit, &formats.text).map_err(xlsx_error)?;
            sheet.write_with_format(row, 3, note, &formats.text).map_err(xlsx_error)?;
            row += 1;
        }
        for (label, formula, value, unit, note) in &derived {
            sheet.write_with_format(row, 0, *label, &formats.text).map_err(xlsx_error)?;
            self.write_derived(sheet, row, 1, formula, Some(*value), &formats.number)?;
            sheet.write_with_format(row, 2, *unit, &formats.text).map_err(xlsx_error)?;
            sheet.write_with_format(row, 3, *note, &formats.text).map_err(xlsx_error)?;
            row += 1;
        }

        Ok(())
    }

    /// Variance Reduction Analysis table
    fn write_scenarios(
        &self,
        sheet: &mut Worksheet,
        analysis: &CapacityAnalysis,
        cells: &ParameterCells,
        formats: &ExcelFormats,
        start_row: u32,
    ) -> Result<(), RenderError> {
        sheet
            .write_with_format(start_row, 0, "Variance Reduction Analysis", &formats.title)
            .map_err(xlsx_error)?;
        Self::write_headers(
            sheet,
            start_row + 1,
            &[
                "Variance Reduction %",
                "Variance (σ)",
                "Variance² (σ²)",
                "TPT (W)",
                "Capacity (Clients)",
                "ROI Multiplier",
            ],
            formats,
        )?;

        let mut row = start_row + 2;
        for scenario in &analysis.scenarios {
            let r = row + 1;
            sheet
                .write_with_format(row, 0, scenario.vr, &formats.percent)
                .map_err(xlsx_error)?;
            self.write_derived(sheet, row, 1, &sigma_formula(r, cells), Some(scenario.sigma_reduced), &formats.number)?;
            self.write_derived(sheet, row, 2, &format!("=B{r}^2"), Some(scenario.sigma2_reduced), &formats.number)?;
            self.write_derived(sheet, row, 3, &wait_time_formula(r, cells), scenario.wait_time, &formats.number)?;
            self.write_derived(
                sheet,
                row,
                4,
                &capacity_formula(r, &analysis.curve),
                Some(scenario.capacity),
                &formats.number,
            )?;
            self.write_derived(
                sheet,
                row,
                5,
                &format!("=E{r}/$B${}", cells.clients),
                Some(scenario.roi_multiplier),
                &formats.number,
            )?;
            row += 1;
        }

        Ok(())
    }

    /// Key Metrics section
    fn write_summary(
        &self,
        sheet: &mut Worksheet,
        analysis: &CapacityAnalysis,
        cells: &ParameterCells,
        reference_row: u32,
        formats: &ExcelFormats,
        start_row: u32,
    ) -> Result<(), RenderError> {
        let title = format!(
            "Key Metrics at {}% Variance Reduction",
            analysis.summary.reference_vr
        );
        sheet
            .merge_range(start_row, 0, start_row, 4, &title, &formats.title)
            .map_err(xlsx_error)?;
        Self::write_headers(
            sheet,
            start_row + 1,
            &["Metric", "Before", "After", "Change", "Change %"],
            formats,
        )?;

        let mut row = start_row + 2;
        for delta in &analysis.summary.metrics {
            let r = row + 1;
            let (before, after) = summary_sources(delta.metric, cells, reference_row);

            sheet
                .write_with_format(row, 0, delta.metric.label(), &formats.text)
                .map_err(xlsx_error)?;
            self.write_derived(sheet, row, 1, &before, Some(delta.before), &formats.number)?;
            self.write_derived(sheet, row, 2, &after, delta.after, &formats.number)?;
            self.write_derived(sheet, row, 3, &format!("=C{r}-B{r}"), delta.delta, &formats.number)?;
            self.write_derived(
                sheet,
                row,
                4,
                &format!("=IFERROR((C{r}-B{r})/B{r}*100,\"{NOT_AVAILABLE}\")"),
                delta.delta_pct,
                &formats.number,
            )?;
            row += 1;
        }

        Ok(())
    }

    fn write_warnings(
        &self,
        sheet: &mut Worksheet,
        analysis: &CapacityAnalysis,
        formats: &ExcelFormats,
        start_row: u32,
    ) -> Result<(), RenderError> {
        sheet
            .write_with_format(start_row, 0, "Warnings", &formats.title)
            .map_err(xlsx_error)?;
        for (i, warning) in analysis.warnings.iter().enumerate() {
            sheet
                .write_with_format(start_row + 1 + i as u32, 0, &warning.to_string(), &formats.warning)
                .map_err(xlsx_error)?;
        }
        Ok(())
    }
}

/// `σ(vr) = σ0 * (1 - vr/100)`
pub fn sigma_formula(row: u32, cells: &ParameterCells) -> String {
    format!("=$B${}*(1-A{row}/100)", cells.sigma)
}

/// `W = μ + (λ(σ² + 1/μ²)) / (2(1-ρ))`
pub fn wait_time_formula(row: u32, cells: &ParameterCells) -> String {
    format!(
        "=$B${mu}+($B${lambda}*(C{row}+1/$B${mu}^2))/(2*(1-$B${rho}))",
        mu = cells.mu,
        lambda = cells.lambda,
        rho = cells.rho,
    )
}

/// `capacity(vr) = intercept + coefficient * vr²`
pub fn capacity_formula(row: u32, curve: &CapacityCurve) -> String {
    format!("={}+{}*(A{row})^2", curve.intercept, curve.coefficient)
}

/// Number format for the percentage column; keeps decimals only when the sweep needs them
fn percent_format(analysis: &CapacityAnalysis) -> &'static str {
    if analysis.scenarios.iter().all(|s| s.vr.fract() == 0.0) {
        PERCENT_FORMAT
    } else {
        FRACTIONAL_PERCENT_FORMAT
    }
}

/// Before/after formulas of a summary row
fn summary_sources(metric: Metric, cells: &ParameterCells, reference_row: u32) -> (String, String) {
    match metric {
        Metric::Sigma => (format!("=$B${}", cells.sigma), format!("=B{reference_row}")),
        Metric::Sigma2 => (format!("=$B${}", cells.sigma2), format!("=C{reference_row}")),
        Metric::WaitTime => (format!("=$B${}", cells.tpt), format!("=D{reference_row}")),
        Metric::Capacity => (format!("=$B${}", cells.clients), format!("=E{reference_row}")),
        Metric::RoiMultiplier => ("=1".to_string(), format!("=F{reference_row}")),
    }
}

fn xlsx_error(e: XlsxError) -> RenderError {
    RenderError::Format(e.to_string())
}

/// Reusable Excel formats
struct ExcelFormats {
    title: Format,
    header: Format,
    text: Format,
    number: Format,
    percent: Format,
    caption: Format,
    warning: Format,
}

impl Renderer for ExcelRenderer {
    type Output = Vec<u8>;

    fn render(&self, analysis: &CapacityAnalysis) -> Result<Vec<u8>, RenderError> {
        if analysis.scenarios.is_empty() {
            return Err(RenderError::InvalidData("No scenarios to render".into()));
        }
        self.render_to_bytes(analysis)
    }
}
