//! Rendering of stress reports as batch TSV rows and as a readable block.

use std::fmt::Write as _;
use std::io::Write;

use super::climate::StressReport;
use super::drought::DroughtStress;
use super::readings::BeforeAfter;
use super::thermal_time::WeeklyClimate;
use crate::errors::ClimateError;

/// Placeholder for columns that do not apply to a report's drought shape.
const NOT_APPLICABLE: &str = "NA";

/// Column names of the batch output, in order.
pub const TSV_HEADER: [&str; 13] = [
    "culture-id",
    "drought-before",
    "drought-after",
    "control-drought-before",
    "control-drought-after",
    "stress-drought-before",
    "stress-drought-after",
    "cold-before",
    "cold-after",
    "heat-before",
    "heat-after",
    "light-before",
    "light-after",
];

fn counts(days: BeforeAfter<u32>) -> [String; 2] {
    [days.before.to_string(), days.after.to_string()]
}

/// `3.0`, not `3`.
fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

fn not_applicable() -> [String; 2] {
    [NOT_APPLICABLE.to_string(), NOT_APPLICABLE.to_string()]
}

/// One output row, matching [`TSV_HEADER`].
pub fn tsv_row(report: &StressReport) -> Vec<String> {
    let (combined, control, stress) = match report.drought_stress {
        DroughtStress::Combined { days } => (counts(days), not_applicable(), not_applicable()),
        DroughtStress::PerTreatment { control, stress } => {
            (not_applicable(), counts(control), counts(stress))
        }
    };
    let (cold_before, cold_after, heat_before, heat_after) = report.temperature_stress.as_tuple();

    let mut row = Vec::with_capacity(TSV_HEADER.len());
    row.push(report.culture_id.to_string());
    row.extend(combined);
    row.extend(control);
    row.extend(stress);
    row.extend(
        [
            cold_before,
            cold_after,
            heat_before,
            heat_after,
            report.light_intensity.before,
            report.light_intensity.after,
        ]
        .iter()
        .map(|value| format_float(*value)),
    );
    row
}

/// Write the header and one row per report as tab-separated values.
pub fn write_tsv<W: Write>(output: W, reports: &[StressReport]) -> Result<(), ClimateError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(output);

    writer.write_record(TSV_HEADER)?;
    for report in reports {
        writer.write_record(tsv_row(report))?;
    }
    writer.flush()?;
    Ok(())
}

/// Column names of the weekly climate output.
pub const WEEKLY_TSV_HEADER: [&str; 3] = ["week", "midday-vpd", "heat-sum"];

pub fn weekly_tsv_row(week: &WeeklyClimate) -> [String; 3] {
    [
        week.week.to_string(),
        format_float(week.midday_vpd),
        format_float(week.heat_sum),
    ]
}

/// Write the weekly thermal time and midday VPD summary as tab-separated values.
pub fn write_weekly_tsv<W: Write>(output: W, weeks: &[WeeklyClimate]) -> Result<(), ClimateError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(output);

    writer.write_record(WEEKLY_TSV_HEADER)?;
    for week in weeks {
        writer.write_record(weekly_tsv_row(week))?;
    }
    writer.flush()?;
    Ok(())
}

/// Human-readable summary of a single report.
pub fn render_text(report: &StressReport) -> String {
    let mut out = String::new();
    let t = &report.temperature_stress;

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Culture {}", report.culture_id);
    let _ = writeln!(
        out,
        "  irrigation:        {}",
        if report.has_irrigation { "yes" } else { "no" }
    );
    let _ = writeln!(out, "                     before flowering  after flowering");
    let _ = writeln!(out, "  cold stress:       {:>16.2}  {:>15.2}", t.cold.before, t.cold.after);
    let _ = writeln!(out, "  heat stress:       {:>16.2}  {:>15.2}", t.heat.before, t.heat.after);
    match report.drought_stress {
        DroughtStress::Combined { days } => {
            let _ = writeln!(out, "  drought days:      {:>16}  {:>15}", days.before, days.after);
        }
        DroughtStress::PerTreatment { control, stress } => {
            let _ = writeln!(
                out,
                "  drought (control): {:>16}  {:>15}",
                control.before, control.after
            );
            let _ = writeln!(
                out,
                "  drought (stress):  {:>16}  {:>15}",
                stress.before, stress.after
            );
        }
    }
    let _ = writeln!(
        out,
        "  light intensity:   {:>16.2}  {:>15.2}",
        report.light_intensity.before, report.light_intensity.after
    );
    out
}
