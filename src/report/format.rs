//! Run summaries as plain text.
//!
//! Formatting lives here so the fitting code only returns counts.

use crate::domain::{FitCounts, OneFitCounts};

/// Share of non-converged, single-component, masked and hot pixels.
pub fn format_two_component_summary(counts: &FitCounts) -> String {
    let total = counts.total();
    let mut out = String::new();
    out.push_str(&format!(
        "Two-component fit did not converge for {:.2}% of the pixels\n",
        percent(counts.bad, total)
    ));
    out.push_str(&format!(
        "A single component was fit for {:.2}% of the pixels\n",
        percent(counts.single, total)
    ));
    out.push_str(&format!(
        "Masked pixels below intensity threshold: {:.2}%\n",
        percent(counts.masked, total)
    ));
    out.push_str(&format!("Hot pixels: {:.2}%", percent(counts.hot, total)));
    out
}

pub fn format_one_component_summary(counts: &OneFitCounts) -> String {
    let total = counts.total();
    format!(
        "One-component fit did not converge for {:.2}% of the pixels\n\
         Masked pixels below intensity threshold: {:.2}%",
        percent(counts.bad, total),
        percent(counts.masked, total)
    )
}

fn percent(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * n as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_component_percentages() {
        let counts = FitCounts {
            masked: 2,
            bad: 1,
            single: 3,
            double: 1,
            hot: 1,
        };
        let text = format_two_component_summary(&counts);
        assert!(text.contains("did not converge for 12.50%"));
        assert!(text.contains("single component was fit for 37.50%"));
        assert!(text.contains("threshold: 25.00%"));
        assert!(text.ends_with("Hot pixels: 12.50%"));
    }

    #[test]
    fn empty_grid_reports_zero() {
        let text = format_one_component_summary(&OneFitCounts::default());
        assert_eq!(
            text,
            "One-component fit did not converge for 0.00% of the pixels\n\
             Masked pixels below intensity threshold: 0.00%"
        );
    }
}
