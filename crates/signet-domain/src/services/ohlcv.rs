use crate::value_objects::bar::Bar;

/// Accounting for everything a data boundary had to drop or flag. Rows that
/// fail the timestamp parse are counted here instead of flowing downstream.
#[derive(Debug, Default, Clone)]
pub struct DataQualityReport {
    pub duplicates: usize,
    pub gaps: usize,
    pub out_of_order: usize,
    pub invalid_close: usize,
    /// Rows dropped because their timestamp did not parse.
    pub dropped_timestamps: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

impl DataQualityReport {
    pub fn has_issues(&self) -> bool {
        self.duplicates > 0
            || self.gaps > 0
            || self.out_of_order > 0
            || self.invalid_close > 0
            || self.dropped_timestamps > 0
    }
}

pub fn data_quality_from_bars(
    bars: &[Bar],
    expected_step_seconds: Option<i64>,
) -> DataQualityReport {
    let mut report = DataQualityReport::default();
    if bars.is_empty() {
        return report;
    }

    let step = expected_step_seconds.unwrap_or(1).max(1);
    report.first_timestamp = Some(bars[0].timestamp);
    report.last_timestamp = Some(bars[bars.len() - 1].timestamp);

    let mut last_ts: Option<i64> = None;
    for bar in bars {
        if !bar.close.is_finite() || bar.close <= 0.0 {
            report.invalid_close += 1;
        }

        if let Some(prev) = last_ts {
            if bar.timestamp == prev {
                report.duplicates += 1;
            } else if bar.timestamp < prev {
                report.out_of_order += 1;
            } else if bar.timestamp - prev > step {
                report.gaps += 1;
            }
        }
        last_ts = Some(bar.timestamp);
    }

    report
}
