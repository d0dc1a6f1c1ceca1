use chrono::{DateTime, SecondsFormat};
use owo_colors::OwoColorize;
use tracefall_core::model::span::SimplifiedSpan;

const BAR_WIDTH: usize = 30;

/// Prints one line per span with a bar placed on the batch's own timeline.
pub fn print_batch_human(batch: &[SimplifiedSpan]) {
    let Some(origin) = batch.iter().map(|s| s.start_time).min() else {
        return;
    };
    let end = batch.iter().map(|s| s.end_time).max().unwrap_or(origin);
    let total = end.saturating_sub(origin);

    for span in batch {
        println!(
            "{} {:<7} {} {:>8} {:>8} |{}| {}",
            format_start(span.start_time),
            span.request_type.bold(),
            status_label(span.status_code),
            format!("{}ms", span.duration_nanos() / 1_000_000),
            size_label(span.package_size),
            waterfall_bar(span, origin, total, BAR_WIDTH).cyan(),
            span.end_point.as_deref().unwrap_or("-"),
        );
    }
    println!("-- {} spans over {}ms --", batch.len(), total / 1_000_000);
}

pub fn waterfall_bar(span: &SimplifiedSpan, origin: u64, total: u64, width: usize) -> String {
    if total == 0 {
        return "█".repeat(width);
    }
    let scale = |nanos: u64| (u128::from(nanos) * width as u128 / u128::from(total)) as usize;

    let offset = scale(span.start_time.saturating_sub(origin)).min(width - 1);
    let len = scale(span.duration_nanos()).clamp(1, width - offset);
    format!(
        "{}{}{}",
        " ".repeat(offset),
        "█".repeat(len),
        " ".repeat(width - offset - len)
    )
}

fn format_start(nanos: u64) -> String {
    let nanos = i64::try_from(nanos).unwrap_or(i64::MAX);
    DateTime::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn status_label(code: Option<i64>) -> String {
    match code {
        Some(c @ 200..=299) => c.green().to_string(),
        Some(c @ 300..=399) => c.cyan().to_string(),
        Some(c @ 400..=499) => c.yellow().to_string(),
        Some(c) => c.red().to_string(),
        None => "---".bright_black().to_string(),
    }
}

fn size_label(size: Option<i64>) -> String {
    size.map(|s| format!("{s}B"))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: u64, end: u64) -> SimplifiedSpan {
        SimplifiedSpan {
            span_id: "s".into(),
            trace_id: "t".into(),
            start_time: start,
            end_time: end,
            package_size: None,
            status_code: Some(200),
            end_point: Some("https://api.example.com".into()),
            request_type: "GET".into(),
        }
    }

    #[test]
    fn bar_is_placed_on_batch_timeline() {
        let bar = waterfall_bar(&span(5, 7), 0, 10, 10);
        assert_eq!(bar, "     ██   ");
    }

    #[test]
    fn bar_has_fixed_width_and_minimum_length() {
        let bar = waterfall_bar(&span(9_999, 9_999), 0, 10_000, 20);
        assert_eq!(bar.chars().count(), 20);
        assert_eq!(bar.chars().filter(|c| *c == '█').count(), 1);
    }

    #[test]
    fn zero_length_batch_fills_the_bar() {
        assert_eq!(waterfall_bar(&span(3, 3), 3, 0, 4), "████");
    }

    #[test]
    fn start_time_renders_as_utc() {
        assert_eq!(format_start(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_start(5_000_000_000), "1970-01-01T00:00:05.000Z");
    }

    #[test]
    fn missing_size_renders_dash() {
        assert_eq!(size_label(None), "-");
        assert_eq!(size_label(Some(512)), "512B");
    }
}
