//! Parser for the encoder's live textual telemetry.
//!
//! ffmpeg interleaves progress lines with large volumes of diagnostic text on
//! stderr. This module classifies one line at a time: a duration announcement
//! (`Duration: H:MM:SS.cc`) fixes the total once, a line carrying `speed=` is
//! scraped for its `time=`/`bitrate=`/`speed=`/`size=` fields, and everything
//! else is ignored. Missing or garbled fields default to zero; the parser can
//! never fail a conversion, only yield a stale or zero snapshot.

/// Parsed progress state at one point of a conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Total media duration in seconds (0.0 until announced).
    pub total_secs: f64,
    /// Encoded time so far in seconds.
    pub elapsed_secs: f64,
    /// Completion fraction in [0, 1]; 0.0 while the total is unknown.
    pub percent: f64,
    /// Instantaneous speed multiplier.
    pub speed: f64,
    /// Speed formatted for display, e.g. "2.0x".
    pub speed_str: String,
    /// Instantaneous bitrate in kbits/s.
    pub bitrate_kbps: f64,
    /// Bitrate formatted for display, e.g. "512.0kbps" or "1.5mbps".
    pub bitrate_str: String,
    /// Output written so far in kB.
    pub size_kb: u64,
    /// Output size formatted for display, e.g. "512kB" or "2.00MB".
    pub human_size: String,
}

/// Classification of one telemetry line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// The total media duration was announced (first occurrence only).
    DurationAnnounced(f64),
    /// A progress line produced a fresh snapshot.
    Progress(ProgressSnapshot),
    /// Diagnostic noise.
    Ignored,
}

/// Stateful line classifier for one conversion.
///
/// Persistent state is the announced total duration (set once) and the latest
/// snapshot.
#[derive(Debug, Default)]
pub struct TelemetryParser {
    total_secs: Option<f64>,
    latest: ProgressSnapshot,
}

impl TelemetryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// The announced total duration, if any line carried one yet.
    pub fn total_secs(&self) -> Option<f64> {
        self.total_secs
    }

    /// The most recent snapshot (zeroed until the first progress line).
    pub fn latest(&self) -> &ProgressSnapshot {
        &self.latest
    }

    /// Classifies one line, updating parser state.
    pub fn feed_line(&mut self, line: &str) -> LineEvent {
        if self.total_secs.is_none() {
            if let Some(total) = extract_duration(line) {
                self.total_secs = Some(total);
                return LineEvent::DurationAnnounced(total);
            }
        }

        if line.contains("speed=") {
            let snapshot = self.parse_progress_line(line);
            self.latest = snapshot.clone();
            return LineEvent::Progress(snapshot);
        }

        LineEvent::Ignored
    }

    fn parse_progress_line(&self, line: &str) -> ProgressSnapshot {
        let elapsed_secs = field_after(line, "time=")
            .map(timestamp_to_secs)
            .unwrap_or(0.0);

        let bitrate_kbps = field_after(line, "bitrate=")
            .and_then(|v| v.strip_suffix("kbits/s"))
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);

        let speed = field_after(line, "speed=")
            .and_then(|v| v.strip_suffix('x'))
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_kb = field_after(line, "size=")
            .and_then(|v| v.strip_suffix("kB"))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        let total_secs = self.total_secs.unwrap_or(0.0);
        let percent = if total_secs > 0.0 {
            elapsed_secs / total_secs
        } else {
            0.0
        };

        ProgressSnapshot {
            total_secs,
            elapsed_secs,
            percent,
            speed,
            speed_str: format!("{:.1}x", speed),
            bitrate_kbps,
            bitrate_str: format_bitrate(bitrate_kbps),
            size_kb,
            human_size: format_size(size_kb),
        }
    }
}

/// Converts an `H:MM:SS.cc` timestamp to seconds.
///
/// Malformed components count as zero rather than erroring.
pub fn timestamp_to_secs(timestamp: &str) -> f64 {
    timestamp.split(':').rev().enumerate().fold(0.0, |acc, (i, part)| {
        acc + part.parse::<f64>().unwrap_or(0.0) * 60f64.powi(i as i32)
    })
}

/// Extracts the total duration from a `Duration: H:MM:SS.cc` announcement.
///
/// Lines without a well-formed three-component timestamp do not match.
fn extract_duration(line: &str) -> Option<f64> {
    let start = line.find("Duration: ")? + "Duration: ".len();
    let token: String = line[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ':' || *c == '.')
        .collect();

    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || p.parse::<f64>().is_err()) {
        return None;
    }

    Some(timestamp_to_secs(&token))
}

/// Extracts the whitespace-delimited value following `key` in `line`.
///
/// ffmpeg pads some fields with spaces after the `=`, so leading whitespace is
/// skipped before the value is taken.
fn field_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest
        .find(char::is_whitespace)
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

fn format_bitrate(kbps: f64) -> String {
    if kbps > 1024.0 {
        format!("{:.1}mbps", kbps / 1024.0)
    } else {
        format!("{:.1}kbps", kbps)
    }
}

fn format_size(size_kb: u64) -> String {
    if size_kb > 1024 {
        format!("{:.2}MB", size_kb as f64 / 1024.0)
    } else {
        format!("{}kB", size_kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_duration_then_progress_line() {
        let mut parser = TelemetryParser::new();

        let event = parser.feed_line("  Duration: 00:01:40.00, start: 0.000000, bitrate: 1000 kb/s");
        assert_eq!(event, LineEvent::DurationAnnounced(100.0));

        let event = parser.feed_line(
            "frame= 1200 fps= 48 q=28.0 size=    2048kB time=00:00:50.00 bitrate= 512.0kbits/s speed=2.0x",
        );
        let snapshot = match event {
            LineEvent::Progress(s) => s,
            other => panic!("expected progress event, got {:?}", other),
        };

        assert!((snapshot.percent - 0.5).abs() < 1e-9);
        assert_eq!(snapshot.bitrate_str, "512.0kbps");
        assert_eq!(snapshot.speed_str, "2.0x");
        assert_eq!(snapshot.human_size, "2.00MB");
        assert!((snapshot.elapsed_secs - 50.0).abs() < 1e-9);
        assert_eq!(snapshot.size_kb, 2048);
    }

    #[test]
    fn test_only_first_duration_is_authoritative() {
        let mut parser = TelemetryParser::new();

        assert_eq!(
            parser.feed_line("Duration: 00:01:40.00"),
            LineEvent::DurationAnnounced(100.0)
        );
        // Attachments and secondary inputs re-announce durations; ignore them.
        assert_eq!(parser.feed_line("Duration: 02:00:00.00"), LineEvent::Ignored);
        assert_eq!(parser.total_secs(), Some(100.0));
    }

    #[test]
    fn test_progress_without_duration_has_zero_percent() {
        let mut parser = TelemetryParser::new();
        let event = parser.feed_line("size= 100kB time=00:00:10.00 bitrate=80.0kbits/s speed=1.0x");
        match event {
            LineEvent::Progress(s) => {
                assert_eq!(s.percent, 0.0);
                assert_eq!(s.total_secs, 0.0);
                assert!((s.elapsed_secs - 10.0).abs() < 1e-9);
            }
            other => panic!("expected progress event, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let mut parser = TelemetryParser::new();
        let event = parser.feed_line("frame=  1 speed=1.5x");
        match event {
            LineEvent::Progress(s) => {
                assert_eq!(s.elapsed_secs, 0.0);
                assert_eq!(s.bitrate_kbps, 0.0);
                assert_eq!(s.bitrate_str, "0.0kbps");
                assert_eq!(s.size_kb, 0);
                assert_eq!(s.human_size, "0kB");
                assert!((s.speed - 1.5).abs() < 1e-9);
            }
            other => panic!("expected progress event, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_time_yields_zero() {
        let mut parser = TelemetryParser::new();
        parser.feed_line("Duration: 00:01:40.00");
        let event = parser.feed_line("time=garbage bitrate=N/A speed=0.9x size=N/A");
        match event {
            LineEvent::Progress(s) => {
                assert_eq!(s.elapsed_secs, 0.0);
                assert_eq!(s.percent, 0.0);
                assert_eq!(s.bitrate_kbps, 0.0);
                assert_eq!(s.size_kb, 0);
            }
            other => panic!("expected progress event, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_lines_are_ignored() {
        let mut parser = TelemetryParser::new();
        assert_eq!(
            parser.feed_line("Stream #0:0: Video: mpeg4 (Simple Profile)"),
            LineEvent::Ignored
        );
        assert_eq!(parser.feed_line(""), LineEvent::Ignored);
        assert_eq!(parser.feed_line("Press [q] to stop"), LineEvent::Ignored);
        assert_eq!(parser.latest(), &ProgressSnapshot::default());
    }

    #[test]
    fn test_garbled_duration_does_not_match() {
        let mut parser = TelemetryParser::new();
        assert_eq!(parser.feed_line("Duration: N/A"), LineEvent::Ignored);
        assert_eq!(parser.feed_line("Duration: 00:01"), LineEvent::Ignored);
        assert_eq!(parser.total_secs(), None);

        // A later well-formed announcement still lands.
        assert_eq!(
            parser.feed_line("Duration: 00:00:10.00"),
            LineEvent::DurationAnnounced(10.0)
        );
    }

    #[test]
    fn test_latest_snapshot_is_retained() {
        let mut parser = TelemetryParser::new();
        parser.feed_line("Duration: 00:01:40.00");
        parser.feed_line("size= 100kB time=00:00:25.00 bitrate=80.0kbits/s speed=1.0x");
        parser.feed_line("configuration: --enable-gpl");

        assert!((parser.latest().percent - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_timestamp_to_secs() {
        assert!((timestamp_to_secs("00:01:40.00") - 100.0).abs() < 1e-9);
        assert!((timestamp_to_secs("01:00:00.00") - 3600.0).abs() < 1e-9);
        assert!((timestamp_to_secs("00:00:00.50") - 0.5).abs() < 1e-9);
        assert_eq!(timestamp_to_secs("bogus"), 0.0);
        assert_eq!(timestamp_to_secs(""), 0.0);
    }

    #[test]
    fn test_format_boundaries() {
        assert_eq!(format_size(1024), "1024kB");
        assert_eq!(format_size(1025), "1.00MB");
        assert_eq!(format_bitrate(1024.0), "1024.0kbps");
        assert_eq!(format_bitrate(2048.0), "2.0mbps");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // The parser must survive arbitrary garbage without panicking and
        // without ever producing a negative or non-finite percent.
        #[test]
        fn prop_parser_never_panics(lines in prop::collection::vec(".*", 0..20)) {
            let mut parser = TelemetryParser::new();
            for line in &lines {
                let _ = parser.feed_line(line);
                let latest = parser.latest();
                prop_assert!(latest.percent.is_finite());
                prop_assert!(latest.percent >= 0.0);
            }
        }

        // The first well-formed duration wins regardless of what follows.
        #[test]
        fn prop_first_duration_wins(
            h in 0u32..3, m in 0u32..60, s in 0u32..60,
            h2 in 0u32..3, m2 in 0u32..60, s2 in 0u32..60,
        ) {
            let mut parser = TelemetryParser::new();
            let first = format!("Duration: {:02}:{:02}:{:02}.00", h, m, s);
            let second = format!("Duration: {:02}:{:02}:{:02}.00", h2, m2, s2);
            parser.feed_line(&first);
            parser.feed_line(&second);

            let expected = f64::from(h * 3600 + m * 60 + s);
            prop_assert_eq!(parser.total_secs(), Some(expected));
        }
    }
}
