//! WebVTT subtitle output for transcripts.

use recap_models::TranscriptSegment;

/// Format seconds as `HH:MM:SS.mmm`.
///
/// Non-finite or negative inputs are replaced by 0. Milliseconds are
/// computed by truncation, never rounding, and clamped to 999 so a value
/// like 1.9999 cannot carry into the next second.
pub fn format_vtt_time(seconds: f64) -> String {
    let seconds = if !seconds.is_finite() || seconds < 0.0 {
        0.0
    } else {
        seconds
    };

    let whole = seconds.trunc();
    let millis = (((seconds - whole) * 1000.0).trunc() as u64).min(999);
    let whole = whole as u64;

    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;

    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

/// Render the WebVTT document for a transcript's segments.
pub fn build_vtt(segments: &[TranscriptSegment]) -> String {
    let mut vtt = String::from("WEBVTT\n\n");
    for segment in segments {
        vtt.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_time(segment.start_s),
            format_vtt_time(segment.end_s),
            segment.text.trim()
        ));
    }
    vtt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_formatting() {
        assert_eq!(format_vtt_time(0.0), "00:00:00.000");
        assert_eq!(format_vtt_time(61.5), "00:01:01.500");
        assert_eq!(format_vtt_time(3661.25), "01:01:01.250");
    }

    #[test]
    fn test_truncation_not_rounding() {
        assert_eq!(format_vtt_time(1.9999), "00:00:01.999");
        assert_eq!(format_vtt_time(0.0009), "00:00:00.000");
    }

    #[test]
    fn test_degenerate_inputs_become_zero() {
        assert_eq!(format_vtt_time(-5.0), "00:00:00.000");
        assert_eq!(format_vtt_time(f64::NAN), "00:00:00.000");
        assert_eq!(format_vtt_time(f64::INFINITY), "00:00:00.000");
    }

    #[test]
    fn test_vtt_document() {
        let segments = vec![
            TranscriptSegment {
                start_s: 0.0,
                end_s: 1.0,
                text: "hello world".to_string(),
            },
            TranscriptSegment {
                start_s: 1.0,
                end_s: 2.5,
                text: "second line".to_string(),
            },
        ];
        let vtt = build_vtt(&segments);
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:01.000\nhello world\n"));
        assert!(vtt.contains("00:00:01.000 --> 00:00:02.500\nsecond line\n"));
    }
}
