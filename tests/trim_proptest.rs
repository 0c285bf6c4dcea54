// Property-based tests for trim parsing and window validity

use proptest::prelude::*;
use transq::engine::core::trim::{TrimError, TrimTime, check_trim, format_trim_time, parse_trim_time};

fn fmt_hms(h: u64, m: u64, s: u64, ms: u64) -> String {
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

proptest! {
    #[test]
    fn parse_format_roundtrip(h in 0u64..=99, m in 0u64..=59, s in 0u64..=59, ms in 1u64..=999) {
        let text = fmt_hms(h, m, s, ms);
        let parsed = parse_trim_time(&text).unwrap();
        prop_assert_eq!(format_trim_time(parsed), text);
    }

    #[test]
    fn out_of_range_fields_rejected(h in 100u64..1000, m in 60u64..100, s in 60u64..100) {
        prop_assert_eq!(parse_trim_time(&format!("{}:00:00", h)), Err(TrimError::Hours(h)));
        prop_assert_eq!(parse_trim_time(&format!("00:{}:00", m)), Err(TrimError::Minutes(m)));
        prop_assert_eq!(parse_trim_time(&format!("00:00:{}", s)), Err(TrimError::Seconds(s)));
    }

    #[test]
    fn too_many_segments_rejected(n in 4usize..8) {
        let text = vec!["00"; n].join(":");
        prop_assert_eq!(parse_trim_time(&text), Err(TrimError::SegmentCount(n)));
    }

    #[test]
    fn validity_matches_definition(
        start_ms in 0u64..200_000,
        end_ms in 0u64..200_000,
        duration in proptest::option::of(1.0f64..200.0),
        enabled in any::<bool>(),
    ) {
        let start = TrimTime::from_millis(start_ms);
        let end = TrimTime::from_millis(end_ms);
        let result = check_trim(enabled, &start.to_string(), &end.to_string(), duration);

        let within = match duration {
            Some(d) => {
                let limit = TrimTime::from_secs_f64(d);
                start <= limit && end <= limit
            }
            None => true,
        };
        let expected_valid = !enabled || (within && start < end);
        prop_assert_eq!(result.is_ok(), expected_valid);
    }
}

#[test]
fn fixed_examples() {
    assert_eq!(format_trim_time(parse_trim_time("01:02:03.004").unwrap()), "01:02:03.004");
    assert!(matches!(parse_trim_time("00:00:00.1000"), Err(TrimError::Milliseconds(_))));
    assert!(matches!(parse_trim_time("aa:00:00"), Err(TrimError::NotANumber(_))));
    assert!(check_trim(true, "bogus", "00:00:05", None).is_err());
}
