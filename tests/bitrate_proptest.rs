// Property-based tests for bitrate resolution

use proptest::prelude::*;
use transq::engine::core::bitrate::{RESOLUTION_TIERS, LOWEST_TIER_KBPS, compute_bitrate, resolve_bitrate};
use transq::engine::core::log::{LogLevel, MemoryLog};
use transq::engine::core::preset::{BitrateMode, Preset, TargetCodec};
use transq::engine::core::types::ProbeInfo;

fn multiplier_preset(multiplier: f64) -> Preset {
    Preset {
        name: "prop".to_string(),
        bitrate_mode: BitrateMode::MultiplierFromSource,
        multiplier,
        ..Preset::default()
    }
}

fn expected_tier(width: u32, height: u32) -> u32 {
    let edge = width.max(height);
    RESOLUTION_TIERS
        .iter()
        .find(|(min, _)| edge >= *min)
        .map(|(_, kbps)| *kbps)
        .unwrap_or(LOWEST_TIER_KBPS)
}

proptest! {
    #[test]
    fn multiplier_uses_video_bitrate(
        video in 1u32..500_000,
        multiplier in 0.1f64..=10.0,
        width in 0u32..8000,
        height in 0u32..8000,
    ) {
        let info = ProbeInfo {
            video_bitrate_kbps: Some(video),
            width,
            height,
            ..ProbeInfo::default()
        };
        let log = MemoryLog::new();
        let got = resolve_bitrate(&multiplier_preset(multiplier), Some(&info), &log);
        let want = ((video as f64) * multiplier).round().clamp(500.0, 200_000.0) as u32;
        prop_assert_eq!(got, want);
        prop_assert_eq!(log.count(LogLevel::Warning), 0);
    }

    #[test]
    fn missing_video_bitrate_uses_tier_and_warns(
        width in 1u32..8000,
        height in 1u32..8000,
    ) {
        let info = ProbeInfo {
            video_bitrate_kbps: None,
            width,
            height,
            ..ProbeInfo::default()
        };
        let log = MemoryLog::new();
        let got = resolve_bitrate(&multiplier_preset(1.0), Some(&info), &log);
        prop_assert_eq!(got, expected_tier(width, height));
        prop_assert_eq!(log.count(LogLevel::Warning), 1);
    }

    #[test]
    fn fixed_is_verbatim(kbps in 0u32..1_000_000) {
        let preset = Preset { bitrate_kbps: kbps, ..Preset::default() };
        prop_assert_eq!(compute_bitrate(&preset, None).target_kbps, kbps);
    }

    #[test]
    fn auto_match_stays_in_bounds(
        video in 1u32..200_000,
        bias in 0u8..=255,
        width in 0u32..8000,
        height in 0u32..8000,
        fps in 0.0f64..240.0,
        h265 in any::<bool>(),
    ) {
        let preset = Preset {
            name: "auto".to_string(),
            bitrate_mode: BitrateMode::AutoMatch,
            target_codec: if h265 { TargetCodec::H265 } else { TargetCodec::H264 },
            auto_match_bias: bias,
            ..Preset::default()
        };
        let info = ProbeInfo {
            video_bitrate_kbps: Some(video),
            width,
            height,
            fps,
            ..ProbeInfo::default()
        };
        let got = compute_bitrate(&preset, Some(&info)).target_kbps as u64;
        let ceiling = 10 * video as u64;
        let floor = 800u64.max((video as f64 * 0.25).round() as u64).min(ceiling);
        prop_assert!(got >= floor && got <= ceiling, "{} not in [{}, {}]", got, floor, ceiling);
    }
}

#[test]
fn unknown_everything_is_unresolvable() {
    let log = MemoryLog::new();
    let got = resolve_bitrate(&multiplier_preset(1.5), Some(&ProbeInfo::default()), &log);
    assert_eq!(got, 0);
    assert_eq!(resolve_bitrate(&multiplier_preset(1.5), None, &log), 0);
}
