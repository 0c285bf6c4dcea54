// Pure data and command construction; nothing here spawns a process

pub mod bitrate;
pub mod diagnostics;
pub mod ffmpeg_cmd;
pub mod log;
pub mod output;
pub mod preset;
pub mod scan;
pub mod trim;
pub mod types;

pub use bitrate::{ResolvedBitrate, SourceBitrate, compute_bitrate, resolve_bitrate};
pub use diagnostics::{diagnostics_report, export_items_json, write_diagnostics};
pub use ffmpeg_cmd::{BuildOptions, BuiltCommand, RunWarnings, build_ffmpeg_cmd, format_command_line};
pub use log::{ConsoleLog, FileLog, LogEntry, LogFilter, LogLevel, LogSink, LogSinkExt, MemoryLog, Tee};
pub use output::{derive_output_path, estimated_item_size_kb};
pub use preset::{AudioMode, BitrateMode, EncoderPriority, Preset, TargetCodec};
pub use scan::{collect_inputs, is_video_file, scan, scan_streaming};
pub use trim::{TrimError, TrimTime, parse_trim_time};
pub use types::{DurationSource, ItemStatus, ProbeInfo, QueueItem};
