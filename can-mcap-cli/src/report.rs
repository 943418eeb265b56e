//! Console reports for the `convert` and `info` commands.

use can_mcap_decoder::{
    format_physical, ChannelHandle, ConversionStats, DecodedSignal, MultiplexerRole,
    SignalDatabase,
};
use chrono::SecondsFormat;
use std::fmt::Write;
use std::path::Path;

const RULE: &str = "═══════════════════════════════════════════════";

/// Summary printed after a conversion
pub fn conversion_summary(stats: &ConversionStats, channels: &[ChannelHandle], output: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  Conversion Summary");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  Output:          {}", output.display());
    let _ = writeln!(out, "  Frames read:     {}", stats.frames_read);
    let _ = writeln!(out, "  Frames decoded:  {}", stats.frames_decoded);
    let _ = writeln!(out, "  Unknown IDs:     {}", stats.unknown_frames);
    let _ = writeln!(out, "  Shape mismatch:  {}", stats.shape_mismatches);
    let _ = writeln!(out, "  Signals written: {}", stats.signals_written);
    let _ = writeln!(out, "  Out of range:    {}", stats.out_of_range);
    let _ = writeln!(out, "  Channels:        {}", stats.channels_created);

    if let (Some(first), Some(last)) = (stats.first_timestamp(), stats.last_timestamp()) {
        let _ = writeln!(out, "  First frame:     {}", first.to_rfc3339_opts(SecondsFormat::Nanos, true));
        let _ = writeln!(out, "  Last frame:      {}", last.to_rfc3339_opts(SecondsFormat::Nanos, true));
        let _ = writeln!(out, "  Duration:        {:.3} s", stats.duration_secs());
    }
    if stats.cancelled {
        let _ = writeln!(out, "  ⚠️  Conversion was cancelled before the end of the capture");
    }

    if !channels.is_empty() {
        let _ = writeln!(out, "\nChannels:");
        for channel in channels {
            let info = channel.info();
            let _ = writeln!(
                out,
                "  {:>4}  {}  (0x{:X})",
                channel.id(),
                info.topic,
                info.can_id
            );
        }
    }
    out
}

/// Database statistics and message list for the `info` command
pub fn database_info(db: &SignalDatabase, show_signals: bool) -> String {
    let stats = db.stats();
    let mut out = String::new();
    let _ = writeln!(out, "📊 Signal Database:");
    let _ = writeln!(out, "  Messages:    {}", stats.num_messages);
    let _ = writeln!(out, "  Signals:     {}", stats.num_signals);
    let _ = writeln!(out, "  Multiplexed: {}", stats.num_multiplexed);
    let _ = writeln!(out);

    for message in db.messages() {
        let _ = writeln!(
            out,
            "  0x{:08X}{} {} [{} bytes, {} signals]",
            message.id,
            if message.is_extended { "x" } else { " " },
            message.name,
            message.size,
            message.signals.len()
        );

        if !show_signals {
            continue;
        }
        for signal in &message.signals {
            let role = match signal.multiplexer {
                MultiplexerRole::None => String::new(),
                MultiplexerRole::Switch => " M".to_string(),
                MultiplexerRole::Multiplexed(v) => format!(" m{}", v),
            };
            let _ = writeln!(
                out,
                "      {}{} : {}|{} ({},{}) [{}|{}] \"{}\"",
                signal.name,
                role,
                signal.start_bit,
                signal.length,
                signal.factor,
                signal.offset,
                signal.min,
                signal.max,
                signal.unit
            );
        }
    }
    out
}

/// One line per decoded signal for `--print-signals`
pub fn signal_line(signal: &DecodedSignal) -> String {
    let value = match (signal.physical, &signal.description) {
        (_, Some(description)) => format!("{} ({})", signal.raw, description),
        (Some(physical), None) => format_physical(physical, signal.unit().unwrap_or("")),
        (None, None) => signal.raw.to_string(),
    };
    format!(
        "{}  {}.{} = {}",
        signal.timestamp().format("%H:%M:%S%.6f"),
        signal.message_name,
        signal.name,
        value
    )
}
