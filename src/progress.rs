// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Human-readable progress reporting: sizes, durations, and a frame-by-frame
//! progress bar rendered during encode/decode.

use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;

/// Times the execution of `code` and prints a start/finish line, the same
/// way the original converter timed named phases.
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $code:block) => {{
        println!("Starting {}", $name);
        let start = std::time::Instant::now();
        let result = $code;
        println!("Finished {} after: {}", $name, $crate::progress::fmt_duration(start.elapsed()));
        result
    }};
}

/// Formats a byte count as `B`/`KB`/`MB`/`GB`/`TB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fmt_size(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    for (i, unit) in UNITS.iter().enumerate() {
        if value < 1024.0 || i == UNITS.len() - 1 {
            return if i == 0 {
                format!("{n} {unit}")
            } else {
                format!("{value:.1} {unit}")
            };
        }
        value /= 1024.0;
    }
    unreachable!()
}

/// Formats a duration as `Ns`/`NmNNs` the way the original tool's progress
/// bar labelled elapsed/ETA times.
#[must_use]
pub fn fmt_time(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.0}s")
    } else {
        let total = duration.as_secs();
        format!("{}m{:02}s", total / 60, total % 60)
    }
}

/// Formats a duration scaled to its magnitude: microseconds, milliseconds,
/// seconds, or `hh:mm:ss` once it reaches a minute.
#[must_use]
pub fn fmt_duration(duration: Duration) -> String {
    let Ok(chrono_duration) = ChronoDuration::from_std(duration) else {
        return "duration too large".to_string();
    };

    if chrono_duration < ChronoDuration::milliseconds(1) {
        format!("{} us", chrono_duration.num_microseconds().unwrap_or(0))
    } else if chrono_duration < ChronoDuration::seconds(1) {
        format!("{} ms", chrono_duration.num_milliseconds())
    } else if chrono_duration < ChronoDuration::minutes(1) {
        format!("{} s", chrono_duration.num_seconds())
    } else {
        format!(
            "{:02}:{:02}:{:02}",
            chrono_duration.num_hours(),
            chrono_duration.num_minutes() % 60,
            chrono_duration.num_seconds() % 60
        )
    }
}

/// Tracks a frame-by-frame operation's start time and renders a progress bar
/// line showing percent complete, elapsed/ETA, and frame rate.
pub struct ProgressTimer {
    start: Instant,
}

impl ProgressTimer {
    /// Starts a new timer at the current instant.
    #[must_use]
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Renders `[####------] NN% | elapsed<eta | rate fr/s` for `current`
    /// out of `total` completed units, with a bar `width` characters wide.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bar(&self, current: usize, total: usize, width: usize) -> String {
        let pct = if total == 0 { 0.0 } else { current as f64 / total as f64 };
        let filled = (width as f64 * pct) as usize;
        let bar: String = "#".repeat(filled) + &"-".repeat(width.saturating_sub(filled));
        let elapsed = self.start.elapsed();

        if current == 0 {
            return format!("[{bar}] 0%");
        }

        let elapsed_secs = elapsed.as_secs_f64();
        let eta_secs = if current > 0 {
            (elapsed_secs / current as f64) * (total.saturating_sub(current)) as f64
        } else {
            0.0
        };
        let rate = if elapsed_secs > 0.0 { current as f64 / elapsed_secs } else { 0.0 };

        format!(
            "[{bar}] {:.0}% | {}<{} | {rate:.0} fr/s",
            pct * 100.0,
            fmt_time(elapsed),
            fmt_time(Duration::from_secs_f64(eta_secs.max(0.0)))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_size_scales_units() {
        assert_eq!(fmt_size(12), "12 B");
        assert_eq!(fmt_size(2048), "2.0 KB");
        assert_eq!(fmt_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn fmt_time_switches_at_one_minute() {
        assert_eq!(fmt_time(Duration::from_secs(30)), "30s");
        assert_eq!(fmt_time(Duration::from_secs(90)), "1m30s");
    }

    #[test]
    fn progress_bar_at_zero_and_complete() {
        let timer = ProgressTimer::start();
        assert_eq!(timer.bar(0, 10, 10), "[----------] 0%");
        let complete = timer.bar(10, 10, 10);
        assert!(complete.starts_with("[##########] 100%"));
    }
}
