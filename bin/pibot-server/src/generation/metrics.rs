//! Live throughput metrics for a streamed generation.
//!
//! Token counts are a coarse estimate (`max(words, ceil(chars / 4))`), not a
//! tokenizer. Rates are measured from the first token so backend cold-start
//! latency does not count against throughput.

use std::time::Instant;

/// Estimated token count of one streamed chunk. Blank chunks count as zero.
pub fn estimate_tokens(chunk: &str) -> u64 {
    let trimmed = chunk.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let words = trimmed.split_whitespace().count();
    let chars = trimmed.chars().count();
    words.max(chars.div_ceil(4)) as u64
}

/// Backend durations are nanoseconds; events carry milliseconds.
pub fn nanos_to_millis(nanos: u64) -> f64 {
    round_to(nanos as f64 / 1_000_000.0, 2)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// What one recorded chunk changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkStats {
    pub token_count: u64,
    /// Seconds from stream start, set only for the first non-blank chunk.
    pub time_to_first_token: Option<f64>,
    pub tokens_per_second: f64,
    /// Seconds since the first token.
    pub elapsed: f64,
}

#[derive(Debug, Clone)]
pub struct StreamMetrics {
    started: Instant,
    first_token: Option<Instant>,
    token_count: u64,
}

impl StreamMetrics {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            first_token: None,
            token_count: 0,
        }
    }

    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn record(&mut self, chunk: &str, now: Instant) -> ChunkStats {
        let tokens = estimate_tokens(chunk);
        self.token_count += tokens;

        let mut time_to_first_token = None;
        if tokens > 0 && self.first_token.is_none() {
            self.first_token = Some(now);
            time_to_first_token = Some(round_to(secs_between(self.started, now), 3));
        }

        let elapsed = secs_between(self.first_token.unwrap_or(self.started), now);
        let tokens_per_second = if elapsed > 0.0 {
            self.token_count as f64 / elapsed
        } else {
            0.0
        };

        ChunkStats {
            token_count: self.token_count,
            time_to_first_token,
            tokens_per_second: round_to(tokens_per_second, 2),
            elapsed: round_to(elapsed, 3),
        }
    }

    /// Seconds since the stream started.
    pub fn total_time(&self, now: Instant) -> f64 {
        round_to(secs_between(self.started, now), 3)
    }

    pub fn time_to_first_token(&self) -> f64 {
        self.first_token
            .map(|t| round_to(secs_between(self.started, t), 3))
            .unwrap_or(0.0)
    }

    /// Tokens per second over the whole request.
    pub fn average_rate(&self, now: Instant) -> f64 {
        let total = secs_between(self.started, now);
        if total > 0.0 {
            round_to(self.token_count as f64 / total, 2)
        } else {
            0.0
        }
    }
}

fn secs_between(from: Instant, to: Instant) -> f64 {
    to.saturating_duration_since(from).as_secs_f64()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn hello_world_is_three_tokens() {
        assert_eq!(estimate_tokens("hello world"), 3);
    }

    #[test]
    fn word_count_wins_for_short_words() {
        assert_eq!(estimate_tokens("a b c d e"), 5);
        assert_eq!(estimate_tokens("  \n "), 0);
        assert_eq!(estimate_tokens("x"), 1);
    }

    #[test]
    fn nanoseconds_become_rounded_milliseconds() {
        assert_eq!(nanos_to_millis(1_000_000), 1.0);
        assert_eq!(nanos_to_millis(1_234_567), 1.23);
        assert_eq!(nanos_to_millis(0), 0.0);
    }

    #[test]
    fn rate_is_measured_from_first_token() {
        let start = Instant::now();
        let mut metrics = StreamMetrics::new(start);

        // Cold start: first token arrives after 10 s.
        let first = metrics.record("hello world", start + Duration::from_secs(10));
        assert_eq!(first.time_to_first_token, Some(10.0));
        assert_eq!(first.tokens_per_second, 0.0);

        let second = metrics.record("hello world", start + Duration::from_secs(12));
        assert_eq!(second.token_count, 6);
        assert_eq!(second.time_to_first_token, None);
        assert_eq!(second.elapsed, 2.0);
        assert_eq!(second.tokens_per_second, 3.0);
    }

    #[test]
    fn blank_chunks_do_not_start_the_clock() {
        let start = Instant::now();
        let mut metrics = StreamMetrics::new(start);
        let stats = metrics.record("\n", start + Duration::from_secs(1));
        assert_eq!(stats.time_to_first_token, None);
        assert_eq!(metrics.time_to_first_token(), 0.0);
    }
}
