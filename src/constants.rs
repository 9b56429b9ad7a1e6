//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Token budget constants
pub mod budget {
    /// Completion tokens at or above this fraction of the output budget
    /// mean the response was cut off mid-generation.
    pub const TRUNCATION_RATIO: f64 = 0.95;

    /// The wall-clock ceiling for a whole job is the per-request timeout
    /// multiplied by this factor, covering chunked multi-call sequences.
    pub const JOB_DEADLINE_FACTOR: u32 = 4;

    /// Default output budget per depth (tokens)
    pub mod output_tokens {
        pub const QUICK: u32 = 2_048;
        pub const STANDARD: u32 = 8_192;
        pub const DEEP: u32 = 16_384;
    }

    /// Default request timeout per depth (seconds).
    /// Must be non-decreasing in the output budget.
    pub mod timeout_secs {
        pub const QUICK: u64 = 60;
        pub const STANDARD: u64 = 180;
        pub const DEEP: u64 = 360;
    }
}

/// Chunking constants
pub mod chunking {
    /// Default characters per window (~15k tokens)
    pub const DEFAULT_MAX_CHUNK_CHARS: usize = 60_000;

    /// Default overlap between adjacent windows, preserves cross-window
    /// context such as character continuity
    pub const DEFAULT_OVERLAP_CHARS: usize = 5_000;

    /// Window boundaries are snapped to a newline within this many
    /// characters of the nominal cut point
    pub const BOUNDARY_SLACK_CHARS: usize = 100;
}

/// Progress reporter constants
pub mod progress {
    use std::time::Duration;

    /// Progress written when a job enters Processing
    pub const PROCESSING_START: u8 = 5;

    /// First value the reporter writes
    pub const REPORTER_FLOOR: u8 = 15;

    /// The reporter never advances past this value; only a terminal
    /// transition writes higher
    pub const REPORTER_CEILING: u8 = 85;

    /// Increment per tick
    pub const REPORTER_STEP: u8 = 5;

    /// Interval between ticks
    pub const TICK_INTERVAL: Duration = Duration::from_secs(2);

    /// Hard upper bound on reporter lifetime, enforced even if the job
    /// never reaches a terminal state
    pub const MAX_RUNTIME: Duration = Duration::from_secs(900);

    /// Progress written after the pipeline returns, before the result
    /// is persisted
    pub const RESULT_PERSISTING: u8 = 90;

    /// Progress at completion
    pub const DONE: u8 = 100;
}

/// Report normalization constants
pub mod report {
    /// Sub-scores are clamped to 0..=MAX_SUB_SCORE
    pub const MAX_SUB_SCORE: u8 = 10;

    /// Total at or above this yields Recommend (out of 50)
    pub const RECOMMEND_THRESHOLD: u8 = 38;

    /// Total at or above this yields Consider
    pub const CONSIDER_THRESHOLD: u8 = 25;

    /// Evidence quotes are truncated to this many characters
    pub const MAX_QUOTE_CHARS: usize = 500;

    /// Quote context is truncated to this many characters
    pub const MAX_QUOTE_CONTEXT_CHARS: usize = 200;
}

/// HTTP/Network constants
pub mod network {
    /// Connection timeout (seconds), independent of the token budget
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}
