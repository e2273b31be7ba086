//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Semantic similarity rating constants
pub mod ssr {
    /// Number of Likert levels on every rating scale
    pub const LIKERT_LEVELS: usize = 5;

    /// Independently worded reference sets per dimension
    pub const REFERENCE_SETS: usize = 3;

    /// Default softmax temperature
    pub const DEFAULT_TEMPERATURE: f64 = 1.0;

    /// Default uniform smoothing mass
    pub const DEFAULT_EPSILON: f64 = 0.01;

    /// Tolerance used when checking that a PMF sums to one
    pub const PMF_TOLERANCE: f64 = 1e-6;
}

/// Market fit scoring constants
pub mod scoring {
    /// Below this many rated respondents the score is flagged unreliable
    pub const MIN_RELIABLE_RESPONDENTS: usize = 10;

    /// Number of benefits/concerns reported in rankings
    pub const TOP_ITEMS: usize = 5;

    /// Superfan ratio above which a concept has a strong core
    pub const STRONG_SUPERFAN_RATIO: f64 = 0.15;

    /// Superfan ratio above which a niche is viable
    pub const VIABLE_SUPERFAN_RATIO: f64 = 0.10;

    /// Enthusiast share for broad appeal
    pub const BROAD_ENTHUSIAST_PCT: f64 = 40.0;

    /// Enthusiast share for moderate appeal
    pub const MODERATE_ENTHUSIAST_PCT: f64 = 30.0;

    /// Interested share that signals a lukewarm reception
    pub const LUKEWARM_INTERESTED_PCT: f64 = 50.0;

    /// Per-respondent expected interest for the joint superfan diagnostic
    pub const JOINT_SUPERFAN_INTEREST: f64 = 4.5;

    /// Per-respondent expected disappointment for the joint superfan diagnostic
    pub const JOINT_SUPERFAN_DISAPPOINTMENT: f64 = 4.0;
}

/// Population sampling constants
pub mod population {
    /// Personas requested per generation batch
    pub const BATCH_SIZE: usize = 5;

    /// Consecutive empty batches before giving up on a phase
    pub const MAX_FAILED_BATCHES: usize = 3;

    /// Smallest population the workflow accepts
    pub const MIN_POPULATION_SIZE: usize = 10;

    /// Persona age bounds (inclusive)
    pub const MIN_AGE: u8 = 18;
    pub const MAX_AGE: u8 = 85;

    /// Tech-savviness bounds (inclusive)
    pub const MIN_TECH_SAVVINESS: u8 = 1;
    pub const MAX_TECH_SAVVINESS: u8 = 5;
}

/// Refinement workflow constants
pub mod workflow {
    /// Default iteration budget
    pub const DEFAULT_MAX_ITERATIONS: usize = 5;

    /// Default fit percentage target
    pub const DEFAULT_FIT_THRESHOLD: f64 = 40.0;

    /// Default population size
    pub const DEFAULT_POPULATION_SIZE: usize = 100;

    /// Default number of concurrent persona simulations
    pub const DEFAULT_SIMULATION_CONCURRENCY: usize = 4;

    /// Raw responses handed to the critic
    pub const DEFAULT_FEEDBACK_SAMPLES: usize = 5;

    /// Detractors included in the critic sample
    pub const SAMPLE_MAX_DETRACTORS: usize = 2;
}

/// Provider call resilience constants
pub mod api {
    /// Calls allowed per rolling window
    pub const DEFAULT_RATE_LIMIT_CALLS: usize = 50;

    /// Rolling window length (seconds)
    pub const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;

    /// Total attempts per external call
    pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Maximum delay between retries (seconds)
    pub const MAX_RETRY_DELAY_SECS: u64 = 30;

    /// Longest server-requested wait (Retry-After) honoured before a retry
    pub const MAX_RETRY_AFTER_SECS: u64 = 120;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Default generation length
    pub const DEFAULT_MAX_TOKENS: usize = 4000;
}
