//! Uptime → points tier table.
//!
//! | daily uptime  | points                                  |
//! |---------------|-----------------------------------------|
//! | `< 6h`        | 0                                       |
//! | `[6h, 10h)`   | `floor(333 * (uptime - 6h) / 4h)`       |
//! | `[10h, 15h)`  | 333                                     |
//! | `[15h, 20h)`  | 667                                     |
//! | `>= 20h`      | 1000                                    |

const HOUR: u64 = 3600;

const RAMP_START: u64 = 6 * HOUR;
const RAMP_END: u64 = 10 * HOUR;
const STANDARD_START: u64 = 15 * HOUR;
const FULL_START: u64 = 20 * HOUR;

pub const BASIC_POINTS: u64 = 333;
pub const STANDARD_POINTS: u64 = 667;
pub const FULL_POINTS: u64 = 1000;

/// The band a day's uptime falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RewardTier {
    None,
    Ramp,
    Basic,
    Standard,
    Full,
}

impl RewardTier {
    pub fn for_uptime(uptime_secs: u64) -> Self {
        match uptime_secs {
            u if u < RAMP_START => Self::None,
            u if u < RAMP_END => Self::Ramp,
            u if u < STANDARD_START => Self::Basic,
            u if u < FULL_START => Self::Standard,
            _ => Self::Full,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ramp => "ramp",
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Full => "full",
        }
    }
}

/// Points earned for `uptime_secs` of uptime in one period.
pub fn calculate_reward_points(uptime_secs: u64) -> u64 {
    match RewardTier::for_uptime(uptime_secs) {
        RewardTier::None => 0,
        RewardTier::Ramp => BASIC_POINTS * (uptime_secs - RAMP_START) / (RAMP_END - RAMP_START),
        RewardTier::Basic => BASIC_POINTS,
        RewardTier::Standard => STANDARD_POINTS,
        RewardTier::Full => FULL_POINTS,
    }
}
