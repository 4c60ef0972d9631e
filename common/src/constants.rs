/// Leaderboard page size used when the client does not send a usable one
pub const DEFAULT_LEADERBOARD_PAGE_SIZE: usize = 10;

/// Upper bound for a single leaderboard page
pub const MAX_LEADERBOARD_PAGE_SIZE: usize = 100;

/// Recent winners returned when the client does not send a usable limit
pub const DEFAULT_RECENT_WINNERS_LIMIT: usize = 5;

/// Upper bound for a recent winners request
pub const MAX_RECENT_WINNERS_LIMIT: usize = 50;

/// Display name used when a score's owner cannot be found
pub const UNKNOWN_USERNAME: &str = "Unknown";
