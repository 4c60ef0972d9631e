mod constants;
mod game_id;
mod live;

pub use constants::*;
pub use game_id::{GameId, UnknownGameId};
pub use live::LiveMessage;
