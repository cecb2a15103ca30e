pub mod case;
pub mod game_match;
pub mod identity;
pub mod membership;
pub mod ranked;
pub mod requests;
pub mod room;
pub mod views;
