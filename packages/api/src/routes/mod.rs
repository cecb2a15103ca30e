pub mod health;
pub mod leaderboard;
pub mod matches;
pub mod queue;
pub mod rooms;
pub mod sabotage;
pub mod session;
