//! External service clients used by the handlers.

pub mod twitch;

pub use twitch::{TwitchClient, TwitchConfig};
