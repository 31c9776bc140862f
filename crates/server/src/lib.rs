//! Process wiring: configuration, command handlers, and save-game state.

pub mod config;
pub mod handlers;
pub mod save_game;

pub use config::Config;
pub use handlers::{CharacterSetup, GameService, HandlerError, NewGame};
pub use save_game::{SaveGame, SaveGameLog};
