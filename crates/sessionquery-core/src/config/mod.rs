mod settings;

pub use settings::{Config, RetrySettings, Settings, TmuxSettings, TMUX_SOCKET_ENV};
