use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutoshutdownError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Probe {probe} communication error: {message}")]
    ProbeCommunication { probe: String, message: String },

    #[error("Probe {probe} parse error: {message}")]
    ProbeParse { probe: String, message: String },

    #[error("External command `{command}` failed: {message}")]
    ExternalCommand { command: String, message: String },

    #[error("Shutdown action '{action}' failed: {message}")]
    ShutdownAction { action: String, message: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl AutoshutdownError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn communication<M: ToString>(probe: &str, message: M) -> Self {
        Self::ProbeCommunication {
            probe: probe.to_string(),
            message: message.to_string(),
        }
    }

    pub fn parse<M: ToString>(probe: &str, message: M) -> Self {
        Self::ProbeParse {
            probe: probe.to_string(),
            message: message.to_string(),
        }
    }

    pub fn command<M: ToString>(command: &str, message: M) -> Self {
        Self::ExternalCommand {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    pub fn shutdown_action<M: ToString>(action: &str, message: M) -> Self {
        Self::ShutdownAction {
            action: action.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AutoshutdownError>;
