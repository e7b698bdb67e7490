use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("Plant {0} not found")]
    PlantNotFound(u32),
    #[error("Plant {0} is already being watered")]
    AlreadyRunning(u32),
    #[error("Plant {0} is not being watered")]
    NotRunning(u32),
    #[error("Actuator fault: {0}")]
    ActuatorFault(String),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Weather error: {0}")]
    WeatherError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
}
