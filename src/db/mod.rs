use crate::actuators::interface::ActuatorKind;
use crate::watering::ds::{NewPlant, Plant, PlantConfig, WateringEvent};
use crate::weather::{ForecastDay, ForecastEntry};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::str::FromStr;
use std::sync::mpsc::{self, Sender};
use std::thread;

pub trait DatabaseTrait: Send + Sync {
    fn load_plants(&self) -> Result<Vec<Plant>>;
    fn get_plant(&self, plant_id: u32) -> Result<Option<Plant>>;
    fn create_plant(&self, plant: NewPlant) -> Result<u32>;
    fn delete_plant(&self, plant_id: u32) -> Result<bool>;
    /// None when the plant is unknown.
    fn watering_status(&self, plant_id: u32) -> Result<Option<bool>>;
    /// Atomically flips the status flag to true and appends the history
    /// record, in one committed transaction. Returns false when the flag
    /// was already set, in which case nothing is written.
    fn mark_started(&self, evt: WateringEvent) -> Result<bool>;
    fn mark_stopped(&self, plant_id: u32) -> Result<bool>;
    fn watering_history(&self, plant_id: u32) -> Result<Vec<WateringEvent>>;
    /// Inserts days (and their entries) whose date is not stored yet;
    /// returns the dates actually added.
    fn store_forecast(&self, days: Vec<ForecastDay>, entries: Vec<ForecastEntry>) -> Result<Vec<String>>;
    fn forecast_days(&self) -> Result<Vec<ForecastDay>>;
    fn forecast_for_day(&self, date: String) -> Result<Vec<ForecastEntry>>;
    fn prune_forecast(&self, keep_days: usize) -> Result<usize>;
}

pub enum DatabaseCommand {
    LoadPlants { response: Sender<Result<Vec<Plant>>> },
    GetPlant { plant_id: u32, response: Sender<Result<Option<Plant>>> },
    CreatePlant { plant: NewPlant, response: Sender<Result<u32>> },
    DeletePlant { plant_id: u32, response: Sender<Result<bool>> },
    WateringStatus { plant_id: u32, response: Sender<Result<Option<bool>>> },
    MarkStarted { evt: WateringEvent, response: Sender<Result<bool>> },
    MarkStopped { plant_id: u32, response: Sender<Result<bool>> },
    WateringHistory { plant_id: u32, response: Sender<Result<Vec<WateringEvent>>> },
    StoreForecast { days: Vec<ForecastDay>, entries: Vec<ForecastEntry>, response: Sender<Result<Vec<String>>> },
    ForecastDays { response: Sender<Result<Vec<ForecastDay>>> },
    ForecastForDay { date: String, response: Sender<Result<Vec<ForecastEntry>>> },
    PruneForecast { keep_days: usize, response: Sender<Result<usize>> },
}

/// All SQLite access funnels through one connection owned by a dedicated
/// thread; every multi-step transition commits there, so concurrent tasks
/// never interleave partial writes.
#[derive(Clone)]
pub struct Database {
    pub sender: Sender<DatabaseCommand>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut conn = Connection::open(path)?;
        initialize(&conn)?;
        thread::spawn(move || {
            while let Ok(command) = rx.recv() {
                match command {
                    DatabaseCommand::LoadPlants { response } => {
                        let _ = response.send(load_plants(&conn));
                    }
                    DatabaseCommand::GetPlant { plant_id, response } => {
                        let _ = response.send(get_plant(&conn, plant_id));
                    }
                    DatabaseCommand::CreatePlant { plant, response } => {
                        let _ = response.send(create_plant(&mut conn, plant));
                    }
                    DatabaseCommand::DeletePlant { plant_id, response } => {
                        let _ = response.send(delete_plant(&conn, plant_id));
                    }
                    DatabaseCommand::WateringStatus { plant_id, response } => {
                        let _ = response.send(watering_status(&conn, plant_id));
                    }
                    DatabaseCommand::MarkStarted { evt, response } => {
                        let _ = response.send(mark_started(&mut conn, &evt));
                    }
                    DatabaseCommand::MarkStopped { plant_id, response } => {
                        let _ = response.send(mark_stopped(&conn, plant_id));
                    }
                    DatabaseCommand::WateringHistory { plant_id, response } => {
                        let _ = response.send(watering_history(&conn, plant_id));
                    }
                    DatabaseCommand::StoreForecast { days, entries, response } => {
                        let _ = response.send(store_forecast(&mut conn, &days, &entries));
                    }
                    DatabaseCommand::ForecastDays { response } => {
                        let _ = response.send(forecast_days(&conn));
                    }
                    DatabaseCommand::ForecastForDay { date, response } => {
                        let _ = response.send(forecast_for_day(&conn, &date));
                    }
                    DatabaseCommand::PruneForecast { keep_days, response } => {
                        let _ = response.send(prune_forecast(&conn, keep_days));
                    }
                }
            }
        });

        Ok(Self { sender: tx })
    }
}

impl DatabaseTrait for Database {
    fn load_plants(&self) -> Result<Vec<Plant>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::LoadPlants { response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn get_plant(&self, plant_id: u32) -> Result<Option<Plant>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::GetPlant { plant_id, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn create_plant(&self, plant: NewPlant) -> Result<u32> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::CreatePlant { plant, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn delete_plant(&self, plant_id: u32) -> Result<bool> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::DeletePlant { plant_id, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn watering_status(&self, plant_id: u32) -> Result<Option<bool>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::WateringStatus { plant_id, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn mark_started(&self, evt: WateringEvent) -> Result<bool> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::MarkStarted { evt, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn mark_stopped(&self, plant_id: u32) -> Result<bool> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::MarkStopped { plant_id, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn watering_history(&self, plant_id: u32) -> Result<Vec<WateringEvent>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::WateringHistory { plant_id, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn store_forecast(&self, days: Vec<ForecastDay>, entries: Vec<ForecastEntry>) -> Result<Vec<String>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::StoreForecast { days, entries, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn forecast_days(&self) -> Result<Vec<ForecastDay>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::ForecastDays { response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn forecast_for_day(&self, date: String) -> Result<Vec<ForecastEntry>> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::ForecastForDay { date, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }

    fn prune_forecast(&self, keep_days: usize) -> Result<usize> {
        let (response_tx, response_rx) = mpsc::channel();
        self.sender.send(DatabaseCommand::PruneForecast { keep_days, response: response_tx }).unwrap();
        response_rx.recv().unwrap()
    }
}

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let query = "
        CREATE TABLE IF NOT EXISTS plants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            actuator TEXT NOT NULL,
            relay_line INTEGER NOT NULL,
            status INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS plant_config (
            plant_id INTEGER PRIMARY KEY,
            enabled INTEGER NOT NULL DEFAULT 1,
            duration INTEGER NOT NULL,
            FOREIGN KEY (plant_id) REFERENCES plants(id) ON DELETE CASCADE
        );
        CREATE TABLE IF NOT EXISTS watering_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plant_id INTEGER NOT NULL,
            start_time INTEGER NOT NULL, -- unix UTC
            duration INTEGER NOT NULL,   -- requested, in seconds
            FOREIGN KEY (plant_id) REFERENCES plants(id) ON DELETE CASCADE
        );
        CREATE TABLE IF NOT EXISTS forecast_days (
            date TEXT PRIMARY KEY,
            sunrise TEXT NOT NULL,
            sunset TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS forecast_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            temperature_c REAL NOT NULL,
            humidity INTEGER NOT NULL,
            weather TEXT NOT NULL,
            rain_chance REAL NOT NULL,
            rain_recorded REAL NOT NULL,
            FOREIGN KEY (date) REFERENCES forecast_days(date) ON DELETE CASCADE
        );
        ";

    conn.execute_batch(query)?;
    Ok(())
}

fn parse_kind(s: &str, idx: usize) -> Result<ActuatorKind> {
    ActuatorKind::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn plant_from_row(row: &rusqlite::Row<'_>) -> Result<Plant> {
    Ok(Plant {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        actuator: parse_kind(&row.get::<_, String>(3)?, 3)?,
        relay_line: row.get(4)?,
        status: row.get(5)?,
        config: PlantConfig { enabled: row.get(6)?, duration_secs: row.get(7)? },
    })
}

const PLANT_COLUMNS: &str = "p.id, p.name, p.description, p.actuator, p.relay_line, p.status, \
                             c.enabled, c.duration";

pub fn load_plants(conn: &Connection) -> Result<Vec<Plant>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM plants p JOIN plant_config c ON c.plant_id = p.id ORDER BY p.id",
        PLANT_COLUMNS
    ))?;
    let plants = stmt.query_map([], plant_from_row)?.collect::<Result<Vec<_>>>()?;
    Ok(plants)
}

pub fn get_plant(conn: &Connection, plant_id: u32) -> Result<Option<Plant>> {
    conn.query_row(
        &format!("SELECT {} FROM plants p JOIN plant_config c ON c.plant_id = p.id WHERE p.id = ?1", PLANT_COLUMNS),
        params![plant_id],
        plant_from_row,
    )
    .optional()
}

pub fn create_plant(conn: &mut Connection, plant: NewPlant) -> Result<u32> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO plants (name, description, actuator, relay_line, status) VALUES (?1, ?2, ?3, ?4, 0)",
        params![plant.name, plant.description, plant.actuator.as_str(), plant.relay_line],
    )?;
    let id = tx.last_insert_rowid() as u32;
    tx.execute(
        "INSERT INTO plant_config (plant_id, enabled, duration) VALUES (?1, ?2, ?3)",
        params![id, plant.config.enabled, plant.config.duration_secs],
    )?;
    tx.commit()?;
    Ok(id)
}

pub fn delete_plant(conn: &Connection, plant_id: u32) -> Result<bool> {
    // config and history go with the plant (ON DELETE CASCADE)
    let deleted = conn.execute("DELETE FROM plants WHERE id = ?1", params![plant_id])?;
    Ok(deleted > 0)
}

pub fn watering_status(conn: &Connection, plant_id: u32) -> Result<Option<bool>> {
    conn.query_row("SELECT status FROM plants WHERE id = ?1", params![plant_id], |row| row.get(0)).optional()
}

pub fn mark_started(conn: &mut Connection, evt: &WateringEvent) -> Result<bool> {
    let tx = conn.transaction()?;
    let updated = tx.execute("UPDATE plants SET status = 1 WHERE id = ?1 AND status = 0", params![evt.plant_id])?;
    if updated == 0 {
        return Ok(false); // already running, nothing written
    }
    tx.execute(
        "INSERT INTO watering_events (plant_id, start_time, duration) VALUES (?1, ?2, ?3)",
        params![evt.plant_id, evt.start_time, evt.duration_secs],
    )?;
    tx.commit()?;
    Ok(true)
}

pub fn mark_stopped(conn: &Connection, plant_id: u32) -> Result<bool> {
    let updated = conn.execute("UPDATE plants SET status = 0 WHERE id = ?1", params![plant_id])?;
    Ok(updated > 0)
}

pub fn watering_history(conn: &Connection, plant_id: u32) -> Result<Vec<WateringEvent>> {
    let mut stmt = conn.prepare(
        "SELECT plant_id, start_time, duration FROM watering_events WHERE plant_id = ?1 ORDER BY start_time",
    )?;
    let events = stmt
        .query_map(params![plant_id], |row| {
            Ok(WateringEvent { plant_id: row.get(0)?, start_time: row.get(1)?, duration_secs: row.get(2)? })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(events)
}

pub fn store_forecast(conn: &mut Connection, days: &[ForecastDay], entries: &[ForecastEntry]) -> Result<Vec<String>> {
    let tx = conn.transaction()?;
    let mut dates_added = Vec::new();
    for day in days {
        let known: Option<i64> = tx
            .query_row("SELECT 1 FROM forecast_days WHERE date = ?1", params![day.date], |row| row.get(0))
            .optional()?;
        if known.is_some() {
            continue;
        }
        tx.execute(
            "INSERT INTO forecast_days (date, sunrise, sunset) VALUES (?1, ?2, ?3)",
            params![day.date, day.sunrise, day.sunset],
        )?;
        for entry in entries.iter().filter(|e| e.date == day.date) {
            tx.execute(
                "INSERT INTO forecast_entries (date, time, temperature_c, humidity, weather, rain_chance, rain_recorded)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.date,
                    entry.time,
                    entry.temperature_c,
                    entry.humidity,
                    entry.weather,
                    entry.rain_chance,
                    entry.rain_recorded
                ],
            )?;
        }
        dates_added.push(day.date.clone());
    }
    tx.commit()?;
    Ok(dates_added)
}

pub fn forecast_days(conn: &Connection) -> Result<Vec<ForecastDay>> {
    let mut stmt = conn.prepare("SELECT date, sunrise, sunset FROM forecast_days ORDER BY date")?;
    let days = stmt
        .query_map([], |row| {
            Ok(ForecastDay { date: row.get(0)?, sunrise: row.get(1)?, sunset: row.get(2)? })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(days)
}

pub fn forecast_for_day(conn: &Connection, date: &str) -> Result<Vec<ForecastEntry>> {
    let mut stmt = conn.prepare(
        "SELECT date, time, temperature_c, humidity, weather, rain_chance, rain_recorded
         FROM forecast_entries WHERE date = ?1 ORDER BY time",
    )?;
    let entries = stmt
        .query_map(params![date], |row| {
            Ok(ForecastEntry {
                date: row.get(0)?,
                time: row.get(1)?,
                temperature_c: row.get(2)?,
                humidity: row.get(3)?,
                weather: row.get(4)?,
                rain_chance: row.get(5)?,
                rain_recorded: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn prune_forecast(conn: &Connection, keep_days: usize) -> Result<usize> {
    conn.execute(
        "DELETE FROM forecast_days WHERE date NOT IN (SELECT date FROM forecast_days ORDER BY date DESC LIMIT ?1)",
        params![keep_days as i64],
    )
}
