//! Read-only access to the fleet database written by the backend.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use std::{fmt, path::Path};

use crate::types::RawTelemetry;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertSummary {
    pub vehicle_id: String,
    pub alert_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FleetContext {
    pub total_vehicles: i64,
    pub active_vehicles: i64,
    pub recent_alerts: Vec<AlertSummary>,
}

impl fmt::Display for FleetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alerts: Vec<String> = self
            .recent_alerts
            .iter()
            .map(|a| format!("{} ({})", a.vehicle_id, a.alert_type))
            .collect();
        writeln!(f, "Total Vehicles: {}", self.total_vehicles)?;
        writeln!(f, "Active Vehicles: {}", self.active_vehicles)?;
        write!(f, "Recent Alerts: [{}]", alerts.join(", "))
    }
}

pub struct TelemetryRepo {
    conn: Mutex<Connection>,
}

impl TelemetryRepo {
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Newest `limit` rows for one vehicle, by timestamp descending.
    pub fn recent_samples(&self, vehicle_id: &str, limit: usize) -> rusqlite::Result<Vec<RawTelemetry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT engine_temp, battery_voltage, fuel_level, odometer
             FROM telemetry
             WHERE vehicle_id = ?1
             ORDER BY timestamp DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![vehicle_id, limit as i64], |row| {
            Ok(RawTelemetry {
                engine_temp: row.get(0)?,
                battery_voltage: row.get(1)?,
                fuel_level: row.get(2)?,
                odometer: row.get(3)?,
            })
        })?;
        rows.collect()
    }

    /// Summary handed to the assistant alongside a question.
    pub fn fleet_context(&self) -> rusqlite::Result<FleetContext> {
        let conn = self.conn.lock();
        let total_vehicles = conn.query_row("SELECT COUNT(*) FROM vehicles", [], |r| r.get(0))?;
        let active_vehicles =
            conn.query_row("SELECT COUNT(*) FROM vehicles WHERE status = 'active'", [], |r| r.get(0))?;

        let mut stmt =
            conn.prepare("SELECT vehicle_id, alert_type FROM alerts WHERE acknowledged = 0 LIMIT 5")?;
        let recent_alerts = stmt
            .query_map([], |r| {
                Ok(AlertSummary {
                    vehicle_id: r.get(0)?,
                    alert_type: r.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(FleetContext {
            total_vehicles,
            active_vehicles,
            recent_alerts,
        })
    }
}
