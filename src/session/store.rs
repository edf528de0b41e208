use crate::session::{ChatSession, Turn};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

/// On-disk form of a session: history only, none of the streaming state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub schema_version: u32,
    pub session_id: String,
    pub title: String,
    pub created_at: String,
    pub turns: Vec<Turn>,
}

impl SessionRecord {
    pub fn from_session(session: &ChatSession) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            session_id: session.id.clone(),
            title: session.title.clone(),
            created_at: session.created_at.clone(),
            turns: session.history.clone(),
        }
    }

    pub fn into_session(self) -> ChatSession {
        ChatSession {
            id: self.session_id,
            title: self.title,
            created_at: self.created_at,
            history: self.turns,
            pending: false,
            partial: String::new(),
            last_error: None,
        }
    }
}

fn sessions_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spotter")
        .join("sessions")
}

fn session_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{session_id}.json"))
}

fn read_record(path: &Path) -> Result<SessionRecord, String> {
    let data = fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let record: SessionRecord = serde_json::from_slice(&data)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))?;
    if record.schema_version != SCHEMA_VERSION {
        return Err(format!(
            "unknown schema_version in {}: {}",
            path.display(),
            record.schema_version
        ));
    }
    Ok(record)
}

pub fn ensure_sessions_dir() -> io::Result<PathBuf> {
    let dir = sessions_dir();
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn write_record(dir: &Path, record: &SessionRecord) -> io::Result<()> {
    let final_path = session_path(dir, &record.session_id);
    let tmp_path = dir.join(format!("{}.json.tmp", record.session_id));
    let bytes = serde_json::to_vec_pretty(record)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;

    fs::write(&tmp_path, bytes)?;
    match fs::rename(&tmp_path, &final_path) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if final_path.exists() {
                fs::remove_file(&final_path)?;
                fs::rename(&tmp_path, &final_path)?;
                Ok(())
            } else {
                Err(rename_err)
            }
        }
    }
}

pub fn save(record: &SessionRecord) -> io::Result<()> {
    let dir = ensure_sessions_dir()?;
    write_record(&dir, record)
}

pub fn load_all() -> (Vec<SessionRecord>, Vec<String>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    let dir = match ensure_sessions_dir() {
        Ok(dir) => dir,
        Err(err) => {
            warnings.push(format!("failed to initialize sessions directory: {err}"));
            return (records, warnings);
        }
    };

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            warnings.push(format!("failed to read sessions directory: {err}"));
            return (records, warnings);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension() != Some(OsStr::new("json")) {
            continue;
        }

        match read_record(&path) {
            Ok(record) => records.push(record),
            Err(err) => warnings.push(err),
        }
    }

    (records, warnings)
}

#[cfg(test)]
mod tests {
    use super::{read_record, write_record, SessionRecord, SCHEMA_VERSION};
    use crate::session::Turn;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "spotter_session_store_{prefix}_{}_{}",
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("temp dir should create");
        dir
    }

    fn sample_record() -> SessionRecord {
        SessionRecord {
            schema_version: SCHEMA_VERSION,
            session_id: "chat-fixture".to_string(),
            title: "Leg day plan".to_string(),
            created_at: "1".to_string(),
            turns: vec![Turn::user("Plan my leg day"), Turn::assistant("Squats first.")],
        }
    }

    #[test]
    fn write_then_read_round_trips_a_record() {
        let dir = temp_dir("roundtrip");
        let record = sample_record();
        write_record(&dir, &record).expect("record should write");

        let loaded = read_record(&dir.join("chat-fixture.json")).expect("record should load");
        assert_eq!(loaded.session_id, record.session_id);
        assert_eq!(loaded.title, record.title);
        assert_eq!(loaded.turns.len(), 2);
        assert_eq!(loaded.turns[1].content, "Squats first.");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn write_record_overwrites_an_existing_file() {
        let dir = temp_dir("overwrite");
        let mut record = sample_record();
        write_record(&dir, &record).expect("first write should succeed");

        record.title = "Push day plan".to_string();
        write_record(&dir, &record).expect("overwrite should succeed");

        let loaded = read_record(&dir.join("chat-fixture.json")).expect("record should load");
        assert_eq!(loaded.title, "Push day plan");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn read_record_rejects_unknown_schema() {
        let dir = temp_dir("unknown_schema");
        let path = dir.join("chat-unknown.json");
        let data = r#"{
  "schema_version": 99,
  "session_id": "chat-unknown",
  "title": "Unknown",
  "created_at": "1",
  "turns": []
}"#;
        fs::write(&path, data).expect("fixture should write");

        let error = read_record(&path).expect_err("unknown schema should fail");
        assert!(error.contains("unknown schema_version"));

        let _ = fs::remove_dir_all(dir);
    }
}
