// monitor_agent/src/sources.rs

//! 宿主侧的遥测数据源。
//!
//! - `ProcSnapshotSource`: 从 `/proc` 读取内存、负载、进程数和运行时长；读不到的项直接省略。
//! - `LogTailSource`: 跟踪一个日志文件，每次只取出新增的完整行，最多 `limit` 行。

use chrono::Utc;
use common_models::enums::LogLevel;
use common_models::scalar::{ScalarValue, TelemetryMap};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use telemetry_link::{LogRecord, LogSource, SnapshotSource};

/// 解析 `/proc/meminfo`，得到总内存、可用内存、已用内存 (KB) 和使用率。
pub fn parse_meminfo(content: &str) -> TelemetryMap {
    let field = |name: &str| -> Option<u64> {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse().ok()
        })
    };

    let mut map = TelemetryMap::new();
    let total = field("MemTotal");
    let available = field("MemAvailable").or_else(|| field("MemFree"));
    if let Some(total) = total {
        map.insert("memory_total".to_string(), ScalarValue::from(total));
    }
    if let Some(free) = available {
        map.insert("memory_free".to_string(), ScalarValue::from(free));
    }
    if let (Some(total), Some(free)) = (total, available) {
        let used = total.saturating_sub(free);
        map.insert("memory_used".to_string(), ScalarValue::from(used));
        if total > 0 {
            map.insert("memory_percent".to_string(), ScalarValue::from(used * 100 / total));
        }
    }
    map
}

/// 解析 `/proc/loadavg` 的前三个字段。
pub fn parse_loadavg(content: &str) -> TelemetryMap {
    let mut map = TelemetryMap::new();
    for (key, value) in ["load_1m", "load_5m", "load_15m"]
        .iter()
        .zip(content.split_whitespace())
    {
        if let Ok(v) = value.parse::<f64>() {
            map.insert(key.to_string(), ScalarValue::from(v));
        }
    }
    map
}

/// 基于 `/proc` 的快照数据源。
pub struct ProcSnapshotSource {
    started: Instant,
}

impl ProcSnapshotSource {
    pub fn new() -> Self {
        Self { started: Instant::now() }
    }
}

impl Default for ProcSnapshotSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for ProcSnapshotSource {
    fn snapshot(&self) -> TelemetryMap {
        let mut map = TelemetryMap::new();
        map.insert("timestamp".to_string(), ScalarValue::from(Utc::now().timestamp_millis()));
        map.insert("agent_uptime_secs".to_string(), ScalarValue::from(self.started.elapsed().as_secs()));
        map.insert("agent_pid".to_string(), ScalarValue::from(std::process::id()));

        if let Ok(content) = fs::read_to_string("/proc/meminfo") {
            map.extend(parse_meminfo(&content));
        }
        if let Ok(content) = fs::read_to_string("/proc/loadavg") {
            map.extend(parse_loadavg(&content));
        }
        if let Some(uptime) = fs::read_to_string("/proc/uptime")
            .ok()
            .and_then(|s| s.split_whitespace().next().and_then(|v| v.parse::<f64>().ok()))
        {
            map.insert("system_uptime_secs".to_string(), ScalarValue::from(uptime));
        }
        if let Ok(entries) = fs::read_dir("/proc") {
            let processes = entries
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().chars().all(|c| c.is_ascii_digit()))
                .count();
            map.insert("running_processes".to_string(), ScalarValue::from(processes));
        }
        map
    }
}

#[derive(Debug, Default)]
struct TailState {
    /// 已消费到的字节偏移；`None` 表示尚未读取过。
    offset: Option<u64>,
}

/// 跟踪日志文件的数据源。
///
/// 第一次调用取文件中最后 `limit` 行；之后只取新增的完整行 (末尾未换行的半行留到下次)。
/// 文件被截断或轮转 (长度小于已读偏移) 时从头开始读。
pub struct LogTailSource {
    path: PathBuf,
    limit: usize,
    state: Mutex<TailState>,
}

impl LogTailSource {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
            state: Mutex::new(TailState::default()),
        }
    }

    fn read_new_lines(&self, state: &mut TailState) -> std::io::Result<Vec<String>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        let mut start = state.offset.unwrap_or(0);
        if start > len {
            debug!("[日志跟踪] {:?} 已被截断或轮转，从头读取", self.path);
            start = 0;
        }
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let complete = match buf.iter().rposition(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None => 0,
        };
        state.offset = Some(start + complete as u64);

        let lines: Vec<String> = String::from_utf8_lossy(&buf[..complete])
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let skip = lines.len().saturating_sub(self.limit);
        Ok(lines.into_iter().skip(skip).collect())
    }
}

impl LogSource for LogTailSource {
    fn drain(&self) -> Vec<LogRecord> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.read_new_lines(&mut state) {
            Ok(lines) => lines
                .into_iter()
                .map(|message| LogRecord {
                    level: LogLevel::Info.as_str().to_string(),
                    message,
                })
                .collect(),
            Err(e) => {
                warn!("[日志跟踪] 读取 {:?} 失败: {}", self.path, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    fn temp_file() -> PathBuf {
        std::env::temp_dir().join(format!("monitor_agent_tail_{}.log", Uuid::new_v4()))
    }

    fn messages(records: Vec<LogRecord>) -> Vec<String> {
        records.into_iter().map(|r| r.message).collect()
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:        8000000 kB\nMemFree:          500000 kB\nMemAvailable:    2000000 kB\n";
        let map = parse_meminfo(content);
        assert_eq!(map["memory_total"], ScalarValue::Integer(8_000_000));
        assert_eq!(map["memory_free"], ScalarValue::Integer(2_000_000));
        assert_eq!(map["memory_used"], ScalarValue::Integer(6_000_000));
        assert_eq!(map["memory_percent"], ScalarValue::Integer(75));
        assert!(parse_meminfo("garbage").is_empty());
    }

    #[test]
    fn test_parse_loadavg() {
        let map = parse_loadavg("0.52 0.58 0.59 1/467 12345\n");
        assert_eq!(map["load_1m"], ScalarValue::Float(0.52));
        assert_eq!(map["load_15m"], ScalarValue::Float(0.59));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_snapshot_always_has_agent_fields() {
        let snapshot = ProcSnapshotSource::new().snapshot();
        assert!(snapshot.contains_key("timestamp"));
        assert!(snapshot.contains_key("agent_pid"));
        assert!(snapshot.contains_key("agent_uptime_secs"));
    }

    #[test]
    /// 首次取最后 `limit` 行，之后只取新增的完整行。
    fn test_tail_ships_only_new_complete_lines() {
        let path = temp_file();
        fs::write(&path, "l1\nl2\nl3\nl4\n").unwrap();
        let source = LogTailSource::new(&path, 3);

        assert_eq!(messages(source.drain()), vec!["l2", "l3", "l4"]);
        assert!(source.drain().is_empty());

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "l5\nhalf").unwrap();
        file.flush().unwrap();
        let records = source.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, "INFO");
        assert_eq!(records[0].message, "l5");

        write!(file, " line\n").unwrap();
        file.flush().unwrap();
        assert_eq!(messages(source.drain()), vec!["half line"]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_tail_restarts_after_truncation_and_tolerates_missing_file() {
        let path = temp_file();
        let source = LogTailSource::new(&path, 100);
        assert!(source.drain().is_empty(), "文件不存在时返回空批次");

        fs::write(&path, "first run line a\nfirst run line b\n").unwrap();
        assert_eq!(source.drain().len(), 2);

        fs::write(&path, "rotated\n").unwrap();
        assert_eq!(messages(source.drain()), vec!["rotated"]);
        let _ = fs::remove_file(&path);
    }
}
