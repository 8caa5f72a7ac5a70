//! beanstalkd protocol client.
//!
//! Speaks the beanstalkd text protocol over a plain TCP connection: one
//! command line out, one reply line back, with an optional length-prefixed
//! body (`OK <bytes>` replies carry YAML, `FOUND`/`RESERVED` carry the job
//! payload). Stats and tube listings are decoded with `serde_yaml`.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

use tracing::debug;

use super::{JobState, QueueSource, SourceError, StatsMap};

/// Reserve timeout used by the bury loop, in seconds.
const RESERVE_TIMEOUT_SECS: u64 = 1;

/// Connection to a beanstalkd server.
///
/// Peek and kick act on the tube selected with `use`; reserve acts on the
/// watch list. Both are cached so repeated calls against the same tube do
/// not re-issue the selection commands.
pub struct BeanstalkClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    used: Option<String>,
    watched: Option<String>,
}

impl BeanstalkClient {
    /// Connects to `host:port`.
    pub fn connect(host: &str, port: u16) -> Result<Self, SourceError> {
        let stream = TcpStream::connect((host, port))?;
        let reader = BufReader::new(stream.try_clone()?);
        debug!(host, port, "connected to beanstalkd");
        Ok(Self {
            stream,
            reader,
            used: None,
            watched: None,
        })
    }

    fn send_line(&mut self, line: &str) -> Result<(), SourceError> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\r\n")?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, SourceError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(SourceError::Protocol(
                "connection closed by server".to_string(),
            ));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Reads a length-prefixed body plus its trailing CRLF.
    fn read_body(&mut self, len: usize) -> Result<Vec<u8>, SourceError> {
        let mut buf = vec![0u8; len + 2];
        self.reader.read_exact(&mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Sends a command expecting an `OK <bytes>` reply; returns the body.
    fn request_body(&mut self, cmd: &str) -> Result<Vec<u8>, SourceError> {
        self.send_line(cmd)?;
        let line = self.read_line()?;
        let (word, rest) = split_reply(&line);
        if word != "OK" {
            return Err(reply_error(&line));
        }
        let len = parse_len(rest)?;
        self.read_body(len)
    }

    /// Sends a command expecting a single-word reply.
    fn request_word(&mut self, cmd: &str, expected: &str) -> Result<(), SourceError> {
        self.send_line(cmd)?;
        let line = self.read_line()?;
        if line == expected {
            Ok(())
        } else {
            Err(reply_error(&line))
        }
    }

    /// Selects the tube peek/kick operate on.
    fn use_tube(&mut self, tube: &str) -> Result<(), SourceError> {
        if self.used.as_deref() == Some(tube) {
            return Ok(());
        }
        self.send_line(&format!("use {tube}"))?;
        let line = self.read_line()?;
        let (word, _) = split_reply(&line);
        if word != "USING" {
            return Err(reply_error(&line));
        }
        self.used = Some(tube.to_string());
        Ok(())
    }

    /// Narrows the watch list to exactly `tube` so reserve cannot pull jobs
    /// from other tubes.
    fn watch_tube(&mut self, tube: &str) -> Result<(), SourceError> {
        if self.watched.as_deref() == Some(tube) {
            return Ok(());
        }
        self.send_line(&format!("watch {tube}"))?;
        let line = self.read_line()?;
        let (word, _) = split_reply(&line);
        if word != "WATCHING" {
            return Err(reply_error(&line));
        }
        // every connection starts out watching `default`
        let prev = self.watched.take().unwrap_or_else(|| "default".to_string());
        if prev != tube {
            self.send_line(&format!("ignore {prev}"))?;
            let line = self.read_line()?;
            let (word, _) = split_reply(&line);
            if word != "WATCHING" && line != "NOT_IGNORED" {
                return Err(reply_error(&line));
            }
        }
        self.watched = Some(tube.to_string());
        Ok(())
    }
}

impl QueueSource for BeanstalkClient {
    fn server_stats(&mut self) -> Result<StatsMap, SourceError> {
        let body = self.request_body("stats")?;
        parse_stats(&body)
    }

    fn list_queues(&mut self) -> Result<Vec<String>, SourceError> {
        let body = self.request_body("list-tubes")?;
        parse_tube_list(&body)
    }

    fn queue_stats(&mut self, name: &str) -> Result<StatsMap, SourceError> {
        let body = self.request_body(&format!("stats-tube {name}"))?;
        parse_stats(&body)
    }

    fn peek_job(&mut self, queue: &str, state: JobState) -> Result<Option<u64>, SourceError> {
        self.use_tube(queue)?;
        let cmd = match state {
            JobState::Ready => "peek-ready",
            JobState::Delayed => "peek-delayed",
            JobState::Buried => "peek-buried",
        };
        self.send_line(cmd)?;
        let line = self.read_line()?;
        if line == "NOT_FOUND" {
            return Ok(None);
        }
        let (word, rest) = split_reply(&line);
        if word != "FOUND" {
            return Err(reply_error(&line));
        }
        let (id, len) = parse_job_header(rest)?;
        self.read_body(len)?;
        Ok(Some(id))
    }

    fn delete_job(&mut self, id: u64) -> Result<(), SourceError> {
        self.request_word(&format!("delete {id}"), "DELETED")
    }

    fn bury_job(&mut self, id: u64, priority: u32) -> Result<(), SourceError> {
        self.request_word(&format!("bury {id} {priority}"), "BURIED")
    }

    fn kick_jobs(&mut self, queue: &str, bound: u64) -> Result<u64, SourceError> {
        self.use_tube(queue)?;
        self.send_line(&format!("kick {bound}"))?;
        let line = self.read_line()?;
        let (word, rest) = split_reply(&line);
        if word != "KICKED" {
            return Err(reply_error(&line));
        }
        parse_u64(rest, "kicked count")
    }

    fn reserve_job(&mut self, queue: &str) -> Result<Option<u64>, SourceError> {
        self.watch_tube(queue)?;
        self.send_line(&format!("reserve-with-timeout {RESERVE_TIMEOUT_SECS}"))?;
        let line = self.read_line()?;
        if line == "TIMED_OUT" || line == "DEADLINE_SOON" {
            return Ok(None);
        }
        let (word, rest) = split_reply(&line);
        if word != "RESERVED" {
            return Err(reply_error(&line));
        }
        let (id, len) = parse_job_header(rest)?;
        self.read_body(len)?;
        Ok(Some(id))
    }

    fn job_stats(&mut self, id: u64) -> Result<StatsMap, SourceError> {
        let body = self.request_body(&format!("stats-job {id}"))?;
        parse_stats(&body)
    }
}

/// Splits a reply line into its leading word and the remainder.
fn split_reply(line: &str) -> (&str, &str) {
    line.split_once(' ').unwrap_or((line, ""))
}

/// Maps an unexpected reply line to an error: known beanstalkd error words
/// become `Server`, anything else is a framing problem.
fn reply_error(line: &str) -> SourceError {
    const SERVER_ERRORS: &[&str] = &[
        "OUT_OF_MEMORY",
        "INTERNAL_ERROR",
        "BAD_FORMAT",
        "UNKNOWN_COMMAND",
        "NOT_FOUND",
        "NOT_IGNORED",
        "DRAINING",
        "EXPECTED_CRLF",
        "JOB_TOO_BIG",
    ];
    let (word, _) = split_reply(line);
    if SERVER_ERRORS.contains(&word) {
        SourceError::Server(line.to_string())
    } else {
        SourceError::Protocol(format!("unexpected reply: {line:?}"))
    }
}

fn parse_u64(field: &str, what: &str) -> Result<u64, SourceError> {
    field
        .trim()
        .parse()
        .map_err(|_| SourceError::Protocol(format!("invalid {what} in reply: {field:?}")))
}

fn parse_len(field: &str) -> Result<usize, SourceError> {
    parse_u64(field, "body length").map(|n| n as usize)
}

/// Parses the `<id> <bytes>` payload header of `FOUND`/`RESERVED` replies.
fn parse_job_header(rest: &str) -> Result<(u64, usize), SourceError> {
    let (id_field, len_field) = rest
        .split_once(' ')
        .ok_or_else(|| SourceError::Protocol(format!("short job header: {rest:?}")))?;
    let id = parse_u64(id_field, "job id")?;
    let len = parse_len(len_field)?;
    Ok((id, len))
}

/// Decodes a YAML stats body into string key/value pairs. Numeric values
/// are kept in their server-reported form.
fn parse_stats(body: &[u8]) -> Result<StatsMap, SourceError> {
    let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_slice(body)
        .map_err(|e| SourceError::Protocol(format!("bad stats body: {e}")))?;
    Ok(raw.into_iter().map(|(k, v)| (k, yaml_scalar(v))).collect())
}

/// Decodes a YAML tube listing.
fn parse_tube_list(body: &[u8]) -> Result<Vec<String>, SourceError> {
    serde_yaml::from_slice(body).map_err(|e| SourceError::Protocol(format!("bad tube list: {e}")))
}

fn yaml_scalar(value: serde_yaml::Value) -> String {
    use serde_yaml::Value;
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stats_body() {
        let body = b"---\ncurrent-jobs-urgent: 0\ncurrent-jobs-ready: 42\nversion: \"1.13\"\nhostname: worker-1\nrusage-utime: 0.148125\n";
        let stats = parse_stats(body).unwrap();
        assert_eq!(stats.get("current-jobs-ready").map(String::as_str), Some("42"));
        assert_eq!(stats.get("version").map(String::as_str), Some("1.13"));
        assert_eq!(stats.get("hostname").map(String::as_str), Some("worker-1"));
        assert_eq!(stats.get("rusage-utime").map(String::as_str), Some("0.148125"));
    }

    #[test]
    fn parses_tube_list_body() {
        let body = b"---\n- default\n- emails\n- thumbnails\n";
        let tubes = parse_tube_list(body).unwrap();
        assert_eq!(tubes, vec!["default", "emails", "thumbnails"]);
    }

    #[test]
    fn rejects_malformed_stats_body() {
        assert!(parse_stats(b"- not\n- a\n- map\n").is_err());
    }

    #[test]
    fn parses_job_headers() {
        assert_eq!(parse_job_header("42 120").unwrap(), (42, 120));
        assert!(parse_job_header("42").is_err());
        assert!(parse_job_header("x y").is_err());
    }

    #[test]
    fn splits_reply_lines() {
        assert_eq!(split_reply("OK 123"), ("OK", "123"));
        assert_eq!(split_reply("NOT_FOUND"), ("NOT_FOUND", ""));
        assert_eq!(split_reply("RESERVED 7 3"), ("RESERVED", "7 3"));
    }

    #[test]
    fn classifies_reply_errors() {
        match reply_error("OUT_OF_MEMORY") {
            SourceError::Server(msg) => assert_eq!(msg, "OUT_OF_MEMORY"),
            other => panic!("expected server error, got {other:?}"),
        }
        match reply_error("garbage reply") {
            SourceError::Protocol(msg) => assert!(msg.contains("garbage")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn parses_kicked_count_field() {
        assert_eq!(parse_u64("3", "kicked count").unwrap(), 3);
        assert!(parse_u64("many", "kicked count").is_err());
    }
}
