use crate::protocol::{
    format_get, format_put, format_table_put, parse_changes, parse_words, CHANGES_COMMAND,
};
use crate::{ChangeSet, Reply, Result, Timestamp, WireError};
use time::OffsetDateTime;

/// A minimal blocking PandA control port client.
pub trait DeviceClient {
    /// Send one command and wait for its reply.
    fn send(&mut self, command: &str) -> Result<Reply>;

    /// Read a scalar field, returning the text after `OK =`.
    fn get(&mut self, field: &str) -> Result<String> {
        let command = format_get(field);
        match self.send(&command)? {
            Reply::Value(v) => Ok(v),
            other => Err(WireError::UnexpectedReply {
                command,
                reply: format!("{other:?}"),
            }),
        }
    }

    /// Read a multiline field (enum labels, table layouts, block lists).
    fn get_multiline(&mut self, command: &str) -> Result<Vec<String>> {
        match self.send(command)? {
            Reply::Multi(lines) => Ok(lines),
            other => Err(WireError::UnexpectedReply {
                command: command.to_string(),
                reply: format!("{other:?}"),
            }),
        }
    }

    /// Read the packed words of a table field.
    fn get_table(&mut self, field: &str) -> Result<Vec<u32>> {
        let lines = self.get_multiline(&format_get(field))?;
        parse_words(&lines)
    }

    /// Write a scalar field.
    fn put(&mut self, field: &str, value: &str) -> Result<()> {
        let command = format_put(field, value);
        expect_ok(self.send(&command)?, command)
    }

    /// Write the packed words of a table field.
    fn put_table(&mut self, field: &str, words: &[u32]) -> Result<()> {
        let command = format_table_put(field, words);
        expect_ok(self.send(&command)?, command)
    }

    /// Poll `*CHANGES?`.
    fn changes(&mut self) -> Result<ChangeSet> {
        let lines = self.get_multiline(CHANGES_COMMAND)?;
        let changes = parse_changes(&lines)?;
        Ok(ChangeSet {
            changes,
            timestamp: Some(Timestamp(OffsetDateTime::now_utc())),
        })
    }
}

fn expect_ok(reply: Reply, command: String) -> Result<()> {
    match reply {
        Reply::Ok => Ok(()),
        other => Err(WireError::UnexpectedReply {
            command,
            reply: format!("{other:?}"),
        }),
    }
}
