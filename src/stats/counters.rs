//! Parser for the CSV byte counters dump (`/proc/perfiso_csvstats`).
//!
//! Each line is `tx,<class>,<bytes>` or `rx,<class>,<bytes>`. Other lines are ignored.
use std::io::BufRead;

use super::error::{Field, ParseError, Result};
use crate::ids::ClassId;

/// Cumulative byte counter of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCounter {
    pub class: ClassId,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub tx: Vec<ClassCounter>,
    pub rx: Vec<ClassCounter>,
}

pub fn parse_counters<R: BufRead>(mut reader: R) -> Result<Counters> {
    let mut counters = Counters::default();
    let mut line = String::new();
    let mut lineno = 0;

    while reader.read_line(&mut line)? != 0 {
        lineno += 1;
        parse_counter_line(&line, lineno, &mut counters)?;
        line.clear();
    }

    Ok(counters)
}

fn parse_counter_line(line: &str, lineno: usize, counters: &mut Counters) -> Result<()> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    let target = match fields.first() {
        Some(&"tx") => &mut counters.tx,
        Some(&"rx") => &mut counters.rx,
        _ => return Ok(()),
    };

    let missing = |field| ParseError::MissingField {
        field,
        line: lineno,
        content: line.trim_end().to_owned(),
    };
    let class = fields.get(1).ok_or_else(|| missing(Field::Class))?;
    let bytes = fields.get(2).ok_or_else(|| missing(Field::Bytes))?;

    let class = ClassId::new(class).map_err(|source| ParseError::InvalidIdentifier {
        line: lineno,
        source,
    })?;
    let bytes = bytes.parse::<u64>().map_err(|source| ParseError::InvalidField {
        field: Field::Bytes,
        value: (*bytes).to_owned(),
        line: lineno,
        source,
    })?;
    target.push(ClassCounter { class, bytes });
    Ok(())
}

impl Counters {
    /// Total bytes sent by `class`.
    pub fn tx_bytes(&self, class: &ClassId) -> Option<u64> {
        self.tx.iter().find(|c| &c.class == class).map(|c| c.bytes)
    }

    /// Total bytes received by `class`.
    pub fn rx_bytes(&self, class: &ClassId) -> Option<u64> {
        self.rx.iter().find(|c| &c.class == class).map(|c| c.bytes)
    }
}
