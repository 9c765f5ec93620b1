use std::num::ParseIntError;

use crate::ids;

/// Named fields of the stats dump, used in parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DeviceName,
    ClassId,
    Weight,
    AssocVq,
    TxRate,
    Rate,
    MinRate,
    RxRate,
    FbRate,
    Alpha,
    Destination,
    Class,
    Bytes,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::DeviceName => "device",
            Field::ClassId => "class",
            Field::Weight => "weight",
            Field::AssocVq => "assoc_vq",
            Field::TxRate => "tx_rate",
            Field::Rate => "rate",
            Field::MinRate => "min_rate",
            Field::RxRate => "rx_rate",
            Field::FbRate => "fb_rate",
            Field::Alpha => "alpha",
            Field::Destination => "destination",
            Field::Class => "counter class",
            Field::Bytes => "bytes",
        };
        write!(f, "{name}")
    }
}

/// Errors that may occur when parsing the stats or counters dump.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing `{field}` in line {line}: `{content}`")]
    MissingField {
        field: Field,
        line: usize,
        content: String,
    },

    #[error("invalid `{field}` value `{value}` in line {line}: {source}")]
    InvalidField {
        field: Field,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid identifier in line {line}: {source}")]
    InvalidIdentifier {
        line: usize,
        #[source]
        source: ids::Error,
    },

    #[error("failed to read dump: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
