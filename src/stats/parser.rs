//! Line parser for the perfiso stats dump.
//!
//! The dump is free-form text. Only lines with a known prefix are interpreted, and their values
//! are taken from fixed whitespace-delimited field positions (0-based):
//!
//! ```text
//! tx->dev eth2, tx_rate 0, rate 10000
//! txc class 10.0.0.5   weight 4   assoc vq 10.0.0.5   refcnt 1
//! txc rl xmit tx_rate:10, rate 9000, min_rate 100
//! rate limiters:
//! hash 0 ip 0a000009 rate 1000
//! vqs eth2
//! vq class 10.0.0.5   flags 1,1,0   rate 10000  rx_rate 10  fb_rate 20  alpha 3/1024   backlog 0   weight 4
//! ```
use std::io::BufRead;
use std::net::Ipv4Addr;

use super::error::{Field, ParseError, Result};
use super::{Device, RateLimiter, TxClass, Vq};
use crate::ids::{ClassId, DeviceName};

/// Association markers the module prints for a tx class without vq.
const NO_ASSOC: [&str; 2] = ["-", "(none)"];

/// Parses a complete stats dump into its devices, in the order their headers appear.
///
/// A dump without any `tx->dev` header yields an empty list. Unknown lines are skipped.
///
/// # Errors
///
/// Returns [`ParseError`] if reading fails or a recognized line lacks a field or carries a
/// malformed one.
pub fn parse_stats<R: BufRead>(mut reader: R) -> Result<Vec<Device>> {
    let mut parser = Parser::default();
    let mut line = String::new();
    let mut lineno = 0;

    while reader.read_line(&mut line)? != 0 {
        lineno += 1;
        parser.parse_line(&line, lineno)?;
        line.clear();
    }

    Ok(parser.devices)
}

#[derive(Debug, Default)]
struct Parser {
    devices: Vec<Device>,
    current_device: Option<usize>,
    /// A `txc class` header waiting for its `txc rl` detail line.
    pending_class: Option<TxClass>,
    /// Index of the last materialized tx class in the current device.
    current_class: Option<usize>,
    in_rate_limiters: bool,
    /// Device named by the last `vqs` marker.
    vq_device: Option<usize>,
}

struct Ctx<'a, 'l> {
    fields: &'a [&'l str],
    lineno: usize,
    content: &'l str,
}

impl<'l> Ctx<'_, 'l> {
    fn get(&self, idx: usize, field: Field) -> Result<&'l str> {
        self.fields
            .get(idx)
            .copied()
            .ok_or_else(|| ParseError::MissingField {
                field,
                line: self.lineno,
                content: self.content.trim_end().to_owned(),
            })
    }

    fn number(&self, idx: usize, field: Field) -> Result<u64> {
        let raw = self.get(idx, field)?;
        parse_number(raw, field, self.lineno)
    }

    fn class_id(&self, idx: usize) -> Result<ClassId> {
        let raw = self.get(idx, Field::ClassId)?;
        ClassId::new(raw).map_err(|source| ParseError::InvalidIdentifier {
            line: self.lineno,
            source,
        })
    }

    fn device_name(&self, raw: &str) -> Result<DeviceName> {
        DeviceName::new(raw.trim_end_matches(',')).map_err(|source| ParseError::InvalidIdentifier {
            line: self.lineno,
            source,
        })
    }
}

/// Parses a numeric field, tolerating a leading `tag:` or `tag=` and a trailing comma.
fn parse_number(raw: &str, field: Field, line: usize) -> Result<u64> {
    let value = raw.trim_end_matches(',');
    let value = value.rsplit([':', '=']).next().unwrap_or(value);
    value.parse::<u64>().map_err(|source| ParseError::InvalidField {
        field,
        value: raw.to_owned(),
        line,
        source,
    })
}

impl Parser {
    fn parse_line(&mut self, line: &str, lineno: usize) -> Result<()> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let ctx = Ctx {
            fields: &fields,
            lineno,
            content: line,
        };

        match fields.as_slice() {
            ["tx->dev", ..] => self.open_device(&ctx),
            ["txc", "class", ..] => self.open_class(&ctx),
            ["txc", "rl", ..] => self.materialize_class(&ctx),
            ["rate", "limiters:", ..] => {
                self.in_rate_limiters = self.current_class.is_some();
                Ok(())
            }
            ["hash", ..] if self.in_rate_limiters => self.add_rate_limiter(&ctx),
            ["vqs" | "vqs->dev", ..] => self.open_vq_section(&ctx),
            ["vq", "class", ..] => self.add_vq(&ctx),
            [] => Ok(()),
            _ => {
                log::trace!("Skipping stats line {lineno}: `{}`", line.trim_end());
                Ok(())
            }
        }
    }

    fn device_index(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.name.as_str() == name)
    }

    fn open_device(&mut self, ctx: &Ctx<'_, '_>) -> Result<()> {
        let name = ctx.device_name(ctx.get(1, Field::DeviceName)?)?;
        let idx = match self.device_index(name.as_str()) {
            Some(idx) => idx,
            None => {
                self.devices.push(Device::new(name));
                self.devices.len() - 1
            }
        };

        self.current_device = Some(idx);
        self.pending_class = None;
        self.current_class = None;
        self.in_rate_limiters = false;
        self.vq_device = None;
        Ok(())
    }

    fn open_class(&mut self, ctx: &Ctx<'_, '_>) -> Result<()> {
        self.in_rate_limiters = false;
        self.current_class = None;
        self.pending_class = None;
        if self.current_device.is_none() {
            log::debug!("Ignoring tx class outside of any device in line {}", ctx.lineno);
            return Ok(());
        }

        let id = ctx.class_id(2)?;
        let weight = ctx.number(4, Field::Weight)?;
        let assoc = ctx.get(7, Field::AssocVq)?;
        let assoc_vq = if NO_ASSOC.contains(&assoc) {
            None
        } else {
            Some(ClassId::new(assoc).map_err(|source| ParseError::InvalidIdentifier {
                line: ctx.lineno,
                source,
            })?)
        };

        self.pending_class = Some(TxClass {
            id,
            weight,
            assoc_vq,
            min_rate: 0,
            rate: 0,
            tx_rate: 0,
            rate_limiters: Vec::new(),
        });
        Ok(())
    }

    fn materialize_class(&mut self, ctx: &Ctx<'_, '_>) -> Result<()> {
        let (Some(mut class), Some(dev)) = (self.pending_class.take(), self.current_device) else {
            log::trace!("Ignoring tx class detail without header in line {}", ctx.lineno);
            return Ok(());
        };

        class.tx_rate = ctx.number(3, Field::TxRate)?;
        class.rate = ctx.number(5, Field::Rate)?;
        class.min_rate = ctx.number(7, Field::MinRate)?;

        let classes = &mut self.devices[dev].tx_classes;
        classes.push(class);
        self.current_class = Some(classes.len() - 1);
        Ok(())
    }

    fn add_rate_limiter(&mut self, ctx: &Ctx<'_, '_>) -> Result<()> {
        let (Some(dev), Some(class)) = (self.current_device, self.current_class) else {
            return Ok(());
        };

        let raw = ctx.get(3, Field::Destination)?;
        let packed = u32::from_str_radix(raw, 16).map_err(|source| ParseError::InvalidField {
            field: Field::Destination,
            value: raw.to_owned(),
            line: ctx.lineno,
            source,
        })?;
        let rate = ctx.number(5, Field::Rate)?;

        self.devices[dev].tx_classes[class]
            .rate_limiters
            .push(RateLimiter {
                destination: Ipv4Addr::from(packed),
                rate,
            });
        Ok(())
    }

    fn open_vq_section(&mut self, ctx: &Ctx<'_, '_>) -> Result<()> {
        self.in_rate_limiters = false;
        self.pending_class = None;
        self.current_class = None;

        let named = ctx
            .fields
            .get(1)
            .map(|raw| raw.trim_end_matches(','))
            .and_then(|name| self.device_index(name));
        self.vq_device = match named {
            Some(idx) => Some(idx),
            None => {
                log::debug!(
                    "Unknown device in vq marker at line {}: `{}`, using current device",
                    ctx.lineno,
                    ctx.content.trim_end()
                );
                self.current_device
            }
        };
        Ok(())
    }

    fn add_vq(&mut self, ctx: &Ctx<'_, '_>) -> Result<()> {
        let Some(dev) = self.vq_device.or(self.current_device) else {
            log::debug!("Ignoring vq outside of any device in line {}", ctx.lineno);
            return Ok(());
        };

        let id = ctx.class_id(2)?;
        let rate = ctx.number(6, Field::Rate)?;
        let rx_rate = ctx.number(8, Field::RxRate)?;
        let fb_rate = ctx.number(10, Field::FbRate)?;
        let alpha_raw = ctx.get(12, Field::Alpha)?;
        let alpha = parse_number(
            alpha_raw.split('/').next().unwrap_or(alpha_raw),
            Field::Alpha,
            ctx.lineno,
        )?;
        let weight = ctx.number(16, Field::Weight)?;

        self.devices[dev].vqs.push(Vq {
            id,
            weight,
            rate,
            rx_rate,
            fb_rate,
            alpha,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_DEVICES: &str = "\
tx->dev eth2, tx_rate 120, rate 10000
txc class 10.0.0.5   weight 4   assoc vq 10.0.0.5   refcnt 1
txc rl xmit tx_rate:10, rate 9000, min_rate 100
rate limiters:
hash 0 ip 0a000009 rate 1000
hash 1 ip c0a80101 rate 2000
tx->dev eth3, tx_rate 0, rate 10000
txc class 11   weight 2   assoc vq -   refcnt 1
txc rl xmit tx_rate:0, rate 500, min_rate 0
rate limiters:

vqs eth2
vq class 10.0.0.5   flags 1,1,0   rate 10000  rx_rate 10  fb_rate 20  alpha 3/1024   backlog 0   weight 4   refcnt 1   tokens 0
\t cpu   enqueued   network-mark   rx
vqs eth3
vq class 11   flags 1,1,0   rate 5000  rx_rate 0  fb_rate 0  alpha 0/1024   backlog 0   weight 2   refcnt 1   tokens 0
";

    fn parse(input: &str) -> Result<Vec<Device>> {
        parse_stats(Cursor::new(input))
    }

    #[test]
    fn test_parse_two_devices() {
        let devices = parse(TWO_DEVICES).unwrap();
        assert_eq!(devices.len(), 2);

        let eth2 = &devices[0];
        assert_eq!(eth2.name.as_str(), "eth2");
        assert_eq!(eth2.tx_classes.len(), 1);
        let txc = &eth2.tx_classes[0];
        assert_eq!(txc.id.as_str(), "10.0.0.5");
        assert_eq!(txc.weight, 4);
        assert_eq!(txc.assoc_vq.as_ref().map(ClassId::as_str), Some("10.0.0.5"));
        assert_eq!((txc.tx_rate, txc.rate, txc.min_rate), (10, 9000, 100));
        assert_eq!(
            txc.rate_limiters,
            vec![
                RateLimiter {
                    destination: Ipv4Addr::new(10, 0, 0, 9),
                    rate: 1000
                },
                RateLimiter {
                    destination: Ipv4Addr::new(192, 168, 1, 1),
                    rate: 2000
                },
            ]
        );
        assert_eq!(eth2.vqs.len(), 1);
        let vq = &eth2.vqs[0];
        assert_eq!(vq.id.as_str(), "10.0.0.5");
        assert_eq!(
            (vq.weight, vq.rate, vq.rx_rate, vq.fb_rate, vq.alpha),
            (4, 10000, 10, 20, 3)
        );

        let eth3 = &devices[1];
        assert_eq!(eth3.name.as_str(), "eth3");
        assert_eq!(eth3.tx_classes.len(), 1);
        assert_eq!(eth3.tx_classes[0].assoc_vq, None);
        assert!(eth3.tx_classes[0].rate_limiters.is_empty());
        assert_eq!(eth3.vqs.len(), 1);
        assert_eq!(eth3.vqs[0].rate, 5000);
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse(TWO_DEVICES).unwrap(), parse(TWO_DEVICES).unwrap());
    }

    #[test]
    fn test_parse_empty_dump() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("some banner\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_vq_device_falls_back_to_current() {
        let input = "\
tx->dev eth2, tx_rate 0, rate 0
vqs eth9
vq class 7   flags 1,1,0   rate 1  rx_rate 2  fb_rate 3  alpha 4/1024   backlog 0   weight 5
";
        let devices = parse(input).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].vqs.len(), 1);
        assert_eq!(devices[0].vqs[0].id.as_str(), "7");
        assert_eq!(devices[0].vqs[0].weight, 5);
    }

    #[test]
    fn test_class_header_without_detail_is_dropped() {
        let input = "\
tx->dev eth2, tx_rate 0, rate 0
txc class 1   weight 1   assoc vq -   refcnt 1
tx->dev eth3, tx_rate 0, rate 0
txc class 2   weight 1   assoc vq (none)   refcnt 1
vqs eth3
";
        let devices = parse(input).unwrap();
        assert!(devices.iter().all(|d| d.tx_classes.is_empty()));
    }

    #[test]
    fn test_hash_outside_rate_limiter_section_is_skipped() {
        let input = "\
tx->dev eth2, tx_rate 0, rate 0
hash 0 ip zz rate x
txc class 1   weight 1   assoc vq -   refcnt 1
txc rl xmit tx_rate:0, rate 0, min_rate 0
hash 0 ip zz rate x
";
        let devices = parse(input).unwrap();
        assert!(devices[0].tx_classes[0].rate_limiters.is_empty());
    }

    #[test]
    fn test_malformed_field_reports_line_and_field() {
        let input = "\
tx->dev eth2, tx_rate 0, rate 0
txc class 1   weight heavy   assoc vq -   refcnt 1
";
        match parse(input).unwrap_err() {
            ParseError::InvalidField { field, line, .. } => {
                assert_eq!(field, Field::Weight);
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_reports_line_and_field() {
        let input = "\
tx->dev eth2, tx_rate 0, rate 0
vqs eth2
vq class 1   flags 1,1,0   rate 1
";
        match parse(input).unwrap_err() {
            ParseError::MissingField { field, line, .. } => {
                assert_eq!(field, Field::RxRate);
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_number_prefixes() {
        assert_eq!(parse_number("tx_rate:10,", Field::TxRate, 1).unwrap(), 10);
        assert_eq!(parse_number("rate=7", Field::Rate, 1).unwrap(), 7);
        assert_eq!(parse_number("42", Field::Rate, 1).unwrap(), 42);
        assert!(parse_number("x:", Field::Rate, 1).is_err());
    }
}
