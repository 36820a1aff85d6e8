//! Line-oriented command script reader.
//!
//! One command per line. Whitespace is ignored everywhere, empty lines and
//! lines starting with `//` are skipped:
//!
//! ```text
//! begin(T1)
//! beginRO(T2)
//! R(T1, x4)
//! W(T1, x4, 101)
//! end(T1)
//! fail(3)
//! recover(3)
//! dump()      // every site
//! dump(x4)    // one item
//! dump(3)     // one site
//! ```

use repldb_core::Command;
use repldb_types::{ItemId, SiteId, TxnId, Value};

/// A script line that cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// The line is not a well-formed command.
    #[error("syntax error at line {line}: expected {expected}, found `{text}`")]
    Syntax {
        /// 1-based line number.
        line: usize,
        text: String,
        expected: &'static str,
    },

    /// The line names a site outside the configured range.
    #[error("line {line}: site {site} is out of range")]
    UnknownSite { line: usize, site: SiteId },
}

const ANY_COMMAND: &str = "a command";
const BEGIN: &str = "begin(Ti)";
const BEGIN_RO: &str = "beginRO(Ti)";
const READ: &str = "R(Ti, xj)";
const WRITE: &str = "W(Ti, xj, v)";
const END: &str = "end(Ti)";
const FAIL: &str = "fail(k)";
const RECOVER: &str = "recover(k)";
const DUMP: &str = "dump(), dump(xj) or dump(k)";

/// Parse one line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: usize, text: &str) -> Result<Option<Command>, ScriptError> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() || cleaned.starts_with("//") {
        return Ok(None);
    }

    let syntax = |expected: &'static str| ScriptError::Syntax {
        line,
        text: text.trim().to_string(),
        expected,
    };

    let Some((name, args)) = split_call(&cleaned) else {
        return Err(syntax(ANY_COMMAND));
    };
    let args: Vec<&str> = if args.is_empty() {
        Vec::new()
    } else {
        args.split(',').collect()
    };

    let command = match (name, args.as_slice()) {
        ("begin", [txn]) => Command::Begin {
            txn: txn_id(txn).ok_or_else(|| syntax(BEGIN))?,
        },
        ("begin", _) => return Err(syntax(BEGIN)),
        ("beginRO", [txn]) => Command::BeginReadOnly {
            txn: txn_id(txn).ok_or_else(|| syntax(BEGIN_RO))?,
        },
        ("beginRO", _) => return Err(syntax(BEGIN_RO)),
        ("R", [txn, item]) => match (txn_id(txn), item_id(item)) {
            (Some(txn), Some(item)) => Command::Read { txn, item },
            _ => return Err(syntax(READ)),
        },
        ("R", _) => return Err(syntax(READ)),
        ("W", [txn, item, value]) => {
            match (txn_id(txn), item_id(item), value.parse::<Value>().ok()) {
                (Some(txn), Some(item), Some(value)) => Command::Write { txn, item, value },
                _ => return Err(syntax(WRITE)),
            }
        }
        ("W", _) => return Err(syntax(WRITE)),
        ("end", [txn]) => Command::End {
            txn: txn_id(txn).ok_or_else(|| syntax(END))?,
        },
        ("end", _) => return Err(syntax(END)),
        ("fail", [site]) => Command::Fail {
            site: site_id(site).ok_or_else(|| syntax(FAIL))?,
        },
        ("fail", _) => return Err(syntax(FAIL)),
        ("recover", [site]) => Command::Recover {
            site: site_id(site).ok_or_else(|| syntax(RECOVER))?,
        },
        ("recover", _) => return Err(syntax(RECOVER)),
        ("dump", []) => Command::DumpAll,
        ("dump", [target]) if target.starts_with('x') => Command::DumpItem {
            item: item_id(target).ok_or_else(|| syntax(DUMP))?,
        },
        ("dump", [target]) => Command::DumpSite {
            site: site_id(target).ok_or_else(|| syntax(DUMP))?,
        },
        ("dump", _) => return Err(syntax(DUMP)),
        _ => return Err(syntax(ANY_COMMAND)),
    };

    Ok(Some(command))
}

/// Parse a whole script, stopping at the first bad line.
pub fn parse_script(source: &str) -> Result<Vec<Command>, ScriptError> {
    let mut commands = Vec::new();
    for (index, text) in source.lines().enumerate() {
        if let Some(command) = parse_line(index + 1, text)? {
            commands.push(command);
        }
    }
    Ok(commands)
}

/// `name(args)` → `(name, args)`.
fn split_call(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_suffix(')')?;
    let (name, args) = inner.split_once('(')?;
    if name.is_empty() || args.contains(['(', ')']) {
        return None;
    }
    Some((name, args))
}

fn txn_id(text: &str) -> Option<TxnId> {
    text.strip_prefix('T')?.parse().ok().map(TxnId)
}

fn item_id(text: &str) -> Option<ItemId> {
    let index: u32 = text.strip_prefix('x')?.parse().ok()?;
    (index > 0).then_some(ItemId(index))
}

fn site_id(text: &str) -> Option<SiteId> {
    text.parse().ok().map(SiteId)
}
