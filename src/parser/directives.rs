//! Parser directives: an optional leading `#!bespon ...` line that may
//! tighten (never loosen) the `only_ascii`/`unquoted_strings`/
//! `unquoted_unicode` policies chosen at decoder construction.

use super::State;
use crate::error::Error;

pub(crate) fn consume_leading_directive(state: &mut State) -> Result<(), Error> {
    if !matches_directive_prefix(state) {
        return Ok(());
    }
    state.consume_str("#!bespon");
    loop {
        state.skip_inline_ws();
        let key_start = state.pos;
        while matches!(state.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            state.advance();
        }
        if state.pos == key_start {
            break;
        }
        let key: String = state.chars[key_start..state.pos].iter().collect();
        if state.peek() != Some('=') {
            return Err(state.err(format!("directive \"{}\" expects a value", key)));
        }
        state.advance(); // '='
        let val_start = state.pos;
        while matches!(state.peek(), Some(c) if c.is_ascii_alphanumeric()) {
            state.advance();
        }
        let val: String = state.chars[val_start..state.pos].iter().collect();
        let flag = match val.as_str() {
            "true" => true,
            "false" => false,
            _ => return Err(state.err(format!("directive \"{}\" expects true/false", key))),
        };
        apply_directive(state, &key, flag)?;
    }
    while !state.at_eof() && !crate::grammar::is_line_terminator(state.peek().unwrap()) {
        state.advance();
    }
    if !state.at_eof() {
        state.advance();
    }
    Ok(())
}

fn matches_directive_prefix(state: &State) -> bool {
    const PREFIX: &str = "#!bespon";
    PREFIX
        .chars()
        .enumerate()
        .all(|(i, c)| state.peek_at(i) == Some(c))
}

/// Directives may only narrow policy (turn a permissive option off, never
/// on), so that untrusted-source defaults can't be widened by the
/// document itself.
fn apply_directive(state: &mut State, key: &str, flag: bool) -> Result<(), Error> {
    match key {
        "only_ascii" => {
            if flag && !state.only_ascii {
                state.only_ascii = true;
            } else if !flag && state.only_ascii {
                return Err(state.err("directive cannot loosen only_ascii"));
            }
        }
        "unquoted_strings" => {
            if !flag && state.unquoted_strings {
                state.unquoted_strings = false;
            } else if flag && !state.unquoted_strings {
                return Err(state.err("directive cannot loosen unquoted_strings"));
            }
        }
        "unquoted_unicode" => {
            if !flag && state.unquoted_unicode {
                state.unquoted_unicode = false;
            } else if flag && !state.unquoted_unicode {
                return Err(state.err("directive cannot loosen unquoted_unicode"));
            }
        }
        other => return Err(state.err(format!("unknown parser directive \"{}\"", other))),
    }
    Ok(())
}
