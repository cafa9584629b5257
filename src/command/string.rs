use super::CommandFlag::*;
use super::{
    CommandContext, CommandTable, arg_bytes, arg_i64, arg_key, arg_keys, arg_option, bulk_or_null,
    count_reply,
};
use crate::error::{KestrelError, KestrelResult};
use crate::resp::RespValue;

pub(super) fn register(table: &mut CommandTable) {
    table.add("GET", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_get);
    table.add("SET", -3, &[Write, DenyOom], (1, 1, 1), cmd_set);
    table.add("SETNX", 3, &[Write, DenyOom, Fast], (1, 1, 1), cmd_setnx);
    table.add("SETEX", 4, &[Write, DenyOom], (1, 1, 1), cmd_setex);
    table.add("PSETEX", 4, &[Write, DenyOom], (1, 1, 1), cmd_psetex);
    table.add("GETEX", -2, &[Write, Fast], (1, 1, 1), cmd_getex);
    table.add("GETDEL", 2, &[Write, Fast], (1, 1, 1), cmd_getdel);
    table.add("APPEND", 3, &[Write, DenyOom, Fast], (1, 1, 1), cmd_append);
    table.add("STRLEN", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_strlen);
    table.add("INCR", 2, &[Write, DenyOom, Fast], (1, 1, 1), cmd_incr);
    table.add("DECR", 2, &[Write, DenyOom, Fast], (1, 1, 1), cmd_decr);
    table.add("INCRBY", 3, &[Write, DenyOom, Fast], (1, 1, 1), cmd_incrby);
    table.add("DECRBY", 3, &[Write, DenyOom, Fast], (1, 1, 1), cmd_decrby);
    table.add("MGET", -2, &[ReadOnly, Fast], (1, -1, 1), cmd_mget);
    table.add("MSET", -3, &[Write, DenyOom], (1, -1, 2), cmd_mset);
}

/// Expiration requested by SET/GETEX options.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Expiry {
    At(u64),
    KeepTtl,
    Persist,
}

/// Convert a relative or absolute option value to an absolute ms instant.
fn resolve_expiry(option: &str, raw: i64, now: u64, cmd: &str) -> KestrelResult<u64> {
    if raw <= 0 {
        return Err(KestrelError::InvalidExpireTime(cmd.into()));
    }
    let overflow = || KestrelError::InvalidExpireTime(cmd.into());
    let at = match option {
        "EX" => raw.checked_mul(1000).and_then(|ms| ms.checked_add(now as i64)),
        "PX" => raw.checked_add(now as i64),
        "EXAT" => raw.checked_mul(1000),
        _ => Some(raw),
    };
    at.map(|ms| ms as u64).ok_or_else(overflow)
}

fn cmd_get(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(bulk_or_null(ctx.store.strings().get(&key)?))
}

/// SET key value [NX | XX] [EX s | PX ms | EXAT s | PXAT ms | KEEPTTL]
fn cmd_set(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let value = arg_bytes(&args[1])?;

    let mut nx = false;
    let mut xx = false;
    let mut expiry: Option<Expiry> = None;
    let now = ctx.store.now();

    let mut i = 2;
    while i < args.len() {
        let opt = arg_option(&args[i]);
        match opt.as_str() {
            "NX" if !xx => nx = true,
            "XX" if !nx => xx = true,
            "KEEPTTL" if expiry.is_none() => expiry = Some(Expiry::KeepTtl),
            "EX" | "PX" | "EXAT" | "PXAT" if expiry.is_none() => {
                let raw = args.get(i + 1).ok_or(KestrelError::SyntaxError)?;
                let at = resolve_expiry(&opt, arg_i64(raw)?, now, "set")?;
                expiry = Some(Expiry::At(at));
                i += 1;
            }
            _ => return Err(KestrelError::SyntaxError),
        }
        i += 1;
    }

    let exists = ctx.store.keys().exists(std::slice::from_ref(&key)) > 0;
    if (nx && exists) || (xx && !exists) {
        return Ok(RespValue::null_bulk_string());
    }

    let mut strings = ctx.store.strings();
    match expiry {
        Some(Expiry::At(at)) => strings.set_with_expiry_at(&key, value, at),
        Some(Expiry::KeepTtl) => strings.set_keep_ttl(&key, value),
        _ => strings.set(&key, value),
    }
    Ok(RespValue::ok())
}

fn cmd_setnx(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let value = arg_bytes(&args[1])?;
    let written = ctx.store.strings().set_nx(&key, value);
    Ok(RespValue::integer(written as i64))
}

fn set_with_relative_ttl(
    ctx: &mut CommandContext<'_>,
    args: &[RespValue],
    option: &str,
    cmd: &str,
) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let ttl = arg_i64(&args[1])?;
    let value = arg_bytes(&args[2])?;
    let at = resolve_expiry(option, ttl, ctx.store.now(), cmd)?;
    ctx.store.strings().set_with_expiry_at(&key, value, at);
    Ok(RespValue::ok())
}

fn cmd_setex(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    set_with_relative_ttl(ctx, args, "EX", "setex")
}

fn cmd_psetex(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    set_with_relative_ttl(ctx, args, "PX", "psetex")
}

/// GETEX key [EX s | PX ms | EXAT s | PXAT ms | PERSIST]
fn cmd_getex(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let expiry = match &args[1..] {
        [] => None,
        [opt] if arg_option(opt) == "PERSIST" => Some(Expiry::Persist),
        [opt, raw] => {
            let opt = arg_option(opt);
            if !matches!(opt.as_str(), "EX" | "PX" | "EXAT" | "PXAT") {
                return Err(KestrelError::SyntaxError);
            }
            let at = resolve_expiry(&opt, arg_i64(raw)?, ctx.store.now(), "getex")?;
            Some(Expiry::At(at))
        }
        _ => return Err(KestrelError::SyntaxError),
    };

    let value = ctx.store.strings().get(&key)?;
    if value.is_some() {
        match expiry {
            Some(Expiry::At(at)) => {
                ctx.store.keys().expire_at(&key, at as i64);
            }
            Some(Expiry::Persist) => {
                ctx.store.keys().persist(&key);
            }
            _ => {}
        }
    }
    Ok(bulk_or_null(value))
}

fn cmd_getdel(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(bulk_or_null(ctx.store.strings().getdel(&key)?))
}

fn cmd_append(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let data = arg_bytes(&args[1])?;
    Ok(count_reply(ctx.store.strings().append(&key, &data)?))
}

fn cmd_strlen(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(count_reply(ctx.store.strings().strlen(&key)?))
}

fn incr_by(ctx: &mut CommandContext<'_>, key: &RespValue, delta: i64) -> KestrelResult<RespValue> {
    let key = arg_key(key)?;
    Ok(RespValue::integer(ctx.store.strings().incr_by(&key, delta)?))
}

fn cmd_incr(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    incr_by(ctx, &args[0], 1)
}

fn cmd_decr(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    incr_by(ctx, &args[0], -1)
}

fn cmd_incrby(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let delta = arg_i64(&args[1])?;
    incr_by(ctx, &args[0], delta)
}

fn cmd_decrby(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let delta = arg_i64(&args[1])?
        .checked_neg()
        .ok_or(KestrelError::Overflow)?;
    incr_by(ctx, &args[0], delta)
}

fn cmd_mget(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let keys = arg_keys(args)?;
    let values = ctx.store.strings().mget(&keys);
    Ok(RespValue::array(values.into_iter().map(bulk_or_null).collect()))
}

fn cmd_mset(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    if args.len() % 2 != 0 {
        return Err(KestrelError::WrongArgCount("mset".into()));
    }
    let pairs = args
        .chunks(2)
        .map(|pair| Ok((arg_key(&pair[0])?, arg_bytes(&pair[1])?)))
        .collect::<KestrelResult<Vec<_>>>()?;
    ctx.store.strings().mset(pairs);
    Ok(RespValue::ok())
}
