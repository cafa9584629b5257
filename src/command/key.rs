use super::CommandFlag::*;
use super::{CommandContext, CommandTable, arg_i64, arg_key, arg_keys, arg_option, count_reply};
use crate::error::{KestrelError, KestrelResult};
use crate::resp::RespValue;

pub(super) fn register(table: &mut CommandTable) {
    table.add("DEL", -2, &[Write], (1, -1, 1), cmd_del);
    table.add("EXISTS", -2, &[ReadOnly, Fast], (1, -1, 1), cmd_exists);
    table.add("EXPIRE", 3, &[Write, Fast], (1, 1, 1), cmd_expire);
    table.add("PEXPIRE", 3, &[Write, Fast], (1, 1, 1), cmd_pexpire);
    table.add("EXPIREAT", 3, &[Write, Fast], (1, 1, 1), cmd_expireat);
    table.add("PEXPIREAT", 3, &[Write, Fast], (1, 1, 1), cmd_pexpireat);
    table.add("TTL", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_ttl);
    table.add("PTTL", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_pttl);
    table.add("PERSIST", 2, &[Write, Fast], (1, 1, 1), cmd_persist);
    table.add("RENAME", 3, &[Write], (1, 2, 1), cmd_rename);
    table.add("TYPE", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_type);
    table.add("KEYS", 2, &[ReadOnly], (0, 0, 0), cmd_keys);
    table.add("SCAN", -2, &[ReadOnly], (0, 0, 0), cmd_scan);
}

fn cmd_del(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let keys = arg_keys(args)?;
    Ok(count_reply(ctx.store.keys().del(&keys)))
}

fn cmd_exists(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let keys = arg_keys(args)?;
    Ok(count_reply(ctx.store.keys().exists(&keys)))
}

/// Shared body of the four expire commands. `unit_ms` scales the argument
/// to milliseconds; `relative` adds the current time.
fn expire_generic(
    ctx: &mut CommandContext<'_>,
    args: &[RespValue],
    unit_ms: i64,
    relative: bool,
    cmd: &str,
) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let amount = arg_i64(&args[1])?;
    let invalid = || KestrelError::InvalidExpireTime(cmd.into());

    let mut at = amount.checked_mul(unit_ms).ok_or_else(invalid)?;
    if relative {
        at = at.checked_add(ctx.store.now() as i64).ok_or_else(invalid)?;
    }
    Ok(RespValue::integer(ctx.store.keys().expire_at(&key, at) as i64))
}

fn cmd_expire(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    expire_generic(ctx, args, 1000, true, "expire")
}

fn cmd_pexpire(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    expire_generic(ctx, args, 1, true, "pexpire")
}

fn cmd_expireat(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    expire_generic(ctx, args, 1000, false, "expireat")
}

fn cmd_pexpireat(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    expire_generic(ctx, args, 1, false, "pexpireat")
}

fn cmd_ttl(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(RespValue::integer(ctx.store.keys().ttl(&key)))
}

fn cmd_pttl(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(RespValue::integer(ctx.store.keys().pttl(&key)))
}

fn cmd_persist(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(RespValue::integer(ctx.store.keys().persist(&key) as i64))
}

fn cmd_rename(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let src = arg_key(&args[0])?;
    let dst = arg_key(&args[1])?;
    ctx.store.keys().rename(&src, &dst)?;
    Ok(RespValue::ok())
}

fn cmd_type(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(RespValue::simple_string(ctx.store.keys().key_type(&key)))
}

fn cmd_keys(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let pattern = arg_key(&args[0])?;
    let keys = ctx.store.keys().keys(&pattern);
    Ok(RespValue::array(keys.into_iter().map(RespValue::bulk_string).collect()))
}

/// SCAN cursor [MATCH pattern] [COUNT count]
fn cmd_scan(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let cursor: usize = arg_key(&args[0])?
        .parse()
        .map_err(|_| KestrelError::Generic("invalid cursor".into()))?;

    let mut pattern = None;
    let mut count = 10usize;
    for pair in args[1..].chunks(2) {
        let [opt, value] = pair else {
            return Err(KestrelError::SyntaxError);
        };
        match arg_option(opt).as_str() {
            "MATCH" => pattern = Some(arg_key(value)?),
            "COUNT" => {
                let n = arg_i64(value)?;
                if n < 1 {
                    return Err(KestrelError::SyntaxError);
                }
                count = n as usize;
            }
            _ => return Err(KestrelError::SyntaxError),
        }
    }

    let (next, keys) = ctx.store.keys().scan(cursor, pattern.as_deref(), count);
    Ok(RespValue::array(vec![
        RespValue::bulk_string(next.to_string()),
        RespValue::array(keys.into_iter().map(RespValue::bulk_string).collect()),
    ]))
}

#[cfg(test)]
mod tests {
    use crate::command::test_support::*;
    use crate::resp::RespValue;

    #[test]
    fn test_del_exists() {
        let mut h = Harness::new();
        h.run(&["MSET", "a", "1", "b", "2"]);
        assert_eq!(h.run(&["EXISTS", "a", "b", "c", "a"]), RespValue::integer(3));
        assert_eq!(h.run(&["DEL", "a", "c"]), RespValue::integer(1));
        assert_eq!(h.run(&["EXISTS", "a"]), RespValue::integer(0));
    }

    #[test]
    fn test_expire_family() {
        let mut h = Harness::new();
        h.run(&["SET", "k", "v"]);
        assert_eq!(h.run(&["EXPIRE", "k", "10"]), RespValue::integer(1));
        assert_eq!(h.run(&["TTL", "k"]), RespValue::integer(10));
        assert_eq!(h.run(&["PEXPIRE", "k", "2500"]), RespValue::integer(1));
        assert_eq!(h.run(&["TTL", "k"]), RespValue::integer(3));
        let at = (T0 + 700).to_string();
        assert_eq!(h.run(&["PEXPIREAT", "k", &at]), RespValue::integer(1));
        assert_eq!(h.run(&["PTTL", "k"]), RespValue::integer(700));
        let secs = (T0 / 1000 + 5).to_string();
        assert_eq!(h.run(&["EXPIREAT", "k", &secs]), RespValue::integer(1));
        assert_eq!(h.run(&["PTTL", "k"]), RespValue::integer(5_000));
        assert_eq!(h.run(&["EXPIRE", "missing", "10"]), RespValue::integer(0));
    }

    #[test]
    fn test_non_positive_expire_deletes() {
        let mut h = Harness::new();
        h.run(&["SET", "k", "v"]);
        assert_eq!(h.run(&["EXPIRE", "k", "0"]), RespValue::integer(1));
        assert_eq!(h.run(&["EXISTS", "k"]), RespValue::integer(0));
    }

    #[test]
    fn test_persist_and_ttl_states() {
        let mut h = Harness::new();
        assert_eq!(h.run(&["TTL", "k"]), RespValue::integer(-2));
        assert_eq!(h.run(&["PTTL", "k"]), RespValue::integer(-2));
        h.run(&["SET", "k", "v", "EX", "100"]);
        assert_eq!(h.run(&["PERSIST", "k"]), RespValue::integer(1));
        assert_eq!(h.run(&["PERSIST", "k"]), RespValue::integer(0));
        assert_eq!(h.run(&["TTL", "k"]), RespValue::integer(-1));
    }

    #[test]
    fn test_rename() {
        let mut h = Harness::new();
        h.run(&["SET", "a", "1"]);
        assert_eq!(h.run(&["RENAME", "a", "b"]), RespValue::ok());
        assert_eq!(h.run(&["GET", "b"]), bulk("1"));
        assert_eq!(h.run(&["RENAME", "a", "b"]), RespValue::error("ERR no such key"));
    }

    #[test]
    fn test_type() {
        let mut h = Harness::new();
        h.run(&["HSET", "h", "f", "v"]);
        assert_eq!(h.run(&["TYPE", "h"]), RespValue::simple_string("hash"));
        assert_eq!(h.run(&["TYPE", "x"]), RespValue::simple_string("none"));
    }

    #[test]
    fn test_keys_and_scan() {
        let mut h = Harness::new();
        h.run(&["MSET", "user:1", "a", "user:2", "b", "post:1", "c"]);
        assert_eq!(h.run(&["KEYS", "user:*"]), bulks(&["user:1", "user:2"]));
        assert_eq!(
            h.run(&["SCAN", "0", "MATCH", "post:*", "COUNT", "100"]),
            RespValue::array(vec![bulk("0"), bulks(&["post:1"])])
        );
        assert_eq!(
            h.run(&["SCAN", "0", "COUNT", "2"]),
            RespValue::array(vec![bulk("2"), bulks(&["post:1", "user:1"])])
        );
        assert_eq!(h.run(&["SCAN", "0", "COUNT"]), RespValue::error("ERR syntax error"));
        assert_eq!(h.run(&["SCAN", "x"]), RespValue::error("ERR invalid cursor"));
    }
}
