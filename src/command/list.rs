use super::CommandFlag::*;
use super::{CommandContext, CommandTable, arg_bytes, arg_i64, arg_key, bulk_array, count_reply};
use crate::error::{KestrelError, KestrelResult};
use crate::resp::RespValue;
use crate::store::ListOps;

pub(super) fn register(table: &mut CommandTable) {
    table.add("LPUSH", -3, &[Write, DenyOom, Fast], (1, 1, 1), cmd_lpush);
    table.add("RPUSH", -3, &[Write, DenyOom, Fast], (1, 1, 1), cmd_rpush);
    table.add("LPOP", -2, &[Write, Fast], (1, 1, 1), cmd_lpop);
    table.add("RPOP", -2, &[Write, Fast], (1, 1, 1), cmd_rpop);
    table.add("LRANGE", 4, &[ReadOnly], (1, 1, 1), cmd_lrange);
    table.add("LLEN", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_llen);
}

fn values(args: &[RespValue]) -> KestrelResult<Vec<Vec<u8>>> {
    args.iter().map(arg_bytes).collect()
}

fn cmd_lpush(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let values = values(&args[1..])?;
    Ok(count_reply(ctx.store.lists().lpush(&key, values)?))
}

fn cmd_rpush(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let values = values(&args[1..])?;
    Ok(count_reply(ctx.store.lists().rpush(&key, values)?))
}

type PopFn = fn(&mut ListOps<'_>, &str, usize) -> KestrelResult<Option<Vec<Vec<u8>>>>;

/// LPOP/RPOP key [count]. Without a count the reply is a single bulk
/// string; with one it is an array (null when the key is absent).
fn pop_generic(ctx: &mut CommandContext<'_>, args: &[RespValue], pop: PopFn, cmd: &str) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let count = match args.get(1) {
        None => None,
        Some(raw) => {
            let n = arg_i64(raw)?;
            if n < 0 {
                return Err(KestrelError::Generic("value is out of range, must be positive".into()));
            }
            Some(n as usize)
        }
    };
    if args.len() > 2 {
        return Err(KestrelError::WrongArgCount(cmd.into()));
    }

    let popped = pop(&mut ctx.store.lists(), &key, count.unwrap_or(1))?;
    Ok(match (popped, count) {
        (None, None) => RespValue::null_bulk_string(),
        (None, Some(_)) => RespValue::null_array(),
        (Some(items), None) => match items.into_iter().next() {
            Some(v) => RespValue::bulk_string(v),
            None => RespValue::null_bulk_string(),
        },
        (Some(items), Some(_)) => bulk_array(items),
    })
}

fn cmd_lpop(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    pop_generic(ctx, args, |ops, key, n| ops.lpop(key, n), "lpop")
}

fn cmd_rpop(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    pop_generic(ctx, args, |ops, key, n| ops.rpop(key, n), "rpop")
}

fn cmd_lrange(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let start = arg_i64(&args[1])?;
    let stop = arg_i64(&args[2])?;
    Ok(bulk_array(ctx.store.lists().lrange(&key, start, stop)?))
}

fn cmd_llen(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(count_reply(ctx.store.lists().llen(&key)?))
}
