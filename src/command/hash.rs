use super::CommandFlag::*;
use super::{CommandContext, CommandTable, arg_bytes, arg_key, bulk_array, bulk_or_null, count_reply};
use crate::error::{KestrelError, KestrelResult};
use crate::resp::RespValue;

pub(super) fn register(table: &mut CommandTable) {
    table.add("HSET", -4, &[Write, DenyOom, Fast], (1, 1, 1), cmd_hset);
    table.add("HGET", 3, &[ReadOnly, Fast], (1, 1, 1), cmd_hget);
    table.add("HDEL", -3, &[Write, Fast], (1, 1, 1), cmd_hdel);
    table.add("HEXISTS", 3, &[ReadOnly, Fast], (1, 1, 1), cmd_hexists);
    table.add("HLEN", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_hlen);
    table.add("HGETALL", 2, &[ReadOnly], (1, 1, 1), cmd_hgetall);
}

fn cmd_hset(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let fields = &args[1..];
    if fields.len() % 2 != 0 {
        return Err(KestrelError::WrongArgCount("hset".into()));
    }
    let pairs = fields
        .chunks(2)
        .map(|p| Ok((arg_bytes(&p[0])?, arg_bytes(&p[1])?)))
        .collect::<KestrelResult<Vec<_>>>()?;
    Ok(count_reply(ctx.store.hashes().hset(&key, pairs)?))
}

fn cmd_hget(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let field = arg_bytes(&args[1])?;
    Ok(bulk_or_null(ctx.store.hashes().hget(&key, &field)?))
}

fn cmd_hdel(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let fields = args[1..].iter().map(arg_bytes).collect::<KestrelResult<Vec<_>>>()?;
    Ok(count_reply(ctx.store.hashes().hdel(&key, &fields)?))
}

fn cmd_hexists(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let field = arg_bytes(&args[1])?;
    Ok(RespValue::integer(ctx.store.hashes().hexists(&key, &field)? as i64))
}

fn cmd_hlen(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(count_reply(ctx.store.hashes().hlen(&key)?))
}

fn cmd_hgetall(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let flat = ctx
        .store
        .hashes()
        .hgetall(&key)?
        .into_iter()
        .flat_map(|(f, v)| [f, v])
        .collect();
    Ok(bulk_array(flat))
}
