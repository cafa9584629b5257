use super::CommandFlag::*;
use super::{CommandContext, CommandTable, arg_bytes, arg_key, bulk_array, count_reply};
use crate::error::KestrelResult;
use crate::resp::RespValue;

pub(super) fn register(table: &mut CommandTable) {
    table.add("SADD", -3, &[Write, DenyOom, Fast], (1, 1, 1), cmd_sadd);
    table.add("SREM", -3, &[Write, Fast], (1, 1, 1), cmd_srem);
    table.add("SMEMBERS", 2, &[ReadOnly], (1, 1, 1), cmd_smembers);
    table.add("SISMEMBER", 3, &[ReadOnly, Fast], (1, 1, 1), cmd_sismember);
    table.add("SCARD", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_scard);
}

fn members(args: &[RespValue]) -> KestrelResult<Vec<Vec<u8>>> {
    args.iter().map(arg_bytes).collect()
}

fn cmd_sadd(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let members = members(&args[1..])?;
    Ok(count_reply(ctx.store.sets().sadd(&key, members)?))
}

fn cmd_srem(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let members = members(&args[1..])?;
    Ok(count_reply(ctx.store.sets().srem(&key, &members)?))
}

fn cmd_smembers(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(bulk_array(ctx.store.sets().smembers(&key)?))
}

fn cmd_sismember(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let member = arg_bytes(&args[1])?;
    Ok(RespValue::integer(ctx.store.sets().sismember(&key, &member)? as i64))
}

fn cmd_scard(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(count_reply(ctx.store.sets().scard(&key)?))
}
