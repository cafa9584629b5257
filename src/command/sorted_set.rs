use super::CommandFlag::*;
use super::{CommandContext, CommandTable, arg_bytes, arg_f64, arg_i64, arg_key, arg_option, count_reply};
use crate::error::{KestrelError, KestrelResult};
use crate::resp::RespValue;
use crate::types::sorted_set::format_score;

pub(super) fn register(table: &mut CommandTable) {
    table.add("ZADD", -4, &[Write, DenyOom, Fast], (1, 1, 1), cmd_zadd);
    table.add("ZREM", -3, &[Write, Fast], (1, 1, 1), cmd_zrem);
    table.add("ZSCORE", 3, &[ReadOnly, Fast], (1, 1, 1), cmd_zscore);
    table.add("ZRANK", 3, &[ReadOnly, Fast], (1, 1, 1), cmd_zrank);
    table.add("ZRANGE", -4, &[ReadOnly], (1, 1, 1), cmd_zrange);
    table.add("ZCARD", 2, &[ReadOnly, Fast], (1, 1, 1), cmd_zcard);
}

/// ZADD key score member [score member ...]
fn cmd_zadd(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let rest = &args[1..];
    if rest.len() % 2 != 0 {
        return Err(KestrelError::SyntaxError);
    }
    // every score is validated before anything is written
    let entries = rest
        .chunks(2)
        .map(|p| Ok((arg_f64(&p[0])?, arg_bytes(&p[1])?)))
        .collect::<KestrelResult<Vec<_>>>()?;
    Ok(count_reply(ctx.store.zsets().zadd(&key, entries)?))
}

fn cmd_zrem(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let members = args[1..].iter().map(arg_bytes).collect::<KestrelResult<Vec<_>>>()?;
    Ok(count_reply(ctx.store.zsets().zrem(&key, &members)?))
}

fn cmd_zscore(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let member = arg_bytes(&args[1])?;
    Ok(match ctx.store.zsets().zscore(&key, &member)? {
        Some(score) => RespValue::bulk_string(format_score(score)),
        None => RespValue::null_bulk_string(),
    })
}

fn cmd_zrank(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let member = arg_bytes(&args[1])?;
    Ok(match ctx.store.zsets().zrank(&key, &member)? {
        Some(rank) => count_reply(rank),
        None => RespValue::null_bulk_string(),
    })
}

/// ZRANGE key start stop [WITHSCORES]
fn cmd_zrange(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    let start = arg_i64(&args[1])?;
    let stop = arg_i64(&args[2])?;
    let with_scores = match args.get(3) {
        None => false,
        Some(opt) if args.len() == 4 && arg_option(opt) == "WITHSCORES" => true,
        Some(_) => return Err(KestrelError::SyntaxError),
    };

    let range = ctx.store.zsets().zrange(&key, start, stop)?;
    let mut out = Vec::with_capacity(range.len() * if with_scores { 2 } else { 1 });
    for (member, score) in range {
        out.push(RespValue::bulk_string(member));
        if with_scores {
            out.push(RespValue::bulk_string(format_score(score)));
        }
    }
    Ok(RespValue::array(out))
}

fn cmd_zcard(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let key = arg_key(&args[0])?;
    Ok(count_reply(ctx.store.zsets().zcard(&key)?))
}
