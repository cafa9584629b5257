use super::CommandFlag::*;
use super::{CommandContext, CommandHandler, CommandTable, arg_bytes, arg_option, count_reply};
use crate::error::{KestrelError, KestrelResult};
use crate::resp::RespValue;
use tracing::info;

pub(super) fn register(table: &mut CommandTable) {
    table.add("PING", -1, &[Fast, Stale], (0, 0, 0), cmd_ping);
    table.add("ECHO", 2, &[Fast], (0, 0, 0), cmd_echo);
    table.add("DBSIZE", 1, &[ReadOnly, Fast], (0, 0, 0), cmd_dbsize);
    table.add("FLUSHDB", -1, &[Write], (0, 0, 0), cmd_flushdb);
    table.add("COMMAND", -1, &[Loading, Stale], (0, 0, 0), cmd_command);
    table.add("BGREWRITEAOF", 1, &[Admin], (0, 0, 0), cmd_bgrewriteaof);
}

fn cmd_ping(_ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    match args {
        [] => Ok(RespValue::simple_string("PONG")),
        [msg] => Ok(RespValue::bulk_string(arg_bytes(msg)?)),
        _ => Err(KestrelError::WrongArgCount("ping".into())),
    }
}

fn cmd_echo(_ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    Ok(RespValue::bulk_string(arg_bytes(&args[0])?))
}

fn cmd_dbsize(ctx: &mut CommandContext<'_>, _args: &[RespValue]) -> KestrelResult<RespValue> {
    Ok(count_reply(ctx.store.server().dbsize()))
}

/// FLUSHDB [ASYNC|SYNC]. Both modes clear synchronously.
fn cmd_flushdb(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    match args {
        [] => {}
        [mode] if matches!(arg_option(mode).as_str(), "ASYNC" | "SYNC") => {}
        _ => return Err(KestrelError::SyntaxError),
    }
    ctx.store.server().flush();
    Ok(RespValue::ok())
}

fn command_info(handler: &dyn CommandHandler) -> RespValue {
    let (first, last, step) = handler.key_spec();
    let flags = handler
        .flags()
        .iter()
        .map(|f| RespValue::simple_string(f.as_str()))
        .collect();
    RespValue::array(vec![
        RespValue::bulk_string(handler.name().to_ascii_lowercase()),
        RespValue::integer(handler.arity()),
        RespValue::array(flags),
        RespValue::integer(first),
        RespValue::integer(last),
        RespValue::integer(step),
    ])
}

/// COMMAND [COUNT | LIST | INFO name... | DOCS ...]
fn cmd_command(ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
    let commands = ctx.commands;
    let Some(sub) = args.first() else {
        return Ok(RespValue::array(commands.iter().map(command_info).collect()));
    };

    match arg_option(sub).as_str() {
        "COUNT" => Ok(count_reply(commands.len())),
        "LIST" => Ok(RespValue::array(
            commands
                .iter()
                .map(|h| RespValue::bulk_string(h.name().to_ascii_lowercase()))
                .collect(),
        )),
        "INFO" => {
            let infos = args[1..]
                .iter()
                .map(|name| {
                    name.to_string_lossy()
                        .and_then(|n| commands.get(&n))
                        .map_or_else(RespValue::null_bulk_string, command_info)
                })
                .collect();
            Ok(RespValue::array(infos))
        }
        "DOCS" => Ok(RespValue::array(Vec::new())),
        other => Err(KestrelError::Generic(format!(
            "unknown subcommand '{other}'. Try COMMAND HELP."
        ))),
    }
}

fn cmd_bgrewriteaof(ctx: &mut CommandContext<'_>, _args: &[RespValue]) -> KestrelResult<RespValue> {
    let Some(aof) = ctx.aof else {
        return Err(KestrelError::Generic("append only file is disabled".into()));
    };
    // The snapshot is taken under the caller's store lock, so it lines up
    // exactly with the point where new appends start going to the stash.
    let snapshot = ctx.store.snapshot_commands();
    if !aof.begin_rewrite(snapshot) {
        return Err(KestrelError::Generic(
            "Background append only file rewriting already in progress".into(),
        ));
    }
    info!("background AOF rewrite scheduled by client");
    Ok(RespValue::simple_string("Background append only file rewriting started"))
}

#[cfg(test)]
mod tests {
    use crate::command::test_support::*;
    use crate::resp::RespValue;

    #[test]
    fn test_ping_echo() {
        let mut h = Harness::new();
        assert_eq!(h.run(&["PING"]), RespValue::simple_string("PONG"));
        assert_eq!(h.run(&["PING", "hi"]), bulk("hi"));
        assert!(h.run(&["PING", "a", "b"]).is_error());
        assert_eq!(h.run(&["ECHO", "x"]), bulk("x"));
    }

    #[test]
    fn test_dbsize_and_flushdb() {
        let mut h = Harness::new();
        h.run(&["MSET", "a", "1", "b", "2"]);
        h.run(&["SET", "c", "3", "PX", "10"]);
        assert_eq!(h.run(&["DBSIZE"]), RespValue::integer(3));
        h.clock.advance(10);
        assert_eq!(h.run(&["DBSIZE"]), RespValue::integer(2));
        assert_eq!(h.run(&["FLUSHDB"]), RespValue::ok());
        assert_eq!(h.run(&["DBSIZE"]), RespValue::integer(0));
        assert!(h.dispatch(&["FLUSHDB"]).log.is_some());
        assert!(h.run(&["FLUSHDB", "LATER"]).is_error());
    }

    #[test]
    fn test_command_introspection() {
        let mut h = Harness::new();
        let count = h.table.len() as i64;
        assert_eq!(h.run(&["COMMAND", "COUNT"]), RespValue::integer(count));

        let RespValue::Array(Some(all)) = h.run(&["COMMAND"]) else {
            panic!("COMMAND should return an array");
        };
        assert_eq!(all.len() as i64, count);

        let info = h.run(&["COMMAND", "INFO", "get", "nope"]);
        let RespValue::Array(Some(items)) = info else {
            panic!("expected array");
        };
        assert_eq!(
            items[0],
            RespValue::array(vec![
                bulk("get"),
                RespValue::integer(2),
                RespValue::array(vec![
                    RespValue::simple_string("readonly"),
                    RespValue::simple_string("fast"),
                ]),
                RespValue::integer(1),
                RespValue::integer(1),
                RespValue::integer(1),
            ])
        );
        assert_eq!(items[1], RespValue::null_bulk_string());
        assert_eq!(h.run(&["COMMAND", "DOCS"]), RespValue::array(vec![]));
        assert_eq!(
            h.run(&["COMMAND", "BOGUS"]),
            RespValue::error("ERR unknown subcommand 'BOGUS'. Try COMMAND HELP.")
        );
    }

    #[test]
    fn test_bgrewriteaof_without_aof() {
        let mut h = Harness::new();
        assert_eq!(
            h.run(&["BGREWRITEAOF"]),
            RespValue::error("ERR append only file is disabled")
        );
    }
}
