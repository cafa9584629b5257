pub mod hash;
pub mod key;
pub mod list;
pub mod server;
pub mod set;
pub mod sorted_set;
pub mod string;

use crate::error::{KestrelError, KestrelResult};
use crate::persistence::aof::Aof;
use crate::resp::RespValue;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// Capabilities advertised by a command. `Write` also decides whether a
/// successful call is appended to the AOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFlag {
    Write,
    ReadOnly,
    DenyOom,
    Fast,
    Admin,
    Loading,
    Stale,
}

impl CommandFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandFlag::Write => "write",
            CommandFlag::ReadOnly => "readonly",
            CommandFlag::DenyOom => "denyoom",
            CommandFlag::Fast => "fast",
            CommandFlag::Admin => "admin",
            CommandFlag::Loading => "loading",
            CommandFlag::Stale => "stale",
        }
    }
}

/// Position of key arguments: (first, last, step). Zeros mean no keys;
/// a negative last counts from the end.
pub type KeySpec = (i64, i64, i64);

/// Everything a handler may touch while it runs. The caller holds the store
/// lock for the whole call.
pub struct CommandContext<'a> {
    pub store: &'a mut Store,
    pub commands: &'a CommandTable,
    pub aof: Option<&'a Arc<Aof>>,
}

impl<'a> CommandContext<'a> {
    pub fn new(store: &'a mut Store, commands: &'a CommandTable, aof: Option<&'a Arc<Aof>>) -> Self {
        CommandContext { store, commands, aof }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &str;

    /// N > 0: exactly N words including the command name. N < 0: at least -N.
    fn arity(&self) -> i64;

    fn flags(&self) -> &[CommandFlag];

    fn key_spec(&self) -> KeySpec {
        (0, 0, 0)
    }

    /// Run the command. `args` excludes the command name.
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue>;

    fn is_write(&self) -> bool {
        self.flags().contains(&CommandFlag::Write)
    }

    fn check_arity(&self, argc: usize) -> bool {
        let arity = self.arity();
        if arity >= 0 {
            argc as i64 == arity
        } else {
            argc as i64 >= -arity
        }
    }

    /// Validate the argument count, then execute.
    fn call(&self, ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
        if !self.check_arity(args.len() + 1) {
            return Err(KestrelError::WrongArgCount(self.name().to_ascii_lowercase()));
        }
        self.execute(ctx, args)
    }
}

pub type HandlerFn = fn(&mut CommandContext<'_>, &[RespValue]) -> KestrelResult<RespValue>;

/// A `CommandHandler` backed by a plain function.
pub struct FnCommand {
    name: &'static str,
    arity: i64,
    flags: &'static [CommandFlag],
    keys: KeySpec,
    handler: HandlerFn,
}

impl FnCommand {
    pub fn new(
        name: &'static str,
        arity: i64,
        flags: &'static [CommandFlag],
        keys: KeySpec,
        handler: HandlerFn,
    ) -> Self {
        FnCommand {
            name,
            arity,
            flags,
            keys,
            handler,
        }
    }
}

impl CommandHandler for FnCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> i64 {
        self.arity
    }

    fn flags(&self) -> &[CommandFlag] {
        self.flags
    }

    fn key_spec(&self) -> KeySpec {
        self.keys
    }

    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[RespValue]) -> KestrelResult<RespValue> {
        (self.handler)(ctx, args)
    }
}

/// Outcome of dispatching one request frame.
#[derive(Debug)]
pub struct Dispatched {
    pub reply: RespValue,
    /// The request to append to the AOF, set only for successful writes.
    pub log: Option<RespValue>,
    /// Time the command ran at. Relative expirations in `log` resolve against it.
    pub now: u64,
}

/// Name -> handler registry, built once at startup.
pub struct CommandTable {
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        let mut table = CommandTable {
            handlers: HashMap::new(),
        };
        string::register(&mut table);
        key::register(&mut table);
        list::register(&mut table);
        hash::register(&mut table);
        set::register(&mut table);
        sorted_set::register(&mut table);
        server::register(&mut table);
        table
    }

    pub fn register(&mut self, handler: impl CommandHandler + 'static) {
        let name = handler.name().to_ascii_uppercase();
        let previous = self.handlers.insert(name, Box::new(handler));
        debug_assert!(previous.is_none(), "command registered twice");
    }

    pub(crate) fn add(
        &mut self,
        name: &'static str,
        arity: i64,
        flags: &'static [CommandFlag],
        keys: KeySpec,
        handler: HandlerFn,
    ) {
        self.register(FnCommand::new(name, arity, flags, keys, handler));
    }

    pub fn get(&self, name: &str) -> Option<&dyn CommandHandler> {
        self.handlers
            .get(&name.to_ascii_uppercase())
            .map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &dyn CommandHandler> {
        let mut handlers: Vec<&dyn CommandHandler> = self.handlers.values().map(|h| h.as_ref()).collect();
        handlers.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        handlers.into_iter()
    }

    /// Look up and run the command in `frame`. Failures become error replies;
    /// nothing here tears down the connection.
    pub fn dispatch(&self, ctx: &mut CommandContext<'_>, frame: &RespValue) -> Dispatched {
        let items = match frame {
            RespValue::Array(Some(items)) if !items.is_empty() => items,
            _ => return Dispatched::error("ERR Protocol error: expected array"),
        };
        let Some(name) = items[0].to_string_lossy() else {
            return Dispatched::error("ERR Protocol error: invalid command name");
        };
        let args = &items[1..];

        let Some(handler) = self.get(&name) else {
            let preview: Vec<String> = args
                .iter()
                .take(3)
                .filter_map(|a| a.to_string_lossy())
                .map(|s| format!("'{s}'"))
                .collect();
            let err = KestrelError::UnknownCommand(name, preview.join(" "));
            return Dispatched::error(err.to_string());
        };

        let now = ctx.store.pin_time();
        let result = handler.call(ctx, args);
        ctx.store.unpin_time();

        match result {
            Ok(reply) => {
                let log = (handler.is_write() && !reply.is_error()).then(|| frame.clone());
                Dispatched { reply, log, now }
            }
            Err(e) => {
                if e.is_internal() {
                    error!(command = handler.name(), "command failed: {e}");
                }
                Dispatched::error(e.to_string())
            }
        }
    }
}

impl Dispatched {
    fn error(msg: impl Into<String>) -> Self {
        Dispatched {
            reply: RespValue::error(msg),
            log: None,
            now: 0,
        }
    }
}

// Argument helpers

pub(crate) fn arg_bytes(arg: &RespValue) -> KestrelResult<Vec<u8>> {
    arg.as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| KestrelError::Generic("Protocol error: expected bulk string".into()))
}

/// Keys are UTF-8 strings. Anything else is refused rather than lossily
/// converted, which would make distinct keys collide.
pub(crate) fn arg_key(arg: &RespValue) -> KestrelResult<String> {
    let bytes = arg
        .as_bytes()
        .ok_or_else(|| KestrelError::Generic("Protocol error: expected bulk string".into()))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| KestrelError::Generic("invalid key: keys must be valid UTF-8".into()))
}

pub(crate) fn arg_keys(args: &[RespValue]) -> KestrelResult<Vec<String>> {
    args.iter().map(arg_key).collect()
}

pub(crate) fn arg_i64(arg: &RespValue) -> KestrelResult<i64> {
    arg.to_string_lossy()
        .and_then(|s| s.parse().ok())
        .ok_or(KestrelError::NotInteger)
}

pub(crate) fn arg_f64(arg: &RespValue) -> KestrelResult<f64> {
    arg.as_bytes()
        .and_then(crate::types::sorted_set::parse_score)
        .ok_or(KestrelError::NotFloat)
}

/// Upper-cased option token, for matching keywords like `EX` or `WITHSCORES`.
pub(crate) fn arg_option(arg: &RespValue) -> String {
    arg.to_string_lossy()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

// Reply helpers

pub(crate) fn bulk_or_null(value: Option<Vec<u8>>) -> RespValue {
    match value {
        Some(v) => RespValue::bulk_string(v),
        None => RespValue::null_bulk_string(),
    }
}

pub(crate) fn bulk_array(items: Vec<Vec<u8>>) -> RespValue {
    RespValue::array(items.into_iter().map(RespValue::bulk_string).collect())
}

pub(crate) fn count_reply(n: usize) -> RespValue {
    RespValue::integer(n as i64)
}
