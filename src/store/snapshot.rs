use super::Store;
use crate::resp::RespValue;
use crate::types::RedisValue;
use crate::types::sorted_set::format_score;

/// Items carried by one container command in a rewrite. Large containers
/// become several commands on the same key so no frame nears the codec's
/// array limit.
pub const REWRITE_ITEMS_PER_COMMAND: usize = 64;

/// Push `name key item...` commands, at most `per_command` items each.
fn push_chunked<I>(commands: &mut Vec<RespValue>, name: &[u8], key: &[u8], items: I, per_command: usize)
where
    I: IntoIterator<Item = Vec<Vec<u8>>>,
{
    let mut parts: Vec<Vec<u8>> = Vec::new();
    let mut count = 0;
    for item in items {
        if count == 0 {
            parts.extend([name.to_vec(), key.to_vec()]);
        }
        parts.extend(item);
        count += 1;
        if count == per_command {
            commands.push(RespValue::command(std::mem::take(&mut parts)));
            count = 0;
        }
    }
    if count > 0 {
        commands.push(RespValue::command(parts));
    }
}

impl Store {
    /// Render the live keyspace as a command list that rebuilds it: writes
    /// per key (containers split every `REWRITE_ITEMS_PER_COMMAND` items),
    /// plus a PEXPIREAT for every key with a TTL.
    pub fn snapshot_commands(&mut self) -> Vec<RespValue> {
        let mut entries: Vec<_> = self.live_entries().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let per = REWRITE_ITEMS_PER_COMMAND;
        let mut commands = Vec::with_capacity(entries.len());
        for (key, value, expiry) in entries {
            let key = key.as_bytes().to_vec();
            match value {
                RedisValue::String(s) => {
                    commands.push(RespValue::command([b"SET".to_vec(), key.clone(), s.as_bytes().to_vec()]));
                }
                RedisValue::List(list) => {
                    push_chunked(&mut commands, b"RPUSH", &key, list.iter().map(|e| vec![e.clone()]), per);
                }
                RedisValue::Hash(hash) => {
                    let mut fields: Vec<_> = hash.iter().collect();
                    fields.sort_unstable();
                    let pairs = fields.into_iter().map(|(f, v)| vec![f.clone(), v.clone()]);
                    push_chunked(&mut commands, b"HSET", &key, pairs, per);
                }
                RedisValue::Set(set) => {
                    let mut members: Vec<_> = set.iter().cloned().collect();
                    members.sort_unstable();
                    push_chunked(&mut commands, b"SADD", &key, members.into_iter().map(|m| vec![m]), per);
                }
                RedisValue::SortedSet(zset) => {
                    let pairs = zset.iter().map(|(member, score)| vec![format_score(score).into_bytes(), member.to_vec()]);
                    push_chunked(&mut commands, b"ZADD", &key, pairs, per);
                }
            }

            if let Some(at) = expiry {
                commands.push(RespValue::command([
                    b"PEXPIREAT".to_vec(),
                    key,
                    at.to_string().into_bytes(),
                ]));
            }
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::REWRITE_ITEMS_PER_COMMAND;
    use crate::resp::RespValue;
    use crate::store::test_support::*;

    #[test]
    fn test_snapshot_one_command_per_key_plus_ttls() {
        let (mut store, _clock) = store_with_clock();
        store.strings().set("s", b"v".to_vec());
        store.keys().expire_in("s", 1_000);
        store.lists().rpush("l", vec![b"a".to_vec(), b"b".to_vec()]).unwrap();
        store.hashes().hset("h", vec![(b"f".to_vec(), b"1".to_vec())]).unwrap();
        store.sets().sadd("set", vec![b"y".to_vec(), b"x".to_vec()]).unwrap();
        store.zsets().zadd("z", vec![(1.5, b"m".to_vec()), (2.0, b"n".to_vec())]).unwrap();

        let cmds = store.snapshot_commands();
        assert_eq!(
            cmds,
            vec![
                RespValue::command(["HSET", "h", "f", "1"]),
                RespValue::command(["RPUSH", "l", "a", "b"]),
                RespValue::command(["SET", "s", "v"]),
                RespValue::command(["PEXPIREAT".to_string(), "s".into(), (T0 + 1_000).to_string()]),
                RespValue::command(["SADD", "set", "x", "y"]),
                RespValue::command(["ZADD", "z", "1.5", "m", "2", "n"]),
            ]
        );
    }

    #[test]
    fn test_large_containers_split_into_bounded_commands() {
        let (mut store, _clock) = store_with_clock();
        let n = REWRITE_ITEMS_PER_COMMAND * 3 + 5;
        let items: Vec<Vec<u8>> = (0..n).map(|i| format!("{i:04}").into_bytes()).collect();
        store.lists().rpush("l", items.clone()).unwrap();
        store.hashes().hset("h", items.iter().map(|i| (i.clone(), b"v".to_vec())).collect()).unwrap();
        store.keys().expire_in("l", 1_000);

        let cmds = store.snapshot_commands();
        let sizes = |name: &str| -> Vec<usize> {
            cmds.iter()
                .filter_map(|c| match c {
                    RespValue::Array(Some(parts)) if parts[0] == RespValue::bulk_string(name) => Some(parts.len() - 2),
                    _ => None,
                })
                .collect()
        };
        let per = REWRITE_ITEMS_PER_COMMAND;
        assert_eq!(sizes("RPUSH"), vec![per, per, per, 5]);
        assert_eq!(sizes("HSET"), vec![per * 2, per * 2, per * 2, 10]);
        // the TTL follows the last chunk of its key
        assert_eq!(
            cmds.last(),
            Some(&RespValue::command(["PEXPIREAT".to_string(), "l".into(), (T0 + 1_000).to_string()]))
        );

        let (mut rebuilt, _clock) = store_with_clock();
        let table = crate::command::CommandTable::new();
        for c in &cmds {
            let mut ctx = crate::command::CommandContext::new(&mut rebuilt, &table, None);
            assert!(!table.dispatch(&mut ctx, c).reply.is_error());
        }
        assert_eq!(rebuilt.lists().lrange("l", 0, -1).unwrap(), items);
        assert_eq!(rebuilt.snapshot_commands(), cmds);
    }

    #[test]
    fn test_snapshot_skips_expired() {
        let (mut store, clock) = store_with_clock();
        store.strings().set_with_ttl("gone", b"v".to_vec(), 10);
        clock.advance(10);
        assert!(store.snapshot_commands().is_empty());
    }
}
