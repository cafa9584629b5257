#[derive(Debug, thiserror::Error)]
pub enum KestrelError {
    #[error("ERR {0}")]
    Generic(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgCount(String),

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(String),

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR syntax error")]
    SyntaxError,

    #[error("ERR unknown command '{0}', with args beginning with: {1}")]
    UnknownCommand(String, String),

    #[error("ERR internal error: {0}")]
    Io(#[from] std::io::Error),
}

impl KestrelError {
    /// Internal failures are logged by dispatch; everything else is a
    /// normal client-facing outcome.
    pub fn is_internal(&self) -> bool {
        matches!(self, KestrelError::Io(_))
    }
}

pub type KestrelResult<T> = Result<T, KestrelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrongtype_message_is_fixed() {
        assert_eq!(
            KestrelError::WrongType.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }

    #[test]
    fn test_arg_count_message() {
        let err = KestrelError::WrongArgCount("get".into());
        assert_eq!(err.to_string(), "ERR wrong number of arguments for 'get' command");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_io_is_internal() {
        let err = KestrelError::from(std::io::Error::other("disk gone"));
        assert!(err.is_internal());
        assert!(err.to_string().starts_with("ERR internal error"));
    }
}
