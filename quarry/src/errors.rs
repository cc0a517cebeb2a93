use strata::buffer_pool::PoolError;
use strata::lock_manager::LockError;

#[derive(Debug)]
pub enum ExecutionError {
    IoError(String),
    TableNotFound(String),
    FieldNotFound(String),
    SchemaMismatch(String),
    Unsupported(String),
    Deadlock,
    BufferExhausted,
    GenericError(String),
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::IoError(err.to_string())
    }
}

impl From<LockError> for ExecutionError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Deadlock => ExecutionError::Deadlock,
        }
    }
}

impl From<PoolError> for ExecutionError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Aborted => ExecutionError::Deadlock,
            PoolError::Exhausted => ExecutionError::BufferExhausted,
            PoolError::Io(e) => ExecutionError::IoError(e.to_string()),
        }
    }
}
