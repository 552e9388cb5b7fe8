/// Unix domain socket helpers (connect, listen, accept, stale-socket cleanup).
pub mod unix;
