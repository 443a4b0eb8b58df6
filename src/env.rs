use std::cell::RefCell;
use std::collections::HashMap;
use std::env;

/// Read access to environment variables.
///
/// Production code reads through [`SystemEnv`]; tests build an
/// [`InMemoryEnv`] so they never touch the real process environment.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;
}

/// Zero-sized type that delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }
}

/// `RefCell`-backed environment for tests. Not `Sync`.
#[derive(Default)]
pub struct InMemoryEnv {
    vars: RefCell<HashMap<String, String>>,
}

impl InMemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.borrow_mut().insert(key.into(), value.into());
    }
}

impl ReadEnv for InMemoryEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        self.vars
            .borrow()
            .get(key)
            .cloned()
            .ok_or(env::VarError::NotPresent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_env_returns_set_values() {
        let env = InMemoryEnv::new();
        env.set("APLYID_BASE_URL", "https://api.aplyid.com");

        assert_eq!(env.var("APLYID_BASE_URL").unwrap(), "https://api.aplyid.com");
        assert!(matches!(env.var("MISSING"), Err(env::VarError::NotPresent)));
    }

    #[test]
    fn system_env_delegates_to_std() {
        let std_result = std::env::var("PATH");
        assert_eq!(SystemEnv.var("PATH").is_ok(), std_result.is_ok());
    }
}
