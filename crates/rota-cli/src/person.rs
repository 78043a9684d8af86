//! Identity resolution for commands that act on behalf of a person.
//!
//! The resolution chain: `--person` flag > `ROTA_PERSON` env > `USER` env (TTY only).
//! Commands that confirm or request chores need an identity; reports do not.

use std::env;

/// Errors from identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonResolutionError {
    pub message: String,
    pub code: &'static str,
}

impl std::fmt::Display for PersonResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PersonResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_person_with(cli_flag: Option<&str>, env: &dyn EnvReader) -> Option<String> {
    if let Some(person) = cli_flag.filter(|p| !p.is_empty()) {
        return Some(person.to_string());
    }

    if let Some(val) = env.get("ROTA_PERSON") {
        return Some(val);
    }

    if env.is_tty() {
        return env.get("USER");
    }

    None
}

pub fn resolve_person(cli_flag: Option<&str>) -> Option<String> {
    resolve_person_with(cli_flag, &RealEnv)
}

/// Resolve identity, returning an error if none is available.
pub fn require_person(cli_flag: Option<&str>) -> Result<String, PersonResolutionError> {
    resolve_person(cli_flag).ok_or_else(|| PersonResolutionError {
        message: "A person is required for this command. Set --person or ROTA_PERSON.".to_string(),
        code: "missing_person",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        const fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn flag_takes_priority() {
        let env = MockEnv::new().var("ROTA_PERSON", "bo").var("USER", "cy").tty();
        assert_eq!(resolve_person_with(Some("ana"), &env).as_deref(), Some("ana"));
    }

    #[test]
    fn env_fallback() {
        let env = MockEnv::new().var("ROTA_PERSON", "bo");
        assert_eq!(resolve_person_with(None, &env).as_deref(), Some("bo"));
    }

    #[test]
    fn empty_flag_ignored() {
        let env = MockEnv::new().var("ROTA_PERSON", "bo");
        assert_eq!(resolve_person_with(Some(""), &env).as_deref(), Some("bo"));
    }

    #[test]
    fn user_only_on_a_terminal() {
        let env = MockEnv::new().var("USER", "cy");
        assert_eq!(resolve_person_with(None, &env), None);

        let env = MockEnv::new().var("USER", "cy").tty();
        assert_eq!(resolve_person_with(None, &env).as_deref(), Some("cy"));
    }

    #[test]
    fn require_person_succeeds_with_flag() {
        assert_eq!(require_person(Some("ana")).as_deref(), Ok("ana"));
    }
}
