//! Решение о доступе к панели менеджера.
//!
//! Это только UX-гейт: бэкенд заново проверяет подпись init data в каждом
//! запросе и остаётся единственным источником истины.

use crate::api::Settings;
use crate::host::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

impl Access {
    pub fn is_denied(self) -> bool {
        self == Access::Denied
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Guard {
    /// Пускать, если хоста нет вовсе (нет ни личности, ни init data).
    pub dev_fallback: bool,
}

impl Default for Guard {
    fn default() -> Self {
        Self { dev_fallback: true }
    }
}

impl Guard {
    pub fn decide(
        &self,
        settings: Option<&Settings>,
        identity: Option<&Identity>,
        payload_present: bool,
    ) -> Access {
        let denied = match identity {
            Some(identity) => !settings.is_some_and(|s| s.allows(identity.id)),
            None if payload_present => true,
            None => !self.dev_fallback,
        };
        if denied { Access::Denied } else { Access::Allowed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(
        settings: Option<&Settings>,
        identity: Option<&Identity>,
        payload_present: bool,
    ) -> Access {
        Guard::default().decide(settings, identity, payload_present)
    }

    fn settings(ids: &[i64]) -> Settings {
        Settings {
            allowed_manager_ids: ids.to_vec(),
            ..Settings::default()
        }
    }

    fn manager(id: i64) -> Identity {
        Identity {
            id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn listed_manager_is_allowed() {
        let s = settings(&[111, 222]);
        for id in [111, 222] {
            assert_eq!(decide(Some(&s), Some(&manager(id)), true), Access::Allowed);
            assert_eq!(decide(Some(&s), Some(&manager(id)), false), Access::Allowed);
        }
    }

    #[test]
    fn unlisted_manager_is_denied() {
        let s = settings(&[111, 222]);
        assert_eq!(decide(Some(&s), Some(&manager(333)), true), Access::Denied);
        assert_eq!(decide(Some(&settings(&[])), Some(&manager(111)), true), Access::Denied);
    }

    #[test]
    fn missing_settings_fail_closed() {
        assert_eq!(decide(None, Some(&manager(111)), true), Access::Denied);
        assert_eq!(decide(None, Some(&manager(111)), false), Access::Denied);
    }

    #[test]
    fn no_host_is_developer_mode() {
        assert_eq!(decide(None, None, false), Access::Allowed);
        assert_eq!(decide(Some(&settings(&[])), None, false), Access::Allowed);
        assert_eq!(decide(Some(&settings(&[1])), None, false), Access::Allowed);
    }

    #[test]
    fn host_without_identity_is_denied() {
        assert_eq!(decide(Some(&settings(&[111])), None, true), Access::Denied);
        assert_eq!(decide(None, None, true), Access::Denied);
    }

    #[test]
    fn developer_mode_can_be_disabled() {
        let guard = Guard {
            dev_fallback: false,
        };
        assert!(guard.decide(Some(&settings(&[])), None, false).is_denied());
        assert!(!guard
            .decide(Some(&settings(&[7])), Some(&manager(7)), true)
            .is_denied());
    }
}
