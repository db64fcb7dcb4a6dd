//! Severity filter: one switch per triage class.

use log::debug;

use crate::config::FilterConfig;
use crate::model::{Leak, LeakFlag, LeakMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityFilter {
    no_leak: bool,
    investigate: bool,
    leak: bool,
    dont_care: bool,
}

impl Default for SeverityFilter {
    fn default() -> Self {
        Self { no_leak: true, investigate: true, leak: true, dont_care: true }
    }
}

impl SeverityFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            no_leak: config.no_leak,
            investigate: config.investigate,
            leak: config.leak,
            dont_care: config.dont_care,
        }
    }

    /// Whether leaks carrying `flag` are currently shown. Untriaged
    /// (`Missing`) leaks are never filtered.
    pub fn is_flag_active(&self, flag: LeakFlag) -> bool {
        match flag {
            LeakFlag::NoLeak => self.no_leak,
            LeakFlag::Investigate => self.investigate,
            LeakFlag::Leak => self.leak,
            LeakFlag::DontCare => self.dont_care,
            LeakFlag::Missing => true,
        }
    }

    pub fn is_active(&self, meta: &LeakMeta) -> bool {
        self.is_flag_active(meta.flag)
    }

    pub fn is_leak_active(&self, leak: &Leak) -> bool {
        let active = self.is_flag_active(leak.flag());
        if !active {
            debug!("Filtering {} {}", leak.kind.label(), leak.ip);
        }
        active
    }

    /// Toggle one class. Returns `false` (and changes nothing) for
    /// `Missing`, which is not a user-facing class.
    pub fn set(&mut self, flag: LeakFlag, enabled: bool) -> bool {
        let slot = match flag {
            LeakFlag::NoLeak => &mut self.no_leak,
            LeakFlag::Investigate => &mut self.investigate,
            LeakFlag::Leak => &mut self.leak,
            LeakFlag::DontCare => &mut self.dont_care,
            LeakFlag::Missing => {
                debug!("Ignoring filter toggle for untriaged class");
                return false;
            }
        };
        *slot = enabled;
        true
    }
}
