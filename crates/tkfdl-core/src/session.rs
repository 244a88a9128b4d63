//! Per-task state shared between the screens of one form flow.
//!
//! Created when the user opens a form and passed to each screen that needs
//! it; dropped when the flow ends. Nothing here is global.

use serde::{Deserialize, Serialize};

/// Values pre-filled into new rows of the leakage-test form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakageDefaults {
    pub continuity: String,
    pub extreme_income_protection: String,
    pub voltage: String,
    pub findings: String,
    pub cycle_impedance: String,
}

impl Default for LeakageDefaults {
    fn default() -> Self {
        LeakageDefaults {
            continuity: "0.09".to_string(),
            extreme_income_protection: "---".to_string(),
            voltage: "230.1".to_string(),
            findings: "---".to_string(),
            cycle_impedance: "EK-TP".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    form_url: Option<String>,
    measured_location: Option<String>,
    defaults: LeakageDefaults,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a flow on the form at `url`.
    pub fn for_form(url: impl Into<String>) -> Self {
        let mut s = Self::new();
        s.set_form_url(url);
        s
    }

    pub fn form_url(&self) -> Option<&str> {
        self.form_url.as_deref()
    }

    /// Blank URLs clear the current one.
    pub fn set_form_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.form_url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
    }

    pub fn measured_location(&self) -> Option<&str> {
        self.measured_location.as_deref()
    }

    pub fn set_measured_location(&mut self, location: impl Into<String>) {
        let location = location.into();
        self.measured_location = Some(location).filter(|l| !l.trim().is_empty());
    }

    pub fn defaults(&self) -> &LeakageDefaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut LeakageDefaults {
        &mut self.defaults
    }
}
