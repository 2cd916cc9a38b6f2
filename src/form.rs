/// State of a single input control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    pub value: String,
    pub invalid: bool,
    pub disabled: bool,
    pub read_only: bool,
    pub hidden: bool,
}

impl Field {
    #[cfg(test)]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::default()
        }
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    pub fn trimmed(&self) -> &str {
        self.value.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }

    pub fn mark_invalid(&mut self) {
        self.invalid = true;
    }

    pub fn clear_invalid(&mut self) {
        self.invalid = false;
    }

    /// Sets or clears the invalid flag and returns whether the value passed.
    pub fn check(&mut self, valid: bool) -> bool {
        self.invalid = !valid;
        valid
    }

    #[cfg(test)]
    pub fn is_editable(&self) -> bool {
        !self.disabled && !self.read_only
    }
}

/// Inline message shown next to a form.
#[derive(Debug, Clone, PartialEq)]
pub enum Banner {
    Success(String),
    Danger(String),
}
